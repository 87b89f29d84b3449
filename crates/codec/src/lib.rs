//! Ethereum encoding primitives for remote-custody signing.
//!
//! This crate provides:
//! - Address derivation from secp256k1 public keys
//! - Canonical encoding and signing digests of unsigned transactions
//! - Assembly of `r || s` signatures into recoverable Ethereum signatures
//! - Re-serialization of signed transactions into broadcastable bytes

pub mod address;
pub mod signature;
pub mod transaction;

pub use address::{derive_address, AddressError};
pub use signature::assemble_signature;
pub use transaction::{
    attach_signature, decode_signed, encode_unsigned, verify_signed, CodecError,
    SignedTransaction, UnsignedTransaction,
};
