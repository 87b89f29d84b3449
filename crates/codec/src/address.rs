use alloy_primitives::Address;
use k256::ecdsa::VerifyingKey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Key length matches none of the SEC1 encodings
    #[error("invalid public key length: {0} bytes")]
    InvalidLength(usize),

    /// Bytes do not describe a point on secp256k1
    #[error("public key is not a valid secp256k1 point")]
    NotOnCurve,
}

/// Derive the Ethereum account address for a secp256k1 public key.
///
/// Accepts SEC1 compressed (33 bytes) and uncompressed (65 bytes) encodings as
/// well as the bare 64-byte `x || y` form. The address is the last 20 bytes of
/// the keccak256 hash of the uncompressed point without its prefix; its
/// `Display` implementation renders the EIP-55 checksum form.
pub fn derive_address(public_key: &[u8]) -> Result<Address, AddressError> {
    let key = match public_key.len() {
        33 | 65 => VerifyingKey::from_sec1_bytes(public_key),
        64 => {
            let mut uncompressed = [0u8; 65];
            uncompressed[0] = 0x04;
            uncompressed[1..].copy_from_slice(public_key);
            VerifyingKey::from_sec1_bytes(&uncompressed)
        }
        len => return Err(AddressError::InvalidLength(len)),
    }
    .map_err(|_| AddressError::NotOnCurve)?;

    Ok(Address::from_public_key(&key))
}
