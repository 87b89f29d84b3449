//! Configuration types for the signing bridge.
//!
//! This crate provides:
//! - Ethereum network presets (mainnet, Sepolia, Goerli)
//! - Internet Computer endpoint presets for reaching the signer canister
//! - A builder for overriding individual values

pub mod network;

pub use network::{
    EthereumConfig, InternetComputerConfig, NetworkConfig, NetworkConfigBuilder, NetworkType,
};
