//! Ethereum account whose key lives in a remote signer.
//!
//! [`SigningBridgeAccount`] derives its address from the signer's public key,
//! encodes and hashes transactions locally, has the remote signer sign the
//! digest and broadcasts the result through the upstream node.

mod account;
mod error;

pub use account::{AccountState, SigningBridgeAccount, SubmittedTransaction};
use alloy_primitives::{hex, Address, Bytes};
use alloy_rpc_types_eth::TransactionRequest;
use client::RemoteSignerHandle;
pub use codec::SignedTransaction;
pub use error::BridgeError;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// How `signMessage` is served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSigning {
    /// Acknowledge the message by echoing it back, without signing.
    #[default]
    Passthrough,
    /// Sign the EIP-191 personal message digest through the remote signer.
    Remote,
}

/// Account settings.
#[derive(Debug, Clone, Default)]
pub struct AccountConfig {
    /// Chain ID used when a request carries none. Asked from the upstream
    /// node when unset.
    pub chain_id: Option<u64>,
    pub message_signing: MessageSigning,
}

/// A message handed to `signMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Bytes(Bytes),
}

impl Message {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// String form of the message.
    ///
    /// Byte messages are always rendered as 0x-prefixed hex, whatever they
    /// contain.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Bytes(bytes) => hex::encode_prefixed(bytes),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for Message {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

/// Account capability consumed by the RPC router and the connector.
pub trait Account: Send + Sync {
    /// Whether a signer handle is currently bound.
    fn is_authenticated(&self) -> bool;

    /// Address of the bound signer, looked up fresh.
    fn get_address(&self) -> impl Future<Output = Result<Address, BridgeError>> + Send;

    fn sign_message(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<String, BridgeError>> + Send;

    /// Sign a fully populated transaction.
    fn sign_transaction(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = Result<SignedTransaction, BridgeError>> + Send;

    /// Populate, sign and broadcast a transaction.
    fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = Result<SubmittedTransaction, BridgeError>> + Send;
}

/// Something a session can install a signer handle into.
pub trait SignerSlot: Send + Sync {
    /// Replace the current handle, discarding state derived from the old one.
    fn bind(&self, handle: RemoteSignerHandle);

    fn unbind(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_coercion() {
        assert_eq!(Message::from("hello").to_text(), "hello");
        assert_eq!(Message::from(b"hello".to_vec()).to_text(), "0x68656c6c6f");
        assert_eq!(Message::from(vec![0xff, 0x00]).to_text(), "0xff00");
        // Valid UTF-8 bytes stay hex too.
        assert_eq!(Message::from(vec![0xde, 0xad]).to_text(), "0xdead");
        assert_eq!(Message::from(vec![0x00]).to_text(), "0x00");
        assert_eq!(Message::from(vec![0x0a, 0x0b]).to_text(), "0x0a0b");
    }

    #[test]
    fn test_message_bytes() {
        assert_eq!(Message::from("ab").as_bytes(), b"ab");
        assert_eq!(Message::from(vec![1, 2]).as_bytes(), &[1, 2]);
    }
}
