//! Remote signer backed by a threshold-ECDSA canister on the Internet Computer.
//!
//! The canister derives one secp256k1 key per caller principal, so every
//! identity gets its own agent and therefore its own Ethereum account.
//!
//! ```text
//! public_key_query : () -> (variant { Ok : record { public_key : blob }; Err : text }) query;
//! public_key       : () -> (variant { Ok : record { public_key : blob }; Err : text });
//! sign             : (blob) -> (variant { Ok : record { signature : blob }; Err : text });
//! ```

use crate::remote_signer::{RemoteSigner, RemoteSignerHandle, SignerConnector, SignerError};
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use candid::{CandidType, Decode, Encode, Principal};
use ic_agent::{Agent, Identity};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(CandidType, Deserialize, Debug)]
struct PublicKeyReply {
    public_key: Vec<u8>,
}

#[derive(CandidType, Deserialize, Debug)]
struct SignatureReply {
    signature: Vec<u8>,
}

/// Signer canister client for a single identity.
#[derive(Clone)]
pub struct CanisterSigner {
    agent: Agent,
    canister_id: Principal,
}

impl CanisterSigner {
    pub const fn new(agent: Agent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }

    pub const fn canister_id(&self) -> Principal {
        self.canister_id
    }
}

#[async_trait]
impl RemoteSigner for CanisterSigner {
    async fn public_key_query(&self) -> Result<Bytes, SignerError> {
        debug!(canister = %self.canister_id, "Querying public key");

        let reply = self
            .agent
            .query(&self.canister_id, "public_key_query")
            .with_arg(empty_args()?)
            .call()
            .await
            .map_err(|e| SignerError::Transport(e.to_string()))?;

        decode_public_key(&reply)
    }

    async fn public_key(&self) -> Result<Bytes, SignerError> {
        debug!(canister = %self.canister_id, "Fetching public key");

        let reply = self
            .agent
            .update(&self.canister_id, "public_key")
            .with_arg(empty_args()?)
            .call_and_wait()
            .await
            .map_err(|e| SignerError::Transport(e.to_string()))?;

        decode_public_key(&reply)
    }

    async fn sign(&self, digest: B256) -> Result<Bytes, SignerError> {
        debug!(canister = %self.canister_id, %digest, "Requesting signature");

        let arg = Encode!(&digest.to_vec()).map_err(|e| SignerError::InvalidReply(e.to_string()))?;
        let reply = self
            .agent
            .update(&self.canister_id, "sign")
            .with_arg(arg)
            .call_and_wait()
            .await
            .map_err(|e| SignerError::Transport(e.to_string()))?;

        decode_signature(&reply)
    }
}

fn empty_args() -> Result<Vec<u8>, SignerError> {
    Encode!().map_err(|e| SignerError::InvalidReply(e.to_string()))
}

fn decode_public_key(reply: &[u8]) -> Result<Bytes, SignerError> {
    let result = Decode!(reply, Result<PublicKeyReply, String>)
        .map_err(|e| SignerError::InvalidReply(e.to_string()))?;

    result
        .map(|reply| Bytes::from(reply.public_key))
        .map_err(SignerError::Rejected)
}

fn decode_signature(reply: &[u8]) -> Result<Bytes, SignerError> {
    let result = Decode!(reply, Result<SignatureReply, String>)
        .map_err(|e| SignerError::InvalidReply(e.to_string()))?;

    result
        .map(|reply| Bytes::from(reply.signature))
        .map_err(SignerError::Rejected)
}

/// Builds a [`CanisterSigner`] per authenticated identity.
#[derive(Debug, Clone)]
pub struct CanisterConnector {
    url: String,
    canister_id: Principal,
    fetch_root_key: bool,
}

impl CanisterConnector {
    /// Creates a connector.
    ///
    /// # Arguments
    /// * `url` - Replica or boundary node URL
    /// * `canister_id` - The signer canister
    /// * `fetch_root_key` - Trust the root key served by the replica (local replicas only)
    pub fn new(url: impl Into<String>, canister_id: Principal, fetch_root_key: bool) -> Self {
        Self {
            url: url.into(),
            canister_id,
            fetch_root_key,
        }
    }
}

#[async_trait]
impl SignerConnector for CanisterConnector {
    async fn connect(&self, identity: Arc<dyn Identity>) -> Result<RemoteSignerHandle, SignerError> {
        let principal = identity.sender().map_err(SignerError::Rejected)?;

        let agent = Agent::builder()
            .with_url(self.url.clone())
            .with_arc_identity(identity)
            .build()
            .map_err(|e| SignerError::Transport(e.to_string()))?;

        if self.fetch_root_key {
            agent
                .fetch_root_key()
                .await
                .map_err(|e| SignerError::Transport(e.to_string()))?;
        }

        debug!(%principal, canister = %self.canister_id, "Connected to signer canister");

        let signer = CanisterSigner::new(agent, self.canister_id);
        Ok(RemoteSignerHandle::new(Arc::new(signer), principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_public_key_ok() {
        let reply = Encode!(&Ok::<_, String>(PublicKeyReply {
            public_key: vec![0x02; 33],
        }))
        .unwrap();

        assert_eq!(decode_public_key(&reply).unwrap(), Bytes::from(vec![0x02; 33]));
    }

    #[test]
    fn test_decode_public_key_err_variant() {
        let reply =
            Encode!(&Err::<PublicKeyReply, _>("No public key found".to_string())).unwrap();

        assert_eq!(
            decode_public_key(&reply),
            Err(SignerError::Rejected("No public key found".to_string()))
        );
    }

    #[test]
    fn test_decode_signature_ok() {
        let reply = Encode!(&Ok::<_, String>(SignatureReply {
            signature: vec![0xab; 64],
        }))
        .unwrap();

        assert_eq!(decode_signature(&reply).unwrap().len(), 64);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let reply = Encode!(&42u64).unwrap();
        assert!(matches!(
            decode_signature(&reply),
            Err(SignerError::InvalidReply(_))
        ));
    }
}
