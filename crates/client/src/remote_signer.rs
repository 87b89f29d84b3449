//! Contract of the remote signing service.
//!
//! The signer holds the secp256k1 key material on the other side of a trust
//! boundary. It offers a cheap read-only public key lookup, an authoritative
//! (state-mutating) public key lookup and signing over a 32-byte digest.

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use candid::Principal;
use ic_agent::Identity;
use std::{fmt, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The signer answered with an error payload
    #[error("signer rejected the request: {0}")]
    Rejected(String),

    /// The call never produced a reply (network, replica, timeout)
    #[error("signer transport error: {0}")]
    Transport(String),

    /// The reply could not be decoded
    #[error("invalid signer reply: {0}")]
    InvalidReply(String),
}

/// Client side of the remote signing service.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    /// Low-latency, read-only public key lookup.
    ///
    /// Only answers once the key has been registered by [`Self::public_key`].
    async fn public_key_query(&self) -> Result<Bytes, SignerError>;

    /// Authoritative public key lookup.
    async fn public_key(&self) -> Result<Bytes, SignerError>;

    /// Sign a 32-byte digest, returning the raw signature.
    async fn sign(&self, digest: B256) -> Result<Bytes, SignerError>;
}

/// A remote signer bound to one authenticated identity.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct RemoteSignerHandle {
    signer: Arc<dyn RemoteSigner>,
    principal: Principal,
}

impl RemoteSignerHandle {
    pub fn new(signer: Arc<dyn RemoteSigner>, principal: Principal) -> Self {
        Self { signer, principal }
    }

    /// Principal of the identity the handle acts for.
    pub const fn principal(&self) -> Principal {
        self.principal
    }

    pub fn signer(&self) -> &Arc<dyn RemoteSigner> {
        &self.signer
    }
}

impl fmt::Debug for RemoteSignerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSignerHandle")
            .field("principal", &self.principal.to_text())
            .finish_non_exhaustive()
    }
}

/// Opens signer connections on behalf of an identity.
#[async_trait]
pub trait SignerConnector: Send + Sync {
    async fn connect(&self, identity: Arc<dyn Identity>) -> Result<RemoteSignerHandle, SignerError>;
}
