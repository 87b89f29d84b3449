use crate::SessionError;
use async_trait::async_trait;
use ic_agent::{
    identity::{BasicIdentity, Secp256k1Identity},
    Identity,
};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Parameters of a login round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    /// Where the provider authenticates the user. For
    /// [`PemIdentityProvider`] this is the path of a PEM key file.
    pub identity_provider: String,
}

/// Source of authenticated Internet Computer identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether a session from an earlier login is still held.
    async fn is_authenticated(&self) -> bool;

    async fn login(&self, options: &LoginOptions) -> Result<(), SessionError>;

    /// Invalidate the held identity.
    async fn logout(&self) -> Result<(), SessionError>;

    fn identity(&self) -> Option<Arc<dyn Identity>>;
}

/// Identity provider reading a key pair from a PEM file.
///
/// Secp256k1 keys are tried first, then Ed25519.
#[derive(Default)]
pub struct PemIdentityProvider {
    identity: RwLock<Option<Arc<dyn Identity>>>,
}

impl PemIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider already holding `identity`.
    pub fn with_identity(identity: Arc<dyn Identity>) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    /// Parse a PEM encoded key pair.
    pub fn parse(pem: &[u8]) -> Result<Arc<dyn Identity>, SessionError> {
        if let Ok(identity) = Secp256k1Identity::from_pem(pem) {
            return Ok(Arc::new(identity));
        }
        let identity = BasicIdentity::from_pem(pem)
            .map_err(|e| SessionError::Authentication(format!("unreadable key pair: {e}")))?;
        Ok(Arc::new(identity))
    }
}

#[async_trait]
impl IdentityProvider for PemIdentityProvider {
    async fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    async fn login(&self, options: &LoginOptions) -> Result<(), SessionError> {
        debug!(path = %options.identity_provider, "Loading identity");

        let pem = tokio::fs::read(&options.identity_provider)
            .await
            .map_err(|e| {
                SessionError::Authentication(format!("{}: {e}", options.identity_provider))
            })?;
        let identity = Self::parse(&pem)?;

        let principal = identity.sender().map_err(SessionError::Authentication)?;
        info!(%principal, "Identity loaded");

        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
        Ok(())
    }

    async fn logout(&self) -> Result<(), SessionError> {
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn identity(&self) -> Option<Arc<dyn Identity>> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
