use client::SignerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The identity provider refused the login
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Logged in, but the provider has no identity to hand out
    #[error("identity provider returned no identity")]
    NoIdentity,

    #[error("failed to connect to the signer: {0}")]
    Connect(#[from] SignerError),

    /// A logout happened while the login was in flight
    #[error("login was cancelled")]
    Cancelled,

    #[error("a login is already in progress")]
    AlreadyAuthenticating,
}
