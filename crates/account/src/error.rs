use alloy_primitives::Address;
use client::UpstreamError;
use codec::CodecError;
use thiserror::Error;

/// Failures of the bridge account.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No signer handle is bound
    #[error("not authenticated")]
    NotAuthenticated,

    /// Neither public key lookup produced a usable key
    #[error("public key unavailable: {0}")]
    KeyUnavailable(String),

    /// The signer failed or returned an unusable signature
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The transaction could not be populated, signed or broadcast
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    /// The request names a sender other than the bridge account
    #[error("from address {found} does not match account {expected}")]
    FromMismatch { expected: Address, found: Address },

    #[error(transparent)]
    Transaction(#[from] CodecError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
