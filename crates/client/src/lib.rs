//! Network clients used by the bridge.
//!
//! - [`RemoteSigner`]: the remote-custody signing service, with a
//!   [`CanisterSigner`] implementation speaking Candid to an Internet Computer
//!   canister
//! - [`Upstream`]: the Ethereum JSON-RPC node used for reads and broadcasts

mod canister;
mod remote_signer;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
mod upstream;

use alloy_provider::{Provider, ProviderBuilder};
pub use canister::{CanisterConnector, CanisterSigner};
pub use remote_signer::{RemoteSigner, RemoteSignerHandle, SignerConnector, SignerError};
use thiserror::Error;
pub use upstream::{FeeEstimate, RpcUpstream, Upstream, UpstreamError, METHOD_NOT_FOUND};

#[derive(Error, Debug)]
pub enum ClientError {
    /// Error parsing or validating URLs
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// Error parsing a canister principal
    #[error("Invalid canister id: {0}")]
    InvalidCanisterId(String),
}

/// Convenience function to create an ethereum rpc provider from url.
pub async fn create_provider(rpc_url: &str) -> Result<impl Provider + Clone, ClientError> {
    let url = rpc_url
        .parse()
        .map_err(|e| ClientError::InvalidUrl(format!("{}", e)))?;
    let provider = ProviderBuilder::new().connect_http(url);

    Ok(provider)
}

/// Create the upstream backend for an RPC url.
pub async fn create_upstream(
    rpc_url: &str,
) -> Result<RpcUpstream<impl Provider + Clone>, ClientError> {
    let provider = create_provider(rpc_url).await?;
    Ok(RpcUpstream::new(provider))
}

/// Create a connector for the signer canister.
pub fn create_canister_connector(
    replica_url: &str,
    canister_id: &str,
    fetch_root_key: bool,
) -> Result<CanisterConnector, ClientError> {
    let canister_id = candid::Principal::from_text(canister_id)
        .map_err(|e| ClientError::InvalidCanisterId(format!("{}", e)))?;

    Ok(CanisterConnector::new(
        replica_url,
        canister_id,
        fetch_root_key,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url() {
        let result = create_provider("not a url").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_canister_id() {
        let result = create_canister_connector("http://127.0.0.1:4943", "not-a-principal", true);
        assert!(matches!(result, Err(ClientError::InvalidCanisterId(_))));
    }

    #[test]
    fn test_valid_canister_id() {
        let result =
            create_canister_connector("https://icp-api.io", "rrkah-fqaaa-aaaaa-aaaaq-cai", false);
        assert!(result.is_ok());
    }
}
