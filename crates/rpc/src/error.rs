use account::BridgeError;
use client::{UpstreamError, METHOD_NOT_FOUND};
use serde_json::Value;
use thiserror::Error;

/// EIP-1193 code for a request that needs an authenticated account.
pub const UNAUTHORIZED: i64 = 4100;

/// JSON-RPC code for a request that is not valid JSON.
pub const PARSE_ERROR: i64 = -32700;

/// JSON-RPC code for malformed parameters.
pub const INVALID_PARAMS: i64 = -32602;

/// JSON-RPC code used for bridge failures without a more specific code.
pub const SERVER_ERROR: i64 = -32000;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Neither the bridge nor the upstream node knows the method
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Error returned by the upstream node for a forwarded call
    #[error(transparent)]
    Upstream(UpstreamError),
}

impl RpcError {
    /// JSON-RPC error code.
    pub const fn code(&self) -> i64 {
        match self {
            Self::Bridge(BridgeError::NotAuthenticated) => UNAUTHORIZED,
            Self::Bridge(BridgeError::FromMismatch { .. } | BridgeError::Transaction(_)) => {
                INVALID_PARAMS
            }
            Self::Bridge(_) => SERVER_ERROR,
            Self::UnsupportedMethod(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Upstream(UpstreamError::Rpc { code, .. }) => *code,
            Self::Upstream(UpstreamError::Transport(_)) => SERVER_ERROR,
        }
    }

    /// Extra error data, passed through from the upstream node.
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Upstream(UpstreamError::Rpc { data, .. }) => data.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes() {
        assert_eq!(RpcError::from(BridgeError::NotAuthenticated).code(), 4100);
        assert_eq!(
            RpcError::from(BridgeError::SigningFailed("rejected".to_string())).code(),
            -32000
        );
        assert_eq!(RpcError::UnsupportedMethod("eth_foo".to_string()).code(), -32601);
        assert_eq!(RpcError::InvalidParams("missing".to_string()).code(), -32602);
        assert_eq!(
            RpcError::Upstream(UpstreamError::Transport("timeout".to_string())).code(),
            -32000
        );
    }

    #[test]
    fn test_upstream_error_keeps_code_and_data() {
        let err = RpcError::Upstream(UpstreamError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            data: Some(json!("0x08c379a0")),
        });

        assert_eq!(err.code(), 3);
        assert_eq!(err.data(), Some(&json!("0x08c379a0")));
    }
}
