//! Ethereum JSON-RPC surface of the bridge.
//!
//! [`RpcRoutingProvider`] answers account and signing methods from the bridge
//! account and forwards everything else to the upstream node.

mod envelope;
mod error;
mod provider;
mod quantity;

pub use envelope::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use error::{RpcError, INVALID_PARAMS, PARSE_ERROR, SERVER_ERROR, UNAUTHORIZED};
pub use provider::{Route, RpcRoutingProvider};
pub use quantity::normalize_quantity;
