//! Upstream Ethereum JSON-RPC backend.
//!
//! Everything that does not need the bridge account is served by a regular
//! node endpoint: reads, fee and gas estimation, and the final broadcast of
//! signed transactions.

use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::{transport::TransportError, Provider};
use alloy_rpc_types_eth::TransactionRequest;
use serde_json::Value;
use std::{borrow::Cow, future::Future};
use thiserror::Error;
use tracing::debug;

/// JSON-RPC code for an unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    /// The node answered with a JSON-RPC error object
    #[error("upstream error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The request never produced a JSON-RPC answer
    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// Whether the node does not know the requested method.
    pub const fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == METHOD_NOT_FOUND)
    }
}

impl From<TransportError> for UpstreamError {
    /// Keep the node's error object when there is one.
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
                data: payload
                    .data
                    .as_ref()
                    .and_then(|data| serde_json::from_str(data.get()).ok()),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

/// EIP-1559 fee suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Trait for the upstream node backend.
pub trait Upstream: Send + Sync {
    /// Forward a raw JSON-RPC call.
    fn request(
        &self,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Value, UpstreamError>> + Send;

    fn chain_id(&self) -> impl Future<Output = Result<u64, UpstreamError>> + Send;

    /// Pending transaction count of `address`.
    fn transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, UpstreamError>> + Send;

    fn estimate_fees(&self) -> impl Future<Output = Result<FeeEstimate, UpstreamError>> + Send;

    fn estimate_gas(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<u64, UpstreamError>> + Send;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    fn send_raw_transaction(
        &self,
        raw: Bytes,
    ) -> impl Future<Output = Result<TxHash, UpstreamError>> + Send;
}

/// [`Upstream`] implementation on top of an alloy provider.
#[derive(Debug, Clone)]
pub struct RpcUpstream<P> {
    provider: P,
}

impl<P> RpcUpstream<P>
where
    P: Provider + Clone,
{
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }
}


impl<P> Upstream for RpcUpstream<P>
where
    P: Provider + Clone,
{
    async fn request(&self, method: &str, params: Value) -> Result<Value, UpstreamError> {
        debug!(method, "Forwarding request upstream");

        self.provider
            .raw_request::<Value, Value>(Cow::Owned(method.to_string()), params)
            .await
            .map_err(UpstreamError::from)
    }

    async fn chain_id(&self) -> Result<u64, UpstreamError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, UpstreamError> {
        Ok(self
            .provider
            .get_transaction_count(address)
            .pending()
            .await?)
    }

    async fn estimate_fees(&self) -> Result<FeeEstimate, UpstreamError> {
        let estimate = self.provider.estimate_eip1559_fees().await?;

        Ok(FeeEstimate {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, UpstreamError> {
        Ok(self.provider.estimate_gas(tx).await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, UpstreamError> {
        let pending = self.provider.send_raw_transaction(&raw).await?;

        Ok(*pending.tx_hash())
    }
}
