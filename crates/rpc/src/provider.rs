use crate::{normalize_quantity, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcError};
use account::{Account, BridgeError, Message};
use alloy_primitives::{hex, Address};
use alloy_rpc_types_eth::TransactionRequest;
use client::Upstream;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a method is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Answered by the bridge account
    Account,
    /// Forwarded, with the result coerced to a hex quantity
    Quantity,
    /// Forwarded, with the result passed through unchanged
    Forward,
}

impl Route {
    pub fn of(method: &str) -> Self {
        match method {
            "eth_accounts"
            | "eth_requestAccounts"
            | "eth_coinbase"
            | "eth_sign"
            | "personal_sign"
            | "eth_signTransaction"
            | "eth_sendTransaction" => Self::Account,
            "eth_chainId"
            | "eth_gasPrice"
            | "eth_blockNumber"
            | "eth_getBalance"
            | "eth_getTransactionCount"
            | "eth_estimateGas"
            | "eth_getBlockTransactionCountByHash"
            | "eth_getBlockTransactionCountByNumber"
            | "eth_getUncleCountByBlockHash"
            | "eth_getUncleCountByBlockNumber" => Self::Quantity,
            _ => Self::Forward,
        }
    }
}

/// JSON-RPC provider that routes signing through the bridge account.
///
/// Safe to share between concurrent callers: all mutable state lives in the
/// account, which serializes signing itself.
pub struct RpcRoutingProvider<A, U> {
    account: Arc<A>,
    upstream: U,
}

impl<A, U> RpcRoutingProvider<A, U>
where
    A: Account,
    U: Upstream,
{
    pub const fn new(account: Arc<A>, upstream: U) -> Self {
        Self { account, upstream }
    }

    pub const fn account(&self) -> &Arc<A> {
        &self.account
    }

    pub const fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Serve one JSON-RPC method call.
    pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let route = Route::of(method);
        debug!(method, ?route, "Routing request");

        match route {
            Route::Account => self.intercept(method, params).await,
            Route::Quantity => self.forward(method, params).await.map(normalize_quantity),
            Route::Forward => self.forward(method, params).await,
        }
    }

    /// Serve a full JSON-RPC request object.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let result = match params {
            Value::Array(params) => self.send(&method, params).await,
            Value::Null => self.send(&method, Vec::new()).await,
            other => Err(RpcError::InvalidParams(format!(
                "expected a parameter array, got {other}"
            ))),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => {
                debug!(method, code = err.code(), error = %err, "Request failed");
                JsonRpcResponse::failure(id, JsonRpcError::from(&err))
            }
        }
    }

    async fn forward(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.upstream
            .request(method, Value::Array(params))
            .await
            .map_err(|err| {
                if err.is_method_not_found() {
                    warn!(method, "Method not supported upstream");
                    RpcError::UnsupportedMethod(method.to_string())
                } else {
                    RpcError::Upstream(err)
                }
            })
    }

    async fn intercept(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        match method {
            "eth_accounts" => {
                if !self.account.is_authenticated() {
                    return Ok(json!([]));
                }
                Ok(json!([self.account.get_address().await?]))
            }
            "eth_requestAccounts" => Ok(json!([self.account.get_address().await?])),
            "eth_coinbase" => Ok(json!(self.account.get_address().await?)),
            "eth_sign" => {
                let [address, data] = expect_params(method, params)?;
                self.sign(address, data).await
            }
            "personal_sign" => {
                let [data, address] = expect_params(method, params)?;
                self.sign(address, data).await
            }
            "eth_signTransaction" => {
                let request = transaction_param(method, params)?;
                let signed = self.account.sign_transaction(request).await?;
                Ok(json!(signed.raw))
            }
            "eth_sendTransaction" => {
                let request = transaction_param(method, params)?;
                let submitted = self.account.send_transaction(request).await?;
                Ok(json!(submitted.hash))
            }
            _ => Err(RpcError::UnsupportedMethod(method.to_string())),
        }
    }

    async fn sign(&self, address: Value, data: Value) -> Result<Value, RpcError> {
        let requested: Address = serde_json::from_value(address)
            .map_err(|e| RpcError::InvalidParams(format!("invalid address: {e}")))?;
        let message = message_param(data)?;

        let expected = self.account.get_address().await?;
        if requested != expected {
            return Err(BridgeError::FromMismatch {
                expected,
                found: requested,
            }
            .into());
        }

        Ok(Value::String(self.account.sign_message(message).await?))
    }
}

fn expect_params<const N: usize>(method: &str, params: Vec<Value>) -> Result<[Value; N], RpcError> {
    let len = params.len();
    if len < N {
        return Err(RpcError::InvalidParams(format!(
            "{method} expects {N} parameters, got {len}"
        )));
    }

    params
        .into_iter()
        .take(N)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| RpcError::InvalidParams(format!("{method} expects {N} parameters")))
}

fn transaction_param(method: &str, params: Vec<Value>) -> Result<TransactionRequest, RpcError> {
    let [tx] = expect_params(method, params)?;
    serde_json::from_value(tx)
        .map_err(|e| RpcError::InvalidParams(format!("invalid transaction: {e}")))
}

/// Hex data is signed as bytes, any other string as text.
fn message_param(data: Value) -> Result<Message, RpcError> {
    match data {
        Value::String(text) => Ok(match text.strip_prefix("0x").map(hex::decode) {
            Some(Ok(bytes)) => Message::from(bytes),
            _ => Message::from(text),
        }),
        other => Err(RpcError::InvalidParams(format!(
            "expected message data as a string, got {other}"
        ))),
    }
}
