//! Wallet connector for an Ethereum account held by a signer canister.
//!
//! [`Connector`] wires the pieces together: a [`SessionManager`] that logs in
//! and binds the signer, the [`SigningBridgeAccount`] it binds into and the
//! [`RpcRoutingProvider`] dApps talk to.

pub mod config;
pub mod metrics;
mod serve;

use crate::metrics::Metrics;
use account::{Account, AccountConfig, SigningBridgeAccount};
use alloy_primitives::Address;
use client::{SignerConnector, Upstream};
use rpc::{JsonRpcRequest, JsonRpcResponse, RpcError, RpcRoutingProvider};
use serde::Serialize;
use serde_json::Value;
use session::{IdentityProvider, SessionConfig, SessionEvent, SessionManager};
use std::{sync::Arc, time::Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub use serve::serve;

/// Everything a [`Connector`] needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Chain the upstream node must serve
    pub chain_id: u64,
    pub account: AccountConfig,
    pub session: SessionConfig,
}

/// State reported to the wallet framework on activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub chain_id: u64,
    pub accounts: Vec<Address>,
}

pub struct Connector<U> {
    account: Arc<SigningBridgeAccount<U>>,
    session: SessionManager,
    provider: RpcRoutingProvider<SigningBridgeAccount<U>, U>,
    chain_id: u64,
    metrics: Metrics,
}

impl<U> Connector<U>
where
    U: Upstream + Clone + 'static,
{
    pub fn new(
        upstream: U,
        signer: Arc<dyn SignerConnector>,
        identity: Arc<dyn IdentityProvider>,
        settings: Settings,
    ) -> Self {
        let account = Arc::new(SigningBridgeAccount::new(
            upstream.clone(),
            settings.account,
        ));
        let session = SessionManager::new(identity, signer, account.clone(), settings.session);
        let provider = RpcRoutingProvider::new(account.clone(), upstream);

        Self {
            account,
            session,
            provider,
            chain_id: settings.chain_id,
            metrics: Metrics::new(),
        }
    }

    pub const fn account(&self) -> &Arc<SigningBridgeAccount<U>> {
        &self.account
    }

    pub const fn session(&self) -> &SessionManager {
        &self.session
    }

    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Log in, check the upstream chain and report the account.
    pub async fn activate(&self) -> eyre::Result<Activation> {
        let principal = self.session.login().await?;

        let upstream_chain = self.provider.upstream().chain_id().await?;
        if upstream_chain != self.chain_id {
            self.session.logout().await?;
            eyre::bail!(
                "upstream serves chain {upstream_chain}, expected {}",
                self.chain_id
            );
        }

        let address = self.account.get_address().await?;
        info!(%principal, %address, chain_id = self.chain_id, "Connector activated");

        Ok(Activation {
            chain_id: self.chain_id,
            accounts: vec![address],
        })
    }

    pub async fn deactivate(&self) -> eyre::Result<()> {
        self.session.logout().await?;
        info!("Connector deactivated");
        Ok(())
    }

    /// Serve a JSON-RPC call, counting it as session activity.
    pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.session.record_activity();
        let start = Instant::now();

        let result = self.provider.send(method, params).await;
        self.metrics
            .record_request(method, result.is_ok(), start.elapsed());
        if let Err(err) = &result {
            warn!(method, code = err.code(), error = %err, "Request failed");
        }
        result
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        self.session.record_activity();
        let start = Instant::now();
        let method = request.method.clone();

        let response = self.provider.handle(request).await;
        self.metrics
            .record_request(&method, response.error.is_none(), start.elapsed());
        response
    }

    /// Log session events and count them until the session manager goes away.
    pub fn spawn_event_logger(&self) -> tokio::task::JoinHandle<()> {
        let mut events = self.events();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        info!(?event, "Session event");
                        metrics.record_session_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session event logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        })
    }
}
