//! Test doubles for the remote signer and the upstream backend.
//!
//! [`MockRemoteSigner`] produces real secp256k1 signatures with a local key and
//! behaves like the signer canister: the read-only key lookup only answers
//! after the authoritative lookup registered the key.

use crate::{
    FeeEstimate, RemoteSigner, RemoteSignerHandle, SignerConnector, SignerError, Upstream,
    UpstreamError, METHOD_NOT_FOUND,
};
use alloy_primitives::{b256, keccak256, Address, Bytes, TxHash, B256};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use ic_agent::Identity;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

/// Secret key used by [`MockRemoteSigner::with_test_key`].
pub const TEST_SECRET_KEY: B256 =
    b256!("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318");

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
struct SignerState {
    registered: bool,
    query_error: Option<SignerError>,
    update_error: Option<SignerError>,
    sign_error: Option<SignerError>,
    foreign_signatures: bool,
    query_calls: usize,
    update_calls: usize,
    signed: Vec<B256>,
}

/// Remote signer backed by a local private key.
pub struct MockRemoteSigner {
    key: PrivateKeySigner,
    compressed: bool,
    delay: Duration,
    state: Mutex<SignerState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockRemoteSigner {
    pub fn new(key: PrivateKeySigner) -> Self {
        Self {
            key,
            compressed: false,
            delay: Duration::ZERO,
            state: Mutex::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Signer holding [`TEST_SECRET_KEY`].
    pub fn with_test_key() -> Self {
        let key = PrivateKeySigner::from_bytes(&TEST_SECRET_KEY).expect("valid test key");
        Self::new(key)
    }

    /// Mark the key as already registered, so the query path answers.
    pub fn registered(self) -> Self {
        lock(&self.state).registered = true;
        self
    }

    /// Return SEC1 compressed public keys.
    pub const fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Delay every sign call.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_query(&self, error: SignerError) {
        lock(&self.state).query_error = Some(error);
    }

    pub fn fail_update(&self, error: SignerError) {
        lock(&self.state).update_error = Some(error);
    }

    pub fn fail_sign(&self, error: Option<SignerError>) {
        lock(&self.state).sign_error = error;
    }

    /// Sign with an unrelated key from now on.
    pub fn sign_with_foreign_key(&self) {
        lock(&self.state).foreign_signatures = true;
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn public_key_bytes(&self) -> Bytes {
        let point = self
            .key
            .credential()
            .verifying_key()
            .to_encoded_point(self.compressed);
        Bytes::copy_from_slice(point.as_bytes())
    }

    /// Digests passed to [`RemoteSigner::sign`], in call order.
    pub fn signed_digests(&self) -> Vec<B256> {
        lock(&self.state).signed.clone()
    }

    pub fn query_calls(&self) -> usize {
        lock(&self.state).query_calls
    }

    pub fn update_calls(&self) -> usize {
        lock(&self.state).update_calls
    }

    /// Highest number of sign calls that were in flight at the same time.
    pub fn max_concurrent_signs(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn compact_signature(&self, digest: &B256, foreign: bool) -> Result<Bytes, SignerError> {
        let key = if foreign {
            PrivateKeySigner::from_bytes(&keccak256(b"foreign")).expect("valid foreign key")
        } else {
            self.key.clone()
        };
        let signature = key
            .sign_hash_sync(digest)
            .map_err(|e| SignerError::Rejected(e.to_string()))?;

        let mut out = signature.r().to_be_bytes::<32>().to_vec();
        out.extend_from_slice(&signature.s().to_be_bytes::<32>());
        Ok(out.into())
    }
}

#[async_trait]
impl RemoteSigner for MockRemoteSigner {
    async fn public_key_query(&self) -> Result<Bytes, SignerError> {
        let mut state = lock(&self.state);
        state.query_calls += 1;
        if let Some(error) = state.query_error.clone() {
            return Err(error);
        }
        if !state.registered {
            return Err(SignerError::Rejected("No public key found".to_string()));
        }
        drop(state);

        Ok(self.public_key_bytes())
    }

    async fn public_key(&self) -> Result<Bytes, SignerError> {
        let mut state = lock(&self.state);
        state.update_calls += 1;
        if let Some(error) = state.update_error.clone() {
            return Err(error);
        }
        state.registered = true;
        drop(state);

        Ok(self.public_key_bytes())
    }

    async fn sign(&self, digest: B256) -> Result<Bytes, SignerError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = {
            let mut state = lock(&self.state);
            state.signed.push(digest);
            match state.sign_error.clone() {
                Some(error) => Err(error),
                None => self.compact_signature(&digest, state.foreign_signatures),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Connector that hands out a shared [`MockRemoteSigner`].
pub struct MockConnector {
    signer: Arc<MockRemoteSigner>,
    error: Mutex<Option<SignerError>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(signer: Arc<MockRemoteSigner>) -> Self {
        Self {
            signer,
            error: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, error: Option<SignerError>) {
        *lock(&self.error) = error;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignerConnector for MockConnector {
    async fn connect(&self, identity: Arc<dyn Identity>) -> Result<RemoteSignerHandle, SignerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.error).clone() {
            return Err(error);
        }

        let principal = identity.sender().map_err(SignerError::Rejected)?;
        let signer: Arc<dyn RemoteSigner> = self.signer.clone();
        Ok(RemoteSignerHandle::new(signer, principal))
    }
}

#[derive(Debug)]
struct UpstreamState {
    chain_id: u64,
    nonce: u64,
    fees: FeeEstimate,
    gas: u64,
    responses: HashMap<String, Result<Value, UpstreamError>>,
    requests: Vec<(String, Value)>,
    estimates: Vec<TransactionRequest>,
    nonce_queries: Vec<Address>,
    broadcasts: Vec<Bytes>,
    broadcast_error: Option<UpstreamError>,
}

/// Scripted upstream node.
///
/// Unscripted methods answer with a JSON-RPC "method not found" error.
#[derive(Debug, Clone)]
pub struct MockUpstream {
    state: Arc<Mutex<UpstreamState>>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new(5)
    }
}

impl MockUpstream {
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(UpstreamState {
                chain_id,
                nonce: 0,
                fees: FeeEstimate {
                    max_fee_per_gas: 30_000_000_000,
                    max_priority_fee_per_gas: 1_000_000_000,
                },
                gas: 21_000,
                responses: HashMap::new(),
                requests: Vec::new(),
                estimates: Vec::new(),
                nonce_queries: Vec::new(),
                broadcasts: Vec::new(),
                broadcast_error: None,
            })),
        }
    }

    pub fn respond(&self, method: &str, result: Value) {
        lock(&self.state)
            .responses
            .insert(method.to_string(), Ok(result));
    }

    pub fn respond_error(&self, method: &str, error: UpstreamError) {
        lock(&self.state)
            .responses
            .insert(method.to_string(), Err(error));
    }

    pub fn set_nonce(&self, nonce: u64) {
        lock(&self.state).nonce = nonce;
    }

    pub fn fail_broadcast(&self, error: Option<UpstreamError>) {
        lock(&self.state).broadcast_error = error;
    }

    /// Raw requests forwarded through [`Upstream::request`].
    pub fn requests(&self) -> Vec<(String, Value)> {
        lock(&self.state).requests.clone()
    }

    /// Transactions passed to gas estimation.
    pub fn estimates(&self) -> Vec<TransactionRequest> {
        lock(&self.state).estimates.clone()
    }

    pub fn nonce_queries(&self) -> Vec<Address> {
        lock(&self.state).nonce_queries.clone()
    }

    /// Raw transactions passed to the broadcast call.
    pub fn broadcasts(&self) -> Vec<Bytes> {
        lock(&self.state).broadcasts.clone()
    }
}

impl Upstream for MockUpstream {
    async fn request(&self, method: &str, params: Value) -> Result<Value, UpstreamError> {
        let mut state = lock(&self.state);
        state.requests.push((method.to_string(), params));

        state.responses.get(method).cloned().unwrap_or_else(|| {
            Err(UpstreamError::Rpc {
                code: METHOD_NOT_FOUND,
                message: format!("the method {method} does not exist/is not available"),
                data: None,
            })
        })
    }

    async fn chain_id(&self) -> Result<u64, UpstreamError> {
        Ok(lock(&self.state).chain_id)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, UpstreamError> {
        let mut state = lock(&self.state);
        state.nonce_queries.push(address);
        Ok(state.nonce)
    }

    async fn estimate_fees(&self) -> Result<FeeEstimate, UpstreamError> {
        Ok(lock(&self.state).fees)
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, UpstreamError> {
        let mut state = lock(&self.state);
        state.estimates.push(tx);
        Ok(state.gas)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, UpstreamError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.broadcast_error.clone() {
            return Err(error);
        }
        let hash = keccak256(&raw);
        state.broadcasts.push(raw);
        Ok(hash)
    }
}
