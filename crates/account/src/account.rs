use crate::{Account, AccountConfig, BridgeError, Message, MessageSigning, SignerSlot};
use alloy_primitives::{eip191_hash_message, hex, Address, Bytes, Signature, TxHash, B256};
use alloy_rpc_types_eth::TransactionRequest;
use candid::Principal;
use client::{RemoteSignerHandle, Upstream};
use codec::{
    assemble_signature, attach_signature, derive_address, encode_unsigned, verify_signed,
    SignedTransaction,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lifecycle of a [`SigningBridgeAccount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// No signer handle
    Unbound,
    /// Handle present, no sign request in flight
    Bound,
    /// A sign request holds the sign lane
    Signing,
}

/// Result of [`Account::send_transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: TxHash,
    /// Broadcast EIP-2718 bytes
    pub raw: Bytes,
    pub nonce: u64,
    pub from: Address,
}

#[derive(Debug, Clone)]
struct CachedKey {
    public_key: Bytes,
    address: Address,
}

#[derive(Debug)]
struct Binding {
    handle: RemoteSignerHandle,
    epoch: u64,
    key: Option<CachedKey>,
}

/// Ethereum account backed by a remote signer.
///
/// The account starts unbound. A session binds a [`RemoteSignerHandle`] after
/// login; every bind starts a new epoch so that keys and signatures obtained
/// under a previous handle are never used for the new one.
///
/// Sign requests go through a FIFO lane and never interleave. Address lookups
/// only touch the binding and proceed while a sign is in flight.
pub struct SigningBridgeAccount<U> {
    upstream: U,
    config: AccountConfig,
    binding: RwLock<Option<Binding>>,
    epochs: AtomicU64,
    sign_lane: Mutex<()>,
}

impl<U> SigningBridgeAccount<U> {
    pub fn new(upstream: U, config: AccountConfig) -> Self {
        Self {
            upstream,
            config,
            binding: RwLock::new(None),
            epochs: AtomicU64::new(0),
            sign_lane: Mutex::new(()),
        }
    }

    pub const fn upstream(&self) -> &U {
        &self.upstream
    }

    pub const fn config(&self) -> &AccountConfig {
        &self.config
    }

    pub fn state(&self) -> AccountState {
        if self.read().is_none() {
            return AccountState::Unbound;
        }
        match self.sign_lane.try_lock() {
            Ok(_) => AccountState::Bound,
            Err(_) => AccountState::Signing,
        }
    }

    /// Principal of the bound identity.
    pub fn principal(&self) -> Option<Principal> {
        self.read().as_ref().map(|binding| binding.handle.principal())
    }

    /// Address derived under the current binding, without a lookup.
    pub fn cached_address(&self) -> Option<Address> {
        self.read()
            .as_ref()
            .and_then(|binding| binding.key.as_ref())
            .map(|key| key.address)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Binding>> {
        self.binding.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Binding>> {
        self.binding.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Result<(RemoteSignerHandle, u64), BridgeError> {
        self.read()
            .as_ref()
            .map(|binding| (binding.handle.clone(), binding.epoch))
            .ok_or(BridgeError::NotAuthenticated)
    }

    fn current_epoch(&self) -> Option<u64> {
        self.read().as_ref().map(|binding| binding.epoch)
    }

    fn cached_address_for(&self, epoch: u64) -> Option<Address> {
        self.read()
            .as_ref()
            .filter(|binding| binding.epoch == epoch)
            .and_then(|binding| binding.key.as_ref())
            .map(|key| key.address)
    }

    fn remember_key(&self, epoch: u64, key: CachedKey) -> Result<Address, BridgeError> {
        let mut guard = self.write();
        let binding = match guard.as_mut() {
            None => return Err(BridgeError::NotAuthenticated),
            Some(binding) if binding.epoch != epoch => {
                return Err(BridgeError::KeyUnavailable(
                    "signer was rebound during key lookup".to_string(),
                ))
            }
            Some(binding) => binding,
        };

        if let Some(previous) = &binding.key {
            if previous.public_key != key.public_key {
                warn!(
                    previous = %previous.address,
                    current = %key.address,
                    "Signer public key changed"
                );
            }
        }

        let address = key.address;
        binding.key = Some(key);
        Ok(address)
    }

    fn ensure_epoch(&self, epoch: u64) -> Result<(), BridgeError> {
        if self.current_epoch() == Some(epoch) {
            Ok(())
        } else {
            Err(BridgeError::SigningFailed(
                "signer was rebound while signing".to_string(),
            ))
        }
    }

    /// Fetch the public key, preferring the read-only query.
    async fn lookup_key(handle: &RemoteSignerHandle) -> Result<CachedKey, BridgeError> {
        let signer = handle.signer();

        let query_error = match signer.public_key_query().await {
            Ok(public_key) => match derive_address(&public_key) {
                Ok(address) => return Ok(CachedKey { public_key, address }),
                Err(err) => err.to_string(),
            },
            Err(err) => err.to_string(),
        };

        warn!(
            principal = %handle.principal(),
            error = %query_error,
            "Public key query failed, falling back to update call"
        );

        let unavailable =
            |err: String| BridgeError::KeyUnavailable(format!("query: {query_error}; update: {err}"));
        let public_key = signer
            .public_key()
            .await
            .map_err(|err| unavailable(err.to_string()))?;
        let address = derive_address(&public_key).map_err(|err| unavailable(err.to_string()))?;

        Ok(CachedKey { public_key, address })
    }

    async fn signing_address(
        &self,
        handle: &RemoteSignerHandle,
        epoch: u64,
    ) -> Result<Address, BridgeError> {
        if let Some(address) = self.cached_address_for(epoch) {
            return Ok(address);
        }
        let key = Self::lookup_key(handle).await?;
        self.remember_key(epoch, key)
    }

    async fn sign_digest(
        handle: &RemoteSignerHandle,
        digest: B256,
        address: Address,
    ) -> Result<Signature, BridgeError> {
        let raw = handle
            .signer()
            .sign(digest)
            .await
            .map_err(|err| BridgeError::SigningFailed(err.to_string()))?;

        assemble_signature(&raw, &digest, address)
            .map_err(|err| BridgeError::SigningFailed(err.to_string()))
    }
}

impl<U: Upstream> SigningBridgeAccount<U> {
    /// Fill in every field the signature commits to.
    ///
    /// A `from` naming another account is rejected; the field is dropped
    /// either way.
    pub async fn populate_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionRequest, BridgeError> {
        let (handle, epoch) = self.snapshot()?;
        let address = self.signing_address(&handle, epoch).await?;
        self.populate(request, address).await
    }

    async fn populate(
        &self,
        mut request: TransactionRequest,
        address: Address,
    ) -> Result<TransactionRequest, BridgeError> {
        if let Some(found) = request.from.take() {
            if found != address {
                return Err(BridgeError::FromMismatch {
                    expected: address,
                    found,
                });
            }
        }

        if request.chain_id.is_none() {
            let chain_id = match self.config.chain_id {
                Some(chain_id) => chain_id,
                None => self.upstream.chain_id().await?,
            };
            request.chain_id = Some(chain_id);
        }

        if request.nonce.is_none() {
            request.nonce = Some(self.upstream.transaction_count(address).await?);
        }

        if request.gas_price.is_none()
            && (request.max_fee_per_gas.is_none() || request.max_priority_fee_per_gas.is_none())
        {
            let fees = self.upstream.estimate_fees().await?;
            request.max_fee_per_gas.get_or_insert(fees.max_fee_per_gas);
            request
                .max_priority_fee_per_gas
                .get_or_insert(fees.max_priority_fee_per_gas);
        }

        if request.gas.is_none() {
            let estimate = TransactionRequest {
                from: Some(address),
                ..request.clone()
            };
            request.gas = Some(self.upstream.estimate_gas(estimate).await?);
        }

        debug!(%address, nonce = ?request.nonce, gas = ?request.gas, "Populated transaction");
        Ok(request)
    }

    /// Sign while holding the sign lane.
    async fn sign_locked(
        &self,
        request: TransactionRequest,
    ) -> Result<SignedTransaction, BridgeError> {
        let (handle, epoch) = self.snapshot()?;
        let from = request.from;
        let unsigned = encode_unsigned(request)?;

        let address = self.signing_address(&handle, epoch).await?;
        if let Some(found) = from.filter(|found| *found != address) {
            return Err(BridgeError::FromMismatch {
                expected: address,
                found,
            });
        }

        let digest = unsigned.digest();
        debug!(%address, %digest, "Requesting signature");

        let signature = Self::sign_digest(&handle, digest, address).await?;
        let signed = attach_signature(&unsigned, signature);
        verify_signed(&signed.raw, digest, address)
            .map_err(|err| BridgeError::SigningFailed(err.to_string()))?;
        self.ensure_epoch(epoch)?;

        info!(hash = %signed.hash, %address, "Transaction signed");
        Ok(signed)
    }

    async fn submit_locked(
        &self,
        request: TransactionRequest,
    ) -> Result<SubmittedTransaction, BridgeError> {
        let (handle, epoch) = self.snapshot()?;
        let address = self.signing_address(&handle, epoch).await?;

        let populated = self.populate(request, address).await?;
        let nonce = populated.nonce.unwrap_or_default();
        let signed = self.sign_locked(populated).await?;

        let hash = self
            .upstream
            .send_raw_transaction(signed.raw.clone())
            .await?;
        if hash != signed.hash {
            warn!(%hash, expected = %signed.hash, "Upstream reported a different transaction hash");
        }

        info!(%hash, nonce, %address, "Transaction broadcast");
        Ok(SubmittedTransaction {
            hash,
            raw: signed.raw,
            nonce,
            from: address,
        })
    }
}

impl<U: Upstream> Account for SigningBridgeAccount<U> {
    fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    async fn get_address(&self) -> Result<Address, BridgeError> {
        let (handle, epoch) = self.snapshot()?;
        let key = Self::lookup_key(&handle).await?;
        let address = self.remember_key(epoch, key)?;

        debug!(%address, "Resolved account address");
        Ok(address)
    }

    async fn sign_message(&self, message: Message) -> Result<String, BridgeError> {
        match self.config.message_signing {
            MessageSigning::Passthrough => {
                warn!("Message signing is in passthrough mode, returning the message unsigned");
                Ok(message.to_text())
            }
            MessageSigning::Remote => {
                let _lane = self.sign_lane.lock().await;
                let (handle, epoch) = self.snapshot()?;
                let address = self.signing_address(&handle, epoch).await?;

                let digest = eip191_hash_message(message.as_bytes());
                let signature = Self::sign_digest(&handle, digest, address).await?;
                self.ensure_epoch(epoch)?;

                Ok(hex::encode_prefixed(signature.as_bytes()))
            }
        }
    }

    async fn sign_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<SignedTransaction, BridgeError> {
        let _lane = self.sign_lane.lock().await;
        self.sign_locked(request).await
    }

    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<SubmittedTransaction, BridgeError> {
        let _lane = self.sign_lane.lock().await;

        self.submit_locked(request).await.map_err(|err| match err {
            BridgeError::NotAuthenticated | BridgeError::SubmissionFailed(_) => err,
            other => {
                warn!(error = %other, "Transaction submission failed");
                BridgeError::SubmissionFailed(other.to_string())
            }
        })
    }
}

impl<U: Send + Sync> SignerSlot for SigningBridgeAccount<U> {
    fn bind(&self, handle: RemoteSignerHandle) {
        let principal = handle.principal();
        let mut guard = self.write();
        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        *guard = Some(Binding {
            handle,
            epoch,
            key: None,
        });
        drop(guard);

        info!(%principal, epoch, "Signer bound");
    }

    fn unbind(&self) {
        let mut guard = self.write();
        self.epochs.fetch_add(1, Ordering::SeqCst);
        let previous = guard.take();
        drop(guard);

        if let Some(previous) = previous {
            info!(principal = %previous.handle.principal(), "Signer unbound");
        }
    }
}
