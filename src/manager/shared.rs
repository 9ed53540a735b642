//! Bookkeeping shared by both manager families: the wallet snapshot, the
//! captured chain state, the single-send guard and signer cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{ErrorCode, WalletError, WalletResult};
use crate::fees::FeeEstimate;
use crate::manager::ManagerState;
use crate::signing::{PreImageHash, SignerError, SignerIdentity, TransactionSigner};
use crate::types::Chain;
use crate::utils::{redact_address, redact_hash};
use crate::wallet::{AmountKind, TransactionData, Wallet};

struct Inner<S> {
    wallet: Wallet,
    /// Chain state from the last successful update, consumed or pruned by sends
    captured: Option<S>,
    /// Fee rates read by the last successful update
    fee_estimate: Option<FeeEstimate>,
    state: ManagerState,
}

pub(crate) struct ManagerCore<S> {
    chain: Chain,
    identity: SignerIdentity,
    inner: Mutex<Inner<S>>,
    sending: AtomicBool,
    /// The in-flight send has signatures; its payload may reach the network.
    signed: AtomicBool,
    cancel_requested: AtomicBool,
    cancel: Notify,
}

/// Clears the in-flight flag however `send()` ends, including when its
/// future is dropped.
pub(crate) struct SendGuard<'a> {
    sending: &'a AtomicBool,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.sending.store(false, Ordering::Release);
    }
}

impl<S: Clone> ManagerCore<S> {
    pub fn new(wallet: Wallet, card_id: Option<String>) -> Self {
        let mut identity = SignerIdentity::new(wallet.public_key.clone());
        if let Some(card_id) = card_id {
            identity = identity.with_card_id(card_id);
        }
        Self {
            chain: wallet.chain,
            identity,
            inner: Mutex::new(Inner {
                wallet,
                captured: None,
                fee_estimate: None,
                state: ManagerState::Idle,
            }),
            sending: AtomicBool::new(false),
            signed: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            cancel: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn address(&self) -> String {
        self.lock().wallet.address.clone()
    }

    pub fn wallet(&self) -> Wallet {
        self.lock().wallet.clone()
    }

    pub fn state(&self) -> ManagerState {
        if self.sending.load(Ordering::Acquire) {
            return ManagerState::Sending;
        }
        self.lock().state.clone()
    }

    pub fn captured(&self) -> Option<S> {
        self.lock().captured.clone()
    }

    pub fn fee_estimate(&self) -> Option<FeeEstimate> {
        self.lock().fee_estimate
    }

    pub fn begin_update(&self) {
        self.lock().state = ManagerState::Updating;
    }

    /// Apply fresh provider data to the wallet and replace the captured state.
    pub fn commit_update(&self, estimate: FeeEstimate, apply: impl FnOnce(&mut Wallet) -> S) {
        let mut inner = self.lock();
        let captured = apply(&mut inner.wallet);
        inner.captured = Some(captured);
        inner.fee_estimate = Some(estimate);
        inner.state = ManagerState::Ready;
        debug!(
            chain = %self.chain,
            pending = inner.wallet.pending_transactions.len(),
            "wallet updated"
        );
    }

    /// Record a failed update. Balances from the previous update are kept.
    pub fn fail_update(&self, error: WalletError) -> WalletError {
        warn!(chain = %self.chain, error = %error, "update failed");
        self.lock().state = ManagerState::Error(error.clone());
        error
    }

    /// Claim the send slot and take a copy of the captured state.
    pub fn begin_send(&self) -> WalletResult<(SendGuard<'_>, S)> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WalletError::operation_in_progress(
                "Another send is already in progress",
            ));
        }
        let guard = SendGuard { sending: &self.sending };
        self.signed.store(false, Ordering::Release);
        self.cancel_requested.store(false, Ordering::Release);

        let captured = self.captured().ok_or_else(|| {
            WalletError::stale_state("No chain state captured, call update() first")
        })?;
        Ok((guard, captured))
    }

    /// Reject transactions this wallet cannot have produced.
    pub fn check_transaction(&self, transaction: &TransactionData) -> WalletResult<()> {
        let inner = self.lock();
        let wallet = &inner.wallet;
        if transaction.source_address != wallet.address {
            return Err(WalletError::encoding("Source address does not belong to this wallet"));
        }
        if transaction.fee.kind != AmountKind::Coin
            || transaction.fee.currency_symbol != self.chain.symbol()
        {
            return Err(WalletError::encoding(format!(
                "Fee must be paid in {}",
                self.chain.symbol()
            )));
        }
        let expected_symbol = match transaction.amount.kind {
            AmountKind::Coin => self.chain.symbol(),
            AmountKind::Token => match &wallet.token {
                Some(token) => token.symbol.as_str(),
                None => return Err(WalletError::encoding("Wallet has no token configured")),
            },
            AmountKind::Reserve => {
                return Err(WalletError::encoding("Reserve amounts cannot be sent"))
            }
        };
        if transaction.amount.currency_symbol != expected_symbol {
            return Err(WalletError::encoding(format!(
                "Amount in {} cannot be sent from a {} wallet",
                transaction.amount.currency_symbol, expected_symbol
            )));
        }
        Ok(())
    }

    /// Ask the external signer for one signature per hash. Resolves early
    /// with `SignerCancelled` when [`cancel_signing`](Self::cancel_signing)
    /// fires.
    pub async fn sign(
        &self,
        signer: &dyn TransactionSigner,
        hashes: &[PreImageHash],
    ) -> WalletResult<Vec<Vec<u8>>> {
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);

        // cancel_signing() may have run while the payload was being built
        if self.cancel_requested.swap(false, Ordering::AcqRel) {
            return Err(SignerError::Cancelled.into());
        }

        info!(chain = %self.chain, hashes = hashes.len(), "waiting for signer");
        let result = tokio::select! {
            result = signer.sign(hashes, &self.identity) => result,
            _ = &mut cancelled => Err(SignerError::Cancelled),
        };

        let signatures = result.map_err(|error| {
            warn!(chain = %self.chain, error = %error, "signing did not complete");
            WalletError::from(error)
        })?;
        if signatures.len() != hashes.len() {
            return Err(SignerError::SignatureCount {
                expected: hashes.len(),
                actual: signatures.len(),
            }
            .into());
        }
        self.signed.store(true, Ordering::Release);
        Ok(signatures)
    }

    /// Record an accepted broadcast on the wallet and update captured state.
    pub fn complete_send(
        &self,
        transaction: TransactionData,
        hash: &str,
        consume: impl FnOnce(&mut Option<S>),
    ) {
        let mut inner = self.lock();
        consume(&mut inner.captured);
        if let Err(error) = inner.wallet.record_sent(transaction, hash.to_string()) {
            // The transaction is already on the network; only the local view lags.
            warn!(chain = %self.chain, error = %error, "could not apply sent transaction locally");
        }
        inner.state = ManagerState::Ready;
        info!(
            chain = %self.chain,
            address = %redact_address(&inner.wallet.address),
            hash = %redact_hash(hash),
            "transaction broadcast"
        );
    }

    /// Record a failed send. Once the signer has returned, the outcome on
    /// chain is unknown, so the captured state is dropped and the next send
    /// requires a fresh update. Stale state is dropped at any stage.
    pub fn fail_send(&self, error: WalletError) -> WalletError {
        let mut inner = self.lock();
        if error.code == ErrorCode::StaleState || self.signed.load(Ordering::Acquire) {
            inner.captured = None;
        }
        warn!(chain = %self.chain, error = %error, "send failed");
        inner.state = ManagerState::Error(error.clone());
        error
    }

    pub fn cancel_signing(&self) {
        if self.sending.load(Ordering::Acquire) {
            debug!(chain = %self.chain, "signing cancellation requested");
            self.cancel_requested.store(true, Ordering::Release);
            self.cancel.notify_waiters();
        }
    }
}
