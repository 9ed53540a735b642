//! Wallet model
//!
//! The [`Wallet`] is owned by its manager and only mutated by `update()` and
//! `send()`; callers receive snapshots.

pub mod address;
pub mod amount;
pub mod utxo;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{WalletError, WalletResult};
use crate::types::{Chain, Token};

pub use amount::{Amount, AmountKind, Decimal};
pub use utxo::UnspentOutput;

/// Account-model chain state captured by `update()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_number: u64,
    pub sequence: u64,
}

/// Memo attached to account-chain transfers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Memo {
    Text(String),
    /// Numeric memo / destination tag
    Id(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionExtra {
    pub memo: Option<Memo>,
    /// Open a trust line for the wallet's token instead of moving funds
    #[serde(default)]
    pub open_trustline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Unconfirmed,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub source_address: String,
    pub destination_address: String,
    pub amount: Amount,
    pub fee: Amount,
    #[serde(default)]
    pub extra: TransactionExtra,
    #[serde(default)]
    pub status: TransactionStatus,
    pub hash: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl TransactionData {
    pub fn new(
        source_address: impl Into<String>,
        destination_address: impl Into<String>,
        amount: Amount,
        fee: Amount,
    ) -> Self {
        Self {
            source_address: source_address.into(),
            destination_address: destination_address.into(),
            amount,
            fee,
            extra: TransactionExtra::default(),
            status: TransactionStatus::Unconfirmed,
            hash: None,
            date: None,
        }
    }

    /// Request to hold `token`: no value moves, only the fee is paid.
    pub fn trustline_opt_in(source_address: impl Into<String>, token: &Token, fee: Amount) -> Self {
        let source_address = source_address.into();
        let mut transaction = Self::new(
            source_address.clone(),
            source_address,
            Amount::token(token, Decimal::ZERO),
            fee,
        );
        transaction.extra.open_trustline = true;
        transaction
    }

    pub fn is_trustline_opt_in(&self) -> bool {
        self.extra.open_trustline
    }

    pub fn with_memo(mut self, memo: Memo) -> Self {
        self.extra.memo = Some(memo);
        self
    }

    /// Deduct the fee from the amount, so that `amount + fee` equals the
    /// originally requested amount.
    pub fn with_fee_included(mut self) -> WalletResult<Self> {
        if self.amount.currency_symbol != self.fee.currency_symbol {
            return Err(WalletError::encoding(format!(
                "Fee in {} cannot be included in a {} amount",
                self.fee.currency_symbol, self.amount.currency_symbol
            )));
        }
        self.amount = self.amount.checked_sub(&self.fee).map_err(|_| {
            WalletError::insufficient_funds(format!(
                "Fee {} exceeds amount {}",
                self.fee, self.amount
            ))
        })?;
        Ok(self)
    }

    /// Total leaving the wallet in the fee currency when amount and fee share it.
    pub fn total_spent(&self) -> WalletResult<Amount> {
        self.amount.checked_add(&self.fee)
    }
}

/// Wallet snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub chain: Chain,
    pub address: String,
    pub public_key: Vec<u8>,
    pub token: Option<Token>,
    pub balances: BTreeMap<AmountKind, Amount>,
    pub pending_transactions: Vec<TransactionData>,
}

impl Wallet {
    pub fn new(chain: Chain, address: String, public_key: Vec<u8>, token: Option<Token>) -> Self {
        Self {
            chain,
            address,
            public_key,
            token,
            balances: BTreeMap::new(),
            pending_transactions: Vec::new(),
        }
    }

    pub fn balance(&self, kind: AmountKind) -> Option<&Amount> {
        self.balances.get(&kind)
    }

    /// Coin balance, zero when not loaded yet.
    pub fn coin_balance(&self) -> Amount {
        self.balances
            .get(&AmountKind::Coin)
            .cloned()
            .unwrap_or_else(|| Amount::coin(self.chain, Decimal::ZERO))
    }

    pub fn token_balance(&self) -> Option<Amount> {
        let token = self.token.as_ref()?;
        Some(
            self.balances
                .get(&AmountKind::Token)
                .cloned()
                .unwrap_or_else(|| Amount::token(token, Decimal::ZERO)),
        )
    }

    pub fn set_balance(&mut self, amount: Amount) {
        self.balances.insert(amount.kind, amount);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_transactions.is_empty()
    }

    /// Record a broadcast transaction and decrement balances optimistically.
    pub fn record_sent(&mut self, mut transaction: TransactionData, hash: String) -> WalletResult<()> {
        let coin = self.coin_balance();
        if transaction.is_trustline_opt_in() {
            // Only the fee leaves the wallet; there is no transfer to track.
            self.set_balance(coin.saturating_sub(&transaction.fee)?);
            return Ok(());
        }
        match transaction.amount.kind {
            AmountKind::Token => {
                if let Some(token) = self.token_balance() {
                    self.set_balance(token.saturating_sub(&transaction.amount)?);
                }
                self.set_balance(coin.saturating_sub(&transaction.fee)?);
            }
            AmountKind::Coin | AmountKind::Reserve => {
                self.set_balance(coin.saturating_sub(&transaction.total_spent()?)?);
            }
        }
        transaction.status = TransactionStatus::Unconfirmed;
        transaction.hash = Some(hash);
        transaction.date = Some(Utc::now());
        self.pending_transactions.push(transaction);
        Ok(())
    }
}
