//! Transaction builders
//!
//! Each builder works in two steps. `build_unsigned` turns a
//! [`TransactionData`] plus captured chain state into pre-image hashes and a
//! builder state; `build_signed` compiles that state with the signer's raw
//! signatures into broadcastable bytes.

pub mod binance;
pub mod bitcoin;
pub mod stellar;

use serde::{Deserialize, Serialize};

use crate::error::WalletResult;
use crate::signing::PreImageHash;
use crate::types::Chain;
use crate::wallet::{AccountState, TransactionData};

pub use self::binance::BinanceTransactionBuilder;
pub use self::bitcoin::UtxoTransactionBuilder;
pub use self::stellar::StellarTransactionBuilder;

/// Serialized, signed transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    /// Chain transaction id as it is displayed by explorers
    pub hash: String,
}

/// Chain state an account-model build depends on, captured by `update()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountBuildContext {
    pub account: AccountState,
    /// Whether the destination account is already active on chain
    pub destination_exists: bool,
    /// Whether the wallet holds a trust line for its token
    pub has_trustline: bool,
    /// Unix timestamp after which the transaction is invalid
    pub valid_until: u64,
}

/// Builder for account/sequence chains: a single hash per transaction.
pub trait AccountTransactionBuilder: Send + Sync {
    type Unsigned: Send + Sync;

    fn chain(&self) -> Chain;

    /// Whether `build_unsigned` needs to know if the destination exists.
    fn needs_destination_lookup(&self) -> bool {
        false
    }

    fn build_unsigned(
        &self,
        transaction: &TransactionData,
        context: &AccountBuildContext,
    ) -> WalletResult<(PreImageHash, Self::Unsigned)>;

    fn build_signed(
        &self,
        unsigned: &Self::Unsigned,
        signature: &[u8],
    ) -> WalletResult<SignedTransaction>;
}
