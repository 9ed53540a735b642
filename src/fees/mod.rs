//! Fee model
//!
//! Providers report raw rates as a [`FeeEstimate`]; managers turn them into a
//! caller-facing [`Fee`] for a concrete transaction shape.

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::types::Chain;
use crate::wallet::Amount;

/// Fee levels offered to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTier {
    Minimum,
    Normal,
    Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fee {
    Single(Amount),
    Choosable {
        minimum: Amount,
        normal: Amount,
        priority: Amount,
    },
}

impl Fee {
    pub fn tier(&self, tier: FeeTier) -> &Amount {
        match self {
            Fee::Single(amount) => amount,
            Fee::Choosable { minimum, normal, priority } => match tier {
                FeeTier::Minimum => minimum,
                FeeTier::Normal => normal,
                FeeTier::Priority => priority,
            },
        }
    }

    pub fn normal(&self) -> &Amount {
        self.tier(FeeTier::Normal)
    }
}

/// Unit a provider quotes its rates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeUnit {
    /// Minor units per virtual byte (UTXO chains)
    PerByte,
    /// Minor units per operation (Stellar)
    PerOperation,
    /// Minor units per transaction (Binance transfer fee)
    PerTransaction,
}

/// Raw rates in chain minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub unit: FeeUnit,
    pub minimal: u64,
    pub normal: u64,
    pub priority: u64,
}

impl FeeEstimate {
    pub fn flat(unit: FeeUnit, rate: u64) -> Self {
        Self { unit, minimal: rate, normal: rate, priority: rate }
    }

    /// Rates sorted so that `minimal <= normal <= priority`.
    pub fn ordered(mut self) -> Self {
        let mut rates = [self.minimal, self.normal, self.priority];
        rates.sort_unstable();
        self.minimal = rates[0];
        self.normal = rates[1];
        self.priority = rates[2];
        self
    }

    /// Price a transaction made of `units` bytes / operations.
    pub fn to_fee(&self, chain: Chain, units: u64) -> WalletResult<Fee> {
        let price = |rate: u64| -> WalletResult<Amount> {
            let total = rate
                .checked_mul(units.max(1))
                .ok_or_else(|| WalletError::encoding("Fee overflow"))?;
            Ok(Amount::from_minor_units(
                chain.symbol(),
                chain.decimals(),
                u128::from(total),
                crate::wallet::AmountKind::Coin,
            ))
        };
        let ordered = self.ordered();
        if ordered.minimal == ordered.priority {
            return Ok(Fee::Single(price(ordered.normal)?));
        }
        Ok(Fee::Choosable {
            minimum: price(ordered.minimal)?,
            normal: price(ordered.normal)?,
            priority: price(ordered.priority)?,
        })
    }
}
