//! Shared types for the wallet engine
//!
//! Chain identifiers and token descriptors that cross module boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WalletError;

// =============================================================================
// Chain Types
// =============================================================================

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    Bitcoin,
    BitcoinTestnet,
    Litecoin,
    Ducatus,
    Binance,
    BinanceTestnet,
    Stellar,
    StellarTestnet,
}

/// Accounting model a chain follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Utxo,
    Binance,
    Stellar,
}

impl Chain {
    pub const ALL: [Chain; 8] = [
        Chain::Bitcoin,
        Chain::BitcoinTestnet,
        Chain::Litecoin,
        Chain::Ducatus,
        Chain::Binance,
        Chain::BinanceTestnet,
        Chain::Stellar,
        Chain::StellarTestnet,
    ];

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Bitcoin | Chain::BitcoinTestnet | Chain::Litecoin | Chain::Ducatus => {
                ChainFamily::Utxo
            }
            Chain::Binance | Chain::BinanceTestnet => ChainFamily::Binance,
            Chain::Stellar | Chain::StellarTestnet => ChainFamily::Stellar,
        }
    }

    pub fn is_utxo(&self) -> bool {
        self.family() == ChainFamily::Utxo
    }

    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Chain::BitcoinTestnet | Chain::BinanceTestnet | Chain::StellarTestnet
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Chain::Bitcoin | Chain::BitcoinTestnet => "BTC",
            Chain::Litecoin => "LTC",
            Chain::Ducatus => "DUC",
            Chain::Binance | Chain::BinanceTestnet => "BNB",
            Chain::Stellar | Chain::StellarTestnet => "XLM",
        }
    }

    /// Number of fractional digits in the chain's minor unit
    pub fn decimals(&self) -> u8 {
        match self.family() {
            ChainFamily::Utxo | ChainFamily::Binance => 8,
            ChainFamily::Stellar => 7,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bitcoin",
            Chain::BitcoinTestnet => "bitcoin-testnet",
            Chain::Litecoin => "litecoin",
            Chain::Ducatus => "ducatus",
            Chain::Binance => "binance",
            Chain::BinanceTestnet => "binance-testnet",
            Chain::Stellar => "stellar",
            Chain::StellarTestnet => "stellar-testnet",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Chain {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.id() == normalized)
            .ok_or_else(|| WalletError::configuration(format!("Unknown chain: {}", s)))
    }
}

// =============================================================================
// Token Types
// =============================================================================

/// A non-native asset tracked by a wallet.
///
/// For Binance Chain `contract_address` is the BEP2 denom (for example
/// `BUSD-BD1`); for Stellar it is the issuer account and `symbol` is the
/// asset code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub contract_address: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(symbol: impl Into<String>, contract_address: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            contract_address: contract_address.into(),
            decimals,
        }
    }
}
