//! Wallet managers
//!
//! One [`WalletManager`] per wallet. It owns the wallet snapshot, the
//! provider failover pointer and the chain state captured by the last
//! `update()`, and drives `send()` through build, external signing and
//! broadcast. Two implementations cover every supported chain:
//! [`UtxoWalletManager`] and [`AccountWalletManager`].

mod account;
mod shared;
mod utxo;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::api::{http_providers, FailoverCoordinator, NetworkProvider};
use crate::error::{WalletError, WalletResult};
use crate::fees::{Fee, FeeEstimate};
use crate::signing::TransactionSigner;
use crate::tx::{BinanceTransactionBuilder, StellarTransactionBuilder, UtxoTransactionBuilder};
use crate::types::{Chain, ChainFamily, Token};
use crate::utils::NetworkConfig;
use crate::wallet::address::derive_address;
use crate::wallet::{Amount, TransactionData, Wallet};

pub use self::account::AccountWalletManager;
pub use self::utxo::UtxoWalletManager;

/// Default lifetime of a Stellar transaction after it is built
pub const DEFAULT_VALIDITY_SECS: u64 = 120;

/// Lifecycle of a manager. `Sending` takes precedence while a send is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum ManagerState {
    /// Created, never updated
    Idle,
    Updating,
    Ready,
    Sending,
    /// Last update or send failed
    Error(WalletError),
}

impl ManagerState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ManagerState::Ready)
    }
}

/// Outcome of a successful broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub hash: String,
}

/// What a manager is created for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub chain: Chain,
    /// Card public key, compressed or uncompressed secp256k1 or raw ed25519
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(default)]
    pub token: Option<Token>,
    #[serde(default)]
    pub card_id: Option<String>,
    /// Stellar transaction lifetime
    #[serde(default = "default_validity_secs")]
    pub validity_secs: u64,
}

fn default_validity_secs() -> u64 {
    DEFAULT_VALIDITY_SECS
}

impl WalletConfig {
    pub fn new(chain: Chain, public_key: Vec<u8>) -> Self {
        Self {
            chain,
            public_key,
            token: None,
            card_id: None,
            validity_secs: DEFAULT_VALIDITY_SECS,
        }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_card_id(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = Some(card_id.into());
        self
    }

    /// Wallet snapshot for this configuration, deriving its address.
    pub fn wallet(&self) -> WalletResult<Wallet> {
        let address = derive_address(self.chain, &self.public_key)?;
        Ok(Wallet::new(
            self.chain,
            address,
            self.public_key.clone(),
            self.token.clone(),
        ))
    }
}

/// Per-wallet transaction engine.
///
/// `update()` refreshes balances and captures the chain state the next
/// `send()` builds from. Only one `send()` runs at a time; a second one fails
/// with `OperationInProgress` instead of waiting.
#[async_trait]
pub trait WalletManager: Send + Sync {
    fn chain(&self) -> Chain;

    /// Copy of the current wallet snapshot
    fn wallet(&self) -> Wallet;

    fn state(&self) -> ManagerState;

    /// Fee rates read by the last successful `update()`
    fn fee_estimate(&self) -> Option<FeeEstimate>;

    /// Refresh balances, chain state and fee rates.
    async fn update(&self) -> WalletResult<()>;

    /// Fee options for sending `amount` to `destination`.
    async fn get_fee(&self, amount: &Amount, destination: &str) -> WalletResult<Fee>;

    async fn send(
        &self,
        transaction: TransactionData,
        signer: &dyn TransactionSigner,
    ) -> WalletResult<SendResult>;

    /// Abort a pending signer request. The in-flight `send()` returns
    /// `SignerCancelled` and nothing is broadcast. No effect when idle.
    fn cancel_signing(&self);
}

/// Build the manager for `config.chain` on top of `providers`, tried in order.
pub fn create_wallet_manager(
    config: WalletConfig,
    providers: Vec<Arc<dyn NetworkProvider>>,
) -> WalletResult<Arc<dyn WalletManager>> {
    let wallet = config.wallet()?;
    if config.token.is_some() && config.chain.is_utxo() {
        return Err(WalletError::configuration(format!(
            "{} does not support tokens",
            config.chain
        )));
    }
    let failover = FailoverCoordinator::new(providers)?;

    tracing::info!(
        chain = %config.chain,
        address = %crate::utils::redact_address(&wallet.address),
        providers = failover.len(),
        "creating wallet manager"
    );

    Ok(match config.chain.family() {
        ChainFamily::Utxo => {
            let builder =
                UtxoTransactionBuilder::new(config.chain, &config.public_key, &wallet.address)?;
            Arc::new(UtxoWalletManager::new(wallet, builder, failover, config.card_id))
        }
        ChainFamily::Binance => {
            let builder =
                BinanceTransactionBuilder::new(config.chain, &config.public_key, config.token)?;
            Arc::new(AccountWalletManager::new(
                wallet,
                builder,
                failover,
                config.card_id,
                Duration::from_secs(config.validity_secs),
            ))
        }
        ChainFamily::Stellar => {
            let builder =
                StellarTransactionBuilder::new(config.chain, &config.public_key, config.token)?;
            Arc::new(AccountWalletManager::new(
                wallet,
                builder,
                failover,
                config.card_id,
                Duration::from_secs(config.validity_secs),
            ))
        }
    })
}

/// Build the manager with the HTTP providers configured for its chain.
pub fn create_with_network_config(
    config: WalletConfig,
    network: &NetworkConfig,
) -> WalletResult<Arc<dyn WalletManager>> {
    let providers = http_providers(config.chain, network)?;
    create_wallet_manager(config, providers)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn wallet_config_derives_address() {
        let config = WalletConfig::new(Chain::Bitcoin, hex::decode(G).unwrap());
        let wallet = config.wallet().unwrap();
        assert_eq!(wallet.address, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert!(wallet.balances.is_empty());
    }

    #[test]
    fn wallet_config_deserializes_with_defaults() {
        let config: WalletConfig =
            serde_json::from_str(&format!(r#"{{"chain":"binance","public_key":"{}"}}"#, G))
                .unwrap();
        assert_eq!(config.chain, Chain::Binance);
        assert_eq!(config.validity_secs, DEFAULT_VALIDITY_SECS);
        assert!(config.token.is_none());
    }

    #[test]
    fn tokens_rejected_on_utxo_chains() {
        let config = WalletConfig::new(Chain::Bitcoin, hex::decode(G).unwrap())
            .with_token(Token::new("X", "X", 8));
        let err = create_wallet_manager(config, Vec::new()).err().unwrap();
        assert_eq!(err.code, crate::error::ErrorCode::Configuration);
    }

    #[test]
    fn empty_provider_list_is_rejected() {
        let config = WalletConfig::new(Chain::Litecoin, hex::decode(G).unwrap());
        assert!(create_wallet_manager(config, Vec::new()).is_err());
    }
}
