//! API Module
//!
//! Chain data providers behind one [`NetworkProvider`] trait, and the
//! [`FailoverCoordinator`] that rotates between them.

pub mod binance;
pub mod esplora;
pub mod failover;
pub mod horizon;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::WalletResult;
use crate::fees::FeeEstimate;
use crate::tx::SignedTransaction;
use crate::types::{Chain, ChainFamily, Token};
use crate::utils::NetworkConfig;
use crate::wallet::{AccountState, Amount, UnspentOutput};

pub use failover::FailoverCoordinator;

/// Normalized view of an address, independent of the provider API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Whether the account is active on chain (always true for UTXO chains)
    pub exists: bool,
    pub balance: Amount,
    /// Keyed by [`token_key`]
    pub token_balances: HashMap<String, Amount>,
    /// Minimum balance the chain locks (Stellar base reserve)
    pub reserve: Option<Amount>,
    /// Smallest starting balance that activates a new account
    #[serde(default)]
    pub new_account_minimum: Option<Amount>,
    pub unspent_outputs: Vec<UnspentOutput>,
    pub account: Option<AccountState>,
    /// Unconfirmed activity touching the address is still pending
    pub has_unconfirmed: bool,
}

impl AddressInfo {
    /// Info for an address the chain has never seen.
    pub fn missing(chain: Chain) -> Self {
        Self {
            exists: false,
            balance: Amount::coin(chain, Default::default()),
            token_balances: HashMap::new(),
            reserve: None,
            new_account_minimum: None,
            unspent_outputs: Vec::new(),
            account: None,
            has_unconfirmed: false,
        }
    }
}

/// Provider acknowledgement of an accepted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastAck {
    pub hash: String,
}

/// Key a token balance is reported under.
pub fn token_key(chain: Chain, token: &Token) -> String {
    match chain.family() {
        ChainFamily::Stellar => format!("{}:{}", token.symbol, token.contract_address),
        _ => token.contract_address.clone(),
    }
}

#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Endpoint label used in logs
    fn name(&self) -> &str;

    async fn get_info(&self, address: &str) -> WalletResult<AddressInfo>;

    async fn get_fee(&self) -> WalletResult<FeeEstimate>;

    async fn broadcast(&self, transaction: &SignedTransaction) -> WalletResult<BroadcastAck>;

    async fn account_exists(&self, address: &str) -> WalletResult<bool> {
        Ok(self.get_info(address).await?.exists)
    }
}

/// HTTP providers for `chain`, in configured failover order.
pub fn http_providers(
    chain: Chain,
    config: &NetworkConfig,
) -> WalletResult<Vec<Arc<dyn NetworkProvider>>> {
    config
        .endpoints_for(chain)?
        .into_iter()
        .map(|endpoint| -> WalletResult<Arc<dyn NetworkProvider>> {
            let base = endpoint.as_str().trim_end_matches('/').to_string();
            Ok(match chain.family() {
                ChainFamily::Utxo => {
                    Arc::new(esplora::EsploraProvider::new(chain, base, &config.http)?)
                }
                ChainFamily::Binance => {
                    Arc::new(binance::BinanceProvider::new(chain, base, &config.http)?)
                }
                ChainFamily::Stellar => {
                    Arc::new(horizon::HorizonProvider::new(chain, base, &config.http)?)
                }
            })
        })
        .collect()
}
