//! Network configuration
//!
//! Ordered provider endpoints per chain plus HTTP transport settings. The
//! first endpoint of a chain is the initially active provider; the rest are
//! failover targets in order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

use crate::error::{WalletError, WalletResult};
use crate::types::Chain;

/// HTTP transport settings shared by all providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Extra attempts after a connect/timeout error, within one provider
    pub transport_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 10,
            transport_retries: 2,
            backoff_base_ms: 200,
            backoff_max_ms: 2_000,
            user_agent: concat!("cardwallet/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub http: HttpSettings,
    pub endpoints: HashMap<Chain, Vec<String>>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let mut endpoints = HashMap::new();
        let mut add = |chain: Chain, urls: &[&str]| {
            endpoints.insert(chain, urls.iter().map(|u| u.to_string()).collect::<Vec<_>>());
        };

        add(Chain::Bitcoin, &["https://blockstream.info/api", "https://mempool.space/api"]);
        add(
            Chain::BitcoinTestnet,
            &["https://blockstream.info/testnet/api", "https://mempool.space/testnet/api"],
        );
        add(Chain::Litecoin, &["https://litecoinspace.org/api"]);
        add(Chain::Binance, &["https://dex.binance.org", "https://dex-asiapacific.binance.org"]);
        add(Chain::BinanceTestnet, &["https://testnet-dex.binance.org"]);
        add(Chain::Stellar, &["https://horizon.stellar.org", "https://horizon.stellar.lobstr.co"]);
        add(Chain::StellarTestnet, &["https://horizon-testnet.stellar.org"]);

        Self {
            http: HttpSettings::default(),
            endpoints,
        }
    }
}

impl NetworkConfig {
    /// Parse a JSON document; chains it lists replace the default endpoints.
    pub fn from_json(json: &str) -> WalletResult<Self> {
        let parsed: NetworkConfig = serde_json::from_str(json)
            .map_err(|e| WalletError::configuration(format!("Invalid network config: {}", e)))?;

        let mut config = NetworkConfig {
            http: parsed.http,
            ..NetworkConfig::default()
        };
        config.endpoints.extend(parsed.endpoints);
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> WalletResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            WalletError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.http.timeout_secs == 0 {
            return Err(WalletError::configuration("HTTP timeout must be positive"));
        }
        for urls in self.endpoints.values() {
            for url in urls {
                validate_endpoint(url)?;
            }
        }
        Ok(())
    }

    /// Validated endpoints for `chain`, in failover order.
    pub fn endpoints_for(&self, chain: Chain) -> WalletResult<Vec<Url>> {
        let urls = self.endpoints.get(&chain).map(Vec::as_slice).unwrap_or_default();
        if urls.is_empty() {
            return Err(WalletError::configuration(format!(
                "No provider endpoints configured for {}",
                chain
            )));
        }
        urls.iter().map(|url| validate_endpoint(url)).collect()
    }
}

/// Parse and check a provider endpoint URL.
///
/// HTTPS is required for remote hosts; plain HTTP is accepted for local
/// development nodes only. Credentials in the URL are rejected.
pub fn validate_endpoint(url: &str) -> WalletResult<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| WalletError::configuration(format!("Invalid URL '{}': {}", url, e)))?;

    match parsed.scheme() {
        "https" => {}
        "http" => {
            let local = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
            if !local {
                return Err(WalletError::configuration(format!(
                    "HTTPS required for remote endpoint {}",
                    url
                )));
            }
        }
        other => {
            return Err(WalletError::configuration(format!(
                "Unsupported URL scheme: {}",
                other
            )))
        }
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(WalletError::configuration(
            "Credentials in endpoint URLs are not allowed",
        ));
    }

    Ok(parsed)
}
