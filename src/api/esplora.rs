//! Esplora REST provider (Blockstream, mempool.space, litecoinspace)

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::api::{AddressInfo, BroadcastAck, NetworkProvider};
use crate::error::{WalletError, WalletResult};
use crate::fees::{FeeEstimate, FeeUnit};
use crate::tx::SignedTransaction;
use crate::types::Chain;
use crate::utils::http::{build_client, send_with_retry, HttpReply};
use crate::utils::{redact_address, HttpSettings};
use crate::wallet::address::output_script;
use crate::wallet::{Amount, AmountKind, UnspentOutput};

/// Node rejections meaning our inputs were already spent
const STALE_INPUT_MARKERS: [&str; 3] = [
    "missingorspent",
    "missing-inputs",
    "txn-mempool-conflict",
];

#[derive(Debug, Deserialize)]
struct RawUtxo {
    txid: String,
    vout: u32,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RawStats {
    tx_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    mempool_stats: RawStats,
}

pub struct EsploraProvider {
    chain: Chain,
    base_url: String,
    client: reqwest::Client,
    http: HttpSettings,
}

impl EsploraProvider {
    pub fn new(chain: Chain, base_url: impl Into<String>, http: &HttpSettings) -> WalletResult<Self> {
        if !chain.is_utxo() {
            return Err(WalletError::configuration(format!("{} is not a UTXO chain", chain)));
        }
        Ok(Self {
            chain,
            base_url: base_url.into(),
            client: build_client(http)?,
            http: http.clone(),
        })
    }

    async fn get(&self, path: &str) -> WalletResult<HttpReply> {
        let url = format!("{}{}", self.base_url, path);
        let reply = send_with_retry(&self.http, &self.base_url, || self.client.get(&url)).await?;
        if !reply.is_success() {
            return Err(reply.status_error(&self.base_url));
        }
        Ok(reply)
    }
}

#[async_trait]
impl NetworkProvider for EsploraProvider {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn get_info(&self, address: &str) -> WalletResult<AddressInfo> {
        debug!(provider = %self.base_url, address = %redact_address(address), "fetching utxos");
        let script = output_script(self.chain, address)?;

        let stats: RawAddress = self.get(&format!("/address/{}", address)).await?.json()?;
        let raw: Vec<RawUtxo> = self.get(&format!("/address/{}/utxo", address)).await?.json()?;

        let total: u64 = raw.iter().map(|utxo| utxo.value).sum();
        let unspent_outputs = raw
            .into_iter()
            .map(|utxo| UnspentOutput {
                transaction_hash: utxo.txid,
                output_index: utxo.vout,
                amount: utxo.value,
                output_script: script.clone(),
            })
            .collect();

        Ok(AddressInfo {
            exists: true,
            balance: Amount::from_minor_units(
                self.chain.symbol(),
                self.chain.decimals(),
                u128::from(total),
                AmountKind::Coin,
            ),
            token_balances: HashMap::new(),
            reserve: None,
            new_account_minimum: None,
            unspent_outputs,
            account: None,
            has_unconfirmed: stats.mempool_stats.tx_count > 0,
        })
    }

    async fn get_fee(&self) -> WalletResult<FeeEstimate> {
        let estimates: HashMap<String, f64> = self.get("/fee-estimates").await?.json()?;
        let rate = |target: &str| -> WalletResult<u64> {
            estimates
                .get(target)
                .map(|sat_per_vb| (sat_per_vb.ceil() as u64).max(1))
                .ok_or_else(|| {
                    WalletError::network("Malformed provider response")
                        .with_details(format!("no fee estimate for {} blocks", target))
                })
        };

        Ok(FeeEstimate {
            unit: FeeUnit::PerByte,
            minimal: rate("144")?,
            normal: rate("6")?,
            priority: rate("1")?,
        }
        .ordered())
    }

    async fn broadcast(&self, transaction: &SignedTransaction) -> WalletResult<BroadcastAck> {
        let url = format!("{}/tx", self.base_url);
        let body = hex::encode(&transaction.raw);
        let reply = send_with_retry(&self.http, &self.base_url, || {
            self.client
                .post(&url)
                .header("Content-Type", "text/plain")
                .body(body.clone())
        })
        .await?;

        if reply.is_success() {
            return Ok(BroadcastAck {
                hash: reply.body.trim().to_string(),
            });
        }
        if reply.status == 400 && STALE_INPUT_MARKERS.iter().any(|m| reply.body.contains(m)) {
            return Err(WalletError::stale_state("Transaction inputs are already spent")
                .with_details(reply.body));
        }
        Err(reply.status_error(&self.base_url))
    }
}
