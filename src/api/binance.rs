//! Binance Chain DEX REST provider

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::api::{AddressInfo, BroadcastAck, NetworkProvider};
use crate::error::{WalletError, WalletResult};
use crate::fees::{FeeEstimate, FeeUnit};
use crate::tx::SignedTransaction;
use crate::types::{Chain, ChainFamily};
use crate::utils::http::{build_client, send_with_retry, HttpReply};
use crate::utils::{redact_address, HttpSettings};
use crate::wallet::{AccountState, Amount, AmountKind, Decimal};

const NATIVE_SYMBOL: &str = "BNB";
/// All BEP2 assets use 8 decimals
const BEP2_DECIMALS: u8 = 8;

#[derive(Debug, Deserialize)]
struct RawBalance {
    symbol: String,
    free: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    account_number: u64,
    sequence: u64,
    #[serde(default)]
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawFixedFee {
    msg_type: String,
    fee: u64,
}

#[derive(Debug, Deserialize)]
struct RawFeeEntry {
    fixed_fee_params: Option<RawFixedFee>,
}

#[derive(Debug, Deserialize)]
struct RawBroadcastResult {
    hash: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawError {
    #[serde(default)]
    message: String,
}

pub struct BinanceProvider {
    chain: Chain,
    base_url: String,
    client: reqwest::Client,
    http: HttpSettings,
}

impl BinanceProvider {
    pub fn new(chain: Chain, base_url: impl Into<String>, http: &HttpSettings) -> WalletResult<Self> {
        if chain.family() != ChainFamily::Binance {
            return Err(WalletError::configuration(format!("{} is not Binance Chain", chain)));
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
        send_with_retry(&self.http, &self.base_url, || self.client.get(&url)).await
    }
}

#[async_trait]
impl NetworkProvider for BinanceProvider {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn get_info(&self, address: &str) -> WalletResult<AddressInfo> {
        debug!(provider = %self.base_url, address = %redact_address(address), "fetching account");
        let reply = self.get(&format!("/api/v1/account/{}", address)).await?;
        if reply.status == 404 {
            return Ok(AddressInfo::missing(self.chain));
        }
        if !reply.is_success() {
            return Err(reply.status_error(&self.base_url));
        }
        let account: RawAccount = reply.json()?;

        let mut balance = Amount::coin(self.chain, Decimal::ZERO);
        let mut token_balances = HashMap::new();
        for entry in account.balances {
            if entry.symbol == NATIVE_SYMBOL {
                balance = Amount::coin(self.chain, entry.free);
            } else {
                let amount =
                    Amount::new(entry.symbol.clone(), BEP2_DECIMALS, entry.free, AmountKind::Token);
                token_balances.insert(entry.symbol, amount);
            }
        }

        Ok(AddressInfo {
            exists: true,
            balance,
            token_balances,
            reserve: None,
            new_account_minimum: None,
            unspent_outputs: Vec::new(),
            account: Some(AccountState {
                account_number: account.account_number,
                sequence: account.sequence,
            }),
            has_unconfirmed: false,
        })
    }

    async fn get_fee(&self) -> WalletResult<FeeEstimate> {
        let reply = self.get("/api/v1/fees").await?;
        if !reply.is_success() {
            return Err(reply.status_error(&self.base_url));
        }
        let entries: Vec<RawFeeEntry> = reply.json()?;
        entries
            .into_iter()
            .filter_map(|entry| entry.fixed_fee_params)
            .find(|params| params.msg_type == "send")
            .map(|params| FeeEstimate::flat(FeeUnit::PerTransaction, params.fee))
            .ok_or_else(|| {
                WalletError::network("Malformed provider response")
                    .with_details("no transfer fee in fee schedule")
            })
    }

    async fn broadcast(&self, transaction: &SignedTransaction) -> WalletResult<BroadcastAck> {
        let url = format!("{}/api/v1/broadcast?sync=true", self.base_url);
        let body = hex::encode(&transaction.raw);
        let reply = send_with_retry(&self.http, &self.base_url, || {
            self.client
                .post(&url)
                .header("Content-Type", "text/plain")
                .body(body.clone())
        })
        .await?;

        if reply.is_success() {
            let results: Vec<RawBroadcastResult> = reply.json()?;
            let hash = results
                .into_iter()
                .next()
                .map(|result| result.hash)
                .unwrap_or_else(|| transaction.hash.clone());
            return Ok(BroadcastAck { hash });
        }
        if (400..500).contains(&reply.status) {
            let error: RawError = serde_json::from_str(&reply.body).unwrap_or_default();
            if error.message.to_ascii_lowercase().contains("sequence") {
                return Err(WalletError::stale_state("Account sequence changed")
                    .with_details(error.message));
            }
        }
        Err(reply.status_error(&self.base_url))
    }
}
