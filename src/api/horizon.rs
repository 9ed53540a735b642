//! Stellar Horizon REST provider

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
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

/// Every account keeps two base reserves plus one per subentry.
const BASE_RESERVE_MULTIPLIER: u64 = 2;

#[derive(Debug, Deserialize)]
struct RawBalance {
    balance: Decimal,
    asset_type: String,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    sequence: String,
    #[serde(default)]
    subentry_count: u64,
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawLedger {
    base_reserve_in_stroops: u64,
}

#[derive(Debug, Deserialize)]
struct RawLedgerRecords {
    records: Vec<RawLedger>,
}

#[derive(Debug, Deserialize)]
struct RawLedgerPage {
    #[serde(rename = "_embedded")]
    embedded: RawLedgerRecords,
}

#[derive(Debug, Deserialize)]
struct RawFeeCharged {
    min: String,
    mode: String,
    p90: String,
}

#[derive(Debug, Deserialize)]
struct RawFeeStats {
    fee_charged: RawFeeCharged,
}

#[derive(Debug, Deserialize)]
struct RawSubmitted {
    hash: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawResultCodes {
    #[serde(default)]
    transaction: String,
    #[serde(default)]
    operations: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtras {
    #[serde(default)]
    result_codes: RawResultCodes,
}

#[derive(Debug, Default, Deserialize)]
struct RawSubmitError {
    #[serde(default)]
    extras: RawExtras,
}

pub struct HorizonProvider {
    chain: Chain,
    base_url: String,
    client: reqwest::Client,
    http: HttpSettings,
}

impl HorizonProvider {
    pub fn new(chain: Chain, base_url: impl Into<String>, http: &HttpSettings) -> WalletResult<Self> {
        if chain.family() != ChainFamily::Stellar {
            return Err(WalletError::configuration(format!("{} is not Stellar", chain)));
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

    async fn fetch_account(&self, address: &str) -> WalletResult<Option<RawAccount>> {
        let reply = self.get(&format!("/accounts/{}", address)).await?;
        if reply.status == 404 {
            return Ok(None);
        }
        if !reply.is_success() {
            return Err(reply.status_error(&self.base_url));
        }
        Ok(Some(reply.json()?))
    }

    async fn base_reserve(&self) -> WalletResult<u64> {
        let reply = self.get("/ledgers?order=desc&limit=1").await?;
        if !reply.is_success() {
            return Err(reply.status_error(&self.base_url));
        }
        let page: RawLedgerPage = reply.json()?;
        page.embedded
            .records
            .first()
            .map(|ledger| ledger.base_reserve_in_stroops)
            .ok_or_else(|| {
                WalletError::network("Malformed provider response").with_details("no ledgers")
            })
    }
}

fn parse_stroops(value: &str) -> WalletResult<u64> {
    value.parse().map_err(|_| {
        WalletError::network("Malformed provider response")
            .with_details(format!("invalid fee value '{}'", value))
    })
}

#[async_trait]
impl NetworkProvider for HorizonProvider {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn get_info(&self, address: &str) -> WalletResult<AddressInfo> {
        debug!(provider = %self.base_url, address = %redact_address(address), "fetching account");
        let account = match self.fetch_account(address).await? {
            Some(account) => account,
            None => return Ok(AddressInfo::missing(self.chain)),
        };
        let base_reserve = self.base_reserve().await?;

        let sequence = account.sequence.parse::<u64>().map_err(|_| {
            WalletError::network("Malformed provider response")
                .with_details(format!("invalid sequence '{}'", account.sequence))
        })?;

        let mut balance = Amount::coin(self.chain, Decimal::ZERO);
        let mut token_balances = HashMap::new();
        for entry in account.balances {
            match (entry.asset_type.as_str(), entry.asset_code, entry.asset_issuer) {
                ("native", _, _) => balance = Amount::coin(self.chain, entry.balance),
                (_, Some(code), Some(issuer)) => {
                    let amount = Amount::new(
                        code.clone(),
                        self.chain.decimals(),
                        entry.balance,
                        AmountKind::Token,
                    );
                    token_balances.insert(format!("{}:{}", code, issuer), amount);
                }
                // liquidity pool shares carry no code/issuer
                _ => {}
            }
        }

        let reserve_stroops =
            (BASE_RESERVE_MULTIPLIER + account.subentry_count).saturating_mul(base_reserve);
        let reserve = Amount::from_minor_units(
            self.chain.symbol(),
            self.chain.decimals(),
            u128::from(reserve_stroops),
            AmountKind::Reserve,
        );
        let new_account_minimum = Amount::from_minor_units(
            self.chain.symbol(),
            self.chain.decimals(),
            u128::from(BASE_RESERVE_MULTIPLIER.saturating_mul(base_reserve)),
            AmountKind::Coin,
        );

        Ok(AddressInfo {
            exists: true,
            balance,
            token_balances,
            reserve: Some(reserve),
            new_account_minimum: Some(new_account_minimum),
            unspent_outputs: Vec::new(),
            account: Some(AccountState {
                account_number: 0,
                sequence,
            }),
            has_unconfirmed: false,
        })
    }

    async fn get_fee(&self) -> WalletResult<FeeEstimate> {
        let reply = self.get("/fee_stats").await?;
        if !reply.is_success() {
            return Err(reply.status_error(&self.base_url));
        }
        let stats: RawFeeStats = reply.json()?;
        Ok(FeeEstimate {
            unit: FeeUnit::PerOperation,
            minimal: parse_stroops(&stats.fee_charged.min)?,
            normal: parse_stroops(&stats.fee_charged.mode)?,
            priority: parse_stroops(&stats.fee_charged.p90)?,
        }
        .ordered())
    }

    async fn broadcast(&self, transaction: &SignedTransaction) -> WalletResult<BroadcastAck> {
        let url = format!("{}/transactions", self.base_url);
        let envelope = STANDARD.encode(&transaction.raw);
        let reply = send_with_retry(&self.http, &self.base_url, || {
            self.client.post(&url).form(&[("tx", envelope.as_str())])
        })
        .await?;

        if reply.is_success() {
            let submitted: RawSubmitted = reply.json()?;
            return Ok(BroadcastAck { hash: submitted.hash });
        }
        if reply.status == 400 {
            let error: RawSubmitError = serde_json::from_str(&reply.body).unwrap_or_default();
            let codes = error.extras.result_codes;
            let summary = std::iter::once(codes.transaction.clone())
                .chain(codes.operations)
                .filter(|code| !code.is_empty())
                .collect::<Vec<_>>()
                .join("/");
            if codes.transaction == "tx_bad_seq" {
                return Err(WalletError::stale_state("Account sequence changed").with_details(summary));
            }
            if !summary.is_empty() {
                return Err(WalletError::rejected("Transaction rejected").with_details(summary));
            }
        }
        Err(reply.status_error(&self.base_url))
    }

    async fn account_exists(&self, address: &str) -> WalletResult<bool> {
        Ok(self.fetch_account(address).await?.is_some())
    }
}
