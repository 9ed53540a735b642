//! Manager for account/sequence chains (Binance Chain, Stellar)

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::api::{token_key, AddressInfo, FailoverCoordinator, NetworkProvider};
use crate::error::{WalletError, WalletResult};
use crate::fees::{Fee, FeeEstimate};
use crate::manager::shared::ManagerCore;
use crate::manager::{ManagerState, SendResult, WalletManager};
use crate::signing::TransactionSigner;
use crate::tx::{AccountBuildContext, AccountTransactionBuilder};
use crate::types::Chain;
use crate::wallet::address::{decode_address, validate_address};
use crate::wallet::{AccountState, Amount, AmountKind, Decimal, TransactionData, Wallet};

/// Account state captured by `update()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccountSnapshot {
    /// `None` while the account is not activated on chain
    account: Option<AccountState>,
    has_trustline: bool,
    /// Smallest amount that activates a destination account
    new_account_minimum: Option<Amount>,
}

pub struct AccountWalletManager<B: AccountTransactionBuilder> {
    core: ManagerCore<AccountSnapshot>,
    builder: B,
    provider: FailoverCoordinator,
    validity: Duration,
}

impl<B: AccountTransactionBuilder> AccountWalletManager<B> {
    pub fn new(
        wallet: Wallet,
        builder: B,
        provider: FailoverCoordinator,
        card_id: Option<String>,
        validity: Duration,
    ) -> Self {
        Self {
            core: ManagerCore::new(wallet, card_id),
            builder,
            provider,
            validity,
        }
    }

    /// Account number and sequence captured by the last update.
    pub fn account_state(&self) -> Option<AccountState> {
        self.core.captured().and_then(|snapshot| snapshot.account)
    }

    fn apply_info(wallet: &mut Wallet, info: AddressInfo) -> AccountSnapshot {
        let chain = wallet.chain;
        wallet.set_balance(info.balance);

        let mut has_trustline = false;
        if let Some(token) = wallet.token.clone() {
            let held = info.token_balances.get(&token_key(chain, &token));
            has_trustline = held.is_some();
            let value = held.map(|amount| amount.value).unwrap_or(Decimal::ZERO);
            wallet.set_balance(Amount::token(&token, value));
        }
        match info.reserve {
            Some(reserve) => wallet.set_balance(reserve),
            None => {
                wallet.balances.remove(&AmountKind::Reserve);
            }
        }
        if !info.has_unconfirmed {
            wallet.pending_transactions.clear();
        }

        AccountSnapshot {
            account: info.account.filter(|_| info.exists),
            has_trustline,
            new_account_minimum: info.new_account_minimum,
        }
    }

    /// Amount plus fee must be covered by the balances from the last update.
    fn check_funds(
        &self,
        transaction: &TransactionData,
        snapshot: &AccountSnapshot,
    ) -> WalletResult<()> {
        let wallet = self.core.wallet();
        let coin = wallet.coin_balance();
        // Stellar locks the reserve; it cannot be spent.
        let spendable = match wallet.balance(AmountKind::Reserve) {
            Some(reserve) => coin.saturating_sub(reserve)?,
            None => coin,
        };

        let coin_needed = match transaction.amount.kind {
            AmountKind::Coin if !transaction.is_trustline_opt_in() => transaction.total_spent()?,
            _ => transaction.fee.clone(),
        };
        if coin_needed.value > spendable.value {
            return Err(WalletError::insufficient_funds(format!(
                "Need {}, have {} available",
                coin_needed, spendable
            )));
        }

        // Opening a trust line moves no tokens.
        if transaction.amount.kind == AmountKind::Token && !transaction.is_trustline_opt_in() {
            if !snapshot.has_trustline {
                return Err(WalletError::insufficient_funds(format!(
                    "No trust line for {}, opt in before sending it",
                    transaction.amount.currency_symbol
                )));
            }
            let held = wallet.token_balance().map(|amount| amount.value).unwrap_or_default();
            if transaction.amount.value > held {
                return Err(WalletError::insufficient_funds(format!(
                    "Need {}, have {} {}",
                    transaction.amount, held, transaction.amount.currency_symbol
                )));
            }
        }
        Ok(())
    }

    /// A new account must start with at least the chain's minimum balance.
    fn check_account_creation(
        &self,
        transaction: &TransactionData,
        snapshot: &AccountSnapshot,
    ) -> WalletResult<()> {
        if transaction.amount.kind != AmountKind::Coin {
            return Ok(());
        }
        let minimum = match &snapshot.new_account_minimum {
            Some(minimum) => Some(minimum.value),
            None => self
                .core
                .wallet()
                .balance(AmountKind::Reserve)
                .map(|reserve| reserve.value),
        };
        match minimum {
            Some(minimum) if transaction.amount.value < minimum => {
                Err(WalletError::insufficient_funds(format!(
                    "Not enough {} to create the destination account: need at least {}",
                    transaction.amount.currency_symbol, minimum
                )))
            }
            _ => Ok(()),
        }
    }

    async fn build_sign_broadcast(
        &self,
        transaction: &TransactionData,
        snapshot: &AccountSnapshot,
        signer: &dyn TransactionSigner,
    ) -> WalletResult<String> {
        self.core.check_transaction(transaction)?;
        let account = snapshot
            .account
            .ok_or_else(|| WalletError::insufficient_funds("Account is not activated"))?;
        self.check_funds(transaction, snapshot)?;

        let opt_in = transaction.is_trustline_opt_in();
        if !opt_in {
            decode_address(self.core.chain(), &transaction.destination_address)?;
        }
        let destination_exists = if self.builder.needs_destination_lookup() && !opt_in {
            self.provider
                .account_exists(&transaction.destination_address)
                .await?
        } else {
            true
        };
        if !destination_exists {
            self.check_account_creation(transaction, snapshot)?;
        }
        let valid_until = (chrono::Utc::now()
            + chrono::Duration::seconds(self.validity.as_secs() as i64))
        .timestamp()
        .max(0) as u64;

        let context = AccountBuildContext {
            account,
            destination_exists,
            has_trustline: snapshot.has_trustline,
            valid_until,
        };
        let (hash, unsigned) = self.builder.build_unsigned(transaction, &context)?;
        debug!(
            chain = %self.builder.chain(),
            sequence = account.sequence,
            destination_exists,
            "built unsigned transaction"
        );

        let signatures = self.core.sign(signer, std::slice::from_ref(&hash)).await?;
        let signed = self.builder.build_signed(&unsigned, &signatures[0])?;
        let ack = self.provider.broadcast(&signed).await?;
        Ok(ack.hash)
    }
}

#[async_trait]
impl<B: AccountTransactionBuilder> WalletManager for AccountWalletManager<B> {
    fn chain(&self) -> Chain {
        self.core.chain()
    }

    fn wallet(&self) -> Wallet {
        self.core.wallet()
    }

    fn state(&self) -> ManagerState {
        self.core.state()
    }

    fn fee_estimate(&self) -> Option<FeeEstimate> {
        self.core.fee_estimate()
    }

    async fn update(&self) -> WalletResult<()> {
        self.core.begin_update();
        let address = self.core.address();
        let info = match self.provider.get_info(&address).await {
            Ok(info) => info,
            Err(error) => return Err(self.core.fail_update(error)),
        };
        let estimate = match self.provider.get_fee().await {
            Ok(estimate) => estimate,
            Err(error) => return Err(self.core.fail_update(error)),
        };
        if let Some(account) = info.account {
            debug!(
                chain = %self.chain(),
                account_number = account.account_number,
                sequence = account.sequence,
                "captured account state"
            );
        }
        self.core.commit_update(estimate, |wallet| Self::apply_info(wallet, info));
        Ok(())
    }

    async fn get_fee(&self, _amount: &Amount, destination: &str) -> WalletResult<Fee> {
        if !validate_address(self.chain(), destination) {
            return Err(WalletError::encoding(format!(
                "Invalid {} address: {}",
                self.chain(),
                destination
            )));
        }
        let estimate = self.provider.get_fee().await?;
        // one operation per transaction
        estimate.to_fee(self.chain(), 1)
    }

    async fn send(
        &self,
        transaction: TransactionData,
        signer: &dyn TransactionSigner,
    ) -> WalletResult<SendResult> {
        let (_guard, snapshot) = self.core.begin_send()?;

        match self.build_sign_broadcast(&transaction, &snapshot, signer).await {
            Ok(hash) => {
                // The sequence is spent; the next send needs a fresh update.
                self.core.complete_send(transaction, &hash, |captured| *captured = None);
                Ok(SendResult { hash })
            }
            Err(error) => Err(self.core.fail_send(error)),
        }
    }

    fn cancel_signing(&self) {
        self.core.cancel_signing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Token;
    use std::collections::HashMap;

    fn stellar_wallet(token: Option<Token>) -> Wallet {
        Wallet::new(Chain::Stellar, "GABC".into(), vec![1; 32], token)
    }

    fn xlm(value: &str) -> Amount {
        Amount::parse_coin(Chain::Stellar, value).unwrap()
    }

    fn info(balance: &str) -> AddressInfo {
        AddressInfo {
            exists: true,
            balance: xlm(balance),
            token_balances: HashMap::new(),
            reserve: None,
            new_account_minimum: None,
            unspent_outputs: Vec::new(),
            account: Some(AccountState {
                account_number: 0,
                sequence: 41,
            }),
            has_unconfirmed: false,
        }
    }

    type StellarManager = AccountWalletManager<crate::tx::StellarTransactionBuilder>;

    #[test]
    fn apply_info_relabels_token_balance() {
        let issuer = crate::wallet::address::encode_stellar_address(&[7; 32]);
        let token = Token::new("USDC", issuer.clone(), 7);
        let mut wallet = stellar_wallet(Some(token.clone()));

        let mut fresh = info("10");
        fresh.token_balances.insert(
            format!("USDC:{}", issuer),
            Amount::new("USDC", 7, "12.5".parse().unwrap(), AmountKind::Token),
        );
        fresh.reserve = Some(Amount::new("XLM", 7, "1.5".parse().unwrap(), AmountKind::Reserve));

        let snapshot = StellarManager::apply_info(&mut wallet, fresh);
        assert!(snapshot.has_trustline);
        assert_eq!(snapshot.account.unwrap().sequence, 41);
        assert_eq!(wallet.token_balance().unwrap(), Amount::token(&token, "12.5".parse().unwrap()));
        assert_eq!(wallet.balance(AmountKind::Reserve).unwrap().value.to_string(), "1.5");
    }

    #[test]
    fn apply_info_without_trustline_zeroes_token() {
        let token = Token::new("USDC", crate::wallet::address::encode_stellar_address(&[7; 32]), 7);
        let mut wallet = stellar_wallet(Some(token));
        let snapshot = StellarManager::apply_info(&mut wallet, info("3"));
        assert!(!snapshot.has_trustline);
        assert!(wallet.token_balance().unwrap().is_zero());
    }

    #[test]
    fn missing_account_captures_no_state() {
        let mut wallet = stellar_wallet(None);
        let snapshot = StellarManager::apply_info(&mut wallet, AddressInfo::missing(Chain::Stellar));
        assert!(snapshot.account.is_none());
        assert!(wallet.coin_balance().is_zero());
    }
}
