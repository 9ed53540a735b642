//! Manager for Bitcoin-family wallets

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

use crate::api::{FailoverCoordinator, NetworkProvider};
use crate::error::WalletResult;
use crate::fees::{Fee, FeeEstimate};
use crate::manager::shared::ManagerCore;
use crate::manager::{ManagerState, SendResult, WalletManager};
use crate::signing::TransactionSigner;
use crate::tx::bitcoin::estimate_size;
use crate::tx::UtxoTransactionBuilder;
use crate::types::Chain;
use crate::wallet::address::output_script;
use crate::wallet::utxo::MAX_INPUTS_PER_TRANSACTION;
use crate::wallet::{Amount, TransactionData, UnspentOutput, Wallet};

/// Recipient plus change
const FEE_ESTIMATE_OUTPUTS: usize = 2;

pub struct UtxoWalletManager {
    core: ManagerCore<Vec<UnspentOutput>>,
    builder: UtxoTransactionBuilder,
    provider: FailoverCoordinator,
}

impl UtxoWalletManager {
    pub fn new(
        wallet: Wallet,
        builder: UtxoTransactionBuilder,
        provider: FailoverCoordinator,
        card_id: Option<String>,
    ) -> Self {
        Self {
            core: ManagerCore::new(wallet, card_id),
            builder,
            provider,
        }
    }

    /// Unspent outputs captured by the last update, minus those already spent.
    pub fn unspent_outputs(&self) -> Vec<UnspentOutput> {
        self.core.captured().unwrap_or_default()
    }

    async fn build_sign_broadcast(
        &self,
        transaction: &TransactionData,
        available: &[UnspentOutput],
        signer: &dyn TransactionSigner,
    ) -> WalletResult<(String, HashSet<String>)> {
        self.core.check_transaction(transaction)?;
        let unsigned = self.builder.build_unsigned(transaction, available)?;
        debug!(
            chain = %self.builder.chain(),
            inputs = unsigned.inputs.len(),
            outputs = unsigned.outputs.len(),
            change = unsigned.change,
            "built unsigned transaction"
        );

        let signatures = self.core.sign(signer, &unsigned.hashes).await?;
        let signed = self.builder.build_signed(&unsigned, &signatures)?;
        let ack = self.provider.broadcast(&signed).await?;

        let spent = unsigned.inputs.iter().map(UnspentOutput::key).collect();
        Ok((ack.hash, spent))
    }
}

/// Inputs a first-fit selection would take to cover `target`.
fn inputs_needed(outputs: &[UnspentOutput], target: u64) -> usize {
    let mut total = 0u64;
    for (index, output) in outputs.iter().enumerate() {
        total = total.saturating_add(output.amount);
        if total >= target {
            return index + 1;
        }
    }
    outputs.len().clamp(1, MAX_INPUTS_PER_TRANSACTION)
}

#[async_trait]
impl WalletManager for UtxoWalletManager {
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

        self.core.commit_update(estimate, |wallet| {
            wallet.set_balance(info.balance);
            if !info.has_unconfirmed {
                wallet.pending_transactions.clear();
            }
            info.unspent_outputs
        });
        Ok(())
    }

    async fn get_fee(&self, amount: &Amount, destination: &str) -> WalletResult<Fee> {
        output_script(self.chain(), destination)?;
        let estimate = self.provider.get_fee().await?;
        let inputs = inputs_needed(&self.unspent_outputs(), amount.to_minor_u64()?);
        estimate.to_fee(self.chain(), estimate_size(inputs, FEE_ESTIMATE_OUTPUTS))
    }

    async fn send(
        &self,
        transaction: TransactionData,
        signer: &dyn TransactionSigner,
    ) -> WalletResult<SendResult> {
        let (_guard, available) = self.core.begin_send()?;

        match self.build_sign_broadcast(&transaction, &available, signer).await {
            Ok((hash, spent)) => {
                self.core.complete_send(transaction, &hash, |captured| {
                    if let Some(outputs) = captured {
                        outputs.retain(|output| !spent.contains(&output.key()));
                    }
                });
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

    fn output(amount: u64) -> UnspentOutput {
        UnspentOutput {
            transaction_hash: "00".repeat(32),
            output_index: 0,
            amount,
            output_script: Vec::new(),
        }
    }

    #[test]
    fn inputs_needed_follows_first_fit() {
        let outputs = [output(300), output(200), output(500)];
        assert_eq!(inputs_needed(&outputs, 100), 1);
        assert_eq!(inputs_needed(&outputs, 450), 2);
        assert_eq!(inputs_needed(&outputs, 1_000), 3);
    }

    #[test]
    fn inputs_needed_is_at_least_one() {
        assert_eq!(inputs_needed(&[], 1), 1);
        assert_eq!(inputs_needed(&[output(1)], 10), 1);
    }
}
