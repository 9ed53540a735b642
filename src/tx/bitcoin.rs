//! Bitcoin-family transaction builder
//!
//! Legacy P2PKH spends: one SIGHASH_ALL pre-image per input, signatures
//! compiled into `<der+hashtype> <pubkey>` scriptSigs.

use bitcoin::hashes::{sha256d, Hash};

use crate::error::{WalletError, WalletResult};
use crate::signing::{canonical_der, PreImageHash, SigningAlgorithm};
use crate::tx::SignedTransaction;
use crate::types::Chain;
use crate::wallet::address::{compress_public_key, output_script};
use crate::wallet::utxo::{select_first_fit, UnspentOutput};
use crate::wallet::{AmountKind, TransactionData};

const TX_VERSION: i32 = 1;
const SEQUENCE_FINAL: u32 = 0xffff_ffff;
const SIGHASH_ALL: u32 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

/// Builder state carried from `build_unsigned` to `build_signed`
#[derive(Debug, Clone)]
pub struct UnsignedUtxoTransaction {
    pub inputs: Vec<UnspentOutput>,
    pub outputs: Vec<TxOutput>,
    pub hashes: Vec<PreImageHash>,
    /// Value returned to the source address, 0 when there is no change output
    pub change: u64,
}

pub struct UtxoTransactionBuilder {
    chain: Chain,
    public_key: [u8; 33],
    source_script: Vec<u8>,
}

impl UtxoTransactionBuilder {
    pub fn new(chain: Chain, public_key: &[u8], source_address: &str) -> WalletResult<Self> {
        Ok(Self {
            chain,
            public_key: compress_public_key(public_key)?,
            source_script: output_script(chain, source_address)?,
        })
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Select inputs first-fit and produce one pre-image hash per input.
    pub fn build_unsigned(
        &self,
        transaction: &TransactionData,
        available: &[UnspentOutput],
    ) -> WalletResult<UnsignedUtxoTransaction> {
        if transaction.amount.kind != AmountKind::Coin {
            return Err(WalletError::encoding(format!(
                "{} transfers only move the native coin",
                self.chain
            )));
        }
        let amount = transaction.amount.to_minor_u64()?;
        let fee = transaction.fee.to_minor_u64()?;
        if amount == 0 {
            return Err(WalletError::encoding("Amount must be greater than zero"));
        }
        let target = amount
            .checked_add(fee)
            .ok_or_else(|| WalletError::encoding("Amount overflow"))?;

        let selection = select_first_fit(available, target)?;
        let change = selection.total_value - target;

        let mut outputs = vec![TxOutput {
            value: amount,
            script_pubkey: output_script(self.chain, &transaction.destination_address)?,
        }];
        if change > 0 {
            outputs.push(TxOutput {
                value: change,
                script_pubkey: self.source_script.clone(),
            });
        }

        let hashes = (0..selection.selected.len())
            .map(|index| {
                let hash = legacy_sighash(&selection.selected, &outputs, index)?;
                Ok(PreImageHash::new(hash, SigningAlgorithm::Secp256k1Ecdsa)
                    .with_input_index(index)
                    .with_description(format!("{} input {}", self.chain, index)))
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(UnsignedUtxoTransaction {
            inputs: selection.selected,
            outputs,
            hashes,
            change,
        })
    }

    /// Compile the signed transaction from one raw `r || s` signature per input.
    pub fn build_signed(
        &self,
        unsigned: &UnsignedUtxoTransaction,
        signatures: &[Vec<u8>],
    ) -> WalletResult<SignedTransaction> {
        if signatures.len() != unsigned.inputs.len() {
            return Err(WalletError::encoding(format!(
                "Expected {} signatures, got {}",
                unsigned.inputs.len(),
                signatures.len()
            )));
        }

        let script_sigs = signatures
            .iter()
            .map(|raw| Ok(build_script_sig(&canonical_der(raw)?, &self.public_key)))
            .collect::<WalletResult<Vec<_>>>()?;

        let raw = serialize_transaction(&unsigned.inputs, &unsigned.outputs, |index| {
            script_sigs[index].clone()
        })?;
        let mut txid = sha256d::Hash::hash(&raw).to_byte_array();
        txid.reverse();

        Ok(SignedTransaction {
            raw,
            hash: hex::encode(txid),
        })
    }
}

/// Legacy P2PKH virtual size estimate.
pub fn estimate_size(inputs: usize, outputs: usize) -> u64 {
    10 + 148 * inputs as u64 + 34 * outputs as u64
}

fn legacy_sighash(
    inputs: &[UnspentOutput],
    outputs: &[TxOutput],
    signing_index: usize,
) -> WalletResult<[u8; 32]> {
    let mut preimage = serialize_transaction(inputs, outputs, |index| {
        if index == signing_index {
            inputs[index].output_script.clone()
        } else {
            Vec::new()
        }
    })?;
    preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}

fn serialize_transaction(
    inputs: &[UnspentOutput],
    outputs: &[TxOutput],
    script_for_input: impl Fn(usize) -> Vec<u8>,
) -> WalletResult<Vec<u8>> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&TX_VERSION.to_le_bytes());

    write_var_int(inputs.len() as u64, &mut raw);
    for (index, input) in inputs.iter().enumerate() {
        let mut txid: [u8; 32] = hex::decode(&input.transaction_hash)?
            .try_into()
            .map_err(|_| WalletError::encoding(format!("Invalid txid: {}", input.transaction_hash)))?;
        txid.reverse();
        raw.extend_from_slice(&txid);
        raw.extend_from_slice(&input.output_index.to_le_bytes());

        let script = script_for_input(index);
        write_var_int(script.len() as u64, &mut raw);
        raw.extend_from_slice(&script);
        raw.extend_from_slice(&SEQUENCE_FINAL.to_le_bytes());
    }

    write_var_int(outputs.len() as u64, &mut raw);
    for output in outputs {
        raw.extend_from_slice(&output.value.to_le_bytes());
        write_var_int(output.script_pubkey.len() as u64, &mut raw);
        raw.extend_from_slice(&output.script_pubkey);
    }

    // locktime
    raw.extend_from_slice(&0u32.to_le_bytes());
    Ok(raw)
}

/// `<len> <der || SIGHASH_ALL> <len> <pubkey>`
fn build_script_sig(der: &[u8], public_key: &[u8; 33]) -> Vec<u8> {
    let mut script = Vec::with_capacity(der.len() + public_key.len() + 3);
    script.push((der.len() + 1) as u8);
    script.extend_from_slice(der);
    script.push(SIGHASH_ALL as u8);
    script.push(public_key.len() as u8);
    script.extend_from_slice(public_key);
    script
}

fn write_var_int(value: u64, buf: &mut Vec<u8>) {
    if value < 0xfd {
        buf.push(value as u8);
    } else if value <= 0xffff {
        buf.push(0xfd);
        buf.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        buf.push(0xfe);
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}
