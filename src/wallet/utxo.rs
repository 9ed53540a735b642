//! Unspent outputs and first-fit coin selection

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};

/// Maximum inputs per transaction; the signing card accepts at most this
/// many hashes in one session.
pub const MAX_INPUTS_PER_TRANSACTION: usize = 10;

/// Spendable output owned by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Funding transaction id, hex in display (big-endian) order
    pub transaction_hash: String,
    pub output_index: u32,
    /// Value in minor units (satoshis)
    pub amount: u64,
    /// Locking script of the output
    #[serde(with = "hex_bytes")]
    pub output_script: Vec<u8>,
}

impl UnspentOutput {
    /// Outpoint key for indexing
    pub fn key(&self) -> String {
        format!("{}:{}", self.transaction_hash, self.output_index)
    }
}

/// Result of coin selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSelection {
    pub selected: Vec<UnspentOutput>,
    pub total_value: u64,
}

/// Walk `outputs` in order, accumulating until `target` (amount + fee) is
/// covered.
pub fn select_first_fit(outputs: &[UnspentOutput], target: u64) -> WalletResult<UtxoSelection> {
    let mut selected = Vec::new();
    let mut total_value: u64 = 0;

    for output in outputs {
        if total_value >= target {
            break;
        }
        total_value = total_value.saturating_add(output.amount);
        selected.push(output.clone());
    }

    if total_value < target {
        return Err(WalletError::insufficient_funds(format!(
            "Need {} sats, have {} sats",
            target, total_value
        )));
    }
    if selected.len() > MAX_INPUTS_PER_TRANSACTION {
        return Err(WalletError::too_many_inputs(format!(
            "Transaction needs {} inputs, at most {} can be signed at once",
            selected.len(),
            MAX_INPUTS_PER_TRANSACTION
        )));
    }

    Ok(UtxoSelection { selected, total_value })
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}
