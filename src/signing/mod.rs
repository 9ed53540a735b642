//! External signing
//!
//! Private keys never enter this crate. Builders produce [`PreImageHash`]es,
//! a [`TransactionSigner`] (typically a hardware card) returns one raw
//! signature per hash, and builders compile the result:
//! - secp256k1 chains: 64-byte `r || s`, canonicalized to low-S here
//! - ed25519 chains: 64-byte signature, used as is

pub mod canonical;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use canonical::*;

/// Signing algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningAlgorithm {
    Secp256k1Ecdsa,
    Ed25519,
}

/// A pre-image hash with metadata for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreImageHash {
    /// The hash to sign (32 bytes)
    pub hash: [u8; 32],

    /// For UTXO chains: which input index this is for
    pub input_index: Option<usize>,

    /// Human-readable description
    pub description: String,

    pub algorithm: SigningAlgorithm,
}

impl PreImageHash {
    pub fn new(hash: [u8; 32], algorithm: SigningAlgorithm) -> Self {
        Self {
            hash,
            input_index: None,
            description: String::new(),
            algorithm,
        }
    }

    pub fn with_input_index(mut self, index: usize) -> Self {
        self.input_index = Some(index);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Get hash as hex string
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Which key the signer must use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
    pub public_key: Vec<u8>,
    /// Hardware card identifier, when known
    pub card_id: Option<String>,
}

impl SignerIdentity {
    pub fn new(public_key: Vec<u8>) -> Self {
        Self { public_key, card_id: None }
    }

    pub fn with_card_id(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = Some(card_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("signing cancelled by the user")]
    Cancelled,

    #[error("signer device error: {0}")]
    Device(String),

    #[error("expected {expected} signatures, got {actual}")]
    SignatureCount { expected: usize, actual: usize },
}

/// External signer. Returns one raw signature per hash, in order.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(
        &self,
        hashes: &[PreImageHash],
        identity: &SignerIdentity,
    ) -> Result<Vec<Vec<u8>>, SignerError>;
}
