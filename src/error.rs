//! Unified error types for the wallet engine
//!
//! Every manager, builder and provider operation reports failures through
//! [`WalletError`], so callers can branch on a closed [`ErrorCode`] set.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signing::SignerError;

/// Main error type for all wallet operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl WalletError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RejectedByChain, msg)
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientFunds, msg)
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncodingError, msg)
    }

    pub fn stale_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StaleState, msg)
    }

    pub fn operation_in_progress(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationInProgress, msg)
    }

    pub fn too_many_inputs(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TooManyInputs, msg)
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Configuration, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Transient failures are the only ones retried or failed over.
    pub fn is_transient(&self) -> bool {
        self.code == ErrorCode::NetworkError
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalletError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Provider / chain
    NetworkError,
    RejectedByChain,
    StaleState,

    // Transaction construction
    InsufficientFunds,
    TooManyInputs,
    EncodingError,

    // Signer
    SignerCancelled,
    SignerDeviceError,

    // Manager
    OperationInProgress,
    Configuration,
    Internal,
}

/// Result type alias for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

// Conversions from common error types

impl From<hex::FromHexError> for WalletError {
    fn from(e: hex::FromHexError) -> Self {
        WalletError::encoding(format!("Invalid hex: {}", e))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            WalletError::network("Request timed out")
        } else if e.is_connect() {
            WalletError::network("Connection failed")
        } else if e.is_decode() {
            WalletError::network("Malformed provider response").with_details(e.to_string())
        } else {
            WalletError::network(e.to_string())
        }
    }
}

impl From<secp256k1::Error> for WalletError {
    fn from(e: secp256k1::Error) -> Self {
        WalletError::encoding(format!("Secp256k1 error: {}", e))
    }
}

impl From<SignerError> for WalletError {
    fn from(e: SignerError) -> Self {
        match e {
            SignerError::Cancelled => {
                WalletError::new(ErrorCode::SignerCancelled, "Signing was cancelled")
            }
            SignerError::Device(reason) => {
                WalletError::new(ErrorCode::SignerDeviceError, "Signer device failed")
                    .with_details(reason)
            }
            SignerError::SignatureCount { expected, actual } => WalletError::new(
                ErrorCode::SignerDeviceError,
                format!("Signer returned {} signatures for {} hashes", actual, expected),
            ),
        }
    }
}
