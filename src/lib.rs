//! Cardwallet Core Library
//!
//! Transaction engine for hardware-card wallets. Private keys stay on the
//! card; this crate builds the bytes to sign, hands them to an external
//! signer and broadcasts the result.
//!
//! # Architecture
//!
//! - **wallet**: addresses, exact amounts, UTXOs and the wallet snapshot
//! - **tx**: per-family builders (Bitcoin-family, Binance Chain, Stellar)
//! - **signing**: the external signer seam and signature canonicalization
//! - **api**: chain data providers and failover between them
//! - **fees**: provider fee rates and caller-facing fee options
//! - **manager**: `update` / `get_fee` / `send` per wallet
//! - **utils**: HTTP, logging and endpoint configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use cardwallet_core::{create_with_network_config, Chain, NetworkConfig, WalletConfig};
//!
//! let config = WalletConfig::new(Chain::Bitcoin, card_public_key);
//! let manager = create_with_network_config(config, &NetworkConfig::default())?;
//! manager.update().await?;
//! let fee = manager.get_fee(&amount, destination).await?;
//! let tx = TransactionData::new(manager.wallet().address, destination, amount, fee.normal().clone());
//! let sent = manager.send(tx, &card_signer).await?;
//! ```

pub mod api;
pub mod error;
pub mod fees;
pub mod manager;
pub mod signing;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

// Re-export key types for convenience
pub use error::{ErrorCode, WalletError, WalletResult};
pub use types::{Chain, ChainFamily, Token};

pub use api::{AddressInfo, BroadcastAck, FailoverCoordinator, NetworkProvider};
pub use fees::{Fee, FeeEstimate, FeeTier, FeeUnit};
pub use manager::{
    create_wallet_manager, create_with_network_config, ManagerState, SendResult, WalletConfig,
    WalletManager,
};
pub use signing::{PreImageHash, SignerError, SignerIdentity, SigningAlgorithm, TransactionSigner};
pub use tx::SignedTransaction;
pub use utils::NetworkConfig;
pub use wallet::{
    AccountState, Amount, AmountKind, Decimal, Memo, TransactionData, TransactionStatus,
    UnspentOutput, Wallet,
};
