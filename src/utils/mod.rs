//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod http;
pub mod logging;
pub mod network_config;

pub use logging::{init_logging, redact_address, redact_hash, LogFormat};
pub use network_config::{HttpSettings, NetworkConfig};
