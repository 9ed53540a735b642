//! Structured logging with partial redaction
//!
//! Events go through `tracing`. Addresses and transaction hashes are logged
//! in shortened form via [`redact_address`] and [`redact_hash`].

use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the fmt subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this twice is a
/// no-op.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match format {
        LogFormat::Json => {
            let _ = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .json()
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Pretty => {
            let _ = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

/// Fully redact a sensitive value
fn redact_value(value: &str) -> String {
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }

    let len = value.chars().count();
    if len <= 4 {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED:{}chars]", len)
    }
}

/// Partially redact an address (show first 6 and last 4 chars)
pub fn redact_address(address: &str) -> String {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    let prefix_len = 6;
    let suffix_len = 4;

    if trimmed.chars().count() <= prefix_len + suffix_len + 3 {
        return redact_value(trimmed);
    }

    format!("{}...{}", head(trimmed, prefix_len), tail(trimmed, suffix_len))
}

/// Partially redact a hash (show first 10 and last 6 chars)
pub fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    if trimmed.chars().count() <= 20 {
        return trimmed.to_string(); // Short hashes shown fully
    }

    format!("{}...{}", head(trimmed, 10), tail(trimmed, 6))
}

/// First `count` characters, cut on a char boundary.
fn head(value: &str, count: usize) -> &str {
    match value.char_indices().nth(count) {
        Some((index, _)) => &value[..index],
        None => value,
    }
}

/// Last `count` characters, cut on a char boundary.
fn tail(value: &str, count: usize) -> &str {
    match value.char_indices().rev().nth(count.saturating_sub(1)) {
        Some((index, _)) if count > 0 => &value[index..],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_value() {
        assert_eq!(redact_value(""), "[EMPTY]");
        assert_eq!(redact_value("abc"), "[REDACTED]");
        assert_eq!(redact_value("secret_key_12345"), "[REDACTED:16chars]");
    }

    #[test]
    fn test_redact_address() {
        let stellar = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";
        assert_eq!(redact_address(stellar), "GAAAAA...AWHF");

        let bnb = "bnb1grpf0955h0ykzq3ar5nmum7y6gdfl6lxfn46h2";
        let redacted = redact_address(bnb);
        assert!(redacted.starts_with("bnb1gr"));
        assert!(redacted.ends_with("6h2"));

        assert_eq!(redact_address("short"), "[REDACTED:5chars]");
    }

    #[test]
    fn test_redact_hash() {
        let hash = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";
        let redacted = redact_hash(hash);
        assert_eq!(redacted, "1234567890...abcdef");
        assert_eq!(redact_hash("abc"), "abc");
    }

    #[test]
    fn redaction_cuts_on_char_boundaries() {
        let address = format!("a{}", "é".repeat(20));
        assert_eq!(redact_address(&address), "aééééé...éééé");
        assert_eq!(
            redact_hash(&"ü".repeat(30)),
            format!("{}...{}", "ü".repeat(10), "ü".repeat(6))
        );
        assert_eq!(redact_address("ééééé"), "[REDACTED:5chars]");
    }
}
