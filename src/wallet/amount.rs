//! Amounts and exact decimal arithmetic
//!
//! Every [`Amount`] carries its value in display units (BTC, BNB, XLM). Chain
//! minor units (satoshis, jager, stroops) are only produced or consumed by
//! [`to_minor_units`] and [`from_minor_units`]; a value with more fractional
//! digits than the chain supports is rejected instead of rounded.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{WalletError, WalletResult};
use crate::types::{Chain, Token};

/// Largest scale a [`Decimal`] may carry.
pub const MAX_SCALE: u32 = 30;

/// Exact non-negative fixed-point decimal: `mantissa / 10^scale`.
///
/// Values are kept normalized (no trailing fractional zeros), so derived
/// equality compares numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    mantissa: u128,
    scale: u32,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal { mantissa: 0, scale: 0 };

    /// Build `mantissa / 10^scale`.
    pub fn new(mantissa: u128, scale: u32) -> WalletResult<Self> {
        if scale > MAX_SCALE {
            return Err(WalletError::encoding(format!(
                "Decimal scale {} exceeds maximum {}",
                scale, MAX_SCALE
            )));
        }
        Ok(Self { mantissa, scale }.normalized())
    }

    pub fn from_integer(value: u128) -> Self {
        Self { mantissa: value, scale: 0 }
    }

    pub fn mantissa(&self) -> u128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    fn normalized(mut self) -> Self {
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        if self.mantissa == 0 {
            self.scale = 0;
        }
        self
    }

    /// Bring both operands to a common scale.
    fn aligned(&self, other: &Decimal) -> WalletResult<(u128, u128, u32)> {
        let scale = self.scale.max(other.scale);
        let lhs = rescale(self.mantissa, scale - self.scale)?;
        let rhs = rescale(other.mantissa, scale - other.scale)?;
        Ok((lhs, rhs, scale))
    }

    pub fn checked_add(&self, other: &Decimal) -> WalletResult<Decimal> {
        let (lhs, rhs, scale) = self.aligned(other)?;
        let sum = lhs
            .checked_add(rhs)
            .ok_or_else(|| WalletError::encoding("Decimal overflow"))?;
        Decimal::new(sum, scale)
    }

    /// Subtract, failing when the result would be negative.
    pub fn checked_sub(&self, other: &Decimal) -> WalletResult<Decimal> {
        let (lhs, rhs, scale) = self.aligned(other)?;
        let diff = lhs.checked_sub(rhs).ok_or_else(|| {
            WalletError::encoding(format!("{} is smaller than {}", self, other))
        })?;
        Decimal::new(diff, scale)
    }

    pub fn saturating_sub(&self, other: &Decimal) -> Decimal {
        self.checked_sub(other).unwrap_or(Decimal::ZERO)
    }
}

fn rescale(mantissa: u128, extra_digits: u32) -> WalletResult<u128> {
    10u128
        .checked_pow(extra_digits)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| WalletError::encoding("Decimal overflow"))
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.aligned(other) {
            Ok((lhs, rhs, _)) => lhs.cmp(&rhs),
            // Only reachable near u128::MAX; fall back on the integer parts.
            Err(_) => {
                let lhs = self.mantissa / 10u128.pow(self.scale);
                let rhs = other.mantissa / 10u128.pow(other.scale);
                lhs.cmp(&rhs)
            }
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let digits = format!("{:0>width$}", self.mantissa, width = self.scale as usize + 1);
        let (int_part, frac_part) = digits.split_at(digits.len() - self.scale as usize);
        write!(f, "{}.{}", int_part, frac_part)
    }
}

impl FromStr for Decimal {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (int_part, frac_part) = match trimmed.split_once('.') {
            Some((i, f)) => (i, f),
            None => (trimmed, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(WalletError::encoding(format!("Invalid decimal: '{}'", s)));
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(WalletError::encoding(format!("Invalid decimal: '{}'", s)));
        }
        // Padding zeros carry no value and must not count against range or scale.
        let frac_part = frac_part.trim_end_matches('0');
        let digits = format!("{}{}", int_part, frac_part);
        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            return Ok(Decimal::ZERO);
        }
        let mantissa = digits
            .parse::<u128>()
            .map_err(|_| WalletError::encoding(format!("Decimal out of range: '{}'", s)))?;
        Decimal::new(mantissa, frac_part.len() as u32)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Convert a display-unit value to chain minor units.
pub fn to_minor_units(value: &Decimal, decimals: u8) -> WalletResult<u128> {
    let decimals = u32::from(decimals);
    if value.scale > decimals {
        return Err(WalletError::encoding(format!(
            "{} has more than {} fractional digits",
            value, decimals
        )));
    }
    rescale(value.mantissa, decimals - value.scale)
}

/// Convert chain minor units to a display-unit value.
pub fn from_minor_units(units: u128, decimals: u8) -> Decimal {
    Decimal {
        mantissa: units,
        scale: u32::from(decimals),
    }
    .normalized()
}

// =============================================================================
// Amount
// =============================================================================

/// What a balance entry or transfer refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountKind {
    Coin,
    Token,
    Reserve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub currency_symbol: String,
    pub decimals: u8,
    pub value: Decimal,
    pub kind: AmountKind,
}

impl Amount {
    pub fn new(
        currency_symbol: impl Into<String>,
        decimals: u8,
        value: Decimal,
        kind: AmountKind,
    ) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
            decimals,
            value,
            kind,
        }
    }

    /// Native coin amount of `chain`.
    pub fn coin(chain: Chain, value: Decimal) -> Self {
        Self::new(chain.symbol(), chain.decimals(), value, AmountKind::Coin)
    }

    pub fn token(token: &Token, value: Decimal) -> Self {
        Self::new(token.symbol.clone(), token.decimals, value, AmountKind::Token)
    }

    /// Parse a display-unit string into a native coin amount.
    pub fn parse_coin(chain: Chain, value: &str) -> WalletResult<Self> {
        Ok(Self::coin(chain, value.parse()?))
    }

    pub fn from_minor_units(
        currency_symbol: impl Into<String>,
        decimals: u8,
        units: u128,
        kind: AmountKind,
    ) -> Self {
        Self::new(currency_symbol, decimals, from_minor_units(units, decimals), kind)
    }

    pub fn to_minor_units(&self) -> WalletResult<u128> {
        to_minor_units(&self.value, self.decimals)
    }

    /// Minor units as `u64`, as used by Bitcoin-family serialization.
    pub fn to_minor_u64(&self) -> WalletResult<u64> {
        u64::try_from(self.to_minor_units()?)
            .map_err(|_| WalletError::encoding(format!("{} does not fit in 64 bits", self)))
    }

    /// Minor units as `i64`, as used by Binance and Stellar encodings.
    pub fn to_minor_i64(&self) -> WalletResult<i64> {
        i64::try_from(self.to_minor_units()?)
            .map_err(|_| WalletError::encoding(format!("{} does not fit in 63 bits", self)))
    }

    pub fn with_value(&self, value: Decimal) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    pub fn zero(&self) -> Self {
        self.with_value(Decimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    fn ensure_same_currency(&self, other: &Amount) -> WalletResult<()> {
        if self.currency_symbol != other.currency_symbol || self.decimals != other.decimals {
            return Err(WalletError::encoding(format!(
                "Cannot combine {} with {}",
                self.currency_symbol, other.currency_symbol
            )));
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Amount) -> WalletResult<Amount> {
        self.ensure_same_currency(other)?;
        Ok(self.with_value(self.value.checked_add(&other.value)?))
    }

    pub fn checked_sub(&self, other: &Amount) -> WalletResult<Amount> {
        self.ensure_same_currency(other)?;
        Ok(self.with_value(self.value.checked_sub(&other.value)?))
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(&self, other: &Amount) -> WalletResult<Amount> {
        self.ensure_same_currency(other)?;
        Ok(self.with_value(self.value.saturating_sub(&other.value)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency_symbol)
    }
}
