//! Integer amount helpers.
//!
//! Every amount is a base-unit `U256`. Human-entered values are converted with
//! [`parse_units`], which scales the decimal string with alloy's unit parser so
//! no floating point is ever involved.

use alloy::primitives::utils::{self as units, UnitsError};
use alloy::primitives::{ParseSignedError, U256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Not a non-negative base-10 number.
    Malformed(String),
    /// More fractional digits than the token supports.
    TooPrecise { value: String, decimals: u8 },
    /// Does not fit in 256 bits.
    Overflow(String),
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Malformed(v) => write!(f, "malformed amount: {:?}", v),
            AmountError::TooPrecise { value, decimals } => {
                write!(f, "amount {} has more than {} decimals", value, decimals)
            }
            AmountError::Overflow(v) => write!(f, "amount overflows 256 bits: {}", v),
        }
    }
}

impl std::error::Error for AmountError {}

/// Parse a base-10 integer string (as returned by the indexer) into a `U256`.
pub fn parse_u256(value: &str) -> Result<U256, AmountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Malformed(value.to_string()));
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| AmountError::Overflow(value.to_string()))
}

/// Parse a base-10 integer string that must fit a `u64` (counters, timestamps).
pub fn parse_u64(value: &str) -> Result<u64, AmountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Malformed(value.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| AmountError::Overflow(value.to_string()))
}

/// Convert a human decimal string ("20", "0.5") into base units.
///
/// Fractional digits beyond `decimals` are rejected rather than truncated.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed.starts_with('-') {
        return Err(AmountError::Malformed(value.to_string()));
    }
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.trim_end_matches('0').len() > decimals as usize {
            return Err(AmountError::TooPrecise {
                value: value.to_string(),
                decimals,
            });
        }
    }

    units::parse_units(trimmed, decimals)
        .map(|parsed| parsed.get_absolute())
        .map_err(|e| match e {
            UnitsError::ParseSigned(ParseSignedError::IntegerOverflow) => {
                AmountError::Overflow(value.to_string())
            }
            _ => AmountError::Malformed(value.to_string()),
        })
}

/// Integer division that yields zero instead of panicking on a zero divisor.
pub fn div_or_zero(numerator: U256, denominator: u64) -> U256 {
    if denominator == 0 {
        U256::ZERO
    } else {
        numerator / U256::from(denominator)
    }
}
