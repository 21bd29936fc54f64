//! # Fixed-Point Amounts
//!
//! Balances are held and computed as unsigned integers of 10^-8 units and
//! travel over the wire as exact decimal JSON numbers (`30.25`,
//! `100000000.00000001`). Parsing reads the decimal text directly, so no
//! amount in range ever passes through a binary float on its way in or
//! out of storage. Inputs with more than eight decimals round half-up to
//! the nearest unit.
//!
//! All arithmetic is checked. Wrapping arithmetic and money do not mix.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use thiserror::Error;

use crate::config::{AMOUNT_DECIMALS, DISPLAY_DECIMALS, UNITS_PER_TOKEN};

/// Longest unit count, in digits, that can still fit in a `u64`.
const MAX_UNIT_DIGITS: usize = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while converting or combining amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input was negative, NaN or infinite.
    #[error("invalid amount: {0}")]
    Invalid(String),

    /// The input or result does not fit in the fixed-point range.
    #[error("amount overflow: {0}")]
    Overflow(String),

    /// A subtraction would go below zero.
    #[error("amount underflow: {minuend} - {subtrahend}")]
    Underflow {
        /// Left-hand side, in units.
        minuend: u64,
        /// Right-hand side, in units.
        subtrahend: u64,
    },
}

/// Parses a JSON-style decimal (`12`, `0.5`, `1.5e2`) into units.
fn decimal_to_units(text: &str) -> Result<u64, AmountError> {
    let invalid = || AmountError::Invalid(text.to_string());
    let overflow = || AmountError::Overflow(text.to_string());

    let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => {
            let exp = text[i + 1..].strip_prefix('+').unwrap_or(&text[i + 1..]);
            (&text[..i], exp.parse::<i64>().map_err(|_| invalid())?)
        }
        None => (text, 0),
    };
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty()
        || !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let all_digits = format!("{int_part}{frac_part}");
    let digits = all_digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if negative {
        return Err(invalid());
    }

    // value = digits * 10^(exponent - frac_len); units = value * 10^8
    let shift = exponent
        .checked_sub(frac_part.len() as i64)
        .and_then(|s| s.checked_add(AMOUNT_DECIMALS as i64))
        .ok_or_else(overflow)?;

    let (kept, zeros, round_up) = if shift >= 0 {
        (digits, shift as usize, false)
    } else {
        let dropped = shift.unsigned_abs() as usize;
        let keep = digits.len().saturating_sub(dropped);
        let round_up = dropped <= digits.len() && digits.as_bytes()[keep] >= b'5';
        (&digits[..keep], 0, round_up)
    };
    if kept.len().saturating_add(zeros) > MAX_UNIT_DIGITS {
        return Err(overflow());
    }

    let base: u128 = if kept.is_empty() {
        0
    } else {
        kept.parse().map_err(|_| invalid())?
    };
    let units = base * 10u128.pow(zeros as u32) + u128::from(round_up);
    u64::try_from(units).map_err(|_| overflow())
}

/// Exact decimal text of `units`, trailing zeros trimmed.
fn units_to_decimal(units: u64) -> String {
    let whole = units / UNITS_PER_TOKEN;
    let frac = units % UNITS_PER_TOKEN;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = AMOUNT_DECIMALS as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Two-decimal rendering of the nearest binary64 value, the way audit
/// strings have always printed amounts.
fn render_two_decimals(units: u64) -> String {
    let value = units as f64 / UNITS_PER_TOKEN as f64;
    format!("{:.*}", DISPLAY_DECIMALS as usize, value)
}

fn serialize_units<S: Serializer>(units: u64, serializer: S) -> Result<S::Ok, S::Error> {
    let number: Number = units_to_decimal(units)
        .parse()
        .map_err(serde::ser::Error::custom)?;
    number.serialize(serializer)
}

fn deserialize_units<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let number = Number::deserialize(deserializer)?;
    decimal_to_units(&number.to_string()).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A non-negative token quantity in 10^-8 units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Builds an amount from raw units.
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Builds an amount from whole tokens.
    pub fn from_whole(tokens: u64) -> Result<Self, AmountError> {
        tokens
            .checked_mul(UNITS_PER_TOKEN)
            .map(Self)
            .ok_or_else(|| AmountError::Overflow(tokens.to_string()))
    }

    /// Converts a float through its shortest decimal form, rounding to
    /// the nearest unit.
    pub fn from_f64(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::Invalid(value.to_string()));
        }
        decimal_to_units(&value.to_string()).map(Self)
    }

    /// Parses exact decimal text such as `"100000000.00000001"`.
    pub fn parse(text: &str) -> Result<Self, AmountError> {
        decimal_to_units(text.trim()).map(Self)
    }

    /// Raw units.
    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Nearest binary64 value. Exact only below 2^53 units; use the
    /// serde form when the value must round-trip.
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / UNITS_PER_TOKEN as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or_else(|| AmountError::Overflow(format!("{} + {}", self.0, rhs.0)))
    }

    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0.checked_sub(rhs.0).map(Amount).ok_or(AmountError::Underflow {
            minuend: self.0,
            subtrahend: rhs.0,
        })
    }

    /// Multiplies by `scale`, rounding half-up to the nearest unit.
    pub fn rescale(self, scale: Scale) -> Result<Amount, AmountError> {
        let product = self.0 as u128 * scale.0 as u128;
        let rounded = (product + UNITS_PER_TOKEN as u128 / 2) / UNITS_PER_TOKEN as u128;
        u64::try_from(rounded)
            .map(Amount)
            .map_err(|_| AmountError::Overflow(format!("{} * {}", self, scale)))
    }
}

/// Renders with two decimal places, the format used in audit strings.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_two_decimals(self.0))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_units(self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_units(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Scale
// ---------------------------------------------------------------------------

/// A strictly positive rescale multiplier, in the same fixed-point units
/// as [`Amount`]. Greater than one is a split, less than one a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scale(u64);

impl Scale {
    /// The identity multiplier.
    pub const ONE: Scale = Scale(UNITS_PER_TOKEN);

    /// Converts a decimal multiplier. Zero, negative, non-finite values
    /// and values that round to zero units are rejected.
    pub fn from_f64(value: f64) -> Result<Self, AmountError> {
        if value.is_finite() && value <= 0.0 {
            return Err(AmountError::Invalid(format!(
                "scale must be positive, got {value}"
            )));
        }
        Amount::from_f64(value).and_then(|amount| Self::from_units(amount.0, value))
    }

    fn from_units(units: u64, shown: impl fmt::Display) -> Result<Self, AmountError> {
        match units {
            0 => Err(AmountError::Invalid(format!(
                "scale {shown} is not positive or below precision"
            ))),
            units => Ok(Self(units)),
        }
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / UNITS_PER_TOKEN as f64
    }

    /// `true` when the multiplier grows balances.
    pub fn is_split(&self) -> bool {
        self.0 > UNITS_PER_TOKEN
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_two_decimals(self.0))
    }
}

impl Serialize for Scale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_units(self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Scale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let units = deserialize_units(deserializer)?;
        Scale::from_units(units, Amount(units)).map_err(serde::de::Error::custom)
    }
}
