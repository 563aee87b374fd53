//! Fixed-point decimal with 8 fractional digits (`value * 10^8`).
//!
//! Arithmetic is exact within `i64`; encoding boundaries saturate rather than
//! panic. JSON form is a decimal string, matching RPC conventions.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const DECIMALS: u32 = 8;
const SCALE: i64 = 100_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Fixed8ParseError {
    #[error("not a valid decimal number: {0}")]
    InvalidNumber(String),
    #[error("value out of range for Fixed8")]
    OutOfRange,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed8(i64);

impl Fixed8 {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(i64::MAX);
    pub const MIN: Self = Self(i64::MIN);

    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn from_i64(whole: i64) -> Self {
        Self(whole.saturating_mul(SCALE))
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Add for Fixed8 {
    type Output = Fixed8;
    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub for Fixed8 {
    type Output = Fixed8;
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Neg for Fixed8 {
    type Output = Fixed8;
    fn neg(self) -> Self::Output {
        Self(self.0.saturating_neg())
    }
}

impl fmt::Debug for Fixed8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed8({})", self)
    }
}

impl fmt::Display for Fixed8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u64;
        let frac = abs % SCALE as u64;
        write!(f, "{sign}{whole}.{frac:08}")
    }
}

impl FromStr for Fixed8 {
    type Err = Fixed8ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let negative = s.starts_with('-');
        let s = s.strip_prefix('-').unwrap_or(s);
        let mut parts = s.splitn(2, '.');
        let whole = parts.next().unwrap_or("0");
        let frac = parts.next().unwrap_or("");
        if frac.len() > DECIMALS as usize || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(Fixed8ParseError::InvalidNumber(s.to_string()));
        }
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(Fixed8ParseError::InvalidNumber(s.to_string()));
        }
        let whole: i64 = whole
            .parse()
            .map_err(|_| Fixed8ParseError::InvalidNumber(s.to_string()))?;
        let mut frac_str = frac.to_string();
        while frac_str.len() < DECIMALS as usize {
            frac_str.push('0');
        }
        let frac_val: i64 = if frac_str.is_empty() {
            0
        } else {
            frac_str
                .parse()
                .map_err(|_| Fixed8ParseError::InvalidNumber(s.to_string()))?
        };
        let raw = whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_val))
            .ok_or(Fixed8ParseError::OutOfRange)?;
        Ok(Self(if negative { -raw } else { raw }))
    }
}

impl Serialize for Fixed8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Fixed8 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Fixed8::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrip() {
        let v = Fixed8::from_raw(123_456_789);
        assert_eq!(v.to_string(), "1.23456789");
        assert_eq!(Fixed8::from_str("1.23456789").unwrap(), v);
    }

    #[test]
    fn negative_roundtrip() {
        let v = Fixed8::from_str("-0.00000001").unwrap();
        assert_eq!(v.raw(), -1);
        assert_eq!(v.to_string(), "-0.00000001");
    }

    #[test]
    fn saturating_add_caps() {
        let v = Fixed8::MAX.saturating_add(Fixed8::from_i64(1));
        assert_eq!(v, Fixed8::MAX);
    }

    #[test]
    fn rejects_too_many_fraction_digits() {
        assert!(Fixed8::from_str("1.123456789").is_err());
    }
}
