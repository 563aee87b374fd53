//! Fixed-width hash types used throughout the protocol.
//!
//! `UInt160` ("short hash") identifies scripts and accounts; `UInt256`
//! ("long hash") identifies blocks, transactions and Merkle roots. Both
//! serialize little-endian on the wire and in hex/JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashParseError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
}

macro_rules! fixed_hash {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;
            pub const ZERO: Self = Self([0u8; $len]);

            pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashParseError> {
                if bytes.len() != $len {
                    return Err(HashParseError::WrongLength {
                        expected: $len,
                        got: bytes.len(),
                    });
                }
                let mut arr = [0u8; $len];
                arr.copy_from_slice(bytes);
                Ok(Self(arr))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Little-endian hex, as used in JSON and block explorers (`0x`-prefixed).
            pub fn to_hex_le(&self) -> String {
                let mut rev = self.0;
                rev.reverse();
                format!("0x{}", hex::encode(rev))
            }

            pub fn from_hex_le(s: &str) -> Result<Self, HashParseError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let mut bytes =
                    hex::decode(s).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
                if bytes.len() != $len {
                    return Err(HashParseError::WrongLength {
                        expected: $len,
                        got: bytes.len(),
                    });
                }
                bytes.reverse();
                Self::from_bytes(&bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex_le())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex_le())
            }
        }

        impl FromStr for $name {
            type Err = HashParseError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex_le(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex_le())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex_le(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_hash!(UInt160, 20);
fixed_hash!(UInt256, 32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_uint256() {
        let h = UInt256([7u8; 32]);
        let s = h.to_hex_le();
        let back = UInt256::from_hex_le(&s).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn hex_roundtrip_uint160() {
        let h = UInt160([3u8; 20]);
        let back = UInt160::from_hex_le(&h.to_hex_le()).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(matches!(
            UInt160::from_bytes(&[0u8; 19]),
            Err(HashParseError::WrongLength { .. })
        ));
    }

    #[test]
    fn json_roundtrip() {
        let h = UInt256([9u8; 32]);
        let json = serde_json::to_string(&h).unwrap();
        let back: UInt256 = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
