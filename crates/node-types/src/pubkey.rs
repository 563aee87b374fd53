//! Compressed elliptic-curve public key (33 bytes, secp256r1 by convention).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublicKeyError {
    #[error("public key must be 33 bytes, got {0}")]
    WrongLength(usize),
    #[error("compressed point must start with 0x02 or 0x03, got 0x{0:02x}")]
    BadPrefix(u8),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; 33]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PublicKeyError> {
        if bytes.len() != 33 {
            return Err(PublicKeyError::WrongLength(bytes.len()));
        }
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(PublicKeyError::BadPrefix(bytes[0]));
        }
        let mut arr = [0u8; 33];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_prefix() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x04;
        assert!(matches!(
            PublicKey::from_bytes(&bytes),
            Err(PublicKeyError::BadPrefix(0x04))
        ));
    }

    #[test]
    fn accepts_02_and_03() {
        let mut bytes = [1u8; 33];
        bytes[0] = 0x02;
        assert!(PublicKey::from_bytes(&bytes).is_ok());
        bytes[0] = 0x03;
        assert!(PublicKey::from_bytes(&bytes).is_ok());
    }
}
