//! A small value type used at the native-contract call boundary, decoupled
//! from the VM's `StackItem` representation so this crate doesn't need to
//! depend on `node-vm`. The host bridging `System.Contract.CallNative`
//! converts `StackItem <-> NativeValue` at the call site.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use node_types::{PublicKey, UInt160, UInt256};

#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Integer(BigInt),
    Bytes(Vec<u8>),
    Hash160(UInt160),
    Hash256(UInt256),
    PublicKey(PublicKey),
    Array(Vec<NativeValue>),
}

impl NativeValue {
    pub fn as_hash160(&self) -> Option<UInt160> {
        match self {
            NativeValue::Hash160(h) => Some(*h),
            NativeValue::Bytes(b) => UInt160::from_bytes(b).ok(),
            _ => None,
        }
    }

    pub fn as_hash256(&self) -> Option<UInt256> {
        match self {
            NativeValue::Hash256(h) => Some(*h),
            NativeValue::Bytes(b) => UInt256::from_bytes(b).ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            NativeValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_integer().and_then(ToPrimitive::to_u32)
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.as_integer().and_then(ToPrimitive::to_u16)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            NativeValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        self.as_bytes().map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn as_public_key(&self) -> Option<PublicKey> {
        match self {
            NativeValue::PublicKey(k) => Some(*k),
            NativeValue::Bytes(b) => PublicKey::from_bytes(b).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[NativeValue]> {
        match self {
            NativeValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_coerce_to_hash160() {
        let v = NativeValue::Bytes(vec![0u8; 20]);
        assert_eq!(v.as_hash160(), Some(UInt160::ZERO));
    }

    #[test]
    fn wrong_variant_coerces_to_none() {
        let v = NativeValue::Bool(true);
        assert_eq!(v.as_hash160(), None);
    }
}
