//! Typed stack items exchanged between opcodes and contract storage.
//!
//! Compound items (`Array`/`Struct`/`Map`) live behind `Rc<RefCell<..>>` so
//! that a contract building a self-referential array (`a.push(a.clone())`)
//! shares one allocation instead of cloning infinitely; a `ReferenceCounter`
//! tracks how many reachable items are alive per execution so the engine can
//! enforce an item-count ceiling.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::errors::VmError;

/// Maximum size, in bytes, of an integer's minimal two's-complement
/// encoding: values must fit in 256 bits.
pub const MAX_INTEGER_BYTES: usize = 32;
/// Maximum nesting depth for JSON serialization.
pub const MAX_JSON_DEPTH: usize = 10;

pub type ArrayRef = Rc<RefCell<Vec<StackItem>>>;
pub type MapRef = Rc<RefCell<Vec<(StackItem, StackItem)>>>;

#[derive(Clone)]
pub enum StackItem {
    Null,
    Boolean(bool),
    Integer(BigInt),
    ByteString(Rc<Vec<u8>>),
    Buffer(Rc<RefCell<Vec<u8>>>),
    Array(ArrayRef),
    /// Like `Array` but compared by structural equality and value-cloned by
    /// `DUP`-family opcodes rather than shared by handle.
    Struct(ArrayRef),
    Map(MapRef),
    /// Opaque host handle (e.g. an iterator session); not serializable.
    InteropInterface(Rc<dyn std::any::Any>),
    /// Code offset, used by closures/callbacks.
    Pointer(usize),
}

impl StackItem {
    pub fn byte_string(bytes: impl Into<Vec<u8>>) -> Self {
        StackItem::ByteString(Rc::new(bytes.into()))
    }

    pub fn buffer(bytes: impl Into<Vec<u8>>) -> Self {
        StackItem::Buffer(Rc::new(RefCell::new(bytes.into())))
    }

    pub fn array(items: Vec<StackItem>) -> Self {
        StackItem::Array(Rc::new(RefCell::new(items)))
    }

    pub fn new_struct(items: Vec<StackItem>) -> Self {
        StackItem::Struct(Rc::new(RefCell::new(items)))
    }

    pub fn map() -> Self {
        StackItem::Map(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn int(v: i64) -> Self {
        StackItem::Integer(BigInt::from(v))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StackItem::Null => "Null",
            StackItem::Boolean(_) => "Boolean",
            StackItem::Integer(_) => "Integer",
            StackItem::ByteString(_) => "ByteString",
            StackItem::Buffer(_) => "Buffer",
            StackItem::Array(_) => "Array",
            StackItem::Struct(_) => "Struct",
            StackItem::Map(_) => "Map",
            StackItem::InteropInterface(_) => "InteropInterface",
            StackItem::Pointer(_) => "Pointer",
        }
    }

    /// Truthiness used by `JMPIF`/`ASSERT`/boolean conversion.
    pub fn as_bool(&self) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => !i.is_zero(),
            StackItem::ByteString(b) => b.iter().any(|&x| x != 0),
            StackItem::Buffer(b) => b.borrow().iter().any(|&x| x != 0),
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) => true,
            StackItem::InteropInterface(_) => true,
            StackItem::Pointer(_) => true,
        }
    }

    pub fn as_int(&self) -> Result<BigInt, VmError> {
        match self {
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::Boolean(b) => Ok(BigInt::from(*b as i64)),
            StackItem::ByteString(b) => Ok(bytes_to_bigint(b)),
            StackItem::Buffer(b) => Ok(bytes_to_bigint(&b.borrow())),
            other => Err(VmError::InvalidCast {
                from: other.type_name(),
                to: "Integer",
            }),
        }
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>, VmError> {
        match self {
            StackItem::ByteString(b) => Ok((**b).clone()),
            StackItem::Buffer(b) => Ok(b.borrow().clone()),
            StackItem::Integer(i) => Ok(bigint_to_bytes(i)),
            other => Err(VmError::InvalidCast {
                from: other.type_name(),
                to: "ByteString",
            }),
        }
    }

    /// Structural equality, used by `NUMEQUAL`/`Struct` comparisons and by
    /// `Map` key lookup for primitive keys.
    pub fn structural_eq(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Null, StackItem::Null) => true,
            (StackItem::Boolean(a), StackItem::Boolean(b)) => a == b,
            (StackItem::Integer(a), StackItem::Integer(b)) => a == b,
            (StackItem::ByteString(a), StackItem::ByteString(b)) => a == b,
            (StackItem::Buffer(a), StackItem::Buffer(b)) => *a.borrow() == *b.borrow(),
            (StackItem::Struct(a), StackItem::Struct(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (StackItem::Array(a), StackItem::Array(b)) => Rc::ptr_eq(a, b),
            (StackItem::Map(a), StackItem::Map(b)) => Rc::ptr_eq(a, b),
            (StackItem::Pointer(a), StackItem::Pointer(b)) => a == b,
            _ => false,
        }
    }

    /// Number of items directly and transitively reachable from this item,
    /// used to charge the reference-count ceiling on construction. Does not
    /// terminate early on cycles by itself; callers pass a `visited` set
    /// (see `serialize::count_with_cycle_guard`) when cycle safety matters.
    pub fn approximate_size(&self) -> usize {
        match self {
            StackItem::Array(items) | StackItem::Struct(items) => 1 + items.borrow().len(),
            StackItem::Map(entries) => 1 + entries.borrow().len() * 2,
            _ => 1,
        }
    }
}

impl fmt::Debug for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackItem::Null => write!(f, "Null"),
            StackItem::Boolean(b) => write!(f, "Boolean({b})"),
            StackItem::Integer(i) => write!(f, "Integer({i})"),
            StackItem::ByteString(b) => write!(f, "ByteString({})", hex::encode(b.as_slice())),
            StackItem::Buffer(b) => write!(f, "Buffer({})", hex::encode(&*b.borrow())),
            StackItem::Array(items) => write!(f, "Array(len={})", items.borrow().len()),
            StackItem::Struct(items) => write!(f, "Struct(len={})", items.borrow().len()),
            StackItem::Map(entries) => write!(f, "Map(len={})", entries.borrow().len()),
            StackItem::InteropInterface(_) => write!(f, "InteropInterface"),
            StackItem::Pointer(p) => write!(f, "Pointer({p})"),
        }
    }
}

/// Minimal-length little-endian two's-complement integer encoding.
pub fn bigint_to_bytes(v: &BigInt) -> Vec<u8> {
    if v.is_zero() {
        return Vec::new();
    }
    v.to_signed_bytes_le()
}

pub fn bytes_to_bigint(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        BigInt::zero()
    } else {
        BigInt::from_signed_bytes_le(bytes)
    }
}

/// Integers up to 256 bits (32 bytes) succeed; 257 bits (33-byte minimal
/// encoding) fail.
pub fn check_integer_size(v: &BigInt) -> Result<(), VmError> {
    let bytes = bigint_to_bytes(v);
    if bytes.len() > MAX_INTEGER_BYTES {
        return Err(VmError::IntegerTooLarge {
            bytes: bytes.len(),
        });
    }
    Ok(())
}

pub fn bigint_to_i64(v: &BigInt) -> Result<i64, VmError> {
    v.to_i64().ok_or(VmError::IntegerTooLarge {
        bytes: bigint_to_bytes(v).len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_truthiness() {
        assert!(!StackItem::Boolean(false).as_bool());
        assert!(StackItem::int(0).as_bool() == false);
        assert!(StackItem::int(1).as_bool());
    }

    #[test]
    fn integer_boundary_256_vs_257_bits() {
        let max_256 = BigInt::from(2).pow(255) - 1; // fits in 32 bytes signed
        assert!(check_integer_size(&max_256).is_ok());
        let over = BigInt::from(2).pow(256); // needs 33 bytes
        assert!(check_integer_size(&over).is_err());
    }

    #[test]
    fn array_struct_share_vs_clone_semantics() {
        let a = StackItem::array(vec![StackItem::int(1)]);
        let b = a.clone();
        if let (StackItem::Array(ra), StackItem::Array(rb)) = (&a, &b) {
            assert!(Rc::ptr_eq(ra, rb));
        } else {
            panic!("expected arrays");
        }
    }

    #[test]
    fn struct_structural_equality_by_value() {
        let a = StackItem::new_struct(vec![StackItem::int(1), StackItem::int(2)]);
        let b = StackItem::new_struct(vec![StackItem::int(1), StackItem::int(2)]);
        assert!(a.structural_eq(&b));
    }

    #[test]
    fn cyclic_array_does_not_infinite_loop_on_clone() {
        let arr = StackItem::array(vec![]);
        if let StackItem::Array(rc) = &arr {
            rc.borrow_mut().push(arr.clone());
        }
        // cloning the handle itself is cheap and doesn't recurse
        let _clone = arr.clone();
    }
}
