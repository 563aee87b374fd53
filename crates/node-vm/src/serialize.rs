//! Binary and JSON forms of a `StackItem` tree, used by `CONVERT`,
//! `Storage.Get`/`Put` of structured values, and contract return values
//! surfaced over external interfaces.
//!
//! Both forms detect cycles with a `visited` set keyed by pointer identity
//! and cap nesting at [`MAX_JSON_DEPTH`]; `InteropInterface` and `Pointer`
//! are never serializable.

use std::collections::HashSet;

use crate::errors::VmError;
use crate::stack_item::{bigint_to_bytes, bytes_to_bigint, StackItem, MAX_JSON_DEPTH};

/// Binary tag bytes for the canonical serialize form.
mod tag {
    pub const ANY: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x20;
    pub const INTEGER: u8 = 0x21;
    pub const BYTE_STRING: u8 = 0x28;
    pub const BUFFER: u8 = 0x30;
    pub const ARRAY: u8 = 0x40;
    pub const STRUCT: u8 = 0x41;
    pub const MAP: u8 = 0x48;
}

fn ptr_id(item: &StackItem) -> Option<usize> {
    match item {
        StackItem::Array(rc) => Some(std::rc::Rc::as_ptr(rc) as usize),
        StackItem::Struct(rc) => Some(std::rc::Rc::as_ptr(rc) as usize),
        StackItem::Map(rc) => Some(std::rc::Rc::as_ptr(rc) as usize),
        _ => None,
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

/// Serializes `item` to the canonical binary form.
pub fn serialize(item: &StackItem) -> Result<Vec<u8>, VmError> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    serialize_into(item, &mut out, &mut visited, 0)?;
    Ok(out)
}

fn serialize_into(
    item: &StackItem,
    out: &mut Vec<u8>,
    visited: &mut HashSet<usize>,
    depth: usize,
) -> Result<(), VmError> {
    if depth > MAX_JSON_DEPTH {
        return Err(VmError::SerializationDepthExceeded {
            depth,
            limit: MAX_JSON_DEPTH,
        });
    }
    if let Some(id) = ptr_id(item) {
        if !visited.insert(id) {
            return Err(VmError::NotSerializable("cyclic structure"));
        }
    }
    match item {
        StackItem::Null => out.push(tag::ANY),
        StackItem::Boolean(b) => {
            out.push(tag::BOOLEAN);
            out.push(*b as u8);
        }
        StackItem::Integer(i) => {
            out.push(tag::INTEGER);
            let bytes = bigint_to_bytes(i);
            write_len(out, bytes.len());
            out.extend_from_slice(&bytes);
        }
        StackItem::ByteString(b) => {
            out.push(tag::BYTE_STRING);
            write_len(out, b.len());
            out.extend_from_slice(b);
        }
        StackItem::Buffer(b) => {
            let b = b.borrow();
            out.push(tag::BUFFER);
            write_len(out, b.len());
            out.extend_from_slice(&b);
        }
        StackItem::Array(items) | StackItem::Struct(items) => {
            out.push(if matches!(item, StackItem::Struct(_)) {
                tag::STRUCT
            } else {
                tag::ARRAY
            });
            let items = items.borrow();
            write_len(out, items.len());
            for it in items.iter() {
                serialize_into(it, out, visited, depth + 1)?;
            }
        }
        StackItem::Map(entries) => {
            out.push(tag::MAP);
            let entries = entries.borrow();
            write_len(out, entries.len());
            for (k, v) in entries.iter() {
                serialize_into(k, out, visited, depth + 1)?;
                serialize_into(v, out, visited, depth + 1)?;
            }
        }
        StackItem::InteropInterface(_) => return Err(VmError::NotSerializable("InteropInterface")),
        StackItem::Pointer(_) => return Err(VmError::NotSerializable("Pointer")),
    }
    if let Some(id) = ptr_id(item) {
        visited.remove(&id);
    }
    Ok(())
}

/// Deserializes the canonical binary form back into a `StackItem` tree.
pub fn deserialize(bytes: &[u8]) -> Result<StackItem, VmError> {
    let mut cursor = 0usize;
    deserialize_at(bytes, &mut cursor, 0)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, VmError> {
    let slice = bytes
        .get(*cursor..*cursor + 4)
        .ok_or(VmError::NotSerializable("truncated length prefix"))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn deserialize_at(bytes: &[u8], cursor: &mut usize, depth: usize) -> Result<StackItem, VmError> {
    if depth > MAX_JSON_DEPTH {
        return Err(VmError::SerializationDepthExceeded {
            depth,
            limit: MAX_JSON_DEPTH,
        });
    }
    let tag_byte = *bytes
        .get(*cursor)
        .ok_or(VmError::NotSerializable("truncated tag"))?;
    *cursor += 1;
    match tag_byte {
        tag::ANY => Ok(StackItem::Null),
        tag::BOOLEAN => {
            let b = *bytes
                .get(*cursor)
                .ok_or(VmError::NotSerializable("truncated bool"))?;
            *cursor += 1;
            Ok(StackItem::Boolean(b != 0))
        }
        tag::INTEGER => {
            let len = read_u32(bytes, cursor)? as usize;
            let slice = bytes
                .get(*cursor..*cursor + len)
                .ok_or(VmError::NotSerializable("truncated integer"))?;
            *cursor += len;
            Ok(StackItem::Integer(bytes_to_bigint(slice)))
        }
        tag::BYTE_STRING => {
            let len = read_u32(bytes, cursor)? as usize;
            let slice = bytes
                .get(*cursor..*cursor + len)
                .ok_or(VmError::NotSerializable("truncated bytestring"))?;
            *cursor += len;
            Ok(StackItem::byte_string(slice.to_vec()))
        }
        tag::BUFFER => {
            let len = read_u32(bytes, cursor)? as usize;
            let slice = bytes
                .get(*cursor..*cursor + len)
                .ok_or(VmError::NotSerializable("truncated buffer"))?;
            *cursor += len;
            Ok(StackItem::buffer(slice.to_vec()))
        }
        tag::ARRAY | tag::STRUCT => {
            let len = read_u32(bytes, cursor)? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(deserialize_at(bytes, cursor, depth + 1)?);
            }
            Ok(if tag_byte == tag::STRUCT {
                StackItem::new_struct(items)
            } else {
                StackItem::array(items)
            })
        }
        tag::MAP => {
            let len = read_u32(bytes, cursor)? as usize;
            let map = StackItem::map();
            if let StackItem::Map(entries) = &map {
                let mut e = entries.borrow_mut();
                for _ in 0..len {
                    let k = deserialize_at(bytes, cursor, depth + 1)?;
                    let v = deserialize_at(bytes, cursor, depth + 1)?;
                    e.push((k, v));
                }
            }
            Ok(map)
        }
        _ => Err(VmError::NotSerializable("unknown tag byte")),
    }
}

/// Converts to the JSON wire representation used by contract return values:
/// integers and byte strings become decimal/base64 strings to stay within
/// JSON's safe-integer range and avoid encoding ambiguity.
pub fn to_json(item: &StackItem) -> Result<serde_json::Value, VmError> {
    to_json_depth(item, 0)
}

fn to_json_depth(item: &StackItem, depth: usize) -> Result<serde_json::Value, VmError> {
    if depth > MAX_JSON_DEPTH {
        return Err(VmError::SerializationDepthExceeded {
            depth,
            limit: MAX_JSON_DEPTH,
        });
    }
    use serde_json::Value;
    Ok(match item {
        StackItem::Null => Value::Null,
        StackItem::Boolean(b) => Value::Bool(*b),
        StackItem::Integer(i) => Value::String(i.to_string()),
        StackItem::ByteString(b) => Value::String(base64_encode(b)),
        StackItem::Buffer(b) => Value::String(base64_encode(&b.borrow())),
        StackItem::Array(items) | StackItem::Struct(items) => {
            let mut arr = Vec::new();
            for it in items.borrow().iter() {
                arr.push(to_json_depth(it, depth + 1)?);
            }
            Value::Array(arr)
        }
        StackItem::Map(entries) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in entries.borrow().iter() {
                let key = match k {
                    StackItem::ByteString(b) => String::from_utf8_lossy(b).into_owned(),
                    StackItem::Integer(i) => i.to_string(),
                    other => return Err(VmError::InvalidCast {
                        from: other.type_name(),
                        to: "map key string",
                    }),
                };
                obj.insert(key, to_json_depth(v, depth + 1)?);
            }
            Value::Object(obj)
        }
        StackItem::InteropInterface(_) => return Err(VmError::NotSerializable("InteropInterface")),
        StackItem::Pointer(_) => return Err(VmError::NotSerializable("Pointer")),
    })
}

fn base64_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

/// Counts reachable items for the reference-counter ceiling, refusing to
/// loop forever on a cyclic structure by tracking visited pointers.
pub fn count_with_cycle_guard(item: &StackItem) -> usize {
    let mut visited = HashSet::new();
    count_rec(item, &mut visited)
}

fn count_rec(item: &StackItem, visited: &mut HashSet<usize>) -> usize {
    if let Some(id) = ptr_id(item) {
        if !visited.insert(id) {
            return 0;
        }
    }
    match item {
        StackItem::Array(items) | StackItem::Struct(items) => {
            1 + items.borrow().iter().map(|it| count_rec(it, visited)).sum::<usize>()
        }
        StackItem::Map(entries) => {
            1 + entries
                .borrow()
                .iter()
                .map(|(k, v)| count_rec(k, visited) + count_rec(v, visited))
                .sum::<usize>()
        }
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_primitives() {
        for item in [
            StackItem::Null,
            StackItem::Boolean(true),
            StackItem::int(-42),
            StackItem::byte_string(b"hello".to_vec()),
        ] {
            let bytes = serialize(&item).unwrap();
            let back = deserialize(&bytes).unwrap();
            assert!(item.structural_eq(&back));
        }
    }

    #[test]
    fn roundtrip_nested_array() {
        let arr = StackItem::array(vec![StackItem::int(1), StackItem::byte_string(b"x".to_vec())]);
        let bytes = serialize(&arr).unwrap();
        let back = deserialize(&bytes).unwrap();
        if let (StackItem::Array(a), StackItem::Array(b)) = (&arr, &back) {
            assert_eq!(a.borrow().len(), b.borrow().len());
        } else {
            panic!("expected arrays");
        }
    }

    #[test]
    fn cyclic_array_fails_serialize() {
        let arr = StackItem::array(vec![]);
        if let StackItem::Array(rc) = &arr {
            rc.borrow_mut().push(arr.clone());
        }
        assert!(serialize(&arr).is_err());
    }

    #[test]
    fn interop_interface_not_serializable() {
        let item = StackItem::InteropInterface(std::rc::Rc::new(42i32));
        assert!(serialize(&item).is_err());
    }

    #[test]
    fn json_integer_is_decimal_string() {
        let item = StackItem::int(123456789);
        let json = to_json(&item).unwrap();
        assert_eq!(json, serde_json::Value::String("123456789".into()));
    }

    #[test]
    fn cycle_guard_counts_once_per_node() {
        let arr = StackItem::array(vec![]);
        if let StackItem::Array(rc) = &arr {
            rc.borrow_mut().push(arr.clone());
        }
        assert_eq!(count_with_cycle_guard(&arr), 1);
    }
}
