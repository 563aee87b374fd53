//! Base58Check address codec: `Base58Check(version_byte || short_hash)`.

use thiserror::Error;

use node_types::UInt160;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("base58 decode failed: {0}")]
    Base58(String),
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("unexpected payload length {0}, expected 21")]
    BadLength(usize),
    #[error("address version byte {found} does not match expected {expected}")]
    WrongVersion { found: u8, expected: u8 },
}

pub fn encode_address(version: u8, account: &UInt160) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(&account.0);
    bs58::encode(checksum_append(&payload)).into_string()
}

pub fn decode_address(version: u8, address: &str) -> Result<UInt160, AddressError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::Base58(e.to_string()))?;
    if bytes.len() != 25 {
        return Err(AddressError::BadLength(bytes.len()));
    }
    let (payload, checksum) = bytes.split_at(21);
    let expected = &crate::hashing::sha256(&crate::hashing::sha256(payload))[..4];
    if checksum != expected {
        return Err(AddressError::BadChecksum);
    }
    if payload[0] != version {
        return Err(AddressError::WrongVersion {
            found: payload[0],
            expected: version,
        });
    }
    UInt160::from_bytes(&payload[1..]).map_err(|_| AddressError::BadLength(payload.len() - 1))
}

fn checksum_append(payload: &[u8]) -> Vec<u8> {
    let checksum = crate::hashing::sha256(&crate::hashing::sha256(payload));
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.extend_from_slice(payload);
    out.extend_from_slice(&checksum[..4]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let account = UInt160([42u8; 20]);
        let addr = encode_address(0x35, &account);
        let back = decode_address(0x35, &addr).unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn wrong_version_rejected() {
        let account = UInt160([1u8; 20]);
        let addr = encode_address(0x35, &account);
        assert_eq!(
            decode_address(0x17, &addr),
            Err(AddressError::WrongVersion {
                found: 0x35,
                expected: 0x17
            })
        );
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let account = UInt160([1u8; 20]);
        let mut addr = encode_address(0x35, &account);
        addr.push('z');
        assert!(decode_address(0x35, &addr).is_err());
    }
}
