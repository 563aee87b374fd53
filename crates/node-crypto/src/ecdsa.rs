//! ECDSA over secp256r1 (the protocol's default curve) and secp256k1
//! (exposed through the CryptoLib native contract).

use p256::ecdsa::{
    signature::{Signer as _, Verifier as _},
    Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey,
};
use k256::ecdsa::{
    signature::{Signer as _, Verifier as _},
    Signature as K256Signature, SigningKey as K256SigningKey, VerifyingKey as K256VerifyingKey,
};
use thiserror::Error;

use node_types::PublicKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EcdsaError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("signature does not verify")]
    VerificationFailed,
    #[error("invalid private key")]
    InvalidPrivateKey,
}

pub struct Secp256r1KeyPair {
    signing_key: P256SigningKey,
}

impl Secp256r1KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: P256SigningKey::random(&mut rand::thread_rng()),
        }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, EcdsaError> {
        let signing_key =
            P256SigningKey::from_bytes(bytes.into()).map_err(|_| EcdsaError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> PublicKey {
        let sec1 = self.signing_key.verifying_key().to_encoded_point(true);
        PublicKey::from_bytes(sec1.as_bytes()).expect("sec1 compressed point is always 33 bytes")
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let sig: P256Signature = self.signing_key.sign(message);
        sig.to_bytes().into()
    }
}

/// Verify a secp256r1 signature against a compressed public key, the
/// primitive backing `System.Crypto.CheckSig` and witness verification.
pub fn verify_secp256r1(
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), EcdsaError> {
    let key =
        P256VerifyingKey::from_sec1_bytes(&public_key.0).map_err(|_| EcdsaError::InvalidPublicKey)?;
    let sig = P256Signature::from_slice(signature).map_err(|_| EcdsaError::InvalidSignature)?;
    key.verify(message, &sig)
        .map_err(|_| EcdsaError::VerificationFailed)
}

/// Verify a secp256k1 signature, exposed via the CryptoLib native contract
/// for Ethereum/Bitcoin-style interop.
pub fn verify_secp256k1(
    public_key_sec1: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), EcdsaError> {
    let key =
        K256VerifyingKey::from_sec1_bytes(public_key_sec1).map_err(|_| EcdsaError::InvalidPublicKey)?;
    let sig = K256Signature::from_slice(signature).map_err(|_| EcdsaError::InvalidSignature)?;
    key.verify(message, &sig)
        .map_err(|_| EcdsaError::VerificationFailed)
}

pub struct Secp256k1KeyPair {
    signing_key: K256SigningKey,
}

impl Secp256k1KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: K256SigningKey::random(&mut rand::thread_rng()),
        }
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let sig: K256Signature = self.signing_key.sign(message);
        sig.to_bytes().into()
    }

    pub fn public_key_sec1(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }
}

/// Checks a BFT-style M-of-N multisignature: at least `m` of the given
/// public keys must each have produced a valid signature over `message`,
/// matched in order (the standard "multisig verification script" semantics
/// used by the standing committee's `next_consensus` witness).
pub fn check_multisig(
    public_keys: &[PublicKey],
    signatures: &[Vec<u8>],
    message: &[u8],
    m: usize,
) -> bool {
    if signatures.len() < m || m == 0 {
        return false;
    }
    let mut key_iter = public_keys.iter();
    let mut matched = 0;
    'sig: for sig in signatures {
        for key in key_iter.by_ref() {
            if verify_secp256r1(key, message, sig).is_ok() {
                matched += 1;
                continue 'sig;
            }
        }
        break;
    }
    matched >= m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secp256r1_sign_verify_roundtrip() {
        let kp = Secp256r1KeyPair::generate();
        let msg = b"hello neo";
        let sig = kp.sign(msg);
        assert!(verify_secp256r1(&kp.public_key(), msg, &sig).is_ok());
    }

    #[test]
    fn secp256r1_wrong_message_fails() {
        let kp = Secp256r1KeyPair::generate();
        let sig = kp.sign(b"one");
        assert!(verify_secp256r1(&kp.public_key(), b"two", &sig).is_err());
    }

    #[test]
    fn secp256k1_sign_verify_roundtrip() {
        let kp = Secp256k1KeyPair::generate();
        let msg = b"cryptolib";
        let sig = kp.sign(msg);
        assert!(verify_secp256k1(&kp.public_key_sec1(), msg, &sig).is_ok());
    }

    #[test]
    fn multisig_requires_m_distinct_matches() {
        let kps: Vec<_> = (0..3).map(|_| Secp256r1KeyPair::generate()).collect();
        let pubkeys: Vec<_> = kps.iter().map(|k| k.public_key()).collect();
        let msg = b"block witness";
        let sigs: Vec<Vec<u8>> = kps.iter().map(|k| k.sign(msg).to_vec()).collect();
        assert!(check_multisig(&pubkeys, &sigs[..2], msg, 2));
        assert!(!check_multisig(&pubkeys, &sigs[..1], msg, 2));
    }
}
