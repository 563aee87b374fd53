//! Cryptographic primitives: hashing, Base58Check addresses, ECDSA over
//! secp256r1/secp256k1, and Merkle trees.

pub mod address;
pub mod ecdsa;
pub mod hashing;
pub mod merkle;

pub use address::{decode_address, encode_address, AddressError};
pub use ecdsa::{
    check_multisig, verify_secp256k1, verify_secp256r1, EcdsaError, Secp256k1KeyPair,
    Secp256r1KeyPair,
};
pub use hashing::{hash160, hash256, keccak256, script_hash, sha256};
pub use merkle::{merkle_proof, merkle_root, verify_proof, MerkleProof};
