//! Cryptographic utilities
//!
//! This module provides:
//! - 20-byte account addresses
//! - Keccak-256 hashing
//! - ECDSA key management and signer recovery (secp256k1)

pub mod address;
pub mod hash;
pub mod keys;

pub use address::{Address, ADDRESS_LEN};
pub use hash::{eth_signed_message_hash, keccak256, keccak256_hex, Hash32};
pub use keys::{
    recover_address, recover_public_key, sign_recoverable, KeyError, KeyPair, Signature,
    SIGNATURE_LEN,
};
