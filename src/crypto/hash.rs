//! Cryptographic hashing utilities
//!
//! Keccak-256 is used for account addresses, call selectors and permit
//! digests.

use sha3::{Digest, Keccak256};

/// A 32-byte hash value
pub type Hash32 = [u8; 32];

/// Prefix applied to a 32-byte digest before it is signed as a permit
const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Computes the Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Computes Keccak-256 and returns it as a hex string
pub fn keccak256_hex(data: &[u8]) -> String {
    hex::encode(keccak256(data))
}

/// Hash that is actually signed for a permit digest.
///
/// The prefix keeps permit signatures from ever being valid as signatures
/// over raw 32-byte payloads.
pub fn eth_signed_message_hash(digest: &Hash32) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(SIGNED_MESSAGE_PREFIX);
    hasher.update(digest);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
