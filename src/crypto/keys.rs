//! ECDSA key management
//!
//! Provides key pair generation, recoverable signing and signer recovery
//! using the secp256k1 elliptic curve.

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::address::Address;
use super::hash::Hash32;

/// Length of a recoverable signature: `r || s || v`
pub const SIGNATURE_LEN: usize = 65;

/// Half the secp256k1 group order. Signatures with a larger `s` are malleable.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
    0x20, 0xa0,
];

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("Non-canonical signature: s is in the upper half of the curve order")]
    MalleableSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A recoverable ECDSA signature (`r || s || v`, with `v` in {27, 28})
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Wrap raw signature bytes
    pub const fn new(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a 65-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; SIGNATURE_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self(array))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// The recovery byte
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    fn recovery_id(&self) -> Result<RecoveryId, KeyError> {
        let id = match self.v() {
            27 | 28 => self.v() - 27,
            0 | 1 => self.v(),
            other => return Err(KeyError::InvalidRecoveryId(other)),
        };
        Ok(RecoveryId::from_i32(i32::from(id))?)
    }

    fn is_low_s(&self) -> bool {
        self.0[32..64] <= HALF_ORDER[..]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| KeyError::InvalidSignature)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let digits = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let bytes = hex::decode(digits).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Address controlled by this key
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    /// Sign a 32-byte hash recoverably
    pub fn sign(&self, hash: &Hash32) -> Signature {
        sign_recoverable(&self.secret_key, hash)
    }
}

/// Sign a 32-byte hash, producing `r || s || v` with `v` in {27, 28}
pub fn sign_recoverable(secret_key: &SecretKey, hash: &Hash32) -> Signature {
    let secp = Secp256k1::new();
    let message = Message::from_digest(*hash);
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();

    let mut bytes = [0u8; SIGNATURE_LEN];
    bytes[..64].copy_from_slice(&compact);
    // libsecp256k1 only yields 0 or 1 for signatures it produces
    bytes[64] = 27 + recovery_id.to_i32() as u8;
    Signature(bytes)
}

/// Recover the public key that produced `signature` over `hash`
pub fn recover_public_key(hash: &Hash32, signature: &Signature) -> Result<PublicKey, KeyError> {
    if !signature.is_low_s() {
        return Err(KeyError::MalleableSignature);
    }

    let secp = Secp256k1::new();
    let recovery_id = signature.recovery_id()?;
    let recoverable = RecoverableSignature::from_compact(&signature.0[..64], recovery_id)
        .map_err(|_| KeyError::InvalidSignature)?;
    let message = Message::from_digest(*hash);

    secp.recover_ecdsa(&message, &recoverable)
        .map_err(|_| KeyError::InvalidSignature)
}

/// Recover the address that produced `signature` over `hash`
pub fn recover_address(hash: &Hash32, signature: &Signature) -> Result<Address, KeyError> {
    recover_public_key(hash, signature).map(|pk| Address::from_public_key(&pk))
}
