//! Account addresses
//!
//! Every actor on the ledger (key holders, quorum wallets, the token itself)
//! is identified by a 20-byte address.

use super::hash::keccak256;
use super::keys::KeyError;
use secp256k1::PublicKey;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The null address
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Wrap raw address bytes
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an address from a 20-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidAddress(hex::encode(bytes)))?;
        Ok(Self(array))
    }

    /// Address controlled by a public key: the last 20 bytes of
    /// `keccak256(x || y)` over the uncompressed point.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let uncompressed = public_key.serialize_uncompressed();
        let hash = keccak256(&uncompressed[1..]);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Address of a contract instantiated by `creator` at deployment `nonce`
    pub fn derive(creator: &Address, nonce: u64) -> Self {
        let mut input = Vec::with_capacity(ADDRESS_LEN + 8);
        input.extend_from_slice(creator.as_bytes());
        input.extend_from_slice(&nonce.to_be_bytes());
        let hash = keccak256(&input);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Whether this is the null address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| KeyError::InvalidAddress(s.to_string()))?;
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(KeyError::InvalidAddress(s.to_string()));
        }
        let bytes = hex::decode(digits).map_err(|_| KeyError::InvalidAddress(s.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl Visitor<'_> for AddressVisitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 0x-prefixed 20-byte hex address")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Address, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(AddressVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use std::collections::HashMap;

    #[test]
    fn test_display_and_parse() {
        let address = Address::new([0xab; 20]);
        let text = address.to_string();
        assert_eq!(text, format!("0x{}", "ab".repeat(20)));
        assert_eq!(text.parse::<Address>().unwrap(), address);
        assert_eq!(text.to_uppercase().replace("0X", "0x").parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("ab".repeat(20).parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!(format!("0x{}", "zz".repeat(20)).parse::<Address>().is_err());
    }

    #[test]
    fn test_address_of_key_is_stable() {
        let kp = KeyPair::generate();
        assert_eq!(Address::from_public_key(&kp.public_key), kp.address());
        assert!(!kp.address().is_zero());
    }

    #[test]
    fn test_derived_addresses_are_distinct() {
        let creator = Address::new([1; 20]);
        assert_ne!(Address::derive(&creator, 0), Address::derive(&creator, 1));
        assert_eq!(Address::derive(&creator, 7), Address::derive(&creator, 7));
    }

    #[test]
    fn test_serde_as_map_key() {
        let mut balances = HashMap::new();
        balances.insert(Address::new([2; 20]), 42u64);

        let json = serde_json::to_string(&balances).unwrap();
        assert!(json.contains(&Address::new([2; 20]).to_string()));

        let back: HashMap<Address, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, balances);
    }
}
