//! Fixed-width word codec for operation payloads
//!
//! A payload is `selector || word*`: a 4-byte selector taken from the
//! Keccak-256 hash of the operation signature, followed by one 32-byte
//! big-endian word per argument.

use crate::crypto::{keccak256, Address, ADDRESS_LEN};
use thiserror::Error;

/// Size of an encoded argument word
pub const WORD_LEN: usize = 32;

/// Size of a call selector
pub const SELECTOR_LEN: usize = 4;

/// A 4-byte call selector
pub type Selector = [u8; SELECTOR_LEN];

/// Errors during payload decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("Payload truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("Payload has {0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("Address word has non-zero padding")]
    DirtyAddress,
    #[error("Integer word does not fit in {bits} bits")]
    ValueOverflow { bits: u32 },
    #[error("Unknown selector: 0x{}", hex::encode(.0))]
    UnknownSelector(Selector),
}

/// Selector of an operation signature such as `transfer(address,uint256)`
pub fn selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; SELECTOR_LEN];
    out.copy_from_slice(&hash[..SELECTOR_LEN]);
    out
}

/// Left-pad an address into a word
pub fn address_word(address: &Address) -> [u8; WORD_LEN] {
    let mut word = [0u8; WORD_LEN];
    word[WORD_LEN - ADDRESS_LEN..].copy_from_slice(address.as_bytes());
    word
}

/// Big-endian word of a u128
pub fn u128_word(value: u128) -> [u8; WORD_LEN] {
    let mut word = [0u8; WORD_LEN];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Big-endian word of a u64
pub fn u64_word(value: u64) -> [u8; WORD_LEN] {
    let mut word = [0u8; WORD_LEN];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Builds a payload argument by argument
#[derive(Debug, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Start a payload for the given operation signature
    pub fn call(signature: &str) -> Self {
        let mut buf = Vec::with_capacity(SELECTOR_LEN + 2 * WORD_LEN);
        buf.extend_from_slice(&selector(signature));
        Self { buf }
    }

    pub fn address(mut self, address: &Address) -> Self {
        self.buf.extend_from_slice(&address_word(address));
        self
    }

    pub fn uint128(mut self, value: u128) -> Self {
        self.buf.extend_from_slice(&u128_word(value));
        self
    }

    pub fn uint64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&u64_word(value));
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads a payload argument by argument
#[derive(Debug)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    /// Split a payload into its selector and an argument reader
    pub fn call(payload: &'a [u8]) -> Result<(Selector, Self), AbiError> {
        if payload.len() < SELECTOR_LEN {
            return Err(AbiError::Truncated {
                offset: 0,
                needed: SELECTOR_LEN,
            });
        }
        let mut sel = [0u8; SELECTOR_LEN];
        sel.copy_from_slice(&payload[..SELECTOR_LEN]);
        Ok((
            sel,
            Self {
                bytes: payload,
                offset: SELECTOR_LEN,
            },
        ))
    }

    fn word(&mut self) -> Result<&'a [u8], AbiError> {
        let end = self.offset + WORD_LEN;
        if end > self.bytes.len() {
            return Err(AbiError::Truncated {
                offset: self.offset,
                needed: WORD_LEN,
            });
        }
        let word = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(word)
    }

    pub fn address(&mut self) -> Result<Address, AbiError> {
        let word = self.word()?;
        let (padding, body) = word.split_at(WORD_LEN - ADDRESS_LEN);
        if padding.iter().any(|b| *b != 0) {
            return Err(AbiError::DirtyAddress);
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(body);
        Ok(Address::new(bytes))
    }

    pub fn uint128(&mut self) -> Result<u128, AbiError> {
        let word = self.word()?;
        if word[..16].iter().any(|b| *b != 0) {
            return Err(AbiError::ValueOverflow { bits: 128 });
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(bytes))
    }

    pub fn uint64(&mut self) -> Result<u64, AbiError> {
        let word = self.word()?;
        if word[..24].iter().any(|b| *b != 0) {
            return Err(AbiError::ValueOverflow { bits: 64 });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&word[24..]);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Require that every byte of the payload was consumed
    pub fn finish(self) -> Result<(), AbiError> {
        match self.bytes.len() - self.offset {
            0 => Ok(()),
            extra => Err(AbiError::TrailingBytes(extra)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_encode_layout() {
        let to = Address::new([0x11; 20]);
        let payload = Encoder::call("transfer(address,uint256)")
            .address(&to)
            .uint128(1000)
            .finish();

        assert_eq!(payload.len(), SELECTOR_LEN + 2 * WORD_LEN);
        assert_eq!(&payload[4..16], &[0u8; 12]);
        assert_eq!(&payload[16..36], to.as_bytes());
        assert_eq!(payload[payload.len() - 2..], [0x03, 0xe8]);
    }

    #[test]
    fn test_decode_arguments() {
        let to = Address::new([0x22; 20]);
        let payload = Encoder::call("transfer(address,uint256)")
            .address(&to)
            .uint128(u128::MAX)
            .finish();

        let (sel, mut decoder) = Decoder::call(&payload).unwrap();
        assert_eq!(sel, selector("transfer(address,uint256)"));
        assert_eq!(decoder.address().unwrap(), to);
        assert_eq!(decoder.uint128().unwrap(), u128::MAX);
        decoder.finish().unwrap();
    }

    #[test]
    fn test_truncated_payload() {
        assert!(matches!(
            Decoder::call(&[0xa9, 0x05]),
            Err(AbiError::Truncated { offset: 0, .. })
        ));

        let payload = Encoder::call("mint(uint256)").finish();
        let (_, mut decoder) = Decoder::call(&payload).unwrap();
        assert!(matches!(
            decoder.uint128(),
            Err(AbiError::Truncated { offset: 4, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut payload = Encoder::call("mint(uint256)").uint128(5).finish();
        payload.push(0);

        let (_, mut decoder) = Decoder::call(&payload).unwrap();
        decoder.uint128().unwrap();
        assert_eq!(decoder.finish(), Err(AbiError::TrailingBytes(1)));
    }

    #[test]
    fn test_dirty_address_rejected() {
        let mut payload = Encoder::call("addOwner(address)")
            .address(&Address::new([0x33; 20]))
            .finish();
        payload[4] = 1;

        let (_, mut decoder) = Decoder::call(&payload).unwrap();
        assert_eq!(decoder.address(), Err(AbiError::DirtyAddress));
    }

    #[test]
    fn test_oversized_integer_rejected() {
        let mut payload = Encoder::call("changeRequirement(uint256)").uint64(2).finish();
        payload[4] = 1;

        let (_, mut decoder) = Decoder::call(&payload).unwrap();
        assert_eq!(decoder.uint64(), Err(AbiError::ValueOverflow { bits: 64 }));
    }
}
