//! Operation payload encoding
//!
//! Quorum transactions carry an opaque payload describing the operation to
//! dispatch. Payloads use a selector followed by fixed-width 32-byte words;
//! the same word encoding is used to build permit digests.

pub mod codec;

pub use codec::{
    address_word, selector, u128_word, u64_word, AbiError, Decoder, Encoder, Selector,
    SELECTOR_LEN, WORD_LEN,
};
