//! Local signing accounts
//!
//! Each account is a secp256k1 key stored as `<address>.json` in the key
//! directory.

pub mod account;

pub use account::{Account, AccountInfo, KeyStore, KeyStoreError};
