//! Fungible token ledger
//!
//! Provides the balance ledger both authorization engines move value on:
//! - Balances per address with a hard supply cap
//! - Owner-gated minting, burning and transfers
//! - Encoded calls so a quorum wallet can drive the token
//!
//! # Example
//!
//! ```ignore
//! use mini_treasury::token::{Token, TokenCall, TokenMetadata};
//!
//! let metadata = TokenMetadata::new("Treasury".into(), "TRS".into(), 18, 10u128.pow(30))?;
//! let mut token = Token::new(token_address, metadata, wallet_address);
//!
//! // A quorum wallet mints by invoking the token with an encoded call
//! token.invoke(&wallet_address, 0, &TokenCall::Mint { amount: 10u128.pow(28) }.encode())?;
//! ```

pub mod call;
pub mod ledger;
pub mod token;

pub use call::TokenCall;
pub use ledger::Ledger;
pub use token::{Token, TokenError, TokenEvent, TokenMetadata};
