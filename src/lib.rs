//! Mini-Treasury: quorum-controlled wallets and signed transfer permits
//!
//! This crate provides two independent authorization engines over a
//! fungible token ledger:
//! - M-of-N quorum wallets: owners submit, confirm and revoke transactions;
//!   a transaction executes exactly once after enough confirmations and a
//!   failed execution stays confirmed for a later retry
//! - Delegated transfers: a token holder signs a permit bound to chain,
//!   token, recipient, amount, nonce and expiry, and anyone may relay it,
//!   optionally carving a protocol fee out of the amount
//! - secp256k1 recoverable signatures over Keccak-256 digests
//! - A single-threaded host chain with event log and JSON persistence
//!
//! # Example
//!
//! ```rust
//! use mini_treasury::config::TreasuryConfig;
//! use mini_treasury::crypto::KeyPair;
//! use mini_treasury::host::Chain;
//!
//! let deployer = KeyPair::generate();
//! let holder = KeyPair::generate();
//! let mut chain = Chain::from_config(&TreasuryConfig::default(), &deployer.address(), 1_700_000_000).unwrap();
//!
//! // The holder signs a permit for their current nonce
//! let permit = chain.permit_for(&holder.address(), &deployer.address(), 0, 1_700_003_600);
//! let signature = permit.sign(&holder);
//! assert_eq!(permit.signer(&signature).unwrap(), holder.address());
//! ```

pub mod abi;
pub mod api;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod host;
pub mod keystore;
pub mod multisig;
pub mod permit;
pub mod storage;
pub mod token;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use config::TreasuryConfig;
pub use crypto::{Address, KeyPair, Signature};
pub use host::{Chain, ChainError, ChainEvent};
pub use keystore::{Account, KeyStore};
pub use multisig::{Proposal, QuorumWallet, WalletCall, WalletError, WalletRegistry};
pub use permit::{DelegatedTransferAuthority, FeePolicy, PermitError, SignedTransfer, TransferPermit};
pub use storage::Storage;
pub use token::{Token, TokenCall, TokenMetadata};
