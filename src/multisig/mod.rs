//! Quorum (M-of-N) wallets
//!
//! A wallet holds an owner set and a requirement M. Any owner may submit an
//! operation `(target, value, payload)`; it runs once M distinct current
//! owners have confirmed it, and it runs at most once.
//!
//! # Example
//!
//! ```ignore
//! use mini_treasury::multisig::{Proposal, WalletRegistry};
//!
//! // Create a 2-of-3 wallet
//! let created = registry.create_wallet(&alice, vec![alice, bob, carol], 2)?;
//! let wallet = registry.get_mut(&created.wallet).unwrap();
//!
//! // Alice proposes, Bob's confirmation executes it
//! let receipt = wallet.submit(&alice, proposal, &mut host)?;
//! wallet.confirm(&bob, receipt.transaction_id, &mut host)?;
//! ```

pub mod call;
pub mod executor;
pub mod owners;
pub mod registry;
pub mod transaction;
pub mod wallet;

pub use call::WalletCall;
pub use executor::{CallError, Executor};
pub use owners::{OwnerError, OwnerSet, MAX_OWNER_COUNT};
pub use registry::{ContractInstantiation, WalletRegistry};
pub use transaction::{
    PendingTransaction, Proposal, TransactionId, TransactionStatus, TransactionTable,
};
pub use wallet::{ExecutionOutcome, QuorumWallet, Receipt, WalletError, WalletEvent};
