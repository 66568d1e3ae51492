//! Host chain
//!
//! [`Chain`] is the serialized execution environment the wallets and the
//! permit authority run in. It owns all balances, dispatches wallet
//! operations to the token or to plain accounts, and queues a
//! [`ChainEvent`] for everything observable that happens.

pub mod chain;

pub use chain::{wall_clock, Chain, ChainEnv, ChainError, ChainEvent};
