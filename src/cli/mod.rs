//! Command-line interface
//!
//! Handlers behind the `treasury` binary. Each handler acts on an
//! [`AppState`] loaded from the data directory.

pub mod commands;

pub use commands::*;
