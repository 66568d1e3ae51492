//! The seam through which a wallet performs its operations

use crate::abi::AbiError;
use crate::crypto::Address;
use crate::multisig::owners::OwnerError;
use crate::token::TokenError;
use thiserror::Error;

/// Why an executed operation failed
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Token call failed: {0}")]
    Token(#[from] TokenError),
    #[error("Insufficient native balance: have {have}, need {need}")]
    InsufficientValue { have: u128, need: u128 },
    #[error("No contract at {0} accepts a payload")]
    UnknownTarget(Address),
    #[error("Malformed payload: {0}")]
    Abi(#[from] AbiError),
    #[error("Owner change rejected: {0}")]
    Owners(#[from] OwnerError),
    #[error("A wallet cannot send value to itself (got {0})")]
    NonPayableSelfCall(u128),
}

/// Performs `(target, value, payload)` on behalf of a wallet
///
/// Implementations must leave no trace when they return an error.
pub trait Executor {
    fn call(
        &mut self,
        caller: &Address,
        target: &Address,
        value: u128,
        payload: &[u8],
    ) -> Result<(), CallError>;
}
