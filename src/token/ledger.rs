//! The ledger surface consumed by the delegated transfer authority

use crate::crypto::Address;
use crate::token::token::{TokenError, TokenEvent};

/// Balance bookkeeping that permit-driven transfers are applied to.
///
/// Implementations must make each `transfer` atomic: on error no balance
/// has moved.
pub trait Ledger {
    fn balance_of(&self, account: &Address) -> u128;

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<TokenEvent, TokenError>;
}
