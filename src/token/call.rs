//! Encoded token operations
//!
//! These are the payloads a quorum wallet submits when it targets the token.

use crate::abi::{selector, AbiError, Decoder, Encoder};
use crate::crypto::Address;

const TRANSFER: &str = "transfer(address,uint256)";
const MINT: &str = "mint(uint256)";
const BURN: &str = "burn(uint256)";
const TRANSFER_OWNERSHIP: &str = "transferOwnership(address)";

/// A call the token understands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenCall {
    /// Move tokens from the caller to `to`
    Transfer { to: Address, amount: u128 },
    /// Mint to the caller (owner only)
    Mint { amount: u128 },
    /// Destroy tokens held by the caller
    Burn { amount: u128 },
    /// Hand the minting role to `new_owner` (owner only)
    TransferOwnership { new_owner: Address },
}

impl TokenCall {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            TokenCall::Transfer { to, amount } => {
                Encoder::call(TRANSFER).address(to).uint128(*amount).finish()
            }
            TokenCall::Mint { amount } => Encoder::call(MINT).uint128(*amount).finish(),
            TokenCall::Burn { amount } => Encoder::call(BURN).uint128(*amount).finish(),
            TokenCall::TransferOwnership { new_owner } => {
                Encoder::call(TRANSFER_OWNERSHIP).address(new_owner).finish()
            }
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, AbiError> {
        let (sel, mut args) = Decoder::call(payload)?;

        let call = if sel == selector(TRANSFER) {
            TokenCall::Transfer {
                to: args.address()?,
                amount: args.uint128()?,
            }
        } else if sel == selector(MINT) {
            TokenCall::Mint {
                amount: args.uint128()?,
            }
        } else if sel == selector(BURN) {
            TokenCall::Burn {
                amount: args.uint128()?,
            }
        } else if sel == selector(TRANSFER_OWNERSHIP) {
            TokenCall::TransferOwnership {
                new_owner: args.address()?,
            }
        } else {
            return Err(AbiError::UnknownSelector(sel));
        };

        args.finish()?;
        Ok(call)
    }
}
