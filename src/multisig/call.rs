//! Owner-management operations
//!
//! A wallet only changes its own owner set when it calls itself with one of
//! these payloads, so every change goes through the same quorum as any other
//! transaction.

use crate::abi::{selector, AbiError, Decoder, Encoder};
use crate::crypto::Address;

const ADD_OWNER: &str = "addOwner(address)";
const REMOVE_OWNER: &str = "removeOwner(address)";
const REPLACE_OWNER: &str = "replaceOwner(address,address)";
const CHANGE_REQUIREMENT: &str = "changeRequirement(uint256)";

/// A call a wallet makes to itself
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletCall {
    AddOwner { owner: Address },
    RemoveOwner { owner: Address },
    ReplaceOwner { owner: Address, new_owner: Address },
    ChangeRequirement { required: u64 },
}

impl WalletCall {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            WalletCall::AddOwner { owner } => Encoder::call(ADD_OWNER).address(owner).finish(),
            WalletCall::RemoveOwner { owner } => {
                Encoder::call(REMOVE_OWNER).address(owner).finish()
            }
            WalletCall::ReplaceOwner { owner, new_owner } => Encoder::call(REPLACE_OWNER)
                .address(owner)
                .address(new_owner)
                .finish(),
            WalletCall::ChangeRequirement { required } => {
                Encoder::call(CHANGE_REQUIREMENT).uint64(*required).finish()
            }
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, AbiError> {
        let (sel, mut args) = Decoder::call(payload)?;

        let call = if sel == selector(ADD_OWNER) {
            WalletCall::AddOwner {
                owner: args.address()?,
            }
        } else if sel == selector(REMOVE_OWNER) {
            WalletCall::RemoveOwner {
                owner: args.address()?,
            }
        } else if sel == selector(REPLACE_OWNER) {
            WalletCall::ReplaceOwner {
                owner: args.address()?,
                new_owner: args.address()?,
            }
        } else if sel == selector(CHANGE_REQUIREMENT) {
            WalletCall::ChangeRequirement {
                required: args.uint64()?,
            }
        } else {
            return Err(AbiError::UnknownSelector(sel));
        };

        args.finish()?;
        Ok(call)
    }
}
