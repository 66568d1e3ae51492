//! Delegated transfer authority
//!
//! Verifies signed transfer permits and executes them against a ledger.
//! Every account has a nonce starting at zero; a permit is only valid for
//! the account's current nonce, and each accepted permit advances it by one.

use crate::crypto::{Address, Signature};
use crate::permit::fee::FeePolicy;
use crate::permit::message::TransferPermit;
use crate::token::{Ledger, TokenError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors related to permit verification and relay
#[derive(Error, Debug)]
pub enum PermitError {
    #[error("Expired signature")]
    ExpiredSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Protocol fee {fee} exceeds transfer amount {amount}")]
    FeeExceedsAmount { fee: u128, amount: u128 },
    #[error("Nonce exhausted for {0}")]
    NonceOverflow(Address),
    #[error("Invalid fee policy: basis points above 10000 or no fee collector")]
    InvalidFeePolicy,
    #[error(transparent)]
    Ledger(#[from] TokenError),
}

/// A signed transfer as submitted by a relayer
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedTransfer {
    pub from: Address,
    pub to: Address,
    pub amount: u128,
    pub expiry: u64,
    pub signature: Signature,
}

/// Outcome of an accepted permit
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegatedTransferReceipt {
    pub from: Address,
    pub to: Address,
    /// Amount debited from `from`
    pub amount: u128,
    /// Part of `amount` sent to the fee collector
    pub fee: u128,
    /// Nonce the permit consumed
    pub nonce: u64,
}

/// Per-account nonces and the fee policy for one token on one chain
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelegatedTransferAuthority {
    chain_id: u64,
    token: Address,
    fee_policy: FeePolicy,
    nonces: HashMap<Address, u64>,
}

impl DelegatedTransferAuthority {
    pub fn new(chain_id: u64, token: Address, fee_policy: FeePolicy) -> Result<Self, PermitError> {
        if !fee_policy.is_valid() {
            return Err(PermitError::InvalidFeePolicy);
        }
        Ok(Self {
            chain_id,
            token,
            fee_policy,
            nonces: HashMap::new(),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.fee_policy
    }

    pub fn set_fee_policy(&mut self, fee_policy: FeePolicy) -> Result<(), PermitError> {
        if !fee_policy.is_valid() {
            return Err(PermitError::InvalidFeePolicy);
        }
        self.fee_policy = fee_policy;
        Ok(())
    }

    /// Current nonce of an account
    pub fn nonce_of(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    /// Fee charged on a transfer of `amount` under the current policy
    pub fn protocol_fee(&self, amount: u128) -> u128 {
        self.fee_policy.protocol_fee(amount)
    }

    /// The permit `from` has to sign for its next transfer
    pub fn permit_for(&self, from: &Address, to: &Address, amount: u128, expiry: u64) -> TransferPermit {
        TransferPermit {
            chain_id: self.chain_id,
            token: self.token,
            from: *from,
            to: *to,
            amount,
            nonce: self.nonce_of(from),
            expiry,
        }
    }

    /// Check expiry and signer without touching any state
    ///
    /// Returns the nonce the transfer would consume.
    pub fn verify(&self, transfer: &SignedTransfer, now: u64) -> Result<u64, PermitError> {
        if transfer.expiry <= now {
            return Err(PermitError::ExpiredSignature);
        }

        let permit = self.permit_for(&transfer.from, &transfer.to, transfer.amount, transfer.expiry);
        match permit.signer(&transfer.signature) {
            Ok(signer) if signer == transfer.from => Ok(permit.nonce),
            Ok(signer) => {
                log::debug!("Permit for {} signed by {}", transfer.from, signer);
                Err(PermitError::InvalidSignature)
            }
            Err(e) => {
                log::debug!("Unrecoverable permit signature: {}", e);
                Err(PermitError::InvalidSignature)
            }
        }
    }

    /// Move `amount` from the signer to the recipient
    pub fn delegated_transfer<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        transfer: &SignedTransfer,
        now: u64,
    ) -> Result<DelegatedTransferReceipt, PermitError> {
        let nonce = self.verify(transfer, now)?;
        self.consume(&transfer.from, nonce)?;

        if let Err(e) = ledger.transfer(&transfer.from, &transfer.to, transfer.amount) {
            self.restore(&transfer.from, nonce);
            return Err(e.into());
        }

        log::info!(
            "Permit {} of {} consumed: {} -> {}",
            nonce,
            transfer.from,
            transfer.amount,
            transfer.to
        );
        Ok(DelegatedTransferReceipt {
            from: transfer.from,
            to: transfer.to,
            amount: transfer.amount,
            fee: 0,
            nonce,
        })
    }

    /// Like [`delegated_transfer`](Self::delegated_transfer), but the
    /// protocol fee is carved out of `amount` and sent to the collector
    ///
    /// Either both transfers happen and the nonce advances, or nothing changes.
    pub fn delegated_transfer_with_fee<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        transfer: &SignedTransfer,
        now: u64,
    ) -> Result<DelegatedTransferReceipt, PermitError> {
        let nonce = self.verify(transfer, now)?;

        let fee = self.protocol_fee(transfer.amount);
        let net = transfer
            .amount
            .checked_sub(fee)
            .ok_or(PermitError::FeeExceedsAmount {
                fee,
                amount: transfer.amount,
            })?;
        let collector = self.fee_policy.collector;

        // Both legs come out of the holder's balance; check it up front so a
        // rejected call leaves no trace in the ledger
        let have = ledger.balance_of(&transfer.from);
        if have < transfer.amount {
            return Err(TokenError::InsufficientBalance {
                have,
                need: transfer.amount,
            }
            .into());
        }

        self.consume(&transfer.from, nonce)?;

        if fee > 0 {
            if let Err(e) = ledger.transfer(&transfer.from, &collector, fee) {
                self.restore(&transfer.from, nonce);
                return Err(e.into());
            }
        }

        if let Err(e) = ledger.transfer(&transfer.from, &transfer.to, net) {
            if fee > 0 {
                if let Err(undo) = ledger.transfer(&collector, &transfer.from, fee) {
                    log::error!("Could not return fee {} to {}: {}", fee, transfer.from, undo);
                }
            }
            self.restore(&transfer.from, nonce);
            return Err(e.into());
        }

        log::info!(
            "Permit {} of {} consumed: {} -> {} (fee {} to {})",
            nonce,
            transfer.from,
            net,
            transfer.to,
            fee,
            collector
        );
        Ok(DelegatedTransferReceipt {
            from: transfer.from,
            to: transfer.to,
            amount: transfer.amount,
            fee,
            nonce,
        })
    }

    fn consume(&mut self, account: &Address, nonce: u64) -> Result<(), PermitError> {
        let next = nonce
            .checked_add(1)
            .ok_or(PermitError::NonceOverflow(*account))?;
        self.nonces.insert(*account, next);
        Ok(())
    }

    fn restore(&mut self, account: &Address, nonce: u64) {
        if nonce == 0 {
            self.nonces.remove(account);
        } else {
            self.nonces.insert(*account, nonce);
        }
    }
}
