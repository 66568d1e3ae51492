//! Quorum wallet implementation
//!
//! Owners submit operations, confirm or revoke them, and the operation runs
//! once M of the N owners have confirmed. The call that brings a transaction
//! to the threshold performs the execution.

use crate::crypto::Address;
use crate::multisig::call::WalletCall;
use crate::multisig::executor::{CallError, Executor};
use crate::multisig::owners::{OwnerError, OwnerSet};
use crate::multisig::transaction::{
    PendingTransaction, Proposal, TransactionId, TransactionStatus, TransactionTable,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to quorum wallet operations
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Caller is not an owner: {0}")]
    Unauthorized(Address),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),
    #[error("Transaction {id} already confirmed by {owner}")]
    AlreadyConfirmed { id: TransactionId, owner: Address },
    #[error("Transaction {id} not confirmed by {owner}")]
    NotConfirmed { id: TransactionId, owner: Address },
    #[error("Transaction already executed: {0}")]
    AlreadyExecuted(TransactionId),
    #[error("Transaction {id} has {have} of {need} confirmations")]
    ThresholdNotMet {
        id: TransactionId,
        have: usize,
        need: usize,
    },
    #[error("Execution of transaction {id} failed: {source}")]
    ExecutionFailed {
        id: TransactionId,
        source: CallError,
    },
    #[error("Transaction target cannot be the null address")]
    NullTarget,
    #[error("Invalid owner set: {0}")]
    InvalidOwners(#[from] OwnerError),
}

/// Observable wallet state changes, in the order they happened
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum WalletEvent {
    Submission { transaction_id: TransactionId },
    Confirmation { sender: Address, transaction_id: TransactionId },
    Revocation { sender: Address, transaction_id: TransactionId },
    Execution { transaction_id: TransactionId },
    ExecutionFailure { transaction_id: TransactionId, reason: String },
    OwnerAddition { owner: Address },
    OwnerRemoval { owner: Address },
    RequirementChange { required: usize },
}

/// What happened to a transaction during a submit or confirm call
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Still below the threshold
    Pending,
    /// Reached the threshold and ran successfully
    Executed,
    /// Reached the threshold but the operation failed; the transaction
    /// stays confirmed and can be executed again later
    Failed(String),
}

/// Result of a submit or confirm call
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_id: TransactionId,
    pub outcome: ExecutionOutcome,
}

/// An M-of-N quorum wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuorumWallet {
    /// Wallet address
    pub address: Address,
    /// Owners and requirement
    owners: OwnerSet,
    /// Every transaction ever submitted
    transactions: TransactionTable,
    /// Event log
    events: Vec<WalletEvent>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl QuorumWallet {
    /// Create a wallet with no transactions
    pub fn new(address: Address, owners: OwnerSet) -> Self {
        Self {
            address,
            owners,
            transactions: TransactionTable::new(),
            events: Vec::new(),
            created_at: Utc::now(),
        }
    }

    // =========================================================================
    // View Functions
    // =========================================================================

    pub fn owner_set(&self) -> &OwnerSet {
        &self.owners
    }

    pub fn owners(&self) -> &[Address] {
        self.owners.owners()
    }

    pub fn required(&self) -> usize {
        self.owners.required()
    }

    pub fn is_owner(&self, address: &Address) -> bool {
        self.owners.contains(address)
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&PendingTransaction> {
        self.transactions.get(id)
    }

    pub fn transactions(&self) -> &TransactionTable {
        &self.transactions
    }

    pub fn events(&self) -> &[WalletEvent] {
        &self.events
    }

    /// Confirmations from current owners
    pub fn confirmation_count(&self, id: TransactionId) -> Result<usize, WalletError> {
        Ok(self.lookup(id)?.confirmation_count(self.owners()))
    }

    /// Current owners that confirmed, in owner order
    pub fn confirmations(&self, id: TransactionId) -> Result<Vec<Address>, WalletError> {
        let tx = self.lookup(id)?;
        Ok(self
            .owners()
            .iter()
            .filter(|owner| tx.is_confirmed_by(owner))
            .copied()
            .collect())
    }

    /// Whether the transaction has reached the threshold
    pub fn is_confirmed(&self, id: TransactionId) -> Result<bool, WalletError> {
        Ok(self.confirmation_count(id)? >= self.required())
    }

    pub fn status(&self, id: TransactionId) -> Result<TransactionStatus, WalletError> {
        Ok(self.lookup(id)?.status(self.owners(), self.required()))
    }

    /// Number of transactions matching the filter
    pub fn transaction_count(&self, include_pending: bool, include_executed: bool) -> usize {
        self.transactions
            .iter()
            .filter(|tx| matches_filter(tx, include_pending, include_executed))
            .count()
    }

    /// Ids of matching transactions at positions `from..to` of the filtered list
    pub fn transaction_ids(
        &self,
        from: usize,
        to: usize,
        include_pending: bool,
        include_executed: bool,
    ) -> Vec<TransactionId> {
        self.transactions
            .iter()
            .filter(|tx| matches_filter(tx, include_pending, include_executed))
            .skip(from)
            .take(to.saturating_sub(from))
            .map(|tx| tx.id)
            .collect()
    }

    // =========================================================================
    // Quorum Operations
    // =========================================================================

    /// Propose an operation; the submitter's confirmation is recorded at once
    ///
    /// If that single confirmation already meets the requirement the
    /// operation runs as part of this call.
    pub fn submit(
        &mut self,
        caller: &Address,
        proposal: Proposal,
        executor: &mut dyn Executor,
    ) -> Result<Receipt, WalletError> {
        self.ensure_owner(caller)?;
        if proposal.target.is_zero() {
            return Err(WalletError::NullTarget);
        }

        let id = self.transactions.push(proposal, *caller);
        self.events.push(WalletEvent::Submission { transaction_id: id });
        log::info!("Wallet {}: transaction {} submitted by {}", self.address, id, caller);

        self.record_confirmation(caller, id)?;
        let outcome = self.run_if_ready(id, executor);

        Ok(Receipt {
            transaction_id: id,
            outcome,
        })
    }

    /// Confirm a transaction; runs it when this confirmation reaches the threshold
    pub fn confirm(
        &mut self,
        caller: &Address,
        id: TransactionId,
        executor: &mut dyn Executor,
    ) -> Result<Receipt, WalletError> {
        self.ensure_owner(caller)?;
        let tx = self.lookup(id)?;
        if tx.is_executed() {
            return Err(WalletError::AlreadyExecuted(id));
        }
        if tx.is_confirmed_by(caller) {
            return Err(WalletError::AlreadyConfirmed { id, owner: *caller });
        }

        self.record_confirmation(caller, id)?;
        let outcome = self.run_if_ready(id, executor);

        Ok(Receipt {
            transaction_id: id,
            outcome,
        })
    }

    /// Withdraw a confirmation from a transaction that has not executed
    pub fn revoke(&mut self, caller: &Address, id: TransactionId) -> Result<(), WalletError> {
        self.ensure_owner(caller)?;
        let tx = self.lookup_mut(id)?;
        if tx.is_executed() {
            return Err(WalletError::AlreadyExecuted(id));
        }
        if !tx.remove_confirmation(caller) {
            return Err(WalletError::NotConfirmed { id, owner: *caller });
        }

        self.events.push(WalletEvent::Revocation {
            sender: *caller,
            transaction_id: id,
        });
        log::info!("Wallet {}: {} revoked transaction {}", self.address, caller, id);
        Ok(())
    }

    /// Run a confirmed transaction that has not executed yet
    ///
    /// # Errors
    /// Fails without changing any state if the caller is not an owner, the
    /// transaction is unknown, already executed, below the threshold, or if
    /// the operation itself fails.
    pub fn execute(
        &mut self,
        caller: &Address,
        id: TransactionId,
        executor: &mut dyn Executor,
    ) -> Result<(), WalletError> {
        self.ensure_owner(caller)?;
        let proposal = self.ready_proposal(id)?;

        self.perform(id, proposal, executor).map_err(|source| {
            log::warn!("Wallet {}: transaction {} failed: {}", self.address, id, source);
            WalletError::ExecutionFailed { id, source }
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_owner(&self, caller: &Address) -> Result<(), WalletError> {
        if !self.is_owner(caller) {
            log::debug!("Wallet {}: rejected call from non-owner {}", self.address, caller);
            return Err(WalletError::Unauthorized(*caller));
        }
        Ok(())
    }

    /// The operation of a transaction that may run now
    fn ready_proposal(&self, id: TransactionId) -> Result<Proposal, WalletError> {
        let tx = self.lookup(id)?;
        if tx.is_executed() {
            return Err(WalletError::AlreadyExecuted(id));
        }
        let have = tx.confirmation_count(self.owners());
        let need = self.required();
        if have < need {
            return Err(WalletError::ThresholdNotMet { id, have, need });
        }
        Ok(tx.proposal.clone())
    }

    fn lookup(&self, id: TransactionId) -> Result<&PendingTransaction, WalletError> {
        self.transactions
            .get(id)
            .ok_or(WalletError::TransactionNotFound(id))
    }

    fn lookup_mut(&mut self, id: TransactionId) -> Result<&mut PendingTransaction, WalletError> {
        self.transactions
            .get_mut(id)
            .ok_or(WalletError::TransactionNotFound(id))
    }

    fn record_confirmation(&mut self, caller: &Address, id: TransactionId) -> Result<(), WalletError> {
        if !self.lookup_mut(id)?.add_confirmation(*caller) {
            return Err(WalletError::AlreadyConfirmed { id, owner: *caller });
        }
        self.events.push(WalletEvent::Confirmation {
            sender: *caller,
            transaction_id: id,
        });
        log::info!("Wallet {}: {} confirmed transaction {}", self.address, caller, id);
        Ok(())
    }

    /// Execute if the threshold is met, keeping the confirmation on failure
    fn run_if_ready(&mut self, id: TransactionId, executor: &mut dyn Executor) -> ExecutionOutcome {
        let proposal = match self.ready_proposal(id) {
            Ok(proposal) => proposal,
            Err(_) => return ExecutionOutcome::Pending,
        };

        match self.perform(id, proposal, executor) {
            Ok(()) => ExecutionOutcome::Executed,
            Err(e) => {
                let reason = e.to_string();
                log::warn!("Wallet {}: transaction {} failed: {}", self.address, id, reason);
                self.events.push(WalletEvent::ExecutionFailure {
                    transaction_id: id,
                    reason: reason.clone(),
                });
                ExecutionOutcome::Failed(reason)
            }
        }
    }

    /// Invoke the operation and mark the transaction executed on success
    fn perform(
        &mut self,
        id: TransactionId,
        proposal: Proposal,
        executor: &mut dyn Executor,
    ) -> Result<(), CallError> {
        if proposal.target == self.address {
            self.apply_self_call(id, proposal.value, &proposal.payload)?;
        } else {
            executor.call(&self.address, &proposal.target, proposal.value, &proposal.payload)?;
        }

        if let Some(tx) = self.transactions.get_mut(id) {
            tx.mark_executed();
        }
        self.events.push(WalletEvent::Execution { transaction_id: id });
        log::info!("Wallet {}: transaction {} executed", self.address, id);
        Ok(())
    }

    fn apply_self_call(
        &mut self,
        id: TransactionId,
        value: u128,
        payload: &[u8],
    ) -> Result<(), CallError> {
        if value > 0 {
            return Err(CallError::NonPayableSelfCall(value));
        }

        match WalletCall::decode(payload)? {
            WalletCall::AddOwner { owner } => {
                self.owners.add(owner)?;
                self.events.push(WalletEvent::OwnerAddition { owner });
            }
            WalletCall::RemoveOwner { owner } => {
                let lowered = self.owners.remove(&owner)?;
                self.forget_confirmations(&owner, id);
                self.events.push(WalletEvent::OwnerRemoval { owner });
                if let Some(required) = lowered {
                    self.events.push(WalletEvent::RequirementChange { required });
                }
            }
            WalletCall::ReplaceOwner { owner, new_owner } => {
                self.owners.replace(&owner, new_owner)?;
                self.forget_confirmations(&owner, id);
                self.events.push(WalletEvent::OwnerRemoval { owner });
                self.events.push(WalletEvent::OwnerAddition { owner: new_owner });
            }
            WalletCall::ChangeRequirement { required } => {
                let required = usize::try_from(required).unwrap_or(usize::MAX);
                self.owners.change_requirement(required)?;
                self.events.push(WalletEvent::RequirementChange { required });
            }
        }

        log::info!("Wallet {}: owners now {}", self.address, self.owners.description());
        Ok(())
    }

    // A former owner's confirmations must not come back if it is re-added
    fn forget_confirmations(&mut self, owner: &Address, executing: TransactionId) {
        let dropped = self.transactions.withdraw_confirmations(owner, executing);
        if !dropped.is_empty() {
            log::debug!(
                "Wallet {}: dropped confirmations of {} on {:?}",
                self.address,
                owner,
                dropped
            );
        }
    }
}

fn matches_filter(tx: &PendingTransaction, include_pending: bool, include_executed: bool) -> bool {
    (include_pending && !tx.is_executed()) || (include_executed && tx.is_executed())
}
