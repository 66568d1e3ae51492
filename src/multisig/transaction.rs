//! Quorum transactions and their permanent record
//!
//! Transactions are stored in an append-only table indexed by id; ids are
//! allocated sequentially and records are never removed.

use crate::crypto::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of a transaction within one wallet
pub type TransactionId = u64;

/// Where a transaction is in its lifecycle
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Fewer confirmations than required
    Pending,
    /// Enough confirmations, not yet executed
    Ready,
    /// Executed (terminal)
    Executed,
}

/// What a quorum transaction will do once confirmed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub title: String,
    pub description: String,
    /// Contract or account the operation is sent to
    pub target: Address,
    /// Native value attached to the call
    pub value: u128,
    /// Encoded operation
    #[serde(with = "hex_payload")]
    pub payload: Vec<u8>,
}

/// A transaction submitted to a quorum wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: TransactionId,
    pub proposal: Proposal,
    /// Owner that submitted it
    pub submitted_by: Address,
    /// Owners that currently confirm it
    confirmations: BTreeSet<Address>,
    executed: bool,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl PendingTransaction {
    fn new(id: TransactionId, proposal: Proposal, submitted_by: Address) -> Self {
        Self {
            id,
            proposal,
            submitted_by,
            confirmations: BTreeSet::new(),
            executed: false,
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    pub fn target(&self) -> &Address {
        &self.proposal.target
    }

    pub fn value(&self) -> u128 {
        self.proposal.value
    }

    pub fn payload(&self) -> &[u8] {
        &self.proposal.payload
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn is_confirmed_by(&self, owner: &Address) -> bool {
        self.confirmations.contains(owner)
    }

    /// Every address that confirmed and has not revoked
    pub fn confirmations(&self) -> impl Iterator<Item = &Address> {
        self.confirmations.iter()
    }

    /// Confirmations that still come from someone in `owners`
    pub fn confirmation_count(&self, owners: &[Address]) -> usize {
        self.confirmations
            .iter()
            .filter(|c| owners.contains(c))
            .count()
    }

    pub fn status(&self, owners: &[Address], required: usize) -> TransactionStatus {
        if self.executed {
            TransactionStatus::Executed
        } else if self.confirmation_count(owners) >= required {
            TransactionStatus::Ready
        } else {
            TransactionStatus::Pending
        }
    }

    /// Returns false if `owner` had already confirmed
    pub(crate) fn add_confirmation(&mut self, owner: Address) -> bool {
        self.confirmations.insert(owner)
    }

    /// Returns false if `owner` had not confirmed
    pub(crate) fn remove_confirmation(&mut self, owner: &Address) -> bool {
        self.confirmations.remove(owner)
    }

    pub(crate) fn mark_executed(&mut self) {
        self.executed = true;
        self.executed_at = Some(Utc::now());
    }
}

/// Append-only table of a wallet's transactions
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionTable {
    transactions: Vec<PendingTransaction>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
        }
    }

    /// Store a new transaction under the next unused id
    pub(crate) fn push(&mut self, proposal: Proposal, submitted_by: Address) -> TransactionId {
        let id = self.transactions.len() as TransactionId;
        self.transactions
            .push(PendingTransaction::new(id, proposal, submitted_by));
        id
    }

    pub fn get(&self, id: TransactionId) -> Option<&PendingTransaction> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.transactions.get(index))
    }

    pub(crate) fn get_mut(&mut self, id: TransactionId) -> Option<&mut PendingTransaction> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.transactions.get_mut(index))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTransaction> {
        self.transactions.iter()
    }

    /// Drop `owner`'s confirmation from every transaction still awaiting
    /// execution, except `executing`. Returns the ids that lost one.
    pub(crate) fn withdraw_confirmations(
        &mut self,
        owner: &Address,
        executing: TransactionId,
    ) -> Vec<TransactionId> {
        self.transactions
            .iter_mut()
            .filter(|tx| !tx.executed && tx.id != executing)
            .filter_map(|tx| tx.remove_confirmation(owner).then_some(tx.id))
            .collect()
    }
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.strip_prefix("0x").unwrap_or(&text)).map_err(serde::de::Error::custom)
    }
}
