//! Quorum wallet factory
//!
//! Instantiates wallets at derived addresses and answers membership
//! queries from the wallets' current owner sets.

use crate::crypto::Address;
use crate::multisig::owners::OwnerSet;
use crate::multisig::wallet::{QuorumWallet, WalletError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record of a wallet being created
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractInstantiation {
    pub wallet: Address,
    pub creator: Address,
    pub timestamp: DateTime<Utc>,
}

/// Factory and index of quorum wallets
///
/// Wallet addresses are derived from the registry's own address and a
/// counter, so they never repeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRegistry {
    /// Factory address
    pub address: Address,
    /// Wallets by address
    wallets: BTreeMap<Address, QuorumWallet>,
    /// Every instantiation, oldest first
    instantiations: Vec<ContractInstantiation>,
    /// Salt for the next derived address
    nonce: u64,
}

impl WalletRegistry {
    /// Create a new empty registry
    pub fn new(address: Address) -> Self {
        Self {
            address,
            wallets: BTreeMap::new(),
            instantiations: Vec::new(),
            nonce: 0,
        }
    }

    /// Create a new quorum wallet
    ///
    /// # Errors
    /// Returns error if the owner set or requirement is invalid.
    pub fn create_wallet(
        &mut self,
        creator: &Address,
        owners: Vec<Address>,
        required: usize,
    ) -> Result<ContractInstantiation, WalletError> {
        let owners = OwnerSet::new(owners, required)?;

        let address = Address::derive(&self.address, self.nonce);
        self.nonce += 1;

        log::info!(
            "Created {} quorum wallet {} (creator {})",
            owners.description(),
            address,
            creator
        );
        self.wallets
            .insert(address, QuorumWallet::new(address, owners));

        let instantiation = ContractInstantiation {
            wallet: address,
            creator: *creator,
            timestamp: Utc::now(),
        };
        self.instantiations.push(instantiation.clone());
        Ok(instantiation)
    }

    /// Get a wallet by address
    pub fn get(&self, address: &Address) -> Option<&QuorumWallet> {
        self.wallets.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut QuorumWallet> {
        self.wallets.get_mut(address)
    }

    /// Check if an address is a quorum wallet
    pub fn contains(&self, address: &Address) -> bool {
        self.wallets.contains_key(address)
    }

    /// List all wallets
    pub fn wallets(&self) -> impl Iterator<Item = &QuorumWallet> {
        self.wallets.values()
    }

    /// Get wallet count
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn instantiations(&self) -> &[ContractInstantiation] {
        &self.instantiations
    }

    /// Wallets `member` currently owns a seat in
    pub fn wallets_of(&self, member: &Address) -> Vec<Address> {
        self.wallets
            .values()
            .filter(|w| w.is_owner(member))
            .map(|w| w.address)
            .collect()
    }

    pub fn wallet_count_of(&self, member: &Address) -> usize {
        self.wallets.values().filter(|w| w.is_owner(member)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::call::WalletCall;
    use crate::multisig::executor::{CallError, Executor};
    use crate::multisig::transaction::Proposal;

    const FACTORY: Address = Address::new([0xfa; 20]);

    struct NoHost;

    impl Executor for NoHost {
        fn call(&mut self, _: &Address, target: &Address, _: u128, _: &[u8]) -> Result<(), CallError> {
            Err(CallError::UnknownTarget(*target))
        }
    }

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_create_wallet() {
        let mut registry = WalletRegistry::new(FACTORY);

        let created = registry
            .create_wallet(&addr(1), vec![addr(1), addr(2), addr(3)], 2)
            .unwrap();
        assert_eq!(created.creator, addr(1));
        assert_eq!(created.wallet, Address::derive(&FACTORY, 0));

        let wallet = registry.get(&created.wallet).unwrap();
        assert_eq!(wallet.required(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.instantiations().len(), 1);
    }

    #[test]
    fn test_same_owners_get_distinct_wallets() {
        let mut registry = WalletRegistry::new(FACTORY);

        let a = registry.create_wallet(&addr(1), vec![addr(1), addr(2)], 1).unwrap();
        let b = registry.create_wallet(&addr(1), vec![addr(1), addr(2)], 1).unwrap();
        assert_ne!(a.wallet, b.wallet);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_invalid_owner_set_rejected() {
        let mut registry = WalletRegistry::new(FACTORY);

        assert!(registry.create_wallet(&addr(1), vec![addr(1)], 2).is_err());
        assert!(registry.create_wallet(&addr(1), vec![], 1).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_membership_follows_owner_changes() {
        let mut registry = WalletRegistry::new(FACTORY);
        let first = registry
            .create_wallet(&addr(9), vec![addr(1), addr(2)], 1)
            .unwrap()
            .wallet;
        let second = registry
            .create_wallet(&addr(9), vec![addr(2), addr(3)], 1)
            .unwrap()
            .wallet;

        assert_eq!(registry.wallet_count_of(&addr(2)), 2);
        assert_eq!(registry.wallets_of(&addr(1)), vec![first]);
        assert_eq!(registry.wallet_count_of(&addr(4)), 0);

        let wallet = registry.get_mut(&second).unwrap();
        let proposal = Proposal {
            title: "swap".to_string(),
            description: String::new(),
            target: second,
            value: 0,
            payload: WalletCall::ReplaceOwner {
                owner: addr(2),
                new_owner: addr(4),
            }
            .encode(),
        };
        wallet.submit(&addr(3), proposal, &mut NoHost).unwrap();

        assert_eq!(registry.wallet_count_of(&addr(2)), 1);
        assert_eq!(registry.wallets_of(&addr(4)), vec![second]);
    }
}
