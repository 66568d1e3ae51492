//! Owner set of a quorum wallet
//!
//! An ordered set of unique owner addresses plus the number of
//! confirmations (M in M-of-N) a transaction needs before it executes.

use crate::crypto::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the number of owners of one wallet
pub const MAX_OWNER_COUNT: usize = 50;

/// Errors related to owner-set changes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OwnerError {
    #[error("Invalid requirement: {required} of {owners} owners")]
    InvalidRequirement { required: usize, owners: usize },
    #[error("Too many owners: at most {} allowed", MAX_OWNER_COUNT)]
    TooManyOwners,
    #[error("An owner set needs at least one owner")]
    NoOwners,
    #[error("Duplicate owner: {0}")]
    DuplicateOwner(Address),
    #[error("Not an owner: {0}")]
    NotAnOwner(Address),
    #[error("The null address cannot be an owner")]
    NullOwner,
    #[error("Cannot remove the last owner")]
    LastOwner,
}

/// Owners and confirmation requirement of a wallet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerSet {
    owners: Vec<Address>,
    required: usize,
}

impl OwnerSet {
    /// Create a validated owner set
    ///
    /// # Errors
    /// Returns error if an owner is repeated or null, or if `required` is
    /// outside `1..=owners.len()`.
    pub fn new(owners: Vec<Address>, required: usize) -> Result<Self, OwnerError> {
        if owners.is_empty() {
            return Err(OwnerError::NoOwners);
        }
        if owners.len() > MAX_OWNER_COUNT {
            return Err(OwnerError::TooManyOwners);
        }

        for (i, owner) in owners.iter().enumerate() {
            if owner.is_zero() {
                return Err(OwnerError::NullOwner);
            }
            if owners[..i].contains(owner) {
                return Err(OwnerError::DuplicateOwner(*owner));
            }
        }

        validate_requirement(owners.len(), required)?;

        Ok(Self { owners, required })
    }

    /// Owners in insertion order
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Confirmations needed to execute (M)
    pub fn required(&self) -> usize {
        self.required
    }

    /// Number of owners (N)
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.owners.contains(address)
    }

    /// Description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.required, self.owners.len())
    }

    pub fn add(&mut self, owner: Address) -> Result<(), OwnerError> {
        if owner.is_zero() {
            return Err(OwnerError::NullOwner);
        }
        if self.contains(&owner) {
            return Err(OwnerError::DuplicateOwner(owner));
        }
        if self.owners.len() >= MAX_OWNER_COUNT {
            return Err(OwnerError::TooManyOwners);
        }

        self.owners.push(owner);
        Ok(())
    }

    /// Remove an owner.
    ///
    /// Returns the new requirement if it had to be lowered to the remaining
    /// owner count.
    pub fn remove(&mut self, owner: &Address) -> Result<Option<usize>, OwnerError> {
        let index = self
            .owners
            .iter()
            .position(|o| o == owner)
            .ok_or(OwnerError::NotAnOwner(*owner))?;
        if self.owners.len() == 1 {
            return Err(OwnerError::LastOwner);
        }

        self.owners.remove(index);

        if self.required > self.owners.len() {
            self.required = self.owners.len();
            return Ok(Some(self.required));
        }
        Ok(None)
    }

    /// Swap `old` for `new` in place, keeping its position
    pub fn replace(&mut self, old: &Address, new: Address) -> Result<(), OwnerError> {
        if new.is_zero() {
            return Err(OwnerError::NullOwner);
        }
        if self.contains(&new) {
            return Err(OwnerError::DuplicateOwner(new));
        }

        let slot = self
            .owners
            .iter_mut()
            .find(|o| *o == old)
            .ok_or(OwnerError::NotAnOwner(*old))?;
        *slot = new;
        Ok(())
    }

    pub fn change_requirement(&mut self, required: usize) -> Result<(), OwnerError> {
        validate_requirement(self.owners.len(), required)?;
        self.required = required;
        Ok(())
    }
}

fn validate_requirement(owners: usize, required: usize) -> Result<(), OwnerError> {
    if required == 0 || required > owners {
        return Err(OwnerError::InvalidRequirement { required, owners });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners(n: u8) -> Vec<Address> {
        (1..=n).map(|i| Address::new([i; 20])).collect()
    }

    #[test]
    fn test_owner_set_creation() {
        let set = OwnerSet::new(owners(3), 2).unwrap();

        assert_eq!(set.required(), 2);
        assert_eq!(set.len(), 3);
        assert_eq!(set.description(), "2-of-3");
        assert!(set.contains(&Address::new([2; 20])));
        assert!(!set.contains(&Address::new([9; 20])));
    }

    #[test]
    fn test_single_owner_allowed() {
        let set = OwnerSet::new(owners(1), 1).unwrap();
        assert_eq!(set.description(), "1-of-1");
    }

    #[test]
    fn test_owner_set_validation() {
        assert_eq!(
            OwnerSet::new(owners(3), 0),
            Err(OwnerError::InvalidRequirement {
                required: 0,
                owners: 3
            })
        );
        assert!(OwnerSet::new(owners(3), 4).is_err());
        assert_eq!(OwnerSet::new(vec![], 1), Err(OwnerError::NoOwners));

        let mut dup = owners(2);
        dup.push(dup[0]);
        assert_eq!(OwnerSet::new(dup, 1), Err(OwnerError::DuplicateOwner(owners(1)[0])));

        assert_eq!(
            OwnerSet::new(vec![Address::ZERO], 1),
            Err(OwnerError::NullOwner)
        );

        let many: Vec<Address> = (0..=MAX_OWNER_COUNT as u64)
            .map(|i| Address::derive(&Address::new([1; 20]), i))
            .collect();
        assert_eq!(OwnerSet::new(many, 1), Err(OwnerError::TooManyOwners));
    }

    #[test]
    fn test_add_owner() {
        let mut set = OwnerSet::new(owners(2), 2).unwrap();

        set.add(Address::new([7; 20])).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.add(Address::new([7; 20])),
            Err(OwnerError::DuplicateOwner(Address::new([7; 20])))
        );
    }

    #[test]
    fn test_remove_owner_clamps_requirement() {
        let mut set = OwnerSet::new(owners(3), 3).unwrap();

        let lowered = set.remove(&Address::new([2; 20])).unwrap();
        assert_eq!(lowered, Some(2));
        assert_eq!(set.required(), 2);
        assert_eq!(set.owners(), &[Address::new([1; 20]), Address::new([3; 20])]);

        assert_eq!(set.remove(&Address::new([1; 20])).unwrap(), Some(1));
        assert_eq!(set.remove(&Address::new([3; 20])), Err(OwnerError::LastOwner));
        assert_eq!(
            set.remove(&Address::new([9; 20])),
            Err(OwnerError::NotAnOwner(Address::new([9; 20])))
        );
    }

    #[test]
    fn test_replace_owner_keeps_position() {
        let mut set = OwnerSet::new(owners(3), 2).unwrap();

        set.replace(&Address::new([2; 20]), Address::new([8; 20]))
            .unwrap();
        assert_eq!(set.owners()[1], Address::new([8; 20]));
        assert!(set
            .replace(&Address::new([1; 20]), Address::new([3; 20]))
            .is_err());
    }

    #[test]
    fn test_change_requirement() {
        let mut set = OwnerSet::new(owners(3), 2).unwrap();

        set.change_requirement(3).unwrap();
        assert_eq!(set.required(), 3);
        assert!(set.change_requirement(4).is_err());
        assert!(set.change_requirement(0).is_err());
        assert_eq!(set.required(), 3);
    }
}
