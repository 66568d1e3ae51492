//! Signing account implementation
//!
//! Provides key management and permit signing.

use crate::crypto::{Address, KeyError, KeyPair, Signature};
use crate::permit::{SignedTransfer, TransferPermit};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key store errors
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("No key for {0}")]
    UnknownAccount(Address),
    #[error("Key file {path} holds the key of {actual}")]
    AddressMismatch { path: String, actual: Address },
}

/// Serializable account data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct AccountData {
    private_key_hex: String,
    address: Address,
    label: Option<String>,
}

/// A local account that can sign permits
pub struct Account {
    /// The key pair for signing
    key_pair: KeyPair,
    /// Optional label for the account
    pub label: Option<String>,
}

impl Account {
    /// Create a new account with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: None,
        }
    }

    /// Create an account with a label
    pub fn with_label(label: &str) -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: Some(label.to_string()),
        }
    }

    /// Import an account from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, KeyStoreError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self {
            key_pair,
            label: None,
        })
    }

    pub fn address(&self) -> Address {
        self.key_pair.address()
    }

    /// Get the account's public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the account's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    pub fn sign_permit(&self, permit: &TransferPermit) -> Signature {
        permit.sign(&self.key_pair)
    }

    /// Sign a permit and package it for relaying
    pub fn signed_transfer(&self, permit: &TransferPermit) -> SignedTransfer {
        SignedTransfer {
            from: permit.from,
            to: permit.to,
            amount: permit.amount,
            expiry: permit.expiry,
            signature: self.sign_permit(permit),
        }
    }

    /// Save account to file
    pub fn save(&self, path: &Path) -> Result<(), KeyStoreError> {
        let data = AccountData {
            private_key_hex: self.private_key(),
            address: self.address(),
            label: self.label.clone(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load account from file
    pub fn load(path: &Path) -> Result<Self, KeyStoreError> {
        let json = fs::read_to_string(path)?;
        let data: AccountData = serde_json::from_str(&json)?;

        let mut account = Self::from_private_key(&data.private_key_hex)?;
        if account.address() != data.address {
            return Err(KeyStoreError::AddressMismatch {
                path: path.display().to_string(),
                actual: account.address(),
            });
        }
        account.label = data.label;
        Ok(account)
    }

    /// Export account info (without private key)
    pub fn export_public_info(&self) -> AccountInfo {
        AccountInfo {
            address: self.address(),
            public_key: self.public_key(),
            label: self.label.clone(),
        }
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

/// Public account information (safe to share)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: Address,
    pub public_key: String,
    pub label: Option<String>,
}

/// Directory of account key files
pub struct KeyStore {
    keys_dir: PathBuf,
}

impl KeyStore {
    pub fn new(keys_dir: &Path) -> Result<Self, KeyStoreError> {
        fs::create_dir_all(keys_dir)?;
        Ok(Self {
            keys_dir: keys_dir.to_path_buf(),
        })
    }

    fn key_path(&self, address: &Address) -> PathBuf {
        self.keys_dir.join(format!("{}.json", address))
    }

    /// Create and save a new account
    pub fn create_account(&self, label: Option<&str>) -> Result<Account, KeyStoreError> {
        let account = match label {
            Some(l) => Account::with_label(l),
            None => Account::new(),
        };

        account.save(&self.key_path(&account.address()))?;
        Ok(account)
    }

    /// Store an existing account
    pub fn import(&self, account: &Account) -> Result<(), KeyStoreError> {
        account.save(&self.key_path(&account.address()))
    }

    /// List all stored accounts
    pub fn list_accounts(&self) -> Result<Vec<AccountInfo>, KeyStoreError> {
        let mut accounts = Vec::new();

        for entry in fs::read_dir(&self.keys_dir)? {
            let path = entry?.path();

            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match Account::load(&path) {
                    Ok(account) => accounts.push(account.export_public_info()),
                    Err(e) => log::warn!("Skipping key file {}: {}", path.display(), e),
                }
            }
        }

        accounts.sort_by_key(|info| info.address);
        Ok(accounts)
    }

    /// Load a specific account by address
    pub fn load_account(&self, address: &Address) -> Result<Account, KeyStoreError> {
        let path = self.key_path(address);
        if !path.exists() {
            return Err(KeyStoreError::UnknownAccount(*address));
        }
        Account::load(&path)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.key_path(address).exists()
    }

    /// Delete an account
    pub fn delete_account(&self, address: &Address) -> Result<(), KeyStoreError> {
        fs::remove_file(self.key_path(address))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation() {
        let account = Account::new();
        assert!(!account.address().is_zero());
        assert_eq!(account.public_key().len(), 66);
        assert_eq!(account.private_key().len(), 64);
    }

    #[test]
    fn test_account_import() {
        let account1 = Account::new();
        let account2 = Account::from_private_key(&account1.private_key()).unwrap();
        assert_eq!(account1.address(), account2.address());
    }

    #[test]
    fn test_account_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_account.json");

        let account1 = Account::with_label("Relayer");
        account1.save(&path).unwrap();

        let account2 = Account::load(&path).unwrap();
        assert_eq!(account1.address(), account2.address());
        assert_eq!(account1.label, account2.label);
    }

    #[test]
    fn test_key_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(&temp_dir.path().join("keys")).unwrap();

        let a = store.create_account(Some("alice")).unwrap();
        let b = store.create_account(None).unwrap();

        let listed = store.list_accounts().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|i| i.address == a.address()));
        assert!(store.contains(&b.address()));

        let loaded = store.load_account(&a.address()).unwrap();
        assert_eq!(loaded.label.as_deref(), Some("alice"));

        store.delete_account(&b.address()).unwrap();
        assert!(matches!(
            store.load_account(&b.address()),
            Err(KeyStoreError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_signed_transfer_recovers_to_account() {
        let account = Account::new();
        let permit = TransferPermit {
            chain_id: 1337,
            token: Address::new([0xee; 20]),
            from: account.address(),
            to: Address::new([2; 20]),
            amount: 500,
            nonce: 0,
            expiry: 1_900_000_000,
        };

        let transfer = account.signed_transfer(&permit);
        assert_eq!(transfer.from, account.address());
        assert_eq!(permit.signer(&transfer.signature).unwrap(), account.address());
    }
}
