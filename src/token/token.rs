//! Fungible token ledger
//!
//! Balances per address, a hard supply cap, and a single owner account that
//! is allowed to mint.

use crate::abi::AbiError;
use crate::crypto::Address;
use crate::token::call::TokenCall;
use crate::token::ledger::Ledger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Number of events kept in the token's history
const HISTORY_LIMIT: usize = 100;

/// Token-related errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },
    #[error("Supply cap exceeded: cap {cap}, requested total {requested}")]
    SupplyCapExceeded { cap: u128, requested: u128 },
    #[error("Caller is not the token owner: {0}")]
    Unauthorized(Address),
    #[error("Token does not accept native value (got {0})")]
    NonPayable(u128),
    #[error("Balance overflow for {0}")]
    BalanceOverflow(Address),
    #[error("Invalid symbol: must be 1-10 characters")]
    InvalidSymbol,
    #[error("Invalid name: must be 1-50 characters")]
    InvalidName,
    #[error("Invalid decimals: must be 0-18")]
    InvalidDecimals,
    #[error("Invalid supply cap: must be greater than 0")]
    InvalidSupplyCap,
    #[error("Malformed token call: {0}")]
    Abi(#[from] AbiError),
}

/// Token metadata (immutable after creation)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenMetadata {
    /// Token name (e.g., "Treasury Token")
    pub name: String,
    /// Token symbol (e.g., "TRS")
    pub symbol: String,
    /// Decimal places (usually 18)
    pub decimals: u8,
    /// Maximum total supply that minting may reach
    pub supply_cap: u128,
}

impl TokenMetadata {
    /// Create new token metadata with validation
    pub fn new(
        name: String,
        symbol: String,
        decimals: u8,
        supply_cap: u128,
    ) -> Result<Self, TokenError> {
        if name.is_empty() || name.len() > 50 {
            return Err(TokenError::InvalidName);
        }

        if symbol.is_empty() || symbol.len() > 10 {
            return Err(TokenError::InvalidSymbol);
        }

        if decimals > 18 {
            return Err(TokenError::InvalidDecimals);
        }

        if supply_cap == 0 {
            return Err(TokenError::InvalidSupplyCap);
        }

        Ok(Self {
            name,
            symbol,
            decimals,
            supply_cap,
        })
    }
}

/// Something that happened on the ledger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenEvent {
    Transfer {
        from: Address,
        to: Address,
        amount: u128,
        timestamp: DateTime<Utc>,
    },
    Mint {
        to: Address,
        amount: u128,
        timestamp: DateTime<Utc>,
    },
    Burn {
        from: Address,
        amount: u128,
        timestamp: DateTime<Utc>,
    },
    OwnershipTransferred {
        previous: Address,
        owner: Address,
        timestamp: DateTime<Utc>,
    },
}

/// A capped fungible token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    /// Token address
    pub address: Address,
    /// Token metadata
    pub metadata: TokenMetadata,
    /// Account allowed to mint
    owner: Address,
    /// Amount currently in circulation
    total_supply: u128,
    /// Balances: address -> amount
    balances: HashMap<Address, u128>,
    /// Recent ledger events (last 100)
    pub transfer_history: Vec<TokenEvent>,
}

impl Token {
    /// Create a token with nothing minted yet
    pub fn new(address: Address, metadata: TokenMetadata, owner: Address) -> Self {
        Self {
            address,
            metadata,
            owner,
            total_supply: 0,
            balances: HashMap::new(),
            transfer_history: Vec::new(),
        }
    }

    // =========================================================================
    // View Functions
    // =========================================================================

    /// Token address
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn supply_cap(&self) -> u128 {
        self.metadata.supply_cap
    }

    /// Account allowed to mint
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Get balance of an address
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Get all holders with balances
    pub fn holders(&self) -> Vec<(&Address, &u128)> {
        self.balances.iter().filter(|(_, &b)| b > 0).collect()
    }

    /// Get holder count
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|&&b| b > 0).count()
    }

    // =========================================================================
    // Mutating Functions
    // =========================================================================

    /// Transfer tokens from one address to another
    ///
    /// Zero amounts and self-transfers are allowed.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<TokenEvent, TokenError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }

        if from != to {
            let to_balance = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or(TokenError::BalanceOverflow(*to))?;
            self.balances.insert(*from, from_balance - amount);
            self.balances.insert(*to, to_balance);
        }

        let event = TokenEvent::Transfer {
            from: *from,
            to: *to,
            amount,
            timestamp: Utc::now(),
        };
        self.record(event.clone());

        log::debug!("Transfer {} -> {}: {}", from, to, amount);
        Ok(event)
    }

    /// Mint new tokens to the caller, who must be the token owner
    pub fn mint(&mut self, caller: &Address, amount: u128) -> Result<TokenEvent, TokenError> {
        if *caller != self.owner {
            return Err(TokenError::Unauthorized(*caller));
        }

        let requested = self
            .total_supply
            .checked_add(amount)
            .filter(|total| *total <= self.metadata.supply_cap)
            .ok_or_else(|| TokenError::SupplyCapExceeded {
                cap: self.metadata.supply_cap,
                requested: self.total_supply.saturating_add(amount),
            })?;

        // Balances never exceed total supply, which is capped above
        let balance = self.balance_of(caller) + amount;
        self.balances.insert(*caller, balance);
        self.total_supply = requested;

        let event = TokenEvent::Mint {
            to: *caller,
            amount,
            timestamp: Utc::now(),
        };
        self.record(event.clone());

        log::info!(
            "Minted {} {} to {} (supply {}/{})",
            amount,
            self.symbol(),
            caller,
            self.total_supply,
            self.metadata.supply_cap
        );
        Ok(event)
    }

    /// Destroy tokens held by `from`
    pub fn burn(&mut self, from: &Address, amount: u128) -> Result<TokenEvent, TokenError> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }

        self.balances.insert(*from, balance - amount);
        self.total_supply -= amount;

        let event = TokenEvent::Burn {
            from: *from,
            amount,
            timestamp: Utc::now(),
        };
        self.record(event.clone());
        Ok(event)
    }

    /// Hand the minting role to another account
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: &Address,
    ) -> Result<TokenEvent, TokenError> {
        if *caller != self.owner {
            return Err(TokenError::Unauthorized(*caller));
        }

        let previous = self.owner;
        self.owner = *new_owner;

        let event = TokenEvent::OwnershipTransferred {
            previous,
            owner: *new_owner,
            timestamp: Utc::now(),
        };
        self.record(event.clone());

        log::info!("Token ownership {} -> {}", previous, new_owner);
        Ok(event)
    }

    /// Execute an encoded call on behalf of `caller`
    pub fn invoke(
        &mut self,
        caller: &Address,
        value: u128,
        payload: &[u8],
    ) -> Result<TokenEvent, TokenError> {
        if value > 0 {
            return Err(TokenError::NonPayable(value));
        }

        match TokenCall::decode(payload)? {
            TokenCall::Transfer { to, amount } => self.transfer(caller, &to, amount),
            TokenCall::Mint { amount } => self.mint(caller, amount),
            TokenCall::Burn { amount } => self.burn(caller, amount),
            TokenCall::TransferOwnership { new_owner } => {
                self.transfer_ownership(caller, &new_owner)
            }
        }
    }

    fn record(&mut self, event: TokenEvent) {
        self.transfer_history.push(event);
        if self.transfer_history.len() > HISTORY_LIMIT {
            self.transfer_history.remove(0);
        }
    }
}

impl Ledger for Token {
    fn balance_of(&self, account: &Address) -> u128 {
        Token::balance_of(self, account)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<TokenEvent, TokenError> {
        Token::transfer(self, from, to, amount)
    }
}
