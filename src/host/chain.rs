//! Single-threaded host chain
//!
//! Owns the token ledger, native balances, the wallet registry and the
//! delegated transfer authority. Every entry point runs to completion before
//! the next one starts, so state is guarded by flags and nonces rather than
//! locks.

use crate::config::TreasuryConfig;
use crate::crypto::Address;
use crate::multisig::{
    CallError, ContractInstantiation, Executor, Proposal, QuorumWallet, Receipt, TransactionId,
    WalletError, WalletEvent, WalletRegistry,
};
use crate::permit::{
    DelegatedTransferAuthority, DelegatedTransferReceipt, FeePolicy, PermitError, SignedTransfer,
    TransferPermit,
};
use crate::token::{Token, TokenError, TokenEvent, TokenMetadata};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by chain entry points
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Permit(#[from] PermitError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Wallet not found: {0}")]
    WalletNotFound(Address),
    #[error("Insufficient native balance: have {have}, need {need}")]
    InsufficientNative { have: u128, need: u128 },
    #[error("Native supply overflow")]
    NativeSupplyOverflow,
}

/// Chain identity and clock
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainEnv {
    pub chain_id: u64,
    /// Current chain time, unix seconds
    pub timestamp: u64,
}

/// Current wall clock time in unix seconds
pub fn wall_clock() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Observations for off-chain consumers, in the order they were produced
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ChainEvent {
    ContractInstantiation(ContractInstantiation),
    Wallet { wallet: Address, event: WalletEvent },
    Token(TokenEvent),
    DelegatedTransfer(DelegatedTransferReceipt),
    NativeTransfer { from: Address, to: Address, amount: u128 },
}

/// Balances reachable by wallet calls
#[derive(Clone, Debug, Serialize, Deserialize)]
struct HostState {
    token: Token,
    native: HashMap<Address, u128>,
    native_supply: u128,
    #[serde(skip)]
    outbox: Vec<ChainEvent>,
}

impl HostState {
    fn native_balance(&self, account: &Address) -> u128 {
        self.native.get(account).copied().unwrap_or(0)
    }

    /// Move native value; callers check the sender's balance first
    fn move_native(&mut self, from: &Address, to: &Address, amount: u128) {
        if from == to || amount == 0 {
            return;
        }
        let from_balance = self.native_balance(from);
        // Balances sum to `native_supply`, so the recipient cannot overflow
        let to_balance = self.native_balance(to) + amount;
        self.native.insert(*from, from_balance - amount);
        self.native.insert(*to, to_balance);
        self.outbox.push(ChainEvent::NativeTransfer {
            from: *from,
            to: *to,
            amount,
        });
    }
}

impl Executor for HostState {
    fn call(
        &mut self,
        caller: &Address,
        target: &Address,
        value: u128,
        payload: &[u8],
    ) -> Result<(), CallError> {
        let have = self.native_balance(caller);
        if have < value {
            return Err(CallError::InsufficientValue { have, need: value });
        }

        if *target == self.token.address {
            let event = self.token.invoke(caller, value, payload)?;
            self.outbox.push(ChainEvent::Token(event));
        } else if !payload.is_empty() {
            return Err(CallError::UnknownTarget(*target));
        }

        self.move_native(caller, target, value);
        Ok(())
    }
}

/// The host chain
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chain {
    env: ChainEnv,
    state: HostState,
    registry: WalletRegistry,
    authority: DelegatedTransferAuthority,
}

impl Chain {
    /// Deploy the token, registry and authority
    ///
    /// The token is owned by `deployer` until ownership is handed to a wallet.
    pub fn new(
        env: ChainEnv,
        metadata: TokenMetadata,
        fee_policy: FeePolicy,
        deployer: &Address,
    ) -> Result<Self, ChainError> {
        let token_address = Address::derive(deployer, 0);
        let registry_address = Address::derive(deployer, 1);

        let token = Token::new(token_address, metadata, *deployer);
        let authority = DelegatedTransferAuthority::new(env.chain_id, token_address, fee_policy)?;

        log::info!(
            "Deployed {} at {} on chain {} (registry {})",
            token.symbol(),
            token_address,
            env.chain_id,
            registry_address
        );

        Ok(Self {
            env,
            state: HostState {
                token,
                native: HashMap::new(),
                native_supply: 0,
                outbox: Vec::new(),
            },
            registry: WalletRegistry::new(registry_address),
            authority,
        })
    }

    /// Deploy from a validated configuration
    pub fn from_config(
        config: &TreasuryConfig,
        deployer: &Address,
        timestamp: u64,
    ) -> Result<Self, ChainError> {
        let env = ChainEnv {
            chain_id: config.chain_id,
            timestamp,
        };
        Self::new(env, config.token.clone(), config.fee.clone(), deployer)
    }

    // =========================================================================
    // Environment
    // =========================================================================

    pub fn env(&self) -> &ChainEnv {
        &self.env
    }

    pub fn chain_id(&self) -> u64 {
        self.env.chain_id
    }

    pub fn timestamp(&self) -> u64 {
        self.env.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.env.timestamp = timestamp;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.env.timestamp = self.env.timestamp.saturating_add(seconds);
    }

    /// Move the clock forward to `now`; never moves it back
    pub fn sync_clock(&mut self, now: u64) {
        self.env.timestamp = self.env.timestamp.max(now);
    }

    // =========================================================================
    // Read Accessors
    // =========================================================================

    pub fn token(&self) -> &Token {
        &self.state.token
    }

    pub fn token_balance(&self, account: &Address) -> u128 {
        self.state.token.balance_of(account)
    }

    pub fn native_balance(&self, account: &Address) -> u128 {
        self.state.native_balance(account)
    }

    pub fn native_supply(&self) -> u128 {
        self.state.native_supply
    }

    pub fn registry(&self) -> &WalletRegistry {
        &self.registry
    }

    pub fn wallet(&self, address: &Address) -> Option<&QuorumWallet> {
        self.registry.get(address)
    }

    pub fn authority(&self) -> &DelegatedTransferAuthority {
        &self.authority
    }

    pub fn nonce_of(&self, account: &Address) -> u64 {
        self.authority.nonce_of(account)
    }

    pub fn protocol_fee(&self, amount: u128) -> u128 {
        self.authority.protocol_fee(amount)
    }

    /// The permit `from` must sign to send `amount` to `to`
    pub fn permit_for(&self, from: &Address, to: &Address, amount: u128, expiry: u64) -> TransferPermit {
        self.authority.permit_for(from, to, amount, expiry)
    }

    /// Events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<ChainEvent> {
        std::mem::take(&mut self.state.outbox)
    }

    // =========================================================================
    // Accounts and Token
    // =========================================================================

    /// Credit newly issued native currency to an account
    pub fn fund_native(&mut self, account: &Address, amount: u128) -> Result<(), ChainError> {
        let supply = self
            .state
            .native_supply
            .checked_add(amount)
            .ok_or(ChainError::NativeSupplyOverflow)?;
        let balance = self.native_balance(account) + amount;

        self.state.native_supply = supply;
        self.state.native.insert(*account, balance);
        log::info!("Funded {} with {} native", account, amount);
        Ok(())
    }

    pub fn transfer_native(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), ChainError> {
        let have = self.native_balance(from);
        if have < amount {
            return Err(ChainError::InsufficientNative { have, need: amount });
        }
        self.state.move_native(from, to, amount);
        Ok(())
    }

    /// Token transfer sent directly by the holder
    pub fn transfer_token(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<TokenEvent, ChainError> {
        let event = self.state.token.transfer(from, to, amount)?;
        self.state.outbox.push(ChainEvent::Token(event.clone()));
        Ok(event)
    }

    pub fn transfer_token_ownership(
        &mut self,
        caller: &Address,
        new_owner: &Address,
    ) -> Result<TokenEvent, ChainError> {
        let event = self.state.token.transfer_ownership(caller, new_owner)?;
        self.state.outbox.push(ChainEvent::Token(event.clone()));
        Ok(event)
    }

    // =========================================================================
    // Quorum Wallets
    // =========================================================================

    pub fn create_wallet(
        &mut self,
        creator: &Address,
        owners: Vec<Address>,
        required: usize,
    ) -> Result<Address, ChainError> {
        let instantiation = self.registry.create_wallet(creator, owners, required)?;
        let wallet = instantiation.wallet;
        self.state
            .outbox
            .push(ChainEvent::ContractInstantiation(instantiation));
        Ok(wallet)
    }

    pub fn submit_transaction(
        &mut self,
        wallet: &Address,
        caller: &Address,
        proposal: Proposal,
    ) -> Result<Receipt, ChainError> {
        self.with_wallet(wallet, |w, host| w.submit(caller, proposal, host))
    }

    pub fn confirm_transaction(
        &mut self,
        wallet: &Address,
        caller: &Address,
        id: TransactionId,
    ) -> Result<Receipt, ChainError> {
        self.with_wallet(wallet, |w, host| w.confirm(caller, id, host))
    }

    pub fn revoke_confirmation(
        &mut self,
        wallet: &Address,
        caller: &Address,
        id: TransactionId,
    ) -> Result<(), ChainError> {
        self.with_wallet(wallet, |w, _| w.revoke(caller, id))
    }

    pub fn execute_transaction(
        &mut self,
        wallet: &Address,
        caller: &Address,
        id: TransactionId,
    ) -> Result<(), ChainError> {
        self.with_wallet(wallet, |w, host| w.execute(caller, id, host))
    }

    /// Run a wallet call with the host as executor and publish its events
    fn with_wallet<T>(
        &mut self,
        address: &Address,
        f: impl FnOnce(&mut QuorumWallet, &mut HostState) -> Result<T, WalletError>,
    ) -> Result<T, ChainError> {
        let wallet = self
            .registry
            .get_mut(address)
            .ok_or(ChainError::WalletNotFound(*address))?;

        let mark = self.state.outbox.len();
        let seen = wallet.events().len();
        let result = f(wallet, &mut self.state);

        let published: Vec<ChainEvent> = wallet.events()[seen..]
            .iter()
            .map(|event| ChainEvent::Wallet {
                wallet: *address,
                event: event.clone(),
            })
            .collect();
        self.state.outbox.splice(mark..mark, published);

        Ok(result?)
    }

    // =========================================================================
    // Delegated Transfers
    // =========================================================================

    pub fn delegated_transfer(
        &mut self,
        transfer: &SignedTransfer,
    ) -> Result<DelegatedTransferReceipt, ChainError> {
        let receipt =
            self.authority
                .delegated_transfer(&mut self.state.token, transfer, self.env.timestamp)?;
        self.state
            .outbox
            .push(ChainEvent::DelegatedTransfer(receipt.clone()));
        Ok(receipt)
    }

    pub fn delegated_transfer_with_fee(
        &mut self,
        transfer: &SignedTransfer,
    ) -> Result<DelegatedTransferReceipt, ChainError> {
        let receipt = self.authority.delegated_transfer_with_fee(
            &mut self.state.token,
            transfer,
            self.env.timestamp,
        )?;
        self.state
            .outbox
            .push(ChainEvent::DelegatedTransfer(receipt.clone()));
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::multisig::{ExecutionOutcome, WalletCall};
    use crate::permit::FeeRate;
    use crate::token::TokenCall;

    const NOW: u64 = 1_700_000_000;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn chain(fee: FeePolicy) -> Chain {
        let metadata =
            TokenMetadata::new("Treasury Token".to_string(), "TRS".to_string(), 18, 10u128.pow(29))
                .unwrap();
        let env = ChainEnv {
            chain_id: 1337,
            timestamp: NOW,
        };
        Chain::new(env, metadata, fee, &addr(0xde)).unwrap()
    }

    fn token_call(chain: &Chain, call: TokenCall) -> Proposal {
        Proposal {
            title: "token".to_string(),
            description: String::new(),
            target: chain.token().address(),
            value: 0,
            payload: call.encode(),
        }
    }

    fn sign(chain: &Chain, key: &KeyPair, to: Address, amount: u128, expiry: u64) -> SignedTransfer {
        let permit = chain.permit_for(&key.address(), &to, amount, expiry);
        SignedTransfer {
            from: key.address(),
            to,
            amount,
            expiry,
            signature: permit.sign(key),
        }
    }

    /// 2-of-3 wallet that owns the token
    fn treasury(chain: &mut Chain) -> Address {
        let wallet = chain
            .create_wallet(&addr(1), vec![addr(1), addr(2), addr(3)], 2)
            .unwrap();
        chain.transfer_token_ownership(&addr(0xde), &wallet).unwrap();
        wallet
    }

    #[test]
    fn test_end_to_end_scenario() {
        let collector = addr(0xfe);
        let mut chain = chain(FeePolicy::new(FeeRate::BasisPoints(100), collector));
        let wallet = treasury(&mut chain);
        let supply = 10u128.pow(28);

        // Mint through the quorum
        let receipt = chain
            .submit_transaction(&wallet, &addr(1), token_call(&chain, TokenCall::Mint { amount: supply }))
            .unwrap();
        assert_eq!(receipt.outcome, ExecutionOutcome::Pending);
        let receipt = chain
            .confirm_transaction(&wallet, &addr(2), receipt.transaction_id)
            .unwrap();
        assert_eq!(receipt.outcome, ExecutionOutcome::Executed);
        assert!(chain.confirm_transaction(&wallet, &addr(3), 0).is_err());
        assert_eq!(chain.token_balance(&wallet), supply);
        assert_eq!(chain.token().total_supply(), supply);

        // Pay X through the quorum
        let x = KeyPair::generate();
        let y = addr(0x77);
        let receipt = chain
            .submit_transaction(
                &wallet,
                &addr(3),
                token_call(
                    &chain,
                    TokenCall::Transfer {
                        to: x.address(),
                        amount: 1000,
                    },
                ),
            )
            .unwrap();
        chain
            .confirm_transaction(&wallet, &addr(1), receipt.transaction_id)
            .unwrap();
        assert_eq!(chain.token_balance(&x.address()), 1000);

        // Wrong signer
        let intruder = KeyPair::generate();
        let permit = chain.permit_for(&x.address(), &y, 500, NOW + 3600);
        let forged = SignedTransfer {
            from: x.address(),
            to: y,
            amount: 500,
            expiry: NOW + 3600,
            signature: permit.sign(&intruder),
        };
        let err = chain.delegated_transfer(&forged).unwrap_err();
        assert_eq!(err.to_string(), "Invalid signature");

        // Past expiry
        let stale = sign(&chain, &x, y, 500, NOW - 1);
        let err = chain.delegated_transfer(&stale).unwrap_err();
        assert_eq!(err.to_string(), "Expired signature");

        // Valid
        let valid = sign(&chain, &x, y, 500, NOW + 3600);
        chain.delegated_transfer(&valid).unwrap();
        assert_eq!(chain.token_balance(&y), 500);
        assert_eq!(chain.nonce_of(&x.address()), 1);

        // With fee
        let with_fee = sign(&chain, &x, y, 500, NOW + 3600);
        let fee = chain.protocol_fee(500);
        let receipt = chain.delegated_transfer_with_fee(&with_fee).unwrap();
        assert_eq!(receipt.fee, fee);
        assert_eq!(fee, 5);
        assert_eq!(chain.token_balance(&collector), fee);
        assert_eq!(chain.token_balance(&y), 500 + 500 - fee);
        assert_eq!(chain.token_balance(&x.address()), 0);
    }

    #[test]
    fn test_events_are_published_in_order() {
        let mut chain = chain(FeePolicy::none());
        let wallet = treasury(&mut chain);
        chain.drain_events();

        chain
            .submit_transaction(&wallet, &addr(1), token_call(&chain, TokenCall::Mint { amount: 10 }))
            .unwrap();
        chain.confirm_transaction(&wallet, &addr(2), 0).unwrap();

        let events = chain.drain_events();
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                ChainEvent::Wallet { event: WalletEvent::Submission { .. }, .. } => "submission",
                ChainEvent::Wallet { event: WalletEvent::Confirmation { .. }, .. } => "confirmation",
                ChainEvent::Wallet { event: WalletEvent::Execution { .. }, .. } => "execution",
                ChainEvent::Token(TokenEvent::Mint { .. }) => "mint",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["submission", "confirmation", "confirmation", "execution", "mint"]
        );
        assert!(chain.drain_events().is_empty());
    }

    #[test]
    fn test_instantiation_event() {
        let mut chain = chain(FeePolicy::none());
        let wallet = chain.create_wallet(&addr(5), vec![addr(5)], 1).unwrap();

        let events = chain.drain_events();
        assert!(matches!(
            events.as_slice(),
            [ChainEvent::ContractInstantiation(i)] if i.wallet == wallet && i.creator == addr(5)
        ));
        assert_eq!(chain.registry().wallet_count_of(&addr(5)), 1);
    }

    #[test]
    fn test_unknown_wallet() {
        let mut chain = chain(FeePolicy::none());
        assert!(matches!(
            chain.confirm_transaction(&addr(9), &addr(1), 0),
            Err(ChainError::WalletNotFound(_))
        ));
    }

    #[test]
    fn test_native_value_moves_only_on_success() {
        let mut chain = chain(FeePolicy::none());
        let wallet = chain
            .create_wallet(&addr(1), vec![addr(1), addr(2)], 1)
            .unwrap();
        let payee = addr(0x55);
        let proposal = Proposal {
            title: "pay".to_string(),
            description: String::new(),
            target: payee,
            value: 300,
            payload: Vec::new(),
        };

        let receipt = chain
            .submit_transaction(&wallet, &addr(1), proposal)
            .unwrap();
        assert!(matches!(receipt.outcome, ExecutionOutcome::Failed(_)));
        assert_eq!(chain.native_balance(&payee), 0);

        chain.fund_native(&wallet, 1000).unwrap();
        chain
            .execute_transaction(&wallet, &addr(2), receipt.transaction_id)
            .unwrap();
        assert_eq!(chain.native_balance(&payee), 300);
        assert_eq!(chain.native_balance(&wallet), 700);
        assert_eq!(chain.native_supply(), 1000);
    }

    #[test]
    fn test_payload_to_plain_account_rejected() {
        let mut chain = chain(FeePolicy::none());
        let wallet = chain.create_wallet(&addr(1), vec![addr(1)], 1).unwrap();
        let proposal = Proposal {
            title: "call".to_string(),
            description: String::new(),
            target: addr(0x55),
            value: 0,
            payload: vec![1, 2, 3, 4],
        };

        let receipt = chain.submit_transaction(&wallet, &addr(1), proposal).unwrap();
        assert!(matches!(receipt.outcome, ExecutionOutcome::Failed(_)));
        assert!(matches!(
            chain.execute_transaction(&wallet, &addr(1), 0),
            Err(ChainError::Wallet(WalletError::ExecutionFailed {
                source: CallError::UnknownTarget(_),
                ..
            }))
        ));
    }

    #[test]
    fn test_value_to_token_rejected() {
        let mut chain = chain(FeePolicy::none());
        let wallet = treasury(&mut chain);
        chain.fund_native(&wallet, 10).unwrap();
        let mut proposal = token_call(&chain, TokenCall::Mint { amount: 1 });
        proposal.value = 1;

        chain.submit_transaction(&wallet, &addr(1), proposal).unwrap();
        let receipt = chain.confirm_transaction(&wallet, &addr(2), 0).unwrap();
        assert!(matches!(receipt.outcome, ExecutionOutcome::Failed(_)));
        assert_eq!(chain.native_balance(&wallet), 10);
        assert_eq!(chain.token().total_supply(), 0);
    }

    #[test]
    fn test_owner_rotation_through_chain() {
        let mut chain = chain(FeePolicy::none());
        let wallet = treasury(&mut chain);
        let proposal = Proposal {
            title: "rotate".to_string(),
            description: "replace owner 3".to_string(),
            target: wallet,
            value: 0,
            payload: WalletCall::ReplaceOwner {
                owner: addr(3),
                new_owner: addr(4),
            }
            .encode(),
        };

        chain.submit_transaction(&wallet, &addr(1), proposal).unwrap();
        chain.confirm_transaction(&wallet, &addr(2), 0).unwrap();

        assert!(chain.wallet(&wallet).unwrap().is_owner(&addr(4)));
        assert_eq!(chain.registry().wallet_count_of(&addr(3)), 0);
        assert_eq!(chain.registry().wallets_of(&addr(4)), vec![wallet]);
    }

    #[test]
    fn test_direct_token_transfer_and_native_transfer() {
        let mut chain = chain(FeePolicy::none());
        chain.fund_native(&addr(1), 50).unwrap();

        assert!(matches!(
            chain.transfer_native(&addr(1), &addr(2), 51),
            Err(ChainError::InsufficientNative { have: 50, need: 51 })
        ));
        chain.transfer_native(&addr(1), &addr(2), 20).unwrap();
        assert_eq!(chain.native_balance(&addr(2)), 20);

        assert!(matches!(
            chain.transfer_token(&addr(1), &addr(2), 1),
            Err(ChainError::Token(TokenError::InsufficientBalance { .. }))
        ));
        assert!(chain.fund_native(&addr(1), u128::MAX).is_err());
    }

    #[test]
    fn test_clock() {
        let mut chain = chain(FeePolicy::none());

        chain.sync_clock(NOW - 100);
        assert_eq!(chain.timestamp(), NOW);
        chain.sync_clock(NOW + 5);
        assert_eq!(chain.timestamp(), NOW + 5);
        chain.advance_time(10);
        assert_eq!(chain.timestamp(), NOW + 15);
        chain.set_timestamp(1);
        assert_eq!(chain.timestamp(), 1);
    }

    #[test]
    fn test_permit_expires_with_clock() {
        let mut chain = chain(FeePolicy::none());
        let wallet = treasury(&mut chain);
        let holder = KeyPair::generate();
        chain
            .submit_transaction(&wallet, &addr(1), token_call(&chain, TokenCall::Mint { amount: 100 }))
            .unwrap();
        chain.confirm_transaction(&wallet, &addr(2), 0).unwrap();
        chain
            .submit_transaction(
                &wallet,
                &addr(1),
                token_call(
                    &chain,
                    TokenCall::Transfer {
                        to: holder.address(),
                        amount: 100,
                    },
                ),
            )
            .unwrap();
        chain.confirm_transaction(&wallet, &addr(2), 1).unwrap();

        let transfer = sign(&chain, &holder, addr(9), 100, NOW + 60);
        chain.advance_time(60);
        assert!(matches!(
            chain.delegated_transfer(&transfer),
            Err(ChainError::Permit(PermitError::ExpiredSignature))
        ));

        chain.set_timestamp(NOW + 59);
        chain.delegated_transfer(&transfer).unwrap();
        assert_eq!(chain.token_balance(&addr(9)), 100);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut chain = chain(FeePolicy::none());
        let wallet = treasury(&mut chain);
        chain
            .submit_transaction(
                &wallet,
                &addr(1),
                token_call(&chain, TokenCall::Mint { amount: 10u128.pow(28) }),
            )
            .unwrap();
        chain.confirm_transaction(&wallet, &addr(2), 0).unwrap();

        let json = serde_json::to_string(&chain).unwrap();
        let restored: Chain = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.token_balance(&wallet), 10u128.pow(28));
        assert_eq!(restored.wallet(&wallet).unwrap().transactions().len(), 1);
        assert!(restored.wallet(&wallet).unwrap().transaction(0).unwrap().is_executed());
    }
}
