//! CLI commands for the treasury
//!
//! Implements all command handlers for the CLI interface. Every command
//! loads the saved chain, moves its clock to the wall clock, applies one
//! operation and saves the result.

use crate::config::TreasuryConfig;
use crate::crypto::Address;
use crate::host::{wall_clock, Chain, ChainEvent};
use crate::keystore::{Account, KeyStore};
use crate::multisig::{ExecutionOutcome, Proposal, Receipt, TransactionId, WalletCall};
use crate::permit::{FeePolicy, FeeRate, SignedTransfer};
use crate::storage::Storage;
use crate::token::TokenCall;
use std::fs;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Application state
pub struct AppState {
    pub chain: Chain,
    pub storage: Storage,
    pub keystore: KeyStore,
    pub config: TreasuryConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load application state from an initialized data directory
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage = Storage::open(&data_dir)?;
        let keystore = KeyStore::new(&data_dir.join("keys"))?;

        let mut chain = storage.load()?;
        chain.sync_clock(wall_clock());

        let config_path = data_dir.join(CONFIG_FILE);
        let config = if config_path.exists() {
            TreasuryConfig::load(&config_path)?
        } else {
            log::warn!("No {} in {}, using defaults", CONFIG_FILE, data_dir.display());
            TreasuryConfig::default()
        };

        Ok(Self {
            chain,
            storage,
            keystore,
            config,
            data_dir,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.chain)?;
        Ok(())
    }

    /// Load the key for `address`; commands only act for accounts held locally
    pub fn account(&self, address: &Address) -> CliResult<Account> {
        Ok(self.keystore.load_account(address)?)
    }

    /// Print and clear the events queued by the last operation
    fn flush_events(&mut self) {
        for event in self.chain.drain_events() {
            print_event(&event);
        }
    }
}

fn print_event(event: &ChainEvent) {
    match serde_json::to_string(event) {
        Ok(json) => println!("   📣 {}", json),
        Err(e) => log::warn!("Could not render event: {}", e),
    }
}

fn print_receipt(receipt: &Receipt) {
    match &receipt.outcome {
        ExecutionOutcome::Pending => {
            println!("   ⏳ Transaction {} awaits more confirmations", receipt.transaction_id)
        }
        ExecutionOutcome::Executed => {
            println!("   ✅ Transaction {} executed", receipt.transaction_id)
        }
        ExecutionOutcome::Failed(reason) => {
            println!(
                "   ⚠️  Transaction {} reached its quorum but failed: {}",
                receipt.transaction_id, reason
            );
            println!("      It stays confirmed; run `treasury execute` to retry");
        }
    }
}

/// Initialize a new treasury
pub fn cmd_init(
    data_dir: &Path,
    chain_id: Option<u64>,
    fee_bps: Option<u16>,
    force: bool,
) -> CliResult<()> {
    let storage = Storage::open(data_dir)?;

    if storage.exists() && !force {
        println!("⚠️  Treasury already exists at {:?}", data_dir);
        println!("   Use --force to reinitialize (this will delete existing data)");
        return Ok(());
    }
    storage.delete()?;

    let keystore = KeyStore::new(&data_dir.join("keys"))?;
    let deployer = keystore.create_account(Some("deployer"))?;

    let mut config = TreasuryConfig::default();
    if let Some(id) = chain_id {
        config.chain_id = id;
    }
    if let Some(bps) = fee_bps {
        config.fee = FeePolicy::new(FeeRate::BasisPoints(bps), deployer.address());
    }
    config.validate()?;
    config.save(&data_dir.join(CONFIG_FILE))?;

    let chain = Chain::from_config(&config, &deployer.address(), wall_clock())?;
    storage.save(&chain)?;

    println!("✅ Treasury initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   ⛓️  Chain id: {}", chain.chain_id());
    println!(
        "   🪙 Token: {} ({}) at {}",
        chain.token().name(),
        chain.token().symbol(),
        chain.token().address()
    );
    println!("   🏭 Wallet registry: {}", chain.registry().address);
    println!("   🔐 Deployer (token owner): {}", deployer.address());
    if let Some(bps) = fee_bps {
        println!("   💸 Protocol fee: {} bps to the deployer", bps);
    }

    Ok(())
}

// ============================================================================
// Keys and Balances
// ============================================================================

/// Create a new signing key
pub fn cmd_key_new(state: &AppState, label: Option<&str>) -> CliResult<()> {
    let account = state.keystore.create_account(label)?;

    println!("🔐 New key created!");
    println!("   📍 Address: {}", account.address());
    println!("   🔑 Public Key: {}", account.public_key());
    if let Some(l) = &account.label {
        println!("   🏷️  Label: {}", l);
    }

    Ok(())
}

/// List all stored keys
pub fn cmd_key_list(state: &AppState) -> CliResult<()> {
    let accounts = state.keystore.list_accounts()?;

    if accounts.is_empty() {
        println!("📭 No keys found. Create one with: treasury key new");
        return Ok(());
    }

    println!("🔐 Keys ({}):", accounts.len());
    for info in accounts {
        let label = info.label.as_deref().unwrap_or("-");
        println!(
            "   {} [{}] {} {}",
            info.address,
            label,
            state.chain.token_balance(&info.address),
            state.chain.token().symbol()
        );
    }

    Ok(())
}

/// Credit native currency to an account (development faucet)
pub fn cmd_fund(state: &mut AppState, address: &Address, amount: u128) -> CliResult<()> {
    state.chain.fund_native(address, amount)?;
    state.save()?;

    println!("💰 Funded {} with {} native", address, amount);
    println!("   Balance: {}", state.chain.native_balance(address));
    Ok(())
}

/// Show balances, permit nonce and wallet seats of an address
pub fn cmd_balance(state: &AppState, address: &Address) -> CliResult<()> {
    let chain = &state.chain;

    println!("💰 Account {}", address);
    println!(
        "   ├─ Token: {} {}",
        chain.token_balance(address),
        chain.token().symbol()
    );
    println!("   ├─ Native: {}", chain.native_balance(address));
    println!("   ├─ Permit nonce: {}", chain.nonce_of(address));

    let wallets = chain.registry().wallets_of(address);
    if wallets.is_empty() {
        println!("   └─ Wallet seats: none");
    } else {
        println!("   └─ Wallet seats: {}", wallets.len());
        for wallet in wallets {
            println!("      • {}", wallet);
        }
    }
    Ok(())
}

// ============================================================================
// Quorum Wallets
// ============================================================================

/// Create a quorum wallet
pub fn cmd_wallet_create(
    state: &mut AppState,
    creator: &Address,
    owners: &[Address],
    required: usize,
) -> CliResult<()> {
    state.account(creator)?;

    let wallet = state.chain.create_wallet(creator, owners.to_vec(), required)?;
    state.save()?;

    println!("🔐 Quorum wallet created!");
    println!("   📍 Address: {}", wallet);
    println!("   👥 Requires {} of {} owners", required, owners.len());
    state.flush_events();
    Ok(())
}

/// Show a quorum wallet
pub fn cmd_wallet_show(state: &AppState, address: &Address) -> CliResult<()> {
    let wallet = state
        .chain
        .wallet(address)
        .ok_or_else(|| format!("Wallet not found: {}", address))?;

    println!("🔐 Quorum wallet {}", wallet.address);
    println!("   ├─ Created: {}", wallet.created_at.to_rfc3339());
    println!(
        "   ├─ Requirement: {}",
        wallet.owner_set().description()
    );
    println!(
        "   ├─ Token balance: {} {}",
        state.chain.token_balance(address),
        state.chain.token().symbol()
    );
    println!("   ├─ Native balance: {}", state.chain.native_balance(address));
    println!(
        "   ├─ Transactions: {} pending, {} executed",
        wallet.transaction_count(true, false),
        wallet.transaction_count(false, true)
    );
    println!("   └─ Owners:");
    for owner in wallet.owners() {
        println!("      • {}", owner);
    }
    Ok(())
}

/// List a wallet's transactions
pub fn cmd_wallet_transactions(
    state: &AppState,
    address: &Address,
    pending: bool,
    executed: bool,
) -> CliResult<()> {
    let wallet = state
        .chain
        .wallet(address)
        .ok_or_else(|| format!("Wallet not found: {}", address))?;

    // No filter flag means show everything
    let (pending, executed) = if pending || executed {
        (pending, executed)
    } else {
        (true, true)
    };

    let ids = wallet.transaction_ids(0, wallet.transactions().len(), pending, executed);
    if ids.is_empty() {
        println!("📭 No transactions");
        return Ok(());
    }

    println!("📋 Transactions of {} ({}):", address, ids.len());
    for id in ids {
        if let Some(tx) = wallet.transaction(id) {
            println!(
                "   #{} {:?} {}/{} \"{}\"",
                id,
                wallet.status(id)?,
                wallet.confirmation_count(id)?,
                wallet.required(),
                tx.proposal.title
            );
            println!(
                "      ├─ Target: {} (value {}, {} payload bytes)",
                tx.target(),
                tx.value(),
                tx.payload().len()
            );
            println!("      └─ Confirmed by: {:?}", wallet.confirmations(id)?);
        }
    }
    Ok(())
}

/// Turn an operation string into a call target and payload
///
/// Token operations target the token; owner management targets the wallet
/// itself; `send:` moves native value only.
pub fn parse_operation(
    op: &str,
    token: &Address,
    wallet: &Address,
) -> CliResult<(Address, Vec<u8>)> {
    let parts: Vec<&str> = op.split(':').collect();

    let parsed = match parts.as_slice() {
        ["mint", amount] => (
            *token,
            TokenCall::Mint {
                amount: amount.parse()?,
            }
            .encode(),
        ),
        ["transfer", to, amount] => (
            *token,
            TokenCall::Transfer {
                to: to.parse()?,
                amount: amount.parse()?,
            }
            .encode(),
        ),
        ["burn", amount] => (
            *token,
            TokenCall::Burn {
                amount: amount.parse()?,
            }
            .encode(),
        ),
        ["transfer-ownership", new_owner] => (
            *token,
            TokenCall::TransferOwnership {
                new_owner: new_owner.parse()?,
            }
            .encode(),
        ),
        ["add-owner", owner] => (
            *wallet,
            WalletCall::AddOwner {
                owner: owner.parse()?,
            }
            .encode(),
        ),
        ["remove-owner", owner] => (
            *wallet,
            WalletCall::RemoveOwner {
                owner: owner.parse()?,
            }
            .encode(),
        ),
        ["replace-owner", owner, new_owner] => (
            *wallet,
            WalletCall::ReplaceOwner {
                owner: owner.parse()?,
                new_owner: new_owner.parse()?,
            }
            .encode(),
        ),
        ["change-requirement", required] => (
            *wallet,
            WalletCall::ChangeRequirement {
                required: required.parse()?,
            }
            .encode(),
        ),
        ["send", to] => (to.parse()?, Vec::new()),
        _ => return Err(format!("Unknown operation: {}", op).into()),
    };

    Ok(parsed)
}

/// Submit a transaction to a quorum wallet
pub fn cmd_submit(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    op: &str,
    title: Option<&str>,
    description: Option<&str>,
    value: u128,
) -> CliResult<()> {
    state.account(caller)?;

    let (target, payload) = parse_operation(op, &state.chain.token().address(), wallet)?;
    let proposal = Proposal {
        title: title.unwrap_or(op).to_string(),
        description: description.unwrap_or_default().to_string(),
        target,
        value,
        payload,
    };

    println!("📤 Submitting \"{}\" to {}", proposal.title, wallet);
    let receipt = state.chain.submit_transaction(wallet, caller, proposal)?;
    state.save()?;

    print_receipt(&receipt);
    state.flush_events();
    Ok(())
}

/// Confirm a pending transaction
pub fn cmd_confirm(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    id: TransactionId,
) -> CliResult<()> {
    state.account(caller)?;

    let receipt = state.chain.confirm_transaction(wallet, caller, id)?;
    state.save()?;

    println!("✍️  {} confirmed transaction {}", caller, id);
    print_receipt(&receipt);
    state.flush_events();
    Ok(())
}

/// Revoke a confirmation
pub fn cmd_revoke(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    id: TransactionId,
) -> CliResult<()> {
    state.account(caller)?;

    state.chain.revoke_confirmation(wallet, caller, id)?;
    state.save()?;

    println!("↩️  {} revoked confirmation of transaction {}", caller, id);
    state.flush_events();
    Ok(())
}

/// Execute a confirmed transaction
pub fn cmd_execute(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    id: TransactionId,
) -> CliResult<()> {
    state.account(caller)?;

    state.chain.execute_transaction(wallet, caller, id)?;
    state.save()?;

    println!("✅ Transaction {} executed", id);
    state.flush_events();
    Ok(())
}

// ============================================================================
// Token
// ============================================================================

/// Show token information
pub fn cmd_token_info(state: &AppState) -> CliResult<()> {
    let token = state.chain.token();

    println!("🪙 {} ({})", token.name(), token.symbol());
    println!("   ├─ Address: {}", token.address());
    println!("   ├─ Decimals: {}", token.decimals());
    println!("   ├─ Supply: {} / {}", token.total_supply(), token.supply_cap());
    println!("   ├─ Holders: {}", token.holder_count());
    println!("   └─ Owner: {}", token.owner());
    Ok(())
}

/// Hand token ownership to another address, usually a quorum wallet
pub fn cmd_token_set_owner(
    state: &mut AppState,
    caller: &Address,
    new_owner: &Address,
) -> CliResult<()> {
    state.account(caller)?;

    state.chain.transfer_token_ownership(caller, new_owner)?;
    state.save()?;

    println!("🔑 Token ownership transferred to {}", new_owner);
    state.flush_events();
    Ok(())
}

// ============================================================================
// Permits
// ============================================================================

/// Sign a transfer permit for the holder's current nonce
pub fn cmd_permit_sign(
    state: &AppState,
    from: &Address,
    to: &Address,
    amount: u128,
    expires_in: u64,
    out: Option<&Path>,
) -> CliResult<()> {
    let account = state.account(from)?;

    let expiry = state.chain.timestamp().saturating_add(expires_in);
    let permit = state.chain.permit_for(from, to, amount, expiry);
    let transfer = account.signed_transfer(&permit);
    let json = serde_json::to_string_pretty(&transfer)?;

    println!("🖊️  Permit signed by {}", from);
    println!("   ├─ Nonce: {}", permit.nonce);
    println!("   ├─ Expiry: {}", expiry);
    println!("   └─ Digest: 0x{}", hex::encode(permit.digest()));

    match out {
        Some(path) => {
            fs::write(path, &json)?;
            println!("💾 Saved to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Relay a signed permit from a file
pub fn cmd_permit_relay(state: &mut AppState, file: &Path, with_fee: bool) -> CliResult<()> {
    let transfer: SignedTransfer = serde_json::from_str(&fs::read_to_string(file)?)?;

    let receipt = if with_fee {
        state.chain.delegated_transfer_with_fee(&transfer)?
    } else {
        state.chain.delegated_transfer(&transfer)?
    };
    state.save()?;

    println!("📨 Permit relayed!");
    println!("   ├─ From: {}", receipt.from);
    println!("   ├─ To: {}", receipt.to);
    println!("   ├─ Amount: {}", receipt.amount);
    println!("   ├─ Fee: {}", receipt.fee);
    println!("   └─ Nonce used: {}", receipt.nonce);
    state.flush_events();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::TransactionStatus;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_parse_token_operations() {
        let token = addr(0xee);
        let wallet = addr(0xaa);

        let (target, payload) = parse_operation("mint:1000", &token, &wallet).unwrap();
        assert_eq!(target, token);
        assert_eq!(
            TokenCall::decode(&payload).unwrap(),
            TokenCall::Mint { amount: 1000 }
        );

        let op = format!("transfer:{}:25", addr(2));
        let (target, payload) = parse_operation(&op, &token, &wallet).unwrap();
        assert_eq!(target, token);
        assert_eq!(
            TokenCall::decode(&payload).unwrap(),
            TokenCall::Transfer {
                to: addr(2),
                amount: 25
            }
        );
    }

    #[test]
    fn test_parse_owner_operations() {
        let token = addr(0xee);
        let wallet = addr(0xaa);

        let op = format!("replace-owner:{}:{}", addr(1), addr(4));
        let (target, payload) = parse_operation(&op, &token, &wallet).unwrap();
        assert_eq!(target, wallet);
        assert_eq!(
            WalletCall::decode(&payload).unwrap(),
            WalletCall::ReplaceOwner {
                owner: addr(1),
                new_owner: addr(4)
            }
        );

        let (_, payload) = parse_operation("change-requirement:3", &token, &wallet).unwrap();
        assert_eq!(
            WalletCall::decode(&payload).unwrap(),
            WalletCall::ChangeRequirement { required: 3 }
        );

        let (target, payload) =
            parse_operation(&format!("send:{}", addr(5)), &token, &wallet).unwrap();
        assert_eq!(target, addr(5));
        assert!(payload.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_operations() {
        let token = addr(0xee);
        let wallet = addr(0xaa);

        assert!(parse_operation("mint", &token, &wallet).is_err());
        assert!(parse_operation("mint:lots", &token, &wallet).is_err());
        assert!(parse_operation("transfer:0x12:5", &token, &wallet).is_err());
        assert!(parse_operation("selfdestruct:1", &token, &wallet).is_err());
    }

    #[test]
    fn test_commands_drive_a_treasury() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().to_path_buf();

        cmd_init(&data_dir, Some(31337), None, false).unwrap();
        let mut state = AppState::new(data_dir.clone()).unwrap();
        assert_eq!(state.chain.chain_id(), 31337);

        let deployer = state.keystore.list_accounts().unwrap()[0].address;
        let alice = state.keystore.create_account(Some("alice")).unwrap().address();
        let bob = state.keystore.create_account(Some("bob")).unwrap().address();

        cmd_wallet_create(&mut state, &deployer, &[deployer, alice, bob], 2).unwrap();
        let wallet = state.chain.registry().wallets().next().unwrap().address;

        cmd_token_set_owner(&mut state, &deployer, &wallet).unwrap();
        cmd_submit(&mut state, &wallet, &alice, "mint:1000", None, None, 0).unwrap();
        cmd_confirm(&mut state, &wallet, &bob, 0).unwrap();
        assert_eq!(state.chain.token_balance(&wallet), 1000);

        // State survives a reload
        let state = AppState::new(data_dir).unwrap();
        let reloaded = state.chain.wallet(&wallet).unwrap();
        assert_eq!(reloaded.status(0).unwrap(), TransactionStatus::Executed);
        assert_eq!(state.chain.token_balance(&wallet), 1000);
    }

    #[test]
    fn test_permit_sign_and_relay() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().to_path_buf();

        cmd_init(&data_dir, None, Some(100), false).unwrap();
        let mut state = AppState::new(data_dir.clone()).unwrap();
        let deployer = state.keystore.list_accounts().unwrap()[0].address;
        let holder = state.keystore.create_account(None).unwrap().address();

        let wallet = state
            .chain
            .create_wallet(&deployer, vec![deployer], 1)
            .unwrap();
        cmd_token_set_owner(&mut state, &deployer, &wallet).unwrap();
        cmd_submit(&mut state, &wallet, &deployer, "mint:1000", None, None, 0).unwrap();
        let pay_holder = format!("transfer:{}:500", holder);
        cmd_submit(&mut state, &wallet, &deployer, &pay_holder, None, None, 0).unwrap();
        assert_eq!(state.chain.token_balance(&holder), 500);

        let permit_path = data_dir.join("permit.json");
        cmd_permit_sign(&state, &holder, &addr(7), 500, 3600, Some(permit_path.as_path())).unwrap();
        cmd_permit_relay(&mut state, &permit_path, true).unwrap();

        assert_eq!(state.chain.token_balance(&addr(7)), 495);
        assert_eq!(state.chain.token_balance(&deployer), 5);
        assert_eq!(state.chain.nonce_of(&holder), 1);

        // The same permit cannot be relayed twice
        assert!(cmd_permit_relay(&mut state, &permit_path, true).is_err());
    }

    #[test]
    fn test_permit_sign_writes_recoverable_transfer() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().to_path_buf();

        cmd_init(&data_dir, None, None, false).unwrap();
        let state = AppState::new(data_dir.clone()).unwrap();
        let holder = state.keystore.create_account(None).unwrap().address();

        let permit_path = data_dir.join("signed.json");
        cmd_permit_sign(&state, &holder, &addr(9), 42, 60, Some(permit_path.as_path())).unwrap();

        let transfer: SignedTransfer =
            serde_json::from_str(&fs::read_to_string(&permit_path).unwrap()).unwrap();
        assert_eq!(transfer.from, holder);
        assert_eq!(transfer.to, addr(9));
        assert_eq!(transfer.amount, 42);
        assert_eq!(transfer.expiry, state.chain.timestamp() + 60);

        let permit = state.chain.permit_for(&holder, &addr(9), 42, transfer.expiry);
        assert_eq!(permit.signer(&transfer.signature).unwrap(), holder);

        // Signing without an output file prints and never touches the nonce
        cmd_permit_sign(&state, &holder, &addr(9), 42, 60, None).unwrap();
        assert_eq!(state.chain.nonce_of(&holder), 0);
    }
}
