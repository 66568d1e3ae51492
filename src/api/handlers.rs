//! REST API handlers for treasury operations

use crate::api::websocket::WsBroadcaster;
use crate::crypto::Address;
use crate::host::{wall_clock, Chain, ChainError};
use crate::multisig::{
    PendingTransaction, QuorumWallet, TransactionId, TransactionStatus, WalletEvent,
};
use crate::permit::{DelegatedTransferReceipt, FeePolicy, PermitError, SignedTransfer};
use crate::storage::Storage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub chain: Arc<RwLock<Chain>>,
    pub storage: Arc<Storage>,
    pub ws_broadcaster: Arc<WsBroadcaster>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ChainInfo {
    pub chain_id: u64,
    pub timestamp: u64,
    pub token: TokenInfo,
    pub registry: Address,
    pub wallet_count: usize,
    pub native_supply: u128,
    pub fee_policy: FeePolicy,
}

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: u128,
    pub supply_cap: u128,
    pub owner: Address,
    pub holders: usize,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub address: Address,
    pub token_balance: u128,
    pub native_balance: u128,
    /// Nonce the next permit from this account must carry
    pub nonce: u64,
    pub wallets: Vec<Address>,
}

#[derive(Debug, Serialize)]
pub struct WalletSummary {
    pub address: Address,
    pub owners: Vec<Address>,
    pub required: usize,
    pub pending_transactions: usize,
    pub executed_transactions: usize,
    pub token_balance: u128,
    pub native_balance: u128,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub wallet: WalletSummary,
    pub events: Vec<WalletEvent>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub title: String,
    pub description: String,
    pub target: Address,
    pub value: String,
    pub payload: String,
    pub submitted_by: Address,
    pub confirmations: Vec<Address>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub chain_id: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

// ============================================================================
// Request Types
// ============================================================================

/// Filter for transaction listings; no flag means everything
#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub executed: bool,
}

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub transfer: SignedTransfer,
    /// Carve the protocol fee out of the amount
    #[serde(default)]
    pub with_fee: bool,
}

// ============================================================================
// Helpers
// ============================================================================

fn error(status: StatusCode, message: String) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: message }))
}

fn parse_address(s: &str) -> Result<Address, (StatusCode, Json<ApiError>)> {
    s.parse()
        .map_err(|e| error(StatusCode::BAD_REQUEST, format!("{}", e)))
}

fn find_wallet<'a>(
    chain: &'a Chain,
    address: &Address,
) -> Result<&'a QuorumWallet, (StatusCode, Json<ApiError>)> {
    chain.wallet(address).ok_or_else(|| {
        error(
            StatusCode::NOT_FOUND,
            format!("Wallet not found: {}", address),
        )
    })
}

fn wallet_summary(chain: &Chain, wallet: &QuorumWallet) -> WalletSummary {
    WalletSummary {
        address: wallet.address,
        owners: wallet.owners().to_vec(),
        required: wallet.required(),
        pending_transactions: wallet.transaction_count(true, false),
        executed_transactions: wallet.transaction_count(false, true),
        token_balance: chain.token_balance(&wallet.address),
        native_balance: chain.native_balance(&wallet.address),
        created_at: wallet.created_at,
    }
}

fn transaction_response(wallet: &QuorumWallet, tx: &PendingTransaction) -> TransactionResponse {
    let owners = wallet.owners();
    TransactionResponse {
        id: tx.id,
        title: tx.proposal.title.clone(),
        description: tx.proposal.description.clone(),
        target: *tx.target(),
        value: tx.value().to_string(),
        payload: format!("0x{}", hex::encode(tx.payload())),
        submitted_by: tx.submitted_by,
        confirmations: tx
            .confirmations()
            .filter(|owner| owners.contains(*owner))
            .copied()
            .collect(),
        status: tx.status(owners, wallet.required()),
        created_at: tx.created_at,
        executed_at: tx.executed_at,
    }
}

fn relay_status(err: &ChainError) -> StatusCode {
    match err {
        ChainError::Permit(PermitError::InvalidSignature) => StatusCode::UNAUTHORIZED,
        ChainError::Permit(PermitError::ExpiredSignature) => StatusCode::GONE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let chain = state.chain.read().await;
    Json(HealthResponse {
        status: "ok",
        chain_id: chain.chain_id(),
        timestamp: chain.timestamp(),
    })
}

/// GET /api/chain - Chain, token and fee information
pub async fn get_chain_info(State(state): State<ApiState>) -> Json<ChainInfo> {
    let chain = state.chain.read().await;
    let token = chain.token();

    Json(ChainInfo {
        chain_id: chain.chain_id(),
        timestamp: chain.timestamp(),
        token: TokenInfo {
            address: token.address(),
            name: token.name().to_string(),
            symbol: token.symbol().to_string(),
            decimals: token.decimals(),
            total_supply: token.total_supply(),
            supply_cap: token.supply_cap(),
            owner: token.owner(),
            holders: token.holder_count(),
        },
        registry: chain.registry().address,
        wallet_count: chain.registry().len(),
        native_supply: chain.native_supply(),
        fee_policy: chain.authority().fee_policy().clone(),
    })
}

/// GET /api/accounts/{address} - Balances and permit nonce
pub async fn get_account(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<AccountResponse> {
    let address = parse_address(&address)?;
    let chain = state.chain.read().await;

    Ok(Json(AccountResponse {
        address,
        token_balance: chain.token_balance(&address),
        native_balance: chain.native_balance(&address),
        nonce: chain.nonce_of(&address),
        wallets: chain.registry().wallets_of(&address),
    }))
}

/// GET /api/wallets - List quorum wallets
pub async fn list_wallets(State(state): State<ApiState>) -> Json<Vec<WalletSummary>> {
    let chain = state.chain.read().await;
    let wallets = chain
        .registry()
        .wallets()
        .map(|wallet| wallet_summary(&chain, wallet))
        .collect();
    Json(wallets)
}

/// GET /api/wallets/{address} - Wallet with its event log
pub async fn get_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<WalletResponse> {
    let address = parse_address(&address)?;
    let chain = state.chain.read().await;
    let wallet = find_wallet(&chain, &address)?;

    Ok(Json(WalletResponse {
        wallet: wallet_summary(&chain, wallet),
        events: wallet.events().to_vec(),
    }))
}

/// GET /api/wallets/{address}/transactions - List transactions
pub async fn list_transactions(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Vec<TransactionResponse>> {
    let address = parse_address(&address)?;
    let chain = state.chain.read().await;
    let wallet = find_wallet(&chain, &address)?;

    let (pending, executed) = if filter.pending || filter.executed {
        (filter.pending, filter.executed)
    } else {
        (true, true)
    };

    let transactions = wallet
        .transaction_ids(0, wallet.transactions().len(), pending, executed)
        .into_iter()
        .filter_map(|id| wallet.transaction(id))
        .map(|tx| transaction_response(wallet, tx))
        .collect();
    Ok(Json(transactions))
}

/// GET /api/wallets/{address}/transactions/{id} - Get transaction
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path((address, id)): Path<(String, TransactionId)>,
) -> ApiResult<TransactionResponse> {
    let address = parse_address(&address)?;
    let chain = state.chain.read().await;
    let wallet = find_wallet(&chain, &address)?;

    let tx = wallet.transaction(id).ok_or_else(|| {
        error(
            StatusCode::NOT_FOUND,
            format!("Transaction {} not found in {}", id, address),
        )
    })?;
    Ok(Json(transaction_response(wallet, tx)))
}

/// POST /api/permits - Relay a signed transfer permit
///
/// Anyone may relay; the signature is the authorization.
pub async fn relay_permit(
    State(state): State<ApiState>,
    Json(req): Json<RelayRequest>,
) -> ApiResult<DelegatedTransferReceipt> {
    let mut chain = state.chain.write().await;
    chain.sync_clock(wall_clock());

    let result = if req.with_fee {
        chain.delegated_transfer_with_fee(&req.transfer)
    } else {
        chain.delegated_transfer(&req.transfer)
    };
    let events = chain.drain_events();

    let receipt = result.map_err(|e| {
        log::info!("Rejected permit from {}: {}", req.transfer.from, e);
        error(relay_status(&e), e.to_string())
    })?;

    if let Err(e) = state.storage.save(&chain) {
        log::error!("Failed to save chain: {}", e);
    }
    drop(chain);

    state.ws_broadcaster.publish(events);

    Ok(Json(receipt))
}
