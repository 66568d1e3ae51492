//! REST API module
//!
//! Provides HTTP access to the treasury and a relay for signed permits.
//!
//! # Endpoints
//!
//! ## Chain
//! - `GET /api/chain` - Chain, token and fee information
//! - `GET /api/accounts/{address}` - Balances, permit nonce and wallet seats
//!
//! ## Wallets
//! - `GET /api/wallets` - List quorum wallets
//! - `GET /api/wallets/{address}` - Wallet with its event log
//! - `GET /api/wallets/{address}/transactions` - Transactions (`?pending=true`, `?executed=true`)
//! - `GET /api/wallets/{address}/transactions/{id}` - Single transaction
//!
//! ## Permits
//! - `POST /api/permits` - Relay a signed transfer (`{"transfer": {...}, "with_fee": false}`)
//!
//! ## WebSocket
//! - `GET /ws` - Chain events as they happen; `?address=` narrows to one wallet or account

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::{WsBroadcaster, WsEvent};
