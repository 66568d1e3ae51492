//! Live treasury event stream
//!
//! Every chain event produced by an API call is flattened into a typed
//! [`WsEvent`] and fanned out to subscribers. A client that connects with
//! `/ws?address=0x...` only receives events touching that wallet or account.

use crate::crypto::Address;
use crate::host::ChainEvent;
use crate::multisig::{TransactionId, WalletEvent};
use crate::permit::DelegatedTransferReceipt;
use crate::token::TokenEvent;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

/// Events buffered per subscriber before it starts lagging
const BROADCAST_CAPACITY: usize = 256;

/// Message pushed to stream clients
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    Connected {
        message: String,
        address: Option<Address>,
    },
    WalletCreated {
        wallet: Address,
        creator: Address,
    },
    Submission {
        wallet: Address,
        transaction_id: TransactionId,
    },
    Confirmation {
        wallet: Address,
        sender: Address,
        transaction_id: TransactionId,
    },
    Revocation {
        wallet: Address,
        sender: Address,
        transaction_id: TransactionId,
    },
    Execution {
        wallet: Address,
        transaction_id: TransactionId,
    },
    ExecutionFailure {
        wallet: Address,
        transaction_id: TransactionId,
        reason: String,
    },
    OwnerAdded {
        wallet: Address,
        owner: Address,
    },
    OwnerRemoved {
        wallet: Address,
        owner: Address,
    },
    RequirementChanged {
        wallet: Address,
        required: usize,
    },
    TokenTransfer {
        from: Address,
        to: Address,
        amount: u128,
    },
    TokenMint {
        to: Address,
        amount: u128,
    },
    TokenBurn {
        from: Address,
        amount: u128,
    },
    TokenOwnerChanged {
        previous: Address,
        owner: Address,
    },
    DelegatedTransfer(DelegatedTransferReceipt),
    NativeTransfer {
        from: Address,
        to: Address,
        amount: u128,
    },
}

impl WsEvent {
    fn from_wallet(wallet: Address, event: WalletEvent) -> Self {
        match event {
            WalletEvent::Submission { transaction_id } => WsEvent::Submission {
                wallet,
                transaction_id,
            },
            WalletEvent::Confirmation {
                sender,
                transaction_id,
            } => WsEvent::Confirmation {
                wallet,
                sender,
                transaction_id,
            },
            WalletEvent::Revocation {
                sender,
                transaction_id,
            } => WsEvent::Revocation {
                wallet,
                sender,
                transaction_id,
            },
            WalletEvent::Execution { transaction_id } => WsEvent::Execution {
                wallet,
                transaction_id,
            },
            WalletEvent::ExecutionFailure {
                transaction_id,
                reason,
            } => WsEvent::ExecutionFailure {
                wallet,
                transaction_id,
                reason,
            },
            WalletEvent::OwnerAddition { owner } => WsEvent::OwnerAdded { wallet, owner },
            WalletEvent::OwnerRemoval { owner } => WsEvent::OwnerRemoved { wallet, owner },
            WalletEvent::RequirementChange { required } => {
                WsEvent::RequirementChanged { wallet, required }
            }
        }
    }

    fn from_token(event: TokenEvent) -> Self {
        match event {
            TokenEvent::Transfer { from, to, amount, .. } => {
                WsEvent::TokenTransfer { from, to, amount }
            }
            TokenEvent::Mint { to, amount, .. } => WsEvent::TokenMint { to, amount },
            TokenEvent::Burn { from, amount, .. } => WsEvent::TokenBurn { from, amount },
            TokenEvent::OwnershipTransferred {
                previous, owner, ..
            } => WsEvent::TokenOwnerChanged { previous, owner },
        }
    }

    /// Whether `address` is the wallet, sender, owner or counterparty of this event
    pub fn involves(&self, address: &Address) -> bool {
        match self {
            WsEvent::Connected { .. } => true,
            WsEvent::WalletCreated { wallet, creator } => wallet == address || creator == address,
            WsEvent::Submission { wallet, .. }
            | WsEvent::Execution { wallet, .. }
            | WsEvent::ExecutionFailure { wallet, .. }
            | WsEvent::RequirementChanged { wallet, .. } => wallet == address,
            WsEvent::Confirmation { wallet, sender, .. }
            | WsEvent::Revocation { wallet, sender, .. } => wallet == address || sender == address,
            WsEvent::OwnerAdded { wallet, owner } | WsEvent::OwnerRemoved { wallet, owner } => {
                wallet == address || owner == address
            }
            WsEvent::TokenTransfer { from, to, .. } | WsEvent::NativeTransfer { from, to, .. } => {
                from == address || to == address
            }
            WsEvent::TokenMint { to, .. } => to == address,
            WsEvent::TokenBurn { from, .. } => from == address,
            WsEvent::TokenOwnerChanged { previous, owner } => {
                previous == address || owner == address
            }
            WsEvent::DelegatedTransfer(receipt) => {
                receipt.from == *address || receipt.to == *address
            }
        }
    }
}

impl From<ChainEvent> for WsEvent {
    fn from(event: ChainEvent) -> Self {
        match event {
            ChainEvent::ContractInstantiation(instantiation) => WsEvent::WalletCreated {
                wallet: instantiation.wallet,
                creator: instantiation.creator,
            },
            ChainEvent::Wallet { wallet, event } => WsEvent::from_wallet(wallet, event),
            ChainEvent::Token(event) => WsEvent::from_token(event),
            ChainEvent::DelegatedTransfer(receipt) => WsEvent::DelegatedTransfer(receipt),
            ChainEvent::NativeTransfer { from, to, amount } => {
                WsEvent::NativeTransfer { from, to, amount }
            }
        }
    }
}

/// Query string of `/ws`
#[derive(Debug, Default, Deserialize)]
pub struct Subscription {
    /// Only forward events involving this wallet or account
    pub address: Option<Address>,
}

impl Subscription {
    pub fn accepts(&self, event: &WsEvent) -> bool {
        match &self.address {
            Some(address) => event.involves(address),
            None => true,
        }
    }
}

/// Fans chain events out to every connected stream client
#[derive(Debug)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsEvent>,
}

impl WsBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Publish events in the order the chain produced them
    pub fn publish(&self, events: impl IntoIterator<Item = ChainEvent>) {
        for event in events {
            // Err only means nobody is listening
            let _ = self.sender.send(event.into());
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Upgrade `/ws` to a filtered event stream
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(subscription): Query<Subscription>,
    State(state): State<crate::api::handlers::ApiState>,
) -> impl IntoResponse {
    let rx = state.ws_broadcaster.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, subscription))
}

async fn handle_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<WsEvent>,
    subscription: Subscription,
) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = WsEvent::Connected {
        message: "Connected to treasury event stream".to_string(),
        address: subscription.address,
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Stream client fell behind, {} events dropped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !subscription.accepts(&event) {
                continue;
            }
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("Failed to encode stream event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Clients only talk to close the stream
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    log::warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    log::info!("Event stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::ContractInstantiation;
    use axum::http::Uri;
    use chrono::Utc;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn confirmation(wallet: Address, sender: Address) -> ChainEvent {
        ChainEvent::Wallet {
            wallet,
            event: WalletEvent::Confirmation {
                sender,
                transaction_id: 3,
            },
        }
    }

    #[test]
    fn test_wallet_events_carry_their_wallet() {
        let event = WsEvent::from(confirmation(addr(0xaa), addr(1)));
        assert_eq!(
            event,
            WsEvent::Confirmation {
                wallet: addr(0xaa),
                sender: addr(1),
                transaction_id: 3,
            }
        );

        let event = WsEvent::from(ChainEvent::Wallet {
            wallet: addr(0xaa),
            event: WalletEvent::RequirementChange { required: 2 },
        });
        assert_eq!(
            event,
            WsEvent::RequirementChanged {
                wallet: addr(0xaa),
                required: 2,
            }
        );
    }

    #[test]
    fn test_instantiation_and_token_events_mapped() {
        let created = WsEvent::from(ChainEvent::ContractInstantiation(ContractInstantiation {
            wallet: addr(0xaa),
            creator: addr(5),
            timestamp: Utc::now(),
        }));
        assert_eq!(
            created,
            WsEvent::WalletCreated {
                wallet: addr(0xaa),
                creator: addr(5),
            }
        );

        let mint = WsEvent::from(ChainEvent::Token(TokenEvent::Mint {
            to: addr(0xaa),
            amount: 77,
            timestamp: Utc::now(),
        }));
        assert_eq!(
            mint,
            WsEvent::TokenMint {
                to: addr(0xaa),
                amount: 77,
            }
        );
    }

    #[test]
    fn test_involves_wallet_and_participants() {
        let event = WsEvent::from(confirmation(addr(0xaa), addr(1)));
        assert!(event.involves(&addr(0xaa)));
        assert!(event.involves(&addr(1)));
        assert!(!event.involves(&addr(2)));

        let relayed = WsEvent::DelegatedTransfer(DelegatedTransferReceipt {
            from: addr(1),
            to: addr(2),
            amount: 10,
            fee: 0,
            nonce: 0,
        });
        assert!(relayed.involves(&addr(2)));
        assert!(!relayed.involves(&addr(0xaa)));
    }

    #[test]
    fn test_subscription_filters_by_address() {
        let everything = Subscription::default();
        let one_wallet = Subscription {
            address: Some(addr(0xaa)),
        };
        let other = WsEvent::from(confirmation(addr(0xbb), addr(1)));
        let mine = WsEvent::from(confirmation(addr(0xaa), addr(1)));

        assert!(everything.accepts(&other));
        assert!(one_wallet.accepts(&mine));
        assert!(!one_wallet.accepts(&other));
    }

    #[test]
    fn test_subscription_query_parses_address() {
        let uri: Uri = format!("/ws?address={}", addr(0xaa)).parse().unwrap();
        let Query(subscription) = Query::<Subscription>::try_from_uri(&uri).unwrap();
        assert_eq!(subscription.address, Some(addr(0xaa)));

        let uri: Uri = "/ws".parse().unwrap();
        let Query(subscription) = Query::<Subscription>::try_from_uri(&uri).unwrap();
        assert!(subscription.address.is_none());

        let uri: Uri = "/ws?address=0x1234".parse().unwrap();
        assert!(Query::<Subscription>::try_from_uri(&uri).is_err());
    }

    #[test]
    fn test_publish_preserves_order() {
        let broadcaster = WsBroadcaster::new();
        // No subscribers yet; publishing must not fail
        broadcaster.publish(vec![confirmation(addr(0xaa), addr(1))]);

        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        broadcaster.publish(vec![
            confirmation(addr(0xaa), addr(1)),
            ChainEvent::NativeTransfer {
                from: addr(1),
                to: addr(2),
                amount: 10u128.pow(24),
            },
        ]);

        assert!(matches!(rx.try_recv().unwrap(), WsEvent::Confirmation { .. }));
        let native = rx.try_recv().unwrap();
        let json = serde_json::to_string(&native).unwrap();
        assert!(json.contains("NativeTransfer"));
        assert!(json.contains("1000000000000000000000000"));
    }
}
