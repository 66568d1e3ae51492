//! Signed transfer permits
//!
//! A balance holder signs a [`TransferPermit`] off-line; anyone can then
//! relay it as a [`SignedTransfer`]. The [`DelegatedTransferAuthority`]
//! checks expiry, recovers the signer, consumes the holder's nonce and moves
//! the funds, optionally carving a protocol fee out of the amount.

pub mod authority;
pub mod fee;
pub mod message;

pub use authority::{
    DelegatedTransferAuthority, DelegatedTransferReceipt, PermitError, SignedTransfer,
};
pub use fee::{FeePolicy, FeeRate, MAX_BASIS_POINTS};
pub use message::{compute_message, TransferPermit, MESSAGE_LEN};
