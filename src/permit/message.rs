//! Transfer permit messages
//!
//! The digest covers, in this order: chain id, token address, sender,
//! recipient, amount, nonce and expiry. Integers are 32-byte big-endian
//! words and addresses are their raw 20 bytes, so the message is always
//! 188 bytes long before hashing.

use crate::abi::{u128_word, u64_word};
use crate::crypto::{
    eth_signed_message_hash, keccak256, recover_address, Address, Hash32, KeyError, KeyPair,
    Signature, ADDRESS_LEN,
};
use serde::{Deserialize, Serialize};

/// Length of the packed message
pub const MESSAGE_LEN: usize = 4 * 32 + 3 * ADDRESS_LEN;

/// Keccak-256 digest of the seven permit fields
pub fn compute_message(
    chain_id: u64,
    token: &Address,
    from: &Address,
    to: &Address,
    amount: u128,
    nonce: u64,
    expiry: u64,
) -> Hash32 {
    let mut packed = Vec::with_capacity(MESSAGE_LEN);
    packed.extend_from_slice(&u64_word(chain_id));
    packed.extend_from_slice(token.as_bytes());
    packed.extend_from_slice(from.as_bytes());
    packed.extend_from_slice(to.as_bytes());
    packed.extend_from_slice(&u128_word(amount));
    packed.extend_from_slice(&u64_word(nonce));
    packed.extend_from_slice(&u64_word(expiry));
    keccak256(&packed)
}

/// Authorization for one transfer of `amount` from `from` to `to`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferPermit {
    pub chain_id: u64,
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: u128,
    pub nonce: u64,
    /// Unix time (seconds) after which the permit is void
    pub expiry: u64,
}

impl TransferPermit {
    pub fn digest(&self) -> Hash32 {
        compute_message(
            self.chain_id,
            &self.token,
            &self.from,
            &self.to,
            self.amount,
            self.nonce,
            self.expiry,
        )
    }

    /// Hash that is actually signed: the digest under the signed-message prefix
    pub fn signing_hash(&self) -> Hash32 {
        eth_signed_message_hash(&self.digest())
    }

    pub fn sign(&self, key: &KeyPair) -> Signature {
        key.sign(&self.signing_hash())
    }

    /// Address that produced `signature` over this permit
    pub fn signer(&self, signature: &Signature) -> Result<Address, KeyError> {
        recover_address(&self.signing_hash(), signature)
    }
}
