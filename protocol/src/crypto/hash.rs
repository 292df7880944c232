//! # Hashing Utilities
//!
//! Keccak-256 and the EIP-191 personal-message construction. The settlement
//! engine does not get to pick its hash function: the off-ledger authorizer
//! signs with standard Ethereum tooling, so the digest must be bit-exact with
//! what `personal_sign` produces.
//!
//! ## Authorization digest
//!
//! ```text
//! inner  = keccak256(from(20) || to(20) || value(32) || chain_id(32) || nonce(32))
//! digest = keccak256("\x19Ethereum Signed Message:\n32" || inner)
//! ```
//!
//! This is `abi.encodePacked(address, address, uint256, uint256, uint256)`
//! followed by the 32-byte personal-message wrapper.

use sha3::{Digest, Keccak256};

use crate::config::{SIGNED_MESSAGE_PREFIX, WORD_LENGTH};
use crate::types::{Address, Amount};

/// Compute the Keccak-256 hash of the input data.
///
/// Note this is the original Keccak padding used by Ethereum, not the
/// finalized NIST SHA3-256.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// EIP-191 personal-message hash for a message of arbitrary length.
///
/// The prefix embeds the decimal byte length of the message.
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// EIP-191 hash of a 32-byte payload, using the fixed `:\n32` prefix.
pub fn to_eth_signed_message_hash(hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(SIGNED_MESSAGE_PREFIX);
    hasher.update(hash);
    hasher.finalize().into()
}

/// Left-pads an amount into a big-endian ABI word.
pub fn amount_word(value: Amount) -> [u8; WORD_LENGTH] {
    let mut word = [0u8; WORD_LENGTH];
    word[WORD_LENGTH - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Left-pads a `u64` (chain id, nonce) into a big-endian ABI word.
pub fn u64_word(value: u64) -> [u8; WORD_LENGTH] {
    let mut word = [0u8; WORD_LENGTH];
    word[WORD_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// The inner transfer hash: `keccak256(abi.encodePacked(from, to, value, chainId, nonce))`.
pub fn transfer_hash(from: &Address, to: &Address, value: Amount, chain_id: u64, nonce: u64) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(from.as_bytes());
    hasher.update(to.as_bytes());
    hasher.update(amount_word(value));
    hasher.update(u64_word(chain_id));
    hasher.update(u64_word(nonce));
    hasher.finalize().into()
}

/// The digest the authorizer signs for a single transfer.
///
/// Binding `chain_id` here is what stops an authorization minted for one
/// deployment from being replayed on another.
pub fn authorization_digest(
    from: &Address,
    to: &Address,
    value: Amount,
    chain_id: u64,
    nonce: u64,
) -> [u8; 32] {
    to_eth_signed_message_hash(&transfer_hash(from, to, value, chain_id, nonce))
}
