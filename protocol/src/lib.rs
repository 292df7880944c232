// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Prosynergy Protocol Core Library
//!
//! Ledger primitives for KYC-gated settlement on a partitioned ledger. A
//! transfer either passes unconditionally (exempt accounts, the
//! administrator, self-transfers) or carries a single-use authorization
//! signed by an off-ledger compliance service. Authorized transfers are
//! settled net of two fixed-rate fees.
//!
//! This crate holds the pieces with real invariants; the orchestration that
//! composes them lives in `prosynergy-contracts`.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants. Several of them are part of the
//!   signed-digest format and cannot change without breaking signers.
//! - **types**: Addresses and amounts.
//! - **crypto**: Keccak-256, EIP-191 digests, secp256k1 recovery.
//! - **codec**: ABI encoding of the `(nonce, signature)` authorization payload.
//! - **ledger**: Partitioned balances, nonces, exemptions, fee math.
//!
//! ## Design Philosophy
//!
//! 1. Checked arithmetic everywhere money moves. Wrapping is a bug.
//! 2. Validate the whole update, then write. Never the other way round.
//! 3. Signature verification answers `bool`, never a detailed error.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod types;

pub use codec::{AuthorizationPayload, CodecError};
pub use types::{Address, AddressError, Amount};
