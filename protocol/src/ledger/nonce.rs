//! # Nonce Registry
//!
//! Per-account authorization counters. An authorization is valid for exactly
//! one nonce value: the account's *current* nonce. Strict equality forbids
//! replaying an old authorization and submitting a future one out of order.
//!
//! Consumption increments by one. If the transfer that consumed a nonce
//! fails later on, the orchestrator hands the returned [`NonceReceipt`]
//! back to [`NonceRegistry::restore`], so a nonce is never burned without a
//! completed transfer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Address;

/// Errors produced by nonce consumption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceError {
    /// The claimed nonce is not the account's current nonce.
    #[error("nonce mismatch for {account}: expected {expected}, got {claimed}")]
    Mismatch {
        account: Address,
        expected: u64,
        claimed: u64,
    },

    /// The account has used every nonce a `u64` can hold.
    #[error("nonce space exhausted for {0}")]
    Exhausted(Address),
}

/// Proof of a consumption, needed to undo it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a consumed nonce must be restored if the transfer fails"]
pub struct NonceReceipt {
    account: Address,
    previous: u64,
}

impl NonceReceipt {
    /// The nonce value that was consumed.
    pub fn consumed(&self) -> u64 {
        self.previous
    }
}

/// Current nonce per account. Accounts never seen before are at 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonceRegistry {
    nonces: HashMap<Address, u64>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nonce the next authorization from `account` must carry.
    pub fn current(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    /// Checks `claimed` against the current nonce and, on success, advances
    /// the counter by one.
    ///
    /// # Errors
    ///
    /// [`NonceError::Mismatch`] if `claimed != current(account)`;
    /// [`NonceError::Exhausted`] if the counter is already at `u64::MAX`.
    pub fn consume(&mut self, account: &Address, claimed: u64) -> Result<NonceReceipt, NonceError> {
        let expected = self.current(account);
        if claimed != expected {
            return Err(NonceError::Mismatch {
                account: *account,
                expected,
                claimed,
            });
        }
        let next = expected
            .checked_add(1)
            .ok_or(NonceError::Exhausted(*account))?;
        self.nonces.insert(*account, next);
        Ok(NonceReceipt {
            account: *account,
            previous: expected,
        })
    }

    /// Rolls a consumption back.
    pub fn restore(&mut self, receipt: NonceReceipt) {
        self.nonces.insert(receipt.account, receipt.previous);
    }
}
