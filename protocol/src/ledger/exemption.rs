//! # Exemption Policy
//!
//! Decides whether a `(from, to)` pair bypasses the authorization gate and
//! fee deduction. The rule is a plain OR of five conditions and has no
//! failure modes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Address;

/// The set of accounts flagged exempt by the administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExemptionList {
    exempt: BTreeSet<Address>,
}

impl ExemptionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears the exempt flag. Returns `true` if the flag changed.
    pub fn set(&mut self, account: Address, exempt: bool) -> bool {
        if exempt {
            self.exempt.insert(account)
        } else {
            self.exempt.remove(&account)
        }
    }

    /// Whether `account` itself carries the exempt flag.
    pub fn is_flagged(&self, account: &Address) -> bool {
        self.exempt.contains(account)
    }

    /// All flagged accounts in address order.
    pub fn flagged(&self) -> impl Iterator<Item = &Address> {
        self.exempt.iter()
    }

    /// True iff the transfer skips authorization and fees: self-transfers,
    /// anything touching the administrator, and anything touching a flagged
    /// account.
    pub fn is_exempt(&self, from: &Address, to: &Address, administrator: &Address) -> bool {
        from == to
            || from == administrator
            || to == administrator
            || self.is_flagged(from)
            || self.is_flagged(to)
    }
}
