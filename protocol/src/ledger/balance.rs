//! # Partitioned Balance Store
//!
//! Balances keyed by `(holder, partition)`, plus total supply. Every mutation
//! other than issuance goes through [`BalanceStore::apply`], which takes a
//! whole [`LedgerUpdate`] (one debit and up to three credits for a fee-split
//! transfer) and applies it all-or-nothing:
//!
//! 1. The update must be balanced: total debited == total credited.
//! 2. Every posting is replayed against a scratch copy of the touched entries
//!    with checked arithmetic.
//! 3. Only if every posting succeeds is the scratch copy written back.
//!
//! A failed update therefore leaves the store byte-for-byte unchanged, and
//! the sum of all entries always equals total supply.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::partition::Partition;
use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during balance operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    /// A debit exceeds the balance held in that partition.
    #[error(
        "insufficient balance: {holder} holds {available} in {partition}, requested {requested}"
    )]
    InsufficientBalance {
        holder: Address,
        partition: Partition,
        available: Amount,
        requested: Amount,
    },

    /// A credit would push a single entry past `u128::MAX`.
    #[error("balance overflow: {holder} holds {current} in {partition}, credit {credit}")]
    Overflow {
        holder: Address,
        partition: Partition,
        current: Amount,
        credit: Amount,
    },

    /// Debits and credits of an update do not cancel out.
    #[error("unbalanced update: debited {debited}, credited {credited}")]
    Unbalanced { debited: Amount, credited: Amount },

    /// Summing the postings of an update, or issuing supply, overflowed.
    #[error("arithmetic overflow while totalling amounts")]
    ArithmeticOverflow,
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// Direction of a single posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingKind {
    Debit,
    Credit,
}

/// One line of a ledger update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub kind: PostingKind,
    pub holder: Address,
    pub partition: Partition,
    pub amount: Amount,
}

/// An ordered batch of postings applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerUpdate {
    postings: Vec<Posting>,
}

impl LedgerUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a debit.
    pub fn debit(mut self, holder: Address, partition: Partition, amount: Amount) -> Self {
        self.postings.push(Posting {
            kind: PostingKind::Debit,
            holder,
            partition,
            amount,
        });
        self
    }

    /// Appends a credit.
    pub fn credit(mut self, holder: Address, partition: Partition, amount: Amount) -> Self {
        self.postings.push(Posting {
            kind: PostingKind::Credit,
            holder,
            partition,
            amount,
        });
        self
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Sums debits and credits separately.
    ///
    /// # Errors
    ///
    /// [`BalanceError::ArithmeticOverflow`] if either sum overflows.
    pub fn totals(&self) -> Result<(Amount, Amount), BalanceError> {
        let mut debited: Amount = 0;
        let mut credited: Amount = 0;
        for posting in &self.postings {
            let slot = match posting.kind {
                PostingKind::Debit => &mut debited,
                PostingKind::Credit => &mut credited,
            };
            *slot = slot
                .checked_add(posting.amount)
                .ok_or(BalanceError::ArithmeticOverflow)?;
        }
        Ok((debited, credited))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// The capability the transfer orchestrator needs from the ledger.
pub trait BalanceStore {
    /// Balance of `holder` in `partition`; zero for unknown entries.
    fn balance_of(&self, holder: &Address, partition: &Partition) -> Amount;

    /// Partitions in which `holder` has a non-zero balance, in ascending tag
    /// order.
    fn partitions_of(&self, holder: &Address) -> Vec<Partition>;

    /// Sum of every balance entry.
    fn total_supply(&self) -> Amount;

    /// Applies a balanced update all-or-nothing.
    fn apply(&mut self, update: &LedgerUpdate) -> Result<(), BalanceError>;

    /// Creates new supply in `holder`'s `partition`.
    fn issue(&mut self, holder: &Address, partition: &Partition, amount: Amount)
        -> Result<(), BalanceError>;
}

/// In-memory partitioned balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionedBalances {
    /// `holder -> (partition -> amount)`. Zero entries are pruned.
    accounts: HashMap<Address, BTreeMap<Partition, Amount>>,
    total_supply: Amount,
}

impl PartitionedBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of `holder`'s balances across all partitions.
    pub fn balance_of_all(&self, holder: &Address) -> Amount {
        self.accounts
            .get(holder)
            .map(|parts| parts.values().fold(0u128, |acc, v| acc.saturating_add(*v)))
            .unwrap_or(0)
    }

    /// Number of holders with at least one non-zero entry.
    pub fn holder_count(&self) -> usize {
        self.accounts.len()
    }

    fn write(&mut self, holder: Address, partition: Partition, amount: Amount) {
        if amount == 0 {
            if let Some(parts) = self.accounts.get_mut(&holder) {
                parts.remove(&partition);
                if parts.is_empty() {
                    self.accounts.remove(&holder);
                }
            }
        } else {
            self.accounts
                .entry(holder)
                .or_default()
                .insert(partition, amount);
        }
    }
}

impl BalanceStore for PartitionedBalances {
    fn balance_of(&self, holder: &Address, partition: &Partition) -> Amount {
        self.accounts
            .get(holder)
            .and_then(|parts| parts.get(partition))
            .copied()
            .unwrap_or(0)
    }

    fn partitions_of(&self, holder: &Address) -> Vec<Partition> {
        self.accounts
            .get(holder)
            .map(|parts| parts.keys().copied().collect())
            .unwrap_or_default()
    }

    fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn apply(&mut self, update: &LedgerUpdate) -> Result<(), BalanceError> {
        let (debited, credited) = update.totals()?;
        if debited != credited {
            return Err(BalanceError::Unbalanced { debited, credited });
        }

        let mut scratch: HashMap<(Address, Partition), Amount> = HashMap::new();
        for posting in update.postings() {
            let key = (posting.holder, posting.partition);
            let current = match scratch.get(&key) {
                Some(v) => *v,
                None => self.balance_of(&posting.holder, &posting.partition),
            };
            let next = match posting.kind {
                PostingKind::Debit => current.checked_sub(posting.amount).ok_or(
                    BalanceError::InsufficientBalance {
                        holder: posting.holder,
                        partition: posting.partition,
                        available: current,
                        requested: posting.amount,
                    },
                )?,
                PostingKind::Credit => {
                    current
                        .checked_add(posting.amount)
                        .ok_or(BalanceError::Overflow {
                            holder: posting.holder,
                            partition: posting.partition,
                            current,
                            credit: posting.amount,
                        })?
                }
            };
            scratch.insert(key, next);
        }

        for ((holder, partition), amount) in scratch {
            self.write(holder, partition, amount);
        }
        tracing::trace!(postings = update.postings().len(), %debited, "ledger update applied");
        Ok(())
    }

    fn issue(
        &mut self,
        holder: &Address,
        partition: &Partition,
        amount: Amount,
    ) -> Result<(), BalanceError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(BalanceError::ArithmeticOverflow)?;
        let current = self.balance_of(holder, partition);
        let next = current.checked_add(amount).ok_or(BalanceError::Overflow {
            holder: *holder,
            partition: *partition,
            current,
            credit: amount,
        })?;

        self.write(*holder, *partition, next);
        self.total_supply = supply;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn part(label: &str) -> Partition {
        Partition::from_label(label).unwrap()
    }

    fn seeded() -> PartitionedBalances {
        let mut store = PartitionedBalances::new();
        store.issue(&addr(1), &part("main"), 1_000).unwrap();
        store
    }

    fn sum_of_entries(store: &PartitionedBalances) -> Amount {
        store
            .accounts
            .values()
            .flat_map(|parts| parts.values())
            .sum()
    }

    #[test]
    fn issue_credits_holder_and_supply() {
        let store = seeded();
        assert_eq!(store.balance_of(&addr(1), &part("main")), 1_000);
        assert_eq!(store.total_supply(), 1_000);
        assert_eq!(store.partitions_of(&addr(1)), vec![part("main")]);
    }

    #[test]
    fn split_update_moves_value() {
        let mut store = seeded();
        let update = LedgerUpdate::new()
            .debit(addr(1), part("main"), 1_000)
            .credit(addr(2), part("main"), 990)
            .credit(addr(3), part("main"), 7)
            .credit(addr(4), part("main"), 3);
        store.apply(&update).unwrap();

        assert_eq!(store.balance_of(&addr(1), &part("main")), 0);
        assert_eq!(store.balance_of(&addr(2), &part("main")), 990);
        assert_eq!(store.balance_of(&addr(3), &part("main")), 7);
        assert_eq!(store.balance_of(&addr(4), &part("main")), 3);
        assert_eq!(sum_of_entries(&store), store.total_supply());
        assert!(store.partitions_of(&addr(1)).is_empty());
    }

    #[test]
    fn insufficient_balance_leaves_store_untouched() {
        let mut store = seeded();
        let update = LedgerUpdate::new()
            .debit(addr(1), part("main"), 1_001)
            .credit(addr(2), part("main"), 1_001);

        let err = store.apply(&update).unwrap_err();
        assert_eq!(
            err,
            BalanceError::InsufficientBalance {
                holder: addr(1),
                partition: part("main"),
                available: 1_000,
                requested: 1_001,
            }
        );
        assert_eq!(store.balance_of(&addr(1), &part("main")), 1_000);
        assert_eq!(store.balance_of(&addr(2), &part("main")), 0);
    }

    #[test]
    fn late_failure_rolls_back_earlier_postings() {
        let mut store = seeded();
        store.write(addr(9), part("main"), u128::MAX);

        // The debit and first credit succeed in scratch, the last one overflows.
        let update = LedgerUpdate::new()
            .debit(addr(1), part("main"), 10)
            .credit(addr(2), part("main"), 5)
            .credit(addr(9), part("main"), 5);

        assert!(matches!(store.apply(&update), Err(BalanceError::Overflow { .. })));
        assert_eq!(store.balance_of(&addr(1), &part("main")), 1_000);
        assert_eq!(store.balance_of(&addr(2), &part("main")), 0);
        assert_eq!(store.balance_of(&addr(9), &part("main")), u128::MAX);
    }

    #[test]
    fn unbalanced_update_rejected() {
        let mut store = seeded();
        let update = LedgerUpdate::new()
            .debit(addr(1), part("main"), 10)
            .credit(addr(2), part("main"), 9);
        assert_eq!(
            store.apply(&update),
            Err(BalanceError::Unbalanced {
                debited: 10,
                credited: 9
            })
        );
    }

    #[test]
    fn cross_partition_credit_tracks_partitions() {
        let mut store = seeded();
        let update = LedgerUpdate::new()
            .debit(addr(1), part("main"), 400)
            .credit(addr(2), part("locked"), 400);
        store.apply(&update).unwrap();

        assert_eq!(store.partitions_of(&addr(2)), vec![part("locked")]);
        assert_eq!(store.balance_of(&addr(2), &part("main")), 0);
        assert_eq!(store.balance_of_all(&addr(1)), 600);
        assert_eq!(sum_of_entries(&store), 1_000);
    }

    #[test]
    fn partitions_are_listed_in_tag_order() {
        let mut store = seeded();
        let update = LedgerUpdate::new()
            .debit(addr(1), part("main"), 300)
            .credit(addr(1), part("zeta"), 100)
            .credit(addr(1), part("locked"), 200);
        store.apply(&update).unwrap();

        // Credited after "main", listed around it by tag.
        assert_eq!(
            store.partitions_of(&addr(1)),
            vec![part("locked"), part("main"), part("zeta")]
        );
    }

    #[test]
    fn repeated_postings_on_one_entry_accumulate() {
        let mut store = seeded();
        let update = LedgerUpdate::new()
            .debit(addr(1), part("main"), 600)
            .debit(addr(1), part("main"), 600)
            .credit(addr(2), part("main"), 1_200);
        assert!(matches!(
            store.apply(&update),
            Err(BalanceError::InsufficientBalance { available: 400, .. })
        ));
        assert_eq!(store.balance_of(&addr(1), &part("main")), 1_000);
    }

    #[test]
    fn supply_overflow_on_issue() {
        let mut store = seeded();
        assert_eq!(
            store.issue(&addr(2), &part("main"), u128::MAX),
            Err(BalanceError::ArithmeticOverflow)
        );
        assert_eq!(store.total_supply(), 1_000);
    }
}
