//! # Ledger Primitives
//!
//! The building blocks the transfer orchestrator composes:
//!
//! ```text
//! partition.rs    Partition tags and destination-partition resolution
//! balance.rs      Partitioned balances with all-or-nothing updates
//! nonce.rs        Per-account authorization nonces with rollback
//! exemption.rs    Which (from, to) pairs skip the authorization gate
//! fees.rs         The 0.3% + 0.125% fee split
//! ```
//!
//! All amounts are `u128` in the smallest unit. Nothing in here divides
//! except the fee calculator, and that one floors on purpose.

pub mod balance;
pub mod exemption;
pub mod fees;
pub mod nonce;
pub mod partition;

pub use balance::{BalanceError, BalanceStore, LedgerUpdate, PartitionedBalances, Posting, PostingKind};
pub use exemption::ExemptionList;
pub use fees::{FeeError, FeeSchedule, FeeSplit};
pub use nonce::{NonceError, NonceReceipt, NonceRegistry};
pub use partition::{
    change_partition_data, destination_partition, ChangePartitionFlag, Partition, PartitionError,
    PartitionResolver,
};
