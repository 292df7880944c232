//! # Prosynergy Settlement Contracts
//!
//! The ledger logic that sits on top of the protocol primitives:
//!
//! - **KYC Token**: the transfer orchestrator. Exempt transfers move freely;
//!   everything else needs a single-use signature from the KYC authorizer and
//!   pays a 0.3% + 0.125% fee split.
//! - **Genesis**: construction parameters, loadable from JSON.
//! - **Events**: the settlement record log.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow; wrapping arithmetic and
//!    money do not mix.
//! 2. A request settles completely or not at all. No half-applied splits,
//!    no burned nonces.
//! 3. Every public type is serializable (serde) for the node's API.

pub mod events;
pub mod genesis;
pub mod kyc_token;

pub use events::SettlementEvent;
pub use genesis::TokenGenesis;
pub use kyc_token::{
    KycToken, SettlementError, SettlementPath, SettlementReceipt, TransferRequest,
};
