//! # Settlement Records
//!
//! Every observable state change appends one record to the ledger's event
//! log. Records are only appended once the balance update they describe has
//! been committed, so a rejected request never leaves a trace here.
//!
//! A fee-split transfer produces up to three `TransferByPartition` records
//! (recipient, fee collector, prosynergy collector), each carrying the same
//! authorization payload and operator data for audit, plus a
//! `ChangedPartition` record when the credit legs land in a different
//! partition.

use serde::{Deserialize, Serialize};

use prosynergy_protocol::ledger::Partition;
use prosynergy_protocol::types::{Address, Amount};

/// One entry of the settlement event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementEvent {
    /// Value moved out of `from_partition` to `to`.
    TransferByPartition {
        from_partition: Partition,
        operator: Address,
        from: Address,
        to: Address,
        value: Amount,
        #[serde(with = "prosynergy_protocol::types::hex_bytes")]
        data: Vec<u8>,
        #[serde(with = "prosynergy_protocol::types::hex_bytes")]
        operator_data: Vec<u8>,
    },

    /// The credit legs of a transfer landed in a different partition.
    ChangedPartition {
        from_partition: Partition,
        to_partition: Partition,
        value: Amount,
    },

    /// The one-time genesis issuance.
    Issued {
        operator: Address,
        to: Address,
        partition: Partition,
        value: Amount,
    },

    AdministratorTransferred {
        previous: Address,
        new: Address,
    },

    FeeCollectorsUpdated {
        fee_collector: Address,
        prosynergy_collector: Address,
    },

    AuthorizerUpdated {
        previous: Address,
        new: Address,
    },

    ExemptionUpdated {
        account: Address,
        exempt: bool,
    },

    OperatorAuthorized {
        operator: Address,
        holder: Address,
    },

    OperatorRevoked {
        operator: Address,
        holder: Address,
    },
}

impl SettlementEvent {
    /// Short machine-readable name, used for logging and API filtering.
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementEvent::TransferByPartition { .. } => "transfer_by_partition",
            SettlementEvent::ChangedPartition { .. } => "changed_partition",
            SettlementEvent::Issued { .. } => "issued",
            SettlementEvent::AdministratorTransferred { .. } => "administrator_transferred",
            SettlementEvent::FeeCollectorsUpdated { .. } => "fee_collectors_updated",
            SettlementEvent::AuthorizerUpdated { .. } => "authorizer_updated",
            SettlementEvent::ExemptionUpdated { .. } => "exemption_updated",
            SettlementEvent::OperatorAuthorized { .. } => "operator_authorized",
            SettlementEvent::OperatorRevoked { .. } => "operator_revoked",
        }
    }
}
