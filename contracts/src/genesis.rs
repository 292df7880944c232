//! # Token Genesis
//!
//! Everything a [`KycToken`](crate::kyc_token::KycToken) needs at
//! construction time. Nodes load it from a JSON file; tests build it in code.
//!
//! ```json
//! {
//!   "name": "Prosynergy",
//!   "symbol": "PRO",
//!   "chain_id": 31337,
//!   "administrator": "0x…",
//!   "exempted": "0x…",
//!   "fee_collector": "0x…",
//!   "prosynergy_collector": "0x…",
//!   "authorizer": "0x…",
//!   "initial_supply": 1000000000,
//!   "initial_partition": "issued"
//! }
//! ```

use serde::{Deserialize, Serialize};

use prosynergy_protocol::config::{CHAIN_ID_DEVNET, DEFAULT_PARTITION_LABEL};
use prosynergy_protocol::ledger::Partition;
use prosynergy_protocol::types::{Address, Amount};

use crate::kyc_token::SettlementError;

fn default_chain_id() -> u64 {
    CHAIN_ID_DEVNET
}

fn default_partition() -> Partition {
    Partition::from_label(DEFAULT_PARTITION_LABEL).unwrap_or_default()
}

/// Construction parameters of one token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGenesis {
    pub name: String,
    pub symbol: String,
    /// Chain id bound into every authorization digest.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Receives the initial supply and holds every admin right.
    pub administrator: Address,
    /// Account flagged exempt at construction, if any.
    #[serde(default)]
    pub exempted: Option<Address>,
    /// Receives the 0.3% leg.
    pub fee_collector: Address,
    /// Receives the 0.125% leg.
    pub prosynergy_collector: Address,
    /// The only key whose signatures authorize non-exempt transfers.
    pub authorizer: Address,
    pub initial_supply: Amount,
    #[serde(default = "default_partition")]
    pub initial_partition: Partition,
}

impl TokenGenesis {
    /// A devnet genesis with no exempted account and the default partition.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        administrator: Address,
        fee_collector: Address,
        prosynergy_collector: Address,
        authorizer: Address,
        initial_supply: Amount,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            chain_id: default_chain_id(),
            administrator,
            exempted: None,
            fee_collector,
            prosynergy_collector,
            authorizer,
            initial_supply,
            initial_partition: default_partition(),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_exempted(mut self, account: Address) -> Self {
        self.exempted = Some(account);
        self
    }

    pub fn with_initial_partition(mut self, partition: Partition) -> Self {
        self.initial_partition = partition;
        self
    }

    /// Rejects null addresses in any privileged role.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidConfiguration`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), SettlementError> {
        let roles = [
            ("administrator", &self.administrator),
            ("fee_collector", &self.fee_collector),
            ("prosynergy_collector", &self.prosynergy_collector),
            ("authorizer", &self.authorizer),
        ];
        for (field, address) in roles {
            if address.is_zero() {
                return Err(SettlementError::InvalidConfiguration(format!(
                    "{field} must not be the null address"
                )));
            }
        }
        if matches!(self.exempted, Some(account) if account.is_zero()) {
            return Err(SettlementError::InvalidConfiguration(
                "exempted account must not be the null address".into(),
            ));
        }
        Ok(())
    }
}
