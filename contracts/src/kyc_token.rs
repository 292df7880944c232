//! # KYC-Gated Settlement Token
//!
//! The transfer orchestrator. Every movement of value goes through
//! [`KycToken::transfer_by_partition`], which walks one request through
//!
//! ```text
//! Requested ──► operator check ──► exempt? ──yes──► full-value move, same partition
//!                                     │
//!                                     no
//!                                     ▼
//!                   decode payload ► verify signature ► consume nonce
//!                                     ▼
//!                   balance check ► fee split ► destination partition
//!                                     ▼
//!                   one atomic ledger update (1 debit, ≤3 credits)
//! ```
//!
//! A request either settles completely or is rejected with balances, nonces
//! and the event log exactly as they were. The one piece of state touched
//! before the ledger update, the sender's nonce, is restored on any later
//! failure.
//!
//! The token is single-writer: every mutating method takes `&mut self`.
//! Hosts that serve concurrent callers put it behind one lock.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use prosynergy_protocol::codec::{AuthorizationPayload, CodecError};
use prosynergy_protocol::crypto::{authorization_digest, verify};
use prosynergy_protocol::ledger::{
    destination_partition, BalanceError, BalanceStore, ChangePartitionFlag, ExemptionList,
    FeeError, FeeSchedule, FeeSplit, LedgerUpdate, NonceError, NonceRegistry, Partition,
    PartitionResolver, PartitionedBalances,
};
use prosynergy_protocol::types::{Address, Amount};

use crate::events::SettlementEvent;
use crate::genesis::TokenGenesis;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a settlement or administrative request is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// A non-exempt transfer arrived without an authorization payload.
    #[error("transfer requires a KYC authorization")]
    AuthorizationRequired,

    /// The payload could not be decoded or was not signed by the authorizer.
    #[error("invalid authorization: {0}")]
    InvalidAuthorization(String),

    /// The payload's nonce is not the sender's current nonce.
    ///
    /// Only raised for nonces that fit in 64 bits. A wider nonce word never
    /// reaches the registry: the codec rejects it first and it surfaces as
    /// [`SettlementError::InvalidAuthorization`].
    #[error("nonce replayed: expected {expected}, got {claimed}")]
    NonceReplayed { expected: u64, claimed: u64 },

    /// The source partition does not hold enough to cover the value.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// The caller is not the administrator.
    #[error("caller is not the administrator")]
    Unauthorized,

    /// A configuration value was rejected (usually a null address).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operator may not move the holder's balance.
    #[error("{operator} is not an operator for {holder}")]
    UnauthorizedOperator { operator: Address, holder: Address },

    /// Supply can only be issued once, into an empty ledger.
    #[error("issuance is closed")]
    IssuanceClosed,

    /// The balance store refused an update the orchestrator built. Indicates
    /// a bug, not bad input.
    #[error("ledger invariant violated: {0}")]
    LedgerInvariant(String),
}

impl SettlementError {
    /// Stable machine-readable code, used as a metrics label and in API
    /// error bodies.
    ///
    /// A nonce word above `u64::MAX` reports `invalid_authorization`, not
    /// `nonce_replayed`, since it fails payload decoding before any signature
    /// or nonce check runs.
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::AuthorizationRequired => "authorization_required",
            SettlementError::InvalidAuthorization(_) => "invalid_authorization",
            SettlementError::NonceReplayed { .. } => "nonce_replayed",
            SettlementError::InsufficientBalance { .. } => "insufficient_balance",
            SettlementError::ArithmeticOverflow => "arithmetic_overflow",
            SettlementError::Unauthorized => "unauthorized",
            SettlementError::InvalidConfiguration(_) => "invalid_configuration",
            SettlementError::UnauthorizedOperator { .. } => "unauthorized_operator",
            SettlementError::IssuanceClosed => "issuance_closed",
            SettlementError::LedgerInvariant(_) => "ledger_invariant",
        }
    }
}

impl From<BalanceError> for SettlementError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::InsufficientBalance {
                available,
                requested,
                ..
            } => SettlementError::InsufficientBalance {
                available,
                requested,
            },
            BalanceError::Overflow { .. } | BalanceError::ArithmeticOverflow => {
                SettlementError::ArithmeticOverflow
            }
            BalanceError::Unbalanced { .. } => SettlementError::LedgerInvariant(err.to_string()),
        }
    }
}

impl From<NonceError> for SettlementError {
    fn from(err: NonceError) -> Self {
        match err {
            NonceError::Mismatch {
                expected, claimed, ..
            } => SettlementError::NonceReplayed { expected, claimed },
            NonceError::Exhausted(_) => SettlementError::ArithmeticOverflow,
        }
    }
}

impl From<CodecError> for SettlementError {
    fn from(err: CodecError) -> Self {
        SettlementError::InvalidAuthorization(err.to_string())
    }
}

impl From<FeeError> for SettlementError {
    fn from(err: FeeError) -> Self {
        SettlementError::InvalidConfiguration(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Requests and receipts
// ---------------------------------------------------------------------------

/// One transfer as submitted by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_partition: Partition,
    pub operator: Address,
    pub from: Address,
    pub to: Address,
    pub value: Amount,
    /// Authorization payload for non-exempt transfers; partition-change
    /// instructions may also live here.
    #[serde(default, with = "prosynergy_protocol::types::hex_bytes")]
    pub data: Vec<u8>,
    #[serde(default, with = "prosynergy_protocol::types::hex_bytes")]
    pub operator_data: Vec<u8>,
}

impl TransferRequest {
    /// A holder moving their own balance, with no payload.
    pub fn new(from_partition: Partition, from: Address, to: Address, value: Amount) -> Self {
        Self {
            from_partition,
            operator: from,
            from,
            to,
            value,
            data: Vec::new(),
            operator_data: Vec::new(),
        }
    }

    pub fn with_operator(mut self, operator: Address) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Sets `data` to the ABI encoding of `payload`.
    pub fn with_authorization(self, payload: &AuthorizationPayload) -> Self {
        self.with_data(payload.encode())
    }

    pub fn with_operator_data(mut self, operator_data: Vec<u8>) -> Self {
        self.operator_data = operator_data;
        self
    }
}

/// Which branch of the state machine settled a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementPath {
    /// Exemption policy matched; no fee, no nonce.
    Exempt,
    /// Authorized with the given (now consumed) nonce.
    Authorized { nonce: u64 },
}

/// Proof of a completed settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub receipt_id: Uuid,
    pub path: SettlementPath,
    pub from_partition: Partition,
    /// Partition the credit legs landed in.
    pub to_partition: Partition,
    pub split: FeeSplit,
    pub settled_at: DateTime<Utc>,
}

impl SettlementReceipt {
    fn new(path: SettlementPath, from_partition: Partition, to_partition: Partition, split: FeeSplit) -> Self {
        Self {
            receipt_id: Uuid::new_v4(),
            path,
            from_partition,
            to_partition,
            split,
            settled_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A partitioned token whose transfers require a KYC authorization unless
/// exempt, with authorized transfers paying a two-way fee split.
#[derive(Debug)]
pub struct KycToken<S: BalanceStore = PartitionedBalances> {
    name: String,
    symbol: String,
    chain_id: u64,
    administrator: Address,
    fee_collector: Address,
    prosynergy_collector: Address,
    authorizer: Address,
    fees: FeeSchedule,
    exemptions: ExemptionList,
    nonces: NonceRegistry,
    /// `holder -> approved operators`. A holder is implicitly its own
    /// operator and never appears in its own set.
    operators: HashMap<Address, BTreeSet<Address>>,
    store: S,
    resolver: Box<dyn PartitionResolver>,
    events: Vec<SettlementEvent>,
    issuable: bool,
}

impl KycToken<PartitionedBalances> {
    /// Builds a token over a fresh in-memory ledger and issues the initial
    /// supply to the administrator.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidConfiguration`] for null addresses.
    pub fn new(genesis: TokenGenesis) -> Result<Self, SettlementError> {
        Self::with_store(genesis, PartitionedBalances::new())
    }
}

impl<S: BalanceStore> KycToken<S> {
    /// Builds a token over an existing balance store.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidConfiguration`] for null addresses
    /// and [`SettlementError::IssuanceClosed`] if the store already carries
    /// supply and the genesis asks for more.
    pub fn with_store(genesis: TokenGenesis, store: S) -> Result<Self, SettlementError> {
        genesis.validate()?;

        let mut exemptions = ExemptionList::new();
        if let Some(account) = genesis.exempted {
            exemptions.set(account, true);
        }

        let mut token = Self {
            name: genesis.name,
            symbol: genesis.symbol,
            chain_id: genesis.chain_id,
            administrator: genesis.administrator,
            fee_collector: genesis.fee_collector,
            prosynergy_collector: genesis.prosynergy_collector,
            authorizer: genesis.authorizer,
            fees: FeeSchedule::STANDARD,
            exemptions,
            nonces: NonceRegistry::new(),
            operators: HashMap::new(),
            store,
            resolver: Box::new(ChangePartitionFlag),
            events: Vec::new(),
            issuable: true,
        };

        if genesis.initial_supply > 0 {
            let administrator = token.administrator;
            token.issue(&administrator, &genesis.initial_partition, genesis.initial_supply)?;
        }
        token.issuable = false;

        info!(
            name = %token.name,
            symbol = %token.symbol,
            chain_id = token.chain_id,
            administrator = %token.administrator,
            supply = %token.store.total_supply(),
            "token initialized"
        );
        Ok(token)
    }

    /// Replaces the destination-partition resolver.
    pub fn with_partition_resolver(mut self, resolver: Box<dyn PartitionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the fee schedule.
    pub fn with_fee_schedule(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    fn issue(
        &mut self,
        holder: &Address,
        partition: &Partition,
        amount: Amount,
    ) -> Result<(), SettlementError> {
        if !self.issuable || self.store.total_supply() != 0 {
            return Err(SettlementError::IssuanceClosed);
        }
        self.store.issue(holder, partition, amount)?;
        self.events.push(SettlementEvent::Issued {
            operator: *holder,
            to: *holder,
            partition: *partition,
            value: amount,
        });
        Ok(())
    }

    // -- Settlement ---------------------------------------------------------

    /// Settles one transfer.
    ///
    /// # Errors
    ///
    /// Any [`SettlementError`]; on error nothing about the token changed.
    pub fn transfer_by_partition(
        &mut self,
        request: &TransferRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        if !self.is_operator_for(&request.operator, &request.from) {
            warn!(operator = %request.operator, holder = %request.from, "operator not approved");
            return Err(SettlementError::UnauthorizedOperator {
                operator: request.operator,
                holder: request.from,
            });
        }

        let result = if self
            .exemptions
            .is_exempt(&request.from, &request.to, &self.administrator)
        {
            self.settle_exempt(request)
        } else {
            self.settle_authorized(request)
        };

        match &result {
            Ok(receipt) => info!(
                from = %request.from,
                to = %request.to,
                value = %request.value,
                path = ?receipt.path,
                to_partition = %receipt.to_partition,
                "transfer settled"
            ),
            Err(err) => warn!(
                from = %request.from,
                to = %request.to,
                value = %request.value,
                reason = err.code(),
                "transfer rejected: {err}"
            ),
        }
        result
    }

    fn settle_exempt(
        &mut self,
        request: &TransferRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let partition = request.from_partition;
        self.ensure_covered(request)?;

        let update = LedgerUpdate::new()
            .debit(request.from, partition, request.value)
            .credit(request.to, partition, request.value);
        self.store.apply(&update)?;

        let record = self.transfer_record(request, request.to, request.value);
        self.events.push(record);
        debug!(from = %request.from, to = %request.to, "exempt transfer, no fee");

        Ok(SettlementReceipt::new(
            SettlementPath::Exempt,
            partition,
            partition,
            FeeSplit::passthrough(request.value),
        ))
    }

    fn settle_authorized(
        &mut self,
        request: &TransferRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        if request.data.is_empty() {
            return Err(SettlementError::AuthorizationRequired);
        }
        let payload = AuthorizationPayload::decode(&request.data)?;

        let digest = authorization_digest(
            &request.from,
            &request.to,
            request.value,
            self.chain_id,
            payload.nonce,
        );
        if !verify(&digest, &payload.signature, &self.authorizer) {
            return Err(SettlementError::InvalidAuthorization(
                "signature does not recover to the authorizer".into(),
            ));
        }

        let receipt = self.nonces.consume(&request.from, payload.nonce)?;
        debug!(from = %request.from, nonce = receipt.consumed(), "authorization accepted");

        match self.settle_split(request, receipt.consumed()) {
            Ok(settled) => Ok(settled),
            Err(err) => {
                self.nonces.restore(receipt);
                Err(err)
            }
        }
    }

    fn settle_split(
        &mut self,
        request: &TransferRequest,
        nonce: u64,
    ) -> Result<SettlementReceipt, SettlementError> {
        self.ensure_covered(request)?;

        let split = self.fees.split(request.value);
        let from_partition = request.from_partition;
        let to_partition = destination_partition(
            self.resolver.as_ref(),
            &from_partition,
            &request.data,
            &request.operator_data,
        );

        let mut update = LedgerUpdate::new()
            .debit(request.from, from_partition, request.value)
            .credit(request.to, to_partition, split.net);
        if split.fee > 0 {
            update = update.credit(self.fee_collector, to_partition, split.fee);
        }
        if split.prosynergy_fee > 0 {
            update = update.credit(self.prosynergy_collector, to_partition, split.prosynergy_fee);
        }
        self.store.apply(&update)?;

        let mut records = vec![self.transfer_record(request, request.to, split.net)];
        if to_partition != from_partition {
            records.push(SettlementEvent::ChangedPartition {
                from_partition,
                to_partition,
                value: request.value,
            });
        }
        if split.fee > 0 {
            records.push(self.transfer_record(request, self.fee_collector, split.fee));
        }
        if split.prosynergy_fee > 0 {
            records.push(self.transfer_record(
                request,
                self.prosynergy_collector,
                split.prosynergy_fee,
            ));
        }
        self.events.extend(records);

        Ok(SettlementReceipt::new(
            SettlementPath::Authorized { nonce },
            from_partition,
            to_partition,
            split,
        ))
    }

    fn ensure_covered(&self, request: &TransferRequest) -> Result<(), SettlementError> {
        let available = self
            .store
            .balance_of(&request.from, &request.from_partition);
        if available < request.value {
            return Err(SettlementError::InsufficientBalance {
                available,
                requested: request.value,
            });
        }
        Ok(())
    }

    fn transfer_record(&self, request: &TransferRequest, to: Address, value: Amount) -> SettlementEvent {
        SettlementEvent::TransferByPartition {
            from_partition: request.from_partition,
            operator: request.operator,
            from: request.from,
            to,
            value,
            data: request.data.clone(),
            operator_data: request.operator_data.clone(),
        }
    }

    // -- Administration -----------------------------------------------------

    fn ensure_administrator(&self, caller: &Address) -> Result<(), SettlementError> {
        if *caller != self.administrator {
            warn!(caller = %caller, "admin operation refused");
            return Err(SettlementError::Unauthorized);
        }
        Ok(())
    }

    fn ensure_not_null(address: &Address, role: &str) -> Result<(), SettlementError> {
        if address.is_zero() {
            return Err(SettlementError::InvalidConfiguration(format!(
                "{role} must not be the null address"
            )));
        }
        Ok(())
    }

    /// Hands every admin right to `new_administrator`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `caller` is the administrator;
    /// `InvalidConfiguration` for the null address.
    pub fn transfer_administrator(
        &mut self,
        caller: &Address,
        new_administrator: Address,
    ) -> Result<(), SettlementError> {
        self.ensure_administrator(caller)?;
        Self::ensure_not_null(&new_administrator, "administrator")?;

        let previous = std::mem::replace(&mut self.administrator, new_administrator);
        self.events.push(SettlementEvent::AdministratorTransferred {
            previous,
            new: new_administrator,
        });
        info!(%previous, new = %new_administrator, "administrator transferred");
        Ok(())
    }

    /// Replaces both fee collectors.
    ///
    /// # Errors
    ///
    /// `Unauthorized` or `InvalidConfiguration` as for
    /// [`transfer_administrator`](Self::transfer_administrator).
    pub fn set_fee_collectors(
        &mut self,
        caller: &Address,
        fee_collector: Address,
        prosynergy_collector: Address,
    ) -> Result<(), SettlementError> {
        self.ensure_administrator(caller)?;
        Self::ensure_not_null(&fee_collector, "fee collector")?;
        Self::ensure_not_null(&prosynergy_collector, "prosynergy collector")?;

        self.fee_collector = fee_collector;
        self.prosynergy_collector = prosynergy_collector;
        self.events.push(SettlementEvent::FeeCollectorsUpdated {
            fee_collector,
            prosynergy_collector,
        });
        info!(%fee_collector, %prosynergy_collector, "fee collectors updated");
        Ok(())
    }

    /// Rotates the authorizer key. Authorizations signed by the previous key
    /// stop verifying immediately.
    ///
    /// # Errors
    ///
    /// `Unauthorized` or `InvalidConfiguration`.
    pub fn set_authorizer(
        &mut self,
        caller: &Address,
        authorizer: Address,
    ) -> Result<(), SettlementError> {
        self.ensure_administrator(caller)?;
        Self::ensure_not_null(&authorizer, "authorizer")?;

        let previous = std::mem::replace(&mut self.authorizer, authorizer);
        self.events.push(SettlementEvent::AuthorizerUpdated {
            previous,
            new: authorizer,
        });
        info!(%previous, new = %authorizer, "authorizer updated");
        Ok(())
    }

    /// Flags or unflags `account` as exempt.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `caller` is the administrator.
    pub fn set_exempt(
        &mut self,
        caller: &Address,
        account: Address,
        exempt: bool,
    ) -> Result<(), SettlementError> {
        self.ensure_administrator(caller)?;

        let changed = self.exemptions.set(account, exempt);
        self.events
            .push(SettlementEvent::ExemptionUpdated { account, exempt });
        info!(%account, exempt, changed, "exemption updated");
        Ok(())
    }

    // -- Operators ----------------------------------------------------------

    /// Lets `operator` move `holder`'s balance.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for the null operator.
    pub fn authorize_operator(
        &mut self,
        holder: &Address,
        operator: Address,
    ) -> Result<(), SettlementError> {
        Self::ensure_not_null(&operator, "operator")?;
        if operator == *holder {
            return Ok(());
        }
        if self.operators.entry(*holder).or_default().insert(operator) {
            self.events.push(SettlementEvent::OperatorAuthorized {
                operator,
                holder: *holder,
            });
            debug!(%operator, %holder, "operator authorized");
        }
        Ok(())
    }

    /// Withdraws a previous [`authorize_operator`](Self::authorize_operator).
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when a holder tries to revoke itself.
    pub fn revoke_operator(
        &mut self,
        holder: &Address,
        operator: &Address,
    ) -> Result<(), SettlementError> {
        if operator == holder {
            return Err(SettlementError::InvalidConfiguration(
                "a holder is always its own operator".into(),
            ));
        }
        let removed = match self.operators.get_mut(holder) {
            Some(set) => {
                let removed = set.remove(operator);
                if set.is_empty() {
                    self.operators.remove(holder);
                }
                removed
            }
            None => false,
        };
        if removed {
            self.events.push(SettlementEvent::OperatorRevoked {
                operator: *operator,
                holder: *holder,
            });
            debug!(%operator, %holder, "operator revoked");
        }
        Ok(())
    }

    pub fn is_operator_for(&self, operator: &Address, holder: &Address) -> bool {
        operator == holder
            || self
                .operators
                .get(holder)
                .is_some_and(|set| set.contains(operator))
    }

    // -- Queries ------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn administrator(&self) -> Address {
        self.administrator
    }

    /// `(fee_collector, prosynergy_collector)`.
    pub fn fee_collectors(&self) -> (Address, Address) {
        (self.fee_collector, self.prosynergy_collector)
    }

    pub fn authorizer(&self) -> Address {
        self.authorizer
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        self.fees
    }

    pub fn balance_of_by_partition(&self, holder: &Address, partition: &Partition) -> Amount {
        self.store.balance_of(holder, partition)
    }

    /// Sum across every partition `holder` has a balance in.
    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.store
            .partitions_of(holder)
            .iter()
            .fold(0u128, |acc, p| acc.saturating_add(self.store.balance_of(holder, p)))
    }

    pub fn partitions_of(&self, holder: &Address) -> Vec<Partition> {
        self.store.partitions_of(holder)
    }

    pub fn total_supply(&self) -> Amount {
        self.store.total_supply()
    }

    /// The nonce the next authorization for `account` must carry.
    pub fn nonce_of(&self, account: &Address) -> u64 {
        self.nonces.current(account)
    }

    /// Whether a transfer from `from` to `to` would skip authorization.
    pub fn is_exempt(&self, from: &Address, to: &Address) -> bool {
        self.exemptions.is_exempt(from, to, &self.administrator)
    }

    /// Whether `account` itself carries the exempt flag.
    pub fn is_flagged(&self, account: &Address) -> bool {
        self.exemptions.is_flagged(account)
    }

    /// Accounts explicitly flagged exempt.
    pub fn exempted_accounts(&self) -> Vec<Address> {
        self.exemptions.flagged().copied().collect()
    }

    pub fn events(&self) -> &[SettlementEvent] {
        &self.events
    }

    pub fn is_issuable(&self) -> bool {
        self.issuable
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
