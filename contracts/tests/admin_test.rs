//! Integration tests for administration, operators, genesis, and
//! concurrent hosting of a token behind a lock.

use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;
use prosynergy_contracts::{
    KycToken, SettlementError, SettlementEvent, SettlementPath, TokenGenesis, TransferRequest,
};
use prosynergy_protocol::crypto::AuthorizerKeypair;
use prosynergy_protocol::ledger::Partition;
use prosynergy_protocol::types::{Address, Amount};

const ADMIN: Address = Address::new([0xa0; 20]);
const FEE_COLLECTOR: Address = Address::new([0xfe; 20]);
const PROSYNERGY_COLLECTOR: Address = Address::new([0xfd; 20]);
const ALICE: Address = Address::new([0x01; 20]);
const BOB: Address = Address::new([0x02; 20]);
const MALLORY: Address = Address::new([0x66; 20]);

fn issued() -> Partition {
    Partition::from_label("issued").unwrap()
}

fn authorizer() -> AuthorizerKeypair {
    AuthorizerKeypair::from_bytes(&[0x42; 32]).unwrap()
}

fn genesis() -> TokenGenesis {
    TokenGenesis::new(
        "Prosynergy",
        "PRO",
        ADMIN,
        FEE_COLLECTOR,
        PROSYNERGY_COLLECTOR,
        authorizer().address(),
        1_000_000_000,
    )
}

fn token() -> KycToken {
    KycToken::new(genesis()).unwrap()
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

#[test]
fn genesis_rejects_null_roles() {
    let mut g = genesis();
    g.authorizer = Address::ZERO;
    assert!(matches!(
        KycToken::new(g),
        Err(SettlementError::InvalidConfiguration(_))
    ));

    let mut g = genesis();
    g.administrator = Address::ZERO;
    assert!(matches!(
        KycToken::new(g),
        Err(SettlementError::InvalidConfiguration(_))
    ));
}

#[test]
fn genesis_exempted_account_skips_authorization() {
    let t = KycToken::new(genesis().with_exempted(ALICE)).unwrap();
    assert!(t.is_exempt(&ALICE, &BOB));
    assert!(t.is_exempt(&BOB, &ALICE));
    assert!(!t.is_exempt(&BOB, &MALLORY));
    assert_eq!(t.exempted_accounts(), vec![ALICE]);
}

#[test]
fn genesis_uses_requested_partition_and_chain() {
    let reserve = Partition::from_label("reserve").unwrap();
    let t = KycToken::new(
        genesis()
            .with_initial_partition(reserve)
            .with_chain_id(11_155_111),
    )
    .unwrap();
    assert_eq!(t.chain_id(), 11_155_111);
    assert_eq!(t.partitions_of(&ADMIN), vec![reserve]);
    assert_eq!(t.balance_of(&ADMIN), t.total_supply());
}

#[test]
fn zero_supply_genesis_still_closes_issuance() {
    let mut g = genesis();
    g.initial_supply = 0;
    let t = KycToken::new(g).unwrap();
    assert_eq!(t.total_supply(), 0);
    assert!(!t.is_issuable());
    assert!(t.events().is_empty());
}

// ---------------------------------------------------------------------------
// Administrative setters
// ---------------------------------------------------------------------------

#[test]
fn setters_refuse_non_administrators() {
    let mut t = token();
    assert_eq!(
        t.transfer_administrator(&MALLORY, MALLORY),
        Err(SettlementError::Unauthorized)
    );
    assert_eq!(
        t.set_fee_collectors(&MALLORY, MALLORY, MALLORY),
        Err(SettlementError::Unauthorized)
    );
    assert_eq!(
        t.set_authorizer(&MALLORY, MALLORY),
        Err(SettlementError::Unauthorized)
    );
    assert_eq!(
        t.set_exempt(&MALLORY, MALLORY, true),
        Err(SettlementError::Unauthorized)
    );
    assert_eq!(t.administrator(), ADMIN);
    assert_eq!(t.fee_collectors(), (FEE_COLLECTOR, PROSYNERGY_COLLECTOR));
    assert!(!t.is_exempt(&MALLORY, &BOB));
}

#[test]
fn setters_refuse_null_addresses() {
    let mut t = token();
    for result in [
        t.transfer_administrator(&ADMIN, Address::ZERO),
        t.set_fee_collectors(&ADMIN, Address::ZERO, BOB),
        t.set_fee_collectors(&ADMIN, BOB, Address::ZERO),
        t.set_authorizer(&ADMIN, Address::ZERO),
    ] {
        assert!(matches!(result, Err(SettlementError::InvalidConfiguration(_))));
    }
}

#[test]
fn administrator_handover_moves_privileges_and_exemption() {
    let mut t = token();
    t.transfer_administrator(&ADMIN, ALICE).unwrap();

    assert_eq!(t.administrator(), ALICE);
    assert_eq!(t.set_exempt(&ADMIN, BOB, true), Err(SettlementError::Unauthorized));
    t.set_exempt(&ALICE, BOB, true).unwrap();

    // The old administrator now needs authorization like everyone else.
    assert!(!t.is_exempt(&ADMIN, &MALLORY));
    assert!(t.is_exempt(&MALLORY, &ALICE));
    assert!(matches!(
        t.events().last(),
        Some(SettlementEvent::ExemptionUpdated { account, exempt: true }) if *account == BOB
    ));
}

#[test]
fn new_collectors_receive_subsequent_fees() {
    let mut t = token();
    t.transfer_by_partition(&TransferRequest::new(issued(), ADMIN, ALICE, 1_000_000))
        .unwrap();
    t.set_fee_collectors(&ADMIN, BOB, MALLORY).unwrap();

    let payload = authorizer().authorize_transfer(&ALICE, &FEE_COLLECTOR, 1_000_000, t.chain_id(), 0);
    t.transfer_by_partition(
        &TransferRequest::new(issued(), ALICE, FEE_COLLECTOR, 1_000_000).with_authorization(&payload),
    )
    .unwrap();

    assert_eq!(t.balance_of(&FEE_COLLECTOR), 995_750);
    assert_eq!(t.balance_of(&BOB), 3_000);
    assert_eq!(t.balance_of(&MALLORY), 1_250);
}

#[test]
fn rotated_authorizer_invalidates_old_signatures() {
    let mut t = token();
    t.transfer_by_partition(&TransferRequest::new(issued(), ADMIN, ALICE, 1_000))
        .unwrap();
    let old = authorizer().authorize_transfer(&ALICE, &BOB, 10, t.chain_id(), 0);

    let rotated = AuthorizerKeypair::from_bytes(&[0x24; 32]).unwrap();
    t.set_authorizer(&ADMIN, rotated.address()).unwrap();
    assert_eq!(t.authorizer(), rotated.address());

    let err = t
        .transfer_by_partition(&TransferRequest::new(issued(), ALICE, BOB, 10).with_authorization(&old))
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidAuthorization(_)));

    let fresh = rotated.authorize_transfer(&ALICE, &BOB, 10, t.chain_id(), 0);
    t.transfer_by_partition(&TransferRequest::new(issued(), ALICE, BOB, 10).with_authorization(&fresh))
        .unwrap();
}

#[test]
fn unflagging_restores_the_gate() {
    let mut t = token();
    t.transfer_by_partition(&TransferRequest::new(issued(), ADMIN, ALICE, 1_000))
        .unwrap();
    t.set_exempt(&ADMIN, ALICE, true).unwrap();
    t.transfer_by_partition(&TransferRequest::new(issued(), ALICE, BOB, 10))
        .unwrap();

    t.set_exempt(&ADMIN, ALICE, false).unwrap();
    assert_eq!(
        t.transfer_by_partition(&TransferRequest::new(issued(), ALICE, BOB, 10)),
        Err(SettlementError::AuthorizationRequired)
    );
}

#[test]
fn flag_query_tracks_only_explicit_flags() {
    let mut t = token();
    assert!(!t.is_flagged(&ALICE));

    t.set_exempt(&ADMIN, ALICE, true).unwrap();
    assert!(t.is_flagged(&ALICE));
    assert!(!t.is_flagged(&BOB));
    // The administrator is exempt by role, not by flag.
    assert!(t.is_exempt(&ADMIN, &BOB));
    assert!(!t.is_flagged(&ADMIN));

    t.set_exempt(&ADMIN, ALICE, false).unwrap();
    assert!(!t.is_flagged(&ALICE));
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[test]
fn operators_need_holder_approval() {
    let mut t = token();
    t.transfer_by_partition(&TransferRequest::new(issued(), ADMIN, ALICE, 1_000))
        .unwrap();
    let request = TransferRequest::new(issued(), ALICE, ADMIN, 100).with_operator(BOB);

    assert_eq!(
        t.transfer_by_partition(&request),
        Err(SettlementError::UnauthorizedOperator {
            operator: BOB,
            holder: ALICE
        })
    );

    t.authorize_operator(&ALICE, BOB).unwrap();
    assert!(t.is_operator_for(&BOB, &ALICE));
    let receipt = t.transfer_by_partition(&request).unwrap();
    assert_eq!(receipt.path, SettlementPath::Exempt);
    assert_eq!(t.balance_of(&ALICE), 900);

    t.revoke_operator(&ALICE, &BOB).unwrap();
    assert!(!t.is_operator_for(&BOB, &ALICE));
    assert!(matches!(
        t.transfer_by_partition(&request),
        Err(SettlementError::UnauthorizedOperator { .. })
    ));
}

#[test]
fn holder_is_always_its_own_operator() {
    let mut t = token();
    assert!(t.is_operator_for(&ALICE, &ALICE));
    t.authorize_operator(&ALICE, ALICE).unwrap();
    assert!(matches!(
        t.revoke_operator(&ALICE, &ALICE),
        Err(SettlementError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        t.authorize_operator(&ALICE, Address::ZERO),
        Err(SettlementError::InvalidConfiguration(_))
    ));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_settlement_under_one_lock_conserves_supply() {
    const SENDERS: u8 = 8;
    const TRANSFERS: u64 = 25;
    const VALUE: Amount = 10_000;

    let token = Arc::new(RwLock::new(token()));
    {
        let mut t = token.write();
        for i in 0..SENDERS {
            let sender = Address::new([0x10 + i; 20]);
            t.transfer_by_partition(&TransferRequest::new(
                issued(),
                ADMIN,
                sender,
                VALUE * TRANSFERS as Amount,
            ))
            .unwrap();
        }
    }

    let handles: Vec<_> = (0..SENDERS)
        .map(|i| {
            let token = Arc::clone(&token);
            thread::spawn(move || {
                let key = authorizer();
                let sender = Address::new([0x10 + i; 20]);
                let recipient = Address::new([0x30 + i; 20]);
                for nonce in 0..TRANSFERS {
                    let mut t = token.write();
                    let payload =
                        key.authorize_transfer(&sender, &recipient, VALUE, t.chain_id(), nonce);
                    t.transfer_by_partition(
                        &TransferRequest::new(issued(), sender, recipient, VALUE)
                            .with_authorization(&payload),
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let t = token.read();
    assert_eq!(t.total_supply(), 1_000_000_000);
    let mut held = t.balance_of(&ADMIN) + t.balance_of(&FEE_COLLECTOR) + t.balance_of(&PROSYNERGY_COLLECTOR);
    for i in 0..SENDERS {
        let sender = Address::new([0x10 + i; 20]);
        assert_eq!(t.nonce_of(&sender), TRANSFERS);
        assert_eq!(t.balance_of(&sender), 0);
        held += t.balance_of(&Address::new([0x30 + i; 20]));
    }
    assert_eq!(held, 1_000_000_000);
    // 10_000 → fee 30, prosynergy 12 per transfer.
    assert_eq!(
        t.balance_of(&FEE_COLLECTOR),
        30 * TRANSFERS as Amount * SENDERS as Amount
    );
}
