//! Walkthrough of one KYC-gated settlement lifecycle.
//!
//! Issues supply, funds a holder through an exempt transfer, settles an
//! authorized transfer with its fee split, and shows a replay being refused.
//!
//! Run with:
//!   cargo run -p prosynergy-contracts --example settlement_demo

use std::time::Instant;

use prosynergy_contracts::{KycToken, SettlementError, TokenGenesis, TransferRequest};
use prosynergy_protocol::crypto::AuthorizerKeypair;
use prosynergy_protocol::ledger::Partition;
use prosynergy_protocol::types::{Address, Amount};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]======================================================{RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn refused(text: &str) {
    println!("{RED}  [REFUSED] {text}{RESET}");
}

fn balance_row(name: &str, balance: Amount) {
    println!("  {BOLD}{name:<22}{RESET}  {WHITE}{balance:>16}{RESET}");
}

fn balances(token: &KycToken, rows: &[(&str, Address)]) {
    for (name, address) in rows {
        balance_row(name, token.balance_of(address));
    }
    println!("{DIM}  total supply {}{RESET}", token.total_supply());
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), SettlementError> {
    let authorizer = AuthorizerKeypair::generate();
    let admin = Address::new([0xa0; 20]);
    let fee_collector = Address::new([0xfe; 20]);
    let prosynergy_collector = Address::new([0xfd; 20]);
    let alice = Address::new([0x01; 20]);
    let bob = Address::new([0x02; 20]);
    let rows = [
        ("administrator", admin),
        ("alice", alice),
        ("bob", bob),
        ("fee collector", fee_collector),
        ("prosynergy collector", prosynergy_collector),
    ];
    let issued = Partition::from_label("issued")
        .map_err(|e| SettlementError::InvalidConfiguration(e.to_string()))?;

    section(1, "Genesis");
    let mut token = KycToken::new(TokenGenesis::new(
        "Prosynergy",
        "PRO",
        admin,
        fee_collector,
        prosynergy_collector,
        authorizer.address(),
        1_000_000_000,
    ))?;
    success(&format!("authorizer is {}", authorizer.address()));
    balances(&token, &rows);

    section(2, "Exempt transfer: administrator funds alice");
    token.transfer_by_partition(&TransferRequest::new(issued, admin, alice, 1_000_000))?;
    success("full value moved, no fee, no nonce");
    balances(&token, &rows);

    section(3, "Authorized transfer: alice pays bob");
    let nonce = token.nonce_of(&alice);
    let payload = authorizer.authorize_transfer(&alice, &bob, 1_000_000, token.chain_id(), nonce);
    let request = TransferRequest::new(issued, alice, bob, 1_000_000).with_authorization(&payload);
    let started = Instant::now();
    let receipt = token.transfer_by_partition(&request)?;
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    success(&format!(
        "net {} / fee {} / prosynergy fee {} ({ms:.2} ms)",
        receipt.split.net, receipt.split.fee, receipt.split.prosynergy_fee
    ));
    balances(&token, &rows);

    section(4, "Replay of the same authorization");
    match token.transfer_by_partition(&request) {
        Err(err) => refused(&err.to_string()),
        Ok(_) => return Err(SettlementError::LedgerInvariant("replay settled".into())),
    }
    println!("{DIM}  alice's nonce is now {}{RESET}", token.nonce_of(&alice));

    section(5, "Event log");
    for event in token.events() {
        println!("  {YELLOW}{}{RESET}", event.kind());
    }
    println!();
    Ok(())
}
