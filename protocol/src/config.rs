//! # Protocol Configuration & Constants
//!
//! Every magic number in the settlement engine lives here. Several of these
//! values are part of the external protocol: the off-ledger authorizer signs
//! digests built from them, so changing one silently invalidates every
//! authorization in flight.

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Chain id of Ethereum mainnet. Bound into every authorization digest.
pub const CHAIN_ID_MAINNET: u64 = 1;

/// Chain id of the Sepolia test network.
pub const CHAIN_ID_SEPOLIA: u64 = 11_155_111;

/// Chain id used by local development nodes (Hardhat / Anvil default).
pub const CHAIN_ID_DEVNET: u64 = 31_337;

/// Protocol version string reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Fee Schedule
// ---------------------------------------------------------------------------

/// Denominator shared by both fee rates. Rates are expressed in
/// thousandths of a basis point: 100_000 == 100%.
pub const FEE_DENOMINATOR: u128 = 100_000;

/// Primary fee rate numerator: 300 / 100_000 = 0.3%.
pub const FEE_NUMERATOR: u128 = 300;

/// Secondary (prosynergy) fee rate numerator: 125 / 100_000 = 0.125%.
pub const PROSYNERGY_FEE_NUMERATOR: u128 = 125;

// ---------------------------------------------------------------------------
// Authorization Digest
// ---------------------------------------------------------------------------

/// EIP-191 personal-message prefix for a 32-byte payload.
///
/// The authorizer signs `keccak256(PREFIX || inner_hash)`, which is what
/// `eth_sign` / `personal_sign` produce for a 32-byte message.
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Length of a recoverable secp256k1 signature: `r (32) || s (32) || v (1)`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Length of an ABI word.
pub const WORD_LENGTH: usize = 32;

/// Length of an account address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Partitions
// ---------------------------------------------------------------------------

/// Length of a partition tag in bytes.
pub const PARTITION_LENGTH: usize = 32;

/// Minimum length of the transfer `data` field before a destination partition
/// is even considered (flag word + partition word).
pub const MIN_PARTITION_DATA_LENGTH: usize = 64;

/// Flag word that, when it leads the transfer `data`, asks for the credit legs
/// to land in the partition named by the second word.
pub const CHANGE_PARTITION_FLAG: [u8; 32] = [0xff; 32];

/// Label of the partition the genesis supply is issued into when the genesis
/// file does not name one.
pub const DEFAULT_PARTITION_LABEL: &str = "issued";
