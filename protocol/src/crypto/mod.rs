//! # Cryptographic Primitives
//!
//! Everything the authorization gate needs and nothing it does not:
//!
//! - **Keccak-256** and the **EIP-191** personal-message wrapper, because the
//!   off-ledger authorizer signs with standard Ethereum tooling.
//! - **secp256k1 ECDSA public-key recovery** for verification.
//! - **Authorizer keypairs** for producing authorizations in tests, benches
//!   and the node CLI.
//!
//! We don't roll our own curve arithmetic. `k256` and `sha3` do the work;
//! this module just pins down the encodings.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{authorization_digest, eip191_hash, keccak256, to_eth_signed_message_hash, transfer_hash};
pub use keys::{AuthorizerKeypair, KeyError};
pub use signatures::{address_of, recover_signer, verify};
