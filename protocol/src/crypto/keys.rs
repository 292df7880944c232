//! # Authorizer Keys
//!
//! secp256k1 keypairs for the off-ledger KYC authorizer. The ledger itself
//! only ever needs the authorizer's *address*; the signing half lives here so
//! the node CLI, the benches, and the test suites can mint authorizations
//! exactly the way the external service does.
//!
//! ## Security considerations
//!
//! - Key generation uses `OsRng`.
//! - Key bytes are never logged and `Debug` prints the address only.
//! - `AuthorizerKeypair` does not implement `Serialize`. Exporting a secret
//!   key is an explicit call to [`AuthorizerKeypair::secret_key_bytes`].

use std::fmt;

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use thiserror::Error;

use super::hash::authorization_digest;
use super::signatures::address_of;
use crate::codec::AuthorizationPayload;
use crate::types::{Address, Amount};

/// Errors that can occur while loading key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid secret key hex: {0}")]
    InvalidHex(String),
}

/// A secp256k1 signing key plus the address it signs for.
#[derive(Clone)]
pub struct AuthorizerKeypair {
    signing_key: SigningKey,
}

impl AuthorizerKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Load a keypair from a raw 32-byte secret scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Load a keypair from hex, with or without a `0x` prefix. Surrounding
    /// whitespace is ignored so key files with a trailing newline load fine.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let trimmed = s.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(stripped).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(&array)
    }

    /// The raw secret scalar. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    /// The account address this key signs for.
    pub fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte digest as-is (no additional prefixing).
    ///
    /// Returns `r (32) || s (32) || v (1)` with `v = recovery_id + 27`.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> [u8; 65] {
        // Infallible for an in-memory key and a 32-byte prehash.
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .expect("prehash signing with an in-memory key cannot fail");

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        out
    }

    /// Produce the authorization payload for one specific transfer.
    pub fn authorize_transfer(
        &self,
        from: &Address,
        to: &Address,
        value: Amount,
        chain_id: u64,
        nonce: u64,
    ) -> AuthorizationPayload {
        let digest = authorization_digest(from, to, value, chain_id, nonce);
        AuthorizationPayload {
            nonce,
            signature: self.sign_digest(&digest).to_vec(),
        }
    }
}

impl fmt::Debug for AuthorizerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorizerKeypair {{ address: {} }}", self.address())
    }
}
