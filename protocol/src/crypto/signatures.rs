//! # Signature Verification
//!
//! The authorization gate's leaf component. Given a 32-byte digest and a
//! 65-byte recoverable secp256k1 signature (`r || s || v`), recover the
//! signer's address and compare it with the configured authorizer.
//!
//! ## Failure model
//!
//! Verification never errors and never panics. A signature that is the wrong
//! length, carries an unknown `v`, encodes an out-of-range scalar, or simply
//! belongs to somebody else all collapse to `false`. Callers treat `false` as
//! the one and only rejection signal, which keeps the error oracle boring.
//!
//! `v` may be given in Ethereum form (27 / 28) or as a raw recovery id
//! (0 / 1).

use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};

use super::hash::keccak256;
use crate::config::SIGNATURE_LENGTH;
use crate::types::Address;

/// Derives the account address of a secp256k1 public key: the last 20 bytes
/// of `keccak256(x || y)`.
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag.
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..32]);
    Address::new(bytes)
}

/// Maps the trailing `v` byte onto a recovery id.
fn recovery_id(v: u8) -> Option<RecoveryId> {
    match v {
        27 | 28 => RecoveryId::from_byte(v - 27),
        0 | 1 => RecoveryId::from_byte(v),
        _ => None,
    }
}

/// Recovers the signer address from a prehashed digest and a 65-byte
/// signature. Returns `None` for anything malformed.
pub fn recover_signer(digest: &[u8; 32], signature: &[u8]) -> Option<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return None;
    }

    let recovery_id = recovery_id(signature[64])?;
    let sig = K256Signature::from_slice(&signature[..64]).ok()?;
    let verifying_key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id).ok()?;

    Some(address_of(&verifying_key))
}

/// Returns `true` iff `signature` over `digest` recovers to `authorizer`.
///
/// The null address never verifies, so a ledger that somehow ended up
/// without an authorizer rejects everything instead of accepting garbage.
pub fn verify(digest: &[u8; 32], signature: &[u8], authorizer: &Address) -> bool {
    if authorizer.is_zero() {
        return false;
    }
    matches!(recover_signer(digest, signature), Some(signer) if signer == *authorizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::{authorization_digest, keccak256};
    use crate::crypto::keys::AuthorizerKeypair;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn known_key_maps_to_known_address() {
        let kp = AuthorizerKeypair::from_hex(TEST_KEY).unwrap();
        assert_eq!(
            kp.address().to_hex(),
            "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
        );
    }

    #[test]
    fn sign_and_recover_round_trip() {
        let kp = AuthorizerKeypair::generate();
        let digest = keccak256(b"transfer");
        let sig = kp.sign_digest(&digest);

        assert_eq!(recover_signer(&digest, &sig), Some(kp.address()));
        assert!(verify(&digest, &sig, &kp.address()));
    }

    #[test]
    fn raw_recovery_id_is_accepted() {
        let kp = AuthorizerKeypair::generate();
        let digest = keccak256(b"raw v");
        let mut sig = kp.sign_digest(&digest);
        sig[64] -= 27;
        assert!(verify(&digest, &sig, &kp.address()));
    }

    #[test]
    fn wrong_signer_is_rejected() {
        let authorizer = AuthorizerKeypair::generate();
        let impostor = AuthorizerKeypair::generate();
        let digest = keccak256(b"transfer");
        let sig = impostor.sign_digest(&digest);
        assert!(!verify(&digest, &sig, &authorizer.address()));
    }

    #[test]
    fn malformed_signatures_return_false() {
        let kp = AuthorizerKeypair::generate();
        let digest = keccak256(b"transfer");
        let good = kp.sign_digest(&digest);

        assert!(!verify(&digest, &[], &kp.address()));
        assert!(!verify(&digest, &good[..64], &kp.address()));
        let mut long = good.to_vec();
        long.push(0);
        assert!(!verify(&digest, &long, &kp.address()));

        let mut bad_v = good;
        bad_v[64] = 35;
        assert!(!verify(&digest, &bad_v, &kp.address()));

        // r = 0 is not a valid scalar.
        let mut zero_r = good;
        zero_r[..32].copy_from_slice(&[0u8; 32]);
        assert!(!verify(&digest, &zero_r, &kp.address()));

        assert!(!verify(&digest, &[0xff; 65], &kp.address()));
    }

    #[test]
    fn null_authorizer_never_verifies() {
        let kp = AuthorizerKeypair::generate();
        let digest = keccak256(b"transfer");
        let sig = kp.sign_digest(&digest);
        assert!(!verify(&digest, &sig, &Address::ZERO));
    }

    #[test]
    fn tampered_digest_fails() {
        let kp = AuthorizerKeypair::generate();
        let from = Address::new([1u8; 20]);
        let to = Address::new([2u8; 20]);
        let sig = kp.sign_digest(&authorization_digest(&from, &to, 500, 1, 0));

        assert!(verify(&authorization_digest(&from, &to, 500, 1, 0), &sig, &kp.address()));
        assert!(!verify(&authorization_digest(&from, &to, 501, 1, 0), &sig, &kp.address()));
        assert!(!verify(&authorization_digest(&from, &to, 500, 2, 0), &sig, &kp.address()));
    }
}
