//! # Authorization Payload Codec
//!
//! The transfer `data` field of a non-exempt transfer is the ABI encoding of
//! `(uint256 nonce, bytes signature)`:
//!
//! ```text
//! word 0      nonce (uint256, big-endian)
//! word 1      offset of the `bytes` tail, in bytes from the start (0x40)
//! word off    length of the signature in bytes
//! ...         signature bytes, right-padded with zeros to a word boundary
//! ```
//!
//! Decoding is as strict as the ABI decoder it replaces: every offset and
//! length is bounds-checked before a single byte is copied. Nonces wider than
//! 64 bits are rejected outright: no account can ever reach them, so they
//! could never match.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WORD_LENGTH;
use crate::crypto::hash::u64_word;

/// Errors produced while decoding an authorization payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The payload is shorter than the two head words.
    #[error("payload too short: {0} bytes, need at least 64")]
    TooShort(usize),

    /// The nonce word does not fit in 64 bits.
    #[error("nonce exceeds 64 bits")]
    NonceOutOfRange,

    /// The tail offset points outside the payload or into the head.
    #[error("invalid bytes offset: {0}")]
    InvalidOffset(String),

    /// The declared signature length runs past the end of the payload.
    #[error("signature length {declared} exceeds remaining {remaining} bytes")]
    Truncated {
        /// Length declared in the length word.
        declared: usize,
        /// Bytes actually available after the length word.
        remaining: usize,
    },
}

/// Nonce plus signature proving the authorizer approved one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    /// The sender nonce this authorization is valid for.
    pub nonce: u64,
    /// 65-byte recoverable signature over the authorization digest.
    #[serde(with = "crate::types::hex_bytes")]
    pub signature: Vec<u8>,
}

/// Reads a word as a `u64`, failing if any of the high bytes are set.
fn word_as_u64(word: &[u8]) -> Option<u64> {
    let (high, low) = word.split_at(WORD_LENGTH - 8);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    Some(u64::from_be_bytes(buf))
}

fn word_as_usize(word: &[u8]) -> Option<usize> {
    word_as_u64(word).and_then(|v| usize::try_from(v).ok())
}

impl AuthorizationPayload {
    /// ABI-encode as `(uint256, bytes)`.
    pub fn encode(&self) -> Vec<u8> {
        let padded_len = self.signature.len().div_ceil(WORD_LENGTH) * WORD_LENGTH;
        let mut out = Vec::with_capacity(WORD_LENGTH * 3 + padded_len);

        out.extend_from_slice(&u64_word(self.nonce));
        out.extend_from_slice(&u64_word((WORD_LENGTH * 2) as u64));
        out.extend_from_slice(&u64_word(self.signature.len() as u64));
        out.extend_from_slice(&self.signature);
        out.resize(WORD_LENGTH * 3 + padded_len, 0);
        out
    }

    /// ABI-decode a `(uint256, bytes)` payload.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] describing the first structural problem found.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < WORD_LENGTH * 2 {
            return Err(CodecError::TooShort(data.len()));
        }

        let nonce = word_as_u64(&data[..WORD_LENGTH]).ok_or(CodecError::NonceOutOfRange)?;

        let offset = word_as_usize(&data[WORD_LENGTH..WORD_LENGTH * 2])
            .ok_or_else(|| CodecError::InvalidOffset("offset exceeds 64 bits".into()))?;
        if offset < WORD_LENGTH * 2 {
            return Err(CodecError::InvalidOffset(format!(
                "offset {offset} points into the head"
            )));
        }
        let length_end = offset
            .checked_add(WORD_LENGTH)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                CodecError::InvalidOffset(format!(
                    "offset {offset} beyond payload of {} bytes",
                    data.len()
                ))
            })?;

        let remaining = data.len() - length_end;
        let declared = word_as_usize(&data[offset..length_end]).unwrap_or(usize::MAX);
        if declared > remaining {
            return Err(CodecError::Truncated {
                declared,
                remaining,
            });
        }

        Ok(Self {
            nonce,
            signature: data[length_end..length_end + declared].to_vec(),
        })
    }
}
