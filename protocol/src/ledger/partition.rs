//! # Partitions and Destination Resolution
//!
//! A partition is an opaque 32-byte tag naming a sub-ledger. Balances are
//! keyed by `(holder, partition)`; a transfer debits one partition and may
//! credit another when the caller attaches an explicit partition-change
//! instruction.
//!
//! Whether the instruction is even *looked at* is gated by a historical
//! rule kept for wire compatibility: `operator_data` must be non-empty and
//! `data` must be at least 64 bytes. What the instruction means is up to the
//! pluggable [`PartitionResolver`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{CHANGE_PARTITION_FLAG, MIN_PARTITION_DATA_LENGTH, PARTITION_LENGTH, WORD_LENGTH};

/// Errors produced while parsing a partition from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    /// A label longer than 32 bytes cannot be packed into a partition tag.
    #[error("partition label too long: {0} bytes (max 32)")]
    LabelTooLong(usize),

    /// `0x`-prefixed input that is not 32 bytes of valid hex.
    #[error("invalid partition hex: {0}")]
    InvalidHex(String),
}

/// A 32-byte partition tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Partition([u8; PARTITION_LENGTH]);

impl Partition {
    /// Wraps raw tag bytes.
    pub const fn new(bytes: [u8; PARTITION_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Packs a short UTF-8 label left-aligned and zero-padded, the same layout
    /// a Solidity `bytes32` string literal has.
    pub fn from_label(label: &str) -> Result<Self, PartitionError> {
        let bytes = label.as_bytes();
        if bytes.len() > PARTITION_LENGTH {
            return Err(PartitionError::LabelTooLong(bytes.len()));
        }
        let mut tag = [0u8; PARTITION_LENGTH];
        tag[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(tag))
    }

    /// Returns the raw tag bytes.
    pub fn as_bytes(&self) -> &[u8; PARTITION_LENGTH] {
        &self.0
    }

    /// The label this tag was built from, if it looks like one: printable
    /// ASCII followed only by zero padding.
    pub fn label(&self) -> Option<&str> {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(PARTITION_LENGTH);
        if end == 0 || self.0[end..].iter().any(|b| *b != 0) {
            return None;
        }
        let head = &self.0[..end];
        if !head.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return None;
        }
        std::str::from_utf8(head).ok()
    }

    /// `0x`-prefixed hex rendering of the full tag.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Partition {
    type Err = PartitionError;

    /// Accepts either `0x` + 64 hex chars or a plain label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(stripped) = s.strip_prefix("0x") {
            if stripped.len() == PARTITION_LENGTH * 2 {
                let bytes = hex::decode(stripped)
                    .map_err(|e| PartitionError::InvalidHex(e.to_string()))?;
                let mut tag = [0u8; PARTITION_LENGTH];
                tag.copy_from_slice(&bytes);
                return Ok(Self(tag));
            }
        }
        Self::from_label(s)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(label),
            None => f.write_str(&self.to_hex()),
        }
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Partition({})", self)
    }
}

impl Serialize for Partition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Partition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Decides which partition the credit legs of a transfer land in.
///
/// Only consulted once the compatibility gate in [`destination_partition`]
/// has passed.
pub trait PartitionResolver: fmt::Debug + Send + Sync {
    /// Returns the destination partition for a transfer out of `from_partition`.
    fn resolve(&self, from_partition: &Partition, data: &[u8]) -> Partition;
}

/// The standard resolver: if the first word of `data` is the all-`0xff`
/// change flag, the second word names the destination partition. Anything
/// else keeps the source partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangePartitionFlag;

impl PartitionResolver for ChangePartitionFlag {
    fn resolve(&self, from_partition: &Partition, data: &[u8]) -> Partition {
        if data.len() < WORD_LENGTH * 2 || data[..WORD_LENGTH] != CHANGE_PARTITION_FLAG {
            return *from_partition;
        }
        let mut tag = [0u8; PARTITION_LENGTH];
        tag.copy_from_slice(&data[WORD_LENGTH..WORD_LENGTH * 2]);
        Partition(tag)
    }
}

/// Applies the compatibility gate and, if it passes, the resolver.
///
/// The gate (`operator_data` non-empty AND `data.len() >= 64`) is an opaque
/// protocol detail preserved exactly; it is not a logical requirement of the
/// resolver.
pub fn destination_partition(
    resolver: &dyn PartitionResolver,
    from_partition: &Partition,
    data: &[u8],
    operator_data: &[u8],
) -> Partition {
    if !operator_data.is_empty() && data.len() >= MIN_PARTITION_DATA_LENGTH {
        resolver.resolve(from_partition, data)
    } else {
        *from_partition
    }
}

/// Builds the `data` prefix that asks [`ChangePartitionFlag`] to move the
/// credit legs into `to`.
pub fn change_partition_data(to: &Partition) -> Vec<u8> {
    let mut data = Vec::with_capacity(WORD_LENGTH * 2);
    data.extend_from_slice(&CHANGE_PARTITION_FLAG);
    data.extend_from_slice(to.as_bytes());
    data
}
