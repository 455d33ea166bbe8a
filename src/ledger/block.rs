//! Ledger blocks and their digest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::LedgerError;
use crate::types::AnomalyEvent;

/// Literal marker carried by the genesis payload.
pub const GENESIS_MARKER: &str = "Genesis Block";

/// Previous-hash sentinel for the genesis block (64 hex zeros).
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

const GENESIS_TAG: &[u8] = b"genesis:";
const ANOMALY_TAG: &[u8] = b"anomaly:";

/// What a block records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum LedgerPayload {
    Genesis,
    Anomaly(AnomalyEvent),
}

impl LedgerPayload {
    /// Bytes fed to the digest for this payload.
    ///
    /// The variant tag prefix keeps a genesis marker and any event encoding
    /// from ever colliding. Non-finite floats are refused: JSON writes them
    /// all as `null`.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        match self {
            LedgerPayload::Genesis => Ok(genesis_bytes()),
            LedgerPayload::Anomaly(event) => {
                if let Some((channel, value)) = event
                    .reading
                    .values
                    .iter()
                    .map(|(c, v)| (*c, *v))
                    .chain(event.flags.iter())
                    .find(|(_, v)| !v.is_finite())
                {
                    return Err(LedgerError::NonFiniteValue { channel, value });
                }
                let mut bytes = ANOMALY_TAG.to_vec();
                bytes.extend(serde_json::to_vec(event)?);
                Ok(bytes)
            }
        }
    }

    pub fn as_event(&self) -> Option<&AnomalyEvent> {
        match self {
            LedgerPayload::Genesis => None,
            LedgerPayload::Anomaly(event) => Some(event),
        }
    }
}

fn genesis_bytes() -> Vec<u8> {
    let mut bytes = GENESIS_TAG.to_vec();
    bytes.extend_from_slice(GENESIS_MARKER.as_bytes());
    bytes
}

/// One immutable entry in the hash chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: LedgerPayload,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    /// Block 0: sentinel previous hash and the genesis marker payload.
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        let hash = digest(0, &timestamp, &genesis_bytes(), GENESIS_PREVIOUS_HASH);
        Self {
            index: 0,
            timestamp,
            payload: LedgerPayload::Genesis,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash,
        }
    }

    /// Build the block that follows `previous`.
    pub fn next(
        previous: &Block,
        timestamp: DateTime<Utc>,
        payload: LedgerPayload,
    ) -> Result<Self, LedgerError> {
        let payload_bytes = payload.canonical_bytes()?;
        Ok(Self::with_payload_bytes(previous, timestamp, payload, &payload_bytes))
    }

    /// Same as [`Block::next`] with the payload already serialized.
    pub(super) fn with_payload_bytes(
        previous: &Block,
        timestamp: DateTime<Utc>,
        payload: LedgerPayload,
        payload_bytes: &[u8],
    ) -> Self {
        let index = previous.index + 1;
        let hash = digest(index, &timestamp, payload_bytes, &previous.hash);
        Self {
            index,
            timestamp,
            payload,
            previous_hash: previous.hash.clone(),
            hash,
        }
    }

    /// Recompute the digest from the stored fields.
    pub fn compute_hash(&self) -> Result<String, LedgerError> {
        let payload_bytes = self.payload.canonical_bytes()?;
        Ok(digest(
            self.index,
            &self.timestamp,
            &payload_bytes,
            &self.previous_hash,
        ))
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.payload, LedgerPayload::Genesis)
    }
}

/// SHA-256 over `index || timestamp || len(payload) || payload || len(prev) || prev`.
///
/// Fixed-width integers and length prefixes make the concatenation
/// unambiguous: no two distinct field tuples produce the same byte stream.
pub fn digest(
    index: u64,
    timestamp: &DateTime<Utc>,
    payload_bytes: &[u8],
    previous_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_be_bytes());
    hasher.update(timestamp.timestamp().to_be_bytes());
    hasher.update(timestamp.timestamp_subsec_nanos().to_be_bytes());
    hasher.update((payload_bytes.len() as u64).to_be_bytes());
    hasher.update(payload_bytes);
    hasher.update((previous_hash.len() as u64).to_be_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}
