//! Append-only chain with linearizable appends and snapshot verification

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use super::block::{Block, LedgerPayload, GENESIS_PREVIOUS_HASH};
use super::LedgerError;

/// Why a chain failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainFault {
    /// Stored index does not match the block's position
    IndexMismatch,
    /// Block 0 lacks the sentinel previous hash or the genesis payload
    BadGenesis,
    /// Previous hash does not equal the predecessor's stored hash
    BrokenLink,
    /// Recomputed digest differs from the stored hash
    HashMismatch,
    /// Payload could not be serialized for rehashing
    Unserializable,
}

impl std::fmt::Display for ChainFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChainFault::IndexMismatch => "index mismatch",
            ChainFault::BadGenesis => "bad genesis block",
            ChainFault::BrokenLink => "broken link",
            ChainFault::HashMismatch => "hash mismatch",
            ChainFault::Unserializable => "unserializable payload",
        };
        write!(f, "{s}")
    }
}

/// Result of walking a chain front to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainVerdict {
    Valid { length: usize },
    Invalid { index: u64, fault: ChainFault },
}

impl ChainVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChainVerdict::Valid { .. })
    }

    /// First invalid index, if any.
    pub fn first_invalid(&self) -> Option<u64> {
        match self {
            ChainVerdict::Valid { .. } => None,
            ChainVerdict::Invalid { index, .. } => Some(*index),
        }
    }
}

/// Verify a chain and report the first block that fails.
pub fn verify_chain(blocks: &[Block]) -> ChainVerdict {
    if blocks.is_empty() {
        return ChainVerdict::Invalid {
            index: 0,
            fault: ChainFault::BadGenesis,
        };
    }

    let mut previous: Option<&Block> = None;
    for (position, block) in blocks.iter().enumerate() {
        let index = position as u64;
        let invalid = |fault| ChainVerdict::Invalid { index, fault };

        if block.index != index {
            return invalid(ChainFault::IndexMismatch);
        }

        match previous {
            None => {
                if block.previous_hash != GENESIS_PREVIOUS_HASH || !block.is_genesis() {
                    return invalid(ChainFault::BadGenesis);
                }
            }
            Some(prev) => {
                if block.is_genesis() {
                    return invalid(ChainFault::BadGenesis);
                }
                if block.previous_hash != prev.hash {
                    return invalid(ChainFault::BrokenLink);
                }
            }
        }

        match block.compute_hash() {
            Ok(hash) if hash == block.hash => {}
            Ok(_) => return invalid(ChainFault::HashMismatch),
            Err(_) => return invalid(ChainFault::Unserializable),
        }

        previous = Some(block);
    }

    ChainVerdict::Valid {
        length: blocks.len(),
    }
}

/// Process-wide hash-chained record of anomaly events.
///
/// All appends go through a single write lock, so concurrent callers observe
/// one total order. Readers get a copy and never see a partial block.
#[derive(Debug)]
pub struct Ledger {
    chain: RwLock<Vec<Block>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// New ledger holding only the genesis block.
    pub fn new() -> Self {
        Self {
            chain: RwLock::new(vec![Block::genesis(Utc::now())]),
        }
    }

    /// Wrap an existing chain without checking it. Use [`Ledger::verify`].
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            chain: RwLock::new(blocks),
        }
    }

    /// Append a payload and return a copy of the new block.
    ///
    /// Serialization happens before the lock is taken; index, timestamp,
    /// previous hash and digest are all fixed while it is held.
    pub fn append(&self, payload: LedgerPayload) -> Result<Block, LedgerError> {
        let payload_bytes = payload.canonical_bytes()?;

        let mut chain = self.write_chain();
        let block = match chain.last() {
            Some(previous) => {
                Block::with_payload_bytes(previous, Utc::now(), payload, &payload_bytes)
            }
            None => {
                // Only reachable through from_blocks(vec![])
                warn!("Ledger had no genesis block, creating one");
                let genesis = Block::genesis(Utc::now());
                let block = Block::with_payload_bytes(&genesis, Utc::now(), payload, &payload_bytes);
                chain.push(genesis);
                block
            }
        };
        chain.push(block.clone());
        drop(chain);

        debug!(block = block.index, hash = %block.hash, "Appended ledger block");
        Ok(block)
    }

    /// Point-in-time copy of the whole chain.
    pub fn snapshot(&self) -> Vec<Block> {
        self.read_chain().clone()
    }

    /// Verify a snapshot of the chain; appends may continue meanwhile.
    pub fn verify(&self) -> ChainVerdict {
        let blocks = self.snapshot();
        verify_chain(&blocks)
    }

    pub fn len(&self) -> usize {
        self.read_chain().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_chain().is_empty()
    }

    pub fn latest(&self) -> Option<Block> {
        self.read_chain().last().cloned()
    }

    fn read_chain(&self) -> RwLockReadGuard<'_, Vec<Block>> {
        self.chain.read().unwrap_or_else(|e| {
            warn!("RwLock poisoned on ledger read, recovering");
            e.into_inner()
        })
    }

    fn write_chain(&self) -> RwLockWriteGuard<'_, Vec<Block>> {
        self.chain.write().unwrap_or_else(|e| {
            warn!("RwLock poisoned on ledger write, recovering");
            e.into_inner()
        })
    }
}
