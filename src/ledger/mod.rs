//! Tamper-evident anomaly ledger
//!
//! A SHA-256 hash chain of anomaly events. Block 0 is a fixed genesis block;
//! every later block commits to its predecessor's hash, so editing any stored
//! field of any block is detected by [`Ledger::verify`].

mod block;
mod chain;

pub use block::{digest, Block, LedgerPayload, GENESIS_MARKER, GENESIS_PREVIOUS_HASH};
pub use chain::{verify_chain, ChainFault, ChainVerdict, Ledger};

use crate::types::Channel;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to serialize ledger payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Non-finite {channel} value ({value}) cannot be hashed")]
    NonFiniteValue { channel: Channel, value: f64 },
}
