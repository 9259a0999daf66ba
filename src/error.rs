//! Error kinds surfaced by the engine (see spec §7).
//!
//! Every public operation returns `Result<T, TreeError>`. The engine never
//! retries internally and never half-commits: a failure at any point aborts
//! the current operation before `commit` runs.

use thiserror::Error;

/// Everything that can abort a `get`, `range`, or `put`.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The backing key-value store failed a read or write.
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),

    /// Stored bytes decoded to an unexpected shape (e.g. a branch where a
    /// leaf was expected while following `rightSibling`).
    #[error("codec error: {0}")]
    Codec(#[source] anyhow::Error),

    /// The command oracle failed, or returned an index outside the bounds
    /// the engine can accept.
    #[error("command error: {0}")]
    Command(String),

    /// `verifyChanges` rejected the proposed Merkle path. No state was
    /// mutated.
    #[error("verification rejected: {0}")]
    VerificationRejected(String),

    /// `assertions.isKeyOrderRequired` is set and a persisted node's keys
    /// were not strictly ascending.
    #[error("key order violation in node {node_id}: {detail}")]
    KeyOrderViolation { node_id: u64, detail: String },

    /// `Config` construction rejected out-of-range values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TreeError>;
