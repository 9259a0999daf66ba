//! The command protocol: the oracle the engine consults at every hop
//! (spec §4.2). The command is the sole source of ordering and
//! authentication decisions — the engine treats its outputs as
//! authoritative and performs only bounds-checking on returned indices.

use crate::error::{Result, TreeError};
use crate::ids::ValueRef;
use crate::node::{Branch, Leaf};
use crate::proof::MerklePath;
use async_trait::async_trait;

/// What the client found (or where it would go) at a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// The key already occupies `keys[idx]`.
    Found(usize),
    /// The key would sort at `idx` if inserted (for `range`, "start
    /// streaming from `idx`").
    InsertionPoint(usize),
}

impl SearchResult {
    pub fn index(self) -> usize {
        match self {
            SearchResult::Found(idx) | SearchResult::InsertionPoint(idx) => idx,
        }
    }
}

/// The client's decision at the target leaf of a `put`.
#[derive(Debug, Clone)]
pub struct ClientPutDetails {
    pub key: crate::key::Key,
    pub value_hash: crate::Hash,
    pub search_result: SearchResult,
}

/// Provides a fresh `ValueRef` on demand. Only invoked when
/// `search_result` is `InsertionPoint` — a `Found` update reuses the
/// existing ref (spec §4.2).
pub trait ValueRefProvider: Send {
    fn next_value_ref(&mut self) -> ValueRef;
}

impl<F: FnMut() -> ValueRef + Send> ValueRefProvider for F {
    fn next_value_ref(&mut self) -> ValueRef {
        (self)()
    }
}

/// `putDetails`'s return value: the client's decision plus a way to mint a
/// `ValueRef` for a fresh insert.
pub struct BTreePutDetails {
    pub details: ClientPutDetails,
    pub value_ref_provider: Box<dyn ValueRefProvider>,
}

/// Oracle used by `get` and `range`: descends by asking the client which
/// child to follow, then asks what the target leaf holds.
#[async_trait]
pub trait ReadCommand: Send + Sync {
    /// Pick a child slot in `[0, branch.size())`.
    async fn next_child_index(&self, branch: &Branch) -> Result<usize>;

    /// Inspect the leaf (or `None` for an empty tree) and report where the
    /// key of interest sits.
    async fn submit_leaf(&self, leaf: Option<&Leaf>) -> Result<SearchResult>;
}

/// Oracle used by `put`: same descent as `ReadCommand`, plus the decision
/// needed to compute the new leaf and a final verification gate before
/// anything is committed.
#[async_trait]
pub trait WriteCommand: Send + Sync {
    async fn next_child_index(&self, branch: &Branch) -> Result<usize>;

    async fn put_details(&self, leaf: Option<&Leaf>) -> Result<BTreePutDetails>;

    /// Must resolve successfully before the engine commits. On rejection
    /// the in-memory computation is discarded without persisting anything.
    async fn verify_changes(&self, merkle_path: &MerklePath, was_splitting: bool) -> Result<()>;
}

/// Bounds-check a client-returned child index against a branch's size; the
/// engine's only validation of command output (spec §4.2).
pub fn check_child_index(idx: usize, branch_size: usize) -> Result<usize> {
    if idx >= branch_size {
        return Err(TreeError::Command(format!(
            "child index {idx} out of bounds for branch of size {branch_size}"
        )));
    }
    Ok(idx)
}

/// Bounds-check a client-returned leaf index (`Found`/`InsertionPoint`)
/// against a leaf's size. `InsertionPoint` may legally equal `size`
/// (append at the end); `Found` must be strictly within bounds.
pub fn check_leaf_index(result: SearchResult, leaf_size: usize) -> Result<SearchResult> {
    match result {
        SearchResult::Found(idx) if idx >= leaf_size => Err(TreeError::Command(format!(
            "Found({idx}) out of bounds for leaf of size {leaf_size}"
        ))),
        SearchResult::InsertionPoint(idx) if idx > leaf_size => Err(TreeError::Command(format!(
            "InsertionPoint({idx}) out of bounds for leaf of size {leaf_size}"
        ))),
        other => Ok(other),
    }
}
