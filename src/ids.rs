//! Monotonic identifiers (spec §3, §4.5).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 64-bit monotonic node identifier. `NodeId(0)` is `RootId` and is never
/// reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(pub u64);

/// Reserved id of the root node.
pub const ROOT_ID: NodeId = NodeId(0);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node#{}", self.0)
    }
}

impl NodeId {
    pub fn is_root(self) -> bool {
        self == ROOT_ID
    }

    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

/// 64-bit monotonic identifier standing in for a value stored outside the
/// engine. The engine stores refs but never dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ValueRef(pub u64);

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value#{}", self.0)
    }
}

/// A monotonic, never-reused provider of fresh `NodeId`s, seeded at startup
/// by scanning the backing store for the current maximum id (spec §4.5).
///
/// `RootId = 0` is reserved and never handed out by `next_node_id`.
pub trait NodeIdProvider: Send + Sync {
    fn next_node_id(&self) -> NodeId;
}

/// Simple atomic-counter id provider. Construct with
/// `AtomicNodeIdProvider::seeded(max_found)` where `max_found` is the
/// highest `NodeId` observed in the store (or `ROOT_ID` for an empty
/// store) so the first issued id is `max_found + 1`.
#[derive(Debug)]
pub struct AtomicNodeIdProvider {
    next: AtomicU64,
}

impl AtomicNodeIdProvider {
    pub fn seeded(max_found: NodeId) -> Self {
        Self {
            next: AtomicU64::new(max_found.0 + 1),
        }
    }
}

impl NodeIdProvider for AtomicNodeIdProvider {
    fn next_node_id(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
