use crate::hash::{hash_concat_dyn, Hasher};
use crate::ids::{NodeId, ValueRef};
use crate::key::Key;
use crate::proof::GeneralNodeProof;
use crate::Hash;
use serde::{Deserialize, Serialize};

/// Ordered entries of (key, value ref, kv-checksum), plus a pointer to the
/// next leaf for range scans (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaf {
    pub keys: Vec<Key>,
    pub value_refs: Vec<ValueRef>,
    /// Per-entry `hasher(key || value-hash)`.
    pub kv_checksums: Vec<Hash>,
    pub right_sibling: Option<NodeId>,
    pub checksum: Hash,
}

impl Leaf {
    /// An empty leaf with no right sibling, as auto-created at `RootId`
    /// for a fresh tree.
    pub fn empty() -> Self {
        Self {
            keys: Vec::new(),
            value_refs: Vec::new(),
            kv_checksums: Vec::new(),
            right_sibling: None,
            checksum: Hash::empty(),
        }
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    fn recompute_checksum(&mut self, hasher: &dyn Hasher) {
        self.checksum = hash_concat_dyn(hasher, self.kv_checksums.iter().map(|h| h.as_bytes()));
    }

    /// Insert a new `(key, value_ref, kv_hash)` triple at `idx`, growing
    /// the leaf by one entry (spec §4.1 `insert`).
    #[must_use]
    pub fn insert(
        &self,
        key: Key,
        value_ref: ValueRef,
        kv_hash: Hash,
        idx: usize,
        hasher: &dyn Hasher,
    ) -> Self {
        debug_assert!(idx <= self.size());
        let mut next = self.clone();
        next.keys.insert(idx, key);
        next.value_refs.insert(idx, value_ref);
        next.kv_checksums.insert(idx, kv_hash);
        next.recompute_checksum(hasher);
        next
    }

    /// Replace the triple at `idx` in place, preserving the existing
    /// `value_ref` (spec §4.1 `rewrite`): an update must not change which
    /// value slot a key points at.
    #[must_use]
    pub fn rewrite(&self, key: Key, kv_hash: Hash, idx: usize, hasher: &dyn Hasher) -> Self {
        debug_assert!(idx < self.size());
        let mut next = self.clone();
        next.keys[idx] = key;
        next.kv_checksums[idx] = kv_hash;
        next.recompute_checksum(hasher);
        next
    }

    /// Split into `(left, right)`. `left` keeps the ceiling half and gains
    /// `right_sibling = new_right_id`; `right` keeps the floor half and
    /// inherits the old `right_sibling` (spec §4.1 `split`).
    pub fn split(&self, new_right_id: NodeId, hasher: &dyn Hasher) -> (Self, Self) {
        let left_size = self.size().div_ceil(2);
        let mut left = Self {
            keys: self.keys[..left_size].to_vec(),
            value_refs: self.value_refs[..left_size].to_vec(),
            kv_checksums: self.kv_checksums[..left_size].to_vec(),
            right_sibling: Some(new_right_id),
            checksum: Hash::empty(),
        };
        let mut right = Self {
            keys: self.keys[left_size..].to_vec(),
            value_refs: self.value_refs[left_size..].to_vec(),
            kv_checksums: self.kv_checksums[left_size..].to_vec(),
            right_sibling: self.right_sibling,
            checksum: Hash::empty(),
        };
        left.recompute_checksum(hasher);
        right.recompute_checksum(hasher);
        (left, right)
    }

    /// A leaf-level Merkle proof pointing at `affected_idx`.
    pub fn to_proof(&self, affected_idx: usize) -> GeneralNodeProof {
        GeneralNodeProof::new(self.kv_checksums.clone(), affected_idx)
    }
}
