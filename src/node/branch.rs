use super::ChildRef;
use crate::hash::{hash_concat_dyn, Hasher};
use crate::ids::NodeId;
use crate::key::Key;
use crate::proof::GeneralNodeProof;
use crate::Hash;
use serde::{Deserialize, Serialize};

/// Internal node. Carries exactly `size` children, each paired 1:1 with a
/// routing key — `keys[i]` is the largest key reachable through
/// `child_ids[i]` (spec §3: "this is a B+Tree variant in which each branch
/// carries exactly `size` children, not `size+1`"). When a child splits,
/// the right half inherits the subtree's old max key unchanged (so the
/// parent only needs `updateChildRef` for it) and the left half's new max
/// key is inserted as a fresh entry (spec §4.4's `insertChild` +
/// `updateChildRef` pairing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub keys: Vec<Key>,
    pub child_ids: Vec<NodeId>,
    pub child_hashes: Vec<Hash>,
    pub checksum: Hash,
}

impl Branch {
    pub fn size(&self) -> usize {
        self.child_ids.len()
    }

    fn recompute_checksum(&mut self, hasher: &dyn Hasher) {
        self.checksum = hash_concat_dyn(hasher, self.child_hashes.iter().map(|h| h.as_bytes()));
    }

    /// A brand-new branch with exactly two children, as synthesized when a
    /// root splits (spec §4.4). Both children's routing keys must be given
    /// explicitly since there is no existing parent entry to carry one of
    /// them over unchanged.
    pub fn new_root(left_key: Key, left: ChildRef, right_key: Key, right: ChildRef, hasher: &dyn Hasher) -> Self {
        let mut branch = Self {
            keys: vec![left_key, right_key],
            child_ids: vec![left.id, right.id],
            child_hashes: vec![left.hash, right.hash],
            checksum: Hash::empty(),
        };
        branch.recompute_checksum(hasher);
        branch
    }

    /// Insert `(routing_key, child)` at `idx`, growing the branch by one
    /// entry (spec §4.1 `insertChild`).
    #[must_use]
    pub fn insert_child(&self, routing_key: Key, child: ChildRef, idx: usize, hasher: &dyn Hasher) -> Self {
        debug_assert!(idx <= self.size());
        let mut next = self.clone();
        next.keys.insert(idx, routing_key);
        next.child_ids.insert(idx, child.id);
        next.child_hashes.insert(idx, child.hash);
        next.recompute_checksum(hasher);
        next
    }

    /// Replace the child id and hash at `idx`, keeping the routing key
    /// unchanged (spec §4.1 `updateChildRef`).
    #[must_use]
    pub fn update_child_ref(&self, child: ChildRef, idx: usize, hasher: &dyn Hasher) -> Self {
        debug_assert!(idx < self.size());
        let mut next = self.clone();
        next.child_ids[idx] = child.id;
        next.child_hashes[idx] = child.hash;
        next.recompute_checksum(hasher);
        next
    }

    /// Replace only the child hash at `idx` (spec §4.1
    /// `updateChildChecksum`): used to bubble a child's new checksum up
    /// after a non-splitting modification.
    #[must_use]
    pub fn update_child_checksum(&self, hash: Hash, idx: usize, hasher: &dyn Hasher) -> Self {
        debug_assert!(idx < self.size());
        let mut next = self.clone();
        next.child_hashes[idx] = hash;
        next.recompute_checksum(hasher);
        next
    }

    /// Split into `(left, right)` at the same boundary on both parallel
    /// arrays — `left` keeps the ceiling half, `right` keeps the floor
    /// half. Because keys and children are 1:1 here (unlike a classic
    /// B+Tree), this is structurally identical to `Leaf::split`; no key is
    /// discarded.
    pub fn split(&self, hasher: &dyn Hasher) -> (Self, Self) {
        let left_size = self.size().div_ceil(2);
        let mut left = Self {
            keys: self.keys[..left_size].to_vec(),
            child_ids: self.child_ids[..left_size].to_vec(),
            child_hashes: self.child_hashes[..left_size].to_vec(),
            checksum: Hash::empty(),
        };
        let mut right = Self {
            keys: self.keys[left_size..].to_vec(),
            child_ids: self.child_ids[left_size..].to_vec(),
            child_hashes: self.child_hashes[left_size..].to_vec(),
            checksum: Hash::empty(),
        };
        left.recompute_checksum(hasher);
        right.recompute_checksum(hasher);
        (left, right)
    }

    /// This subtree's routing key: the last (largest) key it carries.
    pub fn last_key(&self) -> Key {
        self.keys[self.keys.len() - 1].clone()
    }

    /// A branch-level Merkle proof pointing at `affected_idx`.
    pub fn to_proof(&self, affected_idx: usize) -> GeneralNodeProof {
        GeneralNodeProof::new(self.child_hashes.clone(), affected_idx)
    }
}
