//! The pure core of `put` (spec §4.4): fold a descent [`Trail`] and a
//! pre-computed new leaf into a [`MerklePath`] to hand the client and a
//! [`PutTask`] describing what to persist. Nothing here touches a
//! [`crate::store::BTreeStore`] or a command — both inputs are already
//! resolved by the time this function runs, which is what makes it
//! testable as ordinary data transformation.

use crate::hash::Hasher;
use crate::ids::{NodeId, NodeIdProvider, ROOT_ID};
use crate::key::Key;
use crate::node::{Branch, ChildRef, Leaf, Node};
use crate::trail::{PathElem, PutTask, Trail};

/// How the next ancestor up the trail must be updated, computed by the
/// level below it. `Identity` only occurs once the root has already
/// absorbed a split and there is nothing left above it to touch.
enum UpdateParent {
    Identity,
    ReplaceChecksum(crate::Hash),
    InsertLeftUpdateRight {
        left_key: Key,
        left_ref: ChildRef,
        right_ref: ChildRef,
        insert_to_left: bool,
    },
}

impl UpdateParent {
    /// Apply this update to the ancestor branch `elem` carries, returning
    /// the revised branch and the (possibly shifted) child index the proof
    /// and any further update must point at.
    fn apply(self, elem: PathElem, hasher: &dyn Hasher) -> (Branch, usize) {
        match self {
            UpdateParent::Identity => (elem.branch, elem.next_child_idx),
            UpdateParent::ReplaceChecksum(hash) => {
                let branch = elem.branch.update_child_checksum(hash, elem.next_child_idx, hasher);
                (branch, elem.next_child_idx)
            }
            UpdateParent::InsertLeftUpdateRight {
                left_key,
                left_ref,
                right_ref,
                insert_to_left,
            } => {
                let branch = elem
                    .branch
                    .insert_child(left_key, left_ref, elem.next_child_idx, hasher)
                    .update_child_ref(right_ref, elem.next_child_idx + 1, hasher);
                let next_child_idx = if insert_to_left {
                    elem.next_child_idx
                } else {
                    elem.next_child_idx + 1
                };
                (branch, next_child_idx)
            }
        }
    }
}

struct Acc {
    proof: crate::proof::MerklePath,
    update_parent: UpdateParent,
    put_task: PutTask,
}

/// Decide which half of a freshly split pair the affected index lands in,
/// and its index within that half.
fn split_landing(insertion_idx: usize, left_size: usize) -> (bool, usize) {
    if insertion_idx < left_size {
        (true, insertion_idx)
    } else {
        (false, insertion_idx - left_size)
    }
}

/// The leaf-level starting point of the fold (spec §4.4's base case):
/// no-overflow rewrite/insert, or a leaf split with the attendant root
/// synthesis when the leaf being split is itself the root.
fn leaf_context(
    leaf_id: NodeId,
    new_leaf: Leaf,
    insertion_idx: usize,
    max_degree: usize,
    hasher: &dyn Hasher,
    ids: &dyn NodeIdProvider,
) -> Acc {
    if new_leaf.size() <= max_degree {
        let mut put_task = PutTask::default();
        put_task.push(leaf_id, Node::Leaf(new_leaf.clone()));
        Acc {
            proof: crate::proof::MerklePath::single(new_leaf.to_proof(insertion_idx)),
            update_parent: UpdateParent::ReplaceChecksum(new_leaf.checksum.clone()),
            put_task,
        }
    } else {
        let is_root = leaf_id.is_root();
        let right_id = ids.next_node_id();
        let left_id = if is_root { ids.next_node_id() } else { leaf_id };
        let (left, right) = new_leaf.split(right_id, hasher);
        let left_size = left.size();
        let (insert_to_left, affected_idx) = split_landing(insertion_idx, left_size);
        let affected_proof = if insert_to_left {
            left.to_proof(affected_idx)
        } else {
            right.to_proof(affected_idx)
        };
        let base = crate::proof::MerklePath::single(affected_proof);

        let mut put_task = PutTask::default();
        put_task.was_splitting = true;
        put_task.push(left_id, Node::Leaf(left.clone()));
        put_task.push(right_id, Node::Leaf(right.clone()));

        let left_key = left.keys[left.keys.len() - 1].clone();
        let right_key = right.keys[right.keys.len() - 1].clone();
        let left_ref = ChildRef::new(left_id, left.checksum.clone());
        let right_ref = ChildRef::new(right_id, right.checksum.clone());

        if is_root {
            let new_parent = Branch::new_root(left_key, left_ref, right_key, right_ref, hasher);
            let affected_parent_idx = if insert_to_left { 0 } else { 1 };
            let proof = base.prepend(new_parent.to_proof(affected_parent_idx));
            put_task.increase_depth = true;
            put_task.push(ROOT_ID, Node::Branch(new_parent));
            Acc {
                proof,
                update_parent: UpdateParent::Identity,
                put_task,
            }
        } else {
            Acc {
                proof: base,
                update_parent: UpdateParent::InsertLeftUpdateRight {
                    left_key,
                    left_ref,
                    right_ref,
                    insert_to_left,
                },
                put_task,
            }
        }
    }
}

/// Fold one ancestor branch: apply the pending `update_parent`, then either
/// absorb it (no overflow) or split it and propagate a new `update_parent`
/// (and, at the root, synthesize a new top branch instead).
fn branch_step(acc: Acc, elem: PathElem, max_degree: usize, hasher: &dyn Hasher, ids: &dyn NodeIdProvider) -> Acc {
    let branch_id = elem.branch_id;
    let (revised, next_child_idx) = acc.update_parent.apply(elem, hasher);
    let mut put_task = acc.put_task;

    if revised.size() <= max_degree {
        let proof = acc.proof.prepend(revised.to_proof(next_child_idx));
        let checksum = revised.checksum.clone();
        put_task.push(branch_id, Node::Branch(revised));
        Acc {
            proof,
            update_parent: UpdateParent::ReplaceChecksum(checksum),
            put_task,
        }
    } else {
        let is_root = branch_id.is_root();
        let right_id = if is_root { ids.next_node_id() } else { branch_id };
        let left_id = ids.next_node_id();
        let (left, right) = revised.split(hasher);
        let left_size = left.size();
        let (insert_to_left, affected_idx) = split_landing(next_child_idx, left_size);
        let affected_proof = if insert_to_left {
            left.to_proof(affected_idx)
        } else {
            right.to_proof(affected_idx)
        };
        let base = acc.proof.prepend(affected_proof);

        put_task.was_splitting = true;
        put_task.push(left_id, Node::Branch(left.clone()));
        put_task.push(right_id, Node::Branch(right.clone()));

        let left_key = left.last_key();
        let right_key = right.last_key();
        let left_ref = ChildRef::new(left_id, left.checksum.clone());
        let right_ref = ChildRef::new(right_id, right.checksum.clone());

        if is_root {
            let new_parent = Branch::new_root(left_key, left_ref, right_key, right_ref, hasher);
            let affected_parent_idx = if insert_to_left { 0 } else { 1 };
            let proof = base.prepend(new_parent.to_proof(affected_parent_idx));
            put_task.increase_depth = true;
            put_task.push(ROOT_ID, Node::Branch(new_parent));
            Acc {
                proof,
                update_parent: UpdateParent::Identity,
                put_task,
            }
        } else {
            Acc {
                proof: base,
                update_parent: UpdateParent::InsertLeftUpdateRight {
                    left_key,
                    left_ref,
                    right_ref,
                    insert_to_left,
                },
                put_task,
            }
        }
    }
}

/// Fold a descent `trail` and the already-computed new leaf into the
/// client-facing [`crate::proof::MerklePath`] and the [`PutTask`] describing
/// what the engine must persist (spec §4.4).
///
/// `leaf_id` is the id the pre-split leaf was read from; `insertion_idx` is
/// the index within that leaf the client's `put_details` pointed at.
pub fn logical_put(
    leaf_id: NodeId,
    new_leaf: Leaf,
    insertion_idx: usize,
    trail: Trail,
    max_degree: usize,
    hasher: &dyn Hasher,
    ids: &dyn NodeIdProvider,
) -> (crate::proof::MerklePath, PutTask) {
    let mut acc = leaf_context(leaf_id, new_leaf, insertion_idx, max_degree, hasher, ids);
    for elem in trail.into_iter().rev() {
        acc = branch_step(acc, elem, max_degree, hasher, ids);
    }
    (acc.proof, acc.put_task)
}
