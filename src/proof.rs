//! Merkle proof types sent to the client after a mutation (spec §3, §4.4).

use crate::hash::Hash;

/// One level of a Merkle path: the sibling hashes at that level plus which
/// index was affected. `state_hash_so_far` is `Hash::empty()` for the
/// leaf-level proof and, for a branch-level proof produced while splitting
/// the root, is left as `Hash::empty()` too — the spec's
/// `toProof`/`Hash.empty()` "placeholder" convention (§4.1); the client
/// reconstructs the real root hash itself by folding `sibling_hashes`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralNodeProof {
    pub state_hash_so_far: Hash,
    pub sibling_hashes: Vec<Hash>,
    pub affected_idx: usize,
}

impl GeneralNodeProof {
    pub fn new(sibling_hashes: Vec<Hash>, affected_idx: usize) -> Self {
        Self {
            state_hash_so_far: Hash::empty(),
            sibling_hashes,
            affected_idx,
        }
    }
}

/// Ordered sequence of per-level proofs, root-to-leaf order as seen by the
/// client once `prepend` calls finish folding bottom-up during logical put.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MerklePath(pub Vec<GeneralNodeProof>);

impl MerklePath {
    pub fn single(proof: GeneralNodeProof) -> Self {
        Self(vec![proof])
    }

    /// Place `proof` ahead of everything already in the path. Logical put
    /// folds the trail bottom-up (nearest ancestor first), so each step
    /// prepends its own level onto what's already been accumulated from
    /// levels below it.
    #[must_use]
    pub fn prepend(mut self, proof: GeneralNodeProof) -> Self {
        self.0.insert(0, proof);
        self
    }

    pub fn levels(&self) -> &[GeneralNodeProof] {
        &self.0
    }
}
