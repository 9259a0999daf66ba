//! The descent trail recorded during `put` (spec §3, §4.3, §4.4).
//!
//! The trail is a plain stack built up during descent and consumed once,
//! bottom-up, by logical put — deliberately not a linked parent pointer,
//! which would create a node→parent→node cycle (spec §9).

use crate::ids::NodeId;
use crate::node::{Branch, Node};

/// One visited branch on the way down to the target leaf.
#[derive(Debug, Clone)]
pub struct PathElem {
    pub branch_id: NodeId,
    pub branch: Branch,
    pub next_child_idx: usize,
}

/// Root-to-leaf order; logical put folds it in reverse (nearest ancestor
/// first).
pub type Trail = Vec<PathElem>;

/// Transient commit descriptor produced by logical put: the nodes to
/// persist for this `put`, plus the two flags reported to
/// `cmd.verifyChanges` and used to decide whether to bump `depth` (spec
/// §3, §4.4).
#[derive(Debug, Default)]
pub struct PutTask {
    pub nodes_to_save: Vec<(NodeId, Node)>,
    pub increase_depth: bool,
    pub was_splitting: bool,
}

impl PutTask {
    pub fn push(&mut self, id: NodeId, node: Node) {
        self.nodes_to_save.push((id, node));
    }
}
