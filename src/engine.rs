//! The tree engine: `get`, `range`, and `put` over a [`crate::store::BTreeStore`]
//! (spec §4.3). Traversal itself never compares keys — every descent
//! decision is delegated to the caller's [`ReadCommand`] or
//! [`WriteCommand`].
//!
//! `put` is serialized behind a single permit (spec §5: "exactly one
//! mutator runs at a time"); `get` and `range` need no permit for their own
//! correctness but `range`'s initial root fetch takes one briefly so it
//! observes a root that isn't mid-split (spec §4.3, §9 OQ2).

use crate::command::{check_child_index, check_leaf_index, ReadCommand, SearchResult, WriteCommand};
use crate::config::Config;
use crate::error::{Result, TreeError};
use crate::hash::Hasher;
use crate::ids::{NodeId, ValueRef, ROOT_ID};
use crate::logical_put::logical_put;
use crate::node::{Branch, Leaf, Node};
use crate::proof::MerklePath;
use crate::store::{commit_nodes, BTreeStore};
use crate::trail::{PathElem, Trail};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Indirection so `descend_to_leaf` can share one loop between `get`'s
/// `ReadCommand` and `put`'s `WriteCommand` — both only need
/// `next_child_index` for descent.
#[async_trait]
trait NextChild: Send + Sync {
    async fn next_child_index(&self, branch: &Branch) -> Result<usize>;
}

struct ReadDescender<'a>(&'a dyn ReadCommand);

#[async_trait]
impl<'a> NextChild for ReadDescender<'a> {
    async fn next_child_index(&self, branch: &Branch) -> Result<usize> {
        self.0.next_child_index(branch).await
    }
}

struct WriteDescender<'a>(&'a dyn WriteCommand);

#[async_trait]
impl<'a> NextChild for WriteDescender<'a> {
    async fn next_child_index(&self, branch: &Branch) -> Result<usize> {
        self.0.next_child_index(branch).await
    }
}

/// The authenticated B+Tree engine, generic over storage and hashing (spec
/// §6's pluggable collaborators). Node-id allocation is not a separate
/// collaborator: every `BTreeStore` is its own `NodeIdProvider` (spec §6's
/// `nextId`), so `Tree` draws ids from `self.store`.
pub struct Tree<S, H> {
    store: S,
    hasher: H,
    config: Config,
    depth: AtomicU64,
    mutator: Semaphore,
}

impl<S, H> Tree<S, H>
where
    S: BTreeStore,
    H: Hasher,
{
    /// Wrap an existing store. If the store has no root yet, one is
    /// created as an empty leaf at [`crate::ids::ROOT_ID`] (spec §4.3).
    pub async fn open(store: S, hasher: H, config: Config) -> Result<Self> {
        if !store.contains(ROOT_ID).await? {
            store.put(ROOT_ID, Node::Leaf(Leaf::empty())).await?;
        }
        Ok(Self {
            store,
            hasher,
            config,
            depth: AtomicU64::new(0),
            mutator: Semaphore::new(1),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Briefly hold the single-mutator permit, used by [`crate::range`] to
    /// make its initial root descent race-free with a concurrent `put`
    /// without holding the lock for the whole scan (spec §4.3, §9 OQ2).
    pub(crate) async fn acquire_mutator(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.mutator.acquire().await.expect("mutator semaphore is never closed")
    }

    /// Current tree depth: the number of branch levels above the leaves
    /// (0 for a single-leaf tree).
    pub fn get_depth(&self) -> u64 {
        self.depth.load(Ordering::Acquire)
    }

    /// The root node's checksum, `Hash::empty()` for a still-empty tree.
    #[instrument(skip(self))]
    pub async fn get_merkle_root(&self) -> Result<crate::Hash> {
        let root = self.fetch(ROOT_ID).await?;
        Ok(root.checksum().clone())
    }

    async fn fetch(&self, id: NodeId) -> Result<Node> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TreeError::Storage(anyhow::anyhow!("missing node {id}")))
    }

    /// Descend from the root to the leaf `descender` points at, asking
    /// `next_child_index` at every branch (spec §4.3's shared descent
    /// loop). Returns the leaf id, the leaf itself (`None` for a still-empty
    /// tree), and the trail of branches visited root-first.
    async fn descend_to_leaf(&self, descender: &dyn NextChild) -> Result<(NodeId, Option<Leaf>, Trail)> {
        let mut trail = Trail::new();
        let mut current_id = ROOT_ID;
        loop {
            match self.fetch(current_id).await? {
                Node::Leaf(leaf) => {
                    let leaf = if leaf.size() == 0 { None } else { Some(leaf) };
                    return Ok((current_id, leaf, trail));
                }
                Node::Branch(branch) => {
                    let idx = check_child_index(descender.next_child_index(&branch).await?, branch.size())?;
                    let child_id = branch.child_ids[idx];
                    debug!(node = %current_id, child_idx = idx, child = %child_id, "descending");
                    trail.push(PathElem {
                        branch_id: current_id,
                        branch,
                        next_child_idx: idx,
                    });
                    current_id = child_id;
                }
            }
        }
    }

    /// Read-only descent: ask `cmd` which child to follow at every branch,
    /// then ask it to classify whatever leaf is reached (spec §4.3 `get`).
    /// Returns the stored value's ref if the key was found, `None` if `cmd`
    /// reports an insertion point instead (spec §4.3 step 5, §6).
    #[instrument(skip(self, cmd))]
    pub async fn get(&self, cmd: &(dyn ReadCommand)) -> Result<Option<ValueRef>> {
        let (_, leaf, _) = self.descend_to_leaf(&ReadDescender(cmd)).await?;
        let result = cmd.submit_leaf(leaf.as_ref()).await?;
        let result = check_leaf_index(result, leaf.as_ref().map_or(0, Leaf::size))?;
        match result {
            SearchResult::Found(idx) => {
                let leaf = leaf.as_ref().expect("Found(idx) implies a non-empty leaf");
                Ok(Some(leaf.value_refs[idx]))
            }
            SearchResult::InsertionPoint(_) => Ok(None),
        }
    }

    /// Insert or update a single key (spec §4.3 `put`, §4.4 `logicalPut`),
    /// returning the ref the value now lives under (spec §2, §4.3 step 5,
    /// §6). Use [`Tree::put_with_proof`] for the accompanying Merkle path.
    ///
    /// Only one `put` runs at a time; concurrent callers queue on the
    /// engine's internal semaphore.
    #[instrument(skip(self, cmd))]
    pub async fn put(&self, cmd: &(dyn WriteCommand)) -> Result<ValueRef> {
        let (value_ref, _proof) = self.put_with_proof(cmd).await?;
        Ok(value_ref)
    }

    /// Like [`Tree::put`], but also returns the [`MerklePath`] the client can
    /// verify the committed change against (spec §4.4).
    #[instrument(skip(self, cmd))]
    pub async fn put_with_proof(&self, cmd: &(dyn WriteCommand)) -> Result<(ValueRef, MerklePath)> {
        let _permit = self
            .mutator
            .acquire()
            .await
            .expect("mutator semaphore is never closed");

        let (leaf_id, leaf, trail) = self.descend_to_leaf(&WriteDescender(cmd)).await?;
        let leaf_was_empty = leaf.is_none();

        let details = cmd.put_details(leaf.as_ref()).await?;
        let search_result = check_leaf_index(
            details.details.search_result,
            leaf.as_ref().map_or(0, Leaf::size),
        )?;

        let mut value_ref_provider = details.value_ref_provider;
        let current_leaf = leaf.unwrap_or_else(Leaf::empty);
        let (new_leaf, insertion_idx) = match search_result {
            SearchResult::Found(idx) => (
                current_leaf.rewrite(details.details.key, details.details.value_hash, idx, &self.hasher),
                idx,
            ),
            SearchResult::InsertionPoint(idx) => {
                let value_ref = value_ref_provider.next_value_ref();
                (
                    current_leaf.insert(details.details.key, value_ref, details.details.value_hash, idx, &self.hasher),
                    idx,
                )
            }
        };
        // Captured before `logical_put` consumes `new_leaf` and a split (if
        // any) reshuffles indices between the two halves.
        let value_ref = new_leaf.value_refs[insertion_idx];

        let (merkle_path, mut put_task) = logical_put(
            leaf_id,
            new_leaf,
            insertion_idx,
            trail,
            self.config.max_degree(),
            &self.hasher,
            &self.store,
        );
        if leaf_was_empty {
            // Spec §4.3 step 3: the very first put into an empty tree
            // commits with increaseDepth=true unconditionally, regardless of
            // whether the resulting one-entry leaf overflows.
            put_task.increase_depth = true;
        }

        if let Err(e) = cmd.verify_changes(&merkle_path, put_task.was_splitting).await {
            warn!(error = %e, "verification rejected, discarding computed put");
            return Err(e);
        }

        if self.config.assert_key_order() {
            for (id, node) in &put_task.nodes_to_save {
                assert_key_order(*id, node)?;
            }
        }

        debug!(
            nodes = put_task.nodes_to_save.len(),
            split = put_task.was_splitting,
            "committing put"
        );
        commit_nodes(&self.store, put_task.nodes_to_save).await?;
        if put_task.increase_depth {
            let new_depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
            info!(depth = new_depth, "split propagated to the root, depth increased");
        }

        Ok((value_ref, merkle_path))
    }
}

/// Spec §6's `assertions.isKeyOrderRequired`: a persisted node's keys must
/// not repeat. The engine has no `Ord` on `Key` and so cannot check full
/// ascending order itself — only that descent via the command oracle never
/// lands two entries on the same key (spec §9 OQ3).
fn assert_key_order(id: NodeId, node: &Node) -> Result<()> {
    let keys: &[crate::key::Key] = match node {
        Node::Leaf(l) => &l.keys,
        Node::Branch(b) => &b.keys,
    };
    for pair in keys.windows(2) {
        if pair[0].as_bytes() == pair[1].as_bytes() {
            return Err(TreeError::KeyOrderViolation {
                node_id: id.0,
                detail: "duplicate adjacent key".to_string(),
            });
        }
    }
    Ok(())
}
