//! Streaming range scans (spec §4.3, §5). The initial descent to the
//! starting leaf goes through the same single-mutator path as `put` so it
//! never observes a root mid-split; once the starting leaf is found the
//! scan releases that lock and walks `right_sibling` pointers on its own,
//! racing (and losing gracefully to) concurrent writers.

use crate::command::{check_child_index, check_leaf_index, ReadCommand};
use crate::engine::Tree;
use crate::error::{Result, TreeError};
use crate::hash::Hasher;
use crate::ids::ROOT_ID;
use crate::key::Key;
use crate::node::{Leaf, Node};
use crate::store::BTreeStore;
use crate::Hash;
use futures::future::BoxFuture;
use futures::stream::{self, Stream, StreamExt};

/// One key/value-hash pair yielded by [`range`].
#[derive(Debug, Clone)]
pub struct RangeEntry {
    pub key: Key,
    pub value_ref: crate::ids::ValueRef,
    pub kv_checksum: Hash,
}

struct Cursor<'a> {
    next_leaf: Option<crate::ids::NodeId>,
    pending: std::vec::IntoIter<RangeEntry>,
    store: &'a dyn BTreeStoreDyn,
}

/// Object-safe subset of `BTreeStore` needed once the scan has left the
/// mutex-guarded descent: `range` must not require `S: Sized` to stream
/// past the starting leaf.
#[async_trait::async_trait]
trait BTreeStoreDyn: Send + Sync {
    async fn get(&self, id: crate::ids::NodeId) -> Result<Option<Node>>;
}

#[async_trait::async_trait]
impl<S: BTreeStore> BTreeStoreDyn for S {
    async fn get(&self, id: crate::ids::NodeId) -> Result<Option<Node>> {
        BTreeStore::get(self, id).await
    }
}

fn leaf_entries(leaf: &Leaf, from_idx: usize) -> Vec<RangeEntry> {
    (from_idx..leaf.size())
        .map(|i| RangeEntry {
            key: leaf.keys[i].clone(),
            value_ref: leaf.value_refs[i],
            kv_checksum: leaf.kv_checksums[i].clone(),
        })
        .collect()
}

/// Stream every entry from the position `cmd` points to onward, following
/// `right_sibling` links until the chain ends (spec §4.3 `range`).
///
/// The root descent runs under the engine's single-mutator lock (shared
/// with `put`); subsequent hops across sibling leaves happen outside it.
pub fn range<'a, S, H>(
    tree: &'a Tree<S, H>,
    cmd: &'a (dyn ReadCommand),
) -> impl Stream<Item = Result<RangeEntry>> + 'a
where
    S: BTreeStore,
    H: Hasher,
{
    stream::once(async move { descend_for_range(tree, cmd).await }).flat_map(move |start| {
        type BoxedStream<'b> = std::pin::Pin<Box<dyn Stream<Item = Result<RangeEntry>> + 'b>>;
        match start {
            Ok((leaf, start_idx)) => {
                let cursor = Cursor {
                    next_leaf: leaf.right_sibling,
                    pending: leaf_entries(&leaf, start_idx).into_iter(),
                    store: tree.store(),
                };
                Box::pin(stream::unfold(Some(cursor), step)) as BoxedStream<'a>
            }
            Err(e) => Box::pin(stream::once(async move { Err(e) })) as BoxedStream<'a>,
        }
    })
}

async fn descend_for_range<S, H>(tree: &Tree<S, H>, cmd: &(dyn ReadCommand)) -> Result<(Leaf, usize)>
where
    S: BTreeStore,
    H: Hasher,
{
    let _permit = tree.acquire_mutator().await;
    let mut current_id = ROOT_ID;
    loop {
        match tree
            .store()
            .get(current_id)
            .await?
            .ok_or_else(|| TreeError::Storage(anyhow::anyhow!("missing node {current_id}")))?
        {
            Node::Leaf(leaf) => {
                let leaf_opt = if leaf.size() == 0 { None } else { Some(&leaf) };
                let result = cmd.submit_leaf(leaf_opt).await?;
                let result = check_leaf_index(result, leaf.size())?;
                return Ok((leaf, result.index()));
            }
            Node::Branch(branch) => {
                let idx = check_child_index(cmd.next_child_index(&branch).await?, branch.size())?;
                current_id = branch.child_ids[idx];
            }
        }
    }
}

fn step(cursor: Option<Cursor<'_>>) -> BoxFuture<'_, Option<(Result<RangeEntry>, Option<Cursor<'_>>)>> {
    Box::pin(async move {
        let mut cursor = cursor?;
        if let Some(entry) = cursor.pending.next() {
            return Some((Ok(entry), Some(cursor)));
        }
        let next_id = cursor.next_leaf?;
        match cursor.store.get(next_id).await {
            Ok(Some(Node::Leaf(leaf))) => {
                cursor.next_leaf = leaf.right_sibling;
                cursor.pending = leaf_entries(&leaf, 0).into_iter();
                step(Some(cursor)).await
            }
            Ok(Some(Node::Branch(_))) => Some((
                Err(TreeError::Storage(anyhow::anyhow!(
                    "rightSibling {next_id} did not point at a leaf"
                ))),
                None,
            )),
            Ok(None) => Some((Err(TreeError::Storage(anyhow::anyhow!("missing node {next_id}"))), None)),
            Err(e) => Some((Err(e), None)),
        }
    })
}
