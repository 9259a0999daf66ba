//! The persistence abstraction (spec §4.5, §6): node-id → node bytes, plus
//! a monotonic id allocator. The engine depends only on the `BTreeStore`
//! trait; `InMemoryStore` is the reference implementation the rest of this
//! crate tests against, the same way `aptos-jellyfish-merkle`'s test suite
//! ships a `MockTreeStore` instead of requiring a real KV engine.

use crate::codec::{BcsCodec, Codec};
use crate::error::Result;
use crate::ids::{AtomicNodeIdProvider, NodeId, NodeIdProvider, ROOT_ID};
use crate::node::Node;
use async_trait::async_trait;
use dashmap::DashMap;

/// `get`/`put`/`nextId`/`contains` over node ids (spec §6). Errors are
/// surfaced unchanged to the caller.
#[async_trait]
pub trait BTreeStore: Send + Sync {
    async fn get(&self, id: NodeId) -> Result<Option<Node>>;
    async fn put(&self, id: NodeId, node: Node) -> Result<()>;
    async fn contains(&self, id: NodeId) -> Result<bool>;

    /// Allocate a fresh, never-reused `NodeId`.
    fn next_id(&self) -> NodeId;
}

/// Every `BTreeStore` is its own `NodeIdProvider` (spec §6 bundles `nextId`
/// into the store interface itself); `Tree` draws ids from `self.store`
/// rather than taking a separate id-allocator collaborator.
impl<T: BTreeStore> NodeIdProvider for T {
    fn next_node_id(&self) -> NodeId {
        self.next_id()
    }
}

/// In-memory reference `BTreeStore`. Node bytes are encoded with whatever
/// `Codec<Node>` is supplied (defaults to `BcsCodec`), mirroring spec §6's
/// "node bytes are produced by a pluggable codec".
pub struct InMemoryStore<C = BcsCodec> {
    nodes: DashMap<NodeId, Vec<u8>>,
    codec: C,
    ids: AtomicNodeIdProvider,
}

impl InMemoryStore<BcsCodec> {
    pub fn new() -> Self {
        Self::with_codec(BcsCodec)
    }
}

impl Default for InMemoryStore<BcsCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec<Node>> InMemoryStore<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            nodes: DashMap::new(),
            codec,
            // A fresh store has no persisted max id; the id provider is
            // seeded so the first issued id is `ROOT_ID + 1` (spec §4.5).
            ids: AtomicNodeIdProvider::seeded(ROOT_ID),
        }
    }

    /// Rebuild an `InMemoryStore` over bytes already on disk, seeding the
    /// id provider by scanning for the current maximum id (spec §4.5).
    pub fn reopen(codec: C, existing: impl IntoIterator<Item = (NodeId, Vec<u8>)>) -> Self {
        let nodes = DashMap::new();
        let mut max_found = ROOT_ID;
        for (id, bytes) in existing {
            if id.0 > max_found.0 {
                max_found = id;
            }
            nodes.insert(id, bytes);
        }
        Self {
            nodes,
            codec,
            ids: AtomicNodeIdProvider::seeded(max_found),
        }
    }
}

#[async_trait]
impl<C: Codec<Node>> BTreeStore for InMemoryStore<C> {
    async fn get(&self, id: NodeId) -> Result<Option<Node>> {
        match self.nodes.get(&id) {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, id: NodeId, node: Node) -> Result<()> {
        let bytes = self.codec.encode(&node)?;
        self.nodes.insert(id, bytes);
        Ok(())
    }

    async fn contains(&self, id: NodeId) -> Result<bool> {
        Ok(self.nodes.contains_key(&id))
    }

    fn next_id(&self) -> NodeId {
        self.ids.next_node_id()
    }
}

/// Persist every `(NodeId, Node)` pair of a `PutTask` in parallel (spec
/// §4.4's commit step): the new tree is only reachable through the new
/// root once all of its children are durable, so the write order within
/// one batch does not matter for correctness of the *new* tree, only for
/// what's observable after a crash mid-batch (spec §5, §9 OQ1).
pub async fn commit_nodes<S: BTreeStore + ?Sized>(
    store: &S,
    nodes: Vec<(NodeId, Node)>,
) -> Result<()> {
    let writes = nodes.into_iter().map(|(id, node)| store.put(id, node));
    let results = futures::future::join_all(writes).await;
    for result in results {
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Leaf;

    #[tokio::test]
    async fn fresh_store_has_no_root() {
        let store = InMemoryStore::new();
        assert!(store.get(ROOT_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = InMemoryStore::new();
        let leaf = Node::Leaf(Leaf::empty());
        store.put(ROOT_ID, leaf).await.unwrap();
        assert!(store.get(ROOT_ID).await.unwrap().unwrap().is_empty_root_leaf());
    }

    #[tokio::test]
    async fn next_id_is_monotonic_and_skips_root() {
        let store = InMemoryStore::new();
        let a = store.next_id();
        let b = store.next_id();
        assert_ne!(a, ROOT_ID);
        assert_ne!(b, ROOT_ID);
        assert!(b.0 > a.0);
    }

    #[tokio::test]
    async fn reopen_resumes_after_max_found_id() {
        let bytes = BcsCodec.encode(&Node::Leaf(Leaf::empty())).unwrap();
        let store = InMemoryStore::reopen(BcsCodec, vec![(NodeId(7), bytes)]);
        assert_eq!(store.next_id(), NodeId(8));
    }

    #[tokio::test]
    async fn commit_nodes_persists_every_entry() {
        let store = InMemoryStore::new();
        commit_nodes(
            &store,
            vec![
                (NodeId(1), Node::Leaf(Leaf::empty())),
                (NodeId(2), Node::Leaf(Leaf::empty())),
            ],
        )
        .await
        .unwrap();
        assert!(store.contains(NodeId(1)).await.unwrap());
        assert!(store.contains(NodeId(2)).await.unwrap());
    }
}
