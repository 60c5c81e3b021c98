//! A Merkle Patricia Trie: a persistent key/value map whose root hash
//! commits to its entire content, content-addressable against a pluggable
//! [`BackingStore`] so large tries don't have to live in memory at once.
//!
//! Restructured from `cancun::trie`'s flat-`BTreeMap`-backed design into a
//! persistent node tree (`node.rs`) walked by pure visitors (`visitor.rs`)
//! that build new nodes through a [`NodeFactory`] (`factory.rs`),
//! generalizing that module's single in-memory shape to also support
//! lazily loading and persisting nodes (`store.rs`), following
//! `risc0-zeth`'s content-addressed trie design for the storage side.

mod error;
mod factory;
mod node;
mod path;
mod store;
mod visitor;

pub use error::TrieError;
pub use factory::{InMemoryFactory, NodeFactory, StoredFactory};
pub use node::{Node, TrieValue};
pub use path::{Path, TERMINATOR};
pub use store::{BackingStore, DynStore, InMemoryStore};

use std::sync::Arc;

use crate::crypto::Hash32;

/// A trie rooted at `root`, whose reads and writes go through `factory`.
pub struct Trie<V: TrieValue> {
    factory: Arc<dyn NodeFactory<V>>,
    root: Node<V>,
}

impl<V: TrieValue> Trie<V> {
    pub fn new(factory: Arc<dyn NodeFactory<V>>) -> Self {
        Self { factory, root: Node::Null }
    }

    /// A trie with no backing store: every node lives in memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryFactory))
    }

    /// A trie backed by `store`, persisting any node whose encoding is
    /// large enough to warrant a hash reference instead of inlining.
    pub fn with_store(store: DynStore) -> Self {
        Self::new(Arc::new(StoredFactory::new(store)))
    }

    /// Reopens a previously-persisted trie at `root_hash`.
    pub async fn open(factory: Arc<dyn NodeFactory<V>>, root_hash: Hash32) -> Result<Self, TrieError> {
        let root = factory.retrieve(root_hash).await?;
        Ok(Self { factory, root })
    }

    pub async fn get(&self, key: &[u8]) -> Result<Option<V>, TrieError> {
        let path = path::key_to_path(key);
        let result = visitor::get(&self.root, &path).await?;
        match result {
            Node::Leaf(l) => Ok(Some(l.value.clone())),
            Node::Branch(b) => Ok(b.value.clone()),
            _ => Ok(None),
        }
    }

    pub async fn put(&mut self, key: &[u8], value: V) -> Result<(), TrieError> {
        let path = path::key_to_path(key);
        self.root = visitor::put(&self.root, &path, value, self.factory.as_ref()).await?;
        Ok(())
    }

    pub async fn remove(&mut self, key: &[u8]) -> Result<(), TrieError> {
        let path = path::key_to_path(key);
        self.root = visitor::remove(&self.root, &path, self.factory.as_ref()).await?;
        Ok(())
    }

    pub fn root_hash(&self) -> Result<Hash32, TrieError> {
        self.root.hash()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.root, Node::Null)
    }
}
