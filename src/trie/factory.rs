//! Node construction, the one seam where persistence side effects happen.
//!
//! The visitors (`visitor.rs`) never call `Node::leaf`/`extension`/`branch`
//! directly; they go through a `NodeFactory` so that a storage-backed trie
//! can intercept every newly built node and decide whether to persist it.
//! Grounded on `risc0-zeth`'s `MptNode` construction path, generalized into
//! an explicit trait so an in-memory trie and a stored trie share one set of
//! visitors.

use std::sync::Arc;

use async_trait::async_trait;

use crate::crypto::{keccak256, Hash32};

use super::error::TrieError;
use super::node::{Node, StoredNode, TrieValue};
use super::path::Path;
use super::store::DynStore;

#[async_trait]
pub trait NodeFactory<V: TrieValue>: Send + Sync {
    async fn make_leaf(&self, path: Path, value: V) -> Result<Node<V>, TrieError>;
    async fn make_extension(&self, path: Path, child: Node<V>) -> Result<Node<V>, TrieError>;
    async fn make_branch(&self, children: [Node<V>; 16], value: Option<V>) -> Result<Node<V>, TrieError>;
    async fn retrieve(&self, hash: Hash32) -> Result<Node<V>, TrieError>;
}

/// Builds nodes with no backing store: everything stays inline, `Stored`
/// never appears, `retrieve` is unreachable because no hash ever escapes.
pub struct InMemoryFactory;

#[async_trait]
impl<V: TrieValue> NodeFactory<V> for InMemoryFactory {
    async fn make_leaf(&self, path: Path, value: V) -> Result<Node<V>, TrieError> {
        Ok(Node::leaf(path, value))
    }

    async fn make_extension(&self, path: Path, child: Node<V>) -> Result<Node<V>, TrieError> {
        Ok(Node::extension(path, child))
    }

    async fn make_branch(&self, children: [Node<V>; 16], value: Option<V>) -> Result<Node<V>, TrieError> {
        Ok(Node::branch(children, value))
    }

    async fn retrieve(&self, hash: Hash32) -> Result<Node<V>, TrieError> {
        Err(TrieError::MissingNode { hash })
    }
}

/// Builds nodes against a [`DynStore`]: any node whose RLP encoding is >= 32
/// bytes is written to the store under its hash and replaced with a
/// `Stored` reference, mirroring the inline-vs-hash rule `Node::rlp_ref`
/// already applies when a parent references a child.
pub struct StoredFactory {
    store: DynStore,
}

impl StoredFactory {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    async fn persist_if_large<V: TrieValue>(&self, node: Node<V>) -> Result<Node<V>, TrieError> {
        let rlp = node.rlp()?;
        if rlp.len() >= 32 {
            let hash = keccak256(rlp.as_slice());
            self.store.put(hash, rlp).await?;
            Ok(Node::Stored(Arc::new(StoredNode::preloaded(hash, self.store.clone(), node))))
        } else {
            Ok(node)
        }
    }
}

#[async_trait]
impl<V: TrieValue> NodeFactory<V> for StoredFactory {
    async fn make_leaf(&self, path: Path, value: V) -> Result<Node<V>, TrieError> {
        self.persist_if_large(Node::leaf(path, value)).await
    }

    async fn make_extension(&self, path: Path, child: Node<V>) -> Result<Node<V>, TrieError> {
        self.persist_if_large(Node::extension(path, child)).await
    }

    async fn make_branch(&self, children: [Node<V>; 16], value: Option<V>) -> Result<Node<V>, TrieError> {
        self.persist_if_large(Node::branch(children, value)).await
    }

    async fn retrieve(&self, hash: Hash32) -> Result<Node<V>, TrieError> {
        Arc::new(StoredNode::<V>::new(hash, self.store.clone())).load().await
    }
}
