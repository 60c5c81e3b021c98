//! Pluggable content-addressed persistence for trie nodes.
//!
//! Grounded on `risc0-zeth`'s trie `BackingStore`-style resolver trait
//! (`resolve.rs`) for the shape, and on the general use of `async-trait` for
//! async trait methods seen across `paritytech-polkadot-sdk` and
//! `risc0-zeth`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bytes::ByteSeq;
use crate::crypto::Hash32;

use super::error::TrieError;

/// Content-addressed store: `hash` is always `keccak256(content)`, enforced
/// by callers (the trie only ever asks for hashes it computed itself).
#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn get(&self, hash: Hash32) -> Result<Option<ByteSeq>, TrieError>;
    async fn put(&self, hash: Hash32, content: ByteSeq) -> Result<(), TrieError>;
}

/// In-memory `BackingStore`, primarily for tests and small embedded use.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<Hash32, ByteSeq>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn get(&self, hash: Hash32) -> Result<Option<ByteSeq>, TrieError> {
        Ok(self.entries.lock().get(&hash).cloned())
    }

    async fn put(&self, hash: Hash32, content: ByteSeq) -> Result<(), TrieError> {
        self.entries.lock().insert(hash, content);
        Ok(())
    }
}

pub type DynStore = Arc<dyn BackingStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;

    #[tokio::test]
    async fn round_trips_through_in_memory_store() {
        let store = InMemoryStore::new();
        let content = ByteSeq::from(b"leaf-rlp-bytes".to_vec());
        let hash = keccak256(content.as_slice());
        store.put(hash, content.clone()).await.unwrap();
        assert_eq!(store.get(hash).await.unwrap(), Some(content));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_hash_returns_none() {
        let store = InMemoryStore::new();
        let hash = keccak256(b"never stored");
        assert_eq!(store.get(hash).await.unwrap(), None);
    }
}
