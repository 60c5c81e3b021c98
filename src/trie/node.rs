//! The sealed node representation: `Null | Leaf | Extension | Branch | Stored`.
//!
//! Grounded on `cancun::trie`'s `InternalNode` enum (`LeafNode |
//! ExtensionNode | BranchNode | None`) for the four-way split, generalized
//! with a fifth `Stored` variant and content-hash caching per
//! `risc0-zeth`'s `MptNode`/`CachedMptRef` (`trie/node.rs`, `trie/pointer.rs`).
//! RLP framing constants are carried over from `ethereum_rlp`.

use std::fmt;
use std::sync::Arc;

use futures::future::Shared;
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::bytes::ByteSeq;
use crate::crypto::{keccak256, Hash32};
use crate::rlp::{self, Value as RlpValue};

use super::error::TrieError;
use super::path::{self, Path};
use super::store::DynStore;

/// Values storable at a trie leaf or branch slot.
pub trait TrieValue: Clone + Send + Sync + 'static {
    fn to_bytes(&self) -> ByteSeq;
    fn from_bytes(bytes: &[u8]) -> Result<Self, TrieError>;
}

impl TrieValue for ByteSeq {
    fn to_bytes(&self) -> ByteSeq {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, TrieError> {
        Ok(ByteSeq::new(bytes.to_vec()))
    }
}

#[derive(Default)]
struct NodeCache {
    rlp: OnceCell<ByteSeq>,
    hash: OnceCell<Hash32>,
}

pub struct LeafNode<V> {
    pub path: Path,
    pub value: V,
    cache: NodeCache,
}

pub struct ExtensionNode<V> {
    pub path: Path,
    pub child: Node<V>,
    cache: NodeCache,
}

pub struct BranchNode<V> {
    pub children: [Node<V>; 16],
    pub value: Option<V>,
    cache: NodeCache,
}

type LoadFuture<V> = Shared<BoxFuture<'static, Result<Node<V>, Arc<TrieError>>>>;

/// A node known only by its hash, materialized lazily from a [`DynStore`].
///
/// `cache` plays the role of a soft/weak reference: once loaded, the
/// decoded node is kept reachable so repeat traversals skip the store, but
/// [`StoredNode::unload`] can drop it, since recomputing it from the store
/// is always safe (the hash is a pure function of the content).
pub struct StoredNode<V> {
    pub hash: Hash32,
    cache: RwLock<Option<Node<V>>>,
    pending: Mutex<Option<LoadFuture<V>>>,
    store: DynStore,
}

impl<V: TrieValue> StoredNode<V> {
    pub fn new(hash: Hash32, store: DynStore) -> Self {
        Self {
            hash,
            cache: RwLock::new(None),
            pending: Mutex::new(None),
            store,
        }
    }

    /// Builds a `Stored` wrapper whose decoded form is already known (used
    /// right after a factory persists a freshly built node), so the very
    /// next traversal doesn't have to round-trip through the store.
    pub fn preloaded(hash: Hash32, store: DynStore, decoded: Node<V>) -> Self {
        Self {
            hash,
            cache: RwLock::new(Some(decoded)),
            pending: Mutex::new(None),
            store,
        }
    }

    pub fn unload(&self) {
        *self.cache.write() = None;
    }

    /// Resolves the wrapped node, sharing one in-flight fetch across every
    /// concurrent caller racing to load the same hash (`futures::Shared`
    /// gives us the CAS-then-subscribe protocol for free: whichever caller
    /// wins the `pending` slot becomes the loader, everyone else polls the
    /// same future).
    pub async fn load(self: &Arc<Self>) -> Result<Node<V>, TrieError> {
        if let Some(node) = self.cache.read().clone() {
            return Ok(node);
        }
        let shared = {
            let mut pending = self.pending.lock();
            match pending.as_ref() {
                Some(fut) => fut.clone(),
                None => {
                    let this = self.clone();
                    let fut: BoxFuture<'static, Result<Node<V>, Arc<TrieError>>> =
                        async move { this.fetch_and_decode().await.map_err(Arc::new) }.boxed();
                    let shared = fut.shared();
                    *pending = Some(shared.clone());
                    shared
                }
            }
        };
        let result = shared.await;
        *self.pending.lock() = None;
        match result {
            Ok(node) => {
                *self.cache.write() = Some(node.clone());
                Ok(node)
            }
            Err(e) => Err((*e).clone()),
        }
    }

    async fn fetch_and_decode(&self) -> Result<Node<V>, TrieError> {
        if let Some(node) = self.cache.read().clone() {
            return Ok(node);
        }
        let bytes = self
            .store
            .get(self.hash)
            .await?
            .ok_or(TrieError::MissingNode { hash: self.hash })?;
        decode_node::<V>(bytes.as_slice(), self.store.clone())
    }
}

pub enum Node<V> {
    Null,
    Leaf(Arc<LeafNode<V>>),
    Extension(Arc<ExtensionNode<V>>),
    Branch(Arc<BranchNode<V>>),
    Stored(Arc<StoredNode<V>>),
}

impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        match self {
            Node::Null => Node::Null,
            Node::Leaf(l) => Node::Leaf(l.clone()),
            Node::Extension(e) => Node::Extension(e.clone()),
            Node::Branch(b) => Node::Branch(b.clone()),
            Node::Stored(s) => Node::Stored(s.clone()),
        }
    }
}

impl<V> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => write!(f, "Null"),
            Node::Leaf(l) => write!(f, "Leaf(path={:?})", l.path),
            Node::Extension(e) => write!(f, "Extension(path={:?})", e.path),
            Node::Branch(_) => write!(f, "Branch"),
            Node::Stored(s) => write!(f, "Stored({:?})", s.hash),
        }
    }
}

/// True when `a` and `b` are the identical allocation (or both `Null`),
/// used by the get visitor to decide whether a `Stored` wrapper resolved to
/// an unchanged value and can be returned unwrapped.
pub fn node_identical<V>(a: &Node<V>, b: &Node<V>) -> bool {
    match (a, b) {
        (Node::Null, Node::Null) => true,
        (Node::Leaf(x), Node::Leaf(y)) => Arc::ptr_eq(x, y),
        (Node::Extension(x), Node::Extension(y)) => Arc::ptr_eq(x, y),
        (Node::Branch(x), Node::Branch(y)) => Arc::ptr_eq(x, y),
        (Node::Stored(x), Node::Stored(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

pub(crate) fn empty_children<V>() -> [Node<V>; 16] {
    std::array::from_fn(|_| Node::Null)
}

/// The path a node contributes to its parent's combined path during
/// collapse/split bookkeeping (4.3's `replaceChild`/`replacePath`): `Leaf`
/// and `Extension` carry one, everything else behaves as if path is empty.
pub(crate) fn own_path<V>(node: &Node<V>) -> Path {
    match node {
        Node::Leaf(l) => l.path.clone(),
        Node::Extension(e) => e.path.clone(),
        _ => Vec::new(),
    }
}

impl<V: TrieValue> Node<V> {
    pub fn leaf(path: Path, value: V) -> Self {
        Node::Leaf(Arc::new(LeafNode { path, value, cache: NodeCache::default() }))
    }

    pub fn extension(path: Path, child: Node<V>) -> Self {
        Node::Extension(Arc::new(ExtensionNode { path, child, cache: NodeCache::default() }))
    }

    pub fn branch(children: [Node<V>; 16], value: Option<V>) -> Self {
        Node::Branch(Arc::new(BranchNode { children, value, cache: NodeCache::default() }))
    }

    /// Full RLP encoding of this node. Undefined for `Stored`: a stored node
    /// is only ever known by its hash until loaded.
    pub fn rlp(&self) -> Result<ByteSeq, TrieError> {
        match self {
            Node::Null => Ok(ByteSeq::new(vec![0x80])),
            Node::Leaf(l) => l
                .cache
                .rlp
                .get_or_try_init(|| {
                    let path_enc = path::encode(&l.path)?;
                    let mut body = Vec::new();
                    rlp::encode_bytes(&mut body, path_enc.as_slice());
                    rlp::encode_bytes(&mut body, l.value.to_bytes().as_slice());
                    Ok::<_, TrieError>(wrap_list(body))
                })
                .map(|v| v.clone()),
            Node::Extension(e) => e
                .cache
                .rlp
                .get_or_try_init(|| {
                    let path_enc = path::encode(&e.path)?;
                    let child_ref = e.child.rlp_ref()?;
                    let mut body = Vec::new();
                    rlp::encode_bytes(&mut body, path_enc.as_slice());
                    body.extend_from_slice(child_ref.as_slice());
                    Ok::<_, TrieError>(wrap_list(body))
                })
                .map(|v| v.clone()),
            Node::Branch(b) => b
                .cache
                .rlp
                .get_or_try_init(|| {
                    let mut body = Vec::new();
                    for child in &b.children {
                        body.extend_from_slice(child.rlp_ref()?.as_slice());
                    }
                    match &b.value {
                        Some(v) => rlp::encode_bytes(&mut body, v.to_bytes().as_slice()),
                        None => rlp::encode_bytes(&mut body, &[]),
                    }
                    Ok::<_, TrieError>(wrap_list(body))
                })
                .map(|v| v.clone()),
            Node::Stored(_) => Err(TrieError::RlpUndefinedForStored),
        }
    }

    /// RLP reference used by a parent: the inline encoding if it is shorter
    /// than 32 bytes, otherwise the RLP-wrapped keccak256 hash. A `Stored`
    /// node is always the latter by construction (it was only persisted
    /// because its encoding was >= 32 bytes).
    pub fn rlp_ref(&self) -> Result<ByteSeq, TrieError> {
        match self {
            Node::Stored(s) => {
                let mut out = Vec::new();
                rlp::encode_bytes(&mut out, &s.hash.0);
                Ok(ByteSeq::new(out))
            }
            _ => {
                let full = self.rlp()?;
                if full.len() < 32 {
                    Ok(full)
                } else {
                    let mut out = Vec::new();
                    rlp::encode_bytes(&mut out, self.hash()?.as_bytes());
                    Ok(ByteSeq::new(out))
                }
            }
        }
    }

    pub fn hash(&self) -> Result<Hash32, TrieError> {
        match self {
            Node::Stored(s) => Ok(s.hash),
            Node::Leaf(l) => l.cache.hash.get_or_try_init(|| Ok::<_, TrieError>(keccak256(self.rlp()?.as_slice()))).map(|v| *v),
            Node::Extension(e) => e.cache.hash.get_or_try_init(|| Ok::<_, TrieError>(keccak256(self.rlp()?.as_slice()))).map(|v| *v),
            Node::Branch(b) => b.cache.hash.get_or_try_init(|| Ok::<_, TrieError>(keccak256(self.rlp()?.as_slice()))).map(|v| *v),
            Node::Null => Ok(keccak256(&[0x80])),
        }
    }
}

fn wrap_list(body: Vec<u8>) -> ByteSeq {
    let mut out = Vec::new();
    rlp::encode_list_header(&mut out, body.len());
    out.extend_from_slice(&body);
    ByteSeq::new(out)
}

/// Decodes a persisted node's RLP form. Any nested list is an inline child
/// (decoded recursively); a 32-byte string child is a hash reference wrapped
/// as `Stored`; an empty string child is `Null`.
pub(crate) fn decode_node<V: TrieValue>(bytes: &[u8], store: DynStore) -> Result<Node<V>, TrieError> {
    let value = RlpValue::decode(bytes)?;
    match &value {
        RlpValue::Bytes(b) if b.is_empty() => Ok(Node::Null),
        RlpValue::List(items) => match items.len() {
            1 => match &items[0] {
                RlpValue::Bytes(b) if b.is_empty() => Ok(Node::Null),
                _ => Err(corrupt(bytes, "length-1 node must carry an empty value")),
            },
            2 => decode_leaf_or_extension::<V>(&items[0], &items[1], bytes, store),
            17 => decode_branch::<V>(items, bytes, store),
            n => Err(corrupt(bytes, &format!("node list has invalid arity {n}"))),
        },
        RlpValue::Bytes(_) => Err(corrupt(bytes, "top-level node must be a list or the empty string")),
    }
}

fn decode_leaf_or_extension<V: TrieValue>(
    path_item: &RlpValue,
    second: &RlpValue,
    original: &[u8],
    store: DynStore,
) -> Result<Node<V>, TrieError> {
    let path_bytes = path_item.as_bytes().map_err(|_| corrupt(original, "path item must be a byte string"))?;
    let decoded_path = path::decode(path_bytes.as_slice())?;
    if decoded_path.last() == Some(&path::TERMINATOR) {
        let value_bytes = second.as_bytes().map_err(|_| corrupt(original, "leaf value must be a byte string"))?;
        let value = V::from_bytes(value_bytes.as_slice())?;
        Ok(Node::leaf(decoded_path, value))
    } else {
        let child = child_from_rlp_value::<V>(second, store)?;
        Ok(Node::extension(decoded_path, child))
    }
}

fn decode_branch<V: TrieValue>(items: &[RlpValue], original: &[u8], store: DynStore) -> Result<Node<V>, TrieError> {
    let mut children = empty_children::<V>();
    for (i, item) in items[0..16].iter().enumerate() {
        children[i] = child_from_rlp_value::<V>(item, store.clone())?;
    }
    let value = match &items[16] {
        RlpValue::Bytes(b) if b.is_empty() => None,
        RlpValue::Bytes(b) => Some(V::from_bytes(b.as_slice())?),
        RlpValue::List(_) => return Err(corrupt(original, "branch value slot must be a byte string")),
    };
    Ok(Node::branch(children, value))
}

fn child_from_rlp_value<V: TrieValue>(value: &RlpValue, store: DynStore) -> Result<Node<V>, TrieError> {
    match value {
        RlpValue::List(_) => {
            let bytes = value.encode();
            decode_node::<V>(bytes.as_slice(), store)
        }
        RlpValue::Bytes(b) if b.is_empty() => Ok(Node::Null),
        RlpValue::Bytes(b) if b.len() == 32 => {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(b.as_slice());
            Ok(Node::Stored(Arc::new(StoredNode::new(Hash32(hash), store))))
        }
        RlpValue::Bytes(b) => Err(TrieError::Corrupt {
            hash: keccak256(value.encode().as_slice()),
            reason: format!("child reference has invalid length {}", b.len()),
        }),
    }
}

fn corrupt(original: &[u8], reason: &str) -> TrieError {
    TrieError::Corrupt { hash: keccak256(original), reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::store::InMemoryStore;

    #[test]
    fn invalid_length_child_reference_names_its_own_hash() {
        let store: DynStore = Arc::new(InMemoryStore::new());
        let bogus = RlpValue::Bytes(vec![1u8; 17].into());
        let expected_hash = keccak256(bogus.encode().as_slice());

        let err = child_from_rlp_value::<ByteSeq>(&bogus, store).unwrap_err();
        match err {
            TrieError::Corrupt { hash, .. } => assert_eq!(hash, expected_hash),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }
}
