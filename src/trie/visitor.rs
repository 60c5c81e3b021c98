//! Pure get/put/remove traversal over a `Node<V>` tree.
//!
//! These functions never mutate and never decide persistence; they call
//! into a [`NodeFactory`] for every new node they need and trust it to
//! decide what (if anything) gets written to a backing store. Grounded on
//! `cancun::trie::patricialize`/`prepare_trie` for the overall split/
//! collapse shape, reworked from that module's flat-`BTreeMap` rebuild into
//! an incremental per-key visitor since this node tree is persistent and
//! shares structure across versions.

use futures::future::{BoxFuture, FutureExt};

use crate::bytes::common_prefix_len;

use super::error::TrieError;
use super::factory::NodeFactory;
use super::node::{empty_children, own_path, node_identical, Node, TrieValue};
use super::path::{Path, TERMINATOR};

pub fn get<'a, V: TrieValue>(node: &'a Node<V>, path: &'a [u8]) -> BoxFuture<'a, Result<Node<V>, TrieError>> {
    async move {
        match node {
            Node::Null => Ok(Node::Null),
            Node::Leaf(l) => {
                if common_prefix_len(&l.path, path) == l.path.len() {
                    Ok(node.clone())
                } else {
                    Ok(Node::Null)
                }
            }
            Node::Extension(e) => {
                let k = common_prefix_len(&e.path, path);
                if k < e.path.len() {
                    Ok(Node::Null)
                } else {
                    get(&e.child, &path[k..]).await
                }
            }
            Node::Branch(b) => {
                if path.first() == Some(&TERMINATOR) {
                    Ok(node.clone())
                } else {
                    let idx = path[0] as usize;
                    get(&b.children[idx], &path[1..]).await
                }
            }
            Node::Stored(s) => {
                let loaded = s.load().await?;
                let result = get(&loaded, path).await?;
                if node_identical(&result, &loaded) {
                    Ok(node.clone())
                } else {
                    Ok(result)
                }
            }
        }
    }
    .boxed()
}

pub fn put<'a, V: TrieValue>(
    node: &'a Node<V>,
    path: &'a [u8],
    value: V,
    factory: &'a dyn NodeFactory<V>,
) -> BoxFuture<'a, Result<Node<V>, TrieError>> {
    async move {
        match node {
            Node::Null => factory.make_leaf(path.to_vec(), value).await,
            Node::Leaf(l) => {
                let k = common_prefix_len(&l.path, path);
                if k == l.path.len() && k == path.len() {
                    factory.make_leaf(l.path.clone(), value).await
                } else {
                    let existing_idx = l.path[k];
                    let new_idx = path[k];
                    let existing_leaf = factory.make_leaf(l.path[k + 1..].to_vec(), l.value.clone()).await?;
                    let new_leaf = factory.make_leaf(path[k + 1..].to_vec(), value).await?;
                    let mut children = empty_children();
                    children[existing_idx as usize] = existing_leaf;
                    children[new_idx as usize] = new_leaf;
                    let branch = factory.make_branch(children, None).await?;
                    if k > 0 {
                        factory.make_extension(path[0..k].to_vec(), branch).await
                    } else {
                        Ok(branch)
                    }
                }
            }
            Node::Extension(e) => {
                let k = common_prefix_len(&e.path, path);
                if k == e.path.len() {
                    let new_child = put(&e.child, &path[k..], value, factory).await?;
                    ext_replace_child(&e.path, new_child, factory).await
                } else {
                    let ext_idx = e.path[k];
                    let remaining_ext_path = e.path[k + 1..].to_vec();
                    let shortened = if remaining_ext_path.is_empty() {
                        e.child.clone()
                    } else {
                        factory.make_extension(remaining_ext_path, e.child.clone()).await?
                    };
                    let mut children = empty_children();
                    children[ext_idx as usize] = shortened;
                    let new_idx = path[k];
                    let new_leaf = factory.make_leaf(path[k + 1..].to_vec(), value).await?;
                    children[new_idx as usize] = new_leaf;
                    let branch = factory.make_branch(children, None).await?;
                    if k > 0 {
                        factory.make_extension(path[0..k].to_vec(), branch).await
                    } else {
                        Ok(branch)
                    }
                }
            }
            Node::Branch(b) => {
                if path.first() == Some(&TERMINATOR) {
                    factory.make_branch(b.children.clone(), Some(value)).await
                } else {
                    let idx = path[0] as usize;
                    let new_child = put(&b.children[idx], &path[1..], value, factory).await?;
                    branch_replace_child(b, idx, new_child, factory).await
                }
            }
            Node::Stored(s) => {
                let loaded = s.load().await?;
                put(&loaded, path, value, factory).await
            }
        }
    }
    .boxed()
}

pub fn remove<'a, V: TrieValue>(
    node: &'a Node<V>,
    path: &'a [u8],
    factory: &'a dyn NodeFactory<V>,
) -> BoxFuture<'a, Result<Node<V>, TrieError>> {
    async move {
        match node {
            Node::Null => Ok(Node::Null),
            Node::Leaf(l) => {
                if common_prefix_len(&l.path, path) == l.path.len() {
                    Ok(Node::Null)
                } else {
                    Ok(node.clone())
                }
            }
            Node::Extension(e) => {
                let k = common_prefix_len(&e.path, path);
                if k < e.path.len() {
                    Ok(node.clone())
                } else {
                    let new_child = remove(&e.child, &path[k..], factory).await?;
                    ext_replace_child(&e.path, new_child, factory).await
                }
            }
            Node::Branch(b) => {
                if path.first() == Some(&TERMINATOR) {
                    branch_remove_value(b, factory).await
                } else {
                    let idx = path[0] as usize;
                    let new_child = remove(&b.children[idx], &path[1..], factory).await?;
                    branch_replace_child(b, idx, new_child, factory).await
                }
            }
            Node::Stored(s) => {
                let loaded = s.load().await?;
                remove(&loaded, path, factory).await
            }
        }
    }
    .boxed()
}

/// An `Extension`'s `replaceChild`: folds the extension's own path together
/// with whatever path the (possibly restructured) child now carries.
async fn ext_replace_child<V: TrieValue>(
    ep: &[u8],
    new_child: Node<V>,
    factory: &dyn NodeFactory<V>,
) -> Result<Node<V>, TrieError> {
    let mut combined = ep.to_vec();
    combined.extend_from_slice(&own_path(&new_child));
    replace_path(new_child, combined, factory).await
}

/// Rewrites `node`'s path to `new_path`, the operation each node kind
/// interprets differently: a leaf gets a wholesale path swap, an extension
/// merges (or, if the combined path is empty, collapses into its child), a
/// branch or anything pathless gets wrapped in a new extension.
async fn replace_path<V: TrieValue>(
    node: Node<V>,
    new_path: Path,
    factory: &dyn NodeFactory<V>,
) -> Result<Node<V>, TrieError> {
    match node {
        Node::Null => Ok(Node::Null),
        Node::Leaf(l) => factory.make_leaf(new_path, l.value.clone()).await,
        Node::Extension(ref e) => {
            if new_path.is_empty() {
                Ok(e.child.clone())
            } else {
                factory.make_extension(new_path, e.child.clone()).await
            }
        }
        _ => {
            if new_path.is_empty() {
                Ok(node)
            } else {
                factory.make_extension(new_path, node).await
            }
        }
    }
}

async fn collapse_single_child<V: TrieValue>(
    index: usize,
    only_child: Node<V>,
    factory: &dyn NodeFactory<V>,
) -> Result<Node<V>, TrieError> {
    let mut path = vec![index as u8];
    path.extend_from_slice(&own_path(&only_child));
    replace_path(only_child, path, factory).await
}

async fn branch_replace_child<V: TrieValue>(
    b: &super::node::BranchNode<V>,
    index: usize,
    new_child: Node<V>,
    factory: &dyn NodeFactory<V>,
) -> Result<Node<V>, TrieError> {
    let mut children = b.children.clone();
    children[index] = new_child.clone();
    if matches!(new_child, Node::Null) {
        if b.value.is_some() && children.iter().all(|c| matches!(c, Node::Null)) {
            return factory.make_leaf(vec![index as u8], b.value.clone().unwrap()).await;
        }
        if b.value.is_none() {
            let non_null: Vec<usize> =
                children.iter().enumerate().filter(|(_, c)| !matches!(c, Node::Null)).map(|(i, _)| i).collect();
            if non_null.len() == 1 {
                let j = non_null[0];
                return collapse_single_child(j, children[j].clone(), factory).await;
            }
        }
    }
    factory.make_branch(children, b.value.clone()).await
}

async fn branch_remove_value<V: TrieValue>(
    b: &super::node::BranchNode<V>,
    factory: &dyn NodeFactory<V>,
) -> Result<Node<V>, TrieError> {
    let non_null: Vec<usize> =
        b.children.iter().enumerate().filter(|(_, c)| !matches!(c, Node::Null)).map(|(i, _)| i).collect();
    if non_null.len() == 1 {
        let j = non_null[0];
        collapse_single_child(j, b.children[j].clone(), factory).await
    } else {
        factory.make_branch(b.children.clone(), None).await
    }
}
