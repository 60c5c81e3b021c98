//! Canonical, mutation-serialized peer handles.
//!
//! Only `PeerRepository` constructs these; everywhere else a `Peer` is a
//! cheap `Arc` clone whose identity is pointer equality, mirroring the
//! source system's reliance on object identity for routing-table
//! membership and observer dispatch (see `PeerLifecycleManager`).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::endpoint::Endpoint;
use super::node_id::NodeId;

#[derive(Debug, Default)]
struct PeerState {
    endpoint: Option<Endpoint>,
    active: bool,
    capabilities: HashSet<String>,
    last_seen: Option<Instant>,
}

struct PeerInner {
    node_id: NodeId,
    state: Mutex<PeerState>,
    /// Serializes a full mutate-then-notify sequence against concurrent
    /// mutations of this same peer. Kept separate from `state` so that an
    /// observer reading the peer back (`endpoint()`, `is_active()`, ...)
    /// while still inside the notify step doesn't deadlock against its own
    /// mutation.
    mutation: Mutex<()>,
}

/// A handle to a peer record. Clones share identity; `Peer::ptr_eq` tells
/// two handles apart from two peers with (coincidentally) equal state.
#[derive(Clone)]
pub struct Peer(Arc<PeerInner>);

impl Peer {
    pub(super) fn new(node_id: NodeId, endpoint: Option<Endpoint>) -> Self {
        Peer(Arc::new(PeerInner {
            node_id,
            state: Mutex::new(PeerState { endpoint, ..Default::default() }),
            mutation: Mutex::new(()),
        }))
    }

    pub fn node_id(&self) -> NodeId {
        self.0.node_id
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.0.state.lock().endpoint
    }

    pub fn is_active(&self) -> bool {
        self.0.state.lock().active
    }

    pub fn capabilities(&self) -> HashSet<String> {
        self.0.state.lock().capabilities.clone()
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.0.state.lock().last_seen
    }

    pub fn ptr_eq(&self, other: &Peer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(super) fn touch(&self) {
        self.0.state.lock().last_seen = Some(Instant::now());
    }

    /// Runs `f` with this peer's mutation lock held, so a caller's
    /// mutate-then-notify sequence can't interleave with another mutation of
    /// the same peer: observer dispatch order is then guaranteed to match
    /// mutation order.
    pub(super) fn with_mutation_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.0.mutation.lock();
        f()
    }

    /// Sets the endpoint unconditionally; callers enforce the
    /// update-only-while-inactive rule before calling this.
    pub(super) fn set_endpoint(&self, endpoint: Endpoint) {
        self.0.state.lock().endpoint = Some(endpoint);
    }

    pub(super) fn set_active(&self, endpoint: Endpoint) {
        let mut state = self.0.state.lock();
        state.active = true;
        state.endpoint = Some(endpoint);
    }

    /// Deactivates the peer, returning the capability set it held just
    /// before being cleared (for the capabilities-changed observer).
    pub(super) fn set_inactive(&self) -> HashSet<String> {
        let mut state = self.0.state.lock();
        state.active = false;
        std::mem::take(&mut state.capabilities)
    }

    /// Replaces the capability set while active, returning the previous one.
    pub(super) fn set_capabilities(&self, caps: HashSet<String>) -> Option<HashSet<String>> {
        let mut state = self.0.state.lock();
        if !state.active {
            return None;
        }
        Some(std::mem::replace(&mut state.capabilities, caps))
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.0.state.lock();
        f.debug_struct("Peer")
            .field("node_id", &self.0.node_id)
            .field("endpoint", &state.endpoint)
            .field("active", &state.active)
            .finish()
    }
}
