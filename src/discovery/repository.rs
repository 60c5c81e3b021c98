//! The canonical peer store: one `Peer` per `NodeId`, with observer
//! notifications fired synchronously under the peer's own lock.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::endpoint::Endpoint;
use super::enode::EnodeUri;
use super::error::DiscoveryError;
use super::node_id::NodeId;
use super::peer::Peer;

type PeerObserver = Box<dyn Fn(&Peer) + Send + Sync>;
type CapabilitiesObserver = Box<dyn Fn(&Peer, &HashSet<String>) + Send + Sync>;

#[derive(Default)]
struct Observers {
    added: Vec<PeerObserver>,
    active: Vec<PeerObserver>,
    inactive: Vec<PeerObserver>,
    capabilities_changed: Vec<CapabilitiesObserver>,
}

pub struct PeerRepository {
    peers: Mutex<HashMap<NodeId, Peer>>,
    observers: RwLock<Observers>,
}

impl Default for PeerRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRepository {
    pub fn new() -> Self {
        PeerRepository { peers: Mutex::new(HashMap::new()), observers: RwLock::new(Observers::default()) }
    }

    /// True if `node_id` is already known, without creating it.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.peers.lock().contains_key(&node_id)
    }

    /// Creates the peer on first sight, with no known endpoint.
    pub fn get(&self, node_id: NodeId) -> Peer {
        let existing = self.peers.lock().get(&node_id).cloned();
        if let Some(peer) = existing {
            return peer;
        }
        self.insert_new(node_id, None)
    }

    /// Creates the peer if absent; if present and inactive, updates its
    /// endpoint. Active peers keep their existing endpoint.
    pub fn get_with_endpoint(&self, node_id: NodeId, endpoint: Endpoint) -> Peer {
        let existing = self.peers.lock().get(&node_id).cloned();
        match existing {
            Some(peer) => {
                if !peer.is_active() {
                    peer.set_endpoint(endpoint);
                }
                peer
            }
            None => self.insert_new(node_id, Some(endpoint)),
        }
    }

    pub fn get_by_uri(&self, uri: &EnodeUri) -> Result<Peer, DiscoveryError> {
        let endpoint = Endpoint::new(uri.addr.ip(), uri.udp_port, uri.tcp_port())?;
        Ok(self.get_with_endpoint(uri.node_id, endpoint))
    }

    fn insert_new(&self, node_id: NodeId, endpoint: Option<Endpoint>) -> Peer {
        let mut peers = self.peers.lock();
        if let Some(peer) = peers.get(&node_id) {
            return peer.clone();
        }
        let peer = Peer::new(node_id, endpoint);
        peers.insert(node_id, peer.clone());
        drop(peers);
        peer.with_mutation_lock(|| {
            for observer in &self.observers.read().added {
                observer(&peer);
            }
        });
        peer
    }

    pub fn set_active(&self, peer: &Peer, endpoint: Endpoint) {
        peer.with_mutation_lock(|| {
            peer.set_active(endpoint);
            for observer in &self.observers.read().active {
                observer(peer);
            }
        });
    }

    pub fn set_inactive(&self, peer: &Peer) {
        peer.with_mutation_lock(|| {
            let prior_capabilities = peer.set_inactive();
            for observer in &self.observers.read().capabilities_changed {
                observer(peer, &prior_capabilities);
            }
            for observer in &self.observers.read().inactive {
                observer(peer);
            }
        });
    }

    pub fn set_capabilities(&self, peer: &Peer, capabilities: HashSet<String>) {
        peer.with_mutation_lock(|| {
            if let Some(prior) = peer.set_capabilities(capabilities) {
                for observer in &self.observers.read().capabilities_changed {
                    observer(peer, &prior);
                }
            }
        });
    }

    pub fn on_peer_added(&self, observer: impl Fn(&Peer) + Send + Sync + 'static) {
        self.observers.write().added.push(Box::new(observer));
    }

    pub fn on_peer_active(&self, observer: impl Fn(&Peer) + Send + Sync + 'static) {
        self.observers.write().active.push(Box::new(observer));
    }

    pub fn on_peer_inactive(&self, observer: impl Fn(&Peer) + Send + Sync + 'static) {
        self.observers.write().inactive.push(Box::new(observer));
    }

    pub fn on_peer_capabilities_changed(&self, observer: impl Fn(&Peer, &HashSet<String>) + Send + Sync + 'static) {
        self.observers.write().capabilities_changed.push(Box::new(observer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port, port).unwrap()
    }

    #[test]
    fn get_is_idempotent_per_node_id() {
        let repo = PeerRepository::new();
        let a = repo.get(NodeId([1u8; 64]));
        let b = repo.get(NodeId([1u8; 64]));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn added_observer_fires_once_per_new_peer() {
        let repo = PeerRepository::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        repo.on_peer_added(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        repo.get(NodeId([2u8; 64]));
        repo.get(NodeId([2u8; 64]));
        repo.get(NodeId([3u8; 64]));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn active_peer_endpoint_is_not_overwritten() {
        let repo = PeerRepository::new();
        let peer = repo.get_with_endpoint(NodeId([4u8; 64]), endpoint(30303));
        repo.set_active(&peer, endpoint(30303));
        let updated = repo.get_with_endpoint(NodeId([4u8; 64]), endpoint(40404));
        assert_eq!(updated.endpoint().unwrap().udp_port.get(), 30303);
    }

    #[test]
    fn inactive_peer_endpoint_is_updated() {
        let repo = PeerRepository::new();
        repo.get_with_endpoint(NodeId([5u8; 64]), endpoint(30303));
        let updated = repo.get_with_endpoint(NodeId([5u8; 64]), endpoint(40404));
        assert_eq!(updated.endpoint().unwrap().udp_port.get(), 40404);
    }

    #[test]
    fn set_inactive_notifies_capabilities_then_inactive() {
        let repo = PeerRepository::new();
        let peer = repo.get(NodeId([6u8; 64]));
        peer.set_active(endpoint(30303));
        let mut caps = HashSet::new();
        caps.insert("eth/68".to_string());
        repo.set_capabilities(&peer, caps.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_caps = seen.clone();
        repo.on_peer_capabilities_changed(move |_, prior| {
            seen_caps.lock().push(format!("caps:{}", prior.len()));
        });
        let seen_inactive = seen.clone();
        repo.on_peer_inactive(move |_| {
            seen_inactive.lock().push("inactive".to_string());
        });

        repo.set_inactive(&peer);
        assert_eq!(*seen.lock(), vec!["caps:1".to_string(), "inactive".to_string()]);
        assert!(peer.capabilities().is_empty());
    }

    #[test]
    fn observer_reading_peer_state_back_does_not_deadlock() {
        let repo = PeerRepository::new();
        repo.on_peer_active(|peer| {
            assert!(peer.is_active());
            assert!(peer.endpoint().is_some());
        });
        let peer = repo.get(NodeId([7u8; 64]));
        repo.set_active(&peer, endpoint(30303));
    }
}
