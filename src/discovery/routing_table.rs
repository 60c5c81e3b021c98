//! Routing table: candidate set for `FindNeighbors`/`Neighbors` answers.

use parking_lot::Mutex;

use super::node_id::NodeId;
use super::peer::Peer;

pub trait RoutingTable: Send + Sync {
    fn add(&self, peer: Peer) -> bool;
    fn contains(&self, peer: &Peer) -> bool;
    fn nearest(&self, target: &NodeId) -> Vec<Peer>;
    fn clear(&self);
}

/// Rejects new members once `capacity` is reached; `nearest` returns the
/// current membership in insertion order.
pub struct BoundedTable {
    capacity: usize,
    members: Mutex<Vec<Peer>>,
}

impl BoundedTable {
    pub fn new(capacity: usize) -> Self {
        BoundedTable { capacity, members: Mutex::new(Vec::new()) }
    }
}

impl RoutingTable for BoundedTable {
    fn add(&self, peer: Peer) -> bool {
        let mut members = self.members.lock();
        if members.iter().any(|p| p.ptr_eq(&peer)) {
            return true;
        }
        if members.len() >= self.capacity {
            return false;
        }
        members.push(peer);
        true
    }

    fn contains(&self, peer: &Peer) -> bool {
        self.members.lock().iter().any(|p| p.ptr_eq(peer))
    }

    fn nearest(&self, _target: &NodeId) -> Vec<Peer> {
        self.members.lock().clone()
    }

    fn clear(&self) {
        self.members.lock().clear();
    }
}

/// Refines `BoundedTable` by ordering `nearest` results on XOR distance to
/// the target, the Kademlia metric a discv4 routing table actually uses.
pub struct KademliaTable {
    inner: BoundedTable,
}

impl KademliaTable {
    pub fn new(capacity: usize) -> Self {
        KademliaTable { inner: BoundedTable::new(capacity) }
    }
}

impl RoutingTable for KademliaTable {
    fn add(&self, peer: Peer) -> bool {
        self.inner.add(peer)
    }

    fn contains(&self, peer: &Peer) -> bool {
        self.inner.contains(peer)
    }

    fn nearest(&self, target: &NodeId) -> Vec<Peer> {
        let mut members = self.inner.members.lock().clone();
        members.sort_by_key(|peer| peer.node_id().distance(target));
        members
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: u8) -> Peer {
        Peer::new(NodeId([id; 64]), None)
    }

    #[test]
    fn bounded_table_rejects_past_capacity() {
        let table = BoundedTable::new(2);
        assert!(table.add(peer(1)));
        assert!(table.add(peer(2)));
        assert!(!table.add(peer(3)));
        assert_eq!(table.nearest(&NodeId([0u8; 64])).len(), 2);
    }

    #[test]
    fn bounded_table_readd_of_same_peer_succeeds() {
        let table = BoundedTable::new(1);
        let p = peer(9);
        assert!(table.add(p.clone()));
        assert!(table.add(p));
    }

    #[test]
    fn kademlia_table_orders_by_xor_distance() {
        let table = KademliaTable::new(8);
        let target = NodeId([0u8; 64]);
        let far = Peer::new(NodeId([0xff; 64]), None);
        let near = Peer::new(NodeId([0x01; 64]), None);
        table.add(far.clone());
        table.add(near.clone());

        let ordered = table.nearest(&target);
        assert!(ordered[0].ptr_eq(&near));
        assert!(ordered[1].ptr_eq(&far));
    }

    #[test]
    fn clear_empties_the_table() {
        let table = BoundedTable::new(4);
        table.add(peer(1));
        table.clear();
        assert!(table.nearest(&NodeId([0u8; 64])).is_empty());
    }
}
