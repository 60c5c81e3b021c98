//! Drives peer state off the four inbound packet kinds plus bootstrap
//! initialization, per the sequencing described for each event: ping new
//! bootstrap peers, pong their pings, ask newly-active peers for neighbors,
//! and chase any neighbors they don't already know about.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::crypto::secp256k1::{SigningKey, VerifyingKey};
use crate::crypto::Hash32;

use super::endpoint::Endpoint;
use super::enode::EnodeUri;
use super::error::DiscoveryError;
use super::node_id::NodeId;
use super::packet::{FindNeighborsPayload, NeighborsPayload, Packet, PingPayload, Payload, PongPayload};
use super::peer::Peer;
use super::repository::PeerRepository;
use super::routing_table::RoutingTable;
use super::transport::Transport;
use crate::expiring_map::ExpiringMap;

pub const EXPIRATION_PERIOD_MS: u64 = 3000;
pub const PONG_EXPIRATION_MS: u64 = 60000;
pub const MAX_NEIGHBORS: usize = 5;

pub struct PeerLifecycleManager {
    repository: Arc<PeerRepository>,
    routing_table: Arc<dyn RoutingTable>,
    awaiting_pongs: ExpiringMap<Hash32, NodeId>,
    signing_key: SigningKey,
    local_node_id: NodeId,
    local_endpoint: Endpoint,
    transport: Arc<dyn Transport>,
}

fn node_id_of(key: &SigningKey) -> NodeId {
    let verifying_key = VerifyingKey::from(key);
    let point = verifying_key.to_encoded_point(false);
    let mut out = [0u8; 64];
    out.copy_from_slice(&point.as_bytes()[1..]);
    NodeId(out)
}

static PROCESS_EPOCH: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);

/// Real discv4 expirations are unix seconds; nothing in this crate checks
/// a received expiration against wall-clock time, so we carry milliseconds
/// since process start instead of depending on `SystemTime`.
fn expiration(now: Instant, period_ms: u64) -> u64 {
    now.duration_since(*PROCESS_EPOCH).as_millis() as u64 + period_ms
}

impl PeerLifecycleManager {
    pub fn new(
        repository: Arc<PeerRepository>,
        routing_table: Arc<dyn RoutingTable>,
        signing_key: SigningKey,
        local_endpoint: Endpoint,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let local_node_id = node_id_of(&signing_key);
        let routing_table_for_observer = routing_table.clone();
        let local_node_id_for_observer = local_node_id;
        repository.on_peer_added(move |peer: &Peer| {
            if peer.node_id() == local_node_id_for_observer {
                return;
            }
            if peer.endpoint().is_some() {
                routing_table_for_observer.add(peer.clone());
            }
        });

        PeerLifecycleManager {
            repository,
            routing_table,
            awaiting_pongs: ExpiringMap::new(),
            signing_key,
            local_node_id,
            local_endpoint,
            transport,
        }
    }

    pub fn local_node_id(&self) -> NodeId {
        self.local_node_id
    }

    pub fn repository(&self) -> &Arc<PeerRepository> {
        &self.repository
    }

    /// Pings every bootstrap peer. `repository.get_by_uri` creates the peer
    /// (firing the routing-table-maintenance observer registered in `new`)
    /// before we address a Ping to it.
    pub async fn init(&self, bootstrap: &[EnodeUri]) -> Result<(), DiscoveryError> {
        for uri in bootstrap {
            let peer = self.repository.get_by_uri(uri)?;
            if let Some(endpoint) = peer.endpoint() {
                self.send_ping(&peer, endpoint).await?;
            }
        }
        Ok(())
    }

    async fn send_ping(&self, peer: &Peer, endpoint: Endpoint) -> Result<(), DiscoveryError> {
        let now = Instant::now();
        let payload = Payload::Ping(PingPayload {
            from: self.local_endpoint,
            to: endpoint,
            expiration: expiration(now, EXPIRATION_PERIOD_MS),
        });
        let packet = Packet::produce(payload, &self.signing_key)?;
        let target = socket_addr(endpoint.host, endpoint.udp_port.get());
        self.awaiting_pongs.put_with_expiry(
            packet.hash,
            peer.node_id(),
            now + Duration::from_millis(PONG_EXPIRATION_MS),
            now,
        );
        self.transport.send_to(target, packet.to_bytes()).await
    }

    async fn send_find_neighbors(&self, endpoint: Endpoint) -> Result<(), DiscoveryError> {
        let payload = Payload::FindNeighbors(FindNeighborsPayload {
            target: self.local_node_id,
            expiration: expiration(Instant::now(), EXPIRATION_PERIOD_MS),
        });
        let packet = Packet::produce(payload, &self.signing_key)?;
        let target = socket_addr(endpoint.host, endpoint.udp_port.get());
        self.transport.send_to(target, packet.to_bytes()).await
    }

    /// Decodes and dispatches one inbound datagram. Decode failures are
    /// logged and dropped, never propagated.
    pub async fn handle_datagram(&self, from: SocketAddr, bytes: &[u8]) {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "dropping malformed discovery packet");
                return;
            }
        };
        let result = match packet.payload.clone() {
            Payload::Ping(ping) => self.handle_ping(packet.sender, from, ping, packet.hash).await,
            Payload::Pong(pong) => self.handle_pong(packet.sender, pong).await,
            Payload::FindNeighbors(find) => self.handle_find_neighbors(packet.sender, find).await,
            Payload::Neighbors(neighbors) => self.handle_neighbors(neighbors).await,
        };
        if let Err(e) = result {
            warn!(error = %e, "dropping discovery packet after send failure");
        }
    }

    async fn handle_ping(&self, sender: NodeId, _from: SocketAddr, ping: PingPayload, ping_hash: Hash32) -> Result<(), DiscoveryError> {
        let peer = self.repository.get_with_endpoint(sender, ping.from);
        peer.touch();
        if let Some(endpoint) = peer.endpoint() {
            let payload = Payload::Pong(PongPayload { to: endpoint, ping_hash, expiration: expiration(Instant::now(), EXPIRATION_PERIOD_MS) });
            let packet = Packet::produce(payload, &self.signing_key)?;
            let target = socket_addr(endpoint.host, endpoint.udp_port.get());
            self.transport.send_to(target, packet.to_bytes()).await?;
        }
        Ok(())
    }

    async fn handle_pong(&self, sender: NodeId, pong: PongPayload) -> Result<(), DiscoveryError> {
        let now = Instant::now();
        // Conditional on the stored nodeId matching `sender`, not just the
        // hash: a forged Pong carrying someone else's legitimately-observed
        // ping_hash must not be able to evict the real awaiting-pong entry.
        let matched = self.awaiting_pongs.remove_if(&pong.ping_hash, now, &sender).is_some();
        if !matched {
            return Ok(());
        }
        let peer = self.repository.get(sender);
        peer.touch();
        // `pong.to` echoes back the endpoint the ponger believes *we* are
        // reachable at (the standard discv4 endpoint-proof field); the
        // sender's own endpoint is whatever we already recorded for them,
        // so `pong.to` itself plays no further part here.
        if let (true, Some(endpoint)) = (self.routing_table.contains(&peer), peer.endpoint()) {
            self.repository.set_active(&peer, endpoint);
            self.send_find_neighbors(endpoint).await?;
        }
        Ok(())
    }

    async fn handle_find_neighbors(&self, sender: NodeId, find: FindNeighborsPayload) -> Result<(), DiscoveryError> {
        let peer = self.repository.get(sender);
        if !peer.is_active() {
            return Ok(());
        }
        let Some(endpoint) = peer.endpoint() else { return Ok(()) };
        peer.touch();
        let nodes: Vec<(NodeId, Endpoint)> = self
            .routing_table
            .nearest(&find.target)
            .into_iter()
            .filter_map(|candidate| candidate.endpoint().map(|ep| (candidate.node_id(), ep)))
            .take(MAX_NEIGHBORS)
            .collect();
        let payload = Payload::Neighbors(NeighborsPayload { nodes, expiration: expiration(Instant::now(), EXPIRATION_PERIOD_MS) });
        let packet = Packet::produce(payload, &self.signing_key)?;
        let target = socket_addr(endpoint.host, endpoint.udp_port.get());
        self.transport.send_to(target, packet.to_bytes()).await
    }

    /// Chases every neighbor we don't already know about: each genuinely new
    /// peer is pinged immediately, exactly like a bootstrap peer in `init`.
    async fn handle_neighbors(&self, neighbors: NeighborsPayload) -> Result<(), DiscoveryError> {
        for (node_id, endpoint) in neighbors.nodes {
            if node_id == self.local_node_id {
                continue;
            }
            let already_known = self.repository.contains(node_id);
            let peer = self.repository.get_with_endpoint(node_id, endpoint);
            if !already_known {
                self.send_ping(&peer, endpoint).await?;
            }
        }
        Ok(())
    }
}

fn socket_addr(host: std::net::IpAddr, port: u16) -> SocketAddr {
    SocketAddr::new(host, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::routing_table::BoundedTable;
    use crate::discovery::transport::InMemoryNetwork;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port, port).unwrap()
    }

    fn build_manager(key_seed: u8, port: u16, network: &Arc<InMemoryNetwork>) -> (PeerLifecycleManager, Arc<InMemoryTransportHandle>) {
        let key = SigningKey::from_bytes(&[key_seed; 32].into()).unwrap();
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let transport = Arc::new(network.register(addr));
        let manager = PeerLifecycleManager::new(
            Arc::new(PeerRepository::new()),
            Arc::new(BoundedTable::new(16)),
            key,
            endpoint(port),
            transport.clone(),
        );
        (manager, transport)
    }

    type InMemoryTransportHandle = crate::discovery::transport::InMemoryTransport;

    #[tokio::test]
    async fn ping_pong_round_trip_activates_both_peers() {
        let network = InMemoryNetwork::new();
        let (manager_a, transport_a) = build_manager(1, 40101, &network);
        let (manager_b, transport_b) = build_manager(2, 40102, &network);

        let id_a = manager_a.local_node_id();
        let id_b = manager_b.local_node_id();

        let hex_a = crate::bytes::hex_encode(id_a.as_bytes());
        let hex_b = crate::bytes::hex_encode(id_b.as_bytes());
        let uri_b: EnodeUri = format!("enode://{hex_b}@127.0.0.1:40102").parse().unwrap();
        let uri_a: EnodeUri = format!("enode://{hex_a}@127.0.0.1:40101").parse().unwrap();

        manager_a.init(&[uri_b]).await.unwrap();
        manager_b.init(&[uri_a]).await.unwrap();

        for (from, bytes) in transport_b.try_drain() {
            manager_b.handle_datagram(from, bytes.as_slice()).await;
        }
        for (from, bytes) in transport_a.try_drain() {
            manager_a.handle_datagram(from, bytes.as_slice()).await;
        }

        for (from, bytes) in transport_a.try_drain() {
            manager_a.handle_datagram(from, bytes.as_slice()).await;
        }
        for (from, bytes) in transport_b.try_drain() {
            manager_b.handle_datagram(from, bytes.as_slice()).await;
        }

        assert!(manager_a.repository.get(id_b).is_active());
        assert!(manager_b.repository.get(id_a).is_active());
    }

    #[tokio::test]
    async fn unsolicited_pong_does_not_activate_sender() {
        let network = InMemoryNetwork::new();
        let (manager_a, _transport_a) = build_manager(3, 40201, &network);
        let (manager_b, transport_b) = build_manager(4, 40202, &network);

        let id_b = manager_b.local_node_id();
        let key_b = SigningKey::from_bytes(&[4u8; 32].into()).unwrap();
        let unsolicited = Packet::produce(
            Payload::Pong(PongPayload { to: endpoint(40201), ping_hash: Hash32([0u8; 32]), expiration: 1 }),
            &key_b,
        )
        .unwrap();

        manager_a.handle_datagram("127.0.0.1:40202".parse().unwrap(), unsolicited.to_bytes().as_slice()).await;
        assert!(!manager_a.repository.get(id_b).is_active());
        let _ = transport_b;
    }

    #[tokio::test]
    async fn neighbors_entries_for_unknown_peers_trigger_a_ping() {
        let network = InMemoryNetwork::new();
        let (manager_a, transport_a) = build_manager(5, 40401, &network);
        let reporter_key = SigningKey::from_bytes(&[6u8; 32].into()).unwrap();

        let new_peer_key = SigningKey::from_bytes(&[7u8; 32].into()).unwrap();
        let new_peer_id = node_id_of(&new_peer_key);
        let new_peer_endpoint = endpoint(40402);

        let packet = Packet::produce(
            Payload::Neighbors(NeighborsPayload { nodes: vec![(new_peer_id, new_peer_endpoint)], expiration: 1 }),
            &reporter_key,
        )
        .unwrap();

        manager_a.handle_datagram("127.0.0.1:40403".parse().unwrap(), packet.to_bytes().as_slice()).await;

        let target: SocketAddr = "127.0.0.1:40402".parse().unwrap();
        assert!(transport_a.try_drain().iter().any(|(to, _)| *to == target));
        assert_eq!(manager_a.repository.get(new_peer_id).endpoint(), Some(new_peer_endpoint));
    }

    #[tokio::test]
    async fn neighbors_entries_for_already_known_peers_do_not_re_ping() {
        let network = InMemoryNetwork::new();
        let (manager_a, transport_a) = build_manager(8, 40501, &network);
        let reporter_key = SigningKey::from_bytes(&[9u8; 32].into()).unwrap();

        let known_peer_id = NodeId([77u8; 64]);
        manager_a.repository.get_with_endpoint(known_peer_id, endpoint(40502));
        transport_a.try_drain();

        let packet = Packet::produce(
            Payload::Neighbors(NeighborsPayload { nodes: vec![(known_peer_id, endpoint(40502))], expiration: 1 }),
            &reporter_key,
        )
        .unwrap();
        manager_a.handle_datagram("127.0.0.1:40503".parse().unwrap(), packet.to_bytes().as_slice()).await;

        assert!(transport_a.try_drain().is_empty());
    }

    #[tokio::test]
    async fn forged_pong_sharing_a_real_ping_hash_cannot_evict_the_real_awaiting_entry() {
        let network = InMemoryNetwork::new();
        let (manager_a, transport_a) = build_manager(10, 40601, &network);
        let real_peer_key = SigningKey::from_bytes(&[11u8; 32].into()).unwrap();
        let real_peer_id = node_id_of(&real_peer_key);
        let attacker_key = SigningKey::from_bytes(&[12u8; 32].into()).unwrap();
        let attacker_id = node_id_of(&attacker_key);

        let uri: EnodeUri = format!("enode://{}@127.0.0.1:40602", crate::bytes::hex_encode(real_peer_id.as_bytes())).parse().unwrap();
        manager_a.init(&[uri]).await.unwrap();
        let (_, outbound) = transport_a.try_drain().into_iter().next().unwrap();
        let ping_hash = Packet::decode(outbound.as_slice()).unwrap().hash;

        let forged = Packet::produce(
            Payload::Pong(PongPayload { to: endpoint(40601), ping_hash, expiration: 1 }),
            &attacker_key,
        )
        .unwrap();
        manager_a.handle_datagram("127.0.0.1:40603".parse().unwrap(), forged.to_bytes().as_slice()).await;
        assert!(!manager_a.repository.get(attacker_id).is_active());

        let real_pong = Packet::produce(
            Payload::Pong(PongPayload { to: endpoint(40601), ping_hash, expiration: 1 }),
            &real_peer_key,
        )
        .unwrap();
        manager_a.handle_datagram("127.0.0.1:40602".parse().unwrap(), real_pong.to_bytes().as_slice()).await;
        assert!(manager_a.repository.get(real_peer_id).is_active());
    }
}
