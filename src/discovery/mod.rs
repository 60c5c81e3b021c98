//! A discv4-style UDP node discovery engine: signed, expiring packets
//! carrying a peer's endpoint and capabilities, a canonical peer repository
//! with observer hooks, a bounded/Kademlia routing table, and the lifecycle
//! manager that drives the Ping/Pong/FindNeighbors/Neighbors protocol.

pub mod config;
pub mod endpoint;
pub mod enode;
pub mod error;
pub mod manager;
pub mod node_id;
pub mod packet;
pub mod peer;
pub mod repository;
pub mod routing_table;
pub mod transport;

pub use config::DiscoveryConfig;
pub use endpoint::Endpoint;
pub use enode::EnodeUri;
pub use error::DiscoveryError;
pub use manager::PeerLifecycleManager;
pub use node_id::NodeId;
pub use packet::{FindNeighborsPayload, NeighborsPayload, Packet, PingPayload, Payload, PongPayload};
pub use peer::Peer;
pub use repository::PeerRepository;
pub use routing_table::{BoundedTable, KademliaTable, RoutingTable};
pub use transport::{InMemoryNetwork, InMemoryTransport, Transport, UdpTransport};
