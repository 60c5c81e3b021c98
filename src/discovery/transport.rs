//! Sending and receiving discovery packets: a real UDP socket for
//! production, an in-memory router for tests that exercise the lifecycle
//! manager without binding a port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::bytes::ByteSeq;

use super::error::DiscoveryError;
use super::packet::MAX_PACKET_SIZE;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_to(&self, target: SocketAddr, bytes: ByteSeq) -> Result<(), DiscoveryError>;
    async fn recv_from(&self) -> Option<(SocketAddr, ByteSeq)>;
}

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self, DiscoveryError> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| DiscoveryError::Store(e.to_string()))?;
        Ok(UdpTransport { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, target: SocketAddr, bytes: ByteSeq) -> Result<(), DiscoveryError> {
        self.socket.send_to(bytes.as_slice(), target).await.map_err(|e| DiscoveryError::Store(e.to_string()))?;
        Ok(())
    }

    async fn recv_from(&self) -> Option<(SocketAddr, ByteSeq)> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        match self.socket.recv_from(&mut buf).await {
            Ok((n, addr)) => Some((addr, ByteSeq::new(buf[..n].to_vec()))),
            Err(_) => None,
        }
    }
}

/// A shared registry of in-process mailboxes, keyed by the address each
/// `InMemoryTransport` was registered under. `send_to` looks the target up
/// and pushes directly onto its channel; there is no real socket involved.
#[derive(Default)]
pub struct InMemoryNetwork {
    mailboxes: Mutex<HashMap<SocketAddr, UnboundedSender<(SocketAddr, Vec<u8>)>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemoryNetwork::default())
    }

    pub fn register(self: &Arc<Self>, addr: SocketAddr) -> InMemoryTransport {
        let (tx, rx) = unbounded_channel();
        self.mailboxes.lock().insert(addr, tx);
        InMemoryTransport { local_addr: addr, network: self.clone(), inbox: Mutex::new(rx) }
    }
}

pub struct InMemoryTransport {
    local_addr: SocketAddr,
    network: Arc<InMemoryNetwork>,
    inbox: Mutex<UnboundedReceiver<(SocketAddr, Vec<u8>)>>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send_to(&self, target: SocketAddr, bytes: ByteSeq) -> Result<(), DiscoveryError> {
        let sender = self.network.mailboxes.lock().get(&target).cloned();
        match sender {
            Some(sender) => {
                sender
                    .send((self.local_addr, bytes.as_slice().to_vec()))
                    .map_err(|_| DiscoveryError::Store(format!("no receiver registered for {target}")))?;
                Ok(())
            }
            None => Err(DiscoveryError::Store(format!("no peer registered at {target}"))),
        }
    }

    async fn recv_from(&self) -> Option<(SocketAddr, ByteSeq)> {
        self.inbox.lock().recv().await.map(|(addr, bytes)| (addr, ByteSeq::new(bytes)))
    }
}

impl InMemoryTransport {
    /// Drains every packet currently queued without waiting for more to
    /// arrive, used by tests that need exactly "one round of delivery".
    pub fn try_drain(&self) -> Vec<(SocketAddr, ByteSeq)> {
        let mut inbox = self.inbox.lock();
        let mut out = Vec::new();
        while let Ok((addr, bytes)) = inbox.try_recv() {
            out.push((addr, ByteSeq::new(bytes)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_network_delivers_between_two_registered_peers() {
        let network = InMemoryNetwork::new();
        let a_addr: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        let b_addr: SocketAddr = "127.0.0.1:40002".parse().unwrap();
        let a = network.register(a_addr);
        let b = network.register(b_addr);

        a.send_to(b_addr, ByteSeq::new(vec![1, 2, 3])).await.unwrap();
        let (from, bytes) = b.recv_from().await.unwrap();
        assert_eq!(from, a_addr);
        assert_eq!(bytes.as_slice(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn send_to_unregistered_address_fails() {
        let network = InMemoryNetwork::new();
        let a = network.register("127.0.0.1:40003".parse().unwrap());
        let err = a.send_to("127.0.0.1:40099".parse().unwrap(), ByteSeq::new(vec![0])).await;
        assert!(err.is_err());
    }
}
