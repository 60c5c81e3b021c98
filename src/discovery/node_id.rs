//! A discovery node's identity: the 64-byte uncompressed secp256k1 public
//! key (X‖Y, no leading `0x04`) recovered from a packet's signature.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 64]);

impl NodeId {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// XOR distance to `other`, used by Kademlia-style ordering.
    pub fn distance(&self, other: &NodeId) -> [u8; 64] {
        let mut out = [0u8; 64];
        for i in 0..64 {
            out[i] = self.0[i] ^ other.0[i];
        }
        out
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", crate::bytes::hex_encode(&self.0))
    }
}

impl From<[u8; 64]> for NodeId {
    fn from(value: [u8; 64]) -> Self {
        NodeId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let id = NodeId([7u8; 64]);
        assert_eq!(id.distance(&id), [0u8; 64]);
    }
}
