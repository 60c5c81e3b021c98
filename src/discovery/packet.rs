//! The discovery wire envelope and its four payload kinds: `hash ‖
//! signature ‖ type ‖ payload`, with the hash covering everything after it
//! and the sender's node id recovered from the signature rather than
//! carried explicitly.

use crate::bytes::ByteSeq;
use crate::crypto::secp256k1::{self, RecoverableSignature, SigningKey};
use crate::crypto::{keccak256, Hash32};
use crate::rlp::Value as RlpValue;

use super::endpoint::Endpoint;
use super::error::DiscoveryError;
use super::node_id::NodeId;

pub const PING_VERSION: u64 = 4;
pub const MAX_PACKET_SIZE: usize = 1280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ping = 0x01,
    Pong = 0x02,
    FindNeighbors = 0x03,
    Neighbors = 0x04,
}

impl PacketType {
    fn from_byte(b: u8) -> Result<Self, DiscoveryError> {
        match b {
            0x01 => Ok(PacketType::Ping),
            0x02 => Ok(PacketType::Pong),
            0x03 => Ok(PacketType::FindNeighbors),
            0x04 => Ok(PacketType::Neighbors),
            other => Err(DiscoveryError::Decode(format!("unknown packet type byte 0x{other:02x}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPayload {
    pub from: Endpoint,
    pub to: Endpoint,
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongPayload {
    pub to: Endpoint,
    pub ping_hash: Hash32,
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNeighborsPayload {
    pub target: NodeId,
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborsPayload {
    pub nodes: Vec<(NodeId, Endpoint)>,
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Ping(PingPayload),
    Pong(PongPayload),
    FindNeighbors(FindNeighborsPayload),
    Neighbors(NeighborsPayload),
}

impl Payload {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Payload::Ping(_) => PacketType::Ping,
            Payload::Pong(_) => PacketType::Pong,
            Payload::FindNeighbors(_) => PacketType::FindNeighbors,
            Payload::Neighbors(_) => PacketType::Neighbors,
        }
    }

    pub fn encode(&self) -> ByteSeq {
        let value = match self {
            Payload::Ping(p) => RlpValue::List(vec![
                uint_value(PING_VERSION),
                p.from.to_value(),
                p.to.to_value(),
                uint_value(p.expiration),
            ]),
            Payload::Pong(p) => {
                RlpValue::List(vec![p.to.to_value(), RlpValue::Bytes(ByteSeq::new(p.ping_hash.0.to_vec())), uint_value(p.expiration)])
            }
            Payload::FindNeighbors(p) => {
                RlpValue::List(vec![RlpValue::Bytes(ByteSeq::new(p.target.0.to_vec())), uint_value(p.expiration)])
            }
            Payload::Neighbors(p) => {
                let entries = p
                    .nodes
                    .iter()
                    .map(|(id, ep)| RlpValue::List(vec![ep.to_value(), RlpValue::Bytes(ByteSeq::new(id.0.to_vec()))]))
                    .collect();
                RlpValue::List(vec![RlpValue::List(entries), uint_value(p.expiration)])
            }
        };
        value.encode()
    }

    fn decode(kind: PacketType, bytes: &[u8]) -> Result<Self, DiscoveryError> {
        let value = RlpValue::decode(bytes)?;
        let items = value.as_list().map_err(|_| DiscoveryError::Decode("payload must be a list".into()))?;
        match kind {
            PacketType::Ping => {
                if items.len() != 4 {
                    return Err(DiscoveryError::Decode(format!("ping has arity {}", items.len())));
                }
                let version = decode_uint(&items[0])?;
                if version != PING_VERSION {
                    return Err(DiscoveryError::Decode(format!("ping version mismatch: got {version}")));
                }
                Ok(Payload::Ping(PingPayload {
                    from: Endpoint::from_value(&items[1])?,
                    to: Endpoint::from_value(&items[2])?,
                    expiration: decode_uint(&items[3])?,
                }))
            }
            PacketType::Pong => {
                if items.len() != 3 {
                    return Err(DiscoveryError::Decode(format!("pong has arity {}", items.len())));
                }
                Ok(Payload::Pong(PongPayload {
                    to: Endpoint::from_value(&items[0])?,
                    ping_hash: decode_hash32(&items[1])?,
                    expiration: decode_uint(&items[2])?,
                }))
            }
            PacketType::FindNeighbors => {
                if items.len() != 2 {
                    return Err(DiscoveryError::Decode(format!("find_neighbors has arity {}", items.len())));
                }
                Ok(Payload::FindNeighbors(FindNeighborsPayload {
                    target: decode_node_id(&items[0])?,
                    expiration: decode_uint(&items[1])?,
                }))
            }
            PacketType::Neighbors => {
                if items.len() != 2 {
                    return Err(DiscoveryError::Decode(format!("neighbors has arity {}", items.len())));
                }
                let entries = items[0].as_list().map_err(|_| DiscoveryError::Decode("neighbors entry list must be a list".into()))?;
                let mut nodes = Vec::with_capacity(entries.len());
                for entry in entries {
                    let fields = entry.as_list().map_err(|_| DiscoveryError::Decode("neighbors entry must be a list".into()))?;
                    if fields.len() != 2 {
                        return Err(DiscoveryError::Decode(format!("neighbors entry has arity {}", fields.len())));
                    }
                    let endpoint = Endpoint::from_value(&fields[0])?;
                    let node_id = decode_node_id(&fields[1])?;
                    nodes.push((node_id, endpoint));
                }
                Ok(Payload::Neighbors(NeighborsPayload { nodes, expiration: decode_uint(&items[1])? }))
            }
        }
    }
}

fn uint_value(n: u64) -> RlpValue {
    let be = n.to_be_bytes();
    let first_nz = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    RlpValue::Bytes(be[first_nz..].to_vec().into())
}

fn decode_uint(value: &RlpValue) -> Result<u64, DiscoveryError> {
    let bytes = value.as_bytes().map_err(|_| DiscoveryError::Decode("expected an integer".into()))?;
    if bytes.len() > 8 {
        return Err(DiscoveryError::Decode("integer too wide for u64".into()));
    }
    let mut padded = [0u8; 8];
    padded[8 - bytes.len()..].copy_from_slice(bytes.as_slice());
    Ok(u64::from_be_bytes(padded))
}

fn decode_hash32(value: &RlpValue) -> Result<Hash32, DiscoveryError> {
    let bytes = value.as_bytes().map_err(|_| DiscoveryError::Decode("expected a 32-byte hash".into()))?;
    if bytes.len() != 32 {
        return Err(DiscoveryError::Decode(format!("hash has invalid length {}", bytes.len())));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes.as_slice());
    Ok(Hash32(out))
}

fn decode_node_id(value: &RlpValue) -> Result<NodeId, DiscoveryError> {
    let bytes = value.as_bytes().map_err(|_| DiscoveryError::Decode("expected a 64-byte node id".into()))?;
    if bytes.len() != 64 {
        return Err(DiscoveryError::Decode(format!("node id has invalid length {}", bytes.len())));
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(bytes.as_slice());
    Ok(NodeId(out))
}

/// A signed, self-verifying packet: `hash ‖ signature ‖ type ‖ payload`.
#[derive(Debug, Clone)]
pub struct Packet {
    pub hash: Hash32,
    pub signature: RecoverableSignature,
    pub sender: NodeId,
    pub payload: Payload,
    wire: ByteSeq,
}

impl Packet {
    pub fn produce(payload: Payload, key: &SigningKey) -> Result<Packet, DiscoveryError> {
        let type_byte = payload.packet_type() as u8;
        let payload_bytes = payload.encode();
        let mut signed_msg = Vec::with_capacity(1 + payload_bytes.len());
        signed_msg.push(type_byte);
        signed_msg.extend_from_slice(payload_bytes.as_slice());
        let msg_hash = keccak256(&signed_msg);
        let signature = secp256k1::sign(key, &msg_hash).map_err(|e| DiscoveryError::Argument(e.to_string()))?;

        let mut hashed = Vec::with_capacity(65 + signed_msg.len());
        hashed.extend_from_slice(&signature.0);
        hashed.extend_from_slice(&signed_msg);
        let hash = keccak256(&hashed);

        let mut wire = Vec::with_capacity(32 + hashed.len());
        wire.extend_from_slice(&hash.0);
        wire.extend_from_slice(&hashed);

        let recovered = secp256k1::recover(&signature, &msg_hash).map_err(|e| DiscoveryError::Argument(e.to_string()))?;
        let sender = NodeId(recovered);

        if wire.len() > MAX_PACKET_SIZE {
            return Err(DiscoveryError::Argument(format!("packet exceeds {MAX_PACKET_SIZE} bytes")));
        }

        Ok(Packet { hash, signature, sender, payload, wire: ByteSeq::new(wire) })
    }

    pub fn to_bytes(&self) -> ByteSeq {
        self.wire.clone()
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, DiscoveryError> {
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(DiscoveryError::Decode(format!("packet exceeds {MAX_PACKET_SIZE} bytes")));
        }
        if bytes.len() < 98 {
            return Err(DiscoveryError::Decode("packet shorter than the fixed header".into()));
        }
        let hash_bytes = &bytes[0..32];
        let sig_bytes = &bytes[32..97];
        let type_byte = bytes[97];
        let payload_bytes = &bytes[98..];

        let mut signature = [0u8; 65];
        signature.copy_from_slice(sig_bytes);
        let signature = RecoverableSignature::from_bytes(signature);

        let mut signed_msg = Vec::with_capacity(1 + payload_bytes.len());
        signed_msg.push(type_byte);
        signed_msg.extend_from_slice(payload_bytes);
        let msg_hash = keccak256(&signed_msg);

        let recovered = secp256k1::recover(&signature, &msg_hash).map_err(|_| DiscoveryError::Decode("signature recovery failed".into()))?;

        let mut hashed = Vec::with_capacity(65 + signed_msg.len());
        hashed.extend_from_slice(&signature.0);
        hashed.extend_from_slice(&signed_msg);
        let expected_hash = keccak256(&hashed);
        if expected_hash.0 != hash_bytes {
            return Err(DiscoveryError::Decode("packet hash does not match signed contents".into()));
        }

        let kind = PacketType::from_byte(type_byte)?;
        let payload = Payload::decode(kind, payload_bytes)?;

        Ok(Packet {
            hash: expected_hash,
            signature,
            sender: NodeId(recovered),
            payload,
            wire: ByteSeq::new(bytes.to_vec()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::secp256k1::SigningKey;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port, port).unwrap()
    }

    #[test]
    fn ping_round_trips_and_recovers_sender() {
        let key = SigningKey::from_bytes(&[3u8; 32].into()).unwrap();
        let payload = Payload::Ping(PingPayload { from: endpoint(30303), to: endpoint(30304), expiration: 1_700_000_000 });
        let packet = Packet::produce(payload.clone(), &key).unwrap();
        let wire = packet.to_bytes();

        let decoded = Packet::decode(wire.as_slice()).unwrap();
        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.hash.0, packet.hash.0);

        let verifying_key = crate::crypto::secp256k1::VerifyingKey::from(&key);
        let expected_sender = &verifying_key.to_encoded_point(false).as_bytes()[1..];
        assert_eq!(&decoded.sender.0[..], expected_sender);
    }

    #[test]
    fn tampered_payload_fails_hash_check() {
        let key = SigningKey::from_bytes(&[5u8; 32].into()).unwrap();
        let payload = Payload::FindNeighbors(FindNeighborsPayload { target: NodeId([9u8; 64]), expiration: 1_700_000_000 });
        let packet = Packet::produce(payload, &key).unwrap();
        let mut wire = packet.to_bytes().as_slice().to_vec();
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        assert!(Packet::decode(&wire).is_err());
    }

    #[test]
    fn rejects_unknown_packet_type() {
        let key = SigningKey::from_bytes(&[11u8; 32].into()).unwrap();
        let payload = Payload::Pong(PongPayload { to: endpoint(30303), ping_hash: keccak256(b"ping"), expiration: 1 });
        let packet = Packet::produce(payload, &key).unwrap();
        let mut wire = packet.to_bytes().as_slice().to_vec();
        wire[97] = 0x09;

        let mut signed_msg = vec![0x09u8];
        signed_msg.extend_from_slice(&wire[98..]);
        let msg_hash = keccak256(&signed_msg);
        let mut hashed = wire[32..97].to_vec();
        hashed.extend_from_slice(&signed_msg);
        let hash = keccak256(&hashed);
        wire[0..32].copy_from_slice(&hash.0);

        assert!(matches!(Packet::decode(&wire), Err(DiscoveryError::Decode(_))));
    }

    #[test]
    fn ping_version_mismatch_is_rejected() {
        let bad = RlpValue::List(vec![
            uint_value(5),
            endpoint(30303).to_value(),
            endpoint(30304).to_value(),
            uint_value(1),
        ])
        .encode();
        assert!(Payload::decode(PacketType::Ping, bad.as_slice()).is_err());
    }
}
