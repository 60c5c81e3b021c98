//! `enode://<hex-nodeid>@<host>[:<tcp-port>][?discport=<udp-port>]` URIs.
//!
//! Grounded on ethrex's `Node::from_enode_url`: parse the hex public key by
//! byte offset, hand the remainder to `std::net::SocketAddr`'s own parser
//! (which already understands bracketed IPv6 literals), then layer
//! `discport` on top.

use std::net::SocketAddr;
use std::str::FromStr;

use super::error::DiscoveryError;
use super::node_id::NodeId;

pub const DEFAULT_PORT: u16 = 30303;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnodeUri {
    pub node_id: NodeId,
    pub addr: SocketAddr,
    pub udp_port: u16,
}

impl EnodeUri {
    pub fn tcp_port(&self) -> u16 {
        self.addr.port()
    }
}

impl FromStr for EnodeUri {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("enode://").ok_or_else(|| DiscoveryError::Argument("enode uri must use the enode scheme".into()))?;
        let (hex_id, rest) = rest.split_once('@').ok_or_else(|| DiscoveryError::Argument("enode uri missing '@host'".into()))?;
        let node_id = parse_node_id(hex_id)?;

        let (host_port, query) = match rest.find('?') {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };
        let host_port = if host_port.contains(':') || host_port.contains('[') {
            host_port.to_string()
        } else {
            format!("{host_port}:{DEFAULT_PORT}")
        };
        let addr: SocketAddr = host_port.parse().map_err(|_| DiscoveryError::Argument(format!("invalid enode host/port: {host_port}")))?;

        let udp_port = match query.and_then(|q| find_param(q, "discport")) {
            Some(v) => v.parse().map_err(|_| DiscoveryError::Argument("invalid discport value".into()))?,
            None => addr.port(),
        };

        Ok(EnodeUri { node_id, addr, udp_port })
    }
}

fn find_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn parse_node_id(hex_id: &str) -> Result<NodeId, DiscoveryError> {
    let bytes = crate::bytes::hex_decode(hex_id).map_err(|e| DiscoveryError::Argument(format!("invalid node id hex: {e}")))?;
    if bytes.len() != 64 {
        return Err(DiscoveryError::Argument(format!("node id must be 64 bytes, got {}", bytes.len())));
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&bytes);
    Ok(NodeId(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hex() -> String {
        "a".repeat(128)
    }

    #[test]
    fn parses_default_ports() {
        let uri = format!("enode://{}@127.0.0.1", sample_hex());
        let parsed: EnodeUri = uri.parse().unwrap();
        assert_eq!(parsed.tcp_port(), DEFAULT_PORT);
        assert_eq!(parsed.udp_port, DEFAULT_PORT);
    }

    #[test]
    fn parses_explicit_tcp_and_discport() {
        let uri = format!("enode://{}@127.0.0.1:30304?discport=30305", sample_hex());
        let parsed: EnodeUri = uri.parse().unwrap();
        assert_eq!(parsed.tcp_port(), 30304);
        assert_eq!(parsed.udp_port, 30305);
    }

    #[test]
    fn ignores_extra_query_params() {
        let uri = format!("enode://{}@127.0.0.1:30304?discport=30305&foo=bar", sample_hex());
        assert!(uri.parse::<EnodeUri>().is_ok());
    }

    #[test]
    fn rejects_wrong_scheme() {
        assert!("http://example.com".parse::<EnodeUri>().is_err());
    }

    #[test]
    fn rejects_short_node_id() {
        let uri = "enode://aabb@127.0.0.1";
        assert!(uri.parse::<EnodeUri>().is_err());
    }

    #[test]
    fn parses_ipv6_host() {
        let uri = format!("enode://{}@[::1]:30304", sample_hex());
        let parsed: EnodeUri = uri.parse().unwrap();
        assert_eq!(parsed.tcp_port(), 30304);
    }
}
