//! Deserializable configuration for a discovery node, loadable from TOML or
//! JSON via `serde`.

use std::net::SocketAddr;

use serde::Deserialize;

use super::manager::{EXPIRATION_PERIOD_MS, MAX_NEIGHBORS, PONG_EXPIRATION_MS};

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub bootstrap_nodes: Vec<String>,
    #[serde(default = "default_expiration_period_ms")]
    pub expiration_period_ms: u64,
    #[serde(default = "default_pong_expiration_ms")]
    pub pong_expiration_ms: u64,
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,
    #[serde(default = "default_routing_table_capacity")]
    pub routing_table_capacity: usize,
}

fn default_expiration_period_ms() -> u64 {
    EXPIRATION_PERIOD_MS
}

fn default_pong_expiration_ms() -> u64 {
    PONG_EXPIRATION_MS
}

fn default_max_neighbors() -> usize {
    MAX_NEIGHBORS
}

fn default_routing_table_capacity() -> usize {
    256
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            bind_addr: "0.0.0.0:30303".parse().unwrap(),
            bootstrap_nodes: Vec::new(),
            expiration_period_ms: default_expiration_period_ms(),
            pong_expiration_ms: default_pong_expiration_ms(),
            max_neighbors: default_max_neighbors(),
            routing_table_capacity: default_routing_table_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults_filled_in() {
        let json = r#"{"bind_addr": "127.0.0.1:30303"}"#;
        let config: DiscoveryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.expiration_period_ms, EXPIRATION_PERIOD_MS);
        assert_eq!(config.max_neighbors, MAX_NEIGHBORS);
        assert!(config.bootstrap_nodes.is_empty());
    }

    #[test]
    fn deserializes_explicit_bootstrap_nodes() {
        let json = r#"{
            "bind_addr": "127.0.0.1:30303",
            "bootstrap_nodes": ["enode://aa@127.0.0.1:30304"]
        }"#;
        let config: DiscoveryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bootstrap_nodes.len(), 1);
    }
}
