//! `Endpoint`: an (ip, udp-port, tcp-port) triple as carried inside Ping,
//! Pong, and Neighbors payloads. Grounded on ethrex's `Endpoint` RLP
//! encoding, reworked onto this crate's own `rlp::Value` tree instead of
//! ethrex's `Encoder`/`Decoder` builder, with `NonZeroU16` ports since a
//! port of zero is never a valid endpoint.

use std::net::IpAddr;
use std::num::NonZeroU16;

use crate::rlp::Value as RlpValue;

use super::error::DiscoveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub host: IpAddr,
    pub udp_port: NonZeroU16,
    pub tcp_port: NonZeroU16,
}

impl Endpoint {
    pub fn new(host: IpAddr, udp_port: u16, tcp_port: u16) -> Result<Self, DiscoveryError> {
        Ok(Self {
            host,
            udp_port: NonZeroU16::new(udp_port).ok_or_else(|| DiscoveryError::Argument("udp port must be nonzero".into()))?,
            tcp_port: NonZeroU16::new(tcp_port).ok_or_else(|| DiscoveryError::Argument("tcp port must be nonzero".into()))?,
        })
    }

    pub fn to_value(self) -> RlpValue {
        let ip_bytes = match self.host {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        RlpValue::List(vec![
            RlpValue::Bytes(ip_bytes.into()),
            uint_value(self.udp_port.get() as u64),
            uint_value(self.tcp_port.get() as u64),
        ])
    }

    /// Decodes `[ip, udp, tcp]`. The nested `tcp` field inside a Neighbors
    /// entry may be omitted, in which case it defaults to `udp`.
    pub fn from_value(value: &RlpValue) -> Result<Self, DiscoveryError> {
        let items = value.as_list().map_err(|_| DiscoveryError::Decode("endpoint must be a list".into()))?;
        if items.len() != 2 && items.len() != 3 {
            return Err(DiscoveryError::Decode(format!("endpoint list has arity {}", items.len())));
        }
        let host = decode_ip(&items[0])?;
        let udp_port = decode_port(&items[1])?;
        let tcp_port = if items.len() == 3 { decode_port(&items[2])? } else { udp_port };
        Endpoint::new(host, udp_port, tcp_port)
    }
}

fn uint_value(n: u64) -> RlpValue {
    let be = n.to_be_bytes();
    let first_nz = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    RlpValue::Bytes(be[first_nz..].to_vec().into())
}

fn decode_ip(value: &RlpValue) -> Result<IpAddr, DiscoveryError> {
    let bytes = value.as_bytes().map_err(|_| DiscoveryError::Decode("ip must be a byte string".into()))?;
    match bytes.len() {
        4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(bytes.as_slice());
            Ok(IpAddr::from(octets))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes.as_slice());
            Ok(IpAddr::from(octets))
        }
        n => Err(DiscoveryError::Decode(format!("ip address has invalid length {n}"))),
    }
}

fn decode_port(value: &RlpValue) -> Result<u16, DiscoveryError> {
    let bytes = value.as_bytes().map_err(|_| DiscoveryError::Decode("port must be a byte string".into()))?;
    if bytes.len() > 2 {
        return Err(DiscoveryError::Decode("port does not fit in 16 bits".into()));
    }
    let mut padded = [0u8; 2];
    padded[2 - bytes.len()..].copy_from_slice(bytes.as_slice());
    Ok(u16::from_be_bytes(padded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn round_trips_through_rlp_value() {
        let ep = Endpoint::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 30303, 30303).unwrap();
        let decoded = Endpoint::from_value(&ep.to_value()).unwrap();
        assert_eq!(ep, decoded);
    }

    #[test]
    fn missing_tcp_defaults_to_udp() {
        let ep = Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 30303, 30303).unwrap();
        let full = ep.to_value();
        let items = full.as_list().unwrap();
        let truncated = RlpValue::List(vec![items[0].clone(), items[1].clone()]);
        let decoded = Endpoint::from_value(&truncated).unwrap();
        assert_eq!(decoded.tcp_port.get(), decoded.udp_port.get());
    }

    #[test]
    fn rejects_zero_port() {
        assert!(Endpoint::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 0, 30303).is_err());
    }
}
