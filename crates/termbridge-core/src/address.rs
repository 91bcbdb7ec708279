//! Remote target validation.

use std::net::Ipv4Addr;

use crate::{Error, Result};

/// Parse a dotted-quad IPv4 address.
///
/// Hostnames, IPv6 literals, octets above 255 and octets with leading
/// zeros are all rejected.
pub fn validate_ipv4(ip: &str) -> Result<Ipv4Addr> {
    ip.parse::<Ipv4Addr>()
        .map_err(|_| Error::InvalidAddress(ip.to_string()))
}

/// Check that a port number is in 1..=65535.
pub fn validate_port(port: i64) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(Error::InvalidPort(port)),
    }
}
