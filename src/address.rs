//! Endpoint address: a protocol-family-tagged socket address value type.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::error::{NetError, Result};

/// Protocol family of an [`Address`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Family {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

/// A protocol-family-tagged socket address: a numeric host plus a port.
///
/// Equality and ordering are total and consistent (derived from the
/// underlying `SocketAddr`), but the ordering carries no meaning beyond
/// "consistent enough to use as a map key".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(SocketAddr);

impl Address {
    /// An address with the unspecified "any" host and the given port, family
    /// defaulting to IPv4.
    pub fn any(port: u16) -> Address {
        Address(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
    }

    /// The IPv4 broadcast sentinel address (`255.255.255.255`) with the given port.
    pub fn broadcast(port: u16) -> Address {
        Address(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, port)))
    }

    /// The loopback address for `family` with the given port.
    pub fn loopback(family: Family, port: u16) -> Address {
        match family {
            Family::V4 => Address(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))),
            Family::V6 => Address(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::LOCALHOST,
                port,
                0,
                0,
            ))),
        }
    }

    /// Parse a host string and port into an `Address`, following the textual
    /// form rules:
    ///
    /// - `"any"` / `"wildcard"` → the unspecified-any host.
    /// - `"loopback"` / `"localhost"` / empty → the loopback host.
    /// - `"none"` / `"broadcast"` → the IPv4 broadcast sentinel (v4 only).
    /// - a dotted-quad or colon-separated numeric address → parsed directly.
    ///
    /// `family` is used only to pick the address family for the symbolic
    /// forms (`any`, `loopback`, ...); a numeric host string's own family
    /// always wins.
    pub fn parse(host: &str, port: u16, family: Family) -> Result<Address> {
        let host = host.trim();
        match host.to_ascii_lowercase().as_str() {
            "" | "localhost" | "loopback" => Ok(Address::loopback(family, port)),
            "any" | "wildcard" => Ok(Address::any(port)),
            "none" | "broadcast" => Ok(Address::broadcast(port)),
            _ => {
                let ip: IpAddr = host
                    .parse()
                    .map_err(|_| NetError::logic(format!("not a numeric host address: {host}")))?;
                Ok(Address(SocketAddr::new(ip, port)))
            }
        }
    }

    /// The address family.
    pub fn family(&self) -> Family {
        match self.0 {
            SocketAddr::V4(_) => Family::V4,
            SocketAddr::V6(_) => Family::V6,
        }
    }

    /// The numeric host, in its canonical textual form.
    pub fn host(&self) -> String {
        self.0.ip().to_string()
    }

    /// The port number, 0 meaning "any port".
    pub fn port(&self) -> u16 {
        self.0.port()
    }

    /// `host:port` (or `[host]:port` for IPv6), the canonical textual form.
    pub fn to_display_string(&self) -> String {
        self.0.to_string()
    }

    /// True if the host is the unspecified-any address.
    pub fn is_unspecified(&self) -> bool {
        self.0.ip().is_unspecified()
    }

    /// Alias for [`Address::is_unspecified`], matching the "wildcard" naming
    /// used in the textual form table.
    pub fn is_wildcard(&self) -> bool {
        self.is_unspecified()
    }

    /// True if the port is 0 ("any port").
    pub fn is_any_port(&self) -> bool {
        self.0.port() == 0
    }

    /// True if the host is a loopback address.
    pub fn is_loopback(&self) -> bool {
        self.0.ip().is_loopback()
    }

    /// True if the host is the IPv4 broadcast sentinel. Always `false` for IPv6.
    pub fn is_broadcast(&self) -> bool {
        matches!(self.0.ip(), IpAddr::V4(v4) if v4 == Ipv4Addr::BROADCAST)
    }

    /// The underlying `std::net::SocketAddr`.
    pub fn as_std(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Address {
        Address(addr)
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> SocketAddr {
        addr.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbolic_hosts() {
        assert!(Address::parse("any", 80, Family::V4).unwrap().is_unspecified());
        assert!(Address::parse("wildcard", 80, Family::V4).unwrap().is_unspecified());
        assert!(Address::parse("", 0, Family::V4).unwrap().is_loopback());
        assert!(Address::parse("localhost", 0, Family::V4).unwrap().is_loopback());
        assert!(Address::parse("loopback", 0, Family::V6).unwrap().is_loopback());
        assert!(Address::parse("broadcast", 0, Family::V4).unwrap().is_broadcast());
        assert!(Address::parse("none", 0, Family::V4).unwrap().is_broadcast());
    }

    #[test]
    fn parses_numeric_hosts() {
        let a = Address::parse("127.0.0.1", 9000, Family::V4).unwrap();
        assert_eq!(a.host(), "127.0.0.1");
        assert_eq!(a.port(), 9000);
        assert_eq!(a.family(), Family::V4);

        let a = Address::parse("::1", 9000, Family::V6).unwrap();
        assert_eq!(a.family(), Family::V6);
        assert!(a.is_loopback());
    }

    #[test]
    fn rejects_malformed_numeric_host() {
        assert!(Address::parse("not-an-address", 0, Family::V4).is_err());
    }

    #[test]
    fn ordering_is_total_and_consistent() {
        let a = Address::parse("10.0.0.1", 1, Family::V4).unwrap();
        let b = Address::parse("10.0.0.2", 1, Family::V4).unwrap();
        assert_ne!(a, b);
        assert!((a < b) || (b < a));
        assert_eq!(a, a);
    }

    #[test]
    fn any_port_predicate() {
        let a = Address::parse("any", 0, Family::V4).unwrap();
        assert!(a.is_any_port());
        let a = Address::parse("any", 80, Family::V4).unwrap();
        assert!(!a.is_any_port());
    }
}
