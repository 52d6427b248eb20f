//! IPv4 address tokens as they appear in edge tables and capture headers.
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;

/// A validated IPv4 host address.
///
/// Ordering follows the numeric octet tuple, so `9.0.0.1` sorts before
/// `10.0.0.1` even though the strings compare the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Ipv4Addr);

impl Address {
    /// Parses a dotted-quad token, canonicalizing away leading zeros.
    ///
    /// Returns `None` for anything that is not exactly four groups of one to
    /// three decimal digits, each in `0..=255`.
    pub fn parse(token: &str) -> Option<Self> {
        let mut octets = [0u8; 4];
        let mut groups = token.split('.');

        for octet in octets.iter_mut() {
            let group = groups.next()?;
            let digits = group.bytes().all(|b| b.is_ascii_digit());
            if group.is_empty() || group.len() > 3 || !digits {
                return None;
            }
            *octet = group.parse::<u8>().ok()?;
        }

        if groups.next().is_some() {
            return None;
        }

        Some(Address(Ipv4Addr::from(octets)))
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }
}

/// True when `token` is a syntactically and numerically valid IPv4 address.
pub fn is_ipv4(token: &str) -> bool {
    Address::parse(token).is_some()
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Address(ip)
    }
}

impl From<[u8; 4]> for Address {
    fn from(octets: [u8; 4]) -> Self {
        Address(Ipv4Addr::from(octets))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_quads() {
        assert!(is_ipv4("10.0.0.1"));
        assert!(is_ipv4("0.0.0.0"));
        assert!(is_ipv4("255.255.255.255"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in [
            "", "10.0.0", "10.0.0.1.5", "10.0.0.256", "10.0.0.a", "10..0.1", "10.0.0.1 ",
            " 10.0.0.1", "+1.2.3.4", "1.2.3.-4", "1.2.3.4.", "0001.2.3.4", "host",
        ] {
            assert!(!is_ipv4(token), "{token:?} should be rejected");
        }
    }

    #[test]
    fn canonicalizes_leading_zeros() {
        let addr = Address::parse("010.000.0.01").unwrap();
        assert_eq!(addr.to_string(), "10.0.0.1");
        assert_eq!(addr, Address::parse("10.0.0.1").unwrap());
    }

    #[test]
    fn orders_numerically() {
        let mut addrs: Vec<Address> = ["10.0.0.1", "9.255.0.1", "10.0.0.10", "10.0.0.2"]
            .iter()
            .filter_map(|t| Address::parse(t))
            .collect();
        addrs.sort();
        let sorted: Vec<String> = addrs.iter().map(|a| a.to_string()).collect();
        assert_eq!(sorted, ["9.255.0.1", "10.0.0.1", "10.0.0.2", "10.0.0.10"]);
    }

    #[test]
    fn serializes_as_string() {
        let addr = Address::from([192, 168, 1, 7]);
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"192.168.1.7\"");
    }
}
