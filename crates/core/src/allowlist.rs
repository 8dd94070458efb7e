//! Source-IP allow-list for inbound callbacks.

use std::net::{IpAddr, SocketAddr};

use crate::error::Error;

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    /// Parse `addr/prefix`. Host bits in `addr` are ignored.
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, prefix) = cidr.split_once('/')?;
        let addr: IpAddr = addr.trim().parse().ok()?;
        let prefix: u8 = prefix.trim().parse().ok()?;
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        (prefix <= max).then_some(Self { addr, prefix })
    }

    pub fn contains(&self, candidate: IpAddr) -> bool {
        match (self.addr, candidate) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix))
                    .unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

/// Individual addresses and CIDR ranges allowed to deliver callbacks.
///
/// An empty allow-list admits every caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpAllowlist {
    addrs: Vec<IpAddr>,
    networks: Vec<IpNetwork>,
}

impl IpAllowlist {
    /// Parse entries of the form `10.0.0.1`, `2001:db8::1` or `10.0.0.0/24`.
    ///
    /// Returns [`Error::Configuration`] naming the first invalid entry.
    pub fn parse<I, S>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.contains('/') {
                let network = IpNetwork::parse(entry).ok_or_else(|| {
                    Error::Configuration(format!("invalid CIDR in IP whitelist: {entry}"))
                })?;
                list.networks.push(network);
            } else {
                let addr: IpAddr = entry.parse().map_err(|_| {
                    Error::Configuration(format!("invalid IP address in IP whitelist: {entry}"))
                })?;
                list.addrs.push(addr.to_canonical());
            }
        }
        Ok(list)
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty() && self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addrs.len() + self.networks.len()
    }

    /// Whether `ip` matches an address or falls inside a range.
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.addrs.contains(&ip) || self.networks.iter().any(|net| net.contains(ip))
    }

    /// Check a caller-supplied source address such as `203.0.113.7`,
    /// `203.0.113.7:443` or `[2001:db8::1]:443`.
    ///
    /// An empty allow-list accepts any input without parsing it.
    pub fn check(&self, candidate: &str) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }

        let ip = parse_source_address(candidate).ok_or_else(|| Error::InvalidIpAddress {
            address: candidate.to_owned(),
        })?;

        if self.contains(ip) {
            Ok(())
        } else {
            Err(Error::IpNotWhitelisted {
                address: ip.to_string(),
            })
        }
    }
}

/// Extract the IP from an address with an optional port.
fn parse_source_address(candidate: &str) -> Option<IpAddr> {
    let candidate = candidate.trim();
    if let Ok(socket) = candidate.parse::<SocketAddr>() {
        return Some(socket.ip());
    }
    if let Some(inner) = candidate
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return inner.parse().ok();
    }
    candidate.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn allowlist() -> IpAllowlist {
        IpAllowlist::parse(["203.0.113.7", "10.0.0.0/24", "2001:db8::/32"]).unwrap()
    }

    #[test]
    fn empty_list_allows_everything() {
        let list = IpAllowlist::default();
        assert!(list.is_empty());
        assert!(list.check("198.51.100.1").is_ok());
        assert!(list.check("not-an-ip").is_ok());
    }

    #[test]
    fn exact_address_and_port_forms() {
        let list = allowlist();
        assert!(list.check("203.0.113.7").is_ok());
        assert!(list.check("203.0.113.7:8080").is_ok());
        assert!(list.check(" 203.0.113.7 ").is_ok());
    }

    #[test]
    fn cidr_ranges() {
        let list = allowlist();
        assert!(list.check("10.0.0.1").is_ok());
        assert!(list.check("10.0.0.255:443").is_ok());
        let err = list.check("10.0.1.1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IpNotWhitelisted);
    }

    #[test]
    fn ipv6_forms() {
        let list = allowlist();
        assert!(list.check("2001:db8::1").is_ok());
        assert!(list.check("[2001:db8::1]:443").is_ok());
        assert!(list.check("[2001:db8::1]").is_ok());
        assert_eq!(
            list.check("2001:db9::1").unwrap_err().kind(),
            ErrorKind::IpNotWhitelisted
        );
    }

    #[test]
    fn ipv4_mapped_ipv6_matches_ipv4_entry() {
        let list = allowlist();
        assert!(list.check("::ffff:203.0.113.7").is_ok());
    }

    #[test]
    fn invalid_candidate() {
        let err = allowlist().check("not-an-ip").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIpAddress);
        assert_eq!(err.to_string(), "invalid IP address format: not-an-ip");
    }

    #[test]
    fn invalid_entries_are_configuration_errors() {
        for entry in ["300.0.0.1", "10.0.0.0/33", "10.0.0.0/x", "host.example"] {
            let err = IpAllowlist::parse([entry]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{entry}");
        }
    }

    #[test]
    fn zero_prefix_matches_family() {
        let net = IpNetwork::parse("0.0.0.0/0").unwrap();
        assert!(net.contains("192.0.2.1".parse().unwrap()));
        assert!(!net.contains("2001:db8::1".parse().unwrap()));
    }
}
