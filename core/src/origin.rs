//! Network origin identity signal
//!
//! Votes are keyed partly on the address the request arrived from. Addresses
//! are canonicalized before they are stored or compared so that an IPv4 peer
//! seen through a dual-stack socket (`::ffff:a.b.c.d`) is the same identity as
//! the plain IPv4 form.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Canonical network-origin identifier of a voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkOrigin(IpAddr);

impl NetworkOrigin {
    pub fn new(addr: IpAddr) -> Self {
        let canonical = match addr {
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => IpAddr::V6(v6),
            },
            v4 => v4,
        };
        Self(canonical)
    }

    pub fn addr(&self) -> IpAddr {
        self.0
    }

    /// True for the loopback set `127.0.0.1` and `::1` (mapped forms included).
    pub fn is_loopback(&self) -> bool {
        match self.0 {
            IpAddr::V4(v4) => v4 == Ipv4Addr::LOCALHOST,
            IpAddr::V6(v6) => v6 == Ipv6Addr::LOCALHOST,
        }
    }
}

impl From<IpAddr> for NetworkOrigin {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr)
    }
}

impl fmt::Display for NetworkOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
