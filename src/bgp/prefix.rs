use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::RouteError;

/// An address block as (network address, mask length).
///
/// Host bits are kept exactly as given: `10.1.0.1/16` and `10.1.0.0/16` are
/// two different prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix {
    pub net: IpNet,
}

impl Prefix {
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, RouteError> {
        let net = IpNet::new(addr, len)
            .map_err(|_| RouteError::InvalidPrefix(format!("{}/{}", addr, len)))?;
        Ok(Prefix { net })
    }

    /// Build a prefix from an address and a netmask such as `255.255.0.0`.
    pub fn with_mask(addr: IpAddr, mask: IpAddr) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidPrefix(format!("{}/{}", addr, mask));
        let len = match (addr, mask) {
            (IpAddr::V4(_), IpAddr::V4(m)) => {
                ipnet::ipv4_mask_to_prefix(m).map_err(|_| invalid())?
            }
            (IpAddr::V6(_), IpAddr::V6(m)) => {
                ipnet::ipv6_mask_to_prefix(m).map_err(|_| invalid())?
            }
            _ => return Err(invalid()),
        };
        Prefix::new(addr, len)
    }
}

impl From<IpNet> for Prefix {
    fn from(net: IpNet) -> Self {
        Prefix { net }
    }
}

impl FromStr for Prefix {
    type Err = RouteError;

    /// Accepts `10.1.0.0/16` as well as `10.1.0.0/255.255.0.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RouteError::InvalidPrefix(s.to_string());
        let (addr, len) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        match len.parse::<u8>() {
            Ok(len) => Prefix::new(addr, len),
            Err(_) => {
                let mask: IpAddr = len.parse().map_err(|_| invalid())?;
                Prefix::with_mask(addr, mask)
            }
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.net)
    }
}
