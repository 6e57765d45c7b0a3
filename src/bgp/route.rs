use derive_builder::Builder;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt;

use super::prefix::Prefix;

/// Autonomous system number.
pub type Asn = u32;

/// Where a route in a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RouteSource {
    /// Advertised by the speaker itself.
    Originated,
    /// Received from a neighbor.
    #[default]
    Learned,
    /// Written directly into the forwarding view, bypassing advertisement.
    Installed,
}

impl RouteSource {
    fn rank(&self) -> u8 {
        match self {
            RouteSource::Installed => 0,
            RouteSource::Originated => 1,
            RouteSource::Learned => 2,
        }
    }
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSource::Originated => write!(f, "originated"),
            RouteSource::Learned => write!(f, "learned"),
            RouteSource::Installed => write!(f, "installed"),
        }
    }
}

#[derive(Builder, Debug, Clone, PartialEq, Eq, Hash)]
#[builder(setter(into))]
pub struct Route {
    pub prefix: Prefix,
    /// AS path, origin first.
    #[builder(default)]
    pub path: Vec<Asn>,
    pub next_hop: Asn,
    #[builder(default)]
    pub metric: u32,
    #[builder(default)]
    pub source: RouteSource,
}

impl Route {
    /// The AS that originated this route.
    pub fn origin(&self) -> Option<Asn> {
        self.path.first().copied()
    }

    pub fn path_len(&self) -> usize {
        self.path.len()
    }

    pub fn traverses(&self, asn: Asn) -> bool {
        self.path.contains(&asn)
    }

    pub fn is_installed(&self) -> bool {
        self.source == RouteSource::Installed
    }

    /// Two routes occupy the same alternate slot when they share next hop and
    /// kind; a newer one replaces the older.
    pub fn replaces(&self, other: &Route) -> bool {
        self.prefix == other.prefix
            && self.next_hop == other.next_hop
            && self.is_installed() == other.is_installed()
    }

    /// The route as announced by `asn` to its neighbors.
    pub fn exported_by(&self, asn: Asn) -> Route {
        let mut path = self.path.clone();
        if path.last() != Some(&asn) {
            path.push(asn);
        }
        Route {
            prefix: self.prefix,
            path,
            next_hop: asn,
            metric: 0,
            source: RouteSource::Learned,
        }
    }

    /// Compare two candidates for the same prefix. `Less` means `self` is
    /// preferred.
    pub fn preference(&self, other: &Route) -> Ordering {
        let installed = other.is_installed().cmp(&self.is_installed());
        if installed != Ordering::Equal {
            return installed;
        }

        if self.is_installed() {
            let metric = self.metric.cmp(&other.metric);
            if metric != Ordering::Equal {
                return metric;
            }
        }

        let path_len = self.path_len().cmp(&other.path_len());
        if path_len != Ordering::Equal {
            return path_len;
        }

        let next_hop = self.next_hop.cmp(&other.next_hop);
        if next_hop != Ordering::Equal {
            return next_hop;
        }

        let source = self.source.rank().cmp(&other.source.rank());
        if source != Ordering::Equal {
            return source;
        }

        self.path.cmp(&other.path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via AS{} path [{}] metric {} ({})",
            self.prefix,
            self.next_hop,
            self.path.iter().join(" "),
            self.metric,
            self.source
        )
    }
}
