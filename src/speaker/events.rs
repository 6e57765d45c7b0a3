// File: src/speaker/events.rs
//
// Outbound updates produced by a speaker. The driver turns each one into a
// receive event on the addressed neighbor.

use crate::bgp::{Asn, Prefix, Route};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Announce { from: Asn, to: Asn, route: Route },
    Withdraw { from: Asn, to: Asn, prefix: Prefix },
}

impl Update {
    pub fn from(&self) -> Asn {
        match self {
            Update::Announce { from, .. } | Update::Withdraw { from, .. } => *from,
        }
    }

    pub fn to(&self) -> Asn {
        match self {
            Update::Announce { to, .. } | Update::Withdraw { to, .. } => *to,
        }
    }

    pub fn prefix(&self) -> Prefix {
        match self {
            Update::Announce { route, .. } => route.prefix,
            Update::Withdraw { prefix, .. } => *prefix,
        }
    }
}
