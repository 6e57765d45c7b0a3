// File: src/speaker/types.rs
//
// This file contains the Speaker struct and its lifecycle state.

use derive_builder::Builder;
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use crate::bgp::{Asn, Prefix, Route};
use crate::error::RouteError;
use crate::rib::{Rib, TableDump};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpeakerState {
    #[default]
    Idle,
    Advertising,
    Converged,
    /// Touched by a leak or an adjacency failure. Kept until the run ends.
    Faulted,
}

impl fmt::Display for SpeakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerState::Idle => write!(f, "Idle"),
            SpeakerState::Advertising => write!(f, "Advertising"),
            SpeakerState::Converged => write!(f, "Converged"),
            SpeakerState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// One simulated autonomous system.
#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct Speaker {
    pub(super) asn: Asn,
    /// Transport address of the speaker, only used when printing.
    #[builder(default, setter(strip_option))]
    pub(super) endpoint: Option<IpAddr>,
    #[builder(default)]
    pub(super) neighbors: BTreeSet<Asn>,
    #[builder(setter(skip), default = "Rib::new()")]
    pub(super) rib: Rib,
    #[builder(setter(skip))]
    pub(super) owned: BTreeSet<Prefix>,
    #[builder(setter(skip))]
    pub(super) state: SpeakerState,
}

impl Speaker {
    #[cfg(test)]
    pub fn new(asn: Asn) -> Self {
        Speaker {
            asn,
            endpoint: None,
            neighbors: BTreeSet::new(),
            rib: Rib::new(),
            owned: BTreeSet::new(),
            state: SpeakerState::Idle,
        }
    }

    pub fn asn(&self) -> Asn {
        self.asn
    }

    pub fn endpoint(&self) -> Option<IpAddr> {
        self.endpoint
    }

    pub fn state(&self) -> SpeakerState {
        self.state
    }

    pub fn rib(&self) -> &Rib {
        &self.rib
    }

    /// Register `asn` as a neighbor. Registration is one-sided.
    pub fn add_neighbor(&mut self, asn: Asn) -> bool {
        self.neighbors.insert(asn)
    }

    pub fn remove_neighbor(&mut self, asn: Asn) -> bool {
        self.neighbors.remove(&asn)
    }

    pub fn is_neighbor(&self, asn: Asn) -> bool {
        self.neighbors.contains(&asn)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = &Asn> {
        self.neighbors.iter()
    }

    /// Whether this speaker legitimately originates `prefix`.
    pub fn owns(&self, prefix: &Prefix) -> bool {
        self.owned.contains(prefix)
    }

    pub fn select(&self, prefix: &Prefix) -> Result<&Route, RouteError> {
        self.rib.select(prefix)
    }

    pub fn dump(&self) -> TableDump {
        self.rib.dump(self.asn)
    }

    pub fn mark_faulted(&mut self) {
        if self.state != SpeakerState::Faulted {
            log::info!("AS{}: {} -> Faulted", self.asn, self.state);
        }
        self.state = SpeakerState::Faulted;
    }

    pub(super) fn mark_advertising(&mut self) {
        if matches!(self.state, SpeakerState::Idle | SpeakerState::Converged) {
            log::debug!("AS{}: {} -> Advertising", self.asn, self.state);
            self.state = SpeakerState::Advertising;
        }
    }

    /// Called once no more events are pending at the current instant.
    pub fn settle(&mut self) {
        if self.state == SpeakerState::Advertising {
            log::debug!("AS{}: Advertising -> Converged", self.asn);
            self.state = SpeakerState::Converged;
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint {
            Some(ip) => write!(f, "AS{} ({})", self.asn, ip),
            None => write!(f, "AS{}", self.asn),
        }
    }
}
