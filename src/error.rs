use thiserror::Error;

use crate::bgp::{Asn, Prefix};
use crate::clock::SimTime;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown speaker AS{0}")]
    UnknownSpeaker(Asn),

    #[error("Speaker AS{0} already exists")]
    DuplicateSpeaker(Asn),

    #[error("Unknown fault #{0}")]
    UnknownFault(usize),

    #[error("Failed to build {0}")]
    Builder(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Cannot schedule at {requested}, simulated time is already {now}")]
    InvalidTime { requested: SimTime, now: SimTime },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("No route to {0}")]
    NoRoute(Prefix),

    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A fault fired but the routing tables did not end up the way the fault
/// class requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaultError {
    #[error("Leak of {prefix} at AS{speaker} is not the selected route")]
    LeakNotObserved { speaker: Asn, prefix: Prefix },

    #[error("Leak of {prefix} at AS{speaker} left the selected route unchanged")]
    LeakUnchanged { speaker: Asn, prefix: Prefix },

    #[error("AS{speaker} legitimately originates {prefix}, installing it is not a leak")]
    NotALeak { speaker: Asn, prefix: Prefix },

    #[error("AS{speaker} has no route left for {prefix} after losing AS{via}")]
    PrefixLost {
        speaker: Asn,
        prefix: Prefix,
        via: Asn,
    },

    #[error("AS{speaker} still selects {prefix} via failed neighbor AS{via}")]
    StaleRoute {
        speaker: Asn,
        prefix: Prefix,
        via: Asn,
    },
}
