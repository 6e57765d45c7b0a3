use itertools::Itertools;
use serde_derive::Deserialize;
use std::net::IpAddr;
use std::path::Path;

use crate::bgp::{Asn, Prefix};
use crate::clock::SimTime;
use crate::error::ConfigError;

pub const DEFAULT_STOP_TIME: f64 = 25.0;
pub const DEFAULT_PROPAGATION_DELAY: f64 = 0.0;
pub const DEFAULT_STATIC_METRIC: u32 = 1;

/// A scenario file. Times are in seconds of simulated time.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub stop_time: Option<f64>,
    pub propagation_delay: Option<f64>,
    pub speakers: Vec<Speaker>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub advertisements: Vec<Advertisement>,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
    #[serde(default)]
    pub faults: Vec<Fault>,
    #[serde(default)]
    pub dumps: Vec<Dump>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Speaker {
    pub asn: Asn,
    pub endpoint: Option<IpAddr>,
    /// One-sided neighbor registrations; see `links` for symmetric ones.
    #[serde(default)]
    pub neighbors: Vec<Asn>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Link {
    pub a: Asn,
    pub b: Asn,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Advertisement {
    pub at: f64,
    pub speaker: Asn,
    pub prefix: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Withdrawal {
    pub at: f64,
    pub speaker: Asn,
    pub prefix: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StaticRoute {
    pub at: f64,
    pub speaker: Asn,
    pub prefix: String,
    pub next_hop: Asn,
    pub metric: Option<u32>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    Leak {
        at: f64,
        speaker: Asn,
        prefix: String,
        next_hop: Option<Asn>,
        metric: Option<u32>,
        readvertise: Option<bool>,
    },
    LinkFailure {
        at: f64,
        a: Asn,
        b: Asn,
        withdraw_routes: Option<bool>,
    },
}

impl Fault {
    pub fn at(&self) -> f64 {
        match self {
            Fault::Leak { at, .. } | Fault::LinkFailure { at, .. } => *at,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Dump {
    pub at: f64,
    pub label: Option<String>,
}

impl Config {
    pub fn apply_defaults(&mut self) {
        self.stop_time = match self.stop_time {
            Some(t) => Some(t),
            None => Some(DEFAULT_STOP_TIME),
        };

        self.propagation_delay = match self.propagation_delay {
            Some(d) => Some(d),
            None => Some(DEFAULT_PROPAGATION_DELAY),
        };

        for dump in &mut self.dumps {
            if dump.label.is_none() {
                dump.label = Some(format!("t={}s", dump.at));
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let duplicates = self.speakers.iter().map(|s| s.asn).duplicates().join(", ");
        if !duplicates.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "duplicate speakers: {}",
                duplicates
            )));
        }

        let times = self
            .stop_time
            .iter()
            .chain(self.propagation_delay.iter())
            .copied()
            .chain(self.advertisements.iter().map(|a| a.at))
            .chain(self.withdrawals.iter().map(|w| w.at))
            .chain(self.static_routes.iter().map(|s| s.at))
            .chain(self.faults.iter().map(|f| f.at()))
            .chain(self.dumps.iter().map(|d| d.at));
        for t in times {
            seconds(t)?;
        }

        let prefixes = self
            .advertisements
            .iter()
            .map(|a| a.prefix.as_str())
            .chain(self.withdrawals.iter().map(|w| w.prefix.as_str()))
            .chain(self.static_routes.iter().map(|s| s.prefix.as_str()))
            .chain(self.faults.iter().filter_map(|f| match f {
                Fault::Leak { prefix, .. } => Some(prefix.as_str()),
                Fault::LinkFailure { .. } => None,
            }));
        for p in prefixes {
            prefix(p)?;
        }
        Ok(())
    }
}

/// Convert a time in seconds, rejecting negative and non-finite values.
pub fn seconds(value: f64) -> Result<SimTime, ConfigError> {
    SimTime::try_from_secs_f64(value)
        .ok_or_else(|| ConfigError::Invalid(format!("invalid time: {}", value)))
}

pub fn prefix(value: &str) -> Result<Prefix, ConfigError> {
    value
        .parse()
        .map_err(|e: crate::error::RouteError| ConfigError::Invalid(e.to_string()))
}

pub fn parse_config(s: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    config.apply_defaults();
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
    parse_config(&s)
}
