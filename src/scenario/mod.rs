// File: src/scenario/mod.rs
//
// Scenario driver: builds the speaker graph, schedules advertisements,
// overrides, faults and dumps on the event clock, runs it and reports.

mod action;
mod network;


use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::bgp::{Asn, Prefix, Route, RouteBuilder, RouteSource};
use crate::clock::{ActionFailure, EventClock, SimTime};
use crate::config;
use crate::error::SimError;
use crate::fault::{Fault, FaultId, FaultOutcome, LinkFailure, RouteLeak};
use crate::rib::TableDump;
use crate::speaker::{Speaker, SpeakerBuilder};

pub use action::Action;
pub use network::{Network, Snapshot, SpeakerSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub stop_time: SimTime,
    pub propagation_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            stop_time: SimTime::from_secs(25),
            propagation_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct Scenario {
    clock: EventClock<Action>,
    network: Network,
    settings: Settings,
}

impl Scenario {
    pub fn new(settings: Settings) -> Self {
        Scenario {
            clock: EventClock::new(),
            network: Network::new(settings.propagation_delay),
            settings,
        }
    }

    /// Build a scenario from a parsed scenario file.
    pub fn from_config(config: &config::Config) -> Result<Self, SimError> {
        let stop_time = config::seconds(config.stop_time.unwrap_or(config::DEFAULT_STOP_TIME))?;
        let propagation_delay = config::seconds(
            config
                .propagation_delay
                .unwrap_or(config::DEFAULT_PROPAGATION_DELAY),
        )?
        .as_duration();
        let mut scenario = Scenario::new(Settings {
            stop_time,
            propagation_delay,
        });

        for s in &config.speakers {
            let mut builder = SpeakerBuilder::default();
            builder
                .asn(s.asn)
                .neighbors(s.neighbors.iter().copied().collect::<BTreeSet<Asn>>());
            if let Some(endpoint) = s.endpoint {
                builder.endpoint(endpoint);
            }
            let speaker = builder
                .build()
                .map_err(|e| SimError::Builder(e.to_string()))?;
            scenario.add_speaker(speaker)?;
        }

        for link in &config.links {
            scenario.connect(link.a, link.b)?;
        }

        for s in &config.static_routes {
            scenario.install_at(
                config::seconds(s.at)?,
                s.speaker,
                config::prefix(&s.prefix)?,
                s.next_hop,
                s.metric.unwrap_or(config::DEFAULT_STATIC_METRIC),
            )?;
        }

        for a in &config.advertisements {
            scenario.advertise_at(config::seconds(a.at)?, a.speaker, config::prefix(&a.prefix)?)?;
        }

        for w in &config.withdrawals {
            scenario.withdraw_at(config::seconds(w.at)?, w.speaker, config::prefix(&w.prefix)?)?;
        }

        for f in &config.faults {
            let fault = match f {
                config::Fault::Leak {
                    speaker,
                    prefix,
                    next_hop,
                    metric,
                    readvertise,
                    ..
                } => {
                    let mut leak = RouteLeak::new(*speaker, config::prefix(prefix)?);
                    leak.next_hop = *next_hop;
                    leak.metric = metric.unwrap_or(leak.metric);
                    leak.readvertise = readvertise.unwrap_or(leak.readvertise);
                    Fault::RouteLeak(leak)
                }
                config::Fault::LinkFailure {
                    a,
                    b,
                    withdraw_routes,
                    ..
                } => {
                    let mut failure = LinkFailure::new(*a, *b);
                    failure.withdraw_routes = withdraw_routes.unwrap_or(failure.withdraw_routes);
                    Fault::LinkFailure(failure)
                }
            };
            scenario.inject_at(config::seconds(f.at())?, fault)?;
        }

        for d in &config.dumps {
            let label = d.label.clone().unwrap_or_else(|| format!("t={}s", d.at));
            scenario.dump_at(config::seconds(d.at)?, label)?;
        }

        Ok(scenario)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn add_speaker(&mut self, speaker: Speaker) -> Result<(), SimError> {
        let asn = speaker.asn();
        if self.network.speakers.contains_key(&asn) {
            return Err(SimError::DuplicateSpeaker(asn));
        }
        log::debug!("adding speaker {}", speaker);
        self.network.speakers.insert(asn, speaker);
        Ok(())
    }

    /// Make `a` and `b` neighbors of each other.
    pub fn connect(&mut self, a: Asn, b: Asn) -> Result<(), SimError> {
        self.require(b)?;
        self.speaker_mut(a)?.add_neighbor(b);
        self.speaker_mut(b)?.add_neighbor(a);
        Ok(())
    }

    pub fn speaker(&self, asn: Asn) -> Option<&Speaker> {
        self.network.speaker(asn)
    }

    fn speaker_mut(&mut self, asn: Asn) -> Result<&mut Speaker, SimError> {
        self.network
            .speakers
            .get_mut(&asn)
            .ok_or(SimError::UnknownSpeaker(asn))
    }

    fn require(&self, asn: Asn) -> Result<(), SimError> {
        match self.network.speakers.contains_key(&asn) {
            true => Ok(()),
            false => Err(SimError::UnknownSpeaker(asn)),
        }
    }

    pub fn schedule(&mut self, at: SimTime, action: Action) -> Result<(), SimError> {
        self.clock.schedule(at, action)?;
        Ok(())
    }

    /// `speaker` originates `prefix` at `at`.
    pub fn advertise_at(&mut self, at: SimTime, speaker: Asn, prefix: Prefix) -> Result<(), SimError> {
        self.require(speaker)?;
        let route: Route = RouteBuilder::default()
            .prefix(prefix)
            .path(vec![speaker])
            .next_hop(speaker)
            .source(RouteSource::Originated)
            .build()
            .map_err(|e| SimError::Builder(e.to_string()))?;
        self.schedule(at, Action::Advertise { speaker, route })
    }

    pub fn withdraw_at(&mut self, at: SimTime, speaker: Asn, prefix: Prefix) -> Result<(), SimError> {
        self.require(speaker)?;
        self.schedule(at, Action::Withdraw { speaker, prefix })
    }

    pub fn install_at(
        &mut self,
        at: SimTime,
        speaker: Asn,
        prefix: Prefix,
        next_hop: Asn,
        metric: u32,
    ) -> Result<(), SimError> {
        self.require(speaker)?;
        self.schedule(
            at,
            Action::InstallForwarding {
                speaker,
                prefix,
                next_hop,
                metric,
            },
        )
    }

    pub fn inject_at(&mut self, at: SimTime, fault: Fault) -> Result<FaultId, SimError> {
        match &fault {
            Fault::RouteLeak(leak) => self.require(leak.speaker)?,
            Fault::LinkFailure(link) => {
                self.require(link.a)?;
                self.require(link.b)?;
            }
        }
        // check the time before registering, so a rejected fault leaves no trace
        if at < self.clock.now() {
            return Err(crate::error::ClockError::InvalidTime {
                requested: at,
                now: self.clock.now(),
            }
            .into());
        }
        let id = self.network.injector.register(fault);
        self.schedule(at, Action::Fault(id))?;
        Ok(id)
    }

    pub fn dump_at(&mut self, at: SimTime, label: impl Into<String>) -> Result<(), SimError> {
        self.schedule(at, Action::Dump { label: label.into() })
    }

    /// Fire everything up to the configured stop time.
    pub fn run(&mut self) -> ScenarioReport {
        let stop = self.settings.stop_time;
        log::info!(
            "running {} speakers until {}",
            self.network.speakers.len(),
            stop
        );

        let network = &mut self.network;
        let failures = self
            .clock
            .run(stop, |clock, action| network.dispatch(clock, action));

        ScenarioReport {
            stopped_at: self.now(),
            events_fired: self.clock.fired(),
            snapshots: self.network.snapshots.clone(),
            faults: self.network.injector.outcomes().to_vec(),
            leaks_fired: self.network.injector.leaks_fired(),
            link_failures_fired: self.network.injector.link_failures_fired(),
            failures,
            speakers: self.network.summaries(),
            tables: self.dump_all(),
        }
    }

    pub fn select(&self, asn: Asn, prefix: &Prefix) -> Result<&Route, SimError> {
        let speaker = self.speaker(asn).ok_or(SimError::UnknownSpeaker(asn))?;
        Ok(speaker.select(prefix)?)
    }

    pub fn dump_all(&self) -> Vec<TableDump> {
        self.network.tables()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub stopped_at: SimTime,
    pub events_fired: u64,
    pub snapshots: Vec<Snapshot>,
    pub faults: Vec<FaultOutcome>,
    pub leaks_fired: usize,
    pub link_failures_fired: usize,
    pub failures: Vec<ActionFailure<SimError>>,
    pub speakers: Vec<SpeakerSummary>,
    pub tables: Vec<TableDump>,
}

impl ScenarioReport {
    /// No action failed and every fault had the expected effect.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.faults.iter().all(|f| f.verdict.is_ok())
    }

    #[cfg(test)]
    pub fn snapshot(&self, label: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.label == label)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulation stopped at {} after {} events ({} leaks, {} link failures)",
            self.stopped_at, self.events_fired, self.leaks_fired, self.link_failures_fired
        )?;
        for snapshot in &self.snapshots {
            writeln!(f)?;
            write!(f, "{}", snapshot)?;
        }
        if !self.faults.is_empty() {
            writeln!(f, "\n=== FAULTS ===")?;
            for fault in &self.faults {
                write!(f, "{}", fault)?;
            }
        }
        if !self.failures.is_empty() {
            writeln!(f, "\n=== FAILED ACTIONS ===")?;
            for failure in &self.failures {
                writeln!(f, "[{}] {}", failure.at, failure.error)?;
            }
        }
        writeln!(f, "\n=== SPEAKERS ===")?;
        for speaker in &self.speakers {
            writeln!(f, "{}", speaker)?;
        }
        writeln!(f, "\n=== FINAL ROUTING TABLES ===")?;
        for table in &self.tables {
            write!(f, "{}", table)?;
        }
        Ok(())
    }
}
