// File: src/scenario/network.rs
//
// The set of speakers plus the fault injector, and the dispatch of fired
// actions onto them.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::bgp::Asn;
use crate::clock::{EventClock, SimTime};
use crate::error::SimError;
use crate::fault::FaultInjector;
use crate::rib::TableDump;
use crate::speaker::{Speaker, SpeakerState, Update};

use super::action::Action;

/// Every routing table at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub label: String,
    pub at: SimTime,
    pub tables: Vec<TableDump>,
}

impl Snapshot {
    #[cfg(test)]
    pub fn table(&self, asn: Asn) -> Option<&TableDump> {
        self.tables.iter().find(|t| t.owner == asn)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== ROUTING TABLES '{}' at {} ===", self.label, self.at)?;
        for table in &self.tables {
            write!(f, "{}", table)?;
        }
        Ok(())
    }
}

/// Where a speaker ended up when the run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerSummary {
    pub asn: Asn,
    pub endpoint: Option<IpAddr>,
    pub state: SpeakerState,
    pub neighbors: usize,
    pub prefixes: usize,
    /// Alternates across all prefixes, selected ones included.
    pub routes: usize,
}

impl SpeakerSummary {
    fn of(speaker: &Speaker) -> Self {
        let rib = speaker.rib();
        SpeakerSummary {
            asn: speaker.asn(),
            endpoint: speaker.endpoint(),
            state: speaker.state(),
            neighbors: speaker.neighbors().count(),
            prefixes: rib.len(),
            routes: rib.prefixes().map(|p| rib.alternates(p).len()).sum(),
        }
    }
}

impl fmt::Display for SpeakerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint {
            Some(ip) => write!(f, "AS{} ({})", self.asn, ip)?,
            None => write!(f, "AS{}", self.asn)?,
        }
        write!(
            f,
            ": {}, {} neighbors, {} prefixes, {} routes",
            self.state, self.neighbors, self.prefixes, self.routes
        )
    }
}

#[derive(Debug)]
pub struct Network {
    pub(super) speakers: BTreeMap<Asn, Speaker>,
    pub(super) injector: FaultInjector,
    pub(super) snapshots: Vec<Snapshot>,
    propagation_delay: Duration,
    /// Updates scheduled but not yet received.
    in_flight: usize,
}

impl Network {
    pub fn new(propagation_delay: Duration) -> Self {
        Network {
            speakers: BTreeMap::new(),
            injector: FaultInjector::new(),
            snapshots: vec![],
            propagation_delay,
            in_flight: 0,
        }
    }

    pub fn speaker(&self, asn: Asn) -> Option<&Speaker> {
        self.speakers.get(&asn)
    }

    fn speaker_mut(&mut self, asn: Asn) -> Result<&mut Speaker, SimError> {
        self.speakers
            .get_mut(&asn)
            .ok_or(SimError::UnknownSpeaker(asn))
    }

    pub fn tables(&self) -> Vec<TableDump> {
        self.speakers.values().map(|s| s.dump()).collect()
    }

    pub fn summaries(&self) -> Vec<SpeakerSummary> {
        self.speakers.values().map(SpeakerSummary::of).collect()
    }

    /// Run one fired action and schedule the updates it produced.
    pub fn dispatch(
        &mut self,
        clock: &mut EventClock<Action>,
        action: Action,
    ) -> Result<(), SimError> {
        let now = clock.now();
        log::trace!("[{}] {}", now, action);

        let result = self
            .apply(now, action)
            .and_then(|updates| self.deliver(clock, updates));

        if self.in_flight == 0 {
            for speaker in self.speakers.values_mut() {
                speaker.settle();
            }
        }
        result
    }

    fn apply(&mut self, now: SimTime, action: Action) -> Result<Vec<Update>, SimError> {
        let updates = match action {
            Action::Advertise { speaker, route } => self.speaker_mut(speaker)?.advertise(route),
            Action::Receive {
                speaker,
                from,
                route,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.speaker_mut(speaker)?.receive(route, from)
            }
            Action::ReceiveWithdrawal {
                speaker,
                from,
                prefix,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.speaker_mut(speaker)?.receive_withdrawal(&prefix, from)
            }
            Action::InstallForwarding {
                speaker,
                prefix,
                next_hop,
                metric,
            } => {
                self.speaker_mut(speaker)?
                    .install_forwarding(prefix, next_hop, metric);
                vec![]
            }
            Action::Withdraw { speaker, prefix } => self.speaker_mut(speaker)?.withdraw(&prefix),
            Action::Fault(id) => self.injector.inject(id, now, &mut self.speakers)?,
            Action::Dump { label } => {
                log::info!("dumping routing tables '{}' at {}", label, now);
                let snapshot = Snapshot {
                    label,
                    at: now,
                    tables: self.tables(),
                };
                self.snapshots.push(snapshot);
                vec![]
            }
        };
        Ok(updates)
    }

    fn deliver(
        &mut self,
        clock: &mut EventClock<Action>,
        updates: Vec<Update>,
    ) -> Result<(), SimError> {
        for update in updates {
            log::trace!(
                "AS{} -> AS{}: update for {}",
                update.from(),
                update.to(),
                update.prefix()
            );
            clock.schedule_after(self.propagation_delay, Action::from(update))?;
            self.in_flight += 1;
        }
        Ok(())
    }
}
