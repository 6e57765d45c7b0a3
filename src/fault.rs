use std::collections::BTreeMap;
use std::fmt;

use crate::bgp::{Asn, Prefix};
use crate::clock::SimTime;
use crate::error::{FaultError, SimError};
use crate::rib::SelectionChange;
use crate::speaker::{Speaker, Update};

pub const DEFAULT_LEAK_METRIC: u32 = 1;

/// A speaker installs a route for a prefix it does not own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLeak {
    pub speaker: Asn,
    pub prefix: Prefix,
    /// Defaults to the leaking speaker itself.
    pub next_hop: Option<Asn>,
    pub metric: u32,
    /// Also announce the leaked route to neighbors.
    pub readvertise: bool,
}

impl RouteLeak {
    pub fn new(speaker: Asn, prefix: Prefix) -> Self {
        RouteLeak {
            speaker,
            prefix,
            next_hop: None,
            metric: DEFAULT_LEAK_METRIC,
            readvertise: false,
        }
    }
}

/// The adjacency between `a` and `b` goes down for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub a: Asn,
    pub b: Asn,
    pub withdraw_routes: bool,
}

impl LinkFailure {
    pub fn new(a: Asn, b: Asn) -> Self {
        LinkFailure {
            a,
            b,
            withdraw_routes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    RouteLeak(RouteLeak),
    LinkFailure(LinkFailure),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::RouteLeak(l) => write!(f, "route leak of {} at AS{}", l.prefix, l.speaker),
            Fault::LinkFailure(l) => write!(f, "link failure AS{} <-> AS{}", l.a, l.b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaultId(pub usize);

/// What a fired fault did to the tables, and whether that matches the
/// fault class.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultOutcome {
    pub id: FaultId,
    pub at: SimTime,
    pub fault: Fault,
    pub changes: Vec<(Asn, SelectionChange)>,
    /// Prefixes that moved to a surviving alternate after a link failure.
    pub failed_over: Vec<(Asn, Prefix)>,
    /// Prefixes left without any route after a link failure.
    pub lost: Vec<(Asn, Prefix)>,
    pub verdict: Result<(), FaultError>,
}

impl fmt::Display for FaultOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] fault #{}: {}", self.at, self.id.0, self.fault)?;
        for (asn, change) in self.changes.iter().filter(|(_, c)| c.changed()) {
            let show = |r: &Option<crate::bgp::Route>| match r {
                Some(r) => r.to_string(),
                None => "no route".to_string(),
            };
            writeln!(
                f,
                "  AS{} {}: {} => {}",
                asn,
                change.prefix,
                show(&change.previous),
                show(&change.current)
            )?;
        }
        for (asn, prefix) in &self.failed_over {
            writeln!(f, "  AS{} {}: failed over", asn, prefix)?;
        }
        for (asn, prefix) in &self.lost {
            writeln!(f, "  AS{} {}: lost", asn, prefix)?;
        }
        match &self.verdict {
            Ok(()) => writeln!(f, "  verdict: observed"),
            Err(e) => writeln!(f, "  verdict: FAILED ({})", e),
        }
    }
}

#[derive(Debug, Default)]
pub struct FaultInjector {
    faults: Vec<Fault>,
    outcomes: Vec<FaultOutcome>,
    leaks_fired: usize,
    link_failures_fired: usize,
}

impl FaultInjector {
    pub fn new() -> Self {
        FaultInjector::default()
    }

    pub fn register(&mut self, fault: Fault) -> FaultId {
        self.faults.push(fault);
        FaultId(self.faults.len() - 1)
    }

    pub fn get(&self, id: FaultId) -> Option<&Fault> {
        self.faults.get(id.0)
    }

    pub fn outcomes(&self) -> &[FaultOutcome] {
        &self.outcomes
    }

    pub fn leaks_fired(&self) -> usize {
        self.leaks_fired
    }

    pub fn link_failures_fired(&self) -> usize {
        self.link_failures_fired
    }

    /// Apply fault `id` to `speakers` and record what happened. A failed
    /// verdict is kept in the outcome; only missing speakers are errors.
    pub fn inject(
        &mut self,
        id: FaultId,
        at: SimTime,
        speakers: &mut BTreeMap<Asn, Speaker>,
    ) -> Result<Vec<Update>, SimError> {
        let fault = self.get(id).cloned().ok_or(SimError::UnknownFault(id.0))?;

        let injected = match &fault {
            Fault::RouteLeak(leak) => {
                let injected = inject_leak(leak, speakers)?;
                self.leaks_fired += 1;
                injected
            }
            Fault::LinkFailure(link) => {
                let injected = inject_link_failure(link, speakers)?;
                self.link_failures_fired += 1;
                injected
            }
        };

        match &injected.verdict {
            Ok(()) => log::info!("[FAULT] {} at {}", fault, at),
            Err(e) => log::warn!("[FAULT] {} at {}: {}", fault, at, e),
        }
        self.outcomes.push(FaultOutcome {
            id,
            at,
            fault,
            changes: injected.changes,
            failed_over: injected.failed_over,
            lost: injected.lost,
            verdict: injected.verdict,
        });
        Ok(injected.updates)
    }
}

struct Injected {
    changes: Vec<(Asn, SelectionChange)>,
    updates: Vec<Update>,
    failed_over: Vec<(Asn, Prefix)>,
    lost: Vec<(Asn, Prefix)>,
    verdict: Result<(), FaultError>,
}

impl Default for Injected {
    fn default() -> Self {
        Injected {
            changes: vec![],
            updates: vec![],
            failed_over: vec![],
            lost: vec![],
            verdict: Ok(()),
        }
    }
}

fn inject_leak(
    leak: &RouteLeak,
    speakers: &mut BTreeMap<Asn, Speaker>,
) -> Result<Injected, SimError> {
    let speaker = speakers
        .get_mut(&leak.speaker)
        .ok_or(SimError::UnknownSpeaker(leak.speaker))?;
    log::info!("[SECURITY] ROUTE LEAK OCCURRED at AS{}", leak.speaker);

    let next_hop = leak.next_hop.unwrap_or(leak.speaker);
    let change = speaker.install_forwarding(leak.prefix, next_hop, leak.metric);
    speaker.mark_faulted();
    let updates = if leak.readvertise {
        speaker.readvertise(&leak.prefix)
    } else {
        vec![]
    };

    let verdict = check_leak(speaker, leak, next_hop, &change);
    Ok(Injected {
        changes: vec![(leak.speaker, change)],
        updates,
        verdict,
        ..Default::default()
    })
}

/// The leaked entry must be selected, differ from what was selected before,
/// and claim an origin that does not own the prefix.
fn check_leak(
    speaker: &Speaker,
    leak: &RouteLeak,
    next_hop: Asn,
    change: &SelectionChange,
) -> Result<(), FaultError> {
    let speaker_asn = speaker.asn();
    let prefix = leak.prefix;

    if speaker.owns(&prefix) {
        return Err(FaultError::NotALeak {
            speaker: speaker_asn,
            prefix,
        });
    }
    let leaked = match &change.current {
        Some(r) if r.is_installed() && r.next_hop == next_hop && r.metric == leak.metric => r,
        _ => {
            return Err(FaultError::LeakNotObserved {
                speaker: speaker_asn,
                prefix,
            })
        }
    };
    if change.previous.as_ref() == Some(leaked) {
        return Err(FaultError::LeakUnchanged {
            speaker: speaker_asn,
            prefix,
        });
    }
    Ok(())
}

fn inject_link_failure(
    link: &LinkFailure,
    speakers: &mut BTreeMap<Asn, Speaker>,
) -> Result<Injected, SimError> {
    for asn in [link.a, link.b] {
        if !speakers.contains_key(&asn) {
            return Err(SimError::UnknownSpeaker(asn));
        }
    }
    log::info!("[EVENT] Link between AS{} and AS{} disabled", link.a, link.b);

    let mut injected = Injected::default();
    for (local, remote) in [(link.a, link.b), (link.b, link.a)] {
        if let Some(speaker) = speakers.get_mut(&local) {
            let (c, mut u) = speaker.fail_adjacency(remote, link.withdraw_routes);
            injected.changes.extend(c.into_iter().map(|c| (local, c)));
            injected.updates.append(&mut u);
        }
    }

    if link.withdraw_routes {
        injected.verdict = check_failover(link, &mut injected);
    }
    Ok(injected)
}

/// Every selection that went across the failed link must have moved to a
/// surviving alternate. Sorts each such prefix into `failed_over` or `lost`.
fn check_failover(link: &LinkFailure, injected: &mut Injected) -> Result<(), FaultError> {
    let mut verdict = Ok(());
    for (local, change) in &injected.changes {
        let remote = if *local == link.a { link.b } else { link.a };
        if !matches!(&change.previous, Some(r) if r.next_hop == remote) {
            continue;
        }
        match &change.current {
            Some(r) if r.next_hop == remote => {
                return Err(FaultError::StaleRoute {
                    speaker: *local,
                    prefix: change.prefix,
                    via: remote,
                })
            }
            Some(_) => injected.failed_over.push((*local, change.prefix)),
            None => {
                injected.lost.push((*local, change.prefix));
                if verdict.is_ok() {
                    verdict = Err(FaultError::PrefixLost {
                        speaker: *local,
                        prefix: change.prefix,
                        via: remote,
                    });
                }
            }
        }
    }
    verdict
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::bgp::{Route, RouteBuilder, RouteSource};
    use pretty_assertions::assert_eq;

    const A: Asn = 65001;
    const B: Asn = 65002;
    const C: Asn = 65003;

    fn prefix(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    fn route(p: &str, path: Vec<Asn>, next_hop: Asn) -> Route {
        RouteBuilder::default()
            .prefix(prefix(p))
            .path(path)
            .next_hop(next_hop)
            .build()
            .unwrap()
    }

    fn network(links: &[(Asn, Asn)]) -> BTreeMap<Asn, Speaker> {
        let mut speakers = BTreeMap::new();
        for (a, b) in links {
            speakers
                .entry(*a)
                .or_insert_with(|| Speaker::new(*a))
                .add_neighbor(*b);
            speakers
                .entry(*b)
                .or_insert_with(|| Speaker::new(*b))
                .add_neighbor(*a);
        }
        speakers
    }

    #[test]
    fn test_leak_is_observed() {
        let mut speakers = network(&[(A, B)]);
        let p = prefix("10.1.0.0/16");
        speakers.get_mut(&B).unwrap().receive(route("10.1.0.0/16", vec![A], A), A);
        let mut injector = FaultInjector::new();
        let id = injector.register(Fault::RouteLeak(RouteLeak::new(B, p)));

        let updates = injector
            .inject(id, SimTime::from_secs(10), &mut speakers)
            .unwrap();

        assert!(updates.is_empty());
        let outcome = &injector.outcomes()[0];
        assert_eq!(outcome.verdict, Ok(()));
        assert_eq!(outcome.changes[0].1.previous, Some(route("10.1.0.0/16", vec![A], A)));
        let selected = speakers[&B].select(&p).unwrap();
        assert_eq!(selected.source, RouteSource::Installed);
        assert_eq!(selected.origin(), Some(B));
        assert!(!selected.traverses(A));
        assert_eq!(injector.leaks_fired(), 1);
        assert_eq!(speakers[&B].state(), crate::speaker::SpeakerState::Faulted);
    }

    #[test]
    fn test_leak_of_owned_prefix_is_not_a_leak() {
        let mut speakers = network(&[(A, B)]);
        let p = prefix("10.1.0.0/16");
        speakers.get_mut(&A).unwrap().advertise(route("10.1.0.0/16", vec![], 0));
        let mut injector = FaultInjector::new();
        let id = injector.register(Fault::RouteLeak(RouteLeak::new(A, p)));

        injector
            .inject(id, SimTime::from_secs(10), &mut speakers)
            .unwrap();

        assert_eq!(
            injector.outcomes()[0].verdict,
            Err(FaultError::NotALeak {
                speaker: A,
                prefix: p,
            })
        );
    }

    #[test]
    fn test_leak_shadowed_by_better_static_not_observed() {
        let mut speakers = network(&[(A, B)]);
        let p = prefix("10.1.0.0/16");
        speakers.get_mut(&B).unwrap().install_forwarding(p, A, 1);
        let mut injector = FaultInjector::new();
        let mut leak = RouteLeak::new(B, p);
        leak.metric = 50;
        let id = injector.register(Fault::RouteLeak(leak));

        injector
            .inject(id, SimTime::from_secs(10), &mut speakers)
            .unwrap();

        assert_eq!(
            injector.outcomes()[0].verdict,
            Err(FaultError::LeakNotObserved {
                speaker: B,
                prefix: p,
            })
        );
    }

    #[test]
    fn test_repeated_leak_is_unchanged() {
        let mut speakers = network(&[(A, B)]);
        let p = prefix("10.1.0.0/16");
        let mut injector = FaultInjector::new();
        let id = injector.register(Fault::RouteLeak(RouteLeak::new(B, p)));

        injector.inject(id, SimTime::from_secs(10), &mut speakers).unwrap();
        injector.inject(id, SimTime::from_secs(11), &mut speakers).unwrap();

        assert_eq!(injector.outcomes()[0].verdict, Ok(()));
        assert_eq!(
            injector.outcomes()[1].verdict,
            Err(FaultError::LeakUnchanged {
                speaker: B,
                prefix: p,
            })
        );
        assert_eq!(injector.leaks_fired(), 2);
    }

    #[test]
    fn test_readvertised_leak_reaches_neighbors() {
        let mut speakers = network(&[(A, B), (B, C)]);
        let p = prefix("10.1.0.0/16");
        let mut injector = FaultInjector::new();
        let mut leak = RouteLeak::new(B, p);
        leak.readvertise = true;
        let id = injector.register(Fault::RouteLeak(leak));

        let updates = injector
            .inject(id, SimTime::from_secs(10), &mut speakers)
            .unwrap();

        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.from() == B && u.prefix() == p));
    }

    #[test]
    fn test_link_failure_triggers_failover() {
        // C hears the prefix directly from A and, longer, through B
        let mut speakers = network(&[(A, C), (B, C)]);
        let p = prefix("10.1.0.0/16");
        let c = speakers.get_mut(&C).unwrap();
        c.receive(route("10.1.0.0/16", vec![A], A), A);
        c.receive(route("10.1.0.0/16", vec![A, 65009, B], B), B);
        let mut injector = FaultInjector::new();
        let id = injector.register(Fault::LinkFailure(LinkFailure::new(A, C)));

        let updates = injector
            .inject(id, SimTime::from_secs(5), &mut speakers)
            .unwrap();

        assert_eq!(injector.outcomes()[0].verdict, Ok(()));
        assert_eq!(speakers[&C].select(&p).unwrap().next_hop, B);
        assert!(!speakers[&A].is_neighbor(C));
        assert!(!speakers[&C].is_neighbor(A));
        // B is on the new path, so it is only told to forget C's old route
        assert!(updates
            .iter()
            .all(|u| matches!(u, Update::Withdraw { from: C, to: B, .. })));
        assert_eq!(injector.link_failures_fired(), 1);
        assert_eq!(injector.outcomes()[0].failed_over, vec![(C, p)]);
        assert!(injector.outcomes()[0].lost.is_empty());
    }

    #[test]
    fn test_link_failure_without_alternate_loses_prefix() {
        let mut speakers = network(&[(A, C)]);
        let p = prefix("10.1.0.0/16");
        speakers.get_mut(&A).unwrap().advertise(route("10.1.0.0/16", vec![], 0));
        speakers
            .get_mut(&C)
            .unwrap()
            .receive(route("10.1.0.0/16", vec![A], A), A);
        let mut injector = FaultInjector::new();
        let id = injector.register(Fault::LinkFailure(LinkFailure::new(A, C)));

        injector.inject(id, SimTime::from_secs(5), &mut speakers).unwrap();

        let outcome = &injector.outcomes()[0];
        assert_eq!(
            outcome.verdict,
            Err(FaultError::PrefixLost {
                speaker: C,
                prefix: p,
                via: A,
            })
        );
        assert_eq!(outcome.lost, vec![(C, p)]);
        assert!(outcome.failed_over.is_empty());
        assert!(speakers[&C].select(&p).is_err());
        assert!(outcome.to_string().contains("AS65003 10.1.0.0/16: lost"));
    }

    #[test]
    fn test_link_failure_without_withdraw_leaves_stale_route() {
        let mut speakers = network(&[(A, C)]);
        speakers
            .get_mut(&C)
            .unwrap()
            .receive(route("10.1.0.0/16", vec![A], A), A);
        let mut injector = FaultInjector::new();
        let mut failure = LinkFailure::new(A, C);
        failure.withdraw_routes = false;
        let id = injector.register(Fault::LinkFailure(failure));

        injector.inject(id, SimTime::from_secs(5), &mut speakers).unwrap();

        assert_eq!(injector.outcomes()[0].verdict, Ok(()));
        assert_eq!(speakers[&C].select(&prefix("10.1.0.0/16")).unwrap().next_hop, A);
    }

    #[test]
    fn test_unknown_speaker_is_an_error() {
        let mut speakers = network(&[(A, B)]);
        let mut injector = FaultInjector::new();
        let id = injector.register(Fault::LinkFailure(LinkFailure::new(A, 65099)));

        let err = injector
            .inject(id, SimTime::from_secs(5), &mut speakers)
            .unwrap_err();

        assert_eq!(err, SimError::UnknownSpeaker(65099));
        // the existing end is left untouched
        assert!(speakers[&A].is_neighbor(B));
        assert!(injector.outcomes().is_empty());
    }

    #[test]
    fn test_unknown_fault_id() {
        let mut speakers = network(&[(A, B)]);
        let mut injector = FaultInjector::new();

        assert_eq!(
            injector.inject(FaultId(3), SimTime::ZERO, &mut speakers),
            Err(SimError::UnknownFault(3))
        );
    }
}
