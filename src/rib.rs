use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;

use crate::bgp::{Asn, Prefix, Route};
use crate::error::RouteError;

/// Every known route for one prefix, best first. `selected` is always
/// `alternates[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibEntry {
    pub selected: Route,
    pub alternates: Vec<Route>,
}

impl RibEntry {
    fn new(route: Route) -> Self {
        RibEntry {
            selected: route.clone(),
            alternates: vec![route],
        }
    }

    fn reselect(&mut self) {
        self.alternates.sort_by(Route::preference);
        if let Some(best) = self.alternates.first() {
            self.selected = best.clone();
        }
    }
}

/// Outcome of one table mutation for a single prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub prefix: Prefix,
    pub previous: Option<Route>,
    pub current: Option<Route>,
    /// Number of alternates removed by a withdrawal.
    pub removed: usize,
    /// The route announced to neighbors changed. This can happen while an
    /// installed entry keeps the selection unchanged.
    pub export_changed: bool,
}

impl SelectionChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rib {
    entries: BTreeMap<Prefix, RibEntry>,
}

impl Rib {
    pub fn new() -> Self {
        Rib::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &Prefix> {
        self.entries.keys()
    }

    fn selected(&self, prefix: &Prefix) -> Option<Route> {
        self.entries.get(prefix).map(|e| e.selected.clone())
    }

    /// Best alternate that is not an installed entry.
    pub fn advertised(&self, prefix: &Prefix) -> Option<&Route> {
        self.entries
            .get(prefix)
            .and_then(|e| e.alternates.iter().find(|r| !r.is_installed()))
    }

    /// Add or replace an alternate for `route.prefix` and reselect.
    pub fn insert(&mut self, route: Route) -> SelectionChange {
        let prefix = route.prefix;
        let previous = self.selected(&prefix);
        let advertised = self.advertised(&prefix).cloned();

        match self.entries.get_mut(&prefix) {
            None => {
                self.entries.insert(prefix, RibEntry::new(route));
            }
            Some(entry) => {
                entry.alternates.retain(|a| !route.replaces(a));
                entry.alternates.push(route);
                entry.reselect();
            }
        }

        SelectionChange {
            prefix,
            current: self.selected(&prefix),
            previous,
            removed: 0,
            export_changed: self.advertised(&prefix) != advertised.as_ref(),
        }
    }

    pub fn select(&self, prefix: &Prefix) -> Result<&Route, RouteError> {
        self.entries
            .get(prefix)
            .map(|e| &e.selected)
            .ok_or(RouteError::NoRoute(*prefix))
    }

    pub fn alternates(&self, prefix: &Prefix) -> &[Route] {
        self.entries
            .get(prefix)
            .map(|e| e.alternates.as_slice())
            .unwrap_or(&[])
    }

    /// Remove every alternate for `prefix` learned via `next_hop`.
    pub fn withdraw(&mut self, prefix: &Prefix, next_hop: Asn) -> SelectionChange {
        self.withdraw_by(prefix, |r| r.next_hop == next_hop)
    }

    /// Remove every alternate for `prefix` matching `matches`, clearing the
    /// entry when none remain.
    pub fn withdraw_by<F>(&mut self, prefix: &Prefix, matches: F) -> SelectionChange
    where
        F: Fn(&Route) -> bool,
    {
        let previous = self.selected(prefix);
        let advertised = self.advertised(prefix).cloned();
        let mut removed = 0;
        let mut emptied = false;

        if let Some(entry) = self.entries.get_mut(prefix) {
            let before = entry.alternates.len();
            entry.alternates.retain(|r| !matches(r));
            removed = before - entry.alternates.len();
            if entry.alternates.is_empty() {
                emptied = true;
            } else if removed > 0 {
                entry.reselect();
            }
        }
        if emptied {
            self.entries.remove(prefix);
        }

        SelectionChange {
            prefix: *prefix,
            current: self.selected(prefix),
            previous,
            removed,
            export_changed: self.advertised(prefix) != advertised.as_ref(),
        }
    }

    /// Withdraw everything learned via `next_hop`, across all prefixes.
    pub fn withdraw_next_hop(&mut self, next_hop: Asn) -> Vec<SelectionChange> {
        let affected: Vec<Prefix> = self
            .entries
            .iter()
            .filter(|(_, e)| e.alternates.iter().any(|r| r.next_hop == next_hop))
            .map(|(p, _)| *p)
            .collect();
        log::debug!(
            "Found {} prefixes affected by next hop AS{}",
            affected.len(),
            next_hop
        );

        affected
            .iter()
            .map(|prefix| self.withdraw(prefix, next_hop))
            .collect()
    }

    pub fn dump(&self, owner: Asn) -> TableDump {
        TableDump {
            owner,
            entries: self
                .entries
                .iter()
                .map(|(p, e)| (*p, e.selected.clone()))
                .collect(),
        }
    }
}

/// Selected route per prefix of one speaker, sorted by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDump {
    pub owner: Asn,
    pub entries: Vec<(Prefix, Route)>,
}

impl fmt::Display for TableDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AS{} routing table", self.owner)?;
        if self.entries.is_empty() {
            return writeln!(f, "  (empty)");
        }
        writeln!(
            f,
            "  {:<20} {:<10} {:<7} {:<11} Path",
            "Destination", "NextHop", "Metric", "Source"
        )?;
        for (prefix, route) in &self.entries {
            writeln!(
                f,
                "  {:<20} {:<10} {:<7} {:<11} [{}]",
                prefix.to_string(),
                format!("AS{}", route.next_hop),
                route.metric,
                route.source.to_string(),
                route.path.iter().join(" ")
            )?;
        }
        Ok(())
    }
}
