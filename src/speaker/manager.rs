// File: src/speaker/manager.rs
//
// Route processing for a speaker: local origination, updates received from
// neighbors, forwarding overrides and adjacency loss.

use crate::bgp::{Asn, Prefix, Route, RouteSource};
use crate::rib::SelectionChange;

use super::events::Update;
use super::types::Speaker;

impl Speaker {
    /// Originate `route` locally and announce it to every neighbor.
    pub fn advertise(&mut self, route: Route) -> Vec<Update> {
        let mut route = route;
        if !route.traverses(self.asn) {
            route.path.push(self.asn);
        }
        route.next_hop = self.asn;
        route.metric = 0;
        route.source = RouteSource::Originated;

        log::info!("[BGP] AS{} advertises {}", self.asn, route.prefix);
        self.owned.insert(route.prefix);
        let change = self.rib.insert(route.clone());
        if change.changed() {
            self.mark_advertising();
        }
        self.export(&route)
    }

    /// Process an announcement from `from`.
    pub fn receive(&mut self, route: Route, from: Asn) -> Vec<Update> {
        if !self.is_neighbor(from) {
            log::debug!(
                "AS{}: ignoring {} from non-neighbor AS{}",
                self.asn,
                route.prefix,
                from
            );
            return vec![];
        }
        if route.traverses(self.asn) {
            log::debug!(
                "AS{}: loop detected, dropping {} from AS{}",
                self.asn,
                route,
                from
            );
            return vec![];
        }

        let route = Route {
            next_hop: from,
            metric: 0,
            source: RouteSource::Learned,
            ..route
        };
        log::debug!(
            "AS{}: received {} originated by AS{}",
            self.asn,
            route,
            route.origin().unwrap_or(from)
        );
        let change = self.rib.insert(route);
        self.propagate(&change)
    }

    /// Process a withdrawal of `prefix` from `from`. Installed entries via
    /// `from` are operator state and stay.
    pub fn receive_withdrawal(&mut self, prefix: &Prefix, from: Asn) -> Vec<Update> {
        if !self.is_neighbor(from) {
            log::debug!(
                "AS{}: ignoring withdrawal of {} from non-neighbor AS{}",
                self.asn,
                prefix,
                from
            );
            return vec![];
        }
        let change = self
            .rib
            .withdraw_by(prefix, |r| r.next_hop == from && !r.is_installed());
        if change.removed > 0 {
            log::debug!("AS{}: AS{} withdrew {}", self.asn, from, prefix);
        }
        self.propagate(&change)
    }

    /// Write a forwarding entry directly, without announcing it.
    pub fn install_forwarding(
        &mut self,
        prefix: Prefix,
        next_hop: Asn,
        metric: u32,
    ) -> SelectionChange {
        let route = Route {
            prefix,
            path: vec![self.asn],
            next_hop,
            metric,
            source: RouteSource::Installed,
        };
        log::info!(
            "AS{}: installing {} via AS{} metric {}",
            self.asn,
            prefix,
            next_hop,
            metric
        );
        let change = self.rib.insert(route);
        if change.changed() {
            self.mark_advertising();
        }
        change
    }

    /// Stop originating `prefix`. Withdrawing a prefix that is not
    /// originated here does nothing.
    pub fn withdraw(&mut self, prefix: &Prefix) -> Vec<Update> {
        self.owned.remove(prefix);
        let change = self
            .rib
            .withdraw_by(prefix, |r| r.source == RouteSource::Originated);
        if change.removed == 0 {
            log::debug!("AS{}: nothing to withdraw for {}", self.asn, prefix);
            return vec![];
        }

        log::info!("[BGP] AS{} withdraws {}", self.asn, prefix);
        self.propagate(&change)
    }

    /// Announce whatever is selected for `prefix`, installed entries
    /// included.
    pub fn readvertise(&self, prefix: &Prefix) -> Vec<Update> {
        match self.rib.select(prefix) {
            Ok(route) => self.export(route),
            Err(_) => vec![],
        }
    }

    /// Drop the adjacency to `neighbor`. With `withdraw_routes`, everything
    /// learned through it is withdrawn and the new selections propagated.
    pub fn fail_adjacency(
        &mut self,
        neighbor: Asn,
        withdraw_routes: bool,
    ) -> (Vec<SelectionChange>, Vec<Update>) {
        if self.remove_neighbor(neighbor) {
            log::info!("AS{}: adjacency to AS{} down", self.asn, neighbor);
        }
        self.mark_faulted();
        if !withdraw_routes {
            return (vec![], vec![]);
        }

        let changes = self.rib.withdraw_next_hop(neighbor);
        let mut updates = vec![];
        for change in &changes {
            updates.append(&mut self.propagate(change));
        }
        (changes, updates)
    }

    /// Neighbors hear about a change only when the best non-installed route
    /// moved, whatever happened to the selection.
    fn propagate(&mut self, change: &SelectionChange) -> Vec<Update> {
        if change.changed() || change.export_changed {
            self.mark_advertising();
        }
        if !change.export_changed {
            return vec![];
        }
        self.announce_current(&change.prefix)
    }

    fn announce_current(&self, prefix: &Prefix) -> Vec<Update> {
        match self.rib.advertised(prefix) {
            Some(route) => self.export(route),
            None => self
                .neighbors
                .iter()
                .map(|&to| Update::Withdraw {
                    from: self.asn,
                    to,
                    prefix: *prefix,
                })
                .collect(),
        }
    }

    /// A neighbor already on the path gets a withdrawal instead, clearing
    /// anything it still holds via this speaker.
    fn export(&self, route: &Route) -> Vec<Update> {
        let exported = route.exported_by(self.asn);
        self.neighbors
            .iter()
            .map(|&to| {
                if exported.traverses(to) {
                    Update::Withdraw {
                        from: self.asn,
                        to,
                        prefix: route.prefix,
                    }
                } else {
                    log::debug!("  -> {} sent to AS{}", route.prefix, to);
                    Update::Announce {
                        from: self.asn,
                        to,
                        route: exported.clone(),
                    }
                }
            })
            .collect()
    }
}
