//! The bucketed, post-filter view of one server.

use std::collections::BTreeMap;

use super::{Host, Service, Status};

/// Identity of an item in the filtered set, used to diff two polls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemTuple {
    pub host: String,
    pub service: Option<String>,
    pub status: Status,
}

/// Problem items grouped by severity. Only non-OK items ever appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredView {
    pub hosts: BTreeMap<Status, Vec<Host>>,
    pub services: BTreeMap<Status, Vec<Service>>,
}

impl FilteredView {
    pub fn push_host(&mut self, host: Host) {
        self.hosts.entry(host.status).or_default().push(host);
    }

    pub fn push_service(&mut self, service: Service) {
        self.services.entry(service.status).or_default().push(service);
    }

    pub fn len(&self) -> usize {
        self.hosts.values().map(Vec::len).sum::<usize>()
            + self.services.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-severity counters, always equal to the bucket lengths.
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for (status, items) in &self.hosts {
            counts.add(*status, items.len());
        }
        for (status, items) in &self.services {
            counts.add(*status, items.len());
        }
        counts
    }

    /// Worst severity currently present, `Up` when empty.
    pub fn worst_status(&self) -> Status {
        self.counts().worst()
    }

    /// Sorted identity tuples of every item in the view.
    pub fn tuples(&self) -> Vec<ItemTuple> {
        let mut tuples: Vec<ItemTuple> = self
            .hosts
            .values()
            .flatten()
            .map(|h| ItemTuple {
                host: h.name.clone(),
                service: None,
                status: h.status,
            })
            .chain(self.services.values().flatten().map(|s| ItemTuple {
                host: s.host.clone(),
                service: Some(s.name.clone()),
                status: s.status,
            }))
            .collect();
        tuples.sort();
        tuples
    }

    /// Hosts in display order: DOWN then UNREACHABLE.
    pub fn hosts_in_order(&self) -> impl Iterator<Item = &Host> {
        Status::HOST_PROBLEMS
            .iter()
            .filter_map(|s| self.hosts.get(s))
            .flatten()
    }

    /// Services in display order, most severe bucket first.
    pub fn services_in_order(&self) -> impl Iterator<Item = &Service> {
        Status::SERVICE_PROBLEMS
            .iter()
            .filter_map(|s| self.services.get(s))
            .flatten()
    }
}

/// Number of items per problem state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts(BTreeMap<Status, usize>);

impl StatusCounts {
    pub fn add(&mut self, status: Status, n: usize) {
        if n > 0 {
            *self.0.entry(status).or_insert(0) += n;
        }
    }

    pub fn get(&self, status: Status) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        for (status, n) in &other.0 {
            self.add(*status, *n);
        }
    }

    pub fn worst(&self) -> Status {
        self.0.keys().max().copied().unwrap_or(Status::Up)
    }

    /// Summary like `1 DOWN 3 CRITICAL ` in display order.
    pub fn summary(&self) -> String {
        Status::PROBLEMS
            .iter()
            .filter(|s| self.get(**s) > 0)
            .map(|s| format!("{} {} ", self.get(*s), s))
            .collect()
    }
}
