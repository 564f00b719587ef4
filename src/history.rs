//! Event history: which problems are new since the user last looked, and
//! which still await a custom notification action.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{FilteredView, Host, ItemTuple, Service, Status};

/// Stable fingerprint of a host problem. Doubles as the event name handed to
/// custom notification actions.
pub fn host_event_key(server: &str, host: &Host) -> String {
    join_key(&[
        server,
        &host.site,
        &host.name,
        host.status.as_str(),
        &host.status_information,
    ])
}

pub fn service_event_key(server: &str, service: &Service) -> String {
    join_key(&[
        server,
        &service.site,
        &service.host,
        &service.name,
        service.status.as_str(),
        &service.status_information,
    ])
}

fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Event keys of every item in the view.
pub fn view_event_keys(server: &str, view: &FilteredView) -> Vec<String> {
    view.hosts_in_order()
        .map(|h| host_event_key(server, h))
        .chain(view.services_in_order().map(|s| service_event_key(server, s)))
        .collect()
}

/// Worst severity among tuples present now but not in `previous`; `Up` when
/// the current set is a subset of the previous one.
pub fn worst_diff(previous: &[ItemTuple], current: &[ItemTuple]) -> Status {
    let before: BTreeSet<&ItemTuple> = previous.iter().collect();
    current
        .iter()
        .filter(|t| !before.contains(t))
        .map(|t| t.status)
        .max()
        .unwrap_or(Status::Up)
}

#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    history: BTreeMap<String, bool>,
    notification: BTreeMap<String, bool>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync with the keys of the latest filtered view. Vanished events are
    /// dropped. With highlighting on, unseen ones are added fresh and queued
    /// for custom notification actions; with it off nothing is recorded.
    pub fn update(&mut self, current: &[String], highlight_new_events: bool) {
        let now: BTreeSet<&str> = current.iter().map(String::as_str).collect();
        self.history.retain(|k, _| now.contains(k.as_str()));
        self.notification.retain(|k, _| now.contains(k.as_str()));

        if !highlight_new_events {
            return;
        }
        for key in current {
            if !self.history.contains_key(key) {
                self.history.insert(key.clone(), true);
                self.notification.insert(key.clone(), true);
            }
        }
    }

    pub fn is_fresh(&self, key: &str) -> bool {
        self.history.get(key).copied().unwrap_or(false)
    }

    pub fn has_fresh(&self) -> bool {
        self.history.values().any(|fresh| *fresh)
    }

    pub fn fresh_count(&self) -> usize {
        self.history.values().filter(|fresh| **fresh).count()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// User has seen the status window.
    pub fn unfresh_all(&mut self) {
        for fresh in self.history.values_mut() {
            *fresh = false;
        }
    }

    /// Events not yet handed to a custom notification action.
    pub fn pending_notifications(&self) -> Vec<String> {
        self.notification
            .iter()
            .filter(|(_, pending)| **pending)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn mark_notified(&mut self) {
        for pending in self.notification.values_mut() {
            *pending = false;
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.notification.clear();
    }
}
