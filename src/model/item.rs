//! Host and service entities as parsed by a backend adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Status;

/// All hosts of one server, keyed by host name.
pub type HostMap = BTreeMap<String, Host>;

/// Whether the current state is confirmed by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    Soft,
    Hard,
}

/// Transient per-item flags reported by the monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFlags {
    pub acknowledged: bool,
    pub scheduled_downtime: bool,
    pub notifications_disabled: bool,
    pub passive_only: bool,
    pub flapping: bool,
}

impl ItemFlags {
    /// Flag letters as shown in the flags columns.
    pub fn letters(&self) -> String {
        let mut s = String::new();
        if self.acknowledged {
            s.push('A');
        }
        if self.scheduled_downtime {
            s.push('D');
        }
        if self.flapping {
            s.push('F');
        }
        if self.passive_only {
            s.push('P');
        }
        s
    }
}

/// Parse an attempt string like `2/3` into (current, max).
pub fn parse_attempt(attempt: &str) -> Option<(u32, u32)> {
    let (current, max) = attempt.split_once('/')?;
    Some((current.trim().parse().ok()?, max.trim().parse().ok()?))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    /// Address recorded by the monitor, IP or DNS name.
    pub address: String,
    /// Checkmk site or similar sub-instance, empty when unused.
    pub site: String,
    pub status: Status,
    pub status_type: Option<StateType>,
    pub last_check: String,
    pub duration: String,
    pub attempt: String,
    pub status_information: String,
    pub groups: String,
    pub flags: ItemFlags,
    pub services: BTreeMap<String, Service>,
}

impl Host {
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            status,
            ..Default::default()
        }
    }

    /// Copy of the host record without its services, as stored in buckets.
    pub fn without_services(&self) -> Self {
        Self {
            services: BTreeMap::new(),
            ..self.clone()
        }
    }

    pub fn is_soft(&self) -> bool {
        self.status_type == Some(StateType::Soft)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub host: String,
    pub name: String,
    pub site: String,
    pub status: Status,
    pub status_type: Option<StateType>,
    pub last_check: String,
    pub duration: String,
    pub attempt: String,
    pub status_information: String,
    pub groups: String,
    pub flags: ItemFlags,
}

impl Service {
    pub fn new(host: impl Into<String>, name: impl Into<String>, status: Status) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            status,
            ..Default::default()
        }
    }

    /// A service is soft when the monitor says so, or, lacking a state
    /// type, when its current attempt has not reached the maximum.
    pub fn is_soft(&self) -> bool {
        match self.status_type {
            Some(t) => t == StateType::Soft,
            None => matches!(parse_attempt(&self.attempt), Some((cur, max)) if cur != max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_letters() {
        let flags = ItemFlags {
            acknowledged: true,
            passive_only: true,
            ..Default::default()
        };
        assert_eq!(flags.letters(), "AP");
        assert_eq!(ItemFlags::default().letters(), "");
    }

    #[test]
    fn test_service_soft_state() {
        let mut svc = Service::new("h1", "disk", Status::Warning);
        svc.attempt = "2/3".to_string();
        assert!(svc.is_soft());

        svc.attempt = "3/3".to_string();
        assert!(!svc.is_soft());

        svc.status_type = Some(StateType::Soft);
        assert!(svc.is_soft());
    }

    #[test]
    fn test_parse_attempt() {
        assert_eq!(parse_attempt("1/5"), Some((1, 5)));
        assert_eq!(parse_attempt("n/a"), None);
    }
}
