//! Filter engine: turns the raw host map into the bucketed filtered view.

use regex::Regex;

use crate::config::{RegexField, RegexSetting, Settings};
use crate::model::{FilteredView, Host, HostMap, ItemFlags, Service, Status};

/// A user regex filter. Disabled when off, empty or not compilable.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    re: Option<Regex>,
    reverse: bool,
}

impl RegexFilter {
    pub fn compile(setting: &RegexSetting, field: RegexField) -> Self {
        let re = if setting.enabled && !setting.pattern.is_empty() {
            match Regex::new(&setting.pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        "Ignoring invalid {} filter {:?}: {}",
                        field.as_str(),
                        setting.pattern,
                        e
                    );
                    None
                }
            }
        } else {
            None
        };
        Self {
            re,
            reverse: setting.reverse,
        }
    }

    pub fn is_active(&self) -> bool {
        self.re.is_some()
    }

    /// True when `value` must be hidden: a match normally, a non-match when
    /// reversed.
    pub fn hides(&self, value: &str) -> bool {
        match &self.re {
            Some(re) => re.is_match(value) != self.reverse,
            None => false,
        }
    }
}

/// Compiled filter settings, rebuilt whenever settings change.
pub struct FilterEngine {
    settings: Settings,
    host: RegexFilter,
    service: RegexFilter,
    status_information: RegexFilter,
    duration: RegexFilter,
    attempt: RegexFilter,
    groups: RegexFilter,
}

impl FilterEngine {
    pub fn new(settings: &Settings) -> Self {
        let compile = |field| RegexFilter::compile(&settings.regex(field), field);
        Self {
            settings: settings.clone(),
            host: compile(RegexField::Host),
            service: compile(RegexField::Service),
            status_information: compile(RegexField::StatusInformation),
            duration: compile(RegexField::Duration),
            attempt: compile(RegexField::Attempt),
            groups: compile(RegexField::Groups),
        }
    }

    /// Build the filtered view. Counters follow from the bucket lengths.
    pub fn apply(&self, hosts: &HostMap) -> FilteredView {
        let mut view = FilteredView::default();

        for host in hosts.values() {
            if host.status.is_problem() && !self.hides_host(host) {
                view.push_host(host.without_services());
            }
            for service in host.services.values() {
                if service.status.is_problem() && !self.hides_service(host, service) {
                    view.push_service(service.clone());
                }
            }
        }

        view
    }

    fn hides_flags(&self, flags: &ItemFlags) -> bool {
        let s = &self.settings;
        (s.filter_acknowledged_hosts_services && flags.acknowledged)
            || (s.filter_hosts_services_disabled_notifications && flags.notifications_disabled)
            || (s.filter_hosts_services_disabled_checks && flags.passive_only)
            || (s.filter_hosts_services_maintenance && flags.scheduled_downtime)
    }

    fn hides_common(&self, status_information: &str, duration: &str, attempt: &str, groups: &str) -> bool {
        self.status_information.hides(status_information)
            || self.duration.hides(duration)
            || self.attempt.hides(attempt)
            || self.groups.hides(groups)
    }

    pub fn hides_host(&self, host: &Host) -> bool {
        let s = &self.settings;
        if self.hides_flags(&host.flags) {
            return true;
        }
        if s.filter_all_flapping_hosts && host.flags.flapping {
            return true;
        }
        if s.filter_hosts_in_soft_state && host.is_soft() {
            return true;
        }
        if self.host.hides(&host.name)
            || self.hides_common(&host.status_information, &host.duration, &host.attempt, &host.groups)
        {
            return true;
        }
        s.filter_all(host.status)
    }

    pub fn hides_service(&self, host: &Host, service: &Service) -> bool {
        let s = &self.settings;
        if self.hides_flags(&service.flags) {
            return true;
        }
        if s.filter_all_flapping_services && service.flags.flapping {
            return true;
        }

        // suppression through the owning host
        if (s.filter_services_on_hosts_in_maintenance && host.flags.scheduled_downtime)
            || (s.filter_services_on_acknowledged_hosts && host.flags.acknowledged)
            || (s.filter_services_on_down_hosts && host.status == Status::Down)
            || (s.filter_services_on_unreachable_hosts && host.status == Status::Unreachable)
        {
            return true;
        }

        if s.filter_services_in_soft_state && service.is_soft() {
            return true;
        }

        if self.host.hides(&service.host)
            || self.service.hides(&service.name)
            || self.hides_common(
                &service.status_information,
                &service.duration,
                &service.attempt,
                &service.groups,
            )
        {
            return true;
        }

        s.filter_all(service.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HostMap {
        let mut hosts = HostMap::new();

        let mut web = Host::new("web01", Status::Down);
        web.status_information = "PING CRITICAL".to_string();
        let mut http = Service::new("web01", "http", Status::Critical);
        http.attempt = "3/3".to_string();
        web.services.insert("http".into(), http);
        hosts.insert("web01".into(), web);

        let mut db = Host::new("db01", Status::Up);
        let mut disk = Service::new("db01", "disk", Status::Warning);
        disk.attempt = "2/3".to_string();
        disk.status_information = "DISK WARNING - 80% used".to_string();
        db.services.insert("disk".into(), disk);
        let mut load = Service::new("db01", "load", Status::Unknown);
        load.attempt = "1/1".to_string();
        db.services.insert("load".into(), load);
        let mut ok = Service::new("db01", "ssh", Status::Ok);
        ok.attempt = "1/1".to_string();
        db.services.insert("ssh".into(), ok);
        hosts.insert("db01".into(), db);

        hosts
    }

    #[test]
    fn test_no_filters_is_identity_on_problems() {
        let view = FilterEngine::new(&Settings::default()).apply(&sample());
        assert_eq!(view.len(), 4);
        assert_eq!(view.counts().get(Status::Down), 1);
        assert_eq!(view.counts().get(Status::Critical), 1);
        assert_eq!(view.counts().get(Status::Warning), 1);
        assert_eq!(view.counts().get(Status::Unknown), 1);
        // OK services never appear
        assert!(view.services.get(&Status::Ok).is_none());
    }

    #[test]
    fn test_services_on_down_hosts() {
        let settings = Settings {
            filter_services_on_down_hosts: true,
            ..Default::default()
        };
        let view = FilterEngine::new(&settings).apply(&sample());
        assert_eq!(view.counts().get(Status::Down), 1);
        assert_eq!(view.counts().get(Status::Critical), 0);
    }

    #[test]
    fn test_soft_state_services() {
        let settings = Settings {
            filter_services_in_soft_state: true,
            ..Default::default()
        };
        let view = FilterEngine::new(&settings).apply(&sample());
        assert_eq!(view.counts().get(Status::Warning), 0);
        assert_eq!(view.counts().get(Status::Unknown), 1);
    }

    #[test]
    fn test_regex_and_reverse() {
        let settings = Settings {
            re_service_enabled: true,
            re_service_pattern: "^disk$".to_string(),
            ..Default::default()
        };
        let view = FilterEngine::new(&settings).apply(&sample());
        assert_eq!(view.counts().get(Status::Warning), 0);
        assert_eq!(view.counts().get(Status::Critical), 1);

        let reversed = Settings {
            re_service_reverse: true,
            ..settings
        };
        let view = FilterEngine::new(&reversed).apply(&sample());
        assert_eq!(view.counts().get(Status::Warning), 1);
        assert_eq!(view.counts().get(Status::Critical), 0);
        assert_eq!(view.counts().get(Status::Unknown), 0);
    }

    #[test]
    fn test_reverse_without_enabled_has_no_effect() {
        let settings = Settings {
            re_host_reverse: true,
            re_host_pattern: "nomatch".to_string(),
            ..Default::default()
        };
        let view = FilterEngine::new(&settings).apply(&sample());
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn test_invalid_pattern_disables_filter() {
        let settings = Settings {
            re_status_information_enabled: true,
            re_status_information_pattern: "([unclosed".to_string(),
            ..Default::default()
        };
        let engine = FilterEngine::new(&settings);
        assert!(!engine.status_information.is_active());
        assert_eq!(engine.apply(&sample()).len(), 4);
    }

    #[test]
    fn test_class_filters() {
        let settings = Settings {
            filter_all_down_hosts: true,
            filter_all_unknown_services: true,
            ..Default::default()
        };
        let view = FilterEngine::new(&settings).apply(&sample());
        assert_eq!(view.counts().get(Status::Down), 0);
        assert_eq!(view.counts().get(Status::Unknown), 0);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_acknowledged_and_maintenance_flags() {
        let mut hosts = sample();
        if let Some(db) = hosts.get_mut("db01") {
            db.flags.acknowledged = true;
            if let Some(disk) = db.services.get_mut("disk") {
                disk.flags.scheduled_downtime = true;
            }
        }

        let settings = Settings {
            filter_hosts_services_maintenance: true,
            ..Default::default()
        };
        let view = FilterEngine::new(&settings).apply(&hosts);
        assert_eq!(view.counts().get(Status::Warning), 0);

        let settings = Settings {
            filter_services_on_acknowledged_hosts: true,
            ..Default::default()
        };
        let view = FilterEngine::new(&settings).apply(&hosts);
        assert_eq!(view.counts().get(Status::Warning), 0);
        assert_eq!(view.counts().get(Status::Unknown), 0);
        assert_eq!(view.counts().get(Status::Down), 1);
    }
}
