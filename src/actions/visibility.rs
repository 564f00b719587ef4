//! Which custom actions a row's context menu offers.

use regex::Regex;

use crate::config::{ActionConfig, MonitorType, RegexField};

/// The fields of a selected row an action is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTarget {
    pub host: String,
    /// `None` for host rows.
    pub service: Option<String>,
    pub status_information: String,
    pub duration: String,
    pub attempt: String,
    pub groups: String,
    /// Checkmk site, empty elsewhere.
    pub site: String,
}

impl ActionTarget {
    fn field(&self, field: RegexField) -> &str {
        match field {
            RegexField::Host => &self.host,
            RegexField::Service => self.service.as_deref().unwrap_or(""),
            RegexField::StatusInformation => &self.status_information,
            RegexField::Duration => &self.duration,
            RegexField::Attempt => &self.attempt,
            RegexField::Groups => &self.groups,
        }
    }
}

/// True when `pattern` finds `value`, inverted by `reverse`. An invalid
/// pattern never matches.
pub fn is_found_by_re(value: &str, pattern: &str, reverse: bool) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(value) != reverse,
        Err(e) => {
            tracing::warn!("Invalid action pattern {:?}: {}", pattern, e);
            false
        }
    }
}

fn monitor_matches(action: &ActionConfig, monitor: MonitorType) -> bool {
    // unknown types come from older settings and apply everywhere
    action.monitor_type.is_empty()
        || action.monitor_type == monitor.as_str()
        || !MonitorType::ALL
            .iter()
            .any(|t| t.as_str() == action.monitor_type)
}

/// Visibility for a single row.
pub fn action_visible(action: &ActionConfig, monitor: MonitorType, target: &ActionTarget) -> bool {
    if !action.enabled || !monitor_matches(action, monitor) {
        return false;
    }

    let targeted = match target.service {
        Some(_) => action.filter_target_service,
        None => action.filter_target_host,
    };
    if !targeted {
        return false;
    }

    RegexField::ALL
        .iter()
        .filter(|f| target.service.is_some() || **f != RegexField::Service)
        .map(|f| (*f, action.regex(*f)))
        .filter(|(_, re)| re.enabled)
        .all(|(f, re)| is_found_by_re(target.field(f), &re.pattern, re.reverse))
}

/// An action is offered only if it is visible for every selected row.
pub fn action_visible_for_all(
    action: &ActionConfig,
    monitor: MonitorType,
    targets: &[ActionTarget],
) -> bool {
    !targets.is_empty() && targets.iter().all(|t| action_visible(action, monitor, t))
}

pub fn visible_actions<'a>(
    actions: &'a [ActionConfig],
    monitor: MonitorType,
    targets: &[ActionTarget],
) -> Vec<&'a ActionConfig> {
    actions
        .iter()
        .filter(|a| action_visible_for_all(a, monitor, targets))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_row(host: &str, service: &str) -> ActionTarget {
        ActionTarget {
            host: host.to_string(),
            service: Some(service.to_string()),
            status_information: "CRITICAL - timeout".to_string(),
            attempt: "3/3".to_string(),
            ..Default::default()
        }
    }

    fn host_row(host: &str) -> ActionTarget {
        ActionTarget {
            host: host.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_action_is_visible() {
        let action = ActionConfig::default();
        assert!(action_visible(&action, MonitorType::Icinga2Api, &host_row("h1")));
        assert!(action_visible(&action, MonitorType::Icinga2Api, &service_row("h1", "s1")));
    }

    #[test]
    fn test_target_kind() {
        let action = ActionConfig {
            filter_target_host: false,
            ..Default::default()
        };
        assert!(!action_visible(&action, MonitorType::Icinga2Api, &host_row("h1")));
        assert!(action_visible(&action, MonitorType::Icinga2Api, &service_row("h1", "s1")));
    }

    #[test]
    fn test_monitor_type() {
        let action = ActionConfig {
            monitor_type: "Checkmk Multisite".to_string(),
            ..Default::default()
        };
        assert!(!action_visible(&action, MonitorType::Icinga2Api, &host_row("h1")));
        assert!(action_visible(&action, MonitorType::CheckmkMultisite, &host_row("h1")));

        let legacy = ActionConfig {
            monitor_type: "Nagios".to_string(),
            ..Default::default()
        };
        assert!(action_visible(&legacy, MonitorType::Icinga2Api, &host_row("h1")));
    }

    #[test]
    fn test_all_enabled_regexes_must_match() {
        let action = ActionConfig {
            re_host_enabled: true,
            re_host_pattern: "^web".to_string(),
            re_service_enabled: true,
            re_service_pattern: "http".to_string(),
            ..Default::default()
        };
        let m = MonitorType::Icinga2Api;
        assert!(action_visible(&action, m, &service_row("web01", "https")));
        assert!(!action_visible(&action, m, &service_row("web01", "disk")));
        assert!(!action_visible(&action, m, &service_row("db01", "http")));
        // service pattern does not apply to host rows
        assert!(action_visible(&action, m, &host_row("web01")));
    }

    #[test]
    fn test_reverse_and_invalid_patterns() {
        assert!(is_found_by_re("web01", "^db", true));
        assert!(!is_found_by_re("db01", "^db", true));
        assert!(!is_found_by_re("web01", "([", false));
        assert!(!is_found_by_re("web01", "([", true));
    }

    #[test]
    fn test_visible_for_every_selected_row() {
        let action = ActionConfig {
            name: "ssh".to_string(),
            re_host_enabled: true,
            re_host_pattern: "^web".to_string(),
            ..Default::default()
        };
        let disabled = ActionConfig {
            name: "off".to_string(),
            enabled: false,
            ..Default::default()
        };
        let actions = vec![action, disabled];
        let m = MonitorType::Icinga2Api;

        let rows = [host_row("web01"), host_row("web02")];
        assert_eq!(visible_actions(&actions, m, &rows).len(), 1);

        let mixed = [host_row("web01"), host_row("db01")];
        assert!(visible_actions(&actions, m, &mixed).is_empty());
        assert!(visible_actions(&actions, m, &[]).is_empty());
    }
}
