//! User settings. Field names match the stored configuration keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ActionConfig, ServerConfig};
use crate::model::Status;

/// Item field a regex filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexField {
    Host,
    Service,
    StatusInformation,
    Duration,
    Attempt,
    Groups,
}

impl RegexField {
    pub const ALL: [RegexField; 6] = [
        RegexField::Host,
        RegexField::Service,
        RegexField::StatusInformation,
        RegexField::Duration,
        RegexField::Attempt,
        RegexField::Groups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegexField::Host => "host",
            RegexField::Service => "service",
            RegexField::StatusInformation => "status_information",
            RegexField::Duration => "duration",
            RegexField::Attempt => "attempt",
            RegexField::Groups => "groups",
        }
    }
}

/// One `re_{field}_{enabled,pattern,reverse}` triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegexSetting {
    pub enabled: bool,
    pub pattern: String,
    pub reverse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub update_interval_seconds: u64,
    pub debug_mode: bool,
    pub debug_to_file: bool,
    pub debug_file: String,

    pub highlight_new_events: bool,
    pub connect_by_host: bool,

    // class filters
    pub filter_all_down_hosts: bool,
    pub filter_all_unreachable_hosts: bool,
    pub filter_all_flapping_hosts: bool,
    pub filter_all_critical_services: bool,
    pub filter_all_warning_services: bool,
    pub filter_all_unknown_services: bool,
    pub filter_all_information_services: bool,
    pub filter_all_average_services: bool,
    pub filter_all_high_services: bool,
    pub filter_all_disaster_services: bool,
    pub filter_all_flapping_services: bool,
    pub filter_services_on_down_hosts: bool,
    pub filter_services_on_unreachable_hosts: bool,
    pub filter_services_on_hosts_in_maintenance: bool,
    pub filter_services_on_acknowledged_hosts: bool,
    pub filter_hosts_services_maintenance: bool,
    pub filter_hosts_services_disabled_notifications: bool,
    pub filter_hosts_services_disabled_checks: bool,
    pub filter_services_in_soft_state: bool,
    pub filter_hosts_in_soft_state: bool,
    pub filter_acknowledged_hosts_services: bool,

    // regex filters
    pub re_host_enabled: bool,
    pub re_host_pattern: String,
    pub re_host_reverse: bool,
    pub re_service_enabled: bool,
    pub re_service_pattern: String,
    pub re_service_reverse: bool,
    pub re_status_information_enabled: bool,
    pub re_status_information_pattern: String,
    pub re_status_information_reverse: bool,
    pub re_duration_enabled: bool,
    pub re_duration_pattern: String,
    pub re_duration_reverse: bool,
    pub re_attempt_enabled: bool,
    pub re_attempt_pattern: String,
    pub re_attempt_reverse: bool,
    pub re_groups_enabled: bool,
    pub re_groups_pattern: String,
    pub re_groups_reverse: bool,

    // notification
    pub notification: bool,
    pub notification_flashing: bool,
    pub notification_sound: bool,
    pub notification_default_sound: bool,
    pub notification_custom_sound: bool,
    pub notification_custom_sound_warning: String,
    pub notification_custom_sound_critical: String,
    pub notification_custom_sound_down: String,
    pub notification_sound_repeat: bool,
    pub notification_desktop: bool,
    pub notification_actions: bool,
    pub notification_action_warning: bool,
    pub notification_action_warning_string: String,
    pub notification_action_critical: bool,
    pub notification_action_critical_string: String,
    pub notification_action_down: bool,
    pub notification_action_down_string: String,
    pub notification_action_ok: bool,
    pub notification_action_ok_string: String,
    pub notification_custom_action: bool,
    pub notification_custom_action_single: bool,
    pub notification_custom_action_string: String,
    pub notification_custom_action_separator: String,

    pub notify_if_down: bool,
    pub notify_if_unreachable: bool,
    pub notify_if_disaster: bool,
    pub notify_if_critical: bool,
    pub notify_if_high: bool,
    pub notify_if_average: bool,
    pub notify_if_warning: bool,
    pub notify_if_information: bool,
    pub notify_if_unknown: bool,

    // dialog defaults
    pub defaults_acknowledge_sticky: bool,
    pub defaults_acknowledge_send_notification: bool,
    pub defaults_acknowledge_persistent_comment: bool,
    pub defaults_acknowledge_all_services: bool,
    pub defaults_acknowledge_comment: String,
    pub defaults_submit_check_result_comment: String,
    pub defaults_downtime_duration_hours: u32,
    pub defaults_downtime_duration_minutes: u32,
    pub defaults_downtime_comment: String,
    pub defaults_downtime_type_fixed: bool,

    // grid colors
    pub show_grid: bool,
    pub grid_use_custom_intensity: bool,
    pub grid_alternation_intensity: u32,
    pub colors: BTreeMap<String, String>,

    pub servers: Vec<ServerConfig>,
    pub actions: Vec<ActionConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        let debug_file = std::env::var("HOME")
            .map(|home| format!("{}/nagstamon.log", home))
            .unwrap_or_else(|_| "nagstamon.log".to_string());

        Self {
            update_interval_seconds: 60,
            debug_mode: false,
            debug_to_file: false,
            debug_file,
            highlight_new_events: true,
            connect_by_host: true,
            filter_all_down_hosts: false,
            filter_all_unreachable_hosts: false,
            filter_all_flapping_hosts: false,
            filter_all_critical_services: false,
            filter_all_warning_services: false,
            filter_all_unknown_services: false,
            filter_all_information_services: false,
            filter_all_average_services: false,
            filter_all_high_services: false,
            filter_all_disaster_services: false,
            filter_all_flapping_services: false,
            filter_services_on_down_hosts: false,
            filter_services_on_unreachable_hosts: false,
            filter_services_on_hosts_in_maintenance: false,
            filter_services_on_acknowledged_hosts: false,
            filter_hosts_services_maintenance: false,
            filter_hosts_services_disabled_notifications: false,
            filter_hosts_services_disabled_checks: false,
            filter_services_in_soft_state: false,
            filter_hosts_in_soft_state: false,
            filter_acknowledged_hosts_services: false,
            re_host_enabled: false,
            re_host_pattern: String::new(),
            re_host_reverse: false,
            re_service_enabled: false,
            re_service_pattern: String::new(),
            re_service_reverse: false,
            re_status_information_enabled: false,
            re_status_information_pattern: String::new(),
            re_status_information_reverse: false,
            re_duration_enabled: false,
            re_duration_pattern: String::new(),
            re_duration_reverse: false,
            re_attempt_enabled: false,
            re_attempt_pattern: String::new(),
            re_attempt_reverse: false,
            re_groups_enabled: false,
            re_groups_pattern: String::new(),
            re_groups_reverse: false,
            notification: true,
            notification_flashing: true,
            notification_sound: true,
            notification_default_sound: true,
            notification_custom_sound: false,
            notification_custom_sound_warning: String::new(),
            notification_custom_sound_critical: String::new(),
            notification_custom_sound_down: String::new(),
            notification_sound_repeat: false,
            notification_desktop: false,
            notification_actions: false,
            notification_action_warning: false,
            notification_action_warning_string: String::new(),
            notification_action_critical: false,
            notification_action_critical_string: String::new(),
            notification_action_down: false,
            notification_action_down_string: String::new(),
            notification_action_ok: false,
            notification_action_ok_string: String::new(),
            notification_custom_action: false,
            notification_custom_action_single: false,
            notification_custom_action_string: String::new(),
            notification_custom_action_separator: "|".to_string(),
            notify_if_down: true,
            notify_if_unreachable: true,
            notify_if_disaster: true,
            notify_if_critical: true,
            notify_if_high: true,
            notify_if_average: true,
            notify_if_warning: true,
            notify_if_information: true,
            notify_if_unknown: true,
            defaults_acknowledge_sticky: false,
            defaults_acknowledge_send_notification: false,
            defaults_acknowledge_persistent_comment: false,
            defaults_acknowledge_all_services: false,
            defaults_acknowledge_comment: "acknowledged".to_string(),
            defaults_submit_check_result_comment: "check result submitted".to_string(),
            defaults_downtime_duration_hours: 2,
            defaults_downtime_duration_minutes: 0,
            defaults_downtime_comment: "scheduled downtime".to_string(),
            defaults_downtime_type_fixed: true,
            show_grid: true,
            grid_use_custom_intensity: false,
            grid_alternation_intensity: 10,
            colors: BTreeMap::new(),
            servers: Vec::new(),
            actions: Vec::new(),
        }
    }
}

/// Shipped color for a `color_{state}_{text,background}` key.
fn default_color(key: &str) -> &'static str {
    match key {
        "color_ok_text" => "#FFFFFF",
        "color_ok_background" => "#006400",
        "color_information_text" => "#000000",
        "color_information_background" => "#D6F6FF",
        "color_unknown_text" => "#000000",
        "color_unknown_background" => "#FFA500",
        "color_warning_text" => "#000000",
        "color_warning_background" => "#FFFF00",
        "color_average_text" => "#000000",
        "color_average_background" => "#FFB689",
        "color_high_text" => "#000000",
        "color_high_background" => "#FF9999",
        "color_critical_text" => "#FFFFFF",
        "color_critical_background" => "#FF0000",
        "color_unreachable_text" => "#FFFFFF",
        "color_unreachable_background" => "#8B0000",
        "color_down_text" => "#FFFFFF",
        "color_down_background" => "#000000",
        "color_disaster_text" => "#FFFFFF",
        "color_disaster_background" => "#660033",
        "color_error_text" => "#000000",
        "color_error_background" => "#D3D3D3",
        _ => "#000000",
    }
}

impl Settings {
    pub fn regex(&self, field: RegexField) -> RegexSetting {
        let (enabled, pattern, reverse) = match field {
            RegexField::Host => (self.re_host_enabled, &self.re_host_pattern, self.re_host_reverse),
            RegexField::Service => (
                self.re_service_enabled,
                &self.re_service_pattern,
                self.re_service_reverse,
            ),
            RegexField::StatusInformation => (
                self.re_status_information_enabled,
                &self.re_status_information_pattern,
                self.re_status_information_reverse,
            ),
            RegexField::Duration => (
                self.re_duration_enabled,
                &self.re_duration_pattern,
                self.re_duration_reverse,
            ),
            RegexField::Attempt => (
                self.re_attempt_enabled,
                &self.re_attempt_pattern,
                self.re_attempt_reverse,
            ),
            RegexField::Groups => (
                self.re_groups_enabled,
                &self.re_groups_pattern,
                self.re_groups_reverse,
            ),
        };
        RegexSetting {
            enabled,
            pattern: pattern.clone(),
            reverse,
        }
    }

    /// Whether the user wants to be notified about `status`.
    pub fn notify_if(&self, status: Status) -> bool {
        match status {
            Status::Down => self.notify_if_down,
            Status::Unreachable => self.notify_if_unreachable,
            Status::Disaster => self.notify_if_disaster,
            Status::Critical => self.notify_if_critical,
            Status::High => self.notify_if_high,
            Status::Average => self.notify_if_average,
            Status::Warning => self.notify_if_warning,
            Status::Information => self.notify_if_information,
            Status::Unknown => self.notify_if_unknown,
            Status::Up | Status::Ok => false,
        }
    }

    /// Whether the class filter hides every item in `status`.
    pub fn filter_all(&self, status: Status) -> bool {
        match status {
            Status::Down => self.filter_all_down_hosts,
            Status::Unreachable => self.filter_all_unreachable_hosts,
            Status::Disaster => self.filter_all_disaster_services,
            Status::Critical => self.filter_all_critical_services,
            Status::High => self.filter_all_high_services,
            Status::Average => self.filter_all_average_services,
            Status::Warning => self.filter_all_warning_services,
            Status::Information => self.filter_all_information_services,
            Status::Unknown => self.filter_all_unknown_services,
            Status::Up | Status::Ok => false,
        }
    }

    /// Per-severity notification shell action, if enabled and non-empty.
    pub fn notification_action(&self, status: Status) -> Option<&str> {
        let (enabled, command) = match status {
            Status::Warning => (
                self.notification_action_warning,
                &self.notification_action_warning_string,
            ),
            Status::Critical => (
                self.notification_action_critical,
                &self.notification_action_critical_string,
            ),
            Status::Down => (
                self.notification_action_down,
                &self.notification_action_down_string,
            ),
            _ => return None,
        };
        (enabled && !command.is_empty()).then_some(command.as_str())
    }

    /// User sound file for `status`, empty when not configured.
    pub fn custom_sound(&self, status: Status) -> &str {
        match status {
            Status::Warning => &self.notification_custom_sound_warning,
            Status::Critical => &self.notification_custom_sound_critical,
            Status::Down => &self.notification_custom_sound_down,
            _ => "",
        }
    }

    /// Color for a key like `color_critical_background`.
    pub fn color(&self, key: &str) -> &str {
        self.colors
            .get(key)
            .map(String::as_str)
            .unwrap_or_else(|| default_color(key))
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_accessor() {
        let settings = Settings {
            re_service_enabled: true,
            re_service_pattern: "^disk".to_string(),
            re_service_reverse: true,
            ..Default::default()
        };
        let re = settings.regex(RegexField::Service);
        assert!(re.enabled && re.reverse);
        assert_eq!(re.pattern, "^disk");
        assert!(!settings.regex(RegexField::Host).enabled);
    }

    #[test]
    fn test_notification_action_requires_string() {
        let mut settings = Settings {
            notification_action_critical: true,
            ..Default::default()
        };
        assert_eq!(settings.notification_action(Status::Critical), None);
        settings.notification_action_critical_string = "logger crit".to_string();
        assert_eq!(
            settings.notification_action(Status::Critical),
            Some("logger crit")
        );
        assert_eq!(settings.notification_action(Status::Unknown), None);
    }

    #[test]
    fn test_color_override() {
        let mut settings = Settings::default();
        assert_eq!(settings.color("color_critical_background"), "#FF0000");
        settings
            .colors
            .insert("color_critical_background".to_string(), "#AA0000".to_string());
        assert_eq!(settings.color("color_critical_background"), "#AA0000");
    }
}
