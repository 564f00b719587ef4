//! User-defined custom actions offered in the row context menu.

use serde::{Deserialize, Serialize};

use super::{RegexField, RegexSetting};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Browser,
    Command,
    Url,
    UrlPost,
}

impl Default for ActionKind {
    fn default() -> Self {
        ActionKind::Browser
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub string: String,
    pub cgi_data: String,
    pub recheck: bool,
    /// Backend kind this action applies to, empty for all.
    pub monitor_type: String,
    pub filter_target_host: bool,
    pub filter_target_service: bool,
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
    pub close_popwin: bool,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            enabled: true,
            kind: ActionKind::default(),
            string: String::new(),
            cgi_data: String::new(),
            recheck: false,
            monitor_type: String::new(),
            filter_target_host: true,
            filter_target_service: true,
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
            close_popwin: true,
        }
    }
}

impl ActionConfig {
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
}
