//! Severity scale shared by hosts, services and notifications.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host or service state, declared in ascending severity.
///
/// `Up` and `Ok` are the "nothing wrong" states and never appear in a
/// filtered bucket. The derived `Ord` is the single ranking used for worst
/// diff computation and for the notification high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Ok,
    Information,
    Unknown,
    Warning,
    Average,
    High,
    Critical,
    Unreachable,
    Down,
    Disaster,
}

impl Default for Status {
    fn default() -> Self {
        Status::Up
    }
}

impl Status {
    /// Problem states in display order, used for counters, colors and the
    /// desktop notification summary.
    pub const PROBLEMS: [Status; 9] = [
        Status::Down,
        Status::Unreachable,
        Status::Disaster,
        Status::Critical,
        Status::High,
        Status::Average,
        Status::Warning,
        Status::Information,
        Status::Unknown,
    ];

    /// Host problem states.
    pub const HOST_PROBLEMS: [Status; 2] = [Status::Down, Status::Unreachable];

    /// Service problem states.
    pub const SERVICE_PROBLEMS: [Status; 7] = [
        Status::Disaster,
        Status::Critical,
        Status::High,
        Status::Average,
        Status::Warning,
        Status::Information,
        Status::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "UP",
            Status::Ok => "OK",
            Status::Information => "INFORMATION",
            Status::Unknown => "UNKNOWN",
            Status::Warning => "WARNING",
            Status::Average => "AVERAGE",
            Status::High => "HIGH",
            Status::Critical => "CRITICAL",
            Status::Unreachable => "UNREACHABLE",
            Status::Down => "DOWN",
            Status::Disaster => "DISASTER",
        }
    }

    pub fn is_problem(&self) -> bool {
        !matches!(self, Status::Up | Status::Ok)
    }

    /// Prefix of the color settings for this state, e.g. `color_down_`.
    pub fn color_key(&self) -> String {
        format!("color_{}_", self.as_str().to_lowercase())
    }

    /// States that have a shipped sound file.
    pub fn has_sound(&self) -> bool {
        matches!(self, Status::Warning | Status::Critical | Status::Down)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_uppercase().as_str() {
            "UP" => Status::Up,
            "OK" => Status::Ok,
            "INFORMATION" => Status::Information,
            "UNKNOWN" => Status::Unknown,
            "WARNING" => Status::Warning,
            "AVERAGE" => Status::Average,
            "HIGH" => Status::High,
            "CRITICAL" => Status::Critical,
            "UNREACHABLE" => Status::Unreachable,
            "DOWN" => Status::Down,
            "DISASTER" => Status::Disaster,
            other => return Err(ParseStatusError(other.to_string())),
        };
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let ordered = [
            Status::Up,
            Status::Information,
            Status::Unknown,
            Status::Warning,
            Status::Average,
            Status::High,
            Status::Critical,
            Status::Unreachable,
            Status::Down,
            Status::Disaster,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{} should rank below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("critical".parse::<Status>().unwrap(), Status::Critical);
        assert_eq!(Status::Unreachable.to_string(), "UNREACHABLE");
        assert!("PENDING".parse::<Status>().is_err());
        assert_eq!(Status::Down.color_key(), "color_down_");
    }
}
