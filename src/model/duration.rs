//! Human readable ages and their machine sortable counterpart.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Format seconds as `Xd Xh Xm Xs`, omitting leading zero units.
pub fn format_seconds(total: i64) -> String {
    let total = total.max(0);
    let (d, h, m, s) = (
        total / 86_400,
        total % 86_400 / 3_600,
        total % 3_600 / 60,
        total % 60,
    );
    if d > 0 {
        format!("{}d {}h {}m {}s", d, h, m, s)
    } else if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Age of an epoch timestamp relative to `now`.
pub fn format_age(epoch: f64, now: DateTime<Utc>) -> String {
    if epoch <= 0.0 {
        return "n/a".to_string();
    }
    format_seconds(now.timestamp() - epoch as i64)
}

fn unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(w|d|h|m|s)").unwrap())
}

/// Seconds represented by a duration or last-check string, for sorting.
///
/// Understands `1d 2h 3m 4s` style values, `HH:MM:SS` times and plain
/// numbers. Anything else sorts first.
pub fn sortable_seconds(value: &str) -> i64 {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return n;
    }
    if let [h, m, s] = value.split(':').collect::<Vec<_>>()[..] {
        if let (Ok(h), Ok(m), Ok(s)) = (h.parse::<i64>(), m.parse::<i64>(), s.parse::<i64>()) {
            return h * 3_600 + m * 60 + s;
        }
    }
    unit_regex()
        .captures_iter(value)
        .filter_map(|c| {
            let n: i64 = c[1].parse().ok()?;
            let factor = match c[2].to_ascii_lowercase().as_str() {
                "w" => 604_800,
                "d" => 86_400,
                "h" => 3_600,
                "m" => 60,
                _ => 1,
            };
            Some(n * factor)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(42), "42s");
        assert_eq!(format_seconds(3_725), "1h 2m 5s");
        assert_eq!(format_seconds(90_061), "1d 1h 1m 1s");
        assert_eq!(format_seconds(-5), "0s");
    }

    #[test]
    fn test_sortable_seconds() {
        assert_eq!(sortable_seconds("1d 1h 1m 1s"), 90_061);
        assert_eq!(sortable_seconds("5m 3s"), 303);
        assert_eq!(sortable_seconds("01:00:10"), 3_610);
        assert_eq!(sortable_seconds("n/a"), 0);
        assert!(sortable_seconds("2h 0m 0s") > sortable_seconds("59m 59s"));
    }

    #[test]
    fn test_format_age() {
        let now = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        assert_eq!(format_age(940.0, now), "1m 0s");
        assert_eq!(format_age(0.0, now), "n/a");
    }
}
