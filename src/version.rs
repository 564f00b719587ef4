//! Background check for a newer Nagstamon release.
//!
//! The version file is fetched through an enabled server's session so the
//! server's proxy settings apply, but without its credentials.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::Giveback;
use crate::events::{EventBus, UiEvent};
use crate::server::Server;

pub const VERSION_URLS: [&str; 2] = [
    "https://nagstamon.de/version/stable",
    "https://nagstamon.ifw-dresden.de/version/stable",
];

pub const WEBSITE: &str = "https://nagstamon.de";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionStatus {
    /// Running the latest release, or something newer.
    Latest(String),
    Newer(String),
    Unavailable,
}

impl VersionStatus {
    pub fn message(&self) -> String {
        match self {
            VersionStatus::Latest(current) => {
                format!("You are using the latest version Nagstamon {}.", current)
            }
            VersionStatus::Newer(latest) => format!(
                "The new version Nagstamon {} is available. Get it at {}/download.",
                latest, WEBSITE
            ),
            VersionStatus::Unavailable => "Cannot reach version check.".to_string(),
        }
    }
}

/// Accept a version file body. HTML error pages and anything that does not
/// look like a single version string are rejected.
pub fn parse_version_response(body: &str) -> Option<String> {
    let version = body.trim();
    if body.starts_with('<') || version.contains('\n') {
        return None;
    }
    if version.len() <= 5 || version.len() >= 20 {
        return None;
    }
    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(version.to_string())
}

fn version_parts(version: &str) -> Vec<u64> {
    version
        .split(['.', '-'])
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Dotted numeric comparison, `3.10.0` > `3.9.1`. Missing parts count as 0.
pub fn compare_versions(a: &str, b: &str) -> CmpOrdering {
    let (a, b) = (version_parts(a), version_parts(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            a.get(i)
                .copied()
                .unwrap_or(0)
                .cmp(&b.get(i).copied().unwrap_or(0))
        })
        .find(|o| *o != CmpOrdering::Equal)
        .unwrap_or(CmpOrdering::Equal)
}

pub fn classify(current: &str, latest: Option<&str>) -> VersionStatus {
    match latest {
        None => VersionStatus::Unavailable,
        Some(latest) if compare_versions(latest, current) == CmpOrdering::Greater => {
            VersionStatus::Newer(latest.to_string())
        }
        Some(_) => VersionStatus::Latest(current.to_string()),
    }
}

pub struct VersionProbe {
    current: String,
    urls: Vec<String>,
    is_checking: AtomicBool,
}

impl Default for VersionProbe {
    fn default() -> Self {
        Self::new(
            crate::VERSION,
            VERSION_URLS.iter().map(|u| u.to_string()).collect(),
        )
    }
}

impl VersionProbe {
    pub fn new(current: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            current: current.into(),
            urls,
            is_checking: AtomicBool::new(false),
        }
    }

    async fn fetch_latest(&self, servers: &[Arc<Server>]) -> Option<String> {
        for server in servers {
            let session = server.backend().session();
            let mut found = None;
            for url in &self.urls {
                match server.backend().fetch_url(url, None, Giveback::Raw, true).await {
                    Ok(response) => {
                        found = parse_version_response(response.text());
                        if found.is_some() {
                            break;
                        }
                        tracing::debug!(server = %server.name(), "Unusable version response from {}", url);
                    }
                    Err(e) => {
                        tracing::debug!(server = %server.name(), "Version check via {} failed: {}", url, e)
                    }
                }
            }
            // a TLS failure here says nothing about the monitor itself
            session.clear_tls_error();
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Run one check. Returns `None` when a check is already running. In
    /// start mode only a newer version is announced.
    pub async fn check(
        &self,
        servers: &[Arc<Server>],
        start_mode: bool,
        events: &EventBus,
    ) -> Option<VersionStatus> {
        if self
            .is_checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let latest = self.fetch_latest(servers).await;
        let status = classify(&self.current, latest.as_deref());
        tracing::info!("Version check: {}", status.message());

        if !start_mode || matches!(status, VersionStatus::Newer(_)) {
            events.emit(UiEvent::VersionInfo(status.clone()));
        }

        self.is_checking.store(false, Ordering::Release);
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorType, Settings};
    use crate::server::testing::*;

    fn servers() -> Vec<Arc<Server>> {
        vec![Arc::new(Server::new(
            server_config("srv"),
            Arc::new(Settings::default()),
            Arc::new(FakeBackend::new(MonitorType::Icinga2Api)),
        ))]
    }

    #[test]
    fn test_parse_version_response() {
        assert_eq!(parse_version_response("3.16.2\n"), Some("3.16.2".to_string()));
        assert_eq!(parse_version_response("<html>oops</html>"), None);
        assert_eq!(parse_version_response("3.16.2\n3.16.1"), None);
        assert_eq!(parse_version_response("v3.16.2"), None);
        assert_eq!(parse_version_response("3.1"), None);
        assert_eq!(parse_version_response("3.16.2-20240101-extra"), None);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("3.10.0", "3.9.1"), CmpOrdering::Greater);
        assert_eq!(compare_versions("3.16", "3.16.0"), CmpOrdering::Equal);
        assert_eq!(compare_versions("2.0.1-20160919", "2.0.1-20170101"), CmpOrdering::Less);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("3.16.2", None), VersionStatus::Unavailable);
        assert_eq!(
            classify("3.16.2", Some("3.16.2")),
            VersionStatus::Latest("3.16.2".to_string())
        );
        assert_eq!(
            classify("3.16.2", Some("3.18.0")),
            VersionStatus::Newer("3.18.0".to_string())
        );
        // local build ahead of the release
        assert_eq!(
            classify("3.17.0", Some("3.16.2")),
            VersionStatus::Latest("3.17.0".to_string())
        );
        assert!(VersionStatus::Newer("3.18.0".to_string())
            .message()
            .contains("Nagstamon 3.18.0"));
    }

    #[tokio::test]
    async fn test_check_falls_back_to_next_url() {
        let mut mock_server = mockito::Server::new_async().await;
        let html = mock_server
            .mock("GET", "/a/version")
            .with_status(200)
            .with_body("<!DOCTYPE html>")
            .create_async()
            .await;
        let good = mock_server
            .mock("GET", "/b/version")
            .with_status(200)
            .with_body("3.18.0\n")
            .create_async()
            .await;

        let probe = VersionProbe::new(
            "3.16.2",
            vec![
                format!("{}/a/version", mock_server.url()),
                format!("{}/b/version", mock_server.url()),
            ],
        );
        let events = EventBus::new(8);
        let mut rx = events.subscribe();

        let status = probe.check(&servers(), true, &events).await;
        assert_eq!(status, Some(VersionStatus::Newer("3.18.0".to_string())));
        html.assert_async().await;
        good.assert_async().await;
        assert!(matches!(
            rx.try_recv(),
            Ok(UiEvent::VersionInfo(VersionStatus::Newer(_)))
        ));
    }

    #[tokio::test]
    async fn test_start_mode_is_silent_unless_newer() {
        let mut mock_server = mockito::Server::new_async().await;
        mock_server
            .mock("GET", "/version")
            .with_status(200)
            .with_body("3.16.2")
            .expect(2)
            .create_async()
            .await;

        let probe = VersionProbe::new("3.16.2", vec![format!("{}/version", mock_server.url())]);
        let events = EventBus::new(8);
        let mut rx = events.subscribe();

        let status = probe.check(&servers(), true, &events).await;
        assert_eq!(status, Some(VersionStatus::Latest("3.16.2".to_string())));
        assert!(rx.try_recv().is_err());

        probe.check(&servers(), false, &events).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(UiEvent::VersionInfo(VersionStatus::Latest(_)))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let probe = VersionProbe::new("3.16.2", vec!["http://127.0.0.1:1/version".to_string()]);
        let events = EventBus::new(8);
        let status = probe.check(&servers(), false, &events).await;
        assert_eq!(status, Some(VersionStatus::Unavailable));
    }

    #[tokio::test]
    async fn test_no_servers_is_unavailable() {
        let probe = VersionProbe::new("3.16.2", vec!["http://127.0.0.1:1/version".to_string()]);
        let status = probe.check(&[], false, &EventBus::new(8)).await;
        assert_eq!(status, Some(VersionStatus::Unavailable));
    }
}
