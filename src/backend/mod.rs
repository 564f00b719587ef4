//! Backend adapters for monitor servers.
//!
//! Each adapter owns one authenticated HTTP session and translates between
//! the monitor's wire format and the shared data model.

mod checkmk;
mod icinga2;
mod session;

pub use checkmk::*;
pub use icinga2::*;
pub use session::*;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{MonitorType, ServerConfig, Settings};
use crate::model::HostMap;

/// Backend error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("proxy error: {0}")]
    Proxy(String),
    #[error("max retries exceeded: {0}")]
    MaxRetries(String),
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("authentication failed (HTTP {0})")]
    Unauthorized(u16),
    #[error("authentication required")]
    AuthRequired,
    #[error("monitor URL not found")]
    NotFound,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

/// Color class of a server status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Normal,
    Critical,
    Error,
}

impl BackendError {
    /// Short user-visible label and its color class.
    pub fn label(&self) -> (String, LabelStyle) {
        match self {
            BackendError::NotFound => ("Monitor URL not valid".into(), LabelStyle::Critical),
            BackendError::Timeout => ("Connection timeout".into(), LabelStyle::Error),
            BackendError::Connection(_) => ("Connection error".into(), LabelStyle::Error),
            BackendError::Proxy(_) => ("Proxy error".into(), LabelStyle::Error),
            BackendError::MaxRetries(_) => ("Max retry error".into(), LabelStyle::Error),
            BackendError::Tls(_) => ("SSL/TLS problem".into(), LabelStyle::Critical),
            BackendError::Unauthorized(_) | BackendError::AuthRequired => {
                ("Authentication problem".into(), LabelStyle::Critical)
            }
            BackendError::ServiceUnavailable => ("Service unavailable".into(), LabelStyle::Error),
            other => {
                let text = other.to_string().replace(['\n', '\r'], " ").trim().to_string();
                if text.is_empty() {
                    ("Unknown error".into(), LabelStyle::Error)
                } else {
                    (text, LabelStyle::Error)
                }
            }
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_) | BackendError::AuthRequired)
    }
}

/// Shape of a fetched response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Giveback {
    /// Body as text.
    Raw,
    /// Body parsed into a structured object (JSON).
    Obj,
    /// XML body, handed over as text for the adapter to parse.
    OpsXml,
    /// Body discarded.
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchBody {
    Text(String),
    Json(serde_json::Value),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: FetchBody,
}

impl FetchResponse {
    pub fn text(&self) -> &str {
        match &self.body {
            FetchBody::Text(t) => t,
            _ => "",
        }
    }
}

/// Host or service a command targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRef {
    pub host: String,
    pub service: Option<String>,
    pub site: String,
}

impl ItemRef {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn service(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: Some(service.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AcknowledgeInfo {
    pub target: ItemRef,
    pub author: String,
    pub comment: String,
    pub sticky: bool,
    pub notify: bool,
    pub persistent: bool,
    /// Services of the host acknowledged together with it.
    pub all_services: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DowntimeInfo {
    pub target: ItemRef,
    pub author: String,
    pub comment: String,
    pub fixed: bool,
    /// `%Y-%m-%d %H:%M` local time.
    pub start_time: String,
    pub end_time: String,
    pub hours: u32,
    pub minutes: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitInfo {
    pub target: ItemRef,
    /// Lowercase state name, e.g. `ok`, `warning`, `down`.
    pub state: String,
    pub check_output: String,
    pub performance_data: String,
}

pub const START_END_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Uniform contract over heterogeneous monitors.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend kind as used in action `monitor_type` matching.
    fn kind(&self) -> MonitorType;

    fn session(&self) -> &HttpSession;

    /// Fetch current problems. Never panics past this boundary.
    async fn get_status(&self) -> Result<HostMap, BackendError>;

    async fn set_recheck(&self, target: &ItemRef) -> Result<(), BackendError>;

    async fn set_acknowledge(&self, info: &AcknowledgeInfo) -> Result<(), BackendError>;

    async fn set_downtime(&self, info: &DowntimeInfo) -> Result<(), BackendError>;

    async fn set_submit_check_result(&self, info: &SubmitInfo) -> Result<(), BackendError>;

    /// Proposed downtime window for the downtime dialog.
    async fn get_start_end(
        &self,
        _host: &str,
        duration: ChronoDuration,
    ) -> Result<(String, String), BackendError> {
        let start = Local::now();
        let end = start + duration;
        Ok((
            start.format(START_END_FORMAT).to_string(),
            end.format(START_END_FORMAT).to_string(),
        ))
    }

    async fn fetch_url(
        &self,
        url: &str,
        cgi_data: Option<&[(String, String)]>,
        giveback: Giveback,
        no_auth: bool,
    ) -> Result<FetchResponse, BackendError> {
        self.session().fetch_url(url, cgi_data, giveback, no_auth).await
    }

    fn supports_recheck_all(&self) -> bool {
        false
    }

    async fn recheck_all(&self) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("bulk recheck".to_string()))
    }

    /// Checkmk transaction id for `$TRANSID$` action URLs.
    async fn transid(&self, _target: &ItemRef) -> Result<String, BackendError> {
        Err(BackendError::Unsupported("transaction ids".to_string()))
    }

    /// Monitor web page for one host or service.
    fn monitor_url(&self, target: &ItemRef) -> String;

    /// Monitor start page.
    fn monitor_webpage(&self) -> String;
}

/// Build the adapter for a server.
pub fn create_backend(
    cfg: &ServerConfig,
    settings: &Settings,
) -> Result<Arc<dyn Backend>, BackendError> {
    let session = HttpSession::new(cfg)?;
    let backend: Arc<dyn Backend> = match cfg.monitor_type {
        MonitorType::Icinga2Api => Arc::new(Icinga2Backend::new(cfg, session)),
        MonitorType::CheckmkMultisite => Arc::new(
            CheckmkBackend::new(cfg, session)
                .with_unreachable_filter(settings.filter_services_on_unreachable_hosts),
        ),
    };
    Ok(backend)
}
