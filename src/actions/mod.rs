//! Action dispatcher: monitor commands, custom actions and bulk recheck.
//!
//! Every operation is addressed by server name and runs against that
//! server's backend. Custom actions are matched against the selected rows
//! (see [`visible_actions`]), have their placeholders substituted and are
//! then handed to the browser, a shell, or the server's HTTP session.

mod placeholders;
mod visibility;

pub use placeholders::*;
pub use visibility::*;

use chrono::Duration as ChronoDuration;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::backend::{AcknowledgeInfo, BackendError, DowntimeInfo, Giveback, ItemRef, SubmitInfo};
use crate::collab::BrowserLauncher;
use crate::config::{ActionConfig, ActionKind};
use crate::events::{EventBus, UiEvent};
use crate::server::{Registry, Server};

/// Delay before all servers are refreshed after a bulk recheck.
pub const RECHECK_ALL_REFRESH_DELAY: Duration = Duration::from_secs(5);

/// Action error types.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("unknown server {0}")]
    UnknownServer(String),
    #[error("failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("unsupported action: {0}")]
    Unsupported(String),
    #[error("{0} already running")]
    Busy(&'static str),
}

/// Run `command` through the shell, detached from our stdin and stdout.
pub fn spawn_shell(command: &str) -> Result<tokio::process::Child, ActionError> {
    let child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()?;
    Ok(child)
}

struct RecheckAllGuard<'a>(&'a AtomicBool);

impl Drop for RecheckAllGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ActionDispatcher {
    registry: Arc<Registry>,
    browser: Arc<dyn BrowserLauncher>,
    events: EventBus,
    rechecking_all: AtomicBool,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<Registry>, browser: Arc<dyn BrowserLauncher>, events: EventBus) -> Self {
        Self {
            registry,
            browser,
            events,
            rechecking_all: AtomicBool::new(false),
        }
    }

    fn server(&self, name: &str) -> Result<Arc<Server>, ActionError> {
        self.registry
            .get(name)
            .ok_or_else(|| ActionError::UnknownServer(name.to_string()))
    }

    pub fn is_rechecking_all(&self) -> bool {
        self.rechecking_all.load(Ordering::Acquire)
    }

    pub async fn recheck(&self, server: &str, target: &ItemRef) -> Result<(), ActionError> {
        let server = self.server(server)?;
        tracing::info!(server = %server.name(), host = %target.host, service = ?target.service, "Recheck");
        server.backend().set_recheck(target).await?;
        Ok(())
    }

    /// Acknowledge with the configured defaults. `comment` overrides the
    /// default comment.
    pub async fn acknowledge(
        &self,
        server: &str,
        target: &ItemRef,
        comment: Option<&str>,
    ) -> Result<(), ActionError> {
        let server = self.server(server)?;
        let settings = server.settings();

        let all_services = if target.service.is_none() && settings.defaults_acknowledge_all_services {
            server
                .snapshot()
                .hosts
                .get(&target.host)
                .map(|h| h.services.keys().cloned().collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let info = AcknowledgeInfo {
            target: target.clone(),
            author: server.backend().session().username(),
            comment: comment
                .unwrap_or(&settings.defaults_acknowledge_comment)
                .to_string(),
            sticky: settings.defaults_acknowledge_sticky,
            notify: settings.defaults_acknowledge_send_notification,
            persistent: settings.defaults_acknowledge_persistent_comment,
            all_services,
        };
        tracing::info!(server = %server.name(), host = %target.host, service = ?target.service, "Acknowledge");
        server.backend().set_acknowledge(&info).await?;
        Ok(())
    }

    /// Schedule a downtime between `start_time` and `end_time`
    /// (`%Y-%m-%d %H:%M`).
    pub async fn downtime(
        &self,
        server: &str,
        target: &ItemRef,
        start_time: &str,
        end_time: &str,
        comment: Option<&str>,
    ) -> Result<(), ActionError> {
        let server = self.server(server)?;
        let settings = server.settings();
        let info = DowntimeInfo {
            target: target.clone(),
            author: server.backend().session().username(),
            comment: comment
                .unwrap_or(&settings.defaults_downtime_comment)
                .to_string(),
            fixed: settings.defaults_downtime_type_fixed,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            hours: settings.defaults_downtime_duration_hours,
            minutes: settings.defaults_downtime_duration_minutes,
        };
        tracing::info!(server = %server.name(), host = %target.host, service = ?target.service, "Downtime");
        server.backend().set_downtime(&info).await?;
        Ok(())
    }

    pub async fn submit(
        &self,
        server: &str,
        target: &ItemRef,
        state: &str,
        check_output: &str,
        performance_data: &str,
    ) -> Result<(), ActionError> {
        let server = self.server(server)?;
        let info = SubmitInfo {
            target: target.clone(),
            state: state.to_lowercase(),
            check_output: check_output.to_string(),
            performance_data: performance_data.to_string(),
        };
        tracing::info!(server = %server.name(), host = %target.host, service = ?target.service, state, "Submit check result");
        server.backend().set_submit_check_result(&info).await?;
        Ok(())
    }

    /// Ask the backend for a downtime window and hand it to the dialog.
    pub async fn get_start_end(&self, server: &str, host: &str) -> Result<(String, String), ActionError> {
        let server = self.server(server)?;
        let settings = server.settings();
        let duration = ChronoDuration::hours(i64::from(settings.defaults_downtime_duration_hours))
            + ChronoDuration::minutes(i64::from(settings.defaults_downtime_duration_minutes));
        let (start, end) = server.backend().get_start_end(host, duration).await?;
        self.events.emit(UiEvent::StartEnd {
            server: server.name().to_string(),
            host: host.to_string(),
            start: start.clone(),
            end: end.clone(),
        });
        Ok((start, end))
    }

    /// Monitor page of one host or service.
    pub fn open_monitor(&self, server: &str, target: &ItemRef) -> Result<(), ActionError> {
        let server = self.server(server)?;
        self.browser.open(&server.backend().monitor_url(target));
        Ok(())
    }

    pub fn open_monitor_webpage(&self, server: &str) -> Result<(), ActionError> {
        let server = self.server(server)?;
        self.browser.open(&server.backend().monitor_webpage());
        Ok(())
    }

    fn placeholder_values(server: &Server, target: &ActionTarget) -> PlaceholderValues {
        let settings = server.settings();
        let session = server.backend().session();
        PlaceholderValues {
            host: target.host.clone(),
            service: target.service.clone().unwrap_or_default(),
            address: server.get_host(&target.host),
            monitor: server.config().monitor_url.clone(),
            monitor_cgi: server.config().cgi_url().to_string(),
            status_information: target.status_information.clone(),
            username: session.username(),
            password: session.password(),
            comment_ack: settings.defaults_acknowledge_comment.clone(),
            comment_down: settings.defaults_downtime_comment.clone(),
            comment_submit: settings.defaults_submit_check_result_comment.clone(),
        }
    }

    /// Run a custom action for one selected row.
    pub async fn execute_action(
        &self,
        server: &str,
        action: &ActionConfig,
        target: &ActionTarget,
    ) -> Result<(), ActionError> {
        let server = self.server(server)?;
        if action.string.trim().is_empty() {
            return Err(ActionError::Unsupported(format!(
                "action {:?} has no string",
                action.name
            )));
        }

        let values = Self::placeholder_values(&server, target);
        let string = values.substitute(&action.string);
        let item = ItemRef {
            host: target.host.clone(),
            service: target.service.clone(),
            site: target.site.clone(),
        };
        tracing::debug!(server = %server.name(), action = %action.name, "ACTION: {:?} {}", action.kind, string);

        match action.kind {
            ActionKind::Browser => self.browser.open(&string),
            ActionKind::Command => {
                let mut child = spawn_shell(&string)?;
                let name = action.name.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            tracing::warn!(action = %name, "Command exited with {}", status)
                        }
                        Err(e) => tracing::error!(action = %name, "Command failed: {}", e),
                        _ => {}
                    }
                });
            }
            ActionKind::Url => {
                let url = if needs_transid(&string) {
                    let transid = server.backend().transid(&item).await?;
                    substitute_transid(&string, &transid)
                } else {
                    urlify(&string)
                };
                let response = server
                    .backend()
                    .fetch_url(&url, None, Giveback::Raw, false)
                    .await?;
                tracing::debug!(server = %server.name(), status = response.status, "Action URL fetched");
            }
            ActionKind::UrlPost => {
                let cgi_data = parse_cgi_data(&values.substitute(&action.cgi_data));
                let response = server
                    .backend()
                    .fetch_url(&urlify(&string), Some(&cgi_data), Giveback::Raw, false)
                    .await?;
                tracing::debug!(server = %server.name(), status = response.status, "Action URL posted");
            }
        }

        if action.recheck {
            server.backend().set_recheck(&item).await?;
        }
        Ok(())
    }

    /// Recheck every filtered item on every enabled server. Backends with a
    /// bulk endpoint get one request. A second call while one is running
    /// returns [`ActionError::Busy`] without touching any backend.
    pub async fn recheck_all(&self) -> Result<(), ActionError> {
        if self
            .rechecking_all
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Already rechecking all");
            return Err(ActionError::Busy("recheck all"));
        }
        let _guard = RecheckAllGuard(&self.rechecking_all);

        tracing::info!("Rechecking all items on all servers");
        for server in self.registry.enabled_servers() {
            let backend = server.backend();
            if backend.supports_recheck_all() {
                if let Err(e) = backend.recheck_all().await {
                    tracing::error!(server = %server.name(), "Bulk recheck failed: {}", e);
                }
                continue;
            }

            let snapshot = server.snapshot();
            let hosts = snapshot
                .filtered
                .hosts_in_order()
                .map(|h| ItemRef {
                    host: h.name.clone(),
                    service: None,
                    site: h.site.clone(),
                });
            let services = snapshot
                .filtered
                .services_in_order()
                .map(|s| ItemRef {
                    host: s.host.clone(),
                    service: Some(s.name.clone()),
                    site: s.site.clone(),
                });
            for target in hosts.chain(services) {
                if let Err(e) = backend.set_recheck(&target).await {
                    tracing::error!(server = %server.name(), host = %target.host, "Recheck failed: {}", e);
                }
            }
        }

        let registry = self.registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RECHECK_ALL_REFRESH_DELAY).await;
            registry.refresh_all();
        });
        Ok(())
    }
}
