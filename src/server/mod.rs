//! Per-server live state and the poll pipeline.
//!
//! A `Server` owns its backend adapter, its event history and the latest
//! published snapshot. The snapshot is replaced wholesale after every poll so
//! readers only ever see one complete generation.

mod registry;
mod worker;

pub use registry::*;
pub use worker::*;

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::backend::{create_backend, Backend, BackendError, LabelStyle};
use crate::config::{ServerConfig, Settings};
use crate::filter::FilterEngine;
use crate::history::{view_event_keys, worst_diff, EventHistory};
use crate::model::{FilteredView, HostMap, ItemTuple, Status, StatusCounts};
use crate::view::{build_rows, sort_rows, Palette, Row, SortOrder, SortState, ViewInfo};

/// One complete generation of a server's state.
#[derive(Debug, Clone, Default)]
pub struct ServerSnapshot {
    pub hosts: HostMap,
    pub filtered: FilteredView,
    pub counts: StatusCounts,
    /// Sorted identity tuples of `filtered`, compared against the next poll.
    pub tuples: Vec<ItemTuple>,
    pub rows: Arc<Vec<Row>>,
    pub info: ViewInfo,
    pub worst_status_current: Status,
    pub worst_status_last: Status,
    pub worst_status_diff: Status,
    pub has_error: bool,
    pub status_description: String,
    pub error_style: Option<LabelStyle>,
    pub last_updated: Option<DateTime<Local>>,
}

/// Result of one successful poll, as fed to the notification arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub worst_diff: Status,
    pub worst_current: Status,
    pub worst_last: Status,
}

/// Held while a poll runs; releases `is_checking` on drop.
pub struct CheckGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Server {
    cfg: ServerConfig,
    settings: Arc<Settings>,
    backend: Arc<dyn Backend>,
    filter: FilterEngine,
    palette: Palette,
    snapshot: RwLock<Arc<ServerSnapshot>>,
    history: Mutex<EventHistory>,
    sort: Mutex<SortState>,
    is_checking: AtomicBool,
    thread_counter: AtomicU64,
}

impl Server {
    pub fn new(cfg: ServerConfig, settings: Arc<Settings>, backend: Arc<dyn Backend>) -> Self {
        Self {
            filter: FilterEngine::new(&settings),
            palette: Palette::from_settings(&settings),
            cfg,
            settings,
            backend,
            snapshot: RwLock::new(Arc::new(ServerSnapshot::default())),
            history: Mutex::new(EventHistory::new()),
            sort: Mutex::new(SortState::default()),
            is_checking: AtomicBool::new(false),
            thread_counter: AtomicU64::new(0),
        }
    }

    /// Build the server with the adapter matching its monitor type.
    pub fn from_config(cfg: ServerConfig, settings: Arc<Settings>) -> Result<Self, BackendError> {
        let backend = create_backend(&cfg, &settings)?;
        Ok(Self::new(cfg, settings, backend))
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn is_enabled(&self) -> bool {
        self.cfg.enabled
    }

    /// Latest published generation.
    pub fn snapshot(&self) -> Arc<ServerSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn publish(&self, snapshot: ServerSnapshot) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot);
    }

    fn history(&self) -> MutexGuard<'_, EventHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the poll slot. `None` while another poll is running.
    pub fn try_begin_check(&self) -> Option<CheckGuard<'_>> {
        self.is_checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CheckGuard {
                flag: &self.is_checking,
            })
    }

    pub fn is_checking(&self) -> bool {
        self.is_checking.load(Ordering::Acquire)
    }

    /// One-second tick. Returns the new counter value.
    pub fn tick(&self) -> u64 {
        self.thread_counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn thread_counter(&self) -> u64 {
        self.thread_counter.load(Ordering::Acquire)
    }

    pub fn reset_counter(&self) {
        self.thread_counter.store(0, Ordering::Release);
    }

    pub fn is_due(&self) -> bool {
        self.thread_counter() >= self.settings.update_interval_seconds
    }

    /// User asked for a refresh: clear freshness and poll on the next tick.
    pub fn request_refresh(&self) {
        self.history().unfresh_all();
        self.thread_counter
            .store(self.settings.update_interval_seconds, Ordering::Release);
    }

    /// Status window was hidden.
    pub fn unfresh_all(&self) {
        self.history().unfresh_all();
    }

    pub fn has_fresh_events(&self) -> bool {
        self.history().has_fresh()
    }

    pub fn is_fresh(&self, key: &str) -> bool {
        self.history().is_fresh(key)
    }

    /// Events awaiting a custom notification action. They are marked as
    /// handled in the same step.
    pub fn take_notification_events(&self) -> Vec<String> {
        let mut history = self.history();
        let events = history.pending_notifications();
        history.mark_notified();
        events
    }

    /// Address used for `$ADDRESS$`: the host name when connecting by host,
    /// otherwise the address recorded by the monitor.
    pub fn get_host(&self, host: &str) -> String {
        if self.settings.connect_by_host {
            return host.to_string();
        }
        self.snapshot()
            .hosts
            .get(host)
            .map(|h| h.address.clone())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| host.to_string())
    }

    /// Re-sort the published rows after a header click.
    pub fn sort_by(&self, column: usize, order: SortOrder) -> Arc<Vec<Row>> {
        let sort = {
            let mut sort = self.sort.lock().unwrap_or_else(|e| e.into_inner());
            sort.click(column, order);
            *sort
        };
        let mut snapshot = (*self.snapshot()).clone();
        let mut rows = (*snapshot.rows).clone();
        sort_rows(&mut rows, &sort, &self.palette);
        snapshot.rows = Arc::new(rows);
        let rows = snapshot.rows.clone();
        self.publish(snapshot);
        rows
    }

    /// Fetch, filter, classify and publish. Errors leave the previous hosts
    /// and tuples in place so a transient failure does not re-notify.
    pub async fn poll(&self) -> Result<PollOutcome, BackendError> {
        let previous = self.snapshot();

        if !self.cfg.enabled {
            self.history().clear();
            self.publish(ServerSnapshot::default());
            return Ok(PollOutcome {
                worst_diff: Status::Up,
                worst_current: Status::Up,
                worst_last: Status::Up,
            });
        }

        let hosts = match self.backend.get_status().await {
            Ok(hosts) => hosts,
            Err(e) => {
                let (label, style) = e.label();
                tracing::warn!(server = %self.cfg.name, "Poll failed: {}", e);
                self.publish(ServerSnapshot {
                    hosts: previous.hosts.clone(),
                    tuples: previous.tuples.clone(),
                    worst_status_current: previous.worst_status_current,
                    worst_status_last: previous.worst_status_last,
                    worst_status_diff: Status::Up,
                    has_error: true,
                    status_description: label,
                    error_style: Some(style),
                    last_updated: previous.last_updated,
                    ..Default::default()
                });
                return Err(e);
            }
        };

        let filtered = self.filter.apply(&hosts);
        let tuples = filtered.tuples();
        let diff = worst_diff(&previous.tuples, &tuples);
        let current = filtered.worst_status();

        let (rows, info) = {
            let mut history = self.history();
            history.update(
                &view_event_keys(&self.cfg.name, &filtered),
                self.settings.highlight_new_events,
            );
            let sort = *self.sort.lock().unwrap_or_else(|e| e.into_inner());
            build_rows(&self.cfg.name, &filtered, &hosts, &history, &self.palette, &sort)
        };

        tracing::debug!(
            server = %self.cfg.name,
            items = filtered.len(),
            diff = %diff,
            current = %current,
            "Poll complete"
        );

        let outcome = PollOutcome {
            worst_diff: diff,
            worst_current: current,
            worst_last: previous.worst_status_current,
        };

        self.publish(ServerSnapshot {
            counts: filtered.counts(),
            hosts,
            filtered,
            tuples,
            rows: Arc::new(rows),
            info,
            worst_status_current: current,
            worst_status_last: previous.worst_status_current,
            worst_status_diff: diff,
            has_error: false,
            status_description: String::new(),
            error_style: None,
            last_updated: Some(Local::now()),
        });

        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend double for poll and action tests.

    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::backend::{
        AcknowledgeInfo, Backend, BackendError, DowntimeInfo, HttpSession, ItemRef, SubmitInfo,
    };
    use crate::config::{MonitorType, ServerConfig};
    use crate::model::{Host, HostMap, Service, Status};

    pub struct FakeBackend {
        kind: MonitorType,
        session: HttpSession,
        responses: Mutex<VecDeque<Result<HostMap, BackendError>>>,
        pub calls: Mutex<Vec<String>>,
        bulk: bool,
    }

    impl FakeBackend {
        pub fn new(kind: MonitorType) -> Self {
            let cfg = ServerConfig {
                name: "fake".to_string(),
                monitor_url: "http://127.0.0.1:1".to_string(),
                ..Default::default()
            };
            Self {
                kind,
                session: HttpSession::new(&cfg).unwrap(),
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                bulk: false,
            }
        }

        pub fn with_bulk(mut self) -> Self {
            self.bulk = true;
            self
        }

        pub fn push(&self, response: Result<HostMap, BackendError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn describe(target: &ItemRef) -> String {
        match &target.service {
            Some(s) => format!("{}/{}", target.host, s),
            None => target.host.clone(),
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        fn kind(&self) -> MonitorType {
            self.kind
        }

        fn session(&self) -> &HttpSession {
            &self.session
        }

        async fn get_status(&self) -> Result<HostMap, BackendError> {
            self.record("get_status".to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HostMap::new()))
        }

        async fn set_recheck(&self, target: &ItemRef) -> Result<(), BackendError> {
            self.record(format!("recheck {}", describe(target)));
            Ok(())
        }

        async fn set_acknowledge(&self, info: &AcknowledgeInfo) -> Result<(), BackendError> {
            self.record(format!("acknowledge {} {}", describe(&info.target), info.comment));
            Ok(())
        }

        async fn set_downtime(&self, info: &DowntimeInfo) -> Result<(), BackendError> {
            self.record(format!("downtime {} {}", describe(&info.target), info.start_time));
            Ok(())
        }

        async fn set_submit_check_result(&self, info: &SubmitInfo) -> Result<(), BackendError> {
            self.record(format!("submit {} {}", describe(&info.target), info.state));
            Ok(())
        }

        fn supports_recheck_all(&self) -> bool {
            self.bulk
        }

        async fn recheck_all(&self) -> Result<(), BackendError> {
            self.record("recheck_all".to_string());
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(())
        }

        async fn transid(&self, _target: &ItemRef) -> Result<String, BackendError> {
            Ok("tid 42".to_string())
        }

        fn monitor_url(&self, target: &ItemRef) -> String {
            format!("http://monitor/{}", describe(target))
        }

        fn monitor_webpage(&self) -> String {
            "http://monitor/".to_string()
        }
    }

    /// One host with one critical service.
    pub fn critical(host: &str, service: &str) -> HostMap {
        let mut hosts = HostMap::new();
        let mut h = Host::new(host, Status::Up);
        h.address = "10.0.0.1".to_string();
        let mut s = Service::new(host, service, Status::Critical);
        s.status_information = "CRITICAL - no answer".to_string();
        s.attempt = "3/3".to_string();
        h.services.insert(service.to_string(), s);
        hosts.insert(host.to_string(), h);
        hosts
    }

    pub fn server_config(name: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            monitor_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::config::MonitorType;

    fn server(backend: Arc<FakeBackend>) -> Server {
        Server::new(
            server_config("srv"),
            Arc::new(Settings::default()),
            backend,
        )
    }

    #[tokio::test]
    async fn test_poll_sequence_diff_and_freshness() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        backend.push(Ok(critical("h1", "s1")));
        backend.push(Ok(critical("h1", "s1")));
        backend.push(Ok(HostMap::new()));
        let server = server(backend.clone());

        // first poll: new critical
        let outcome = server.poll().await.unwrap();
        assert_eq!(outcome.worst_diff, Status::Critical);
        assert_eq!(outcome.worst_current, Status::Critical);
        assert!(server.has_fresh_events());
        let snap = server.snapshot();
        assert_eq!(snap.counts.get(Status::Critical), 1);
        assert_eq!(snap.counts.total(), snap.filtered.len());
        assert!(snap.rows[0].service_flags.contains('N'));

        // second poll: persists, nothing new
        let outcome = server.poll().await.unwrap();
        assert_eq!(outcome.worst_diff, Status::Up);
        assert_eq!(outcome.worst_last, Status::Critical);
        assert!(server.has_fresh_events());

        // third poll: recovered
        let outcome = server.poll().await.unwrap();
        assert_eq!(outcome.worst_diff, Status::Up);
        assert_eq!(outcome.worst_current, Status::Up);
        assert!(!server.has_fresh_events());
        assert!(server.snapshot().rows.is_empty());
    }

    #[tokio::test]
    async fn test_error_keeps_previous_generation() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        backend.push(Ok(critical("h1", "s1")));
        backend.push(Err(BackendError::Unauthorized(401)));
        backend.push(Ok(critical("h1", "s1")));
        let server = server(backend.clone());

        server.poll().await.unwrap();
        let err = server.poll().await.unwrap_err();
        assert!(err.is_auth());

        let snap = server.snapshot();
        assert!(snap.has_error);
        assert_eq!(snap.status_description, "Authentication problem");
        assert_eq!(snap.error_style, Some(LabelStyle::Critical));
        assert!(snap.hosts.contains_key("h1"));
        assert!(snap.rows.is_empty());

        // recovery does not count the old problem as new
        let outcome = server.poll().await.unwrap();
        assert_eq!(outcome.worst_diff, Status::Up);
        assert!(!server.snapshot().has_error);
    }

    #[tokio::test]
    async fn test_disabled_server_is_noop() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        backend.push(Ok(critical("h1", "s1")));
        let mut cfg = server_config("off");
        cfg.enabled = false;
        let server = Server::new(cfg, Arc::new(Settings::default()), backend.clone());

        let outcome = server.poll().await.unwrap();
        assert_eq!(outcome.worst_current, Status::Up);
        assert!(server.snapshot().filtered.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_check_guard_is_exclusive() {
        let server = server(Arc::new(FakeBackend::new(MonitorType::Icinga2Api)));
        let guard = server.try_begin_check();
        assert!(guard.is_some());
        assert!(server.try_begin_check().is_none());
        drop(guard);
        assert!(server.try_begin_check().is_some());
    }

    #[test]
    fn test_request_refresh_makes_poll_due() {
        let server = server(Arc::new(FakeBackend::new(MonitorType::Icinga2Api)));
        assert!(!server.is_due());
        server.request_refresh();
        assert!(server.is_due());
        server.reset_counter();
        assert_eq!(server.tick(), 1);
    }

    #[tokio::test]
    async fn test_get_host_address() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        backend.push(Ok(critical("h1", "s1")));
        let server = server(backend);
        server.poll().await.unwrap();
        assert_eq!(server.get_host("h1"), "10.0.0.1");
        assert_eq!(server.get_host("unknown"), "unknown");

        let by_host = Server::new(
            server_config("srv"),
            Arc::new(Settings {
                connect_by_host: true,
                ..Default::default()
            }),
            Arc::new(FakeBackend::new(MonitorType::Icinga2Api)),
        );
        assert_eq!(by_host.get_host("h1"), "h1");
    }

    #[tokio::test]
    async fn test_sort_by_republishes_rows() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        let mut hosts = critical("b", "s1");
        hosts.extend(critical("a", "s1"));
        backend.push(Ok(hosts));
        let server = server(backend);
        server.poll().await.unwrap();

        let rows = server.sort_by(crate::view::COL_HOST, SortOrder::Descending);
        assert_eq!(rows[0].host, "b");
        assert_eq!(server.snapshot().rows[0].host, "b");
    }
}
