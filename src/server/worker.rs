//! Poll worker: one long-lived task per server.

use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::Server;
use crate::backend::LabelStyle;
use crate::collab::InteractionProbe;
use crate::config::AuthKind;
use crate::events::{EventBus, UiEvent};
use crate::model::Status;
use crate::notify::ArbiterHandle;

/// What a worker needs besides its server.
#[derive(Clone)]
pub struct WorkerContext {
    pub events: EventBus,
    pub arbiter: ArbiterHandle,
    pub interaction: Arc<dyn InteractionProbe>,
}

pub fn spawn_worker(
    server: Arc<Server>,
    ctx: WorkerContext,
    stop_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(run_worker_loop(server, ctx, stop_rx))
}

/// Tick once a second and refresh whenever the counter reaches the update
/// interval. Refreshes run in their own task so ticks keep coming; a tick
/// that finds a refresh in flight skips.
async fn run_worker_loop(
    server: Arc<Server>,
    ctx: WorkerContext,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let running = Arc::new(AtomicBool::new(true));

    // spread the first polls of many servers
    let jitter = rand::random::<u64>() % 1000;
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    // first poll right away
    server.request_refresh();

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                if !server.is_due() {
                    server.tick();
                    continue;
                }
                if server.is_checking() {
                    tracing::debug!(server = %server.name(), "Refresh still running, skipping tick");
                    continue;
                }
                if ctx.interaction.is_busy() {
                    tracing::debug!(server = %server.name(), "User is busy, postponing refresh");
                    continue;
                }

                let server = server.clone();
                let ctx = ctx.clone();
                let running = running.clone();
                tokio::spawn(async move {
                    refresh_server(&server, &ctx, &running).await;
                });
            }
        }
    }

    running.store(false, Ordering::Release);
    tracing::info!("Worker for {} finished", server.name());
    ctx.events.emit(UiEvent::Finished {
        server: server.name().to_string(),
    });
}

/// The refresh path: label, poll, publish, notify. Results are dropped when
/// the worker stopped while the request was in flight.
pub async fn refresh_server(server: &Server, ctx: &WorkerContext, running: &AtomicBool) {
    let Some(_guard) = server.try_begin_check() else {
        tracing::debug!(server = %server.name(), "Already checking");
        return;
    };
    let name = server.name();

    ctx.events.label(name, "Refreshing...", LabelStyle::Normal);
    let result = server.poll().await;
    server.reset_counter();

    if !running.load(Ordering::Acquire) {
        tracing::debug!(server = %name, "Worker stopped, discarding poll result");
        return;
    }

    let outcome = match result {
        Ok(outcome) => {
            ctx.events.label(
                name,
                format!("Last updated at {}", Local::now().format("%H:%M:%S")),
                LabelStyle::Normal,
            );
            ctx.events.emit(UiEvent::HideError {
                server: name.to_string(),
            });
            Some(outcome)
        }
        Err(e) => {
            let (label, style) = e.label();
            ctx.events.label(name, label, style);
            ctx.events.emit(UiEvent::ShowError {
                server: name.to_string(),
            });
            if e.is_auth() {
                ctx.events.emit(UiEvent::AuthenticationRequired {
                    server: name.to_string(),
                    web_login: server.backend().session().auth_kind() == AuthKind::Web,
                });
            }
            None
        }
    };

    if !server.has_fresh_events() {
        ctx.arbiter.problems_vanished(name).await;
    }

    let snapshot = server.snapshot();
    ctx.events.emit(UiEvent::RowsReady {
        server: name.to_string(),
        rows: snapshot.rows.clone(),
        info: snapshot.info,
    });
    ctx.events.emit(UiEvent::NewStatus {
        server: name.to_string(),
        counts: snapshot.counts.clone(),
        worst: snapshot.worst_status_current,
    });

    // a recovery is delivered too so the OK action can run
    if let Some(outcome) = outcome {
        let recovered = outcome.worst_current == Status::Up && outcome.worst_last != Status::Up;
        if outcome.worst_diff != Status::Up || recovered {
            ctx.arbiter
                .start(name, outcome.worst_diff, outcome.worst_current)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::collab::Headless;
    use crate::config::{MonitorType, Settings};
    use crate::model::HostMap;
    use crate::notify::ArbiterMsg;
    use crate::server::testing::*;
    use tokio::sync::mpsc;

    struct Busy;

    impl InteractionProbe for Busy {
        fn is_busy(&self) -> bool {
            true
        }
    }

    fn context(interaction: Arc<dyn InteractionProbe>) -> (WorkerContext, mpsc::Receiver<ArbiterMsg>) {
        let (arbiter, rx) = ArbiterHandle::channel(16);
        (
            WorkerContext {
                events: EventBus::new(64),
                arbiter,
                interaction,
            },
            rx,
        )
    }

    fn server(backend: Arc<FakeBackend>) -> Arc<Server> {
        Arc::new(Server::new(
            server_config("srv"),
            Arc::new(Settings::default()),
            backend,
        ))
    }

    #[tokio::test]
    async fn test_refresh_delivers_transitions() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        backend.push(Ok(critical("h1", "s1")));
        backend.push(Ok(critical("h1", "s1")));
        backend.push(Ok(HostMap::new()));
        let server = server(backend);
        let (ctx, mut rx) = context(Arc::new(Headless::default()));
        let mut events = ctx.events.subscribe();
        let running = AtomicBool::new(true);

        // new critical: start with CRITICAL
        refresh_server(&server, &ctx, &running).await;
        match rx.try_recv().unwrap() {
            ArbiterMsg::Start {
                server,
                worst_diff,
                worst_current,
            } => {
                assert_eq!(server, "srv");
                assert_eq!(worst_diff, Status::Critical);
                assert_eq!(worst_current, Status::Critical);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(rx.try_recv().is_err());

        // persisting: nothing delivered
        refresh_server(&server, &ctx, &running).await;
        assert!(rx.try_recv().is_err());

        // recovered: vanished, then start with UP for the OK action
        refresh_server(&server, &ctx, &running).await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            ArbiterMsg::ProblemsVanished { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ArbiterMsg::Start {
                worst_diff: Status::Up,
                worst_current: Status::Up,
                ..
            }
        ));

        match events.recv().await.unwrap() {
            UiEvent::Label { text, .. } => assert_eq!(text, "Refreshing..."),
            other => panic!("unexpected {:?}", other),
        }
        match events.recv().await.unwrap() {
            UiEvent::Label { text, .. } => assert!(text.starts_with("Last updated at ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auth_failure_labels_and_does_not_notify() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        backend.push(Err(BackendError::Unauthorized(401)));
        let server = server(backend);
        let (ctx, mut rx) = context(Arc::new(Headless::default()));
        let mut events = ctx.events.subscribe();

        refresh_server(&server, &ctx, &AtomicBool::new(true)).await;

        let mut saw_label = false;
        let mut saw_error = false;
        let mut saw_auth = false;
        while let Ok(event) = events.try_recv() {
            match event {
                UiEvent::Label { text, style, .. } if text == "Authentication problem" => {
                    assert_eq!(style, LabelStyle::Critical);
                    saw_label = true;
                }
                UiEvent::ShowError { .. } => saw_error = true,
                UiEvent::AuthenticationRequired { web_login, .. } => {
                    assert!(!web_login);
                    saw_auth = true;
                }
                _ => {}
            }
        }
        assert!(saw_label && saw_error && saw_auth);
        assert!(!matches!(rx.try_recv(), Ok(ArbiterMsg::Start { .. })));
    }

    #[tokio::test]
    async fn test_stopped_worker_discards_results() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        backend.push(Ok(critical("h1", "s1")));
        let server = server(backend);
        let (ctx, mut rx) = context(Arc::new(Headless::default()));

        refresh_server(&server, &ctx, &AtomicBool::new(false)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(server.thread_counter(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_polls_and_stops() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        let server = server(backend.clone());
        let (ctx, _rx) = context(Arc::new(Headless::default()));
        let mut events = ctx.events.subscribe();
        let (stop_tx, stop_rx) = broadcast::channel(1);

        let handle = spawn_worker(server.clone(), ctx, stop_rx);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.calls(), vec!["get_status".to_string()]);

        stop_tx.send(()).unwrap();
        handle.await.unwrap();

        let mut finished = false;
        while let Ok(event) = events.try_recv() {
            if let UiEvent::Finished { server } = event {
                assert_eq!(server, "srv");
                finished = true;
            }
        }
        assert!(finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_user_postpones_refresh() {
        let backend = Arc::new(FakeBackend::new(MonitorType::Icinga2Api));
        let server = server(backend.clone());
        let (ctx, _rx) = context(Arc::new(Busy));
        let (stop_tx, stop_rx) = broadcast::channel(1);

        let handle = spawn_worker(server, ctx, stop_rx);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(backend.calls().is_empty());

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
