//! Nagstamon - headless status monitor
//!
//! Runs the core without a widget layer: every server is polled, the
//! notification arbiter runs with logging collaborators and every UI event
//! is written to the log.

use nagstamon_core::collab::{Headless, Keychain, NoKeychain, StaticKeychain};
use nagstamon_core::config::{load_settings, AppConfig, Settings};
use nagstamon_core::db::{CookieCipher, CookieStore};
use nagstamon_core::events::{EventBus, UiEvent};
use nagstamon_core::notify::{spawn_arbiter, Arbiter, ArbiterHandle};
use nagstamon_core::server::{Registry, Server, WorkerContext};
use nagstamon_core::version::VersionProbe;
use nagstamon_core::weblogin::restore_cookies;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>, BoxError> {
    let level = if settings.debug_mode { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("nagstamon_core={}", level).parse()?)
        .add_directive(format!("nagstamon={}", level).parse()?);

    let (file_layer, guard) = if settings.debug_to_file {
        let path = Path::new(&settings.debug_file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file = path
            .file_name()
            .ok_or_else(|| format!("invalid debug_file {:?}", settings.debug_file))?;
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

fn log_event(event: &UiEvent) {
    match event {
        UiEvent::Label { server, text, style } => {
            tracing::info!(server = %server, ?style, "{}", text)
        }
        UiEvent::ShowError { server } => tracing::warn!(server = %server, "Server error shown"),
        UiEvent::HideError { server } => tracing::debug!(server = %server, "Server error cleared"),
        UiEvent::NewStatus { server, counts, worst } => {
            tracing::info!(server = %server, worst = %worst, "Status: {}", counts.summary().trim_end())
        }
        UiEvent::RowsReady { server, rows, .. } => {
            tracing::debug!(server = %server, rows = rows.len(), "Rows ready")
        }
        UiEvent::StartFlash => tracing::info!("Start flashing"),
        UiEvent::StopFlash => tracing::info!("Stop flashing"),
        UiEvent::FlashFrame { .. } => {}
        UiEvent::StartEnd { server, host, start, end } => {
            tracing::info!(server = %server, host = %host, "Downtime window {} - {}", start, end)
        }
        UiEvent::Finished { server } => tracing::info!(server = %server, "Worker finished"),
        UiEvent::PlaySound { path } => tracing::info!("Sound {}", path.display()),
        UiEvent::DesktopNotification { summary, body } => {
            tracing::info!("{}: {}", summary, body)
        }
        UiEvent::AuthenticationRequired { server, web_login } => {
            tracing::warn!(server = %server, web_login, "Authentication required")
        }
        UiEvent::VersionInfo(status) => tracing::info!("{}", status.message()),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load configuration
    let cfg = AppConfig::load();
    let settings = Arc::new(load_settings(&cfg.settings_path)?);

    // Initialize logging
    let _log_guard = init_logging(&settings)?;
    tracing::info!("Starting Nagstamon {}...", nagstamon_core::VERSION);
    tracing::info!("Using settings at {}", cfg.settings_path.display());

    // Initialize cookie store
    let keychain: Box<dyn Keychain> = match &cfg.cookie_key {
        Some(key) => Box::new(StaticKeychain(key.clone())),
        None => Box::new(NoKeychain),
    };
    let store = CookieStore::new(&cfg.cookie_db_path, CookieCipher::from_keychain(keychain.as_ref()))?;
    tracing::info!("Cookie store at {}", cfg.cookie_db_path.display());

    let registry = Arc::new(Registry::new());
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let headless = Arc::new(Headless::default());

    // Notification arbiter
    let (arbiter_handle, arbiter_rx) = ArbiterHandle::channel(64);
    let arbiter = Arc::new(Arbiter::new(
        settings.clone(),
        registry.clone(),
        events.clone(),
        headless.clone(),
        headless.clone(),
        cfg.resources_dir.clone(),
    ));
    let arbiter_task = spawn_arbiter(arbiter, arbiter_rx);

    // One poll worker per enabled server
    let ctx = WorkerContext {
        events: events.clone(),
        arbiter: arbiter_handle.clone(),
        interaction: headless.clone(),
    };
    for server_cfg in settings.enabled_servers() {
        let server = match Server::from_config(server_cfg.clone(), settings.clone()) {
            Ok(server) => Arc::new(server),
            Err(e) => {
                tracing::error!(server = %server_cfg.name, "Cannot set up server: {}", e);
                continue;
            }
        };
        if let Err(e) = restore_cookies(&server, &store) {
            tracing::warn!(server = %server.name(), "Cannot restore cookies: {}", e);
        }
        registry.add(server, ctx.clone()).await;
    }
    if registry.servers().is_empty() {
        tracing::warn!("No enabled servers configured");
    }

    // Version check at start only speaks up for a newer release
    let version_servers = registry.enabled_servers();
    let version_events = events.clone();
    tokio::spawn(async move {
        VersionProbe::default()
            .check(&version_servers, true, &version_events)
            .await;
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            event = rx.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} UI events", n),
                Err(RecvError::Closed) => break,
            }
        }
    }

    registry.stop_all().await;
    arbiter_handle.stop().await;
    drop(ctx);
    drop(arbiter_handle);
    if tokio::time::timeout(Duration::from_secs(2), arbiter_task)
        .await
        .is_err()
    {
        tracing::warn!("Notification arbiter did not finish in time");
    }

    Ok(())
}
