//! Notification arbiter.
//!
//! One process-wide actor turns `(server, worst_diff, worst_current)`
//! transitions into flashing, sound, desktop bubbles and shell actions. At
//! most one server owns the notification at a time; only that server plays
//! sounds.

mod flash;

pub use flash::*;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::actions::spawn_shell;
use crate::collab::{DesktopNotifier, SoundPlayer};
use crate::config::Settings;
use crate::events::{EventBus, UiEvent};
use crate::model::{Status, StatusCounts};
use crate::server::Registry;

pub const DESKTOP_SUMMARY: &str = "Nagstamon";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbiterMsg {
    Start {
        server: String,
        worst_diff: Status,
        worst_current: Status,
    },
    Stop,
    ProblemsVanished {
        server: String,
    },
}

/// Sending side of the arbiter actor.
#[derive(Debug, Clone)]
pub struct ArbiterHandle {
    tx: mpsc::Sender<ArbiterMsg>,
}

impl ArbiterHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ArbiterMsg>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    async fn send(&self, msg: ArbiterMsg) {
        if self.tx.send(msg).await.is_err() {
            tracing::warn!("Notification arbiter is gone");
        }
    }

    pub async fn start(&self, server: &str, worst_diff: Status, worst_current: Status) {
        self.send(ArbiterMsg::Start {
            server: server.to_string(),
            worst_diff,
            worst_current,
        })
        .await;
    }

    /// The status window was opened.
    pub async fn stop(&self) {
        self.send(ArbiterMsg::Stop).await;
    }

    pub async fn problems_vanished(&self, server: &str) {
        self.send(ArbiterMsg::ProblemsVanished {
            server: server.to_string(),
        })
        .await;
    }
}

/// Arbiter state, only touched under the arbiter mutex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArbiterState {
    pub is_notifying: bool,
    /// Empty while the slot is free.
    pub notifying_server: String,
    /// High-water mark while notifying.
    pub worst_notification_status: Status,
    /// Last counts sent as desktop notification.
    pub status_count: StatusCounts,
}

pub struct Arbiter {
    settings: Arc<Settings>,
    registry: Arc<Registry>,
    events: EventBus,
    sound: Arc<dyn SoundPlayer>,
    desktop: Arc<dyn DesktopNotifier>,
    resources_dir: PathBuf,
    state: Mutex<ArbiterState>,
    flasher: Mutex<Option<Flasher>>,
}

impl Arbiter {
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<Registry>,
        events: EventBus,
        sound: Arc<dyn SoundPlayer>,
        desktop: Arc<dyn DesktopNotifier>,
        resources_dir: PathBuf,
    ) -> Self {
        Self {
            settings,
            registry,
            events,
            sound,
            desktop,
            resources_dir,
            state: Mutex::new(ArbiterState::default()),
            flasher: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> ArbiterState {
        self.lock().clone()
    }

    pub fn handle(&self, msg: ArbiterMsg) {
        match msg {
            ArbiterMsg::Start {
                server,
                worst_diff,
                worst_current,
            } => self.start(&server, worst_diff, worst_current),
            ArbiterMsg::Stop => self.stop(),
            ArbiterMsg::ProblemsVanished { server } => self.problems_vanished(&server),
        }
    }

    pub fn start(&self, server: &str, worst_diff: Status, worst_current: Status) {
        let s = &self.settings;
        if !s.notification {
            return;
        }

        let mut state = self.lock();
        let mut played = false;

        let escalates = worst_diff > state.worst_notification_status || !state.is_notifying;
        if escalates && s.notify_if(worst_diff) {
            state.worst_notification_status = worst_diff;
            state.is_notifying = true;
            if state.notifying_server.is_empty() {
                state.notifying_server = server.to_string();
            }
            tracing::info!(
                server = %server,
                severity = %worst_diff,
                owner = %state.notifying_server,
                "Notification started"
            );

            if s.notification_flashing {
                self.start_flash();
            }

            if s.notification_sound && state.notifying_server == server {
                if let Some(path) = self.sound_file(worst_diff) {
                    played = self.play(path);
                }
            }

            if s.notification_actions {
                if let Some(command) = s.notification_action(worst_diff) {
                    execute_action(server, command);
                }
            }
        }

        if worst_current == Status::Up
            && s.notification_actions
            && s.notification_action_ok
            && !s.notification_action_ok_string.is_empty()
        {
            execute_action(server, &s.notification_action_ok_string);
        }

        self.custom_actions(server);

        // the new alert above already counts as this round's repeat
        if !played
            && state.is_notifying
            && s.notification_sound_repeat
            && state.notifying_server == server
        {
            self.sound.play();
        }

        if s.notification_desktop {
            let counts = self.registry.total_counts();
            if counts != state.status_count {
                let body = counts.summary();
                if !body.is_empty() {
                    self.desktop.show(DESKTOP_SUMMARY, body.trim_end());
                    self.events.emit(UiEvent::DesktopNotification {
                        summary: DESKTOP_SUMMARY.to_string(),
                        body: body.trim_end().to_string(),
                    });
                }
                state.status_count = counts;
            }
        }
    }

    /// Idempotent.
    pub fn stop(&self) {
        let mut state = self.lock();
        if !state.is_notifying {
            return;
        }
        state.worst_notification_status = Status::Up;
        state.is_notifying = false;
        state.notifying_server.clear();
        drop(state);

        *self.flasher.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.events.emit(UiEvent::StopFlash);
        tracing::info!("Notification stopped");
    }

    /// Only the server that owns the notification can end it this way.
    pub fn problems_vanished(&self, server: &str) {
        let owns = {
            let state = self.lock();
            state.is_notifying && state.notifying_server == server
        };
        if owns {
            self.stop();
        }
    }

    fn start_flash(&self) {
        let mut flasher = self.flasher.lock().unwrap_or_else(|e| e.into_inner());
        if flasher.is_none() {
            *flasher = Some(Flasher::start(self.events.clone()));
            self.events.emit(UiEvent::StartFlash);
        }
    }

    /// Shipped sound for warning, critical and down, or the user's file.
    fn sound_file(&self, status: Status) -> Option<PathBuf> {
        if !status.has_sound() {
            return None;
        }
        let s = &self.settings;
        if s.notification_default_sound {
            Some(
                self.resources_dir
                    .join(format!("{}.wav", status.as_str().to_lowercase())),
            )
        } else if s.notification_custom_sound && !s.custom_sound(status).is_empty() {
            Some(PathBuf::from(s.custom_sound(status)))
        } else {
            None
        }
    }

    fn play(&self, path: PathBuf) -> bool {
        if !self.sound.set_media(&path) {
            return false;
        }
        self.sound.play();
        self.events.emit(UiEvent::PlaySound { path });
        true
    }

    fn custom_actions(&self, server: &str) {
        let s = &self.settings;
        if !(s.notification_actions && s.notification_custom_action) {
            // nobody will ever act on these
            if let Some(srv) = self.registry.get(server) {
                srv.take_notification_events();
            }
            return;
        }

        let template = s.notification_custom_action_string.replace("$EVENT$", "$EVENTS$");
        let servers = self.registry.enabled_servers();

        if s.notification_custom_action_single {
            for srv in &servers {
                for event in srv.take_notification_events() {
                    execute_action(server, &template.replace("$EVENTS$", &event));
                }
            }
        } else {
            let events: Vec<String> = servers
                .iter()
                .flat_map(|srv| srv.take_notification_events())
                .collect();
            if !events.is_empty() {
                let joined = events.join(&s.notification_custom_action_separator);
                execute_action(server, &template.replace("$EVENTS$", &joined));
            }
        }
    }
}

fn execute_action(server: &str, command: &str) {
    tracing::debug!(server = %server, "NOTIFICATION: {}", command);
    if let Err(e) = spawn_shell(command) {
        tracing::error!(server = %server, "Notification action failed: {}", e);
    }
}

/// Spawn the arbiter actor. Messages are handled in arrival order.
pub fn spawn_arbiter(arbiter: Arc<Arbiter>, mut rx: mpsc::Receiver<ArbiterMsg>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            arbiter.handle(msg);
        }
        arbiter.stop();
        tracing::debug!("Notification arbiter finished");
    })
}
