//! Typed publish-subscribe channel from the core to the widget layer.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::backend::LabelStyle;
use crate::model::{Status, StatusCounts};
use crate::version::VersionStatus;
use crate::view::{Row, ViewInfo};

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Per-server status label.
    Label {
        server: String,
        text: String,
        style: LabelStyle,
    },
    ShowError {
        server: String,
    },
    HideError {
        server: String,
    },
    /// Drives the statusbar summary and tray icon.
    NewStatus {
        server: String,
        counts: StatusCounts,
        worst: Status,
    },
    RowsReady {
        server: String,
        rows: Arc<Vec<Row>>,
        info: ViewInfo,
    },
    StartFlash,
    StopFlash,
    /// One flashing frame. `inverted` swaps label and icon colors.
    FlashFrame {
        inverted: bool,
    },
    /// Proposed downtime window for the downtime dialog.
    StartEnd {
        server: String,
        host: String,
        start: String,
        end: String,
    },
    /// A poll worker finished after being stopped.
    Finished {
        server: String,
    },
    PlaySound {
        path: PathBuf,
    },
    DesktopNotification {
        summary: String,
        body: String,
    },
    AuthenticationRequired {
        server: String,
        web_login: bool,
    },
    VersionInfo(VersionStatus),
}

/// Fan-out to every subscriber. Emitting without subscribers is a no-op.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }

    pub fn label(&self, server: &str, text: impl Into<String>, style: LabelStyle) {
        self.emit(UiEvent::Label {
            server: server.to_string(),
            text: text.into(),
            style,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.label("srv", "Refreshing...", LabelStyle::Normal);

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                UiEvent::Label { server, text, style } => {
                    assert_eq!(server, "srv");
                    assert_eq!(text, "Refreshing...");
                    assert_eq!(style, LabelStyle::Normal);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        EventBus::new(1).emit(UiEvent::StopFlash);
    }
}
