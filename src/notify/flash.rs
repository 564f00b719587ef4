//! Statusbar and tray flashing.

use std::time::Duration;
use tokio::sync::broadcast;

use crate::events::{EventBus, UiEvent};

/// Half period of the flashing cycle.
pub const FLASH_INTERVAL: Duration = Duration::from_millis(500);

/// Transparent icon used for the empty frames of a flashing tray icon.
pub const EMPTY_ICON_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 16 16"><rect width="16" height="16" fill="none"/></svg>"#;

/// A running flash cycle. Dropping it stops the cycle.
pub struct Flasher {
    stop_tx: broadcast::Sender<()>,
}

impl Flasher {
    pub fn start(events: EventBus) -> Self {
        let (stop_tx, stop_rx) = broadcast::channel(1);
        tokio::spawn(run_flash_loop(events, stop_rx));
        Self { stop_tx }
    }
}

impl Drop for Flasher {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

/// Invert after 500 ms, reset 500 ms later, repeat until stopped. Always
/// ends on a normal frame.
async fn run_flash_loop(events: EventBus, mut stop_rx: broadcast::Receiver<()>) {
    let mut inverted = false;
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = tokio::time::sleep(FLASH_INTERVAL) => {
                inverted = !inverted;
                events.emit(UiEvent::FlashFrame { inverted });
            }
        }
    }
    if inverted {
        events.emit(UiEvent::FlashFrame { inverted: false });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_flash_cycle_alternates_and_resets() {
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let flasher = Flasher::start(events);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        let mut frames = Vec::new();
        while let Ok(UiEvent::FlashFrame { inverted }) = rx.try_recv() {
            frames.push(inverted);
        }
        assert_eq!(frames, vec![true, false, true]);

        drop(flasher);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(UiEvent::FlashFrame { inverted: false })
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }
}
