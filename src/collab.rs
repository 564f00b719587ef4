//! Interfaces of the collaborators the core drives but does not own.
//!
//! The widget layer supplies real implementations. `Headless` logs every
//! call and is what the `nagstamon` binary runs with.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Opens URLs in the user's browser.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str);
}

/// Plays notification sounds on the shared audio device.
pub trait SoundPlayer: Send + Sync {
    /// Select the file to play. Returns false when it cannot be used.
    fn set_media(&self, path: &Path) -> bool;
    fn play(&self);
}

/// Desktop notification bus. Calls may silently no-op.
pub trait DesktopNotifier: Send + Sync {
    fn show(&self, summary: &str, body: &str);
}

/// Reports whether the user is mid-interaction with the detail view.
pub trait InteractionProbe: Send + Sync {
    /// True while keyboard modifiers are held or a popup is open.
    fn is_busy(&self) -> bool;
}

/// Storage for the cookie encryption key.
pub trait Keychain: Send + Sync {
    fn get(&self) -> Option<String>;
    /// Returns false when the keychain is unavailable.
    fn set(&self, key: &str) -> bool;
}

/// Collaborator set used when no widget layer is attached.
#[derive(Default)]
pub struct Headless {
    media: Mutex<Option<PathBuf>>,
}

impl BrowserLauncher for Headless {
    fn open(&self, url: &str) {
        tracing::info!(url, "Browser requested");
    }
}

impl SoundPlayer for Headless {
    fn set_media(&self, path: &Path) -> bool {
        if !path.exists() {
            tracing::warn!("Sound file {} not found", path.display());
            return false;
        }
        if let Ok(mut media) = self.media.lock() {
            *media = Some(path.to_path_buf());
        }
        true
    }

    fn play(&self) {
        if let Ok(media) = self.media.lock() {
            if let Some(path) = media.as_ref() {
                tracing::info!("Playing sound {}", path.display());
            }
        }
    }
}

impl DesktopNotifier for Headless {
    fn show(&self, summary: &str, body: &str) {
        tracing::info!(summary, body, "Desktop notification");
    }
}

impl InteractionProbe for Headless {
    fn is_busy(&self) -> bool {
        false
    }
}

/// Keychain that never stores anything, so cookies stay plaintext unless a
/// key is configured.
pub struct NoKeychain;

impl Keychain for NoKeychain {
    fn get(&self) -> Option<String> {
        None
    }

    fn set(&self, _key: &str) -> bool {
        false
    }
}

/// Keychain holding a single key supplied by configuration.
pub struct StaticKeychain(pub String);

impl Keychain for StaticKeychain {
    fn get(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn set(&self, _key: &str) -> bool {
        false
    }
}
