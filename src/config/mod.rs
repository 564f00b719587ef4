//! Configuration for Nagstamon.
//!
//! Process-level options come from environment variables with sensible
//! defaults. User settings, servers and actions come from a JSON settings
//! file.

mod action;
mod server;
mod settings;

pub use action::*;
pub use server::*;
pub use settings::*;

use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid server {server}: {message}")]
    Server { server: String, message: String },
}

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the settings JSON file (default: "nagstamon.json")
    pub settings_path: PathBuf,
    /// Path to the SQLite cookie database (default: "nagstamon-cookies.db")
    pub cookie_db_path: PathBuf,
    /// Directory holding the shipped sound files (default: "resources")
    pub resources_dir: PathBuf,
    /// Fernet key used to encrypt cookie values at rest
    pub cookie_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("nagstamon.json"),
            cookie_db_path: PathBuf::from("nagstamon-cookies.db"),
            resources_dir: PathBuf::from("resources"),
            cookie_key: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `NAGSTAMON_CONFIG`: settings file path (default: "nagstamon.json")
    /// - `NAGSTAMON_COOKIE_DB`: cookie database path (default: "nagstamon-cookies.db")
    /// - `NAGSTAMON_RESOURCES`: sound file directory (default: "resources")
    /// - `NAGSTAMON_COOKIE_KEY`: Fernet key for cookie encryption (default: none)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = env::var("NAGSTAMON_CONFIG") {
            cfg.settings_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("NAGSTAMON_COOKIE_DB") {
            cfg.cookie_db_path = PathBuf::from(path);
        }

        if let Ok(dir) = env::var("NAGSTAMON_RESOURCES") {
            cfg.resources_dir = PathBuf::from(dir);
        }

        if let Ok(key) = env::var("NAGSTAMON_COOKIE_KEY") {
            if !key.trim().is_empty() {
                cfg.cookie_key = Some(key.trim().to_string());
            }
        }

        cfg
    }
}

/// Read the settings file. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Settings file {} not found, using defaults", path.display());
            return Ok(Settings::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let settings: Settings = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    for server in &settings.servers {
        server.validate()?;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.settings_path, PathBuf::from("nagstamon.json"));
        assert!(cfg.cookie_key.is_none());
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let settings = load_settings(Path::new("/nonexistent/nagstamon.json")).unwrap();
        assert_eq!(settings.update_interval_seconds, 60);
        assert!(settings.servers.is_empty());
    }

    #[test]
    fn test_load_settings_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"{{
                "update_interval_seconds": 30,
                "filter_all_warning_services": true,
                "servers": [{{"name": "icinga", "type": "Icinga2API", "monitor_url": "https://icinga:5665/v1"}}],
                "actions": [{{"name": "ssh", "type": "command", "string": "ssh $HOST$"}}]
            }}"#
        )
        .unwrap();

        let settings = load_settings(tmp.path()).unwrap();
        assert_eq!(settings.update_interval_seconds, 30);
        assert!(settings.filter_all_warning_services);
        assert!(settings.notification);
        assert_eq!(settings.servers[0].monitor_type, MonitorType::Icinga2Api);
        assert!(settings.servers[0].enabled);
        assert_eq!(settings.actions[0].kind, ActionKind::Command);
    }

    #[test]
    fn test_malformed_settings_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{{ not json").unwrap();
        assert!(matches!(
            load_settings(tmp.path()),
            Err(ConfigError::Json { .. })
        ));
    }
}
