//! Per-server connection settings.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Backend kind of a monitor server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorType {
    #[serde(rename = "Icinga2API")]
    Icinga2Api,
    #[serde(rename = "Checkmk Multisite")]
    CheckmkMultisite,
}

impl MonitorType {
    pub const ALL: [MonitorType; 2] = [MonitorType::Icinga2Api, MonitorType::CheckmkMultisite];

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorType::Icinga2Api => "Icinga2API",
            MonitorType::CheckmkMultisite => "Checkmk Multisite",
        }
    }
}

impl Default for MonitorType {
    fn default() -> Self {
        MonitorType::Icinga2Api
    }
}

/// How the session authenticates against the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Basic,
    Digest,
    Bearer,
    Kerberos,
    Ecp,
    /// Cookies harvested by the embedded browser.
    Web,
}

impl Default for AuthKind {
    fn default() -> Self {
        AuthKind::Basic
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub monitor_type: MonitorType,
    pub monitor_url: String,
    pub monitor_cgi_url: String,
    pub username: String,
    pub password: String,
    pub authentication: AuthKind,
    pub use_proxy: bool,
    pub use_proxy_from_os: bool,
    pub proxy_address: String,
    pub proxy_username: String,
    pub proxy_password: String,
    pub ignore_cert: bool,
    pub custom_cert_use: bool,
    pub custom_cert_ca_file: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Extra attempts for requests failing to connect.
    pub retries: u32,
    pub checkmk_view_hosts: String,
    pub checkmk_view_services: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            monitor_type: MonitorType::default(),
            monitor_url: String::new(),
            monitor_cgi_url: String::new(),
            username: String::new(),
            password: String::new(),
            authentication: AuthKind::default(),
            use_proxy: false,
            use_proxy_from_os: false,
            proxy_address: String::new(),
            proxy_username: String::new(),
            proxy_password: String::new(),
            ignore_cert: false,
            custom_cert_use: false,
            custom_cert_ca_file: String::new(),
            timeout: 10,
            retries: 0,
            checkmk_view_hosts: "nagstamon_hosts".to_string(),
            checkmk_view_services: "nagstamon_svc".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Server {
                server: "<unnamed>".to_string(),
                message: "name must not be empty".to_string(),
            });
        }
        if url::Url::parse(&self.monitor_url).is_err() {
            return Err(ConfigError::Server {
                server: self.name.clone(),
                message: format!("invalid monitor_url {:?}", self.monitor_url),
            });
        }
        Ok(())
    }

    /// CGI URL, falling back to the monitor URL when not set.
    pub fn cgi_url(&self) -> &str {
        if self.monitor_cgi_url.is_empty() {
            &self.monitor_url
        } else {
            &self.monitor_cgi_url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let mut cfg = ServerConfig {
            name: "icinga".to_string(),
            monitor_url: "https://icinga.example.com:5665/v1".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());

        cfg.monitor_url = "not a url".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_cgi_url_fallback() {
        let mut cfg = ServerConfig {
            monitor_url: "https://cmk/site/check_mk".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.cgi_url(), "https://cmk/site/check_mk");
        cfg.monitor_cgi_url = "https://cmk/cgi".to_string();
        assert_eq!(cfg.cgi_url(), "https://cmk/cgi");
    }
}
