//! Web-login cookie capture and restore.
//!
//! The embedded browser of the widget layer hands over every cookie it sees
//! while the user logs in. They are persisted per server and loaded into the
//! server's session jar, which resumes authenticated polling.

use chrono::Utc;

use crate::db::{CookieStore, DbError, StoredCookie};
use crate::server::Server;

/// Persist cookies harvested for `server` and resume polling with them.
pub fn capture_cookies(
    server: &Server,
    store: &CookieStore,
    cookies: Vec<StoredCookie>,
) -> Result<usize, DbError> {
    let cookies: Vec<StoredCookie> = cookies
        .into_iter()
        .filter(|c| {
            let safe = c.is_header_safe();
            if !safe {
                tracing::warn!(server = %server.name(), cookie = %c.name, "Rejecting cookie with separator in name or value");
            }
            safe
        })
        .map(|c| StoredCookie {
            server: server.name().to_string(),
            ..c
        })
        .collect();

    store.save(&cookies)?;
    server.backend().session().add_cookies(&cookies);
    server.request_refresh();

    tracing::info!(server = %server.name(), count = cookies.len(), "Captured web-login cookies");
    Ok(cookies.len())
}

/// Load persisted, unexpired cookies into the server's session.
pub fn restore_cookies(server: &Server, store: &CookieStore) -> Result<usize, DbError> {
    let now = Utc::now();
    let cookies: Vec<StoredCookie> = store
        .load_server(server.name())?
        .into_iter()
        .filter(|c| !c.is_expired(now))
        .collect();

    if !cookies.is_empty() {
        server.backend().session().add_cookies(&cookies);
        tracing::debug!(server = %server.name(), count = cookies.len(), "Restored cookies");
    }
    Ok(cookies.len())
}

/// Drop every stored cookie of a removed server.
pub fn forget_cookies(server: &str, store: &CookieStore) -> Result<usize, DbError> {
    let removed = store.delete_server(server)?;
    tracing::debug!(server, removed, "Deleted stored cookies");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorType, Settings};
    use crate::db::CookieCipher;
    use crate::server::testing::*;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn server(name: &str) -> Server {
        Server::new(
            server_config(name),
            Arc::new(Settings::default()),
            Arc::new(FakeBackend::new(MonitorType::CheckmkMultisite)),
        )
    }

    fn cookie(name: &str, expiration: Option<i64>) -> StoredCookie {
        StoredCookie {
            name: name.to_string(),
            value: format!("{}-value", name),
            domain: "monitor.example.com".to_string(),
            expiration,
            ..Default::default()
        }
    }

    #[test]
    fn test_capture_persists_and_clears_auth() {
        let file = NamedTempFile::new().unwrap();
        let store = CookieStore::new(file.path(), CookieCipher::plaintext()).unwrap();
        let srv = server("cmk");
        srv.backend().session().mark_auth_failure(401);
        assert!(srv.backend().session().needs_authentication());

        let count = capture_cookies(&srv, &store, vec![cookie("auth_cmk", None)]).unwrap();
        assert_eq!(count, 1);
        assert!(!srv.backend().session().needs_authentication());
        assert!(srv.is_due());

        let stored = store.load_server("cmk").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].server, "cmk");
        assert_eq!(stored[0].value, "auth_cmk-value");
    }

    #[test]
    fn test_capture_rejects_cookie_with_separator() {
        let file = NamedTempFile::new().unwrap();
        let store = CookieStore::new(file.path(), CookieCipher::plaintext()).unwrap();
        let smuggled = StoredCookie {
            value: "x; Domain=.other.example".to_string(),
            ..cookie("session", None)
        };

        let count = capture_cookies(&server("cmk"), &store, vec![cookie("auth_cmk", None), smuggled]).unwrap();
        assert_eq!(count, 1);

        let stored = store.load_server("cmk").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "auth_cmk");
    }

    #[test]
    fn test_restore_skips_expired() {
        let file = NamedTempFile::new().unwrap();
        let store = CookieStore::new(file.path(), CookieCipher::plaintext()).unwrap();
        let future = Utc::now().timestamp() + 3600;
        let past = Utc::now().timestamp() - 3600;
        capture_cookies(
            &server("cmk"),
            &store,
            vec![cookie("fresh", Some(future)), cookie("stale", Some(past))],
        )
        .unwrap();

        let restarted = server("cmk");
        restarted.backend().session().mark_auth_failure(401);
        assert_eq!(restore_cookies(&restarted, &store).unwrap(), 1);
        assert!(!restarted.backend().session().needs_authentication());

        assert_eq!(restore_cookies(&server("other"), &store).unwrap(), 0);
    }

    #[test]
    fn test_forget_cookies() {
        let file = NamedTempFile::new().unwrap();
        let store = CookieStore::new(file.path(), CookieCipher::plaintext()).unwrap();
        capture_cookies(&server("cmk"), &store, vec![cookie("a", None), cookie("b", None)]).unwrap();

        assert_eq!(forget_cookies("cmk", &store).unwrap(), 2);
        assert!(store.load_server("cmk").unwrap().is_empty());
    }
}
