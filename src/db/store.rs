//! SQLite cookie store implementation.

use rusqlite::{params, Connection, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::crypto::CookieCipher;
use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("database lock poisoned")]
    Poisoned,
}

/// Thread-safe cookie store. Writes are serialized by the connection mutex.
#[derive(Clone)]
pub struct CookieStore {
    conn: Arc<Mutex<Connection>>,
    cipher: Arc<CookieCipher>,
}

impl CookieStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P, cipher: CookieCipher) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            cipher: Arc::new(cipher),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute_batch(include_str!("../../migrations/0001_cookies.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Insert or replace cookies in one transaction.
    pub fn save(&self, cookies: &[StoredCookie]) -> Result<(), DbError> {
        if cookies.is_empty() {
            return Ok(());
        }

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO cookies
                 (cookey, server, name, value, domain, path, expiration, secure, httponly, encrypted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for c in cookies {
                let (value, encrypted) = self.cipher.seal(&c.value);
                stmt.execute(params![
                    c.cookey(),
                    c.server,
                    c.name,
                    value,
                    c.domain,
                    c.path,
                    c.expiration,
                    c.secure,
                    c.httponly,
                    encrypted,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Saved {} cookies", cookies.len());
        Ok(())
    }

    /// Load every stored cookie.
    pub fn load_all(&self) -> Result<Vec<StoredCookie>, DbError> {
        self.query("SELECT server, name, value, domain, path, expiration, secure, httponly, encrypted FROM cookies", None)
    }

    /// Load the cookies of one server.
    pub fn load_server(&self, server: &str) -> Result<Vec<StoredCookie>, DbError> {
        self.query(
            "SELECT server, name, value, domain, path, expiration, secure, httponly, encrypted FROM cookies WHERE server = ?1",
            Some(server),
        )
    }

    fn query(&self, sql: &str, server: Option<&str>) -> Result<Vec<StoredCookie>, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;

        let map_row = |row: &rusqlite::Row<'_>| {
            let stored: String = row.get(2)?;
            let encrypted: bool = row.get(8)?;
            Ok(StoredCookie {
                server: row.get(0)?,
                name: row.get(1)?,
                value: self.cipher.open(&stored, encrypted),
                domain: row.get(3)?,
                path: row.get(4)?,
                expiration: row.get(5)?,
                secure: row.get(6)?,
                httponly: row.get(7)?,
            })
        };

        let cookies = match server {
            Some(s) => stmt.query_map(params![s], map_row)?.collect::<SqlResult<Vec<_>>>()?,
            None => stmt.query_map([], map_row)?.collect::<SqlResult<Vec<_>>>()?,
        };

        Ok(cookies)
    }

    /// Remove every cookie of a server, e.g. when it is deleted.
    pub fn delete_server(&self, server: &str) -> Result<usize, DbError> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM cookies WHERE server = ?1", params![server])?;
        Ok(n)
    }
}
