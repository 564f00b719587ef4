//! Database module for Nagstamon.
//!
//! Persists harvested web-login cookies in SQLite, optionally encrypted.

mod crypto;
mod models;
mod store;

pub use crypto::*;
pub use models::*;
pub use store::*;
