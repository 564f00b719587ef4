//! Nagstamon core: polls monitoring servers, filters their problems, keeps
//! track of new events and decides when and how to notify the user.
//!
//! The widget layer talks to the core through [`events::EventBus`] and the
//! collaborator traits in [`collab`].

pub mod actions;
pub mod backend;
pub mod collab;
pub mod config;
pub mod db;
pub mod events;
pub mod filter;
pub mod history;
pub mod model;
pub mod notify;
pub mod server;
pub mod version;
pub mod view;
pub mod weblogin;

/// Version compared against the published release by the version probe.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
