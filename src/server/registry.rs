//! Process-wide set of servers and their running poll workers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use super::{spawn_worker, Server, WorkerContext};
use crate::model::StatusCounts;

#[derive(Default)]
pub struct Registry {
    servers: RwLock<BTreeMap<String, Arc<Server>>>,
    stop_chans: Arc<tokio::sync::RwLock<HashMap<String, broadcast::Sender<()>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn servers(&self) -> Vec<Arc<Server>> {
        self.servers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn enabled_servers(&self) -> Vec<Arc<Server>> {
        self.servers().into_iter().filter(|s| s.is_enabled()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Server>> {
        self.servers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Register a server without starting a worker.
    pub fn insert(&self, server: Arc<Server>) {
        self.servers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(server.name().to_string(), server);
    }

    /// Register a server and start its poll worker.
    pub async fn add(&self, server: Arc<Server>, ctx: WorkerContext) {
        let name = server.name().to_string();
        let mut stop_chans = self.stop_chans.write().await;

        if stop_chans.contains_key(&name) {
            return; // already running
        }

        let (stop_tx, _) = broadcast::channel(1);
        stop_chans.insert(name.clone(), stop_tx.clone());
        drop(stop_chans);

        self.insert(server.clone());
        tracing::info!("Registry: starting worker for {}", name);

        let stop_chans = self.stop_chans.clone();
        let stop_rx = stop_tx.subscribe();
        tokio::spawn(async move {
            let handle = spawn_worker(server, ctx, stop_rx);
            let _ = handle.await;

            // a server re-added under the same name owns a new channel
            let mut chans = stop_chans.write().await;
            if chans.get(&name).is_some_and(|tx| tx.same_channel(&stop_tx)) {
                chans.remove(&name);
            }
        });
    }

    /// Stop a server's worker and forget the server.
    pub async fn remove(&self, name: &str) -> Option<Arc<Server>> {
        let mut stop_chans = self.stop_chans.write().await;
        if let Some(stop_tx) = stop_chans.remove(name) {
            let _ = stop_tx.send(());
            tracing::info!("Registry: removed server {}", name);
        }
        drop(stop_chans);

        self.servers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }

    pub async fn stop_all(&self) {
        let mut stop_chans = self.stop_chans.write().await;
        for (_, stop_tx) in stop_chans.drain() {
            let _ = stop_tx.send(());
        }
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.stop_chans.read().await.contains_key(name)
    }

    /// Counts summed over every enabled server.
    pub fn total_counts(&self) -> StatusCounts {
        let mut total = StatusCounts::default();
        for server in self.enabled_servers() {
            total.merge(&server.snapshot().counts);
        }
        total
    }

    /// Drives the single "ERROR" statusbar label.
    pub fn any_error(&self) -> bool {
        self.enabled_servers()
            .iter()
            .any(|s| s.snapshot().has_error)
    }

    pub fn refresh_all(&self) {
        for server in self.servers() {
            server.request_refresh();
        }
    }

    /// Status window was hidden.
    pub fn unfresh_all(&self) {
        for server in self.servers() {
            server.unfresh_all();
        }
    }
}
