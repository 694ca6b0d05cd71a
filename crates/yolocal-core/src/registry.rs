// ── Hub registry ──
//
// Keyed store of running coordinators, owned by the application. Entries
// are shut down explicitly when removed; nothing here is global.

use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;
use tracing::debug;

use crate::coordinator::Coordinator;

/// Coordinators keyed by entry id (a profile name, a config entry id...).
#[derive(Debug, Default)]
pub struct HubRegistry {
    hubs: Mutex<IndexMap<String, Coordinator>>,
}

impl HubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coordinator. A coordinator previously stored under the
    /// same id is shut down.
    pub async fn insert(&self, id: impl Into<String>, coordinator: Coordinator) {
        let id = id.into();
        let replaced = self.lock().insert(id.clone(), coordinator);
        if let Some(old) = replaced {
            debug!(id = %id, "replacing registered hub");
            old.shutdown().await;
        }
    }

    pub fn get(&self, id: &str) -> Option<Coordinator> {
        self.lock().get(id).cloned()
    }

    /// Entry ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove one entry and shut it down. Returns `false` if absent.
    pub async fn remove_and_shutdown(&self, id: &str) -> bool {
        let removed = self.lock().shift_remove(id);
        match removed {
            Some(coordinator) => {
                coordinator.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Shut down and remove every entry.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(String, Coordinator)> = self.lock().drain(..).collect();
        for (id, coordinator) in drained {
            debug!(id = %id, "shutting down hub");
            coordinator.shutdown().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<String, Coordinator>> {
        self.hubs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
