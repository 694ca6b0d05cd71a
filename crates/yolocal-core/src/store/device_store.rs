// ── Device store ──
//
// Registry of discovered devices plus the last-known state of each.
// Reads are lock-free snapshot loads. Writes are serialized and each one
// publishes a fresh immutable state map to observers and watchers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;
use yolocal_api::Device;

use super::observers::{ObserverList, SubscriptionId};

/// Devices keyed by id, in hub listing order.
pub type DeviceMap = IndexMap<String, Arc<Device>>;

/// Last-known state per device id.
pub type StateMap = HashMap<String, Value>;

/// Immutable view of every cached state at one point in time.
pub type StateSnapshot = Arc<StateMap>;

/// Position in the store's event sequence, taken before a state poll.
///
/// Passed back to `DeviceStore::seed_states` so that events applied
/// while the poll was in flight are not overwritten by older data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventMark(u64);

/// Serializes writes and remembers which event last touched each device.
#[derive(Debug, Default)]
struct WriteLog {
    seq: u64,
    touched: HashMap<String, u64>,
}

/// Central store for one hub's devices and their states.
///
/// Owned by a single coordinator, which is the only writer. A device with
/// no entry in the state map has an unknown state.
pub struct DeviceStore {
    devices: ArcSwap<DeviceMap>,
    states: watch::Sender<StateSnapshot>,
    observers: ObserverList,
    write_log: Mutex<WriteLog>,
    last_event: watch::Sender<Option<DateTime<Utc>>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (states, _) = watch::channel(Arc::new(StateMap::new()));
        let (last_event, _) = watch::channel(None);
        let (last_refresh, _) = watch::channel(None);

        Self {
            devices: ArcSwap::from_pointee(DeviceMap::new()),
            states,
            observers: ObserverList::default(),
            write_log: Mutex::new(WriteLog::default()),
            last_event,
            last_refresh,
        }
    }

    // ── Registry ─────────────────────────────────────────────────────

    pub fn devices(&self) -> Arc<DeviceMap> {
        self.devices.load_full()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices.load().get(device_id).cloned()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.load().contains_key(device_id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.load().len()
    }

    // ── State cache ──────────────────────────────────────────────────

    /// Cached state of one device, `None` when unknown.
    pub fn state(&self, device_id: &str) -> Option<Value> {
        self.states.borrow().get(device_id).cloned()
    }

    /// The current state map (cheap `Arc` clone).
    pub fn states(&self) -> StateSnapshot {
        Arc::clone(&self.states.borrow())
    }

    /// Watch the state map. Receives a new snapshot after every write.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.states.subscribe()
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Register a callback run synchronously, in registration order,
    /// after every state write.
    pub fn add_observer<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static,
    {
        self.observers.add(Arc::new(observer))
    }

    /// Returns `false` if the id was not registered.
    pub fn remove_observer(&self, id: SubscriptionId) -> bool {
        self.observers.remove(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    /// When the last stream event was applied.
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self.last_event.borrow()
    }

    /// When states were last seeded from the hub.
    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    // ── Writes (coordinator only) ────────────────────────────────────

    /// Replace the whole registry.
    pub(crate) fn replace_devices(&self, devices: Vec<Device>) {
        let _log = self.lock_log();
        let map: DeviceMap = devices
            .into_iter()
            .map(|device| (device.device_id.clone(), Arc::new(device)))
            .collect();
        self.devices.store(Arc::new(map));
    }

    /// Mark the current end of the event sequence. Take it before
    /// starting a state poll.
    pub(crate) fn event_mark(&self) -> EventMark {
        EventMark(self.lock_log().seq)
    }

    /// Replace the state map with freshly polled states.
    ///
    /// A device whose state was set by an event after `since` keeps that
    /// state instead of the polled one. Devices missing from `polled`
    /// become unknown.
    pub(crate) fn seed_states(&self, polled: StateMap, since: EventMark) {
        let log = self.lock_log();
        let current = self.states();
        let mut next = polled;
        for (device_id, seq) in &log.touched {
            if *seq <= since.0 {
                continue;
            }
            if let Some(state) = current.get(device_id) {
                debug!(device_id = %device_id, "keeping state from event newer than poll");
                next.insert(device_id.clone(), state.clone());
            }
        }

        let snapshot = Arc::new(next);
        self.states.send_replace(Arc::clone(&snapshot));
        self.last_refresh.send_replace(Some(Utc::now()));
        self.observers.notify(&snapshot);
    }

    /// Overwrite one device's state with an event payload.
    ///
    /// Events for ids outside the registry are dropped without touching
    /// the cache or notifying anyone. Returns whether the event applied.
    pub(crate) fn apply_event(&self, device_id: &str, data: Value) -> bool {
        let mut log = self.lock_log();
        if !self.contains(device_id) {
            debug!(device_id, "dropping event for unknown device");
            return false;
        }

        log.seq += 1;
        let seq = log.seq;
        log.touched.insert(device_id.to_owned(), seq);

        let mut next = StateMap::clone(&self.states.borrow());
        next.insert(device_id.to_owned(), data);
        let snapshot = Arc::new(next);

        self.states.send_replace(Arc::clone(&snapshot));
        self.last_event.send_replace(Some(Utc::now()));
        self.observers.notify(&snapshot);
        true
    }

    fn lock_log(&self) -> MutexGuard<'_, WriteLog> {
        self.write_log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStore")
            .field("devices", &self.device_count())
            .field("states", &self.states.borrow().len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
