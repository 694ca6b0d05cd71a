// ── Hub coordinator ──
//
// Full lifecycle of one hub connection: token, discovery, initial state
// poll, event stream, command dispatch and teardown. The coordinator is
// the only writer to its DeviceStore.

use std::sync::{Arc, PoisonError, Weak};

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use yolocal_api::{AccessToken, DeviceEvent, EventStream, HubClient, StreamState, TokenManager};

use crate::capability::switch_for;
use crate::config::HubConfig;
use crate::error::CoreError;
use crate::store::{DeviceMap, DeviceStore, StateMap, StateSnapshot, SubscriptionId};

// ── Phase ────────────────────────────────────────────────────────────

/// Lifecycle phase, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Discovering,
    PollingInitialStates,
    /// Setup finished. The event stream may still be down (manual-refresh
    /// mode); see [`Coordinator::stream_state`].
    Streaming,
    ShuttingDown,
    ShutDown,
}

impl Phase {
    fn is_terminal(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::ShutDown)
    }
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Create with
/// [`new`](Self::new), then run [`setup`](Self::setup) (or use
/// [`connect`](Self::connect) for both), and always finish with
/// [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: HubConfig,
    store: Arc<DeviceStore>,
    phase: watch::Sender<Phase>,
    client: ArcSwapOption<HubClient>,
    stream: Mutex<EventStream>,
    stream_state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    supervisor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator in [`Phase::Uninitialized`]. No I/O happens
    /// until [`setup`](Self::setup).
    pub fn new(config: HubConfig) -> Self {
        let stream = EventStream::new(config.stream());
        let stream_state = stream.state();
        let (phase, _) = watch::channel(Phase::Uninitialized);

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                store: Arc::new(DeviceStore::new()),
                phase,
                client: ArcSwapOption::empty(),
                stream: Mutex::new(stream),
                stream_state,
                cancel: CancellationToken::new(),
                supervisor: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Create and set up in one go.
    pub async fn connect(config: HubConfig) -> Result<Self, CoreError> {
        let coordinator = Self::new(config);
        coordinator.setup().await?;
        Ok(coordinator)
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Authenticate, discover devices, poll their states and connect the
    /// event stream.
    ///
    /// Per-device state failures and a failed stream connect degrade but
    /// do not fail setup. Any other failure shuts the coordinator down
    /// before the error is returned.
    ///
    /// Once streaming, a session the broker later drops or refuses is
    /// reconnected once with a newly issued token.
    pub async fn setup(&self) -> Result<(), CoreError> {
        match *self.inner.phase.borrow() {
            Phase::Uninitialized => {}
            phase if phase.is_terminal() => return Err(CoreError::ShutDown),
            phase => {
                return Err(CoreError::Internal(format!(
                    "setup already ran (phase {phase:?})"
                )));
            }
        }

        if let Err(e) = self.run_setup().await {
            warn!(error = %e, "hub setup failed, releasing resources");
            self.shutdown().await;
            // A concurrent shutdown may have finished before the stream
            // connect returned.
            self.inner.stream.lock().await.disconnect().await;
            return Err(e);
        }
        Ok(())
    }

    async fn run_setup(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let base_url = config.base_url()?;
        let http = config.transport().build_client()?;
        let tokens = TokenManager::new(
            http.clone(),
            &base_url,
            &config.client_id,
            config.client_secret.clone(),
        )?;
        let client = Arc::new(HubClient::new(http, &base_url, Arc::new(tokens))?);
        self.inner.client.store(Some(Arc::clone(&client)));

        // Uninitialized -> Discovering
        self.advance(Phase::Discovering)?;
        client.tokens().get_token().await?;
        let devices = client.get_devices().await?;
        info!(count = devices.len(), host = %config.host, "discovered devices");
        self.inner.store.replace_devices(devices);

        // Discovering -> PollingInitialStates
        self.advance(Phase::PollingInitialStates)?;
        self.poll_states(&client).await;

        // PollingInitialStates -> Streaming
        let mut stream_up = false;
        if config.stream_enabled {
            let connected = match client.tokens().get_token().await {
                Ok(token) => self.connect_stream(&token).await,
                Err(e) => Err(e.into()),
            };
            match connected {
                Ok(()) => stream_up = true,
                Err(e) => {
                    warn!(error = %e, "event stream unavailable, continuing in manual-refresh mode");
                }
            }
        } else {
            info!("event stream disabled, manual-refresh mode");
        }
        self.advance(Phase::Streaming)?;
        if config.stream_enabled {
            self.spawn_supervisor(stream_up);
        }

        info!(devices = self.inner.store.device_count(), "hub setup complete");
        Ok(())
    }

    /// Disconnect the event stream and release the HTTP session.
    ///
    /// Idempotent and safe from any phase, including after a failed
    /// setup. Concurrent callers all return once teardown is complete.
    pub async fn shutdown(&self) {
        let started = self.inner.phase.send_if_modified(|phase| {
            if phase.is_terminal() {
                false
            } else {
                *phase = Phase::ShuttingDown;
                true
            }
        });

        if !started {
            let mut rx = self.inner.phase.subscribe();
            let _ = rx.wait_for(|phase| *phase == Phase::ShutDown).await;
            return;
        }

        self.inner.cancel.cancel();
        let supervisor = self
            .inner
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = supervisor {
            if let Err(e) = task.await {
                warn!(error = %e, "stream supervisor ended abnormally");
            }
        }

        self.inner.stream.lock().await.disconnect().await;
        self.inner.client.store(None);
        self.inner.phase.send_replace(Phase::ShutDown);
        info!(host = %self.inner.config.host, "hub coordinator shut down");
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send raw set-state params to one device and return the hub's
    /// acknowledgement.
    ///
    /// Unknown ids fail with [`CoreError::UnknownDevice`] without any
    /// network call. The cache is not touched; the resulting state
    /// arrives through the event stream.
    pub async fn send_command(&self, device_id: &str, params: Value) -> Result<Value, CoreError> {
        let device = self
            .inner
            .store
            .device(device_id)
            .ok_or_else(|| CoreError::UnknownDevice {
                device_id: device_id.to_owned(),
            })?;
        let client = self.client()?;

        debug!(device_id, device_type = %device.device_type, "sending command");
        Ok(client.set_state(&device, params).await?)
    }

    /// Switch a device on through its type's switch capability.
    pub async fn turn_on(&self, device_id: &str) -> Result<Value, CoreError> {
        self.switch(device_id, true).await
    }

    /// Switch a device off through its type's switch capability.
    pub async fn turn_off(&self, device_id: &str) -> Result<Value, CoreError> {
        self.switch(device_id, false).await
    }

    async fn switch(&self, device_id: &str, on: bool) -> Result<Value, CoreError> {
        let device = self
            .inner
            .store
            .device(device_id)
            .ok_or_else(|| CoreError::UnknownDevice {
                device_id: device_id.to_owned(),
            })?;
        let (kind, _) = switch_for(&device.device_type).ok_or_else(|| CoreError::Unsupported {
            device_type: device.device_type.clone(),
            operation: if on { "turn on" } else { "turn off" }.into(),
        })?;
        self.send_command(device_id, kind.command(on)).await
    }

    // ── Manual refresh & reconnection ────────────────────────────────

    /// Re-discover devices and re-poll every state.
    ///
    /// The device set is replaced atomically; per-device state failures
    /// record `{}` as during setup. Devices that received a stream event
    /// while the poll ran keep the event's state.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let client = self.client()?;
        let devices = client.get_devices().await?;
        self.inner.store.replace_devices(devices);
        self.poll_states(&client).await;
        debug!(devices = self.inner.store.device_count(), "manual refresh complete");
        Ok(())
    }

    /// Tear down the event stream and reconnect it with a newly issued
    /// token. Used after the broker refused a stale token.
    pub async fn reconnect_stream(&self) -> Result<(), CoreError> {
        let client = self.client()?;
        let token = client.tokens().refresh().await?;
        self.connect_stream(&token).await
    }

    // ── State observation ────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    /// Subscribe to lifecycle phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.inner.phase.subscribe()
    }

    /// Subscribe to event stream connectivity changes.
    pub fn stream_state(&self) -> watch::Receiver<StreamState> {
        self.inner.stream_state.clone()
    }

    /// Register a synchronous observer of state snapshots.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static,
    {
        self.inner.store.add_observer(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.store.remove_observer(id)
    }

    /// Async alternative to [`subscribe`](Self::subscribe).
    pub fn watch_states(&self) -> watch::Receiver<StateSnapshot> {
        self.inner.store.subscribe()
    }

    // ── Snapshot accessors (delegate to DeviceStore) ─────────────────

    pub fn devices(&self) -> Arc<DeviceMap> {
        self.inner.store.devices()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<yolocal_api::Device>> {
        self.inner.store.device(device_id)
    }

    /// Cached state of one device, `None` when unknown.
    pub fn state(&self, device_id: &str) -> Option<Value> {
        self.inner.store.state(device_id)
    }

    pub fn states(&self) -> StateSnapshot {
        self.inner.store.states()
    }

    pub fn last_event_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.inner.store.last_event_at()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn client(&self) -> Result<Arc<HubClient>, CoreError> {
        self.inner.client.load_full().ok_or(CoreError::ShutDown)
    }

    /// Move to `next` unless shutdown has begun.
    fn advance(&self, next: Phase) -> Result<(), CoreError> {
        let moved = self.inner.phase.send_if_modified(|phase| {
            if phase.is_terminal() {
                false
            } else {
                *phase = next;
                true
            }
        });
        if moved {
            debug!(phase = ?next, "coordinator phase");
            Ok(())
        } else {
            Err(CoreError::ShutDown)
        }
    }

    async fn poll_states(&self, client: &HubClient) {
        let mark = self.inner.store.event_mark();
        let devices = self.inner.store.devices();
        let fetches = devices.values().map(|device| async move {
            let state = match client.get_state(device).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(device_id = %device.device_id, error = %e, "initial state fetch failed");
                    Value::Object(serde_json::Map::new())
                }
            };
            (device.device_id.clone(), state)
        });

        let states: StateMap = join_all(fetches).await.into_iter().collect();
        self.inner.store.seed_states(states, mark);
    }

    async fn connect_stream(&self, token: &AccessToken) -> Result<(), CoreError> {
        let mut stream = self.inner.stream.lock().await;
        // Shutdown disconnects under this lock, so nothing connected after
        // this check can outlive it.
        if self.phase().is_terminal() {
            return Err(CoreError::ShutDown);
        }
        let store = Arc::clone(&self.inner.store);
        stream.subscribe(move |event: DeviceEvent| {
            store.apply_event(&event.device_id, event.data);
        });
        stream.connect(token).await?;
        Ok(())
    }

    fn spawn_supervisor(&self, armed: bool) {
        let task = tokio::spawn(supervise_stream(
            Arc::downgrade(&self.inner),
            self.inner.stream_state.clone(),
            self.inner.cancel.clone(),
            armed,
        ));
        let previous = self
            .inner
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

/// Reconnect the event stream with a fresh token whenever a session that
/// was up ends in `Failed`. One attempt per failure: a reconnect that
/// itself fails leaves the stream down until the next manual
/// [`Coordinator::reconnect_stream`].
///
/// `armed` says whether the session connected during setup is live.
async fn supervise_stream(
    inner: Weak<CoordinatorInner>,
    mut state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    mut armed: bool,
) {
    loop {
        let current = state.borrow_and_update().clone();
        match current {
            StreamState::Connected | StreamState::Reconnecting { .. } => armed = true,
            StreamState::Failed { reason } if armed => {
                armed = false;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let coordinator = Coordinator { inner };
                if coordinator.phase() == Phase::Streaming {
                    warn!(%reason, "event stream failed, reconnecting with a fresh token");
                    match coordinator.reconnect_stream().await {
                        Ok(()) => {
                            info!("event stream reconnected with a fresh token");
                            armed = true;
                        }
                        Err(e) => {
                            warn!(error = %e, "event stream reconnect failed, manual refresh only");
                        }
                    }
                }
            }
            _ => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!("stream supervisor exiting");
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("host", &self.inner.config.host)
            .field("phase", &self.phase())
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
