//! MQTT event stream with auto-reconnect.
//!
//! Connects to the hub's local MQTT broker, subscribes to the network's
//! report topic and hands each parsed [`DeviceEvent`] to a single
//! registered handler. Transient broker errors are retried in the
//! background with exponential backoff + jitter; a refused connection
//! (bad credentials, stale token) stops the stream in
//! [`StreamState::Failed`] so the owner can reconnect with a fresh token.
//!
//! # Example
//!
//! ```rust,ignore
//! use yolocal_api::stream::{EventStream, StreamConfig};
//!
//! let mut stream = EventStream::new(StreamConfig::new("192.168.1.50", "net-1", "client-id"));
//! stream.subscribe(|event| println!("{}: {}", event.device_id, event.data));
//! stream.connect(&token).await?;
//! // ...
//! stream.disconnect().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::auth::AccessToken;
use crate::error::Error;
use crate::models::DeviceEvent;

/// Default MQTT port of the local hub.
pub const DEFAULT_STREAM_PORT: u16 = 18080;

// ── Request channel capacity ─────────────────────────────────────────

const REQUEST_CHANNEL_CAPACITY: usize = 16;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for broker reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── StreamConfig ─────────────────────────────────────────────────────

/// Connection parameters for the event stream.
///
/// The bearer token is deliberately absent: it is supplied at
/// [`EventStream::connect`] time.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    /// Network identifier scoping the report topic.
    pub net_id: String,
    /// Client id, also used as the MQTT username.
    pub client_id: String,
    pub keep_alive: Duration,
    /// Upper bound on waiting for the broker's CONNACK.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl StreamConfig {
    pub fn new(
        host: impl Into<String>,
        net_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_STREAM_PORT,
            net_id: net_id.into(),
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Report topic for every device on this network.
    pub fn topic(&self) -> String {
        format!("ylsubnet/{}/+/report", self.net_id)
    }
}

// ── StreamState ──────────────────────────────────────────────────────

/// Connectivity of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Stopped for good; a new [`EventStream::connect`] is required.
    Failed { reason: String },
}

// ── EventStream ──────────────────────────────────────────────────────

/// Callback receiving every parsed device report.
pub type EventHandler = Box<dyn Fn(DeviceEvent) + Send + Sync>;

struct Session {
    client: AsyncClient,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Client for the hub's MQTT report stream.
///
/// Holds at most one live broker session. The handler slot outlives
/// sessions, so a handler registered once keeps receiving events across
/// [`disconnect`](Self::disconnect) / [`connect`](Self::connect) cycles.
pub struct EventStream {
    config: StreamConfig,
    handler: Arc<ArcSwapOption<EventHandler>>,
    state_tx: watch::Sender<StreamState>,
    session: Option<Session>,
}

impl EventStream {
    pub fn new(config: StreamConfig) -> Self {
        let (state_tx, _) = watch::channel(StreamState::Disconnected);
        Self {
            config,
            handler: Arc::new(ArcSwapOption::empty()),
            state_tx,
            session: None,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Register the event handler, replacing any previous one.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(DeviceEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Box::new(handler);
        self.handler.store(Some(Arc::new(handler)));
    }

    /// Watch the stream's connectivity.
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> StreamState {
        self.state_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Connect to the broker with `token` as password, wait for the
    /// CONNACK, subscribe to the report topic and spawn the reader task.
    ///
    /// An existing session is torn down first.
    pub async fn connect(&mut self, token: &AccessToken) -> Result<(), Error> {
        self.disconnect().await;

        let topic = self.config.topic();
        let session_id = format!("{}_{}", self.config.client_id, Uuid::new_v4().simple());
        info!(
            host = %self.config.host,
            port = self.config.port,
            topic = %topic,
            "connecting to event stream"
        );

        let mut options = MqttOptions::new(session_id, &self.config.host, self.config.port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);
        options.set_credentials(&self.config.client_id, token.expose());

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        self.state_tx.send_replace(StreamState::Connecting);

        let handshake =
            tokio::time::timeout(self.config.connect_timeout, wait_for_connack(&mut eventloop))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::StreamConnect(format!(
                        "no CONNACK within {:?}",
                        self.config.connect_timeout
                    )))
                });
        if let Err(e) = handshake {
            self.state_tx.send_replace(StreamState::Failed {
                reason: e.to_string(),
            });
            return Err(e);
        }

        if let Err(e) = client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
            let err = Error::StreamConnect(format!("subscribe to {topic} failed: {e}"));
            self.state_tx.send_replace(StreamState::Failed {
                reason: err.to_string(),
            });
            return Err(err);
        }

        self.state_tx.send_replace(StreamState::Connected);
        info!(topic = %topic, "event stream connected");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(stream_loop(
            eventloop,
            client.clone(),
            topic,
            Arc::clone(&self.handler),
            self.state_tx.clone(),
            self.config.reconnect.clone(),
            cancel.clone(),
        ));

        self.session = Some(Session {
            client,
            cancel,
            task,
        });
        Ok(())
    }

    /// Stop the reader task and close the broker connection.
    ///
    /// Idempotent: a no-op when not connected.
    pub async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        // Best effort: the request is dropped if the loop exits first.
        let _ = session.client.try_disconnect();
        session.cancel.cancel();
        if let Err(e) = session.task.await {
            warn!(error = %e, "event stream task ended abnormally");
        }

        self.state_tx.send_replace(StreamState::Disconnected);
        info!("event stream disconnected");
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("config", &self.config)
            .field("state", &*self.state_tx.borrow())
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

// ── Handshake ────────────────────────────────────────────────────────

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), Error> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(Error::StreamRefused(format!("{:?}", ack.code)))
                };
            }
            Ok(other) => trace!(?other, "pre-CONNACK event"),
            Err(e) => return Err(connection_error(e)),
        }
    }
}

fn connection_error(err: ConnectionError) -> Error {
    match err {
        ConnectionError::ConnectionRefused(code) => Error::StreamRefused(format!("{code:?}")),
        other => Error::StreamConnect(other.to_string()),
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: poll → dispatch → on error, backoff → let rumqttc reconnect.
async fn stream_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topic: String,
    handler: Arc<ArcSwapOption<EventHandler>>,
    state_tx: watch::Sender<StreamState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            polled = eventloop.poll() => {
                match polled {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        trace!(topic = %publish.topic, bytes = publish.payload.len(), "report received");
                        dispatch(&publish.payload, &handler);
                    }
                    // Clean sessions lose their subscriptions on reconnect.
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                            warn!(error = %e, topic = %topic, "resubscribe failed");
                        }
                        info!(attempt, "event stream reconnected");
                        attempt = 0;
                        state_tx.send_replace(StreamState::Connected);
                    }
                    Ok(_) => {}
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        error!(?code, "event stream refused by broker, giving up");
                        state_tx.send_replace(StreamState::Failed {
                            reason: format!("connection refused: {code:?}"),
                        });
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, attempt, "event stream error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                error!(max_retries = max, "event stream reconnection limit reached, giving up");
                                state_tx.send_replace(StreamState::Failed {
                                    reason: format!("reconnection limit reached: {e}"),
                                });
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        attempt = attempt.saturating_add(1);
                        state_tx.send_replace(StreamState::Reconnecting { attempt });
                        debug!(delay_ms = delay.as_millis(), attempt, "waiting before reconnect");

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    debug!("event stream loop exiting");
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse one report payload. Malformed payloads are logged and dropped.
fn parse_report(payload: &[u8]) -> Option<DeviceEvent> {
    match serde_json::from_slice::<DeviceEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(
                error = %e,
                payload = %String::from_utf8_lossy(payload),
                "dropping malformed report"
            );
            None
        }
    }
}

fn dispatch(payload: &[u8], handler: &ArcSwapOption<EventHandler>) {
    let Some(event) = parse_report(payload) else {
        return;
    };
    match handler.load_full() {
        Some(handler) => handler(event),
        None => trace!(device_id = %event.device_id, "no handler registered, report dropped"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25%, deterministic in the attempt number.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
