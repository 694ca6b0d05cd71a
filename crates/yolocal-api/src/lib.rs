// yolocal-api: Async Rust client for the YoLink local hub (HTTP API + MQTT event stream)

pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod stream;
pub mod transport;

pub use auth::{AccessToken, Clock, SystemClock, TokenManager, verify_credentials};
pub use client::HubClient;
pub use error::Error;
pub use models::{ApiRequest, Device, DeviceEvent};
pub use stream::{EventStream, ReconnectConfig, StreamConfig, StreamState};
pub use transport::TransportConfig;
