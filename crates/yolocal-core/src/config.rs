// ── Runtime connection configuration ──
//
// Describes *how* to reach one hub. Carries credentials and tuning but
// never touches disk; the CLI builds a `HubConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;
use yolocal_api::stream::DEFAULT_STREAM_PORT;
use yolocal_api::{ReconnectConfig, StreamConfig, TransportConfig};

use crate::error::CoreError;

/// Default HTTP API port of the local hub.
pub const DEFAULT_HTTP_PORT: u16 = 1080;

/// Configuration for connecting to a single hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub host name or IP address.
    pub host: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Network identifier scoping the event stream topic.
    pub net_id: String,
    pub http_port: u16,
    pub stream_port: u16,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Upper bound on the MQTT handshake.
    pub stream_connect_timeout: Duration,
    pub stream_keep_alive: Duration,
    pub reconnect: ReconnectConfig,
    /// Connect the event stream during setup. When `false` the
    /// coordinator runs in manual-refresh mode.
    pub stream_enabled: bool,
}

impl HubConfig {
    pub fn new(
        host: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        net_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            client_id: client_id.into(),
            client_secret,
            net_id: net_id.into(),
            http_port: DEFAULT_HTTP_PORT,
            stream_port: DEFAULT_STREAM_PORT,
            timeout: Duration::from_secs(30),
            stream_connect_timeout: Duration::from_secs(10),
            stream_keep_alive: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            stream_enabled: true,
        }
    }

    /// `http://{host}:{http_port}`.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        let raw = format!("http://{}:{}", self.host, self.http_port);
        Url::parse(&raw).map_err(|e| CoreError::Config {
            message: format!("invalid hub address {raw}: {e}"),
        })
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }

    pub(crate) fn stream(&self) -> StreamConfig {
        StreamConfig {
            port: self.stream_port,
            keep_alive: self.stream_keep_alive,
            connect_timeout: self.stream_connect_timeout,
            reconnect: self.reconnect.clone(),
            ..StreamConfig::new(&self.host, &self.net_id, &self.client_id)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> HubConfig {
        HubConfig::new("192.168.1.50", "cid", SecretString::from("s"), "net-1")
    }

    #[test]
    fn defaults() {
        let config = config();
        assert_eq!(config.http_port, 1080);
        assert_eq!(config.stream_port, 18080);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.stream_enabled);
    }

    #[test]
    fn base_url_uses_http_port() {
        let mut config = config();
        assert_eq!(config.base_url().unwrap().as_str(), "http://192.168.1.50:1080/");
        config.http_port = 8080;
        assert_eq!(config.base_url().unwrap().as_str(), "http://192.168.1.50:8080/");
    }

    #[test]
    fn bad_host_is_config_error() {
        let mut config = config();
        config.host = "not a host".into();
        assert!(matches!(config.base_url(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn stream_config_follows_hub_config() {
        let mut config = config();
        config.stream_port = 1883;
        let stream = config.stream();
        assert_eq!(stream.host, "192.168.1.50");
        assert_eq!(stream.port, 1883);
        assert_eq!(stream.topic(), "ylsubnet/net-1/+/report");
        assert_eq!(stream.client_id, "cid");
    }
}
