// Shared transport configuration for the hub HTTP session.
//
// The token manager and the API client share one `reqwest::Client` (and
// therefore one connection pool). This module owns the builder logic.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("yolocal/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building the HTTP session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The local hub speaks plain HTTP on its LAN port, so no TLS
    /// settings are carried here.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Client(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builds_client() {
        assert!(TransportConfig::default().build_client().is_ok());
    }
}
