// ── Core error types ──
//
// User-facing errors from yolocal-core. Consumers never see raw HTTP or
// MQTT failures; the `From<yolocal_api::Error>` impl translates them into
// domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot connect to hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Hub request timed out")]
    Timeout,

    // ── Validation errors ────────────────────────────────────────────
    /// The device id is not in the registry. No request was sent.
    #[error("Unknown device: {device_id}")]
    UnknownDevice { device_id: String },

    #[error("{device_type} devices do not support {operation}")]
    Unsupported {
        device_type: String,
        operation: String,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    /// The hub rejected a call. `code` is the hub's response code, or
    /// `None` for HTTP-level failures.
    #[error("Hub API error: {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: Option<u16>,
        response: Option<serde_json::Value>,
    },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Coordinator has been shut down")]
    ShutDown,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures that only re-entering credentials can fix.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<yolocal_api::Error> for CoreError {
    fn from(err: yolocal_api::Error) -> Self {
        match err {
            yolocal_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            yolocal_api::Error::StreamRefused(reason) => CoreError::AuthenticationFailed {
                message: format!("event stream refused the connection: {reason}"),
            },
            yolocal_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                        response: None,
                    }
                }
            }
            yolocal_api::Error::HttpStatus { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                code: None,
                status: Some(status),
                response: None,
            },
            yolocal_api::Error::Api {
                code,
                message,
                response,
            } => CoreError::Api {
                message,
                code: Some(code),
                status: None,
                response: Some(response),
            },
            yolocal_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            yolocal_api::Error::Client(message) => CoreError::Internal(message),
            yolocal_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            yolocal_api::Error::StreamConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("event stream connection failed: {reason}"),
            },
            yolocal_api::Error::StreamClosed => CoreError::ConnectionFailed {
                url: String::new(),
                reason: "event stream closed".into(),
            },
        }
    }
}
