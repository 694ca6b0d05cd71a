use thiserror::Error;

/// Top-level error type for the `yolocal-api` crate.
///
/// Covers every failure mode of the hub's two surfaces: the HTTP API
/// (token grant + JSON-RPC endpoint) and the MQTT event stream.
/// `yolocal-core` maps these into domain-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token grant failed: credentials rejected, the hub answered with
    /// something that is not a token, or the token endpoint was unreachable.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The hub answered with a non-2xx HTTP status.
    #[error("HTTP {status} from hub: {body}")]
    HttpStatus { status: u16, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Building the shared HTTP client failed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    // ── Hub API ─────────────────────────────────────────────────────
    /// The API envelope carried a non-success `code`.
    ///
    /// `response` holds the raw envelope for diagnostics.
    #[error("Hub API error {code}: {message}")]
    Api {
        code: String,
        message: String,
        response: serde_json::Value,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Event stream ────────────────────────────────────────────────
    /// MQTT connection or subscription failed.
    #[error("Event stream connection failed: {0}")]
    StreamConnect(String),

    /// The broker refused the connection (bad credentials, stale token).
    #[error("Event stream connection refused: {0}")]
    StreamRefused(String),

    /// The event stream was used after it was disconnected.
    #[error("Event stream closed")]
    StreamClosed,
}

impl Error {
    /// Returns `true` when re-entering credentials is the only fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::StreamRefused(_))
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::StreamConnect(_) => true,
            _ => false,
        }
    }

    /// Extract the hub's response code, if this is an API error.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}
