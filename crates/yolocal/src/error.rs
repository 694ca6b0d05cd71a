//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use yolocal_config::ConfigError;
use yolocal_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to hub at {url}: {reason}")]
    #[diagnostic(
        code(yolocal::connection_failed),
        help(
            "Check that the hub is powered on and reachable on the LAN.\n\
             URL: {url}\n\
             Try: yolocal check"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(yolocal::auth_failed),
        help(
            "Verify the client id and secret shown in the YoLink app under\n\
             the local hub's integration settings for profile '{profile}'."
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No client secret configured for profile '{profile}'")]
    #[diagnostic(
        code(yolocal::no_credentials),
        help(
            "Set client_secret_env in the profile, store the secret in the\n\
             system keyring, or pass --client-secret / YOLOCAL_CLIENT_SECRET."
        )
    )]
    NoCredentials { profile: String },

    // ── Devices ──────────────────────────────────────────────────────

    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(yolocal::not_found),
        help("Run: yolocal devices to see available devices")
    )]
    NotFound { identifier: String },

    #[error("{device_type} devices do not support {operation}")]
    #[diagnostic(
        code(yolocal::unsupported),
        help("Use: yolocal send <device> <json> to send raw parameters")
    )]
    Unsupported {
        device_type: String,
        operation: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Hub API error ({code}): {message}")]
    #[diagnostic(code(yolocal::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(yolocal::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(yolocal::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Config file: {path}"
        )
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error("No hub configured")]
    #[diagnostic(
        code(yolocal::no_config),
        help(
            "Add a profile to {path}\n\
             or pass --host, --client-id, --client-secret and --net-id."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(yolocal::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Hub request timed out")]
    #[diagnostic(
        code(yolocal::timeout),
        help("Increase timeout with --timeout or check hub responsiveness.")
    )]
    Timeout,

    // ── Lifecycle ────────────────────────────────────────────────────

    #[error("{0}")]
    #[diagnostic(code(yolocal::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(yolocal::json), help("Pass a JSON object, e.g. '{{\"state\":\"open\"}}'."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::Unsupported { .. }
            | Self::Json(_)
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Name the profile in authentication failures.
    pub fn with_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.into(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Timeout => CliError::Timeout,

            CoreError::UnknownDevice { device_id } => CliError::NotFound {
                identifier: device_id,
            },

            CoreError::Unsupported {
                device_type,
                operation,
            } => CliError::Unsupported {
                device_type,
                operation,
            },

            CoreError::Api {
                message,
                code,
                status,
                response: _,
            } => CliError::ApiError {
                code: code
                    .or_else(|| status.map(|s| format!("HTTP {s}")))
                    .unwrap_or_else(|| "unknown".into()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::ShutDown => CliError::Internal("hub connection was shut down".into()),

            CoreError::Internal(msg) => CliError::Internal(msg),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
                path: yolocal_config::config_path().display().to_string(),
            },
            other => CliError::Config(other),
        }
    }
}
