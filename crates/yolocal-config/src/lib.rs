//! Shared configuration for the yolocal CLI.
//!
//! TOML profiles, client-secret resolution (env + keyring + plaintext),
//! and translation to `yolocal_core::HubConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use yolocal_core::HubConfig;

/// Keyring service name for stored client secrets.
pub const KEYRING_SERVICE: &str = "yolocal";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("no client secret configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named hub profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Hub host name or IP address.
    pub host: String,

    pub client_id: String,

    /// Client secret (plaintext, prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Environment variable holding the client secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_env: Option<String>,

    /// Network identifier (scopes the event stream topic).
    pub net_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_port: Option<u16>,

    /// Override the default request timeout (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Set to `false` to skip the event stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl Profile {
    /// A copy safe to print: plaintext secrets are masked.
    pub fn redacted(&self) -> Self {
        Self {
            client_secret: self.client_secret.as_ref().map(|_| REDACTED.into()),
            ..self.clone()
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let required = [
            ("host", &self.host),
            ("client_id", &self.client_id),
            ("net_id", &self.net_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("profiles.{name}.{field}"),
                    reason: "must not be empty".into(),
                });
            }
        }
        for (field, port) in [("http_port", self.http_port), ("stream_port", self.stream_port)] {
            if port == Some(0) {
                return Err(ConfigError::Validation {
                    field: format!("profiles.{name}.{field}"),
                    reason: "must be between 1 and 65535".into(),
                });
            }
        }
        Ok(())
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }

    /// Profile names, sorted.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// A copy safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            profiles: self
                .profiles
                .iter()
                .map(|(name, profile)| (name.clone(), profile.redacted()))
                .collect(),
            ..self.clone()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "yolocal", "yolocal").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("yolocal");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// `YOLOCAL_`-prefixed variables override file values, with `__`
/// separating nested keys (`YOLOCAL_PROFILES__HOME__HOST`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("YOLOCAL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the client secret: `client_secret_env`, then the system
/// keyring (`yolocal` / `{profile}/client-secret`), then plaintext.
pub fn resolve_client_secret(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's client_secret_env → env var lookup
    if let Some(ref env_name) = profile.client_secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/client-secret"))
    {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref secret) = profile.client_secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Build a `HubConfig` from a profile, with no CLI overrides.
pub fn profile_to_hub_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<HubConfig, ConfigError> {
    let secret = resolve_client_secret(profile, profile_name)?;
    hub_config_with_secret(profile, profile_name, defaults, secret)
}

/// Build a `HubConfig` from a profile using an already-resolved secret.
pub fn hub_config_with_secret(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    secret: SecretString,
) -> Result<HubConfig, ConfigError> {
    profile.validate(profile_name)?;

    let mut hub = HubConfig::new(
        profile.host.trim(),
        profile.client_id.clone(),
        secret,
        profile.net_id.clone(),
    );
    if let Some(port) = profile.http_port {
        hub.http_port = port;
    }
    if let Some(port) = profile.stream_port {
        hub.stream_port = port;
    }
    hub.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    hub.stream_enabled = profile.stream.unwrap_or(true);
    Ok(hub)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "home"

[defaults]
timeout = 15

[profiles.home]
host = "192.168.1.50"
client_id = "ua_0123"
client_secret = "plain-secret"
net_id = "net-1"
stream_port = 18081

[profiles.cabin]
host = "10.0.0.9"
client_id = "ua_4567"
net_id = "net-2"
http_port = 8080
stream = false
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
        assert_eq!(config.defaults.timeout, 30);
    }

    #[test]
    fn loads_profiles_and_default() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();

        assert_eq!(config.profile_names(), vec!["cabin", "home"]);
        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(profile.host, "192.168.1.50");

        let (_, cabin) = config.profile(Some("cabin")).unwrap();
        assert_eq!(cabin.http_port, Some(8080));
        assert!(matches!(
            config.profile(Some("attic")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn hub_config_from_profile() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        let (name, profile) = config.profile(None).unwrap();

        let hub = profile_to_hub_config(profile, name, &config.defaults).unwrap();
        assert_eq!(hub.host, "192.168.1.50");
        assert_eq!(hub.http_port, 1080);
        assert_eq!(hub.stream_port, 18081);
        assert_eq!(hub.timeout, Duration::from_secs(15));
        assert!(hub.stream_enabled);
        assert_eq!(hub.client_secret.expose_secret(), "plain-secret");
    }

    #[test]
    fn profile_without_secret_is_rejected() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        let (name, cabin) = config.profile(Some("cabin")).unwrap();

        let err = profile_to_hub_config(cabin, name, &config.defaults).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "cabin"));
    }

    #[test]
    fn secret_env_var_wins_over_plaintext() {
        let Ok(path_value) = std::env::var("PATH") else {
            return;
        };
        let profile = Profile {
            client_secret: Some("plain".into()),
            client_secret_env: Some("PATH".into()),
            ..Profile::default()
        };
        let secret = resolve_client_secret(&profile, "t").unwrap();
        assert_eq!(secret.expose_secret(), path_value);
    }

    #[test]
    fn empty_fields_fail_validation() {
        let profile = Profile {
            host: "h".into(),
            client_id: " ".into(),
            net_id: "n".into(),
            client_secret: Some("s".into()),
            ..Profile::default()
        };
        let err = profile_to_hub_config(&profile, "p", &Defaults::default()).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "profiles.p.client_id")
        );

        let profile = Profile {
            client_id: "c".into(),
            http_port: Some(0),
            ..profile
        };
        assert!(matches!(
            profile_to_hub_config(&profile, "p", &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn redaction_masks_plaintext_secret() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap().redacted();
        assert_eq!(
            config.profiles["home"].client_secret.as_deref(),
            Some(REDACTED)
        );
        assert!(config.profiles["cabin"].client_secret.is_none());
    }

    #[test]
    fn save_round_trips_through_loader() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("nested").join("config.toml");
        save_config_to(&config, &out).unwrap();

        let reloaded = load_config_from(&out).unwrap();
        assert_eq!(reloaded.profile_names(), config.profile_names());
        assert_eq!(reloaded.profiles["cabin"].stream, Some(false));
    }
}
