//! CLI configuration: thin wrapper around `yolocal_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --client-id, --client-secret, --net-id, ...).

use std::time::Duration;

use secrecy::SecretString;

use yolocal_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use yolocal_config::{Config, Profile, config_path, load_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `HubConfig` for the active profile.
///
/// Returns the profile name alongside the config. With no matching
/// profile the hub is described entirely by flags.
pub fn hub_config(global: &GlobalOpts, cfg: &Config) -> Result<(String, HubConfig), CliError> {
    let name = active_profile_name(global, cfg);

    if let Some(profile) = cfg.profiles.get(&name) {
        let hub = resolve_profile(profile, &name, global, cfg)?;
        return Ok((name, hub));
    }

    // An explicitly named profile must exist.
    if global.profile.is_some() {
        return Err(profile_not_found(&name, cfg));
    }

    let Some(host) = global.host.as_deref() else {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    };
    let profile = Profile {
        host: host.to_owned(),
        client_id: global.client_id.clone().unwrap_or_default(),
        net_id: global.net_id.clone().unwrap_or_default(),
        ..Profile::default()
    };
    let hub = resolve_profile(&profile, &name, global, cfg)?;
    Ok((name, hub))
}

/// Build the `HubConfig` for a named profile, ignoring `--profile`.
pub fn hub_config_for(
    name: &str,
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<HubConfig, CliError> {
    let profile = cfg
        .profiles
        .get(name)
        .ok_or_else(|| profile_not_found(name, cfg))?;
    resolve_profile(profile, name, global, cfg)
}

/// Translate a `Profile` plus global flags into a `HubConfig`.
///
/// CLI flag overrides take priority over profile values.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<HubConfig, CliError> {
    let mut profile = profile.clone();
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref client_id) = global.client_id {
        profile.client_id.clone_from(client_id);
    }
    if let Some(ref net_id) = global.net_id {
        profile.net_id.clone_from(net_id);
    }
    if global.http_port.is_some() {
        profile.http_port = global.http_port;
    }
    if global.stream_port.is_some() {
        profile.stream_port = global.stream_port;
    }

    let secret = match global.client_secret {
        Some(ref secret) => SecretString::from(secret.clone()),
        None => yolocal_config::resolve_client_secret(&profile, profile_name)?,
    };

    let mut hub =
        yolocal_config::hub_config_with_secret(&profile, profile_name, &cfg.defaults, secret)?;
    if let Some(secs) = global.timeout {
        hub.timeout = Duration::from_secs(secs);
    }
    Ok(hub)
}

fn profile_not_found(name: &str, cfg: &Config) -> CliError {
    let names = cfg.profile_names();
    CliError::ProfileNotFound {
        name: name.into(),
        available: if names.is_empty() {
            "(none)".into()
        } else {
            names.join(", ")
        },
        path: config_path().display().to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["yolocal"];
        argv.extend_from_slice(args);
        argv.push("devices");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_home() -> Config {
        let mut cfg = Config {
            default_profile: Some("home".into()),
            ..Config::default()
        };
        cfg.profiles.insert(
            "home".into(),
            Profile {
                host: "192.168.1.50".into(),
                client_id: "ua_home".into(),
                client_secret: Some("profile-secret".into()),
                net_id: "net-home".into(),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn flags_override_profile_values() {
        let cfg = config_with_home();
        let opts = global(&[
            "--host",
            "10.0.0.2",
            "--client-secret",
            "flag-secret",
            "--http-port",
            "8080",
            "--timeout",
            "5",
        ]);

        let (name, hub) = hub_config(&opts, &cfg).unwrap();
        assert_eq!(name, "home");
        assert_eq!(hub.host, "10.0.0.2");
        assert_eq!(hub.client_id, "ua_home");
        assert_eq!(hub.http_port, 8080);
        assert_eq!(hub.timeout, Duration::from_secs(5));
        assert_eq!(hub.client_secret.expose_secret(), "flag-secret");
    }

    #[test]
    fn flags_alone_describe_a_hub() {
        let opts = global(&[
            "--host",
            "hub.local",
            "--client-id",
            "cid",
            "--client-secret",
            "s",
            "--net-id",
            "n",
        ]);
        let (_, hub) = hub_config(&opts, &Config::default()).unwrap();
        assert_eq!(hub.host, "hub.local");
        assert_eq!(hub.net_id, "n");
    }

    #[test]
    fn nothing_configured_is_no_config() {
        let err = hub_config(&global(&[]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn unknown_named_profile_lists_available() {
        let cfg = config_with_home();
        let err = hub_config(&global(&["--profile", "cabin"]), &cfg).unwrap_err();
        assert!(
            matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "home")
        );
        assert!(hub_config_for("cabin", &global(&[]), &cfg).is_err());
    }
}
