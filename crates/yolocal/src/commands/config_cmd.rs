//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Net ID")]
    net_id: String,
    #[tabled(rename = "Default")]
    default: String,
}

#[derive(Serialize)]
struct ProfileSummary {
    name: String,
    host: String,
    net_id: String,
    default: bool,
}

fn summaries(cfg: &Config) -> Vec<ProfileSummary> {
    cfg.profile_names()
        .into_iter()
        .map(|name| {
            let p = &cfg.profiles[name];
            ProfileSummary {
                name: name.into(),
                host: p.host.clone(),
                net_id: p.net_id.clone(),
                default: cfg.default_profile.as_deref() == Some(name),
            }
        })
        .collect()
}

/// TOML rendering of the config with secrets masked.
fn format_config_redacted(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(&cfg.redacted()).map_err(|e| CliError::Validation {
        field: "config".into(),
        reason: e.to_string(),
    })
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => format_config_redacted(&cfg)?,
                OutputFormat::Json => output::render_json_pretty(&cfg.redacted()),
                OutputFormat::JsonCompact => output::render_json_compact(&cfg.redacted()),
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let profiles = summaries(&cfg);
            let out = output::render_list(
                &global.output,
                &profiles,
                |p| ProfileRow {
                    name: p.name.clone(),
                    host: p.host.clone(),
                    net_id: p.net_id.clone(),
                    default: if p.default { "*".into() } else { String::new() },
                },
                |p| p.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
