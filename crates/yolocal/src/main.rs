mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use yolocal_core::Coordinator;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a hub
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "yolocal", &mut std::io::stdout());
            Ok(())
        }

        Command::Check => commands::check::handle(&cli.global).await,

        // Watch manages its own coordinators
        Command::Watch(args) => commands::watch::handle(&args, &cli.global).await,

        // One-shot commands run against a coordinator without the event stream
        cmd => {
            let cfg = config::load_config()?;
            let (profile, mut hub) = config::hub_config(&cli.global, &cfg)?;
            hub.stream_enabled = false;

            let coordinator = Coordinator::connect(hub)
                .await
                .map_err(|e| CliError::from(e).with_profile(&profile))?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &coordinator, &cli.global).await;
            coordinator.shutdown().await;
            result.map_err(|e| e.with_profile(&profile))
        }
    }
}
