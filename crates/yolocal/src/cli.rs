//! Clap derive structures for the `yolocal` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// yolocal -- talk to a YoLink local hub from the command line
#[derive(Debug, Parser)]
#[command(
    name = "yolocal",
    version,
    about = "Inspect and control YoLink local hub devices",
    long_about = "Command-line client for the YoLink local hub.\n\n\
        Discovers devices over the hub's HTTP API and follows live state\n\
        reports over its MQTT event stream.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "YOLOCAL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub host name or IP (overrides profile)
    #[arg(long, env = "YOLOCAL_HOST", global = true)]
    pub host: Option<String>,

    /// OAuth client id (overrides profile)
    #[arg(long, env = "YOLOCAL_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// OAuth client secret (overrides profile and keyring)
    #[arg(long, env = "YOLOCAL_CLIENT_SECRET", global = true, hide_env = true)]
    pub client_secret: Option<String>,

    /// Hub network id (overrides profile)
    #[arg(long, env = "YOLOCAL_NET_ID", global = true)]
    pub net_id: Option<String>,

    /// Hub HTTP API port
    #[arg(long, env = "YOLOCAL_HTTP_PORT", global = true)]
    pub http_port: Option<u16>,

    /// Hub MQTT port
    #[arg(long, env = "YOLOCAL_STREAM_PORT", global = true)]
    pub stream_port: Option<u16>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "YOLOCAL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "YOLOCAL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify hub credentials
    Check,

    /// List devices registered with the hub
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Print the current state of a device
    State(DeviceArg),

    /// Send raw set-state parameters to a device
    Send(SendArgs),

    /// Switch a device on
    On(DeviceArg),

    /// Switch a device off
    Off(DeviceArg),

    /// Follow live state updates until interrupted
    Watch(WatchArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeviceArg {
    /// Device id or name
    pub device: String,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Device id or name
    pub device: String,

    /// JSON object passed as the `setState` params
    pub params: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Profiles to watch (repeatable; defaults to the active profile)
    #[arg(long = "hub", value_name = "PROFILE")]
    pub hubs: Vec<String>,

    /// Skip the event stream and re-poll on this interval (seconds)
    #[arg(long, value_name = "SECS")]
    pub poll: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the resolved configuration (secrets masked)
    Show,

    /// List configured profiles
    Profiles,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
