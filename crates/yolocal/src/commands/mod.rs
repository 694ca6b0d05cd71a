//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod check;
pub mod config_cmd;
pub mod devices;
pub mod send;
pub mod state;
pub mod switch;
pub mod util;
pub mod watch;

use yolocal_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(coordinator, global),
        Command::State(args) => state::handle(coordinator, &args, global),
        Command::Send(args) => send::handle(coordinator, &args, global).await,
        Command::On(args) => switch::handle(coordinator, &args, true, global).await,
        Command::Off(args) => switch::handle(coordinator, &args, false, global).await,
        // Handled before a coordinator is built
        Command::Check | Command::Watch(_) | Command::Config(_) | Command::Completions(_) => {
            Err(CliError::Internal("command does not run against a hub".into()))
        }
    }
}
