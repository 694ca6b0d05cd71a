//! Raw set-state command.

use serde_json::Value;
use yolocal_core::Coordinator;

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    coordinator: &Coordinator,
    args: &SendArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let params: Value = serde_json::from_str(&args.params)?;
    if !params.is_object() {
        return Err(CliError::Validation {
            field: "params".into(),
            reason: "expected a JSON object".into(),
        });
    }

    let device = util::resolve_device(coordinator, &args.device)?;
    let response = coordinator.send_command(&device.device_id, params).await?;
    print_response(&response, global);
    Ok(())
}

/// Print the hub's `data` payload for a command.
pub fn print_response(response: &Value, global: &GlobalOpts) {
    let out = output::render_single(
        &global.output,
        response,
        output::render_json_pretty,
        output::render_json_compact,
    );
    output::print_output(&out, global.quiet);
}
