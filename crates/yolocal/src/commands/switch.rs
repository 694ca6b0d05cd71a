//! On/off commands for switchable devices.

use yolocal_core::Coordinator;

use crate::cli::{DeviceArg, GlobalOpts};
use crate::error::CliError;

use super::{send, util};

pub async fn handle(
    coordinator: &Coordinator,
    args: &DeviceArg,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device = util::resolve_device(coordinator, &args.device)?;
    let response = if on {
        coordinator.turn_on(&device.device_id).await?
    } else {
        coordinator.turn_off(&device.device_id).await?
    };
    tracing::info!(device_id = %device.device_id, on, "switch command sent");
    send::print_response(&response, global);
    Ok(())
}
