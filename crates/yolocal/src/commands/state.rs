//! Single-device state view.

use std::fmt::Write as _;

use yolocal_core::{Coordinator, capabilities};

use crate::cli::{DeviceArg, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::devices::DeviceView;
use super::util;

fn detail(d: &DeviceView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ID:      {}", d.device_id);
    let _ = writeln!(out, "Name:    {}", d.name);
    let _ = writeln!(out, "Type:    {}", d.device_type);
    let _ = writeln!(out, "Online:  {}", util::online_label(d.state.as_ref()));

    if let Some(ref state) = d.state {
        for cap in capabilities(&d.device_type) {
            let label = format!("{}:", capitalize(cap.label()));
            let value = cap.describe(state).unwrap_or_else(|| "-".into());
            let _ = writeln!(out, "{label:<8} {value}");
        }
        let _ = write!(out, "State:\n{}", output::render_json_pretty(state));
    } else {
        let _ = write!(out, "State:   unknown");
    }
    out
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

pub fn handle(
    coordinator: &Coordinator,
    args: &DeviceArg,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device = util::resolve_device(coordinator, &args.device)?;
    let view = DeviceView {
        device_id: device.device_id.clone(),
        name: device.name.clone(),
        device_type: device.device_type.clone(),
        state: coordinator.state(&device.device_id),
    };

    let out = output::render_single(&global.output, &view, detail, |d| {
        d.state
            .as_ref()
            .map_or_else(|| "unknown".into(), output::render_json_compact)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
