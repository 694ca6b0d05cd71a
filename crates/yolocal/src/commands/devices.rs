//! Device listing.

use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;
use yolocal_core::Coordinator;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Readings")]
    readings: String,
}

/// Serializable view of a device. Leaves out the per-device token.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub device_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub state: Option<Value>,
}

impl From<&DeviceView> for DeviceRow {
    fn from(d: &DeviceView) -> Self {
        Self {
            id: d.device_id.clone(),
            name: d.name.clone(),
            dtype: d.device_type.clone(),
            online: util::online_label(d.state.as_ref()).into(),
            readings: util::readings(&d.device_type, d.state.as_ref()).join(" "),
        }
    }
}

/// Devices in hub listing order, paired with their cached state.
pub fn views(coordinator: &Coordinator) -> Vec<DeviceView> {
    let states = coordinator.states();
    coordinator
        .devices()
        .values()
        .map(|d| DeviceView {
            device_id: d.device_id.clone(),
            name: d.name.clone(),
            device_type: d.device_type.clone(),
            state: states.get(&d.device_id).cloned(),
        })
        .collect()
}

pub fn handle(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = views(coordinator);
    let out = output::render_list(
        &global.output,
        &devices,
        |d| DeviceRow::from(d),
        |d| d.device_id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
