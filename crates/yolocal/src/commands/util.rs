//! Helpers shared across command handlers.

use std::sync::Arc;

use serde_json::Value;
use yolocal_core::{Coordinator, Device, capabilities, is_online};

use crate::error::CliError;

/// Look up a device by id, falling back to an exact name match.
pub fn resolve_device(coordinator: &Coordinator, ident: &str) -> Result<Arc<Device>, CliError> {
    if let Some(device) = coordinator.device(ident) {
        return Ok(device);
    }
    coordinator
        .devices()
        .values()
        .find(|d| d.name == ident)
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            identifier: ident.into(),
        })
}

/// `yes` / `no` / `-` for a cached state (unknown when absent).
pub fn online_label(state: Option<&Value>) -> &'static str {
    match state {
        Some(s) if is_online(s) => "yes",
        Some(_) => "no",
        None => "-",
    }
}

/// One `label=value` pair per known capability reading.
pub fn readings(device_type: &str, state: Option<&Value>) -> Vec<String> {
    let Some(state) = state else {
        return Vec::new();
    };
    capabilities(device_type)
        .iter()
        .filter_map(|cap| {
            cap.describe(state)
                .map(|value| format!("{}={value}", cap.label()))
        })
        .collect()
}
