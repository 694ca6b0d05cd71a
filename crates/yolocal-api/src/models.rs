// Wire models for the hub HTTP API and the MQTT report stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success value of the `code` field in every API envelope.
pub const SUCCESS_CODE: &str = "000000";

/// A child device registered with the hub.
///
/// All four fields are required: a listing entry missing any of them is a
/// contract violation and fails the whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub name: String,
    /// Per-device access token, sent with every per-device call.
    /// Distinct from the hub bearer token.
    pub token: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

/// JSON-RPC-style request envelope posted to the API endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl ApiRequest {
    /// A hub-level call with no target device.
    pub fn hub(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target_device: None,
            token: None,
            params: None,
        }
    }

    /// A per-device call: `{type}.{action}` addressed with the device token.
    pub fn device(device: &Device, action: &str) -> Self {
        Self {
            method: format!("{}.{action}", device.device_type),
            target_device: Some(device.device_id.clone()),
            token: Some(device.token.clone()),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Successful response envelope: `{ code: "000000", data? }`.
///
/// Only decoded once `code` has been checked; error envelopes are kept raw.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope {
    #[serde(default)]
    pub data: Option<Value>,
}

/// `data` payload of `Home.getDeviceList`.
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A state report delivered over the event stream.
///
/// Only `deviceId` and `data` matter to consumers; the rest of the
/// report (`event`, `time`, `msgid`) is kept for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(default = "empty_object")]
    pub data: Value,
    /// Report kind, e.g. `"DoorSensor.Alert"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
