// Device endpoints
//
// Typed wrappers over `HubClient::call` for the three methods the
// coordinator needs: listing, state reads and state writes.

use serde_json::Value;
use tracing::debug;

use crate::client::HubClient;
use crate::error::Error;
use crate::models::{ApiRequest, Device, DeviceList};

impl HubClient {
    /// List every device registered with the hub (`Home.getDeviceList`).
    ///
    /// Fails as a whole if any entry lacks `deviceId`, `name`, `token` or
    /// `type`.
    pub async fn get_devices(&self) -> Result<Vec<Device>, Error> {
        let data = self.call(&ApiRequest::hub("Home.getDeviceList")).await?;
        let list: DeviceList =
            serde_json::from_value(data.clone()).map_err(|e| Error::Deserialization {
                message: format!("malformed device list: {e}"),
                body: data.to_string(),
            })?;
        debug!(count = list.devices.len(), "device list received");
        Ok(list.devices)
    }

    /// Read the current state of one device (`{type}.getState`).
    ///
    /// Returns the `data` payload verbatim; its shape depends on the
    /// device type.
    pub async fn get_state(&self, device: &Device) -> Result<Value, Error> {
        self.call(&ApiRequest::device(device, "getState")).await
    }

    /// Write state to one device (`{type}.setState`).
    pub async fn set_state(&self, device: &Device, params: Value) -> Result<Value, Error> {
        self.call(&ApiRequest::device(device, "setState").with_params(params))
            .await
    }
}
