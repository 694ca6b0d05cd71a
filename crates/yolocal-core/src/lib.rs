// yolocal-core: Coordinator, device store and capability table on top of yolocal-api.

pub mod capability;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod registry;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use capability::{Capability, capabilities, is_online};
pub use config::HubConfig;
pub use coordinator::{Coordinator, Phase};
pub use error::CoreError;
pub use registry::HubRegistry;
pub use store::{DeviceMap, DeviceStore, StateMap, StateSnapshot, SubscriptionId};

pub use yolocal_api::{Device, DeviceEvent, StreamState};
