// ── Device registry & state cache ──
//
// Lock-free reads, serialized writes, synchronous observer fan-out.

mod device_store;
mod observers;

pub use device_store::{DeviceMap, DeviceStore, StateMap, StateSnapshot};
pub use observers::SubscriptionId;
