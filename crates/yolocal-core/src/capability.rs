// ── Device capabilities ──
//
// Lookup table from device type tag to what the device can report or do.
// Readers interpret a cached state value; they never touch the network.

use serde::Serialize;
use serde_json::{Value, json};

/// Device class of a binary sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryClass {
    Door,
    Moisture,
}

/// A numeric reading carried in the device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    Temperature,
    Humidity,
    /// Reported as a 0..=4 level, exposed as a percentage.
    Battery,
}

impl Measurement {
    /// State field holding the raw reading.
    pub fn field(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Battery => "battery",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity | Self::Battery => "%",
        }
    }
}

/// Shape of the set-state parameters for a switchable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchKind {
    /// Relay: `{"state":"open"}` / `{"state":"closed"}`.
    Outlet,
    /// Alarm: `{"state":{"alarm":true}}` / `{"state":{"alarm":false}}`.
    Siren,
}

impl SwitchKind {
    /// Set-state params for the requested position.
    pub fn command(self, on: bool) -> Value {
        match (self, on) {
            (Self::Outlet, true) => json!({ "state": "open" }),
            (Self::Outlet, false) => json!({ "state": "closed" }),
            (Self::Siren, alarm) => json!({ "state": { "alarm": alarm } }),
        }
    }
}

/// One thing a device type can report or do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Capability {
    /// Two-state sensor, "on" when the state string equals `on_when`.
    Binary {
        class: BinaryClass,
        on_when: &'static str,
    },
    Measurement { measurement: Measurement },
    /// Commandable on/off device, "on" when the state string equals `on_when`.
    Switch {
        kind: SwitchKind,
        on_when: &'static str,
    },
}

const DOOR_SENSOR: &[Capability] = &[Capability::Binary {
    class: BinaryClass::Door,
    on_when: "open",
}];

const LEAK_SENSOR: &[Capability] = &[Capability::Binary {
    class: BinaryClass::Moisture,
    on_when: "alert",
}];

const TH_SENSOR: &[Capability] = &[
    Capability::Measurement {
        measurement: Measurement::Temperature,
    },
    Capability::Measurement {
        measurement: Measurement::Humidity,
    },
    Capability::Measurement {
        measurement: Measurement::Battery,
    },
];

const OUTLET: &[Capability] = &[Capability::Switch {
    kind: SwitchKind::Outlet,
    on_when: "open",
}];

const SIREN: &[Capability] = &[Capability::Switch {
    kind: SwitchKind::Siren,
    on_when: "alert",
}];

/// Capabilities of a device type. Unknown types have none.
pub fn capabilities(device_type: &str) -> &'static [Capability] {
    match device_type {
        "DoorSensor" => DOOR_SENSOR,
        "LeakSensor" => LEAK_SENSOR,
        "THSensor" => TH_SENSOR,
        "Outlet" => OUTLET,
        "Siren" => SIREN,
        _ => &[],
    }
}

/// The switch capability of a device type, if it has one.
pub fn switch_for(device_type: &str) -> Option<(SwitchKind, &'static str)> {
    capabilities(device_type).iter().find_map(|cap| match cap {
        Capability::Switch { kind, on_when } => Some((*kind, *on_when)),
        _ => None,
    })
}

// ── State readers ────────────────────────────────────────────────────

/// Reported availability. Devices that do not report `online` are
/// assumed reachable.
pub fn is_online(state: &Value) -> bool {
    state.get("online").and_then(Value::as_bool).unwrap_or(true)
}

impl Capability {
    /// Evaluate a binary or switch capability against a state value.
    ///
    /// `None` means unknown (field absent), which is not the same as off.
    pub fn is_on(&self, state: &Value) -> Option<bool> {
        match self {
            Self::Binary { on_when, .. } => {
                let raw = state.get("state")?;
                let value = if raw.is_object() { raw.get("state")? } else { raw };
                Some(value.as_str() == Some(*on_when))
            }
            Self::Switch { on_when, .. } => {
                let raw = state.get("state")?;
                Some(raw.as_str() == Some(*on_when))
            }
            Self::Measurement { .. } => None,
        }
    }

    /// Evaluate a measurement capability against a state value.
    ///
    /// Top-level fields are only read when `state` is present but is not
    /// an object; a payload without `state` has no reading.
    pub fn reading(&self, state: &Value) -> Option<f64> {
        let Self::Measurement { measurement } = self else {
            return None;
        };
        let raw = match state.get("state")? {
            nested if nested.is_object() => nested.get(measurement.field()),
            _ => state.get(measurement.field()),
        }?
        .as_f64()?;

        match measurement {
            Measurement::Battery => Some((raw * 25.0).min(100.0)),
            Measurement::Temperature | Measurement::Humidity => Some(raw),
        }
    }

    /// Short label for listings, e.g. `door`, `temperature`, `outlet`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Binary {
                class: BinaryClass::Door,
                ..
            } => "door",
            Self::Binary {
                class: BinaryClass::Moisture,
                ..
            } => "moisture",
            Self::Measurement { measurement } => measurement.field(),
            Self::Switch {
                kind: SwitchKind::Outlet,
                ..
            } => "outlet",
            Self::Switch {
                kind: SwitchKind::Siren,
                ..
            } => "siren",
        }
    }

    /// Human-readable value of this capability for a state, or `None`
    /// when unknown.
    pub fn describe(&self, state: &Value) -> Option<String> {
        match self {
            Self::Measurement { measurement } => self
                .reading(state)
                .map(|value| format!("{value}{}", measurement.unit())),
            Self::Binary { .. } | Self::Switch { .. } => self
                .is_on(state)
                .map(|on| if on { "on".to_owned() } else { "off".to_owned() }),
        }
    }
}
