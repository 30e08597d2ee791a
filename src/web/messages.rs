//! Viewer push protocol.
//!
//! JSON objects tagged by a `"cmd"` field. All temperatures are Celsius in
//! both directions; `unit_update` only tells the viewer how to render them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{BatteryLevel, Reading, TargetTemperature, TargetTemperatures, Unit};
use crate::device::SessionSnapshot;

/// Server → viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Display unit to render temperatures in.
    UnitUpdate {
        /// `"C"` or `"F"`.
        unit: Unit,
    },
    /// Device state and readings.
    StateUpdate(StateUpdate),
}

impl ServerMessage {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Body of a `state_update` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateUpdate {
    /// Whether the device is paired.
    pub connected: bool,
    /// Percent, `"charging"`, or `null`.
    pub battery_level: BatteryLevel,
    /// Whether `probe_readings` replaces everything the viewer holds.
    pub full_history: bool,
    /// Alarm targets keyed by probe index.
    pub target_temps: BTreeMap<String, TargetTempEntry>,
    /// Whether the alarm is sounding.
    pub target_temp_alert: bool,
    /// Full history or only the latest reading.
    pub probe_readings: Vec<ProbeReading>,
}

impl StateUpdate {
    /// Build from a session snapshot.
    ///
    /// With no readings yet, carries one empty placeholder stamped `now`.
    pub fn from_snapshot(snapshot: &SessionSnapshot, full_history: bool, now: DateTime<Utc>) -> Self {
        let probe_readings = if snapshot.readings.is_empty() {
            vec![ProbeReading {
                ts: now.timestamp_millis(),
                probes: Vec::new(),
            }]
        } else {
            snapshot.readings.iter().map(ProbeReading::from).collect()
        };

        Self {
            connected: snapshot.connected(),
            battery_level: snapshot.battery,
            full_history,
            target_temps: target_entries(&snapshot.targets),
            target_temp_alert: snapshot.alert,
            probe_readings,
        }
    }
}

/// One alarm target as viewers see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetTempEntry {
    /// Preset label, as the viewer sent it.
    pub preset: Option<serde_json::Value>,
    /// Lower bound in °C.
    pub min_temp: Option<f64>,
    /// Upper bound in °C.
    pub max_temp: f64,
}

impl From<&TargetTemperature> for TargetTempEntry {
    fn from(target: &TargetTemperature) -> Self {
        Self {
            preset: target.preset.clone(),
            min_temp: target.min_temp_c,
            max_temp: target.max_temp_c,
        }
    }
}

fn target_entries(targets: &TargetTemperatures) -> BTreeMap<String, TargetTempEntry> {
    targets
        .iter()
        .map(|(probe, target)| (probe.to_string(), TargetTempEntry::from(target)))
        .collect()
}

/// One reading as viewers see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReading {
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
    /// °C per probe, `null` when unplugged.
    pub probes: Vec<Option<f64>>,
}

impl From<&Reading> for ProbeReading {
    fn from(reading: &Reading) -> Self {
        Self {
            ts: reading.timestamp_ms(),
            probes: reading.probes.clone(),
        }
    }
}

/// Viewer → server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Change the display unit.
    SetUnit {
        /// `"C"` or `"F"`.
        unit: Unit,
    },
    /// Set or clear a probe's alarm target.
    SetProbeTargetTemp {
        /// Probe index.
        probe: u8,
        /// Opaque preset label; any JSON value, `null` for none.
        #[serde(default)]
        preset: Option<serde_json::Value>,
        /// Lower bound in °C.
        #[serde(default)]
        min_temp: Option<f64>,
        /// Upper bound in °C.
        #[serde(default)]
        max_temp: Option<f64>,
    },
    /// Silence the alarm.
    SilenceAlarm,
    /// Drop all readings.
    ClearHistory,
    /// Shut the host down.
    Poweroff,
}

impl ClientCommand {
    /// Parse a text frame.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
