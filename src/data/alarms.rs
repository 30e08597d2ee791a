//! Target temperature alarms.
//!
//! Each probe can carry a target: an upper bound that must be set and an
//! optional lower bound. The alarm sounds while any plugged-in probe sits
//! at or beyond one of its bounds, unless it has been silenced.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::history::Reading;
use crate::error::{Error, Result};

/// How long a silenced alarm stays quiet. Matches the device's own silence period.
pub const SILENCE_DURATION: Duration = Duration::from_secs(5 * 60);

/// Alarm target for one probe, in Celsius.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTemperature {
    /// Label chosen by the viewer (a preset name, "custom", ...). Opaque:
    /// handed back to viewers exactly as received.
    pub preset: Option<Value>,
    /// Alarm at or below this temperature.
    pub min_temp_c: Option<f64>,
    /// Alarm at or above this temperature.
    pub max_temp_c: f64,
}

impl TargetTemperature {
    /// Create a new target.
    pub fn new(preset: Option<Value>, min_temp_c: Option<f64>, max_temp_c: f64) -> Self {
        Self {
            preset,
            min_temp_c,
            max_temp_c,
        }
    }

    /// Build a target from loosely specified viewer input.
    ///
    /// All three fields absent means "clear the target" and yields `Ok(None)`.
    /// A JSON `null` preset counts as absent. Anything else requires an
    /// upper bound, finite values, and a lower bound below the upper one.
    pub fn from_parts(
        preset: Option<Value>,
        min_temp_c: Option<f64>,
        max_temp_c: Option<f64>,
    ) -> Result<Option<Self>> {
        let preset = preset.filter(|p| !p.is_null());
        let max_temp_c = match (preset.is_none() && min_temp_c.is_none(), max_temp_c) {
            (true, None) => return Ok(None),
            (_, Some(max)) => max,
            (false, None) => {
                return Err(Error::InvalidParameter {
                    name: "max_temp".to_string(),
                    value: "null".to_string(),
                })
            }
        };

        if !max_temp_c.is_finite() {
            return Err(Error::InvalidParameter {
                name: "max_temp".to_string(),
                value: max_temp_c.to_string(),
            });
        }

        if let Some(min) = min_temp_c {
            if !min.is_finite() || min >= max_temp_c {
                return Err(Error::InvalidParameter {
                    name: "min_temp".to_string(),
                    value: min.to_string(),
                });
            }
        }

        Ok(Some(Self::new(preset, min_temp_c, max_temp_c)))
    }

    /// Check a probe temperature against this target.
    pub fn is_triggered_by(&self, celsius: f64) -> bool {
        celsius >= self.max_temp_c || self.min_temp_c.map_or(false, |min| celsius <= min)
    }
}

/// Alarm targets keyed by probe index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetTemperatures {
    targets: BTreeMap<u8, TargetTemperature>,
}

impl TargetTemperatures {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replace (`Some`) or remove (`None`) the target of a probe.
    ///
    /// Returns the previous target.
    pub fn set(&mut self, probe: u8, target: Option<TargetTemperature>) -> Option<TargetTemperature> {
        match target {
            Some(target) => self.targets.insert(probe, target),
            None => self.targets.remove(&probe),
        }
    }

    /// Get the target of a probe.
    pub fn get(&self, probe: u8) -> Option<&TargetTemperature> {
        self.targets.get(&probe)
    }

    /// Iterate over `(probe, target)` pairs in probe order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &TargetTemperature)> {
        self.targets.iter().map(|(probe, target)| (*probe, target))
    }

    /// Number of probes with a target.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if no probe has a target.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Deadline until which the alarm stays quiet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmSilence {
    until: Option<DateTime<Utc>>,
}

impl AlarmSilence {
    /// Silence for [`SILENCE_DURATION`] starting at `now`.
    pub fn silence(&mut self, now: DateTime<Utc>) {
        let duration = chrono::Duration::seconds(SILENCE_DURATION.as_secs() as i64);
        self.until = Some(now + duration);
    }

    /// Lift any silence.
    pub fn reset(&mut self) {
        self.until = None;
    }

    /// The deadline, if one was ever set.
    pub fn until(&self) -> Option<DateTime<Utc>> {
        self.until
    }

    /// Check whether the alarm is silenced at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.until.map_or(false, |until| now < until)
    }
}

/// Decide whether the alarm should sound.
///
/// Quiet while `now` is before `silence_until` or when there is no reading.
/// Otherwise sounds if any plugged-in probe with a target is at or above its
/// upper bound, or at or below its lower bound.
pub fn alert(
    reading: Option<&Reading>,
    targets: &TargetTemperatures,
    silence_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if silence_until.map_or(false, |until| now < until) {
        return false;
    }

    let Some(reading) = reading else {
        return false;
    };

    targets.iter().any(|(probe, target)| {
        reading
            .probe(probe as usize)
            .map_or(false, |celsius| target.is_triggered_by(celsius))
    })
}
