//! Data structures for thermometer state.
//!
//! This module contains the core data types used to represent
//! temperatures, battery level, reading history, alarm targets and
//! display preferences.

pub mod alarms;
pub mod battery;
pub mod history;
pub mod preferences;
pub mod temperatures;

pub use alarms::{alert, AlarmSilence, TargetTemperature, TargetTemperatures, SILENCE_DURATION};
pub use battery::{estimate_battery, BatteryLevel, REFERENCE_MAX_VOLTAGE_MV, VOLTAGE_CURVE_MV};
pub use history::{HistoryBuffer, Reading, DEFAULT_HISTORY_CAPACITY};
pub use preferences::Unit;
pub use temperatures::RawTemperature;
