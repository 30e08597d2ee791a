// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # ibbq-rust-ble
//!
//! Monitor an iBBQ wireless BBQ thermometer over Bluetooth Low Energy and
//! push its readings live to browser viewers.
//!
//! ## Features
//!
//! - **Discovery**: find the thermometer by its advertised name, or bind to an address
//! - **Realtime Temperatures**: once-per-second probe readings, Celsius internally
//! - **History**: bounded reading history with steady-state coalescing
//! - **Alarms**: per-probe target ranges, device and local silencing
//! - **Battery**: percentage estimated from the reported pack voltage
//! - **Reconnects**: a loop that keeps the link up and replays settings
//! - **Live View**: a websocket push protocol with a JSON command channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ibbq_rust_ble::{BleTransport, DeviceManager, DeviceSession, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = BleTransport::new().await?;
//!     let session = Arc::new(DeviceSession::new(transport));
//!
//!     // Keep the thermometer connected in the background
//!     let manager = DeviceManager::new(session.clone());
//!     manager.start();
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     if let Some(reading) = session.latest() {
//!         for (idx, temp) in reading.probes.iter().enumerate() {
//!             println!("Probe {}: {:?}", idx, temp);
//!         }
//!     }
//!
//!     manager.stop().await
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod device;
pub mod device_manager;
pub mod error;
pub mod notify;
pub mod protocol;
pub mod utils;
pub mod web;

// Re-exports for convenience
pub use config::{AlarmPreset, Config, ConfigError};
pub use device::{CallbackHandle, DeviceEvent, DeviceSession, SessionSnapshot};
pub use device_manager::{DeviceManager, RECONNECT_BACKOFF};
pub use error::{Error, Result};
pub use notify::ChangeNotifier;
pub use utils::{celsius_to_fahrenheit, fahrenheit_to_celsius};

// Re-export commonly used types from submodules
pub use ble::{
    BleTransport, CharacteristicRole, ConnectionState, DeviceAddress, MockTransport, Transport,
};
pub use data::{
    alert, estimate_battery, BatteryLevel, HistoryBuffer, Reading, TargetTemperature,
    TargetTemperatures, Unit,
};
pub use web::{TelemetrySession, ViewerFrame};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<DeviceSession<MockTransport>>();
        let _ = std::any::TypeId::of::<DeviceManager<MockTransport>>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<Reading>();
        let _ = std::any::TypeId::of::<TargetTemperatures>();
        let _ = std::any::TypeId::of::<Config>();
    }

    #[test]
    fn test_temperature_conversion() {
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 0.001);
        assert!((fahrenheit_to_celsius(212.0) - 100.0).abs() < 0.001);
    }
}
