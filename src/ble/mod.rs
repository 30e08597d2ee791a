//! BLE communication module.
//!
//! This module provides low-level Bluetooth Low Energy functionality
//! for discovering and communicating with iBBQ thermometers.

pub mod characteristics;
pub mod connection;
pub mod mock;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use characteristics::CharacteristicMap;
pub use connection::ConnectionState;
pub use mock::{MockTransport, MockWrite};
pub use scanner::BleTransport;
pub use transport::{DeviceAddress, DiscoveredCharacteristic, LinkEvent, Transport};
pub use uuids::*;
