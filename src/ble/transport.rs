//! Transport abstraction.
//!
//! The device session talks to the radio through [`Transport`]. The real
//! implementation is [`BleTransport`](crate::ble::scanner::BleTransport);
//! [`MockTransport`](crate::ble::mock::MockTransport) stands in for it in
//! tests.
//!
//! Notifications and link loss are not delivered through callbacks.
//! [`Transport::connect`] takes the sending half of a bounded channel and
//! pushes [`LinkEvent`]s into it; the session's monitor loop is the only
//! consumer.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Capacity of the link event channel handed to [`Transport::connect`].
pub const LINK_EVENT_CAPACITY: usize = 64;

/// Identifier of a thermometer on the radio.
///
/// A MAC address on Linux and Windows, a platform UUID on macOS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create from any string form.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare ignoring ASCII case, as MAC addresses are printed either way.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl FromStr for DeviceAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s.trim()))
    }
}

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A subscribed characteristic pushed a value.
    Notification {
        /// Full UUID of the characteristic.
        uuid: Uuid,
        /// The payload.
        data: Bytes,
    },
    /// The link went down.
    Disconnected,
}

/// A characteristic found while enumerating services.
#[derive(Debug, Clone)]
pub struct DiscoveredCharacteristic<H> {
    /// Full 128-bit UUID.
    pub uuid: Uuid,
    /// Transport handle used for writes and subscriptions.
    pub handle: H,
}

/// Operations the device session needs from the radio.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Transport-level characteristic handle.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Run one discovery pass and return the first device advertising `name`.
    async fn scan(&self, name: &str) -> Result<Option<DeviceAddress>>;

    /// Check whether a device with this address is currently known.
    async fn resolve(&self, address: &DeviceAddress) -> Result<bool>;

    /// Open a link, enumerate characteristics, and start forwarding
    /// notifications and link loss into `events`.
    async fn connect(
        &self,
        address: &DeviceAddress,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Vec<DiscoveredCharacteristic<Self::Handle>>>;

    /// Write to a characteristic. `with_response` asks for delivery confirmation.
    async fn write(&self, handle: &Self::Handle, data: &[u8], with_response: bool) -> Result<()>;

    /// Enable notifications on a characteristic.
    async fn subscribe(&self, handle: &Self::Handle) -> Result<()>;

    /// Close the link, if open.
    async fn disconnect(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_forms() {
        let address: DeviceAddress = " AA:BB:CC:DD:EE:FF ".parse().unwrap();
        assert_eq!(address.as_str(), "AA:BB:CC:DD:EE:FF");
        assert!(address.matches("aa:bb:cc:dd:ee:ff"));
        assert_eq!(address.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_address_serde() {
        let address = DeviceAddress::from("AA:BB");
        assert_eq!(serde_json::to_string(&address).unwrap(), "\"AA:BB\"");
        let back: DeviceAddress = serde_json::from_str("\"AA:BB\"").unwrap();
        assert_eq!(back, address);
    }
}
