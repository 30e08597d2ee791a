//! In-memory transport for testing.
//!
//! [`MockTransport`] implements [`Transport`] without any radio, so the
//! device session and the reconnect loop can be driven from tests.
//!
//! # Features
//!
//! - **Discoverability**: hide the device to exercise scan retries and `DeviceNotFound`
//! - **Failure injection**: fail the next connects, or every write
//! - **Write capture**: inspect every frame the session wrote, by role
//! - **Notification injection**: push frames as if the thermometer sent them
//! - **Link loss**: drop the link to exercise reconnects

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ble::transport::{DeviceAddress, DiscoveredCharacteristic, LinkEvent, Transport};
use crate::ble::uuids::{CharacteristicRole, DEVICE_NAME};
use crate::error::{Error, Result};

/// A write captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockWrite {
    /// Characteristic written to.
    pub uuid: Uuid,
    /// Frame contents.
    pub data: Vec<u8>,
    /// Whether delivery confirmation was requested.
    pub with_response: bool,
}

impl MockWrite {
    /// Role of the characteristic written to.
    pub fn role(&self) -> Option<CharacteristicRole> {
        CharacteristicRole::from_uuid(&self.uuid)
    }
}

/// A fake thermometer.
///
/// # Example
///
/// ```
/// use ibbq_rust_ble::ble::{MockTransport, Transport};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new("AA:BB");
///     assert!(transport.scan("iBBQ").await.unwrap().is_some());
///
///     transport.set_discoverable(false);
///     assert!(transport.scan("iBBQ").await.unwrap().is_none());
/// }
/// ```
pub struct MockTransport {
    name: String,
    address: DeviceAddress,
    discoverable: AtomicBool,
    connected: AtomicBool,
    fail_writes: AtomicBool,
    remaining_connect_failures: AtomicU32,
    connect_count: AtomicU32,
    characteristics: Mutex<Vec<CharacteristicRole>>,
    writes: Mutex<Vec<MockWrite>>,
    subscriptions: Mutex<Vec<Uuid>>,
    events: Mutex<Option<mpsc::Sender<LinkEvent>>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("address", &self.address)
            .field("discoverable", &self.discoverable.load(Ordering::Relaxed))
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockTransport {
    /// Create a discoverable thermometer at `address` exposing every role.
    pub fn new(address: &str) -> Self {
        Self {
            name: DEVICE_NAME.to_string(),
            address: DeviceAddress::new(address),
            discoverable: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            remaining_connect_failures: AtomicU32::new(0),
            connect_count: AtomicU32::new(0),
            characteristics: Mutex::new(CharacteristicRole::ALL.to_vec()),
            writes: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            events: Mutex::new(None),
        }
    }

    /// The device address.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Show or hide the device from scans and address resolution.
    pub fn set_discoverable(&self, discoverable: bool) {
        self.discoverable.store(discoverable, Ordering::Relaxed);
    }

    /// Make the next `count` connects fail with a transport error.
    pub fn fail_next_connects(&self, count: u32) {
        self.remaining_connect_failures
            .store(count, Ordering::Relaxed);
    }

    /// Make every write fail with a transport error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Stop exposing a characteristic on future connects.
    pub fn omit_characteristic(&self, role: CharacteristicRole) {
        self.characteristics.lock().retain(|r| *r != role);
    }

    /// Check if a link is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Every captured write, oldest first.
    pub fn writes(&self) -> Vec<MockWrite> {
        self.writes.lock().clone()
    }

    /// Frames written to one role, oldest first.
    pub fn writes_to(&self, role: CharacteristicRole) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.role() == Some(role))
            .map(|w| w.data.clone())
            .collect()
    }

    /// Forget captured writes.
    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Roles the session subscribed to.
    pub fn subscriptions(&self) -> Vec<CharacteristicRole> {
        self.subscriptions
            .lock()
            .iter()
            .filter_map(CharacteristicRole::from_uuid)
            .collect()
    }

    /// Push a notification on `role`.
    ///
    /// Returns `false` if no link is open or the session stopped listening.
    pub async fn notify(&self, role: CharacteristicRole, data: &[u8]) -> bool {
        let sender = self.events.lock().clone();
        match sender {
            Some(sender) => sender
                .send(LinkEvent::Notification {
                    uuid: role.uuid(),
                    data: Bytes::copy_from_slice(data),
                })
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Push a realtime temperature frame.
    pub async fn notify_realtime(&self, data: &[u8]) -> bool {
        self.notify(CharacteristicRole::RealtimeTempNotify, data).await
    }

    /// Push a settings notification.
    pub async fn notify_settings(&self, data: &[u8]) -> bool {
        self.notify(CharacteristicRole::SettingsNotify, data).await
    }

    /// Drop the link as if the thermometer went out of range.
    pub async fn drop_link(&self) {
        self.connected.store(false, Ordering::Relaxed);
        let sender = self.events.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(LinkEvent::Disconnected).await;
        }
    }

    fn check_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::connection_failed("mock link is down"))
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Handle = Uuid;

    async fn scan(&self, name: &str) -> Result<Option<DeviceAddress>> {
        if self.discoverable.load(Ordering::Relaxed) && name == self.name {
            Ok(Some(self.address.clone()))
        } else {
            Ok(None)
        }
    }

    async fn resolve(&self, address: &DeviceAddress) -> Result<bool> {
        Ok(self.discoverable.load(Ordering::Relaxed) && address.matches(self.address.as_str()))
    }

    async fn connect(
        &self,
        address: &DeviceAddress,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Vec<DiscoveredCharacteristic<Uuid>>> {
        if !self.resolve(address).await? {
            return Err(Error::DeviceNotFound {
                identifier: address.to_string(),
            });
        }

        let remaining = self.remaining_connect_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.remaining_connect_failures
                .store(remaining - 1, Ordering::Relaxed);
            return Err(Error::connection_failed("mock connect failure"));
        }

        self.connected.store(true, Ordering::Relaxed);
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.lock().clear();
        *self.events.lock() = Some(events);

        Ok(self
            .characteristics
            .lock()
            .iter()
            .map(|role| DiscoveredCharacteristic {
                uuid: role.uuid(),
                handle: role.uuid(),
            })
            .collect())
    }

    async fn write(&self, handle: &Uuid, data: &[u8], with_response: bool) -> Result<()> {
        self.check_connected()?;
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(Error::connection_failed("mock write failure"));
        }

        self.writes.lock().push(MockWrite {
            uuid: *handle,
            data: data.to_vec(),
            with_response,
        });
        Ok(())
    }

    async fn subscribe(&self, handle: &Uuid) -> Result<()> {
        self.check_connected()?;
        self.subscriptions.lock().push(*handle);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);
        self.events.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_lists_all_roles() {
        let transport = MockTransport::new("AA:BB");
        let (tx, _rx) = mpsc::channel(8);
        let chars = transport.connect(&"AA:BB".into(), tx).await.unwrap();
        assert_eq!(chars.len(), CharacteristicRole::ALL.len());
        assert!(transport.is_connected());
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_hidden_device_not_found() {
        let transport = MockTransport::new("AA:BB");
        transport.set_discoverable(false);
        let (tx, _rx) = mpsc::channel(8);
        let result = transport.connect(&"AA:BB".into(), tx).await;
        assert!(matches!(result, Err(Error::DeviceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_injected_connect_failures() {
        let transport = MockTransport::new("AA:BB");
        transport.fail_next_connects(1);
        let (tx, _rx) = mpsc::channel(8);
        assert!(transport.connect(&"AA:BB".into(), tx.clone()).await.is_err());
        assert!(transport.connect(&"AA:BB".into(), tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_write_capture_and_notify() {
        let transport = MockTransport::new("AA:BB");
        let (tx, mut rx) = mpsc::channel(8);
        transport.connect(&"AA:BB".into(), tx).await.unwrap();

        let pair = CharacteristicRole::Pair.uuid();
        transport.write(&pair, &[1, 2], true).await.unwrap();
        assert_eq!(transport.writes_to(CharacteristicRole::Pair), vec![vec![1, 2]]);
        assert!(transport.writes()[0].with_response);

        assert!(transport.notify_realtime(&[0xD0, 0x02]).await);
        assert_eq!(
            rx.recv().await,
            Some(LinkEvent::Notification {
                uuid: CharacteristicRole::RealtimeTempNotify.uuid(),
                data: Bytes::from_static(&[0xD0, 0x02]),
            })
        );

        transport.drop_link().await;
        assert_eq!(rx.recv().await, Some(LinkEvent::Disconnected));
        assert!(transport.write(&pair, &[1], true).await.is_err());
    }
}
