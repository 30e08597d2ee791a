//! btleplug transport.
//!
//! Discovers the thermometer by advertised name, opens the GATT link, and
//! forwards notifications and link loss into the session's event channel.

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::stream::StreamExt;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::ble::transport::{DeviceAddress, DiscoveredCharacteristic, LinkEvent, Transport};
use crate::error::{Error, Result};

/// How long one discovery pass listens for advertisements.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(1);

/// [`Transport`] over the platform Bluetooth stack.
pub struct BleTransport {
    /// The BLE adapter used for scanning and connecting.
    adapter: Adapter,
    /// Duration of one discovery pass.
    scan_window: Duration,
    /// The connected peripheral.
    peripheral: Mutex<Option<Peripheral>>,
    /// Task forwarding notifications and link loss.
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl BleTransport {
    /// Create a transport on the first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport on a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            scan_window: DEFAULT_SCAN_WINDOW,
            peripheral: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Change how long each discovery pass listens.
    pub fn set_scan_window(&mut self, window: Duration) {
        self.scan_window = window;
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Listen for advertisements for one scan window.
    async fn discovery_pass(&self) -> Result<()> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;
        tokio::time::sleep(self.scan_window).await;
        if let Err(e) = self.adapter.stop_scan().await {
            debug!("Failed to stop scan: {}", e);
        }
        Ok(())
    }

    /// Look up a known peripheral by address.
    async fn find_peripheral(&self, address: &DeviceAddress) -> Result<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await.map_err(Error::Bluetooth)?;
        Ok(peripherals
            .into_iter()
            .find(|p| address.matches(&peripheral_address(p))))
    }

    fn connected_peripheral(&self) -> Result<Peripheral> {
        self.peripheral.lock().clone().ok_or(Error::NotConnected)
    }

    fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}

/// Stable address string for a peripheral.
///
/// macOS hides MAC addresses and reports all zeros, so the platform id is
/// used there instead.
fn peripheral_address(peripheral: &Peripheral) -> String {
    let address = peripheral.address();
    if address.into_inner() == [0u8; 6] {
        peripheral.id().to_string()
    } else {
        address.to_string()
    }
}

#[async_trait::async_trait]
impl Transport for BleTransport {
    type Handle = Characteristic;

    async fn scan(&self, name: &str) -> Result<Option<DeviceAddress>> {
        debug!("Scanning for {}", name);
        self.discovery_pass().await?;

        let peripherals = self.adapter.peripherals().await.map_err(Error::Bluetooth)?;
        for peripheral in peripherals {
            let properties = match peripheral.properties().await {
                Ok(Some(p)) => p,
                _ => continue,
            };

            if properties.local_name.as_deref() == Some(name) {
                let address = DeviceAddress::new(peripheral_address(&peripheral));
                info!("Found {} at {} (RSSI {:?})", name, address, properties.rssi);
                return Ok(Some(address));
            }
        }

        Ok(None)
    }

    async fn resolve(&self, address: &DeviceAddress) -> Result<bool> {
        if self.find_peripheral(address).await?.is_some() {
            return Ok(true);
        }
        self.discovery_pass().await?;
        Ok(self.find_peripheral(address).await?.is_some())
    }

    async fn connect(
        &self,
        address: &DeviceAddress,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Vec<DiscoveredCharacteristic<Characteristic>>> {
        self.stop_listener();

        let peripheral =
            self.find_peripheral(address)
                .await?
                .ok_or_else(|| Error::DeviceNotFound {
                    identifier: address.to_string(),
                })?;

        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral.connect().await.map_err(Error::Bluetooth)?;
        }
        peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        let characteristics: Vec<_> = peripheral
            .characteristics()
            .into_iter()
            .map(|c| DiscoveredCharacteristic {
                uuid: c.uuid,
                handle: c,
            })
            .collect();
        debug!("Discovered {} characteristics", characteristics.len());

        let notifications = peripheral.notifications().await.map_err(Error::Bluetooth)?;
        let central_events = self.adapter.events().await.map_err(Error::Bluetooth)?;
        let id = peripheral.id();

        let handle = tokio::spawn(async move {
            let mut notifications = notifications;
            let mut central_events = central_events;

            loop {
                tokio::select! {
                    notification = notifications.next() => match notification {
                        Some(n) => {
                            trace!("Notification from {}: {:02X?}", n.uuid, n.value);
                            let event = LinkEvent::Notification {
                                uuid: n.uuid,
                                data: Bytes::from(n.value),
                            };
                            if events.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            debug!("Notification stream ended");
                            let _ = events.send(LinkEvent::Disconnected).await;
                            break;
                        }
                    },
                    event = central_events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(gone)) if gone == id => {
                            let _ = events.send(LinkEvent::Disconnected).await;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            let _ = events.send(LinkEvent::Disconnected).await;
                            break;
                        }
                    },
                }
            }

            debug!("Link listener stopped");
        });

        *self.listener.lock() = Some(handle);
        *self.peripheral.lock() = Some(peripheral);

        Ok(characteristics)
    }

    async fn write(&self, handle: &Characteristic, data: &[u8], with_response: bool) -> Result<()> {
        let peripheral = self.connected_peripheral()?;
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        peripheral
            .write(handle, data, write_type)
            .await
            .map_err(Error::Bluetooth)?;

        trace!("Wrote {} bytes to characteristic {}", data.len(), handle.uuid);
        Ok(())
    }

    async fn subscribe(&self, handle: &Characteristic) -> Result<()> {
        let peripheral = self.connected_peripheral()?;
        peripheral.subscribe(handle).await.map_err(Error::Bluetooth)?;
        debug!("Subscribed to notifications from {}", handle.uuid);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.stop_listener();

        let peripheral = self.peripheral.lock().take();
        if let Some(peripheral) = peripheral {
            if let Err(e) = peripheral.disconnect().await {
                warn!("Failed to disconnect: {}", e);
                return Err(Error::Bluetooth(e));
            }
            info!("Disconnected");
        }
        Ok(())
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BleTransport>();
    }

    #[test]
    fn test_default_scan_window() {
        assert_eq!(DEFAULT_SCAN_WINDOW, Duration::from_secs(1));
    }
}
