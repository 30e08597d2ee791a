//! Device session.
//!
//! [`DeviceSession`] owns everything known about the thermometer: the link
//! state, the characteristic map, the display unit, alarm targets, the
//! silence deadline, battery level and reading history. Viewers read it
//! through accessors and change it only through the command methods.
//!
//! Every change raises the session's [`ChangeNotifier`] and, when it is
//! worth logging, a [`DeviceEvent`] on a broadcast channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::characteristics::CharacteristicMap;
use crate::ble::connection::ConnectionState;
use crate::ble::transport::{DeviceAddress, LinkEvent, Transport, LINK_EVENT_CAPACITY};
use crate::ble::uuids::{CharacteristicRole, DEVICE_NAME};
use crate::data::{
    alert, estimate_battery, AlarmSilence, BatteryLevel, HistoryBuffer, Reading,
    TargetTemperature, TargetTemperatures, Unit, REFERENCE_MAX_VOLTAGE_MV,
};
use crate::error::{Error, Result};
use crate::notify::ChangeNotifier;
use crate::protocol::{
    decode_realtime_frame, decode_settings_notification, encode_enable_battery,
    encode_enable_realtime, encode_pair_key, encode_set_target_temp, encode_set_unit,
    encode_silence_alarm, SettingsEvent,
};

/// Delay between discovery passes while looking for the thermometer.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Callback handle for unregistering callbacks.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

/// Something worth telling the log sink about.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Link open and pairing key accepted.
    Connected {
        /// Address of the thermometer.
        address: DeviceAddress,
    },
    /// Link lost or closed.
    Disconnected {
        /// Address of the thermometer, if one was bound.
        address: Option<DeviceAddress>,
    },
    /// The alarm started sounding.
    AlarmRaised {
        /// Probes at or beyond their bounds.
        probes: Vec<u8>,
    },
    /// The alarm was silenced.
    AlarmSilenced {
        /// Deadline of the silence.
        until: DateTime<Utc>,
        /// Whether the button on the thermometer did it.
        from_device: bool,
    },
    /// New battery estimate.
    BatteryUpdated {
        /// The estimate.
        level: BatteryLevel,
        /// Reported current voltage.
        cur_voltage_mv: u16,
        /// Reported maximum voltage.
        max_voltage_mv: u16,
    },
    /// The reported voltages do not fit the discharge curve well.
    BatteryCurveWarning {
        /// Reported current voltage.
        cur_voltage_mv: u16,
        /// Reported maximum voltage.
        max_voltage_mv: u16,
        /// What looked wrong.
        reason: String,
    },
    /// Display unit changed.
    UnitChanged {
        /// The new unit.
        unit: Unit,
    },
    /// Alarm target set or cleared.
    TargetTemperatureChanged {
        /// Probe index.
        probe: u8,
        /// New target, `None` when cleared.
        target: Option<TargetTemperature>,
    },
    /// Reading history emptied.
    HistoryCleared,
    /// A settings notification that could not be interpreted.
    Unrecognized {
        /// Raw payload.
        data: Vec<u8>,
    },
}

/// Consistent copy of the state a viewer renders.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Link state.
    pub connection: ConnectionState,
    /// Battery estimate.
    pub battery: BatteryLevel,
    /// Display unit.
    pub unit: Unit,
    /// Alarm targets.
    pub targets: TargetTemperatures,
    /// Whether the alarm is sounding.
    pub alert: bool,
    /// History reset counter.
    pub generation: u64,
    /// The whole history, or only the latest reading.
    pub readings: Vec<Reading>,
}

impl SessionSnapshot {
    /// Check if the pairing key has been accepted on the current link.
    pub fn connected(&self) -> bool {
        self.connection.is_paired()
    }
}

/// Internal state, guarded by one mutex.
struct SessionState<H> {
    address: Option<DeviceAddress>,
    connection: ConnectionState,
    characteristics: Option<CharacteristicMap<H>>,
    link_events: Option<mpsc::Receiver<LinkEvent>>,
    unit: Unit,
    targets: TargetTemperatures,
    silence: AlarmSilence,
    history: HistoryBuffer,
    battery: BatteryLevel,
    alarm_sounding: bool,
}

impl<H: Clone> SessionState<H> {
    fn new() -> Self {
        Self {
            address: None,
            connection: ConnectionState::Disconnected,
            characteristics: None,
            link_events: None,
            unit: Unit::default(),
            targets: TargetTemperatures::new(),
            silence: AlarmSilence::default(),
            history: HistoryBuffer::new(),
            battery: BatteryLevel::Unknown,
            alarm_sounding: false,
        }
    }

    fn settings_handle(&self) -> Result<H> {
        if !self.connection.is_paired() {
            return Err(Error::NotConnected);
        }
        self.characteristics
            .as_ref()
            .ok_or(Error::NotConnected)?
            .require(CharacteristicRole::SettingsUpdate)
    }

    fn alert_at(&self, now: DateTime<Utc>) -> bool {
        alert(self.history.latest(), &self.targets, self.silence.until(), now)
    }

    fn triggered_probes(&self) -> Vec<u8> {
        let Some(reading) = self.history.latest() else {
            return Vec::new();
        };
        self.targets
            .iter()
            .filter(|(probe, target)| {
                reading
                    .probe(*probe as usize)
                    .map_or(false, |celsius| target.is_triggered_by(celsius))
            })
            .map(|(probe, _)| probe)
            .collect()
    }
}

/// The single authoritative view of one thermometer.
pub struct DeviceSession<T: Transport> {
    /// Radio access.
    transport: T,
    /// Internal state. Never held across an await.
    state: Mutex<SessionState<T::Handle>>,
    /// Serializes transport writes.
    io_lock: tokio::sync::Mutex<()>,
    /// Wake signal for viewers.
    changes: ChangeNotifier,
    /// Structured events for the log sink.
    event_tx: broadcast::Sender<DeviceEvent>,
    /// Callback ID counter.
    callback_counter: AtomicU64,
}

impl<T: Transport> DeviceSession<T> {
    /// Create a session that discovers the thermometer by name.
    pub fn new(transport: T) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            transport,
            state: Mutex::new(SessionState::new()),
            io_lock: tokio::sync::Mutex::new(()),
            changes: ChangeNotifier::new(),
            event_tx,
            callback_counter: AtomicU64::new(0),
        }
    }

    /// Bind the session to one device address.
    pub fn with_address(self, address: DeviceAddress) -> Self {
        self.state.lock().address = Some(address);
        self
    }

    /// Set the initial display unit.
    pub fn with_unit(self, unit: Unit) -> Self {
        self.state.lock().unit = unit;
        self
    }

    /// Limit the reading history to `capacity` entries.
    pub fn with_history_capacity(self, capacity: usize) -> Self {
        self.state.lock().history = HistoryBuffer::with_capacity(capacity);
        self
    }

    /// The transport this session talks through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // === Connection ===

    /// Open a link, pair, and replay unit and alarm targets.
    ///
    /// With no address bound or given, scans for a device advertising
    /// [`DEVICE_NAME`] every [`SCAN_INTERVAL`] until one shows up.
    ///
    /// # Errors
    ///
    /// - [`Error::AddressMismatch`] if `address` differs from the bound one
    /// - [`Error::DeviceNotFound`] if the address does not resolve
    /// - [`Error::CharacteristicNotFound`] if a required role is missing
    /// - any transport error from scanning, connecting or pairing
    pub async fn connect(&self, address: Option<&DeviceAddress>) -> Result<()> {
        let address = self.locate(address).await?;
        info!("Connecting to {}", address);

        self.set_connection(ConnectionState::Connecting);

        match self.open_link(&address).await {
            Ok(()) => {
                info!("Connected to {}", address);
                self.emit(DeviceEvent::Connected { address });
                self.changes.raise();
                Ok(())
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", address, e);
                if let Err(e) = self.transport.disconnect().await {
                    debug!("Cleanup disconnect failed: {}", e);
                }
                self.set_connection(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Pick the address to connect to.
    async fn locate(&self, requested: Option<&DeviceAddress>) -> Result<DeviceAddress> {
        let bound = self.state.lock().address.clone();

        let target = match (bound, requested) {
            (Some(bound), Some(requested)) if !bound.matches(requested.as_str()) => {
                return Err(Error::AddressMismatch {
                    bound: bound.to_string(),
                    requested: requested.to_string(),
                });
            }
            (Some(bound), _) => Some(bound),
            (None, requested) => requested.cloned(),
        };

        if let Some(address) = target {
            if self.transport.resolve(&address).await? {
                return Ok(address);
            }
            return Err(Error::DeviceNotFound {
                identifier: address.to_string(),
            });
        }

        info!("Scanning for {}", DEVICE_NAME);
        loop {
            if let Some(address) = self.transport.scan(DEVICE_NAME).await? {
                return Ok(address);
            }
            trace!("{} not found, scanning again", DEVICE_NAME);
            tokio::time::sleep(SCAN_INTERVAL).await;
        }
    }

    async fn open_link(&self, address: &DeviceAddress) -> Result<()> {
        let (tx, rx) = mpsc::channel(LINK_EVENT_CAPACITY);
        let discovered = self.transport.connect(address, tx).await?;
        let characteristics = CharacteristicMap::from_discovered(discovered)?;

        let pair = characteristics.require(CharacteristicRole::Pair)?;
        self.write(&pair, &encode_pair_key(), true).await?;
        debug!("Pairing key accepted");

        let settings = characteristics.require(CharacteristicRole::SettingsUpdate)?;
        let (unit, targets) = {
            let mut state = self.state.lock();
            state.address = Some(address.clone());
            state.characteristics = Some(characteristics);
            state.link_events = Some(rx);
            state.connection = ConnectionState::Paired;
            (state.unit, state.targets.clone())
        };
        debug!("Connection state changed: Connecting -> Paired");
        self.changes.raise();

        // Resync device-side settings the session is the source of truth for
        self.write(&settings, &encode_set_unit(unit), false).await?;
        for (probe, target) in targets.iter() {
            let frame = encode_set_target_temp(probe, target.min_temp_c, Some(target.max_temp_c));
            self.write(&settings, &frame, false).await?;
        }
        debug!("Replayed unit {} and {} alarm targets", unit, targets.len());

        Ok(())
    }

    /// Enable notifications and start realtime and battery reports.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] unless the session is paired, or any
    /// transport error from the subscriptions and writes.
    pub async fn subscribe(&self) -> Result<()> {
        let (settings_notify, realtime, settings_update) = {
            let state = self.state.lock();
            if state.connection != ConnectionState::Paired {
                return Err(Error::NotConnected);
            }
            let map = state.characteristics.as_ref().ok_or(Error::NotConnected)?;
            (
                map.require(CharacteristicRole::SettingsNotify)?,
                map.require(CharacteristicRole::RealtimeTempNotify)?,
                map.require(CharacteristicRole::SettingsUpdate)?,
            )
        };

        self.transport.subscribe(&settings_notify).await?;
        self.transport.subscribe(&realtime).await?;
        self.write(&settings_update, &encode_enable_realtime(), false)
            .await?;
        self.write(&settings_update, &encode_enable_battery(), false)
            .await?;

        self.set_connection(ConnectionState::Subscribed);
        info!("Subscribed to realtime and battery notifications");
        Ok(())
    }

    /// Process link events until the link goes down.
    ///
    /// Always ends with an error: [`Error::ConnectionLost`] when the link
    /// drops, [`Error::NotConnected`] if no link was open.
    pub async fn monitor(&self) -> Result<()> {
        let mut events = self
            .state
            .lock()
            .link_events
            .take()
            .ok_or(Error::NotConnected)?;

        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::Notification { uuid, data } => self.handle_notification(&uuid, &data),
                LinkEvent::Disconnected => break,
            }
        }

        self.mark_disconnected();
        Err(Error::ConnectionLost)
    }

    /// Close the link.
    pub async fn disconnect(&self) -> Result<()> {
        let result = self.transport.disconnect().await;
        self.state.lock().link_events = None;
        self.mark_disconnected();
        result
    }

    /// Record that the link is down.
    pub fn mark_disconnected(&self) {
        let (was, address) = {
            let mut state = self.state.lock();
            let was = state.connection;
            state.connection = ConnectionState::Disconnected;
            (was, state.address.clone())
        };

        if was != ConnectionState::Disconnected {
            info!("Disconnected ({} -> Disconnected)", was);
            if was.is_paired() {
                self.emit(DeviceEvent::Disconnected { address });
            }
            self.changes.raise();
        }
    }

    fn set_connection(&self, new_state: ConnectionState) {
        let old_state = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.connection, new_state)
        };

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);
            self.changes.raise();
        }
    }

    async fn write(&self, handle: &T::Handle, data: &[u8], with_response: bool) -> Result<()> {
        let _io = self.io_lock.lock().await;
        trace!("Writing {:02X?} to {:?}", data, handle);
        self.transport.write(handle, data, with_response).await
    }

    // === Notifications ===

    /// Apply one notification from the thermometer.
    pub fn handle_notification(&self, uuid: &Uuid, data: &[u8]) {
        match CharacteristicRole::from_uuid(uuid) {
            Some(CharacteristicRole::RealtimeTempNotify) => self.handle_realtime(data),
            Some(CharacteristicRole::SettingsNotify) => self.handle_settings(data),
            _ => trace!("Ignoring notification from {}: {:02X?}", uuid, data),
        }
    }

    fn handle_realtime(&self, data: &[u8]) {
        trace!("Realtime frame: {:02X?}", data);
        let probes = match decode_realtime_frame(data) {
            Ok(probes) => probes,
            Err(e) => {
                warn!("Dropping realtime frame {:02X?}: {}", data, e);
                return;
            }
        };

        let raised = {
            let mut state = self.state.lock();
            state.history.push(Reading::now(probes));

            let sounding = state.alert_at(Utc::now());
            let raised = (sounding && !state.alarm_sounding).then(|| state.triggered_probes());
            state.alarm_sounding = sounding;
            raised
        };

        if let Some(probes) = raised {
            warn!("Alarm: probes {:?} reached their targets", probes);
            self.emit(DeviceEvent::AlarmRaised { probes });
        }
        self.changes.raise();
    }

    fn handle_settings(&self, data: &[u8]) {
        trace!("Settings notification: {:02X?}", data);

        match decode_settings_notification(data) {
            SettingsEvent::BatteryTelemetry {
                cur_voltage_mv,
                max_voltage_mv,
            } => self.update_battery(cur_voltage_mv, max_voltage_mv),
            SettingsEvent::AlarmAck => {
                let until = {
                    let mut state = self.state.lock();
                    state.silence.silence(Utc::now());
                    state.alarm_sounding = false;
                    state.silence.until()
                };
                info!("Alarm silenced on the thermometer");
                if let Some(until) = until {
                    self.emit(DeviceEvent::AlarmSilenced {
                        until,
                        from_device: true,
                    });
                }
            }
            SettingsEvent::CommandAck { kind } => debug!("Command {:#04X} acknowledged", kind),
            SettingsEvent::PairingAck => debug!("Pairing acknowledged"),
            SettingsEvent::ConnectAck => debug!("Connect acknowledged"),
            SettingsEvent::VersionInfo {
                major,
                minor,
                patch,
            } => info!("Firmware version {}.{}.{}", major, minor, patch),
            SettingsEvent::Unknown(data) => {
                debug!("Unrecognized settings notification: {:02X?}", data);
                self.emit(DeviceEvent::Unrecognized { data });
            }
        }

        self.changes.raise();
    }

    fn update_battery(&self, cur_voltage_mv: u16, max_voltage_mv: u16) {
        if max_voltage_mv == 0 {
            self.emit(DeviceEvent::BatteryCurveWarning {
                cur_voltage_mv,
                max_voltage_mv,
                reason: format!("no maximum voltage reported, assuming {} mV", REFERENCE_MAX_VOLTAGE_MV),
            });
        } else if cur_voltage_mv > max_voltage_mv {
            self.emit(DeviceEvent::BatteryCurveWarning {
                cur_voltage_mv,
                max_voltage_mv,
                reason: "current voltage above reported maximum".to_string(),
            });
        }

        let level = estimate_battery(cur_voltage_mv, max_voltage_mv);
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.battery, level) != level
        };

        if changed {
            debug!(
                "Battery {} ({} of {} mV)",
                level, cur_voltage_mv, max_voltage_mv
            );
            self.emit(DeviceEvent::BatteryUpdated {
                level,
                cur_voltage_mv,
                max_voltage_mv,
            });
        }
    }

    // === Commands ===

    /// Change the display unit.
    ///
    /// The unit is stored even while disconnected and pushed to the device
    /// on the next connect.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the device write fails. Being
    /// disconnected is not an error.
    pub async fn set_unit(&self, unit: Unit) -> Result<()> {
        let (changed, handle) = {
            let mut state = self.state.lock();
            let changed = std::mem::replace(&mut state.unit, unit) != unit;
            (changed, state.settings_handle())
        };

        if changed {
            info!("Unit set to {}", unit);
            self.emit(DeviceEvent::UnitChanged { unit });
            self.changes.raise();
        }

        match handle {
            Ok(handle) => self.write(&handle, &encode_set_unit(unit), false).await,
            Err(Error::NotConnected) => {
                debug!("Not connected, unit {} will be sent on connect", unit);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Set or clear the alarm target of a probe, in Celsius.
    ///
    /// Passing `None` for all three clears the target. Any change lifts an
    /// active silence.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless subscribed
    /// - [`Error::InvalidParameter`] if the bounds are incomplete or inverted
    /// - a transport error if the device write fails; the target is kept and
    ///   replayed on the next connect
    pub async fn set_target_temperature(
        &self,
        probe: u8,
        preset: Option<serde_json::Value>,
        min_temp_c: Option<f64>,
        max_temp_c: Option<f64>,
    ) -> Result<()> {
        let target = TargetTemperature::from_parts(preset, min_temp_c, max_temp_c)?;

        let handle = {
            let mut state = self.state.lock();
            if !state.connection.is_subscribed() {
                return Err(Error::NotConnected);
            }
            let handle = state.settings_handle()?;
            state.targets.set(probe, target.clone());
            state.silence.reset();
            state.alarm_sounding = false;
            handle
        };

        match &target {
            Some(t) => info!(
                "Probe {} target set to {:?}..{} C ({:?})",
                probe, t.min_temp_c, t.max_temp_c, t.preset
            ),
            None => info!("Probe {} target cleared", probe),
        }
        self.emit(DeviceEvent::TargetTemperatureChanged {
            probe,
            target: target.clone(),
        });
        self.changes.raise();

        let frame = match &target {
            Some(t) => encode_set_target_temp(probe, t.min_temp_c, Some(t.max_temp_c)),
            None => encode_set_target_temp(probe, None, None),
        };
        self.write(&handle, &frame, false).await
    }

    /// Silence the alarm for five minutes.
    ///
    /// Works while disconnected; the device is told too when a link is open.
    /// A failed device write is logged, the local silence holds regardless.
    pub async fn silence_alarm(&self, probe: Option<u8>) -> Result<()> {
        let (until, handle) = {
            let mut state = self.state.lock();
            state.silence.silence(Utc::now());
            state.alarm_sounding = false;
            (state.silence.until(), state.settings_handle())
        };

        info!("Alarm silenced");
        if let Some(until) = until {
            self.emit(DeviceEvent::AlarmSilenced {
                until,
                from_device: false,
            });
        }
        self.changes.raise();

        let result = match handle {
            Ok(handle) => {
                self.write(&handle, &encode_silence_alarm(probe), false)
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(()) | Err(Error::NotConnected) => {}
            Err(e) => warn!("Could not silence the thermometer: {}", e),
        }
        Ok(())
    }

    /// Drop all readings and start a new history generation.
    pub fn clear_history(&self) {
        self.state.lock().history.clear();
        info!("History cleared");
        self.emit(DeviceEvent::HistoryCleared);
        self.changes.raise();
    }

    // === Accessors ===

    /// The bound device address.
    pub fn address(&self) -> Option<DeviceAddress> {
        self.state.lock().address.clone()
    }

    /// Current link state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    /// Check if the pairing key has been accepted on the current link.
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_paired()
    }

    /// Battery estimate.
    pub fn battery(&self) -> BatteryLevel {
        self.state.lock().battery
    }

    /// Display unit.
    pub fn unit(&self) -> Unit {
        self.state.lock().unit
    }

    /// Alarm targets.
    pub fn targets(&self) -> TargetTemperatures {
        self.state.lock().targets.clone()
    }

    /// Deadline of the current silence, if any.
    pub fn silenced_until(&self) -> Option<DateTime<Utc>> {
        self.state.lock().silence.until()
    }

    /// Whether the alarm is sounding now.
    pub fn alert(&self) -> bool {
        self.state.lock().alert_at(Utc::now())
    }

    /// The newest reading.
    pub fn latest(&self) -> Option<Reading> {
        self.state.lock().history.latest().cloned()
    }

    /// All readings, oldest first.
    pub fn history(&self) -> Vec<Reading> {
        self.state.lock().history.to_vec()
    }

    /// History reset counter.
    pub fn history_generation(&self) -> u64 {
        self.state.lock().history.generation()
    }

    /// Take a consistent copy of the viewer-visible state.
    pub fn snapshot(&self, full_history: bool) -> SessionSnapshot {
        let state = self.state.lock();
        let readings = if full_history {
            state.history.to_vec()
        } else {
            state.history.latest().cloned().into_iter().collect()
        };

        SessionSnapshot {
            connection: state.connection,
            battery: state.battery,
            unit: state.unit,
            targets: state.targets.clone(),
            alert: state.alert_at(Utc::now()),
            generation: state.history.generation(),
            readings,
        }
    }

    /// The wake signal raised on every change.
    pub fn changes(&self) -> &ChangeNotifier {
        &self.changes
    }

    // === Events ===

    /// Subscribe to structured events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_tx.subscribe()
    }

    /// Register a callback for structured events.
    pub fn on_event<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.event_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Event callback fell behind, {} events dropped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    fn emit(&self, event: DeviceEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl<T: Transport> std::fmt::Debug for DeviceSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DeviceSession")
            .field("address", &state.address)
            .field("connection", &state.connection)
            .field("unit", &state.unit)
            .field("readings", &state.history.len())
            .finish()
    }
}
