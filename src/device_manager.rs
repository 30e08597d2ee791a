//! Reconnect loop for the thermometer.
//!
//! [`DeviceManager`] keeps a [`DeviceSession`] connected for the life of
//! the process: connect, subscribe, monitor until the link drops, wait a
//! second, and start over. Every failure along the way is logged and
//! retried; none of them stop the loop.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ble::transport::{DeviceAddress, Transport};
use crate::device::DeviceSession;
use crate::error::{Error, Result};
use crate::utils::format_probe;

/// Fixed delay between connection attempts.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Interval of the status line logged while subscribed.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Drives the connect → subscribe → monitor cycle of one session.
pub struct DeviceManager<T: Transport> {
    /// The session kept connected.
    session: Arc<DeviceSession<T>>,
    /// Address to connect to, or `None` to discover by name.
    address: Option<DeviceAddress>,
    /// Background task handle.
    background_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
    /// Running flag.
    is_running: Arc<AtomicBool>,
}

impl<T: Transport> DeviceManager<T> {
    /// Create a manager for `session`.
    pub fn new(session: Arc<DeviceSession<T>>) -> Self {
        Self {
            session,
            address: None,
            background_handle: RwLock::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect to a specific address instead of discovering by name.
    pub fn with_address(mut self, address: Option<DeviceAddress>) -> Self {
        self.address = address;
        self
    }

    /// Get the managed session.
    pub fn session(&self) -> &Arc<DeviceSession<T>> {
        &self.session
    }

    /// Check if the reconnect loop is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Start the reconnect loop in the background.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            debug!("Reconnect loop already running");
            return;
        }

        info!("Starting reconnect loop");
        let session = self.session.clone();
        let address = self.address.clone();
        let handle = tokio::spawn(async move {
            Self::run(session, address).await;
        });

        *self.background_handle.write() = Some(handle);
    }

    /// Stop the reconnect loop and close the link.
    pub async fn stop(&self) -> Result<()> {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Stopping reconnect loop");
        let handle = self.background_handle.write().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }

        self.session.disconnect().await
    }

    /// Run the reconnect loop forever.
    pub async fn run(session: Arc<DeviceSession<T>>, address: Option<DeviceAddress>) {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            match Self::run_once(&session, address.as_ref()).await {
                Err(Error::ConnectionLost) => info!("Connection lost, reconnecting"),
                Err(e) if e.is_transport() => {
                    warn!("Connection attempt {} failed: {}", attempt, e)
                }
                Err(e) => warn!("Connection attempt {} aborted: {}", attempt, e),
                Ok(()) => {}
            }

            session.mark_disconnected();
            tokio::time::sleep(RECONNECT_BACKOFF).await;
        }
    }

    /// One connect → subscribe → monitor cycle.
    async fn run_once(session: &DeviceSession<T>, address: Option<&DeviceAddress>) -> Result<()> {
        session.connect(address).await?;

        if let Err(e) = session.subscribe().await {
            if let Err(e) = session.disconnect().await {
                debug!("Disconnect after failed subscribe: {}", e);
            }
            return Err(e);
        }

        tokio::select! {
            result = session.monitor() => result,
            _ = Self::report_status(session) => Ok(()),
        }
    }

    /// Log the latest reading and battery level every [`STATUS_INTERVAL`].
    async fn report_status(session: &DeviceSession<T>) {
        let start = tokio::time::Instant::now() + STATUS_INTERVAL;
        let mut interval = tokio::time::interval_at(start, STATUS_INTERVAL);

        loop {
            interval.tick().await;
            info!("{}", status_line(session));
        }
    }
}

/// Render the latest reading in the session's unit.
pub fn status_line<T: Transport>(session: &DeviceSession<T>) -> String {
    let unit = session.unit();
    let probes = match session.latest() {
        Some(reading) => reading
            .probes
            .iter()
            .map(|p| format_probe(p.map(|c| unit.present(c)), unit.letter()))
            .collect::<Vec<_>>()
            .join(" "),
        None => "no readings".to_string(),
    };

    format!("Probes: {} | Battery: {}", probes, session.battery())
}

impl<T: Transport> Drop for DeviceManager<T> {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.background_handle.write().take() {
            handle.abort();
        }
    }
}
