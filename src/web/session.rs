//! One viewer's push loop.
//!
//! [`TelemetrySession`] sends a `unit_update`, then a `state_update` every
//! time the device session changes, and applies the commands the viewer
//! sends back. It works on any stream of [`ViewerFrame`]s and any sink of
//! text, so tests drive it with channels and the server with a websocket.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ble::transport::Transport;
use crate::device::DeviceSession;
use crate::error::Result;
use crate::web::messages::{ClientCommand, ServerMessage, StateUpdate};

/// Called when a viewer asks to power the host off.
pub type PoweroffHook = Arc<dyn Fn() + Send + Sync>;

/// An inbound frame from a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerFrame {
    /// A JSON command.
    Text(String),
    /// Binary payload. Viewers never send these.
    Binary(Vec<u8>),
    /// Keep-alive.
    Ping,
    /// Keep-alive reply.
    Pong,
    /// The viewer is leaving.
    Close,
}

/// Why a viewer session ended abnormally.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The viewer sent something other than text.
    #[error("viewer sent a non-text frame ({0} bytes)")]
    NonText(usize),

    /// The outbound side is gone.
    #[error("viewer connection closed")]
    Closed,

    /// A message could not be serialized.
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The push loop for one viewer.
pub struct TelemetrySession<T: Transport> {
    device: Arc<DeviceSession<T>>,
    peer: Option<SocketAddr>,
    poweroff: Option<PoweroffHook>,
}

impl<T: Transport> TelemetrySession<T> {
    /// Create a session reading from `device`.
    pub fn new(device: Arc<DeviceSession<T>>) -> Self {
        Self {
            device,
            peer: None,
            poweroff: None,
        }
    }

    /// Remember the viewer's address for log lines.
    pub fn with_peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }

    /// Allow `poweroff` commands, running `hook` for each one.
    pub fn with_poweroff(mut self, hook: Option<PoweroffHook>) -> Self {
        self.poweroff = hook;
        self
    }

    fn peer_label(&self) -> String {
        self.peer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "viewer".to_string())
    }

    /// Run until the viewer closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::NonText`] on a binary frame and
    /// [`ViewerError::Closed`] if sending fails. Neither affects the device
    /// session or other viewers.
    pub async fn run<S, K>(self, mut frames: S, mut out: K) -> std::result::Result<(), ViewerError>
    where
        S: Stream<Item = ViewerFrame> + Unpin,
        K: Sink<String> + Unpin,
    {
        let peer = self.peer_label();
        info!("Viewer {} connected", peer);

        let mut unit = self.device.unit();
        send(&mut out, &ServerMessage::UnitUpdate { unit }).await?;

        let mut generation = self.device.history_generation();
        let mut full_history = true;

        loop {
            // Read the version first so a change during the build is seen next round
            let seen = self.device.changes().version();

            let current = self.device.history_generation();
            if current != generation {
                generation = current;
                full_history = true;
            }

            let snapshot = self.device.snapshot(full_history);
            if snapshot.unit != unit {
                unit = snapshot.unit;
                send(&mut out, &ServerMessage::UnitUpdate { unit }).await?;
            }

            let update = StateUpdate::from_snapshot(&snapshot, full_history, Utc::now());
            send(&mut out, &ServerMessage::StateUpdate(update)).await?;
            if !snapshot.readings.is_empty() {
                full_history = false;
            }

            tokio::select! {
                frame = frames.next() => match frame {
                    None | Some(ViewerFrame::Close) => {
                        info!("Viewer {} disconnected", peer);
                        return Ok(());
                    }
                    Some(ViewerFrame::Text(text)) => self.apply(&text).await,
                    Some(ViewerFrame::Binary(data)) => {
                        warn!("Viewer {} sent a binary frame, closing", peer);
                        return Err(ViewerError::NonText(data.len()));
                    }
                    Some(ViewerFrame::Ping) | Some(ViewerFrame::Pong) => {}
                },
                _ = self.device.changes().changed_since(seen) => {}
            }
        }
    }

    async fn apply(&self, text: &str) {
        let command = match ClientCommand::from_json(text) {
            Ok(command) => command,
            Err(e) => {
                warn!("Ignoring malformed viewer message {:?}: {}", text, e);
                return;
            }
        };

        debug!("Viewer command: {:?}", command);
        if let Err(e) = self.execute(command).await {
            warn!("Viewer command failed: {}", e);
        }
    }

    async fn execute(&self, command: ClientCommand) -> Result<()> {
        match command {
            ClientCommand::SetUnit { unit } => self.device.set_unit(unit).await,
            ClientCommand::SetProbeTargetTemp {
                probe,
                preset,
                min_temp,
                max_temp,
            } => {
                self.device
                    .set_target_temperature(probe, preset, min_temp, max_temp)
                    .await
            }
            ClientCommand::SilenceAlarm => self.device.silence_alarm(None).await,
            ClientCommand::ClearHistory => {
                self.device.clear_history();
                Ok(())
            }
            ClientCommand::Poweroff => {
                match &self.poweroff {
                    Some(hook) => {
                        warn!("Powering off at the request of {}", self.peer_label());
                        hook();
                    }
                    None => warn!("Ignoring poweroff request, \"allow_poweroff\" is disabled"),
                }
                Ok(())
            }
        }
    }
}

async fn send<K>(out: &mut K, message: &ServerMessage) -> std::result::Result<(), ViewerError>
where
    K: Sink<String> + Unpin,
{
    let json = message.to_json()?;
    out.send(json).await.map_err(|_| ViewerError::Closed)
}
