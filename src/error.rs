//! Error types for the ibbq-rust-ble crate.

use thiserror::Error;

use crate::ble::uuids::CharacteristicRole;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No device answered to the requested address.
    #[error("Device not found: {identifier}")]
    DeviceNotFound {
        /// The address or name that was searched for.
        identifier: String,
    },

    /// The session is bound to one device and was asked to connect to another.
    #[error("Session is bound to {bound}, refusing to connect to {requested}")]
    AddressMismatch {
        /// The address the session was created with.
        bound: String,
        /// The address that was requested.
        requested: String,
    },

    /// Operation requires a connection but the thermometer is not connected.
    #[error("Thermometer not connected")]
    NotConnected,

    /// Failed to establish a connection or to talk over it.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// The connection to the thermometer was lost.
    #[error("Connection lost")]
    ConnectionLost,

    /// Invalid data was received from the thermometer.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// A required characteristic was not exposed by the device.
    #[error("Characteristic not found: {role}")]
    CharacteristicNotFound {
        /// The role that could not be mapped.
        role: CharacteristicRole,
    },
}

impl Error {
    /// Whether this error came from the radio link and is worth retrying.
    ///
    /// Address resolution failures count as well: the reconnect loop starts
    /// over from scratch after them.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth(_)
                | Self::BluetoothUnavailable
                | Self::ConnectionFailed { .. }
                | Self::ConnectionLost
                | Self::DeviceNotFound { .. }
                | Self::CharacteristicNotFound { .. }
        )
    }

    pub(crate) fn connection_failed(reason: impl std::fmt::Display) -> Self {
        Self::ConnectionFailed {
            reason: reason.to_string(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(Error::ConnectionLost.is_transport());
        assert!(Error::connection_failed("write timed out").is_transport());
        assert!(Error::DeviceNotFound {
            identifier: "AA:BB".to_string()
        }
        .is_transport());
        assert!(!Error::NotConnected.is_transport());
        assert!(!Error::InvalidData {
            context: "short frame".to_string()
        }
        .is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = Error::CharacteristicNotFound {
            role: CharacteristicRole::Pair,
        };
        assert_eq!(err.to_string(), "Characteristic not found: Pair (0xFFF2)");

        let err = Error::AddressMismatch {
            bound: "AA:BB".to_string(),
            requested: "CC:DD".to_string(),
        };
        assert!(err.to_string().contains("CC:DD"));
    }
}
