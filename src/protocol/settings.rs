//! SettingsNotify decoding.
//!
//! The thermometer answers commands and reports battery telemetry on the
//! SettingsNotify characteristic. The first byte selects the message.
//! Anything unrecognized decodes to [`SettingsEvent::Unknown`] so callers
//! can log it; decoding never fails.

/// Opcode of a battery telemetry report.
const OP_BATTERY: u8 = 0x24;
/// Opcode of a command acknowledgement.
const OP_ACK: u8 = 0xFF;
/// Opcode of a pairing acknowledgement.
const OP_PAIRING: u8 = 0x20;
/// Opcode of a connect acknowledgement.
const OP_CONNECT: u8 = 0x21;
/// Opcode of a firmware version report.
const OP_VERSION: u8 = 0x22;

/// Acknowledged command kind for a silenced alarm.
const ACK_SILENCE: u8 = 0x04;

/// A decoded SettingsNotify message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsEvent {
    /// The alarm was silenced on the device.
    AlarmAck,
    /// The pairing key was accepted.
    PairingAck,
    /// The connection was accepted.
    ConnectAck,
    /// Firmware version.
    VersionInfo {
        /// Major version.
        major: u8,
        /// Minor version.
        minor: u8,
        /// Patch version.
        patch: u8,
    },
    /// Battery voltages in millivolts.
    BatteryTelemetry {
        /// Current pack voltage.
        cur_voltage_mv: u16,
        /// Maximum pack voltage, 0 if the device does not know it.
        max_voltage_mv: u16,
    },
    /// Acknowledgement of a SettingsUpdate command, by opcode.
    CommandAck {
        /// Opcode of the acknowledged command.
        kind: u8,
    },
    /// Anything else, kept verbatim for logging.
    Unknown(Vec<u8>),
}

impl SettingsEvent {
    /// Check whether this is the [`Unknown`](Self::Unknown) variant.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

/// Decode a SettingsNotify payload.
///
/// # Example
///
/// ```
/// use ibbq_rust_ble::protocol::{decode_settings_notification, SettingsEvent};
///
/// let event = decode_settings_notification(&[0x24, 0x1C, 0x17, 0x96, 0x19, 0x00]);
/// assert_eq!(
///     event,
///     SettingsEvent::BatteryTelemetry { cur_voltage_mv: 5916, max_voltage_mv: 6550 }
/// );
/// ```
pub fn decode_settings_notification(data: &[u8]) -> SettingsEvent {
    match data {
        [OP_BATTERY, c0, c1, m0, m1, ..] => SettingsEvent::BatteryTelemetry {
            cur_voltage_mv: u16::from_le_bytes([*c0, *c1]),
            max_voltage_mv: u16::from_le_bytes([*m0, *m1]),
        },
        [OP_ACK, ACK_SILENCE, ..] => SettingsEvent::AlarmAck,
        [OP_ACK, kind, ..] => SettingsEvent::CommandAck { kind: *kind },
        [OP_PAIRING, ..] => SettingsEvent::PairingAck,
        [OP_CONNECT, ..] => SettingsEvent::ConnectAck,
        [OP_VERSION, major, minor, patch, ..] => SettingsEvent::VersionInfo {
            major: *major,
            minor: *minor,
            patch: *patch,
        },
        _ => SettingsEvent::Unknown(data.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_telemetry() {
        let event = decode_settings_notification(&[0x24, 0xE8, 0x16, 0x00, 0x00, 0x00]);
        assert_eq!(
            event,
            SettingsEvent::BatteryTelemetry {
                cur_voltage_mv: 5864,
                max_voltage_mv: 0
            }
        );
    }

    #[test]
    fn test_acks() {
        assert_eq!(
            decode_settings_notification(&[0xFF, 0x04, 0, 0, 0, 0]),
            SettingsEvent::AlarmAck
        );
        assert_eq!(
            decode_settings_notification(&[0xFF, 0x01, 0, 0, 0, 0]),
            SettingsEvent::CommandAck { kind: 0x01 }
        );
        assert_eq!(decode_settings_notification(&[0x20]), SettingsEvent::PairingAck);
        assert_eq!(decode_settings_notification(&[0x21, 0x00]), SettingsEvent::ConnectAck);
    }

    #[test]
    fn test_version() {
        assert_eq!(
            decode_settings_notification(&[0x22, 1, 2, 3]),
            SettingsEvent::VersionInfo {
                major: 1,
                minor: 2,
                patch: 3
            }
        );
    }

    #[test]
    fn test_unknown_never_fails() {
        assert_eq!(
            decode_settings_notification(&[0x99, 0x01]),
            SettingsEvent::Unknown(vec![0x99, 0x01])
        );
        assert!(decode_settings_notification(&[]).is_unknown());
        // Known opcodes with a truncated payload
        assert!(decode_settings_notification(&[0x24, 0x01, 0x02]).is_unknown());
        assert!(decode_settings_notification(&[0xFF]).is_unknown());
        assert!(decode_settings_notification(&[0x22, 0x01]).is_unknown());
    }
}
