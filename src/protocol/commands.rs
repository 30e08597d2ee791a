//! Command frames written to the thermometer.
//!
//! The pairing key goes to the Pair characteristic and must be
//! acknowledged. Every other command is a fixed 6-byte frame on the
//! SettingsUpdate characteristic, written without response.

use bytes::{BufMut, Bytes, BytesMut};

use crate::data::Unit;

/// Fixed vendor key that authorizes a connection.
pub const PAIR_KEY: [u8; 15] = [
    0x21, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0xB8, 0x22, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Length of every SettingsUpdate frame.
pub const SETTINGS_FRAME_LEN: usize = 6;

/// Probe index addressing every probe at once.
pub const ALL_PROBES: u8 = 0xFF;

/// Lower bound written when a target has no minimum, in °C.
pub const UNSET_MIN_TEMP_C: f64 = -300.0;

/// Upper bound written when a target has no maximum, in °C.
pub const UNSET_MAX_TEMP_C: f64 = 302.0;

/// A command for the SettingsUpdate characteristic.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsCommand {
    /// Start the once-per-second realtime temperature stream.
    EnableRealtime,
    /// Start battery telemetry reports.
    EnableBattery,
    /// Change the unit on the thermometer's own display.
    SetUnit(Unit),
    /// Program the alarm range of one probe.
    SetTargetTemperature {
        /// Probe index.
        probe: u8,
        /// Lower bound in °C.
        min_temp_c: Option<f64>,
        /// Upper bound in °C.
        max_temp_c: Option<f64>,
    },
    /// Silence a sounding alarm.
    SilenceAlarm {
        /// Probe index, or [`ALL_PROBES`].
        probe: u8,
    },
}

impl SettingsCommand {
    /// Opcode in the first byte of the frame.
    pub fn opcode(&self) -> u8 {
        match self {
            Self::SetTargetTemperature { .. } => 0x01,
            Self::SetUnit(_) => 0x02,
            Self::SilenceAlarm { .. } => 0x04,
            Self::EnableBattery => 0x08,
            Self::EnableRealtime => 0x0B,
        }
    }

    /// Serialize to the 6-byte wire frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SETTINGS_FRAME_LEN);
        buf.put_u8(self.opcode());

        match self {
            Self::EnableRealtime => buf.put_u8(0x01),
            Self::EnableBattery => buf.put_u8(0x24),
            Self::SetUnit(unit) => buf.put_u8(unit.to_raw()),
            Self::SetTargetTemperature {
                probe,
                min_temp_c,
                max_temp_c,
            } => {
                buf.put_u8(*probe);
                buf.put_i16_le(tenths(min_temp_c.unwrap_or(UNSET_MIN_TEMP_C)));
                buf.put_i16_le(tenths(max_temp_c.unwrap_or(UNSET_MAX_TEMP_C)));
            }
            Self::SilenceAlarm { probe } => buf.put_u8(*probe),
        }

        buf.resize(SETTINGS_FRAME_LEN, 0x00);
        buf.freeze()
    }
}

fn tenths(celsius: f64) -> i16 {
    (celsius * 10.0).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// The pairing key frame.
pub fn encode_pair_key() -> Bytes {
    Bytes::from_static(&PAIR_KEY)
}

/// Enable realtime temperature notifications.
pub fn encode_enable_realtime() -> Bytes {
    SettingsCommand::EnableRealtime.encode()
}

/// Enable battery telemetry notifications.
pub fn encode_enable_battery() -> Bytes {
    SettingsCommand::EnableBattery.encode()
}

/// Set the display unit.
pub fn encode_set_unit(unit: Unit) -> Bytes {
    SettingsCommand::SetUnit(unit).encode()
}

/// Set the alarm range of a probe. Missing bounds are sent as the device's
/// out-of-range extremes.
pub fn encode_set_target_temp(probe: u8, min_temp_c: Option<f64>, max_temp_c: Option<f64>) -> Bytes {
    SettingsCommand::SetTargetTemperature {
        probe,
        min_temp_c,
        max_temp_c,
    }
    .encode()
}

/// Silence the alarm of one probe, or of all with `None`.
pub fn encode_silence_alarm(probe: Option<u8>) -> Bytes {
    SettingsCommand::SilenceAlarm {
        probe: probe.unwrap_or(ALL_PROBES),
    }
    .encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pair_key() {
        assert_eq!(
            encode_pair_key().as_ref(),
            &[0x21, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0xB8, 0x22, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_fixed_frames() {
        assert_eq!(encode_enable_realtime().as_ref(), &[0x0B, 0x01, 0, 0, 0, 0]);
        assert_eq!(encode_enable_battery().as_ref(), &[0x08, 0x24, 0, 0, 0, 0]);
        assert_eq!(encode_set_unit(Unit::Celsius).as_ref(), &[0x02, 0x00, 0, 0, 0, 0]);
        assert_eq!(encode_set_unit(Unit::Fahrenheit).as_ref(), &[0x02, 0x01, 0, 0, 0, 0]);
    }

    #[test]
    fn test_set_target_temp() {
        // 50.0 °C -> 500 = 0x01F4, 70.0 °C -> 700 = 0x02BC
        assert_eq!(
            encode_set_target_temp(2, Some(50.0), Some(70.0)).as_ref(),
            &[0x01, 0x02, 0xF4, 0x01, 0xBC, 0x02]
        );
    }

    #[test]
    fn test_set_target_temp_unset_bounds() {
        // -3000 = 0xF448, 3020 = 0x0BCC
        assert_eq!(
            encode_set_target_temp(0, None, None).as_ref(),
            &[0x01, 0x00, 0x48, 0xF4, 0xCC, 0x0B]
        );
    }

    #[test]
    fn test_silence_alarm() {
        assert_eq!(encode_silence_alarm(None).as_ref(), &[0x04, 0xFF, 0, 0, 0, 0]);
        assert_eq!(encode_silence_alarm(Some(3)).as_ref(), &[0x04, 0x03, 0, 0, 0, 0]);
    }

    #[test]
    fn test_frames_have_fixed_length() {
        let commands = [
            SettingsCommand::EnableRealtime,
            SettingsCommand::EnableBattery,
            SettingsCommand::SetUnit(Unit::Celsius),
            SettingsCommand::SetTargetTemperature {
                probe: 1,
                min_temp_c: Some(-5.5),
                max_temp_c: Some(250.0),
            },
            SettingsCommand::SilenceAlarm { probe: ALL_PROBES },
        ];
        for command in commands {
            assert_eq!(command.encode().len(), SETTINGS_FRAME_LEN, "{:?}", command);
        }
    }
}
