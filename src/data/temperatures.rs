//! Temperature data structures.
//!
//! iBBQ thermometers report each probe as an unsigned 16-bit little-endian
//! value in tenths of a degree Celsius. One reserved value marks a probe
//! socket with nothing plugged in.

use crate::utils::celsius_to_fahrenheit;

/// Raw temperature value from one probe socket.
///
/// The conversion formula is `temperature_celsius = raw_value / 10.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawTemperature(pub u16);

impl RawTemperature {
    /// Reserved value reported for an unplugged probe.
    pub const DISCONNECTED: Self = Self(0xFFF6);

    /// Size of one encoded temperature in bytes.
    pub const SIZE: usize = 2;

    /// Create from a raw value.
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Parse from 2 little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    /// Encode to 2 little-endian bytes.
    pub fn to_le_bytes(&self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Check whether a probe is plugged in.
    pub fn is_connected(&self) -> bool {
        *self != Self::DISCONNECTED
    }

    /// Convert the raw value to Celsius.
    ///
    /// # Example
    ///
    /// ```
    /// use ibbq_rust_ble::data::RawTemperature;
    ///
    /// assert_eq!(RawTemperature::new(720).to_celsius(), Some(72.0));
    /// assert_eq!(RawTemperature::DISCONNECTED.to_celsius(), None);
    /// ```
    pub fn to_celsius(&self) -> Option<f64> {
        if self.is_connected() {
            Some(self.0 as f64 / 10.0)
        } else {
            None
        }
    }

    /// Convert the raw value to Fahrenheit.
    pub fn to_fahrenheit(&self) -> Option<f64> {
        self.to_celsius().map(celsius_to_fahrenheit)
    }

    /// Create a RawTemperature from an optional Celsius value.
    ///
    /// `None` encodes as [`Self::DISCONNECTED`]. Values are rounded to the
    /// nearest 0.1 °C and clamped to the representable range. A value that
    /// would land on the sentinel is nudged one step down.
    pub fn from_celsius(celsius: Option<f64>) -> Self {
        match celsius {
            None => Self::DISCONNECTED,
            Some(c) => {
                let raw = (c * 10.0).round().clamp(0.0, u16::MAX as f64) as u16;
                if raw == Self::DISCONNECTED.0 {
                    Self(raw - 1)
                } else {
                    Self(raw)
                }
            }
        }
    }

    /// Get the raw value.
    pub fn raw_value(&self) -> u16 {
        self.0
    }
}

impl Default for RawTemperature {
    fn default() -> Self {
        Self::DISCONNECTED
    }
}
