//! Realtime temperature notifications.
//!
//! The RealtimeTempNotify characteristic pushes one frame per second holding
//! a 2-byte little-endian value for every probe socket, in socket order.

use crate::data::RawTemperature;
use crate::error::{Error, Result};

/// Decode one probe temperature.
///
/// Returns `None` for an unplugged probe.
pub fn decode_temperature(bytes: [u8; 2]) -> Option<f64> {
    RawTemperature::from_le_bytes(bytes).to_celsius()
}

/// Encode one probe temperature, the inverse of [`decode_temperature`].
pub fn encode_temperature(celsius: Option<f64>) -> [u8; 2] {
    RawTemperature::from_celsius(celsius).to_le_bytes()
}

/// Decode a realtime frame into per-probe Celsius values.
///
/// # Example
///
/// ```
/// use ibbq_rust_ble::protocol::decode_realtime_frame;
///
/// let probes = decode_realtime_frame(&[0x00, 0x02, 0xF6, 0xFF]).unwrap();
/// assert_eq!(probes, vec![Some(51.2), None]);
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidData`] for an empty frame or one whose length is
/// not a multiple of two.
pub fn decode_realtime_frame(data: &[u8]) -> Result<Vec<Option<f64>>> {
    if data.is_empty() || data.len() % RawTemperature::SIZE != 0 {
        return Err(Error::InvalidData {
            context: format!("realtime frame of {} bytes", data.len()),
        });
    }

    Ok(data
        .chunks_exact(RawTemperature::SIZE)
        .map(|chunk| decode_temperature([chunk[0], chunk[1]]))
        .collect())
}

/// Encode per-probe Celsius values into a realtime frame.
pub fn encode_realtime_frame(probes: &[Option<f64>]) -> Vec<u8> {
    probes
        .iter()
        .flat_map(|&probe| encode_temperature(probe))
        .collect()
}
