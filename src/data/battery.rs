//! Battery level estimation.
//!
//! The thermometer reports its current and maximum pack voltage in
//! millivolts. The percentage comes from a discharge curve measured on
//! real devices, scaled by how far the reported maximum sits from a fresh
//! pack.
//!
//! Curve source: <https://github.com/sworisbreathing/go-ibbq/issues/2#issuecomment-650725433>

use serde::{Serialize, Serializer};

/// Maximum voltage of a fully charged pack, used when the device reports 0.
pub const REFERENCE_MAX_VOLTAGE_MV: u16 = 6550;

/// Discharge curve: entry `i` is the voltage at which the pack holds `i` percent.
pub const VOLTAGE_CURVE_MV: [u16; 100] = [
    5580, 5595, 5609, 5624, 5639, 5644, 5649, 5654, 5661, 5668, // 0-10%
    5676, 5683, 5698, 5712, 5727, 5733, 5739, 5744, 5750, 5756, // 10-20%
    5759, 5762, 5765, 5768, 5771, 5774, 5777, 5780, 5783, 5786, // 20-30%
    5789, 5792, 5795, 5798, 5801, 5807, 5813, 5818, 5824, 5830, // 30-40%
    5830, 5830, 5835, 5840, 5845, 5851, 5857, 5864, 5870, 5876, // 40-50%
    5882, 5888, 5894, 5900, 5906, 5915, 5924, 5934, 5943, 5952, // 50-60%
    5961, 5970, 5980, 5989, 5998, 6007, 6016, 6026, 6035, 6044, // 60-70%
    6052, 6062, 6072, 6081, 6090, 6103, 6115, 6128, 6140, 6153, // 70-80%
    6172, 6191, 6211, 6230, 6249, 6265, 6280, 6285, 6290, 6295, // 80-90%
    6300, 6305, 6310, 6315, 6320, 6325, 6330, 6335, 6340, 6344, // 90-100%
];

/// Battery state as shown to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BatteryLevel {
    /// No telemetry received yet.
    #[default]
    Unknown,
    /// The pack is on the charger (reported voltage is 0).
    Charging,
    /// Estimated charge, 0-100.
    Percent(u8),
}

impl BatteryLevel {
    /// Get the percentage, if one is known.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Percent(p) => Some(*p),
            _ => None,
        }
    }
}

impl std::fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Charging => write!(f, "charging"),
            Self::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// Serializes as `null`, `"charging"`, or the integer percentage.
impl Serialize for BatteryLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_none(),
            Self::Charging => serializer.serialize_str("charging"),
            Self::Percent(p) => serializer.serialize_u8(*p),
        }
    }
}

/// Estimate the battery level from a telemetry report.
///
/// Returns the first curve index whose scaled voltage is above
/// `cur_voltage_mv`, or 100 at and above the top of the curve.
/// A `max_voltage_mv` of 0 is treated as [`REFERENCE_MAX_VOLTAGE_MV`].
///
/// # Example
///
/// ```
/// use ibbq_rust_ble::data::{estimate_battery, BatteryLevel};
///
/// assert_eq!(estimate_battery(0, 6550), BatteryLevel::Charging);
/// assert_eq!(estimate_battery(6400, 6550), BatteryLevel::Percent(100));
/// assert_eq!(estimate_battery(5000, 6550), BatteryLevel::Percent(0));
/// ```
pub fn estimate_battery(cur_voltage_mv: u16, max_voltage_mv: u16) -> BatteryLevel {
    if cur_voltage_mv == 0 {
        return BatteryLevel::Charging;
    }

    let max_voltage_mv = if max_voltage_mv == 0 {
        REFERENCE_MAX_VOLTAGE_MV
    } else {
        max_voltage_mv
    };
    let factor = max_voltage_mv as f64 / REFERENCE_MAX_VOLTAGE_MV as f64;
    let current = cur_voltage_mv as f64;

    let percent = VOLTAGE_CURVE_MV
        .iter()
        .position(|&threshold| current < threshold as f64 * factor)
        .unwrap_or(100);

    BatteryLevel::Percent(percent as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_curve_is_monotonic() {
        assert!(VOLTAGE_CURVE_MV.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_charging_sentinel() {
        assert_eq!(estimate_battery(0, 0), BatteryLevel::Charging);
        assert_eq!(estimate_battery(0, 6000), BatteryLevel::Charging);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(estimate_battery(5579, 6550), BatteryLevel::Percent(0));
        assert_eq!(estimate_battery(5580, 6550), BatteryLevel::Percent(1));
        assert_eq!(estimate_battery(5900, 6550), BatteryLevel::Percent(54));
        assert_eq!(estimate_battery(6343, 6550), BatteryLevel::Percent(99));
        assert_eq!(estimate_battery(6344, 6550), BatteryLevel::Percent(100));
        assert_eq!(estimate_battery(u16::MAX, 6550), BatteryLevel::Percent(100));
    }

    #[test]
    fn test_scaled_by_max_voltage() {
        // A pack that tops out lower reads fuller at the same voltage
        let full = estimate_battery(5900, 6550).percent().unwrap();
        let worn = estimate_battery(5900, 6000).percent().unwrap();
        assert!(worn > full);
    }

    #[test]
    fn test_serialize() {
        assert_eq!(serde_json::to_string(&BatteryLevel::Unknown).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&BatteryLevel::Charging).unwrap(),
            "\"charging\""
        );
        assert_eq!(serde_json::to_string(&BatteryLevel::Percent(42)).unwrap(), "42");
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_current_voltage(a in 1u16..=u16::MAX, b in 1u16..=u16::MAX, max in any::<u16>()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo = estimate_battery(lo, max).percent().unwrap();
            let hi = estimate_battery(hi, max).percent().unwrap();
            prop_assert!(lo <= hi);
        }

        #[test]
        fn prop_zero_max_matches_reference(cur in any::<u16>()) {
            prop_assert_eq!(
                estimate_battery(cur, 0),
                estimate_battery(cur, REFERENCE_MAX_VOLTAGE_MV)
            );
        }

        #[test]
        fn prop_percent_in_range(cur in 1u16..=u16::MAX, max in any::<u16>()) {
            let percent = estimate_battery(cur, max).percent().unwrap();
            prop_assert!(percent <= 100);
        }
    }
}
