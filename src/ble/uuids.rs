//! BLE characteristic identifiers.
//!
//! iBBQ thermometers expose a single vendor service whose characteristics
//! are told apart by the low 16 bits of the UUID time-low field
//! (`0000fff1-...`, `0000fff2-...` and so on).

use uuid::Uuid;

/// Name the thermometer advertises while discoverable.
pub const DEVICE_NAME: &str = "iBBQ";

/// Vendor service UUID.
pub const IBBQ_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_fff0_0000_1000_8000_00805f9b34fb);

/// Role of a characteristic on the thermometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum CharacteristicRole {
    /// Settings results and battery telemetry (notify).
    SettingsNotify = 0xFFF1,
    /// Pairing key (write with response).
    Pair = 0xFFF2,
    /// Stored history (read). Recognised but unused.
    History = 0xFFF3,
    /// Realtime probe temperatures (notify).
    RealtimeTempNotify = 0xFFF4,
    /// Settings commands (write without response).
    SettingsUpdate = 0xFFF5,
}

impl CharacteristicRole {
    /// All roles, in identifier order.
    pub const ALL: [Self; 5] = [
        Self::SettingsNotify,
        Self::Pair,
        Self::History,
        Self::RealtimeTempNotify,
        Self::SettingsUpdate,
    ];

    /// Roles a session cannot work without.
    pub const REQUIRED: [Self; 4] = [
        Self::SettingsNotify,
        Self::Pair,
        Self::RealtimeTempNotify,
        Self::SettingsUpdate,
    ];

    /// Create from the 16-bit short identifier.
    pub fn from_short(value: u16) -> Option<Self> {
        match value {
            0xFFF1 => Some(Self::SettingsNotify),
            0xFFF2 => Some(Self::Pair),
            0xFFF3 => Some(Self::History),
            0xFFF4 => Some(Self::RealtimeTempNotify),
            0xFFF5 => Some(Self::SettingsUpdate),
            _ => None,
        }
    }

    /// Derive the role from a full 128-bit characteristic UUID.
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        let (time_low, _, _, _) = uuid.as_fields();
        Self::from_short((time_low & 0xFFFF) as u16)
    }

    /// The 16-bit short identifier.
    pub fn short(&self) -> u16 {
        *self as u16
    }

    /// The canonical Bluetooth-base UUID for this role.
    pub fn uuid(&self) -> Uuid {
        Uuid::from_u128(((self.short() as u128) << 96) | 0x0000_1000_8000_00805f9b34fb)
    }
}

impl std::fmt::Display for CharacteristicRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SettingsNotify => "SettingsNotify",
            Self::Pair => "Pair",
            Self::History => "History",
            Self::RealtimeTempNotify => "RealtimeTempNotify",
            Self::SettingsUpdate => "SettingsUpdate",
        };
        write!(f, "{} ({:#06X})", name, self.short())
    }
}
