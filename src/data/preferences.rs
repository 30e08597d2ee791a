//! Display unit preference.
//!
//! Temperatures are always stored and exchanged in Celsius. The unit only
//! decides how the thermometer's own screen and the viewers render them.

use serde::{Deserialize, Serialize};

use crate::utils::celsius_to_fahrenheit;

/// Temperature display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    /// Degrees Celsius.
    #[serde(rename = "C")]
    Celsius,
    /// Degrees Fahrenheit.
    #[default]
    #[serde(rename = "F")]
    Fahrenheit,
}

impl Unit {
    /// Create from the single-letter form used by viewers and config files.
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "C" | "c" => Some(Self::Celsius),
            "F" | "f" => Some(Self::Fahrenheit),
            _ => None,
        }
    }

    /// Single-letter form.
    pub fn letter(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }

    /// Raw value the device expects in a set-unit command.
    pub fn to_raw(&self) -> u8 {
        match self {
            Self::Celsius => 0x00,
            Self::Fahrenheit => 0x01,
        }
    }

    /// Render a Celsius value in this unit.
    pub fn present(&self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius_to_fahrenheit(celsius),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}
