//! Protocol module for parsing and constructing messages.
//!
//! This module contains the implementations for:
//! - Realtime temperature frame decoding
//! - SettingsUpdate command frames and the pairing key
//! - SettingsNotify message decoding

pub mod commands;
pub mod realtime;
pub mod settings;

pub use commands::{
    encode_enable_battery, encode_enable_realtime, encode_pair_key, encode_set_target_temp,
    encode_set_unit, encode_silence_alarm, SettingsCommand, ALL_PROBES, PAIR_KEY,
};
pub use realtime::{
    decode_realtime_frame, decode_temperature, encode_realtime_frame, encode_temperature,
};
pub use settings::{decode_settings_notification, SettingsEvent};
