//! Runtime-adjustable device settings.

use crate::actuator::{MAX_SPEED, MIN_SPEED};
use crate::storage::{SettingsStorage, StorageError};

pub mod keys {
    pub const SPEED: &str = "speed";
    pub const FEED_REPEATS: &str = "feedRepeats";
    pub const POWER_SAVE: &str = "powerSaveMode";
}

/// Settings changed through the HTTP API and kept across restarts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    /// Servo sweep speed, `1..=20`.
    pub speed: f32,
    /// Repeats used by manual "feed now" requests.
    pub feed_repeats: u32,
    /// Whether the device may light-sleep while idle.
    pub power_save: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            speed: MAX_SPEED,
            feed_repeats: 1,
            power_save: true,
        }
    }
}

impl DeviceSettings {
    /// Load settings, using defaults for anything missing and clamping
    /// anything out of range.
    pub fn load<S: SettingsStorage + ?Sized>(storage: &S) -> Result<Self, StorageError> {
        let defaults = Self::default();
        let speed = storage.get_f32(keys::SPEED)?.unwrap_or(defaults.speed);
        let feed_repeats = storage
            .get_i32(keys::FEED_REPEATS)?
            .map(|r| r.max(1) as u32)
            .unwrap_or(defaults.feed_repeats);
        let power_save = storage
            .get_bool(keys::POWER_SAVE)?
            .unwrap_or(defaults.power_save);

        Ok(Self {
            speed: clamp_speed(speed),
            feed_repeats,
            power_save,
        })
    }

    pub fn save<S: SettingsStorage + ?Sized>(&self, storage: &S) -> Result<(), StorageError> {
        storage.put_f32(keys::SPEED, self.speed)?;
        storage.put_i32(keys::FEED_REPEATS, self.feed_repeats.min(i32::MAX as u32) as i32)?;
        storage.put_bool(keys::POWER_SAVE, self.power_save)
    }
}

/// Clamp a requested speed to `1..=20`. Non-finite input becomes full speed.
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        MAX_SPEED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySettings;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_when_empty() {
        let storage = MemorySettings::new();
        assert_eq!(DeviceSettings::load(&storage).unwrap(), DeviceSettings::default());
    }

    #[test]
    fn test_round_trip() {
        let storage = MemorySettings::new();
        let settings = DeviceSettings {
            speed: 7.5,
            feed_repeats: 3,
            power_save: false,
        };
        settings.save(&storage).unwrap();
        assert_eq!(DeviceSettings::load(&storage).unwrap(), settings);
    }

    #[test]
    fn test_out_of_range_values_clamped_on_load() {
        let storage = MemorySettings::new();
        storage.put_f32(keys::SPEED, 55.0).unwrap();
        storage.put_i32(keys::FEED_REPEATS, -4).unwrap();

        let settings = DeviceSettings::load(&storage).unwrap();
        assert_eq!(settings.speed, 20.0);
        assert_eq!(settings.feed_repeats, 1);
    }
}
