//! Device configuration.
//!
//! These are the build-time constants of the feeder: servo geometry, battery
//! divider calibration, power-save timings, WiFi retry policy and the
//! fallback access point. They are loaded once at startup (a JSON file on
//! Linux, compiled-in defaults on the ESP32) and never change at runtime.
//! Runtime-adjustable values live in [`crate::settings`].
//!
//! Every field has a default, so a partial file is enough:
//!
//! ```json
//! { "utcOffsetSecs": 3600, "wifi": { "factorySsid": "Aquarium" } }
//! ```

use serde::{Deserialize, Serialize};

use crate::actuator::DispenseProfile;

/// Local time offset from UTC in seconds.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 2 * 3600;

/// Top-level feeder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeederConfig {
    /// Fixed offset applied to the synchronized UTC clock.
    pub utc_offset_secs: i32,
    pub servo: ServoConfig,
    pub battery: BatteryCalibration,
    pub power_save: PowerSaveConfig,
    pub wifi: WifiConfig,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
            servo: ServoConfig::default(),
            battery: BatteryCalibration::default(),
            power_save: PowerSaveConfig::default(),
            wifi: WifiConfig::default(),
        }
    }
}

impl FeederConfig {
    /// Parse a configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Servo geometry and dispense pacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServoConfig {
    /// Rest ("empty") angle.
    pub min_angle: u8,
    /// Dispense angle.
    pub max_angle: u8,
    /// Pause after each leg of a dispense cycle.
    pub pause_ms: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min_angle: 0,
            max_angle: 180,
            pause_ms: 50,
        }
    }
}

impl ServoConfig {
    pub fn profile(&self) -> DispenseProfile {
        DispenseProfile {
            empty_angle: self.min_angle,
            dispense_angle: self.max_angle,
            pause_ms: self.pause_ms,
        }
    }
}

/// Battery sense divider calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatteryCalibration {
    /// ADC reference voltage.
    pub reference_voltage: f32,
    /// Raw reading at the reference voltage.
    pub adc_full_scale: u16,
    /// Resistor divider ratio.
    pub divider_ratio: f32,
    /// Empirical correction factor for the ADC's nonlinearity.
    pub calibration_factor: f32,
    /// Pack voltage reported as 0%.
    pub empty_voltage: f32,
    /// Pack voltage reported as 100%.
    pub full_voltage: f32,
    /// Readings averaged per measurement.
    pub samples: u8,
}

impl Default for BatteryCalibration {
    fn default() -> Self {
        Self {
            reference_voltage: 3.3,
            adc_full_scale: 4095,
            divider_ratio: 5.08,
            calibration_factor: 0.58,
            empty_voltage: 6.6,
            full_voltage: 8.4,
            samples: 16,
        }
    }
}

/// Light-sleep policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerSaveConfig {
    /// Idle time before the device may sleep.
    pub activity_timeout_ms: u64,
    /// Length of one sleep interval.
    pub sleep_interval_ms: u64,
    /// Never sleep when a feeding is this close.
    pub feed_guard_minutes: u16,
}

impl Default for PowerSaveConfig {
    fn default() -> Self {
        Self {
            activity_timeout_ms: 300_000,
            sleep_interval_ms: 60_000,
            feed_guard_minutes: 2,
        }
    }
}

/// Station connect policy and the provisioning access point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WifiConfig {
    /// Connection checks before falling back to the access point.
    pub connect_attempts: u32,
    /// Delay between connection checks.
    pub connect_interval_ms: u32,
    pub ap_ssid: String,
    pub ap_password: String,
    /// Credentials used when none have been stored.
    pub factory_ssid: Option<String>,
    pub factory_password: Option<String>,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 20,
            connect_interval_ms: 500,
            ap_ssid: "FishFeeder-Setup".to_string(),
            ap_password: "12345678".to_string(),
            factory_ssid: None,
            factory_password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = FeederConfig::from_json("{}").unwrap();
        assert_eq!(config, FeederConfig::default());
        assert_eq!(config.utc_offset_secs, 7200);
        assert_eq!(config.wifi.ap_ssid, "FishFeeder-Setup");
    }

    #[test]
    fn test_partial_document() {
        let config = FeederConfig::from_json(
            r#"{"utcOffsetSecs": 3600, "servo": {"maxAngle": 150}, "wifi": {"factorySsid": "Aquarium"}}"#,
        )
        .unwrap();

        assert_eq!(config.utc_offset_secs, 3600);
        assert_eq!(config.servo.max_angle, 150);
        assert_eq!(config.servo.min_angle, 0);
        assert_eq!(config.servo.pause_ms, 50);
        assert_eq!(config.wifi.factory_ssid.as_deref(), Some("Aquarium"));
        assert_eq!(config.wifi.connect_attempts, 20);
        assert_eq!(config.power_save, PowerSaveConfig::default());
    }

    #[test]
    fn test_servo_profile() {
        let profile = ServoConfig::default().profile();
        assert_eq!(profile.empty_angle, 0);
        assert_eq!(profile.dispense_angle, 180);
        assert_eq!(profile.pause_ms, 50);
    }
}
