//! HTTP message types.
//!
//! This module defines the JSON documents exchanged over the feeder's HTTP API:
//! - `GET /api/status` → [`StatusResponse`]
//! - `GET /api/scanWiFi` → `Vec<ScanRecord>`
//! - `setFeedTimes?data=` payload records → [`FeedTimeRecord`]
//!
//! Field names are camelCase to stay compatible with the existing web page.

use feeder_core::{
    BatteryReading, FeedSlot, FeederSnapshot, NetworkSnapshot, RawSlotInput, ScannedNetwork,
};
use serde::{Deserialize, Serialize};

/// Placeholder shown for the clock before time sync.
pub const UNSYNCED_TIME: &str = "--:--";

/// One schedule slot on the wire.
///
/// Missing fields are left as `None` and take the slot defaults when
/// converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTimeRecord {
    #[serde(alias = "hour")]
    pub h: Option<i64>,
    #[serde(alias = "minute")]
    pub m: Option<i64>,
    #[serde(alias = "repeats")]
    pub r: Option<i64>,
}

impl From<&FeedSlot> for FeedTimeRecord {
    fn from(slot: &FeedSlot) -> Self {
        Self {
            h: Some(i64::from(slot.hour)),
            m: Some(i64::from(slot.minute)),
            r: Some(i64::from(slot.repeat_count)),
        }
    }
}

impl From<FeedTimeRecord> for RawSlotInput {
    fn from(record: FeedTimeRecord) -> Self {
        RawSlotInput {
            hour: record.h,
            minute: record.m,
            repeat_count: record.r,
        }
    }
}

/// A slot as reported in the status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub h: u8,
    pub m: u8,
    pub r: u32,
}

impl From<&FeedSlot> for SlotRecord {
    fn from(slot: &FeedSlot) -> Self {
        Self {
            h: slot.hour,
            m: slot.minute,
            r: slot.repeat_count,
        }
    }
}

/// `GET /api/status` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub current_angle: u8,
    pub speed: f32,
    pub feed_repeats: u32,
    pub power_save_mode: bool,
    /// Volts, two decimals.
    pub battery_voltage: f64,
    /// Whole percent.
    pub battery_percent: i32,

    /// Minutes until the next feeding, `-1` when the clock is unsynced.
    pub next_feed_minutes: i32,
    pub next_feed_hour: i32,
    pub next_feed_minute: i32,

    pub feed_times: Vec<SlotRecord>,

    // Legacy two-slot fields for older pages.
    pub feed_hour1: u8,
    pub feed_minute1: u8,
    pub feed_hour2: u8,
    pub feed_minute2: u8,
    pub feed_repeats1: u32,
    pub feed_repeats2: u32,

    /// `"HH:MM"` local time, or `"--:--"` before time sync.
    pub current_time: String,
    #[serde(rename = "wifiSSID")]
    pub wifi_ssid: String,
    #[serde(rename = "isAPMode")]
    pub is_ap_mode: bool,
    #[serde(rename = "wifiIP")]
    pub wifi_ip: String,
}

impl StatusResponse {
    pub fn new(
        feeder: &FeederSnapshot,
        battery: Option<BatteryReading>,
        network: &NetworkSnapshot,
    ) -> Self {
        let battery = battery.unwrap_or_default();
        let (next_minutes, next_hour, next_minute) = match feeder.next_feed {
            Some(next) => (
                i32::from(next.minutes_until),
                i32::from(next.hour),
                i32::from(next.minute),
            ),
            None => (-1, -1, -1),
        };
        let [first, second] = feeder.legacy.slots();

        Self {
            status: "ok".to_string(),
            current_angle: feeder.current_angle,
            speed: feeder.speed,
            feed_repeats: feeder.feed_repeats,
            power_save_mode: feeder.power_save,
            battery_voltage: round_to(f64::from(battery.voltage), 2),
            battery_percent: f64::from(battery.percent).round() as i32,
            next_feed_minutes: next_minutes,
            next_feed_hour: next_hour,
            next_feed_minute: next_minute,
            feed_times: feeder.slots.iter().map(SlotRecord::from).collect(),
            feed_hour1: first.hour,
            feed_minute1: first.minute,
            feed_hour2: second.hour,
            feed_minute2: second.minute,
            feed_repeats1: first.repeat_count,
            feed_repeats2: second.repeat_count,
            current_time: feeder
                .current_time
                .map(|t| t.display())
                .unwrap_or_else(|| UNSYNCED_TIME.to_string()),
            wifi_ssid: network.ssid.clone(),
            is_ap_mode: network.ap_mode,
            wifi_ip: network.ip.clone(),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// One entry of the `GET /api/scanWiFi` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub ssid: String,
    pub rssi: i8,
    pub encrypted: bool,
}

impl From<ScannedNetwork> for ScanRecord {
    fn from(network: ScannedNetwork) -> Self {
        Self {
            ssid: network.ssid,
            rssi: network.rssi,
            encrypted: network.encrypted,
        }
    }
}

/// Plain-text acknowledgements.
pub mod replies {
    pub const OK: &str = "ok";
    pub const FEEDING: &str = "feeding";
    pub const MISSING_WIFI_PARAMS: &str = "Missing ssid or password";
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_core::{LegacyPair, NextFeed, WallTime};

    fn snapshot() -> FeederSnapshot {
        let slots = vec![FeedSlot::new(8, 0, 2)];
        FeederSnapshot {
            current_angle: 0,
            speed: 20.0,
            feed_repeats: 1,
            power_save: true,
            busy: false,
            legacy: LegacyPair {
                first: slots[0],
                second: FeedSlot::legacy_placeholder(),
            },
            slots,
            next_feed: Some(NextFeed {
                hour: 8,
                minute: 0,
                minutes_until: 90,
            }),
            current_time: Some(WallTime::new(6, 30)),
        }
    }

    #[test]
    fn test_status_fields() {
        let network = NetworkSnapshot {
            ssid: "Home".to_string(),
            ap_mode: false,
            ip: "192.168.1.50".to_string(),
        };
        let battery = BatteryReading {
            voltage: 7.5371,
            percent: 52.06,
        };
        let status = StatusResponse::new(&snapshot(), Some(battery), &network);
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["status"], "ok");
        assert_eq!(json["nextFeedMinutes"], 90);
        assert_eq!(json["feedTimes"], serde_json::json!([{"h": 8, "m": 0, "r": 2}]));
        assert_eq!(json["feedHour1"], 8);
        assert_eq!(json["feedRepeats1"], 2);
        assert_eq!(json["feedHour2"], 0);
        assert_eq!(json["feedRepeats2"], 1);
        assert_eq!(json["currentTime"], "06:30");
        assert_eq!(json["wifiSSID"], "Home");
        assert_eq!(json["isAPMode"], false);
        assert_eq!(json["wifiIP"], "192.168.1.50");
        assert_eq!(json["batteryVoltage"], 7.54);
        assert_eq!(json["batteryPercent"], 52);
        assert_eq!(json["powerSaveMode"], true);
    }

    #[test]
    fn test_status_before_time_sync() {
        let mut snapshot = snapshot();
        snapshot.next_feed = None;
        snapshot.current_time = None;

        let status = StatusResponse::new(&snapshot, None, &NetworkSnapshot::default());
        assert_eq!(status.next_feed_minutes, -1);
        assert_eq!(status.next_feed_hour, -1);
        assert_eq!(status.next_feed_minute, -1);
        assert_eq!(status.current_time, "--:--");
        assert_eq!(status.battery_voltage, 0.0);
    }

    #[test]
    fn test_feed_time_record_aliases() {
        let record: FeedTimeRecord = serde_json::from_str(r#"{"hour": 7, "minute": 15}"#).unwrap();
        assert_eq!(
            record,
            FeedTimeRecord {
                h: Some(7),
                m: Some(15),
                r: None
            }
        );
        let slot = RawSlotInput::from(record).into_slot();
        assert_eq!((slot.hour, slot.minute, slot.repeat_count), (7, 15, 1));
    }
}
