//! Integration tests for the feeder host.
//!
//! These tests start the owner thread with a manual clock and recording
//! servo, then drive it through `FeederHandle` the way the HTTP layer does.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use embedded_hal::delay::DelayNs;
use feeder_core::actuator::{NoopDelay, RecordingActuator, StdDelay};
use feeder_core::schedule::keys;
use feeder_core::{ManualClock, MemorySettings, RawSlotInput, SettingsStorage};
use feeder_server::sim::{SimulatedBattery, SimulatedButton, SimulatedNetwork};
use feeder_server::{FeederHandle, FeederServer, Hardware, ServerConfig};

struct TestFeeder {
    handle: FeederHandle,
    clock: Arc<ManualClock>,
    servo: RecordingActuator,
    button: SimulatedButton,
    storage: Arc<MemorySettings>,
    thread: std::thread::JoinHandle<()>,
}

fn start_with_delay<D>(clock: ManualClock, delay: D) -> TestFeeder
where
    D: DelayNs + Clone + Send + 'static,
{
    let clock = Arc::new(clock);
    let servo = RecordingActuator::new();
    let button = SimulatedButton::new();
    let storage = Arc::new(MemorySettings::new());

    let config = ServerConfig {
        poll_interval: Duration::from_millis(1),
        ..ServerConfig::default()
    };
    let hardware = Hardware {
        actuator: Box::new(servo.clone()),
        battery: Box::new(SimulatedBattery::default()),
        network: Box::new(SimulatedNetwork::with_network("Home")),
        button: Box::new(button.clone()),
        clock: clock.clone(),
        delay,
    };

    let (handle, thread) = FeederServer::new(config, storage.clone(), hardware)
        .spawn()
        .expect("feeder should start");

    TestFeeder {
        handle,
        clock,
        servo,
        button,
        storage,
        thread,
    }
}

/// Clock at 06:30 UTC, which is 08:30 local with the default offset.
fn start() -> TestFeeder {
    start_with_delay(ManualClock::at(2024, 5, 1, 6, 30), NoopDelay::default())
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_status_of_fresh_device() {
    let feeder = start();
    let status = feeder.handle.status().await.unwrap();

    assert_eq!(status.status, "ok");
    // Nothing stored: one default slot migrated from the legacy keys.
    assert_eq!(status.feed_times.len(), 1);
    assert_eq!((status.feed_times[0].h, status.feed_times[0].m), (10, 0));
    assert_eq!((status.feed_hour1, status.feed_hour2), (10, 0));
    assert_eq!(status.current_time, "08:30");
    assert_eq!(status.next_feed_minutes, 90);
    assert_eq!((status.next_feed_hour, status.next_feed_minute), (10, 0));
    assert_eq!(status.current_angle, 0);
    assert!(status.is_ap_mode);
    assert_eq!(status.wifi_ip, "");
    assert!(status.battery_voltage > 0.0);
}

#[tokio::test]
async fn test_unsynced_clock_reports_unknown() {
    let feeder = start_with_delay(ManualClock::unsynced(), NoopDelay::default());
    let status = feeder.handle.status().await.unwrap();

    assert_eq!(status.current_time, "--:--");
    assert_eq!(status.next_feed_minutes, -1);
    assert_eq!(status.next_feed_hour, -1);
}

#[tokio::test]
async fn test_schedule_fires_when_clock_reaches_slot() {
    let feeder = start();
    feeder
        .handle
        .replace_schedule(vec![RawSlotInput::new(8, 31, 2)])
        .await
        .unwrap();

    let status = feeder.handle.status().await.unwrap();
    assert_eq!(status.next_feed_minutes, 1);
    assert_eq!(feeder.servo.visits(180), 0);

    feeder.clock.advance(ChronoDuration::minutes(1));
    assert!(eventually(|| feeder.servo.visits(180) == 2).await);

    // Still 08:31: the slot does not fire again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(feeder.servo.visits(180), 2);
}

#[tokio::test]
async fn test_schedule_is_persisted() {
    let feeder = start();
    feeder
        .handle
        .replace_schedule(vec![RawSlotInput::new(7, 0, 1), RawSlotInput::new(19, 30, 3)])
        .await
        .unwrap();

    assert_eq!(feeder.storage.get_i32(keys::SLOT_COUNT).unwrap(), Some(2));
    assert_eq!(feeder.storage.get_i32(&keys::slot_minute(1)).unwrap(), Some(30));
    assert_eq!(feeder.storage.get_i32(keys::LEGACY_REPEATS_2).unwrap(), Some(3));
}

#[tokio::test]
async fn test_feed_now_uses_configured_repeats() {
    let feeder = start();
    feeder.handle.set_repeats(3).await.unwrap();
    feeder.handle.feed_now().await.unwrap();

    assert!(eventually(|| feeder.servo.visits(180) == 3).await);
    assert_eq!(feeder.handle.status().await.unwrap().feed_repeats, 3);
}

#[tokio::test]
async fn test_button_press_feeds_once() {
    let feeder = start();
    feeder.handle.set_repeats(4).await.unwrap();

    feeder.button.set_pressed(true);
    assert!(eventually(|| feeder.servo.visits(180) == 1).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(feeder.servo.visits(180), 1);
    feeder.button.set_pressed(false);
}

#[tokio::test]
async fn test_settings_are_clamped() {
    let feeder = start();
    feeder.handle.set_speed(99.0).await.unwrap();
    feeder.handle.set_repeats(-2).await.unwrap();
    feeder.handle.set_power_save(false).await.unwrap();

    let status = feeder.handle.status().await.unwrap();
    assert_eq!(status.speed, 20.0);
    assert_eq!(status.feed_repeats, 1);
    assert!(!status.power_save_mode);
}

#[tokio::test]
async fn test_set_angle_moves_servo() {
    let feeder = start();
    assert!(feeder.handle.set_angle(120).await.unwrap());
    assert_eq!(feeder.handle.status().await.unwrap().current_angle, 120);
}

#[tokio::test]
async fn test_set_angle_rejected_while_dispensing() {
    let feeder = start_with_delay(ManualClock::at(2024, 5, 1, 6, 30), StdDelay);
    // Slowest speed: about 5 ms per degree, so one cycle takes seconds.
    feeder.handle.set_speed(1.0).await.unwrap();
    feeder.handle.feed_now().await.unwrap();

    assert!(eventually(|| feeder.handle.is_busy()).await);
    assert!(!feeder.handle.set_angle(90).await.unwrap());
}

#[tokio::test]
async fn test_wifi_provisioning() {
    let feeder = start();
    let networks = feeder.handle.scan_wifi().await.unwrap();
    assert_eq!(networks[0].ssid, "Home");

    feeder
        .handle
        .set_wifi("Home".to_string(), "secret".to_string())
        .await
        .unwrap();
    let status = feeder.handle.status().await.unwrap();
    assert!(!status.is_ap_mode);
    assert_eq!(status.wifi_ssid, "Home");
    assert_eq!(status.wifi_ip, "127.0.0.1");
    assert_eq!(
        feeder.storage.get_string("wifiSSID").unwrap().as_deref(),
        Some("Home")
    );

    feeder.handle.forget_wifi().await.unwrap();
    let status = feeder.handle.status().await.unwrap();
    assert!(status.is_ap_mode);
    assert_eq!(status.wifi_ssid, "");
    assert!(!feeder.storage.contains("wifiSSID").unwrap());
}

#[tokio::test]
async fn test_unreachable_network_falls_back_to_access_point() {
    let feeder = start();
    feeder
        .handle
        .set_wifi("Elsewhere".to_string(), String::new())
        .await
        .unwrap();
    feeder.handle.reconnect_wifi().await.unwrap();

    let status = feeder.handle.status().await.unwrap();
    assert!(status.is_ap_mode);
    assert_eq!(status.wifi_ssid, "Elsewhere");
}

#[tokio::test]
async fn test_loop_stops_when_handles_dropped() {
    let TestFeeder { handle, thread, .. } = start();
    let clone = handle.clone();
    drop(handle);
    drop(clone);

    let joined = tokio::task::spawn_blocking(move || thread.join()).await.unwrap();
    assert!(joined.is_ok());
}
