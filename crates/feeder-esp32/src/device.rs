//! Feeder state shared between the httpd task and the main loop.

use std::sync::Arc;

use esp_idf_hal::delay::Delay;
use esp_idf_svc::systime::EspSystemTime;
use feeder_core::clock::{self, SystemClock};
use feeder_core::{
    BatteryMonitor, BatterySensor, Feeder, FeederConfig, FeederError, PollOutcome, WifiProvisioner,
};
use feeder_protocol::StatusResponse;
use log::{error, warn};

use crate::nvs::NvsSettings;
use crate::servo::LedcServo;
use crate::wifi::EspNetwork;

/// Work queued by HTTP handlers for the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    FeedNow,
    SetWifi { ssid: String, password: String },
    ForgetWifi,
    ReconnectWifi,
}

pub type EspFeeder = Feeder<Arc<NvsSettings>, LedcServo, Delay>;

pub struct Device {
    pub feeder: EspFeeder,
    pub wifi: WifiProvisioner<EspNetwork, Delay>,
    pub battery: BatteryMonitor<Box<dyn BatterySensor>>,
    pub storage: Arc<NvsSettings>,
    utc_offset_secs: i32,
}

impl Device {
    pub fn new(
        storage: Arc<NvsSettings>,
        servo: LedcServo,
        battery: Box<dyn BatterySensor>,
        network: EspNetwork,
        config: &FeederConfig,
    ) -> Result<Self, FeederError> {
        let feeder = Feeder::new(
            storage.clone(),
            servo,
            Delay::new_default(),
            config,
            uptime_ms(),
        )?;
        Ok(Self {
            feeder,
            wifi: WifiProvisioner::new(network, Delay::new_default(), config.wifi.clone()),
            battery: BatteryMonitor::new(battery, config.battery),
            storage,
            utc_offset_secs: config.utc_offset_secs,
        })
    }

    /// One poll cycle with the current wall time.
    pub fn poll(&mut self, button_pressed: bool) -> Result<PollOutcome, FeederError> {
        let now = clock::sample(&SystemClock, self.utc_offset_secs);
        self.feeder.poll(now, button_pressed, uptime_ms())
    }

    pub fn status(&mut self) -> StatusResponse {
        let now = clock::sample(&SystemClock, self.utc_offset_secs);
        let snapshot = self.feeder.snapshot(now);
        let battery = self.battery.measure();
        StatusResponse::new(&snapshot, battery, &self.wifi.snapshot())
    }

    pub fn apply(&mut self, action: DeferredAction) {
        let now_ms = uptime_ms();
        let storage = &*self.storage;
        match action {
            DeferredAction::FeedNow => {
                if let Err(e) = self.feeder.feed_now(now_ms) {
                    error!("Manual feeding failed: {}", e);
                }
            }
            DeferredAction::SetWifi { ssid, password } => {
                self.feeder.record_activity(now_ms);
                if let Err(e) = self.wifi.set_credentials(storage, &ssid, &password) {
                    warn!("Failed to apply WiFi credentials: {}", e);
                }
            }
            DeferredAction::ForgetWifi => {
                self.feeder.record_activity(now_ms);
                if let Err(e) = self.wifi.forget(storage) {
                    warn!("Failed to forget WiFi: {}", e);
                }
            }
            DeferredAction::ReconnectWifi => {
                self.feeder.record_activity(now_ms);
                if let Err(e) = self.wifi.connect_or_fallback() {
                    warn!("WiFi reconnect failed: {}", e);
                }
            }
        }
    }

    pub fn start_wifi(&mut self) {
        if let Err(e) = self.wifi.start(&*self.storage) {
            error!("WiFi startup failed: {}", e);
        }
    }
}

/// Milliseconds since boot.
pub fn uptime_ms() -> u64 {
    EspSystemTime.now().as_millis() as u64
}
