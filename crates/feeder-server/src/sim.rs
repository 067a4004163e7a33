//! Simulated hardware for running the feeder on a desktop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use feeder_core::{
    Actuator, ActuatorError, BatterySensor, Button, NetworkDriver, NetworkError, ScannedNetwork,
};
use tracing::{debug, info};

/// A servo that only remembers its angle.
#[derive(Debug, Clone, Default)]
pub struct SimulatedServo {
    angle: Arc<Mutex<u8>>,
}

impl SimulatedServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angle(&self) -> u8 {
        self.angle.lock().map(|a| *a).unwrap_or_default()
    }
}

impl Actuator for SimulatedServo {
    fn set_angle(&mut self, angle: u8) -> Result<(), ActuatorError> {
        let mut current = self.angle.lock().map_err(|_| ActuatorError::Drive {
            angle,
            message: "servo state poisoned".to_string(),
        })?;
        *current = angle;
        Ok(())
    }
}

/// A battery that slowly drains, one raw count per read, down to a floor.
#[derive(Debug, Clone)]
pub struct SimulatedBattery {
    raw: u16,
    floor: u16,
}

impl SimulatedBattery {
    pub fn new(raw: u16, floor: u16) -> Self {
        Self { raw, floor }
    }
}

impl Default for SimulatedBattery {
    /// Roughly a full 2S pack with the default divider calibration.
    fn default() -> Self {
        Self::new(3500, 2800)
    }
}

impl BatterySensor for SimulatedBattery {
    fn read_raw(&mut self) -> Option<u16> {
        let raw = self.raw;
        self.raw = self.raw.saturating_sub(1).max(self.floor);
        Some(raw)
    }
}

/// A button that can be held down from another thread.
#[derive(Debug, Clone, Default)]
pub struct SimulatedButton {
    pressed: Arc<AtomicBool>,
}

impl SimulatedButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pressed(&self, pressed: bool) {
        self.pressed.store(pressed, Ordering::Release);
    }
}

impl Button for SimulatedButton {
    fn is_pressed(&mut self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }
}

/// Radio that can see a fixed list of networks and joins any of them.
#[derive(Debug, Clone, Default)]
pub struct SimulatedNetwork {
    visible: Vec<ScannedNetwork>,
    joined: Option<String>,
    access_point: Option<String>,
}

impl SimulatedNetwork {
    pub fn new(visible: Vec<ScannedNetwork>) -> Self {
        Self {
            visible,
            ..Default::default()
        }
    }

    /// A network list with a single open network.
    pub fn with_network(ssid: &str) -> Self {
        Self::new(vec![ScannedNetwork {
            ssid: ssid.to_string(),
            rssi: -55,
            encrypted: true,
        }])
    }
}

impl NetworkDriver for SimulatedNetwork {
    fn begin_station(&mut self, ssid: &str, _password: &str) -> Result<(), NetworkError> {
        self.access_point = None;
        self.joined = self
            .visible
            .iter()
            .any(|n| n.ssid == ssid)
            .then(|| ssid.to_string());
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.joined.is_some()
    }

    fn start_access_point(&mut self, ssid: &str, _password: &str) -> Result<(), NetworkError> {
        self.joined = None;
        self.access_point = Some(ssid.to_string());
        info!("Simulated access point '{}' up", ssid);
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ScannedNetwork>, NetworkError> {
        Ok(self.visible.clone())
    }

    fn station_ip(&self) -> Option<String> {
        self.joined.as_ref().map(|_| "127.0.0.1".to_string())
    }

    fn start_time_sync(&mut self) -> Result<(), NetworkError> {
        debug!("Using host clock, nothing to sync");
        Ok(())
    }
}
