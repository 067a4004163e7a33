//! WiFi provisioning.
//!
//! On boot the device joins the stored network. If it cannot, or if no
//! network is stored, it opens its own access point so the owner can enter
//! credentials from a phone. The radio itself is behind [`NetworkDriver`];
//! [`WifiProvisioner`] holds the policy.

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::WifiConfig;
use crate::storage::{SettingsStorage, StorageError};

pub mod keys {
    pub const SSID: &str = "wifiSSID";
    pub const PASSWORD: &str = "wifiPassword";
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("WiFi driver error: {0}")]
    Driver(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// A network found by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedNetwork {
    pub ssid: String,
    pub rssi: i8,
    pub encrypted: bool,
}

/// Radio operations needed for provisioning.
pub trait NetworkDriver: Send {
    /// Switch to station mode and start associating. Does not wait.
    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError>;

    /// Whether the station link is up with an address.
    fn is_connected(&mut self) -> bool;

    /// Switch to access-point mode with the given credentials.
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError>;

    fn scan(&mut self) -> Result<Vec<ScannedNetwork>, NetworkError>;

    /// Station address, if connected.
    fn station_ip(&self) -> Option<String>;

    /// Start wall-clock synchronization once a station link is up.
    fn start_time_sync(&mut self) -> Result<(), NetworkError>;
}

impl<N: NetworkDriver + ?Sized> NetworkDriver for Box<N> {
    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        (**self).begin_station(ssid, password)
    }
    fn is_connected(&mut self) -> bool {
        (**self).is_connected()
    }
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        (**self).start_access_point(ssid, password)
    }
    fn scan(&mut self) -> Result<Vec<ScannedNetwork>, NetworkError> {
        (**self).scan()
    }
    fn station_ip(&self) -> Option<String> {
        (**self).station_ip()
    }
    fn start_time_sync(&mut self) -> Result<(), NetworkError> {
        (**self).start_time_sync()
    }
}

/// Current radio role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WifiMode {
    #[default]
    Offline,
    Station,
    AccessPoint,
}

/// Network fields reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkSnapshot {
    pub ssid: String,
    pub ap_mode: bool,
    /// Empty unless connected as a station.
    pub ip: String,
}

/// Stored network credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    /// Load stored credentials, or the factory ones when nothing is stored.
    pub fn load<S: SettingsStorage + ?Sized>(
        storage: &S,
        config: &WifiConfig,
    ) -> Result<Self, StorageError> {
        let ssid = storage.get_string(keys::SSID)?.unwrap_or_default();
        if !ssid.is_empty() {
            let password = storage.get_string(keys::PASSWORD)?.unwrap_or_default();
            return Ok(Self { ssid, password });
        }
        Ok(Self {
            ssid: config.factory_ssid.clone().unwrap_or_default(),
            password: config.factory_password.clone().unwrap_or_default(),
        })
    }
}

/// Connect-or-fallback policy around a [`NetworkDriver`].
pub struct WifiProvisioner<N, D> {
    driver: N,
    delay: D,
    config: WifiConfig,
    credentials: Credentials,
    mode: WifiMode,
}

impl<N: NetworkDriver, D: DelayNs> WifiProvisioner<N, D> {
    pub fn new(driver: N, delay: D, config: WifiConfig) -> Self {
        Self {
            driver,
            delay,
            config,
            credentials: Credentials::default(),
            mode: WifiMode::Offline,
        }
    }

    pub fn mode(&self) -> WifiMode {
        self.mode
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn driver(&self) -> &N {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut N {
        &mut self.driver
    }

    /// Boot sequence: load credentials, then connect or open the access point.
    pub fn start<S: SettingsStorage + ?Sized>(
        &mut self,
        storage: &S,
    ) -> Result<WifiMode, NetworkError> {
        self.credentials = match Credentials::load(storage, &self.config) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Failed to load WiFi credentials: {}", e);
                Credentials::default()
            }
        };
        self.connect_or_fallback()
    }

    /// Try the stored network, falling back to the access point.
    ///
    /// Blocks for up to `connect_attempts * connect_interval_ms`.
    pub fn connect_or_fallback(&mut self) -> Result<WifiMode, NetworkError> {
        if self.try_station()? {
            if self.mode != WifiMode::Station {
                self.mode = WifiMode::Station;
                if let Err(e) = self.driver.start_time_sync() {
                    warn!("Failed to start time sync: {}", e);
                }
            }
            info!(
                ssid = %self.credentials.ssid,
                ip = %self.driver.station_ip().unwrap_or_default(),
                "WiFi connected"
            );
            return Ok(self.mode);
        }
        self.start_access_point()
    }

    /// Store new credentials and reconnect with them.
    pub fn set_credentials<S: SettingsStorage + ?Sized>(
        &mut self,
        storage: &S,
        ssid: &str,
        password: &str,
    ) -> Result<WifiMode, NetworkError> {
        if ssid.is_empty() {
            return Err(NetworkError::InvalidCredentials("SSID cannot be empty".to_string()));
        }
        if let Err(e) = storage
            .put_string(keys::SSID, ssid)
            .and_then(|_| storage.put_string(keys::PASSWORD, password))
        {
            warn!("Failed to store WiFi credentials: {}", e);
        }
        self.credentials = Credentials {
            ssid: ssid.to_string(),
            password: password.to_string(),
        };
        self.connect_or_fallback()
    }

    /// Remove stored credentials and switch to the access point.
    pub fn forget<S: SettingsStorage + ?Sized>(
        &mut self,
        storage: &S,
    ) -> Result<WifiMode, NetworkError> {
        for key in [keys::SSID, keys::PASSWORD] {
            if let Err(e) = storage.remove(key) {
                warn!("Failed to remove {}: {}", key, e);
            }
        }
        self.credentials = Credentials::default();
        self.start_access_point()
    }

    /// Restore the previous role after a light sleep.
    pub fn resume(&mut self) -> Result<WifiMode, NetworkError> {
        match self.mode {
            WifiMode::AccessPoint => self.start_access_point(),
            WifiMode::Station | WifiMode::Offline => self.connect_or_fallback(),
        }
    }

    pub fn scan(&mut self) -> Result<Vec<ScannedNetwork>, NetworkError> {
        let networks = self.driver.scan()?;
        debug!(count = networks.len(), "WiFi scan complete");
        Ok(networks)
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let ap_mode = self.mode == WifiMode::AccessPoint;
        let ip = if self.mode == WifiMode::Station {
            self.driver.station_ip().unwrap_or_default()
        } else {
            String::new()
        };
        NetworkSnapshot {
            ssid: self.credentials.ssid.clone(),
            ap_mode,
            ip,
        }
    }

    fn try_station(&mut self) -> Result<bool, NetworkError> {
        if self.credentials.ssid.is_empty() {
            debug!("No WiFi credentials stored");
            return Ok(false);
        }
        info!(ssid = %self.credentials.ssid, "Connecting to WiFi");
        if let Err(e) = self
            .driver
            .begin_station(&self.credentials.ssid, &self.credentials.password)
        {
            warn!("Failed to start station mode: {}", e);
            return Ok(false);
        }
        for _ in 0..self.config.connect_attempts {
            if self.driver.is_connected() {
                return Ok(true);
            }
            self.delay.delay_ms(self.config.connect_interval_ms);
        }
        let connected = self.driver.is_connected();
        if !connected {
            warn!(ssid = %self.credentials.ssid, "Failed to connect to WiFi");
        }
        Ok(connected)
    }

    fn start_access_point(&mut self) -> Result<WifiMode, NetworkError> {
        info!(ssid = %self.config.ap_ssid, "Starting access point");
        self.driver
            .start_access_point(&self.config.ap_ssid, &self.config.ap_password)?;
        self.mode = WifiMode::AccessPoint;
        Ok(self.mode)
    }
}

impl<N, D> std::fmt::Debug for WifiProvisioner<N, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiProvisioner")
            .field("ssid", &self.credentials.ssid)
            .field("mode", &self.mode)
            .finish()
    }
}
