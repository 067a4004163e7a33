//! WiFi radio driver for ESP32.
//!
//! Implements [`NetworkDriver`] on top of `EspWifi`. Association is started
//! without blocking; the provisioner in `feeder-core` polls [`is_connected`]
//! with its own retry policy. The access point runs in mixed mode so the
//! setup page can still scan for networks.
//!
//! [`is_connected`]: NetworkDriver::is_connected

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, peripheral},
    nvs::EspDefaultNvsPartition,
    sntp::EspSntp,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi,
    },
};
use feeder_core::{NetworkDriver, NetworkError, ScannedNetwork};
use log::{info, warn};

pub struct EspNetwork {
    wifi: BlockingWifi<EspWifi<'static>>,
    sntp: Option<EspSntp<'static>>,
}

impl EspNetwork {
    pub fn new(
        modem: impl peripheral::Peripheral<P = Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self { wifi, sntp: None })
    }

    /// Stop the radio before a light sleep.
    pub fn suspend(&mut self) -> Result<(), NetworkError> {
        if self.wifi.is_started().map_err(driver_error)? {
            self.wifi.stop().map_err(driver_error)?;
        }
        Ok(())
    }

    fn restart_with(&mut self, configuration: &Configuration) -> Result<(), NetworkError> {
        if self.wifi.is_started().map_err(driver_error)? {
            self.wifi.stop().map_err(driver_error)?;
        }
        self.wifi.set_configuration(configuration).map_err(driver_error)?;
        self.wifi.start().map_err(driver_error)
    }
}

impl NetworkDriver for EspNetwork {
    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        let auth_method = if password.is_empty() {
            info!("WiFi password is empty, using open network");
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        self.restart_with(&Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| {
                NetworkError::InvalidCredentials("SSID too long (max 32 chars)".to_string())
            })?,
            password: password.try_into().map_err(|_| {
                NetworkError::InvalidCredentials("Password too long (max 64 chars)".to_string())
            })?,
            auth_method,
            ..Default::default()
        }))?;

        info!("Connecting to '{}'...", ssid);
        // Non-blocking: completion is observed through is_connected().
        self.wifi.wifi_mut().connect().map_err(driver_error)
    }

    fn is_connected(&mut self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        let access_point = AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| NetworkError::InvalidCredentials("AP SSID too long".to_string()))?,
            password: password
                .try_into()
                .map_err(|_| NetworkError::InvalidCredentials("AP password too long".to_string()))?,
            auth_method: AuthMethod::WPA2Personal,
            channel: 1,
            max_connections: 4,
            ..Default::default()
        };
        self.restart_with(&Configuration::Mixed(ClientConfiguration::default(), access_point))?;

        match self.wifi.wifi().ap_netif().get_ip_info() {
            Ok(ip_info) => info!("AP started at http://{}", ip_info.ip),
            Err(e) => warn!("AP started, address unknown: {}", e),
        }
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ScannedNetwork>, NetworkError> {
        if !self.wifi.is_started().map_err(driver_error)? {
            self.wifi.start().map_err(driver_error)?;
        }
        let ap_infos = self.wifi.scan().map_err(driver_error)?;
        Ok(ap_infos
            .into_iter()
            .map(|ap| ScannedNetwork {
                ssid: ap.ssid.to_string(),
                rssi: ap.signal_strength,
                encrypted: !matches!(ap.auth_method, None | Some(AuthMethod::None)),
            })
            .collect())
    }

    fn station_ip(&self) -> Option<String> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|ip_info| ip_info.ip.to_string())
    }

    fn start_time_sync(&mut self) -> Result<(), NetworkError> {
        if self.sntp.is_none() {
            self.sntp = Some(EspSntp::new_default().map_err(driver_error)?);
            info!("SNTP started");
        }
        Ok(())
    }
}

fn driver_error(e: impl std::fmt::Display) -> NetworkError {
    NetworkError::Driver(e.to_string())
}
