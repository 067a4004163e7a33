//! Feeder host for tokio applications.
//!
//! This module runs the feeder the same way the firmware does: one thread
//! owns all feeder state and runs the poll loop. Everything else talks to it
//! through [`FeederHandle`], which sends commands over a channel:
//! - Status queries and configuration changes (answered over `oneshot`)
//! - Feed-now and WiFi requests (acknowledged before the work runs)
//!
//! A dispense cycle blocks the owner thread for its whole duration, so
//! commands sent meanwhile wait until it finishes.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use feeder_core::clock;
use feeder_core::{
    Actuator, BatteryMonitor, BatterySensor, BusyFlag, Button, ClockSource, Feeder, FeederConfig,
    FeederError, NetworkDriver, NetworkError, RawSlotInput, ScannedNetwork, SettingsStorage,
    SleepRequest, WifiProvisioner,
};
use feeder_protocol::StatusResponse;

/// Configuration for the feeder host.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API binds to.
    pub bind_addr: SocketAddr,
    /// JSON file holding persisted settings.
    pub settings_path: PathBuf,
    /// Pause between poll cycles.
    pub poll_interval: Duration,
    /// Static web UI served next to the API, if any.
    pub ui_dir: Option<PathBuf>,
    pub feeder: FeederConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            settings_path: PathBuf::from("feeder-settings.json"),
            poll_interval: Duration::from_millis(100),
            ui_dir: None,
            feeder: FeederConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Feeder loop is not running")]
    Stopped,

    #[error(transparent)]
    Feeder(#[from] FeederError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Failed to start feeder thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Commands handled by the owner thread.
#[derive(Debug)]
pub enum FeederCommand {
    Status(oneshot::Sender<StatusResponse>),
    ReplaceSchedule(Vec<RawSlotInput>, oneshot::Sender<Result<(), FeederError>>),
    SetRepeats(i64, oneshot::Sender<Result<(), FeederError>>),
    SetSpeed(f32, oneshot::Sender<Result<(), FeederError>>),
    SetPowerSave(bool, oneshot::Sender<Result<(), FeederError>>),
    SetAngle(i64, oneshot::Sender<Result<bool, FeederError>>),
    FeedNow,
    SetWifi { ssid: String, password: String },
    ForgetWifi,
    ReconnectWifi,
    ScanWifi(oneshot::Sender<Result<Vec<ScannedNetwork>, NetworkError>>),
}

/// Devices the feeder runs on.
pub struct Hardware<D> {
    pub actuator: Box<dyn Actuator>,
    pub battery: Box<dyn BatterySensor>,
    pub network: Box<dyn NetworkDriver>,
    pub button: Box<dyn Button>,
    pub clock: Arc<dyn ClockSource>,
    /// Delay used for servo sweeps and WiFi retries.
    pub delay: D,
}

/// The feeder host.
pub struct FeederServer<D> {
    config: ServerConfig,
    storage: Arc<dyn SettingsStorage>,
    hardware: Hardware<D>,
}

impl<D> FeederServer<D>
where
    D: DelayNs + Clone + Send + 'static,
{
    pub fn new(
        config: ServerConfig,
        storage: Arc<dyn SettingsStorage>,
        hardware: Hardware<D>,
    ) -> Self {
        Self {
            config,
            storage,
            hardware,
        }
    }

    /// Load persisted state and start the owner thread.
    ///
    /// The thread runs until every [`FeederHandle`] has been dropped.
    pub fn spawn(self) -> Result<(FeederHandle, JoinHandle<()>), ServerError> {
        let Self {
            config,
            storage,
            hardware,
        } = self;
        let started = Instant::now();

        let feeder = Feeder::new(
            storage.clone(),
            hardware.actuator,
            hardware.delay.clone(),
            &config.feeder,
            0,
        )?;
        let busy = feeder.busy_flag();

        let owner = Owner {
            feeder,
            battery: BatteryMonitor::new(hardware.battery, config.feeder.battery),
            wifi: WifiProvisioner::new(
                hardware.network,
                hardware.delay,
                config.feeder.wifi.clone(),
            ),
            storage,
            button: hardware.button,
            clock: hardware.clock,
            utc_offset_secs: config.feeder.utc_offset_secs,
            poll_interval: config.poll_interval,
            started,
            sleep_pending: false,
        };

        let (tx, rx) = mpsc::channel(64);
        let thread = thread::Builder::new()
            .name("feeder".to_string())
            .spawn(move || owner.run(rx))?;

        Ok((FeederHandle { tx, busy }, thread))
    }
}

/// Cloneable handle to the owner thread.
#[derive(Debug, Clone)]
pub struct FeederHandle {
    tx: mpsc::Sender<FeederCommand>,
    busy: BusyFlag,
}

impl FeederHandle {
    /// Whether a dispense cycle is running right now.
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub async fn status(&self) -> Result<StatusResponse, ServerError> {
        self.request(FeederCommand::Status).await
    }

    pub async fn replace_schedule(&self, slots: Vec<RawSlotInput>) -> Result<(), ServerError> {
        Ok(self.request(|tx| FeederCommand::ReplaceSchedule(slots, tx)).await??)
    }

    pub async fn set_repeats(&self, repeats: i64) -> Result<(), ServerError> {
        Ok(self.request(|tx| FeederCommand::SetRepeats(repeats, tx)).await??)
    }

    pub async fn set_speed(&self, speed: f32) -> Result<(), ServerError> {
        Ok(self.request(|tx| FeederCommand::SetSpeed(speed, tx)).await??)
    }

    pub async fn set_power_save(&self, enabled: bool) -> Result<(), ServerError> {
        Ok(self.request(|tx| FeederCommand::SetPowerSave(enabled, tx)).await??)
    }

    /// Jump the servo. Returns `false` without queueing anything while a
    /// dispense cycle is running.
    pub async fn set_angle(&self, angle: i64) -> Result<bool, ServerError> {
        if self.busy.is_busy() {
            debug!(angle, "Dispenser busy, ignoring angle request");
            return Ok(false);
        }
        Ok(self.request(|tx| FeederCommand::SetAngle(angle, tx)).await??)
    }

    /// Queue a manual feeding. Returns once queued, not once dispensed.
    pub async fn feed_now(&self) -> Result<(), ServerError> {
        self.send(FeederCommand::FeedNow).await
    }

    pub async fn set_wifi(&self, ssid: String, password: String) -> Result<(), ServerError> {
        self.send(FeederCommand::SetWifi { ssid, password }).await
    }

    pub async fn forget_wifi(&self) -> Result<(), ServerError> {
        self.send(FeederCommand::ForgetWifi).await
    }

    pub async fn reconnect_wifi(&self) -> Result<(), ServerError> {
        self.send(FeederCommand::ReconnectWifi).await
    }

    pub async fn scan_wifi(&self) -> Result<Vec<ScannedNetwork>, ServerError> {
        Ok(self.request(FeederCommand::ScanWifi).await??)
    }

    async fn send(&self, command: FeederCommand) -> Result<(), ServerError> {
        self.tx.send(command).await.map_err(|_| ServerError::Stopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> FeederCommand,
    ) -> Result<T, ServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        reply_rx.await.map_err(|_| ServerError::Stopped)
    }
}

/// State owned by the feeder thread.
struct Owner<D> {
    feeder: Feeder<Arc<dyn SettingsStorage>, Box<dyn Actuator>, D>,
    battery: BatteryMonitor<Box<dyn BatterySensor>>,
    wifi: WifiProvisioner<Box<dyn NetworkDriver>, D>,
    storage: Arc<dyn SettingsStorage>,
    button: Box<dyn Button>,
    clock: Arc<dyn ClockSource>,
    utc_offset_secs: i32,
    poll_interval: Duration,
    started: Instant,
    sleep_pending: bool,
}

impl<D: DelayNs> Owner<D> {
    fn run(mut self, mut rx: mpsc::Receiver<FeederCommand>) {
        info!("Feeder loop started");
        if let Err(e) = self.wifi.start(&*self.storage) {
            error!("WiFi startup failed: {}", e);
        }

        loop {
            loop {
                match rx.try_recv() {
                    Ok(command) => self.handle(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("All handles dropped, stopping feeder loop");
                        return;
                    }
                }
            }
            self.poll();
            thread::sleep(self.poll_interval);
        }
    }

    fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn poll(&mut self) {
        let now_ms = self.uptime_ms();
        let now = clock::sample(&*self.clock, self.utc_offset_secs);
        let pressed = self.button.is_pressed();
        match self.feeder.poll(now, pressed, now_ms) {
            Ok(outcome) => self.note_sleep(outcome.sleep),
            Err(e) => error!("Poll cycle failed: {}", e),
        }
    }

    /// Hosts cannot light-sleep; log when the device would.
    fn note_sleep(&mut self, request: Option<SleepRequest>) {
        match (request, self.sleep_pending) {
            (Some(request), false) => {
                info!(
                    duration_ms = request.duration_ms,
                    "Idle long enough for light sleep, staying awake on this host"
                );
                self.sleep_pending = true;
            }
            (None, true) => self.sleep_pending = false,
            _ => {}
        }
    }

    fn handle(&mut self, command: FeederCommand) {
        let now_ms = self.uptime_ms();
        match command {
            FeederCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            FeederCommand::ReplaceSchedule(slots, reply) => {
                let _ = reply.send(self.feeder.replace_schedule(slots, now_ms));
            }
            FeederCommand::SetRepeats(repeats, reply) => {
                let _ = reply.send(self.feeder.set_repeats(repeats, now_ms));
            }
            FeederCommand::SetSpeed(speed, reply) => {
                let _ = reply.send(self.feeder.set_speed(speed, now_ms));
            }
            FeederCommand::SetPowerSave(enabled, reply) => {
                let _ = reply.send(self.feeder.set_power_save(enabled, now_ms));
            }
            FeederCommand::SetAngle(angle, reply) => {
                let _ = reply.send(self.feeder.set_angle(angle, now_ms));
            }
            FeederCommand::FeedNow => {
                if let Err(e) = self.feeder.feed_now(now_ms) {
                    error!("Manual feeding failed: {}", e);
                }
            }
            FeederCommand::SetWifi { ssid, password } => {
                self.feeder.record_activity(now_ms);
                if let Err(e) = self.wifi.set_credentials(&*self.storage, &ssid, &password) {
                    warn!("Failed to apply WiFi credentials: {}", e);
                }
            }
            FeederCommand::ForgetWifi => {
                self.feeder.record_activity(now_ms);
                if let Err(e) = self.wifi.forget(&*self.storage) {
                    warn!("Failed to forget WiFi: {}", e);
                }
            }
            FeederCommand::ReconnectWifi => {
                self.feeder.record_activity(now_ms);
                if let Err(e) = self.wifi.connect_or_fallback() {
                    warn!("WiFi reconnect failed: {}", e);
                }
            }
            FeederCommand::ScanWifi(reply) => {
                let _ = reply.send(self.wifi.scan());
            }
        }
    }

    fn status(&mut self) -> StatusResponse {
        let now = clock::sample(&*self.clock, self.utc_offset_secs);
        let snapshot = self.feeder.snapshot(now);
        let battery = self.battery.measure();
        StatusResponse::new(&snapshot, battery, &self.wifi.snapshot())
    }
}
