//! Fish feeder firmware for ESP32.
//!
//! This binary requires the ESP32 Rust toolchain.
//! It will not compile with the standard Rust toolchain.
//!
//! Wiring:
//! - GPIO4: servo signal (LEDC, 50 Hz)
//! - GPIO3: feed button to ground
//! - GPIO2: battery voltage divider (ADC1)

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{InputPin, PinDriver, Pull};
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{esp, esp_light_sleep_start, esp_sleep_enable_timer_wakeup};
use feeder_core::{Button, FeederConfig, SleepRequest};
use feeder_esp32::battery::AdcBattery;
use feeder_esp32::button::GpioButton;
use feeder_esp32::device::{DeferredAction, Device};
use feeder_esp32::http::register_handlers;
use feeder_esp32::nvs::NvsSettings;
use feeder_esp32::servo::{LedcServo, PWM_FREQ_HZ};
use feeder_esp32::wifi::EspNetwork;
use log::{error, info, warn};

const NVS_NAMESPACE: &str = "feeder";
const POLL_INTERVAL_MS: u32 = 50;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Fish feeder v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let config = FeederConfig::default();

    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default().frequency(PWM_FREQ_HZ.Hz().into()),
    )?;
    let servo = LedcServo::new(LedcDriver::new(
        peripherals.ledc.channel0,
        timer,
        peripherals.pins.gpio4,
    )?);

    let adc = AdcDriver::new(peripherals.adc1)?;
    let adc_config = AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    };
    let battery = AdcBattery::new(AdcChannelDriver::new(adc, peripherals.pins.gpio2, &adc_config)?);

    let mut button_pin = PinDriver::input(peripherals.pins.gpio3.downgrade_input())?;
    button_pin.set_pull(Pull::Up)?;
    let mut button = GpioButton::new(button_pin);

    let network = EspNetwork::new(peripherals.modem, sysloop, Some(nvs_partition.clone()))?;
    let storage = Arc::new(NvsSettings::new(nvs_partition, NVS_NAMESPACE)?);

    let mut device = Device::new(storage, servo, Box::new(battery), network, &config)?;
    device.start_wifi();
    let busy = device.feeder.busy_flag();
    let device = Arc::new(Mutex::new(device));

    let (actions_tx, actions_rx) = mpsc::channel();
    let mut server = EspHttpServer::new(&HttpConfiguration::default())?;
    register_handlers(&mut server, device.clone(), busy, actions_tx)?;
    info!("HTTP server started");

    loop {
        if let Err(e) = run_cycle(&device, &actions_rx, &mut button) {
            error!("Poll cycle failed: {:#}", e);
        }
        FreeRtos::delay_ms(POLL_INTERVAL_MS);
    }
}

/// Queued actions first, then button and schedule, then power saving.
fn run_cycle(
    device: &Mutex<Device>,
    actions: &Receiver<DeferredAction>,
    button: &mut GpioButton,
) -> anyhow::Result<()> {
    let mut device = device.lock().map_err(|_| anyhow!("device state poisoned"))?;

    while let Ok(action) = actions.try_recv() {
        device.apply(action);
    }

    let outcome = device.poll(button.is_pressed())?;
    if let Some(request) = outcome.sleep {
        light_sleep(&mut device, request)?;
    }
    Ok(())
}

/// Stop WiFi, sleep on the RTC timer, then restore the previous WiFi role.
fn light_sleep(device: &mut Device, request: SleepRequest) -> anyhow::Result<()> {
    info!("Entering light sleep for {} ms", request.duration_ms);
    if let Err(e) = device.wifi.driver_mut().suspend() {
        warn!("Failed to stop WiFi before sleep: {}", e);
    }

    esp!(unsafe { esp_sleep_enable_timer_wakeup(request.duration_ms * 1000) })?;
    esp!(unsafe { esp_light_sleep_start() })?;

    info!("Woke from light sleep");
    device.wifi.resume()?;
    Ok(())
}
