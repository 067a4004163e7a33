//! ESP32 adapters for the fish feeder.
//!
//! This crate connects the platform-agnostic controller in `feeder-core` to
//! ESP-IDF peripherals:
//! - NVS-backed settings storage
//! - WiFi station, access point and scanning
//! - LEDC servo, ADC battery sensor and button input
//! - HTTP handlers for the `/api/*` surface
//!
//! # Architecture
//!
//! HTTP handlers run on the httpd task while the main loop polls the feeder.
//! Both share a [`device::Device`] behind `Arc<Mutex<_>>`. Requests that
//! would block the httpd task (feeding, WiFi changes) are queued as
//! [`device::DeferredAction`]s for the main loop.
//!
//! # Example
//!
//! ```ignore
//! use feeder_esp32::nvs::NvsSettings;
//! use feeder_esp32::http::register_handlers;
//!
//! let storage = Arc::new(NvsSettings::new(nvs_partition, "feeder")?);
//! let (device, actions) = Device::new(...)?;
//! register_handlers(&mut server, device.clone(), busy, actions_tx)?;
//! ```

pub mod battery;
pub mod button;
pub mod device;
pub mod http;
pub mod nvs;
pub mod servo;
pub mod wifi;
