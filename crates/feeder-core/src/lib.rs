//! # feeder-core
//!
//! Core logic of the fish feeder.
//!
//! This crate provides:
//! - Data model types (FeedSlot, LegacyPair, WallTime, NextFeed)
//! - The schedule store with legacy two-slot migration
//! - Next-feed estimation and the per-minute trigger engine
//! - Servo dispensing, battery calibration, power-save and WiFi policy
//! - The [`Feeder`] controller that ties them into one poll cycle
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and ESP32 (esp-idf) targets.
//! Hardware is reached through small traits ([`Actuator`], [`BatterySensor`],
//! [`NetworkDriver`], [`SettingsStorage`]) and `embedded_hal` delays.

pub mod actuator;
pub mod battery;
pub mod clock;
pub mod config;
pub mod controller;
pub mod estimator;
pub mod model;
pub mod network;
pub mod power;
pub mod schedule;
pub mod settings;
pub mod storage;
pub mod trigger;

pub use actuator::{Actuator, ActuatorError, BusyFlag, DispenseProfile, Dispenser};
pub use battery::{BatteryMonitor, BatteryReading, BatterySensor};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use config::FeederConfig;
pub use controller::{Button, Feeder, FeederError, FeederSnapshot, PollOutcome};
pub use estimator::compute_next_feed;
pub use model::*;
pub use network::{
    NetworkDriver, NetworkError, NetworkSnapshot, ScannedNetwork, WifiMode, WifiProvisioner,
};
pub use power::{PowerSaver, SleepRequest};
pub use schedule::Schedule;
pub use settings::DeviceSettings;
pub use storage::{MemorySettings, SettingsStorage, StorageError, StoredValue};
