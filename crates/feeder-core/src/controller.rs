//! The feeder controller.
//!
//! [`Feeder`] owns the schedule, the device settings, the dispenser and the
//! power-save policy, and persists every configuration change through a
//! [`SettingsStorage`]. It has no thread of its own: the host calls
//! [`Feeder::poll`] once per loop iteration and routes HTTP requests to the
//! mutation methods between polls. Everything is synchronous.

use embedded_hal::delay::DelayNs;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::actuator::{Actuator, ActuatorError, BusyFlag, Dispenser};
use crate::config::FeederConfig;
use crate::estimator::compute_next_feed;
use crate::model::{FeedSlot, LegacyPair, NextFeed, RawSlotInput, WallTime};
use crate::power::{PowerSaver, SleepRequest};
use crate::schedule::Schedule;
use crate::settings::{clamp_speed, DeviceSettings};
use crate::storage::{SettingsStorage, StorageError};
use crate::trigger::{self, DueFeed};

#[derive(Debug, Error)]
pub enum FeederError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

/// The manual feed button, sampled once per poll cycle.
pub trait Button: Send {
    fn is_pressed(&mut self) -> bool;
}

impl<B: Button + ?Sized> Button for Box<B> {
    fn is_pressed(&mut self) -> bool {
        (**self).is_pressed()
    }
}

/// What happened during one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// The button was pressed and a single dispense cycle ran.
    pub button_fed: bool,
    /// Scheduled feedings that fired, in configuration order.
    pub fired: Vec<DueFeed>,
    /// The host may light-sleep after this cycle.
    pub sleep: Option<SleepRequest>,
}

/// Point-in-time view of the controller for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct FeederSnapshot {
    pub current_angle: u8,
    pub speed: f32,
    pub feed_repeats: u32,
    pub power_save: bool,
    pub busy: bool,
    pub slots: Vec<FeedSlot>,
    pub legacy: LegacyPair,
    pub next_feed: Option<NextFeed>,
    pub current_time: Option<WallTime>,
}

pub struct Feeder<S, A, D> {
    storage: S,
    schedule: Schedule,
    settings: DeviceSettings,
    dispenser: Dispenser<A, D>,
    power: PowerSaver,
    button_was_pressed: bool,
}

impl<S, A, D> Feeder<S, A, D>
where
    S: SettingsStorage,
    A: Actuator,
    D: DelayNs,
{
    /// Load persisted state and park the servo at its rest angle.
    pub fn new(
        storage: S,
        actuator: A,
        delay: D,
        config: &FeederConfig,
        now_ms: u64,
    ) -> Result<Self, FeederError> {
        let schedule = Schedule::load(&storage)?;
        let settings = DeviceSettings::load(&storage)?;

        let mut dispenser = Dispenser::new(actuator, delay, config.servo.profile())?;
        dispenser.set_speed(settings.speed);

        info!(
            slots = schedule.len(),
            speed = settings.speed,
            repeats = settings.feed_repeats,
            power_save = settings.power_save,
            "Feeder initialized"
        );

        Ok(Self {
            storage,
            schedule,
            power: PowerSaver::new(config.power_save, settings.power_save, now_ms),
            settings,
            dispenser,
            button_was_pressed: false,
        })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn dispenser(&self) -> &Dispenser<A, D> {
        &self.dispenser
    }

    /// Shared flag that is set while a dispense cycle runs.
    pub fn busy_flag(&self) -> BusyFlag {
        self.dispenser.busy_flag()
    }

    pub fn record_activity(&mut self, now_ms: u64) {
        self.power.record_activity(now_ms);
    }

    /// Replace the whole schedule and persist it.
    pub fn replace_schedule(
        &mut self,
        raw: impl IntoIterator<Item = RawSlotInput>,
        now_ms: u64,
    ) -> Result<(), FeederError> {
        self.schedule.replace(raw);
        self.power.record_activity(now_ms);
        self.schedule.persist(&self.storage)?;
        Ok(())
    }

    /// Set the repeat count used by manual feedings, floored at 1.
    pub fn set_repeats(&mut self, repeats: i64, now_ms: u64) -> Result<(), FeederError> {
        self.settings.feed_repeats = repeats.clamp(1, i64::from(i32::MAX)) as u32;
        self.power.record_activity(now_ms);
        debug!(repeats = self.settings.feed_repeats, "Feed repeats updated");
        self.settings.save(&self.storage)?;
        Ok(())
    }

    /// Set the sweep speed, clamped to `1..=20`.
    pub fn set_speed(&mut self, speed: f32, now_ms: u64) -> Result<(), FeederError> {
        self.settings.speed = clamp_speed(speed);
        self.dispenser.set_speed(self.settings.speed);
        self.power.record_activity(now_ms);
        debug!(speed = self.settings.speed, "Speed updated");
        self.settings.save(&self.storage)?;
        Ok(())
    }

    pub fn set_power_save(&mut self, enabled: bool, now_ms: u64) -> Result<(), FeederError> {
        self.settings.power_save = enabled;
        self.power.set_enabled(enabled);
        self.power.record_activity(now_ms);
        info!(enabled, "Power save mode updated");
        self.settings.save(&self.storage)?;
        Ok(())
    }

    /// Dispense now with the configured repeat count. Blocks until done.
    pub fn feed_now(&mut self, now_ms: u64) -> Result<(), FeederError> {
        self.power.record_activity(now_ms);
        let repeats = self.settings.feed_repeats;
        info!(repeats, "Manual feeding");
        self.dispenser.dispense(repeats)?;
        Ok(())
    }

    /// Move the servo straight to `angle`. Returns `false` when ignored
    /// because a dispense cycle is running.
    pub fn set_angle(&mut self, angle: i64, now_ms: u64) -> Result<bool, FeederError> {
        self.power.record_activity(now_ms);
        Ok(self.dispenser.jump(angle)?)
    }

    /// Run one cycle: button edge, then the schedule, then the sleep check.
    pub fn poll(
        &mut self,
        now: Option<WallTime>,
        button_pressed: bool,
        now_ms: u64,
    ) -> Result<PollOutcome, FeederError> {
        let mut outcome = PollOutcome::default();

        let edge = button_pressed && !self.button_was_pressed;
        self.button_was_pressed = button_pressed;
        if edge && !self.dispenser.is_busy() {
            info!("Button pressed");
            self.power.record_activity(now_ms);
            self.dispenser.dispense(1)?;
            outcome.button_fed = true;
        }

        outcome.fired = trigger::evaluate(&mut self.schedule, now);
        let mut first_error = None;
        for feed in &outcome.fired {
            if let Err(e) = self.dispenser.dispense(feed.repeat_count) {
                error!("Scheduled feeding at {:02}:{:02} failed: {}", feed.hour, feed.minute, e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }

        let next = compute_next_feed(now, &self.schedule);
        outcome.sleep = self.power.check(now_ms, self.dispenser.is_busy(), next);
        Ok(outcome)
    }

    pub fn next_feed(&self, now: Option<WallTime>) -> Option<NextFeed> {
        compute_next_feed(now, &self.schedule)
    }

    pub fn snapshot(&self, now: Option<WallTime>) -> FeederSnapshot {
        FeederSnapshot {
            current_angle: self.dispenser.current_angle(),
            speed: self.settings.speed,
            feed_repeats: self.settings.feed_repeats,
            power_save: self.settings.power_save,
            busy: self.dispenser.is_busy(),
            slots: self.schedule.slots().to_vec(),
            legacy: *self.schedule.legacy(),
            next_feed: self.next_feed(now),
            current_time: now,
        }
    }
}

impl<S, A, D> std::fmt::Debug for Feeder<S, A, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feeder")
            .field("schedule", &self.schedule)
            .field("settings", &self.settings)
            .field("dispenser", &self.dispenser)
            .finish()
    }
}
