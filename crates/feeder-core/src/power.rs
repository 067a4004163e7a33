//! Light-sleep policy.

use tracing::debug;

use crate::config::PowerSaveConfig;
use crate::model::NextFeed;

/// A request from the poll cycle to the host to sleep between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest {
    pub duration_ms: u64,
}

/// Decides when the device may light-sleep.
///
/// Times are milliseconds of uptime, as reported by the platform.
#[derive(Debug, Clone)]
pub struct PowerSaver {
    config: PowerSaveConfig,
    enabled: bool,
    last_activity_ms: u64,
}

impl PowerSaver {
    pub fn new(config: PowerSaveConfig, enabled: bool, now_ms: u64) -> Self {
        Self {
            config,
            enabled,
            last_activity_ms: now_ms,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Reset the idle timer.
    pub fn record_activity(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
    }

    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_activity_ms)
    }

    /// Check whether to sleep now.
    ///
    /// Sleep is refused while disabled, while recently active, while the
    /// dispenser is busy, and when the next feeding is within the guard
    /// window. An unknown next feeding does not block sleep.
    pub fn check(
        &self,
        now_ms: u64,
        dispenser_busy: bool,
        next: Option<NextFeed>,
    ) -> Option<SleepRequest> {
        if !self.enabled || dispenser_busy {
            return None;
        }
        if self.idle_ms(now_ms) < self.config.activity_timeout_ms {
            return None;
        }
        if let Some(next) = next {
            if next.minutes_until <= self.config.feed_guard_minutes {
                debug!(minutes = next.minutes_until, "Feeding imminent, staying awake");
                return None;
            }
        }
        Some(SleepRequest {
            duration_ms: self.config.sleep_interval_ms,
        })
    }
}
