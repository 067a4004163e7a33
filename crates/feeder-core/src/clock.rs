//! Wall-clock sources.
//!
//! The feeder only needs the local hour and minute, and only once the
//! underlying clock has been set (SNTP on the device). Anything before
//! [`MIN_VALID_YEAR`] is treated as "not synchronized".

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::sync::Mutex;

use crate::model::WallTime;

/// Years before this mean the clock has not been synchronized yet.
pub const MIN_VALID_YEAR: i32 = 2020;

/// Source of the current UTC time.
pub trait ClockSource: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Convert a UTC instant to local wall time using a fixed offset.
///
/// Returns `None` when the shifted time is before [`MIN_VALID_YEAR`].
pub fn local_wall_time(utc: DateTime<Utc>, utc_offset_secs: i32) -> Option<WallTime> {
    let local = utc.checked_add_signed(Duration::seconds(i64::from(utc_offset_secs)))?;
    if local.year() < MIN_VALID_YEAR {
        return None;
    }
    Some(WallTime::new(local.hour() as u8, local.minute() as u8))
}

/// Sample a clock source once for this poll cycle.
pub fn sample<C: ClockSource + ?Sized>(clock: &C, utc_offset_secs: i32) -> Option<WallTime> {
    local_wall_time(clock.now_utc(), utc_offset_secs)
}

/// The operating system clock.
///
/// On ESP-IDF this is the newlib clock that SNTP sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// A clock stuck at the Unix epoch, as after a cold boot without SNTP.
    pub fn unsynced() -> Self {
        Self::new(DateTime::<Utc>::default())
    }

    /// A clock at the given UTC date and time.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let now = Utc
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::default());
        Self::new(now)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl ClockSource for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|g| *g)
            .unwrap_or(DateTime::<Utc>::default())
    }
}
