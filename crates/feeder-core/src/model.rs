//! Feeding schedule data model.
//!
//! These types describe what the feeder knows about its schedule:
//! - [`FeedSlot`] - one configured feeding time and its arming state
//! - [`RawSlotInput`] - untrusted slot fields as they arrive from a client or storage
//! - [`LegacyPair`] - the two-slot mirror kept for older clients and storage layouts
//! - [`WallTime`] / [`NextFeed`] - derived, per-cycle time values

use serde::{Deserialize, Serialize};

/// Maximum number of slots a schedule can hold.
pub const MAX_SLOTS: usize = 20;

/// Minutes in one day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Hour used when a slot has no usable hour.
pub const DEFAULT_HOUR: u8 = 10;

/// Minute used when a slot has no usable minute.
pub const DEFAULT_MINUTE: u8 = 0;

/// Repeat count used when a slot has no usable repeat count.
pub const DEFAULT_REPEATS: u32 = 1;

/// Clamp a raw hour into `0..=23`.
pub fn clamp_hour(raw: i64) -> u8 {
    raw.clamp(0, 23) as u8
}

/// Clamp a raw minute into `0..=59`.
pub fn clamp_minute(raw: i64) -> u8 {
    raw.clamp(0, 59) as u8
}

/// Clamp a raw repeat count into `1..=i32::MAX`, the range storage can hold.
pub fn clamp_repeats(raw: i64) -> u32 {
    raw.clamp(1, i64::from(i32::MAX)) as u32
}

/// Per-slot trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Eligible to fire when the clock reaches the slot's time.
    #[default]
    Armed,
    /// Already fired during the current matching minute.
    Fired,
}

/// One scheduled feeding.
///
/// Equality compares the configured time and repeat count only. The
/// [`SlotState`] is runtime bookkeeping owned by the trigger engine and is
/// never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedSlot {
    pub hour: u8,
    pub minute: u8,
    pub repeat_count: u32,
    #[serde(skip)]
    pub state: SlotState,
}

impl FeedSlot {
    /// Create an armed slot. Callers are expected to pass in-range values;
    /// use [`RawSlotInput::into_slot`] for untrusted input.
    pub const fn new(hour: u8, minute: u8, repeat_count: u32) -> Self {
        Self {
            hour,
            minute,
            repeat_count,
            state: SlotState::Armed,
        }
    }

    /// The slot substituted when an explicit replace yields nothing.
    pub const fn default_feeding() -> Self {
        Self::new(DEFAULT_HOUR, DEFAULT_MINUTE, DEFAULT_REPEATS)
    }

    /// The value the second legacy slot takes when only one slot is configured.
    pub const fn legacy_placeholder() -> Self {
        Self::new(0, 0, 1)
    }

    /// Minutes since midnight.
    pub fn total_minutes(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }

    /// Whether the slot has already fired in the current matching minute.
    pub fn fired_this_minute(&self) -> bool {
        self.state == SlotState::Fired
    }

    /// Copy of this slot with the trigger state reset.
    pub fn rearmed(&self) -> Self {
        Self::new(self.hour, self.minute, self.repeat_count)
    }
}

impl PartialEq for FeedSlot {
    fn eq(&self, other: &Self) -> bool {
        self.hour == other.hour
            && self.minute == other.minute
            && self.repeat_count == other.repeat_count
    }
}

impl Eq for FeedSlot {}

/// Untrusted slot fields.
///
/// `None` means the field was missing or could not be read as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSlotInput {
    pub hour: Option<i64>,
    pub minute: Option<i64>,
    pub repeat_count: Option<i64>,
}

impl RawSlotInput {
    pub fn new(hour: i64, minute: i64, repeat_count: i64) -> Self {
        Self {
            hour: Some(hour),
            minute: Some(minute),
            repeat_count: Some(repeat_count),
        }
    }

    /// Resolve missing fields to their defaults and clamp the rest.
    pub fn into_slot(self) -> FeedSlot {
        FeedSlot::new(
            self.hour.map_or(DEFAULT_HOUR, clamp_hour),
            self.minute.map_or(DEFAULT_MINUTE, clamp_minute),
            self.repeat_count.map_or(DEFAULT_REPEATS, clamp_repeats),
        )
    }
}

impl From<FeedSlot> for RawSlotInput {
    fn from(slot: FeedSlot) -> Self {
        Self::new(
            i64::from(slot.hour),
            i64::from(slot.minute),
            i64::from(slot.repeat_count),
        )
    }
}

/// Two-slot mirror of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyPair {
    pub first: FeedSlot,
    pub second: FeedSlot,
}

impl Default for LegacyPair {
    fn default() -> Self {
        Self {
            first: FeedSlot::new(10, 0, 1),
            second: FeedSlot::new(20, 0, 1),
        }
    }
}

impl LegacyPair {
    pub fn slots(&self) -> [&FeedSlot; 2] {
        [&self.first, &self.second]
    }

    pub fn slots_mut(&mut self) -> [&mut FeedSlot; 2] {
        [&mut self.first, &mut self.second]
    }
}

/// Local wall-clock time of one poll cycle.
///
/// Only exists once the clock has synchronized; an unsynced clock is
/// represented as `Option::<WallTime>::None` throughout the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    pub hour: u8,
    pub minute: u8,
}

impl WallTime {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self {
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    pub fn total_minutes(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }

    /// `"HH:MM"`.
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Which slot fires next and how long until it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextFeed {
    pub hour: u8,
    pub minute: u8,
    /// Always in `1..=1440`.
    pub minutes_until: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping_bounds() {
        for raw in [-1_000_000, -1, 0, 5, 23, 24, 59, 60, 1_000_000] {
            assert!(clamp_hour(raw) <= 23);
            assert!(clamp_minute(raw) <= 59);
            assert!(clamp_repeats(raw) >= 1);
        }
        assert_eq!(clamp_hour(-3), 0);
        assert_eq!(clamp_hour(31), 23);
        assert_eq!(clamp_minute(75), 59);
        assert_eq!(clamp_repeats(0), 1);
        assert_eq!(clamp_repeats(4), 4);
        assert_eq!(clamp_repeats(3_000_000_000), i32::MAX as u32);
    }

    #[test]
    fn test_raw_input_defaults() {
        let slot = RawSlotInput::default().into_slot();
        assert_eq!(slot, FeedSlot::new(10, 0, 1));

        let partial = RawSlotInput {
            hour: Some(7),
            minute: None,
            repeat_count: Some(-2),
        };
        assert_eq!(partial.into_slot(), FeedSlot::new(7, 0, 1));
    }

    #[test]
    fn test_slot_equality_ignores_state() {
        let mut fired = FeedSlot::new(8, 30, 2);
        fired.state = SlotState::Fired;
        assert_eq!(fired, FeedSlot::new(8, 30, 2));
        assert!(!fired.rearmed().fired_this_minute());
    }

    #[test]
    fn test_wall_time_display() {
        assert_eq!(WallTime::new(7, 5).display(), "07:05");
        assert_eq!(WallTime::new(23, 59).total_minutes(), 1439);
    }
}
