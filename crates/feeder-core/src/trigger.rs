//! Scheduled feeding trigger engine.
//!
//! Each slot is a two-state machine:
//!
//! ```text
//!            clock == slot time        clock minute != slot minute
//!   ARMED ─────────────────────▶ FIRED ─────────────────────────▶ ARMED
//! ```
//!
//! Every slot is evaluated on every cycle with no early exit, so slots that
//! share a time each fire independently. The same rules apply to the legacy
//! pair when the schedule is empty.

use tracing::info;

use crate::model::{FeedSlot, SlotState, WallTime};
use crate::schedule::Schedule;

/// Where a due feeding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// Index into the schedule's slots.
    Slot(usize),
    /// Index into the legacy pair (0 or 1).
    Legacy(usize),
}

/// A feeding that became due during this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueFeed {
    pub source: FeedSource,
    pub hour: u8,
    pub minute: u8,
    pub repeat_count: u32,
}

/// Advance every slot's state machine for this cycle and return the
/// feedings that became due, in configuration order.
///
/// An unsynced clock changes nothing and fires nothing.
pub fn evaluate(schedule: &mut Schedule, now: Option<WallTime>) -> Vec<DueFeed> {
    let Some(now) = now else {
        return Vec::new();
    };

    let mut due = Vec::new();
    if schedule.is_empty() {
        for (i, slot) in schedule.legacy_mut().slots_mut().into_iter().enumerate() {
            if step(slot, now) {
                due.push(DueFeed::new(FeedSource::Legacy(i), slot));
            }
        }
    } else {
        for (i, slot) in schedule.slots_mut().iter_mut().enumerate() {
            if step(slot, now) {
                due.push(DueFeed::new(FeedSource::Slot(i), slot));
            }
        }
    }

    for feed in &due {
        info!(
            source = ?feed.source,
            repeats = feed.repeat_count,
            "Scheduled feeding due at {:02}:{:02}",
            feed.hour,
            feed.minute
        );
    }
    due
}

/// Run one transition for one slot. Returns `true` when the slot fires.
fn step(slot: &mut FeedSlot, now: WallTime) -> bool {
    let mut fired = false;
    if slot.state == SlotState::Armed && now.hour == slot.hour && now.minute == slot.minute {
        slot.state = SlotState::Fired;
        fired = true;
    }
    if now.minute != slot.minute {
        slot.state = SlotState::Armed;
    }
    fired
}

impl DueFeed {
    fn new(source: FeedSource, slot: &FeedSlot) -> Self {
        Self {
            source,
            hour: slot.hour,
            minute: slot.minute,
            repeat_count: slot.repeat_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawSlotInput;

    fn schedule(entries: &[(i64, i64, i64)]) -> Schedule {
        let mut schedule = Schedule::new();
        schedule.replace(entries.iter().map(|&(h, m, r)| RawSlotInput::new(h, m, r)));
        schedule
    }

    fn at(hour: u8, minute: u8) -> Option<WallTime> {
        Some(WallTime::new(hour, minute))
    }

    #[test]
    fn test_unsynced_clock_never_fires() {
        let mut schedule = schedule(&[(0, 0, 1)]);
        assert!(evaluate(&mut schedule, None).is_empty());
        assert!(!schedule.slots()[0].fired_this_minute());
    }

    #[test]
    fn test_fires_once_per_matching_minute() {
        let mut schedule = schedule(&[(10, 0, 2)]);

        let due = evaluate(&mut schedule, at(10, 0));
        assert_eq!(
            due,
            vec![DueFeed {
                source: FeedSource::Slot(0),
                hour: 10,
                minute: 0,
                repeat_count: 2
            }]
        );
        assert!(schedule.slots()[0].fired_this_minute());

        assert!(evaluate(&mut schedule, at(10, 0)).is_empty());
        assert!(evaluate(&mut schedule, at(10, 0)).is_empty());

        assert!(evaluate(&mut schedule, at(10, 1)).is_empty());
        assert!(!schedule.slots()[0].fired_this_minute());

        assert!(evaluate(&mut schedule, at(11, 0)).is_empty());
        assert_eq!(evaluate(&mut schedule, at(10, 0)).len(), 1);
    }

    #[test]
    fn test_identical_times_fire_independently() {
        let mut schedule = schedule(&[(8, 15, 1), (8, 15, 3)]);

        let due = evaluate(&mut schedule, at(8, 15));
        let repeats: Vec<u32> = due.iter().map(|d| d.repeat_count).collect();
        assert_eq!(repeats, vec![1, 3]);
        assert_eq!(due[1].source, FeedSource::Slot(1));
    }

    #[test]
    fn test_rearm_is_minute_only() {
        let mut schedule = schedule(&[(10, 0, 1)]);
        evaluate(&mut schedule, at(10, 0));

        // Same minute value in another hour keeps the slot fired.
        evaluate(&mut schedule, at(11, 0));
        assert!(schedule.slots()[0].fired_this_minute());

        evaluate(&mut schedule, at(11, 1));
        assert!(!schedule.slots()[0].fired_this_minute());
    }

    #[test]
    fn test_later_slots_evaluated_after_a_fire() {
        let mut schedule = schedule(&[(9, 0, 1), (9, 30, 1)]);
        evaluate(&mut schedule, at(9, 30));
        schedule.slots_mut()[0].state = SlotState::Fired;

        // Both slots are visited: slot 0 re-arms while slot 1 stays fired.
        evaluate(&mut schedule, at(9, 30));
        assert!(!schedule.slots()[0].fired_this_minute());
        assert!(schedule.slots()[1].fired_this_minute());
    }

    #[test]
    fn test_legacy_pair_fallback() {
        let mut schedule = Schedule::new();

        let due = evaluate(&mut schedule, at(20, 0));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].source, FeedSource::Legacy(1));
        assert!(schedule.legacy().second.fired_this_minute());

        assert!(evaluate(&mut schedule, at(20, 0)).is_empty());
        evaluate(&mut schedule, at(20, 1));
        assert!(!schedule.legacy().second.fired_this_minute());
    }
}
