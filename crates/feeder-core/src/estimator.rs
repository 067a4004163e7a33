//! Next-feed estimation.

use crate::model::{FeedSlot, NextFeed, WallTime, MINUTES_PER_DAY};
use crate::schedule::Schedule;

/// Compute which slot fires next and how many minutes remain.
///
/// Candidates are the schedule's slots, or the legacy pair when the schedule
/// is empty. A slot at or before `now` counts as tomorrow, so the result is
/// always in `1..=1440` minutes. Ties go to the first candidate in
/// configuration order. Returns `None` while the clock is unsynced.
pub fn compute_next_feed(now: Option<WallTime>, schedule: &Schedule) -> Option<NextFeed> {
    let now = now?;
    if schedule.is_empty() {
        next_among(now, schedule.legacy().slots())
    } else {
        next_among(now, schedule.slots())
    }
}

fn next_among<'a>(
    now: WallTime,
    candidates: impl IntoIterator<Item = &'a FeedSlot>,
) -> Option<NextFeed> {
    let now_total = now.total_minutes();
    let mut best: Option<NextFeed> = None;

    for slot in candidates {
        let slot_total = slot.total_minutes();
        let diff = if slot_total <= now_total {
            slot_total + MINUTES_PER_DAY - now_total
        } else {
            slot_total - now_total
        };
        if best.map_or(true, |b| diff < b.minutes_until) {
            best = Some(NextFeed {
                hour: slot.hour,
                minute: slot.minute,
                minutes_until: diff,
            });
        }
    }
    best
}
