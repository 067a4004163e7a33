//! Feeding schedule store.
//!
//! The schedule holds up to [`MAX_SLOTS`] slots in configuration order,
//! together with the [`LegacyPair`] that mirrors the first two of them.
//! The mirror is re-derived after every replace and every load; it is never
//! edited on its own.

use tracing::{debug, info, warn};

use crate::model::{FeedSlot, LegacyPair, RawSlotInput, MAX_SLOTS};
use crate::storage::{SettingsStorage, StorageError};

/// Storage keys for schedule data.
pub mod keys {
    pub const SLOT_COUNT: &str = "feedTimesCount";
    pub const LEGACY_HOUR_1: &str = "feedHour1";
    pub const LEGACY_MINUTE_1: &str = "feedMinute1";
    pub const LEGACY_REPEATS_1: &str = "feedRepeats1";
    pub const LEGACY_HOUR_2: &str = "feedHour2";
    pub const LEGACY_MINUTE_2: &str = "feedMinute2";
    pub const LEGACY_REPEATS_2: &str = "feedRepeats2";

    pub fn slot_hour(index: usize) -> String {
        format!("feedH{}", index)
    }

    pub fn slot_minute(index: usize) -> String {
        format!("feedM{}", index)
    }

    pub fn slot_repeats(index: usize) -> String {
        format!("feedR{}", index)
    }
}

/// Ordered feeding slots plus their legacy two-slot mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    slots: Vec<FeedSlot>,
    legacy: LegacyPair,
}

impl Schedule {
    /// An empty schedule with the default legacy pair (10:00 and 20:00).
    ///
    /// [`Schedule::load`] never yields an empty schedule; this is the
    /// starting point for building one in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schedule from already-validated slots.
    pub fn from_slots(slots: impl IntoIterator<Item = FeedSlot>) -> Self {
        let mut schedule = Self {
            slots: slots.into_iter().take(MAX_SLOTS).map(|s| s.rearmed()).collect(),
            legacy: LegacyPair::default(),
        };
        schedule.reconcile();
        schedule
    }

    pub fn slots(&self) -> &[FeedSlot] {
        &self.slots
    }

    pub fn legacy(&self) -> &LegacyPair {
        &self.legacy
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [FeedSlot] {
        &mut self.slots
    }

    pub(crate) fn legacy_mut(&mut self) -> &mut LegacyPair {
        &mut self.legacy
    }

    /// Replace every slot with the given raw entries.
    ///
    /// Each entry is clamped, entries past [`MAX_SLOTS`] are dropped, and an
    /// empty result is replaced by a single 10:00 slot. All slots come back
    /// armed. The caller is responsible for persisting.
    pub fn replace(&mut self, raw: impl IntoIterator<Item = RawSlotInput>) {
        let mut slots: Vec<FeedSlot> = Vec::with_capacity(MAX_SLOTS);
        let mut dropped = 0usize;
        for entry in raw {
            if slots.len() == MAX_SLOTS {
                dropped += 1;
                continue;
            }
            let slot = entry.into_slot();
            if RawSlotInput::from(slot) != entry {
                debug!(?entry, ?slot, "Clamped feeding slot input");
            }
            slots.push(slot);
        }
        if dropped > 0 {
            warn!(dropped, "Schedule exceeds {} slots, extra entries ignored", MAX_SLOTS);
        }
        if slots.is_empty() {
            info!("Empty schedule submitted, using default 10:00 feeding");
            slots.push(FeedSlot::default_feeding());
        }
        self.slots = slots;
        self.reconcile();
    }

    /// Re-derive the legacy pair from the slots.
    ///
    /// - one or more slots: first legacy slot mirrors `slots[0]`
    /// - two or more slots: second legacy slot mirrors `slots[1]`
    /// - exactly one slot: second legacy slot becomes 00:00 x1
    /// - no slots: the pair is left as is
    pub fn reconcile(&mut self) {
        if let Some(first) = self.slots.first() {
            self.legacy.first = first.rearmed();
        }
        match self.slots.get(1) {
            Some(second) => self.legacy.second = second.rearmed(),
            None if self.slots.len() == 1 => self.legacy.second = FeedSlot::legacy_placeholder(),
            None => {}
        }
    }

    /// Load the schedule from storage.
    ///
    /// A stored slot count in `1..=MAX_SLOTS` selects the indexed layout.
    /// Anything else falls back to the legacy keys, defaulting the first slot
    /// to 10:00 x1 and including the second only if its hour and minute keys
    /// exist.
    pub fn load<S: SettingsStorage + ?Sized>(storage: &S) -> Result<Self, StorageError> {
        let count = storage.get_i32(keys::SLOT_COUNT)?.unwrap_or(0);

        let raw = if count <= 0 || count as usize > MAX_SLOTS {
            debug!(count, "No indexed schedule stored, reading legacy keys");
            Self::load_legacy(storage)?
        } else {
            let mut raw = Vec::with_capacity(count as usize);
            for i in 0..count as usize {
                raw.push(RawSlotInput::new(
                    i64::from(storage.get_i32(&keys::slot_hour(i))?.unwrap_or(10)),
                    i64::from(storage.get_i32(&keys::slot_minute(i))?.unwrap_or(0)),
                    i64::from(storage.get_i32(&keys::slot_repeats(i))?.unwrap_or(1)),
                ));
            }
            raw
        };

        let mut schedule = Self::new();
        schedule.slots = raw.into_iter().map(RawSlotInput::into_slot).collect();
        schedule.reconcile();
        info!(slots = schedule.len(), "Loaded feeding schedule");
        Ok(schedule)
    }

    fn load_legacy<S: SettingsStorage + ?Sized>(
        storage: &S,
    ) -> Result<Vec<RawSlotInput>, StorageError> {
        let stored = |key: &str, fallback: i32| -> Result<i32, StorageError> {
            Ok(storage
                .get_i32(key)?
                .filter(|v| *v >= 0)
                .unwrap_or(fallback))
        };

        let h1 = stored(keys::LEGACY_HOUR_1, 10)?;
        let m1 = stored(keys::LEGACY_MINUTE_1, 0)?;
        let r1 = stored(keys::LEGACY_REPEATS_1, 1)?;
        let mut raw = vec![RawSlotInput::new(h1.into(), m1.into(), r1.into())];

        if storage.contains(keys::LEGACY_HOUR_2)? && storage.contains(keys::LEGACY_MINUTE_2)? {
            let h2 = storage.get_i32(keys::LEGACY_HOUR_2)?.unwrap_or(h1);
            let m2 = storage.get_i32(keys::LEGACY_MINUTE_2)?.unwrap_or(m1);
            let r2 = storage.get_i32(keys::LEGACY_REPEATS_2)?.unwrap_or(r1);
            raw.push(RawSlotInput::new(h2.into(), m2.into(), r2.into()));
        }
        Ok(raw)
    }

    /// Write the slot count, every slot, and the legacy pair to storage.
    ///
    /// Indexed keys left over from a longer previous schedule are removed.
    pub fn persist<S: SettingsStorage + ?Sized>(&self, storage: &S) -> Result<(), StorageError> {
        storage.put_i32(keys::SLOT_COUNT, self.slots.len() as i32)?;

        for (i, slot) in self.slots.iter().enumerate() {
            storage.put_i32(&keys::slot_hour(i), i32::from(slot.hour))?;
            storage.put_i32(&keys::slot_minute(i), i32::from(slot.minute))?;
            storage.put_i32(&keys::slot_repeats(i), stored_repeats(slot.repeat_count))?;
        }
        for i in self.slots.len()..MAX_SLOTS {
            storage.remove(&keys::slot_hour(i))?;
            storage.remove(&keys::slot_minute(i))?;
            storage.remove(&keys::slot_repeats(i))?;
        }

        let LegacyPair { first, second } = self.legacy;
        storage.put_i32(keys::LEGACY_HOUR_1, i32::from(first.hour))?;
        storage.put_i32(keys::LEGACY_MINUTE_1, i32::from(first.minute))?;
        storage.put_i32(keys::LEGACY_REPEATS_1, stored_repeats(first.repeat_count))?;
        storage.put_i32(keys::LEGACY_HOUR_2, i32::from(second.hour))?;
        storage.put_i32(keys::LEGACY_MINUTE_2, i32::from(second.minute))?;
        storage.put_i32(keys::LEGACY_REPEATS_2, stored_repeats(second.repeat_count))?;

        debug!(slots = self.slots.len(), "Persisted feeding schedule");
        Ok(())
    }
}

fn stored_repeats(repeats: u32) -> i32 {
    i32::try_from(repeats).unwrap_or(i32::MAX)
}
