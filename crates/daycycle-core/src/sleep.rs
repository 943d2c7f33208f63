//! Per-world sleep bookkeeping.
//!
//! The host's participant registry reports sleep and wake events; the
//! tracker only records who is asleep and how many participants are
//! eligible, and derives the ratio the speed model consumes.

use std::collections::BTreeSet;

use daycycle_types::ParticipantId;

/// Set of sleeping participants and the eligible participant count for
/// one world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SleepTracker {
    sleepers: BTreeSet<ParticipantId>,
    participants: u32,
}

impl SleepTracker {
    /// Create an empty tracker with no participants.
    pub const fn new() -> Self {
        Self {
            sleepers: BTreeSet::new(),
            participants: 0,
        }
    }

    /// Set the number of participants eligible to sleep.
    pub const fn set_participants(&mut self, count: u32) {
        self.participants = count;
    }

    /// Record that `participant` went to sleep. Returns `false` if they
    /// were already asleep.
    pub fn add_sleeper(&mut self, participant: ParticipantId) -> bool {
        self.sleepers.insert(participant)
    }

    /// Record that `participant` woke up. Returns `false` if they were not
    /// asleep.
    pub fn remove_sleeper(&mut self, participant: ParticipantId) -> bool {
        self.sleepers.remove(&participant)
    }

    /// Forget every sleeper.
    pub fn remove_all_sleepers(&mut self) {
        self.sleepers.clear();
    }

    /// Whether `participant` is currently asleep.
    pub fn is_sleeping(&self, participant: ParticipantId) -> bool {
        self.sleepers.contains(&participant)
    }

    /// Number of participants currently asleep.
    pub fn sleeper_count(&self) -> u32 {
        u32::try_from(self.sleepers.len()).unwrap_or(u32::MAX)
    }

    /// Number of eligible participants.
    pub const fn participant_count(&self) -> u32 {
        self.participants
    }

    /// Nobody is asleep.
    pub fn all_awake(&self) -> bool {
        self.sleepers.is_empty()
    }

    /// Every eligible participant is asleep (and there is at least one).
    pub fn all_asleep(&self) -> bool {
        self.participants > 0 && self.sleeper_count() >= self.participants
    }

    /// Fraction of eligible participants asleep, in `[0, 1]`.
    ///
    /// Returns 0 when there are no eligible participants.
    pub fn ratio(&self) -> f64 {
        if self.participants == 0 {
            return 0.0;
        }
        let ratio = f64::from(self.sleeper_count()) / f64::from(self.participants);
        ratio.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_has_zero_ratio() {
        let tracker = SleepTracker::new();
        assert!(tracker.all_awake());
        assert!(!tracker.all_asleep());
        assert!(tracker.ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_counts_sleepers() {
        let mut tracker = SleepTracker::new();
        tracker.set_participants(4);
        assert!(tracker.add_sleeper(ParticipantId::new()));
        assert!((tracker.ratio() - 0.25).abs() < f64::EPSILON);
        assert!(!tracker.all_awake());
        assert!(!tracker.all_asleep());
    }

    #[test]
    fn duplicate_sleep_event_is_ignored() {
        let mut tracker = SleepTracker::new();
        tracker.set_participants(2);
        let id = ParticipantId::new();
        assert!(tracker.add_sleeper(id));
        assert!(!tracker.add_sleeper(id));
        assert_eq!(tracker.sleeper_count(), 1);
        assert!(tracker.is_sleeping(id));
    }

    #[test]
    fn all_asleep_when_everyone_sleeps() {
        let mut tracker = SleepTracker::new();
        tracker.set_participants(2);
        tracker.add_sleeper(ParticipantId::new());
        tracker.add_sleeper(ParticipantId::new());
        assert!(tracker.all_asleep());
        assert!((tracker.ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_is_capped_when_count_shrinks() {
        let mut tracker = SleepTracker::new();
        tracker.set_participants(2);
        tracker.add_sleeper(ParticipantId::new());
        tracker.add_sleeper(ParticipantId::new());
        tracker.set_participants(1);
        assert!((tracker.ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wake_and_clear() {
        let mut tracker = SleepTracker::new();
        tracker.set_participants(3);
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        tracker.add_sleeper(a);
        tracker.add_sleeper(b);
        assert!(tracker.remove_sleeper(a));
        assert!(!tracker.remove_sleeper(a));
        tracker.remove_all_sleepers();
        assert!(tracker.all_awake());
    }
}
