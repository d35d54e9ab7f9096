//! Rep-counting state machine
//!
//! Detects full extended→contracted arm cycles from the per-frame classifier
//! signal and counts each cycle exactly once. Labels are edge-triggered: a
//! label only has an effect when it differs from the previously observed one,
//! so a pose held across many frames registers as a single event.

/// Pose classification for a single camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoseLabel {
    /// No usable classification (untrained model, out-of-range response).
    #[default]
    Unknown,
    /// Arm extended (class id 1 in the sample store).
    Extended,
    /// Arm contracted (class id 2 in the sample store).
    Contracted,
}

impl PoseLabel {
    /// Numeric class id used on the classifier and sample-store boundary.
    pub fn class_id(self) -> Option<i32> {
        match self {
            PoseLabel::Unknown => None,
            PoseLabel::Extended => Some(1),
            PoseLabel::Contracted => Some(2),
        }
    }

    /// Map a numeric class id back to a label.
    pub fn from_class_id(id: i32) -> Self {
        match id {
            1 => PoseLabel::Extended,
            2 => PoseLabel::Contracted,
            _ => PoseLabel::Unknown,
        }
    }

    /// Human-readable name, matching the sample folder names.
    pub fn as_str(self) -> &'static str {
        match self {
            PoseLabel::Unknown => "unknown",
            PoseLabel::Extended => "extended",
            PoseLabel::Contracted => "contracted",
        }
    }
}

impl std::fmt::Display for PoseLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rep counter driven by one classifier label per tick.
///
/// Two latches remember which poses have been seen since the last completed
/// rep. When both are set within one update, both are cleared and the count
/// is incremented by exactly one, so the two poses complete a rep in either
/// temporal order.
#[derive(Debug, Clone)]
pub struct RepCounter {
    /// Latch: an Extended label was observed since the last completed rep.
    extended: bool,
    /// Latch: a Contracted label was observed since the last completed rep.
    contracted: bool,
    /// Most recently observed distinct label, for edge detection.
    last_label: PoseLabel,
    /// Completed reps. Never decreases except through [`RepCounter::reset`].
    reps: u32,
    /// Gate: labels are ignored entirely while false.
    counting: bool,
}

impl RepCounter {
    /// Create a counter with cleared latches and the counting gate set as given.
    pub fn new(counting: bool) -> Self {
        Self {
            extended: false,
            contracted: false,
            last_label: PoseLabel::Unknown,
            reps: 0,
            counting,
        }
    }

    /// Feed one classifier label into the state machine.
    ///
    /// While counting is disabled this is a no-op, whether or not the caller
    /// already skipped the tick. A label equal to the last observed one is
    /// ignored (edge-triggering). Otherwise the matching latch is set
    /// (`Unknown` sets neither, but still updates the edge detector), and if
    /// both latches are now set they are cleared together and the rep count
    /// is incremented.
    pub fn update(&mut self, label: PoseLabel) {
        if !self.counting {
            return;
        }

        if label == self.last_label {
            return;
        }
        self.last_label = label;

        match label {
            PoseLabel::Extended => self.extended = true,
            PoseLabel::Contracted => self.contracted = true,
            PoseLabel::Unknown => {}
        }

        if self.extended && self.contracted {
            self.extended = false;
            self.contracted = false;
            self.reps += 1;
        }
    }

    /// Flip the counting gate.
    ///
    /// Latches and the edge detector keep their state, so a rep in progress
    /// survives a pause.
    pub fn toggle_counting(&mut self) {
        self.counting = !self.counting;
    }

    /// Zero the rep count.
    ///
    /// Only the visible count is reset. Latches, the last observed label, and
    /// the counting gate keep their values, so a half-completed rep from
    /// before the reset can complete with a single label afterwards (see
    /// DESIGN.md).
    pub fn reset(&mut self) {
        self.reps = 0;
    }

    /// Completed rep count.
    pub fn count(&self) -> u32 {
        self.reps
    }

    /// Whether labels are currently being processed.
    pub fn is_counting(&self) -> bool {
        self.counting
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use super::PoseLabel::{Contracted, Extended, Unknown};

    fn counting_counter() -> RepCounter {
        RepCounter::new(true)
    }

    #[test]
    fn test_full_cycle_counts_once() {
        // Scenario A
        let mut c = counting_counter();
        c.update(Extended);
        c.update(Contracted);

        assert_eq!(c.count(), 1);
        assert!(!c.extended);
        assert!(!c.contracted);
        assert_eq!(c.last_label, Contracted);
    }

    #[test]
    fn test_repeated_label_is_edge_triggered() {
        // Scenario B: the second Extended must be a no-op
        let mut c = counting_counter();
        c.update(Extended);
        let after_one = c.clone();
        c.update(Extended);

        assert_eq!(c.count(), after_one.count());
        assert_eq!(c.extended, after_one.extended);
        assert_eq!(c.contracted, after_one.contracted);
        assert_eq!(c.last_label, after_one.last_label);

        c.update(Contracted);
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_disabled_update_leaves_state_unchanged() {
        // Scenario C
        let mut c = RepCounter::new(false);
        c.update(Extended);
        c.update(Contracted);

        assert_eq!(c.count(), 0);
        assert!(!c.extended);
        assert!(!c.contracted);
        assert_eq!(c.last_label, Unknown);
    }

    #[test]
    fn test_cycle_order_does_not_matter() {
        // Scenario D
        let mut c = counting_counter();
        c.update(Contracted);
        c.update(Extended);

        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_reset_zeroes_count_and_counting_resumes() {
        // Scenario E
        let mut c = counting_counter();
        for _ in 0..3 {
            c.update(Extended);
            c.update(Contracted);
        }
        assert_eq!(c.count(), 3);

        c.reset();
        assert_eq!(c.count(), 0);
        c.reset();
        assert_eq!(c.count(), 0); // idempotent

        c.update(Extended);
        c.update(Contracted);
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_reset_preserves_latches() {
        let mut c = counting_counter();
        c.update(Extended);
        c.reset();

        // The half-completed rep survives the reset and finishes with one label.
        assert!(c.extended);
        c.update(Contracted);
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_toggle_twice_restores_gate() {
        let mut c = counting_counter();
        assert!(c.is_counting());
        c.toggle_counting();
        assert!(!c.is_counting());
        c.toggle_counting();
        assert!(c.is_counting());
    }

    #[test]
    fn test_pause_preserves_partial_progress() {
        let mut c = counting_counter();
        c.update(Extended);

        c.toggle_counting();
        assert!(c.extended);
        c.toggle_counting();

        c.update(Contracted);
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_unknown_sets_no_latch_but_updates_edge() {
        let mut c = counting_counter();
        c.update(Extended);
        c.update(Unknown);
        assert!(c.extended);
        assert!(!c.contracted);
        assert_eq!(c.last_label, Unknown);

        // Unknown re-armed the edge detector: Extended is a change again,
        // but the latch is already set so the state is unaffected.
        c.update(Extended);
        assert_eq!(c.count(), 0);

        c.update(Contracted);
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_latches_never_both_set_after_update() {
        let mut c = counting_counter();
        let labels = [
            Extended, Contracted, Extended, Unknown, Contracted, Contracted, Extended,
        ];
        for label in labels {
            c.update(label);
            assert!(!(c.extended && c.contracted));
        }
    }

    fn label_strategy() -> impl Strategy<Value = PoseLabel> {
        prop_oneof![Just(Unknown), Just(Extended), Just(Contracted)]
    }

    fn run(labels: &[PoseLabel]) -> RepCounter {
        let mut c = counting_counter();
        for &label in labels {
            c.update(label);
        }
        c
    }

    proptest! {
        /// Collapsing consecutive duplicates never changes the outcome.
        #[test]
        fn prop_consecutive_duplicates_are_noops(
            labels in prop::collection::vec(label_strategy(), 0..64),
        ) {
            let mut deduped: Vec<PoseLabel> = Vec::new();
            for &label in &labels {
                if deduped.last() != Some(&label) {
                    deduped.push(label);
                }
            }

            let full = run(&labels);
            let collapsed = run(&deduped);
            prop_assert_eq!(full.count(), collapsed.count());
            prop_assert_eq!(full.extended, collapsed.extended);
            prop_assert_eq!(full.contracted, collapsed.contracted);
            prop_assert_eq!(full.last_label, collapsed.last_label);
        }

        /// Without resets the count never decreases, and each update adds at
        /// most one rep.
        #[test]
        fn prop_count_is_monotonic(
            labels in prop::collection::vec(label_strategy(), 0..64),
        ) {
            let mut c = counting_counter();
            let mut prev = 0;
            for &label in &labels {
                c.update(label);
                prop_assert!(c.count() >= prev);
                prop_assert!(c.count() - prev <= 1);
                prev = c.count();
            }
        }
    }
}
