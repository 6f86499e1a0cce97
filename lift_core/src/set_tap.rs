//! Tap-to-cycle set state machine.
//!
//! First tap records the set as done at target reps. Each further tap takes
//! one rep off and marks the set failed. Tapping past zero resets it.

use crate::{Set, SetStatus};

/// Status and reps a set moves to on the next tap
pub fn next_set_state(set: &Set) -> (SetStatus, Option<u32>) {
    match set.status {
        SetStatus::Pending => (SetStatus::Completed, Some(set.target_reps)),
        SetStatus::Completed | SetStatus::Failed => {
            match set.actual_reps.unwrap_or(set.target_reps) {
                0 => (SetStatus::Pending, None),
                reps => (SetStatus::Failed, Some(reps - 1)),
            }
        }
    }
}

/// Copy of `set` after one tap
pub fn tap(set: &Set) -> Set {
    let (status, actual_reps) = next_set_state(set);
    Set {
        status,
        actual_reps,
        ..set.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SetType;
    use uuid::Uuid;

    fn pending_set(target_reps: u32) -> Set {
        Set {
            id: Uuid::new_v4(),
            order_index: 0,
            set_type: SetType::Work,
            enabled: true,
            target_weight: 60.0,
            target_reps,
            actual_weight: None,
            actual_reps: None,
            status: SetStatus::Pending,
            rest_elapsed_seconds: None,
        }
    }

    #[test]
    fn test_first_tap_completes_at_target() {
        let set = tap(&pending_set(5));
        assert_eq!(set.status, SetStatus::Completed);
        assert_eq!(set.actual_reps, Some(5));
    }

    #[test]
    fn test_full_cycle_returns_to_pending() {
        let mut set = pending_set(5);
        let mut seen = Vec::new();

        for _ in 0..7 {
            set = tap(&set);
            seen.push((set.status, set.actual_reps));
        }

        assert_eq!(
            seen,
            vec![
                (SetStatus::Completed, Some(5)),
                (SetStatus::Failed, Some(4)),
                (SetStatus::Failed, Some(3)),
                (SetStatus::Failed, Some(2)),
                (SetStatus::Failed, Some(1)),
                (SetStatus::Failed, Some(0)),
                (SetStatus::Pending, None),
            ]
        );
    }

    #[test]
    fn test_completed_without_reps_uses_target() {
        let mut set = pending_set(5);
        set.status = SetStatus::Completed;

        assert_eq!(next_set_state(&set), (SetStatus::Failed, Some(4)));
    }

    #[test]
    fn test_tap_keeps_other_fields() {
        let mut set = pending_set(3);
        set.rest_elapsed_seconds = Some(95);

        let tapped = tap(&set);
        assert_eq!(tapped.id, set.id);
        assert_eq!(tapped.rest_elapsed_seconds, Some(95));
        assert_eq!(tapped.target_weight, 60.0);
    }
}
