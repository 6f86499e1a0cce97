//! Progression logic for linear barbell progression.
//!
//! Rules:
//! - Success (every work set completed at or above target reps): add the
//!   plate increment and reset the failure streak
//! - Failure: bump the failure streak; on the third consecutive failure,
//!   deload to 90% rounded down to the increment (never below the bar) and
//!   reset the streak

use crate::{Error, ProgressionState, Result, Set, SetStatus, SetType};

/// Consecutive failures that trigger a deload
pub const DELOAD_AFTER_FAILURES: u32 = 3;

/// Fraction of the working weight kept on deload
pub const DELOAD_FACTOR: f64 = 0.9;

/// Result of evaluating one exercise's sets
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressionOutcome {
    pub next_weight: f64,
    pub next_failure_streak: u32,
    pub success: bool,
    pub deloaded: bool,
}

impl ProgressionOutcome {
    /// Apply this outcome to a stored progression state
    pub fn apply_to(&self, state: &ProgressionState) -> ProgressionState {
        ProgressionState {
            current_weight: self.next_weight,
            failure_streak: self.next_failure_streak,
            ..state.clone()
        }
    }
}

/// Whether an exercise's sets count as a successful session
///
/// Needs at least one work set; warmups are ignored.
pub fn is_successful(sets: &[Set]) -> bool {
    let mut work_sets = sets.iter().filter(|s| s.set_type == SetType::Work).peekable();

    if work_sets.peek().is_none() {
        return false;
    }

    work_sets.all(|set| {
        set.status == SetStatus::Completed
            && set.actual_reps.is_some_and(|reps| reps >= set.target_reps)
    })
}

/// Compute the next progression for an exercise after a session
///
/// `state.current_weight` must already be the weight the session was
/// performed at, and `state.plate_increment` the increment that governs it.
pub fn next_progression(state: &ProgressionState, sets: &[Set], bar_weight: f64) -> ProgressionOutcome {
    let success = is_successful(sets);

    if success {
        return ProgressionOutcome {
            next_weight: state.current_weight + state.plate_increment,
            next_failure_streak: 0,
            success,
            deloaded: false,
        };
    }

    let failure_streak = state.failure_streak + 1;
    if failure_streak < DELOAD_AFTER_FAILURES {
        return ProgressionOutcome {
            next_weight: state.current_weight,
            next_failure_streak: failure_streak,
            success,
            deloaded: false,
        };
    }

    // Order of operations matters for fixtures: 97.5 * 0.9 = 87.75 -> 87.5
    let deloaded_weight = ((state.current_weight * DELOAD_FACTOR) / state.plate_increment).floor()
        * state.plate_increment;

    tracing::debug!(
        "Deload for {}: {} -> {}",
        state.exercise_definition_id,
        state.current_weight,
        deloaded_weight.max(bar_weight)
    );

    ProgressionOutcome {
        next_weight: deloaded_weight.max(bar_weight),
        next_failure_streak: 0,
        success,
        deloaded: true,
    }
}

/// Validate a user-supplied plate increment
pub fn validate_increment(plate_increment: f64) -> Result<f64> {
    if !plate_increment.is_finite() || plate_increment <= 0.0 {
        return Err(Error::InvalidOperation(
            "Increment must be a positive number".into(),
        ));
    }
    Ok(plate_increment)
}
