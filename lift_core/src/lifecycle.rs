//! Active workout lifecycle.
//!
//! The app state's `active_workout_id` is the single pointer to the one
//! in-progress workout. This module starts or resumes it, mutates it (set
//! taps, work weight, variation switch) and finally completes or abandons
//! it.
//!
//! Multi-record updates are sequential writes with no rollback: completion
//! saves the workout, then each progression state, then the app state. A
//! crash part way leaves the earlier writes in place.

use crate::app_state::get_or_init_app_state;
use crate::program::{bar_weight, bar_type, Program};
use crate::progression::{next_progression, validate_increment, ProgressionOutcome};
use crate::stopwatch::{handle_set_completion, rest_seconds};
use crate::store::{ProgressionStateRepository, Repositories};
use crate::workout::{build_exercises, next_variation};
use crate::{
    Error, ExerciseDefinition, ProgressionState, Result, Set, SetStatus, StopwatchState,
    Variation, Workout,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Return the active workout, clearing a pointer to a missing or finished one
pub fn get_active_workout(repos: Repositories<'_>) -> Result<Option<Workout>> {
    let mut app_state = get_or_init_app_state(repos.app_state)?;
    let Some(active_id) = app_state.active_workout_id else {
        return Ok(None);
    };

    match repos.workouts.get_by_id(active_id)? {
        Some(workout) if workout.is_active() => Ok(Some(workout)),
        _ => {
            tracing::warn!("Clearing stale active workout pointer {}", active_id);
            app_state.active_workout_id = None;
            repos.app_state.save(&app_state)?;
            Ok(None)
        }
    }
}

fn require_active_workout(repos: Repositories<'_>, action: &str) -> Result<Workout> {
    get_active_workout(repos)?
        .ok_or_else(|| Error::InvalidOperation(format!("No active workout to {}", action)))
}

fn progression_map(repos: Repositories<'_>) -> Result<HashMap<String, ProgressionState>> {
    Ok(repos
        .progressions
        .list_all()?
        .into_iter()
        .map(|p| (p.exercise_definition_id.clone(), p))
        .collect())
}

/// Resume the active workout, or start a new one
///
/// A new workout alternates from the last completed variation; when none is
/// recorded it is derived from stored history, defaulting to `A`.
pub fn start_or_resume_workout(
    repos: Repositories<'_>,
    program: &Program,
    definitions: &HashMap<String, ExerciseDefinition>,
    now: DateTime<Utc>,
) -> Result<Workout> {
    if let Some(active) = get_active_workout(repos)? {
        tracing::info!("Resuming active workout {}", active.id);
        return Ok(active);
    }

    let mut app_state = get_or_init_app_state(repos.app_state)?;
    let variation = match app_state.last_completed_variation {
        Some(last) => last.other(),
        None => next_variation(&repos.workouts.list_all()?),
    };

    let workout_id = Uuid::new_v4();
    let exercises = build_exercises(
        program,
        workout_id,
        variation,
        definitions,
        &progression_map(repos)?,
    )?;
    let workout = Workout::new(workout_id, variation, exercises, now);

    repos.workouts.save(&workout)?;
    app_state.active_workout_id = Some(workout.id);
    // A stopwatch dismissed by the previous workout must not block rest
    // auto-start in this one
    if app_state.active_stopwatch.as_ref().is_some_and(|s| s.dismissed) {
        app_state.active_stopwatch = None;
    }
    repos.app_state.save(&app_state)?;

    tracing::info!("Started workout {} (variation {})", workout.id, variation);
    Ok(workout)
}

/// Rebuild the active workout for another variation
///
/// Recorded set results are discarded; id and start time are kept. The new
/// variation is recorded as the last one immediately so switching back
/// alternates correctly.
pub fn switch_variation(
    repos: Repositories<'_>,
    program: &Program,
    definitions: &HashMap<String, ExerciseDefinition>,
    variation: Variation,
) -> Result<Workout> {
    let active = require_active_workout(repos, "switch")?;
    if active.variation == variation {
        return Ok(active);
    }

    let exercise_instances = build_exercises(
        program,
        active.id,
        variation,
        definitions,
        &progression_map(repos)?,
    )?;
    let updated = Workout {
        variation,
        exercise_instances,
        ..active
    };
    repos.workouts.save(&updated)?;

    let mut app_state = get_or_init_app_state(repos.app_state)?;
    app_state.last_completed_variation = Some(variation);
    repos.app_state.save(&app_state)?;

    tracing::info!("Switched workout {} to variation {}", updated.id, variation);
    Ok(updated)
}

/// Result of tapping a set
#[derive(Clone, Debug)]
pub struct TapOutcome {
    pub workout: Workout,
    pub set: Set,
    pub stopwatch: Option<StopwatchState>,
}

/// Advance one set of the active workout through the tap cycle
///
/// Completing an enabled set stamps the running rest time onto the previous
/// enabled set and (re)starts the stopwatch.
pub fn tap_set(repos: Repositories<'_>, set_id: Uuid, now: DateTime<Utc>) -> Result<TapOutcome> {
    let mut workout = require_active_workout(repos, "update")?;
    let mut app_state = get_or_init_app_state(repos.app_state)?;

    let previous = workout
        .find_set(set_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("Set {}", set_id)))?;
    let next = crate::set_tap::tap(&previous);

    let newly_completed = next.enabled
        && next.status == SetStatus::Completed
        && previous.status != SetStatus::Completed;

    if newly_completed {
        let rest = rest_seconds(app_state.active_stopwatch.as_ref(), now);
        let previous_set_id = workout.previous_enabled_set(set_id).map(|s| s.id);
        if let (Some(rest), Some(previous_set_id)) = (rest, previous_set_id) {
            if let Some(previous_set) = workout.find_set_mut(previous_set_id) {
                previous_set.rest_elapsed_seconds = Some(rest);
                tracing::debug!("Recorded {}s rest after set {}", rest, previous_set_id);
            }
        }
    }

    if let Some(slot) = workout.find_set_mut(set_id) {
        *slot = next.clone();
    }

    let stopwatch = handle_set_completion(&previous, &next, app_state.active_stopwatch.as_ref(), now);

    repos.workouts.save(&workout)?;
    if stopwatch != app_state.active_stopwatch {
        app_state.active_stopwatch = stopwatch.clone();
        repos.app_state.save(&app_state)?;
    }

    Ok(TapOutcome {
        workout,
        set: next,
        stopwatch,
    })
}

/// Parse a work weight typed by the user
pub fn parse_work_weight(input: &str) -> Result<f64> {
    let weight: f64 = input
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("'{}' is not a number", input.trim())))?;
    validate_work_weight(weight)
}

fn validate_work_weight(weight: f64) -> Result<f64> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(Error::Validation(format!(
            "Work weight must be a positive number, got {}",
            weight
        )));
    }
    Ok(weight)
}

/// Change the working weight of one exercise in the active workout
pub fn update_work_weight(repos: Repositories<'_>, exercise_instance_id: Uuid, work_weight: f64) -> Result<Workout> {
    let work_weight = validate_work_weight(work_weight)?;
    let mut workout = require_active_workout(repos, "update")?;

    let exercise = workout
        .exercise_instances
        .iter_mut()
        .find(|e| e.id == exercise_instance_id)
        .ok_or_else(|| Error::NotFound(format!("Exercise instance {}", exercise_instance_id)))?;
    exercise.work_weight = work_weight;

    repos.workouts.save(&workout)?;
    Ok(workout)
}

/// Progression change for one exercise on completion
#[derive(Clone, Debug)]
pub struct ExerciseProgression {
    pub exercise_definition_id: String,
    pub performed_weight: f64,
    pub outcome: ProgressionOutcome,
}

/// Result of completing the active workout
#[derive(Clone, Debug)]
pub struct CompletionSummary {
    pub workout: Workout,
    pub progressions: Vec<ExerciseProgression>,
}

/// Finish the active workout and advance every exercise's progression
///
/// Each exercise progresses from its instance work weight (not the stored
/// current weight) using the bar its instance was loaded on.
pub fn complete_active_workout(repos: Repositories<'_>, now: DateTime<Utc>) -> Result<CompletionSummary> {
    let mut app_state = get_or_init_app_state(repos.app_state)?;
    let active_id = app_state
        .active_workout_id
        .ok_or_else(|| Error::InvalidOperation("No active workout to complete".into()))?;
    let mut workout = repos
        .workouts
        .get_by_id(active_id)?
        .ok_or_else(|| Error::Integrity(format!("Active workout {} not found", active_id)))?;
    if !workout.is_active() {
        return Err(Error::InvalidOperation(format!(
            "Workout {} is already completed",
            active_id
        )));
    }

    let mut updates = Vec::new();
    let mut progressions = Vec::new();
    for exercise in workout.ordered_instances() {
        let stored = repos
            .progressions
            .get_by_exercise_definition_id(&exercise.exercise_definition_id)?
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "Missing progression state for {}",
                    exercise.exercise_definition_id
                ))
            })?;

        let performed = ProgressionState {
            current_weight: exercise.work_weight,
            ..stored.clone()
        };
        let outcome = next_progression(&performed, &exercise.sets, bar_weight(&exercise.bar_type_id));
        if outcome.deloaded {
            tracing::info!(
                "Deloading {} to {}",
                exercise.exercise_definition_id,
                outcome.next_weight
            );
        }

        let mut updated = outcome.apply_to(&stored);
        updated.last_workout_at = Some(now);
        updates.push(updated);
        progressions.push(ExerciseProgression {
            exercise_definition_id: exercise.exercise_definition_id.clone(),
            performed_weight: exercise.work_weight,
            outcome,
        });
    }

    workout.finish(now);

    if let Some(rest) = rest_seconds(app_state.active_stopwatch.as_ref(), now) {
        let last = workout
            .last_enabled_set()
            .filter(|s| s.status == SetStatus::Completed)
            .map(|s| s.id);
        if let Some(set) = last.and_then(|id| workout.find_set_mut(id)) {
            set.rest_elapsed_seconds = Some(rest);
        }
    }

    if let Some(stopwatch) = app_state.active_stopwatch.as_mut() {
        stopwatch.dismiss();
    }
    app_state.active_workout_id = None;
    app_state.last_workout_id = Some(workout.id);
    app_state.last_completed_variation = Some(workout.variation);

    repos.workouts.save(&workout)?;
    for update in &updates {
        repos.progressions.save(update)?;
    }
    repos.app_state.save(&app_state)?;

    tracing::info!("Completed workout {} (variation {})", workout.id, workout.variation);
    Ok(CompletionSummary {
        workout,
        progressions,
    })
}

/// Hard-delete the active workout and clear the pointer
///
/// Returns the id of the discarded workout, if there was one.
pub fn abandon_active_workout(repos: Repositories<'_>) -> Result<Option<Uuid>> {
    let mut app_state = get_or_init_app_state(repos.app_state)?;
    let Some(active_id) = app_state.active_workout_id else {
        return Ok(None);
    };

    repos.workouts.delete_by_id(active_id)?;
    app_state.active_workout_id = None;
    repos.app_state.save(&app_state)?;

    tracing::info!("Abandoned workout {}", active_id);
    Ok(Some(active_id))
}

/// Store any seed progression whose exercise has no state yet
///
/// Returns how many entries were written.
pub fn ensure_progression_seed(
    repository: &dyn ProgressionStateRepository,
    seed: &[ProgressionState],
) -> Result<usize> {
    let mut written = 0;
    for entry in seed {
        if repository
            .get_by_exercise_definition_id(&entry.exercise_definition_id)?
            .is_none()
        {
            repository.save(entry)?;
            written += 1;
        }
    }
    if written > 0 {
        tracing::info!("Seeded {} progression states", written);
    }
    Ok(written)
}

fn require_progression(
    repository: &dyn ProgressionStateRepository,
    exercise_definition_id: &str,
) -> Result<ProgressionState> {
    repository
        .get_by_exercise_definition_id(exercise_definition_id)?
        .ok_or_else(|| {
            Error::NotFound(format!("Progression state for {}", exercise_definition_id))
        })
}

/// Change the weight increment used for an exercise's progression
pub fn update_progression_increment(
    repository: &dyn ProgressionStateRepository,
    exercise_definition_id: &str,
    plate_increment: f64,
) -> Result<ProgressionState> {
    let plate_increment = validate_increment(plate_increment)?;
    let mut state = require_progression(repository, exercise_definition_id)?;
    state.plate_increment = plate_increment;
    repository.save(&state)?;
    Ok(state)
}

/// Choose the bar new workouts load for an exercise
pub fn update_preferred_bar(
    repository: &dyn ProgressionStateRepository,
    exercise_definition_id: &str,
    bar_type_id: &str,
) -> Result<ProgressionState> {
    if bar_type(bar_type_id).is_none() {
        return Err(Error::Validation(format!("Unknown bar type: {}", bar_type_id)));
    }
    let mut state = require_progression(repository, exercise_definition_id)?;
    state.preferred_bar_type_id = Some(bar_type_id.to_string());
    repository.save(&state)?;
    Ok(state)
}
