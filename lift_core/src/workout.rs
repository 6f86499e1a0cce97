//! Workout construction and navigation.
//!
//! - Building exercise instances and sets from the program table
//! - Workout start/finish timing
//! - Set lookup and workout-wide set ordering
//! - A/B variation alternation

use crate::program::{Program, DEFAULT_BAR_TYPE_ID};
use crate::{
    Error, ExerciseDefinition, ExerciseInstance, ProgressionState, Result, Set, SetStatus,
    SetType, Variation, Workout,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Build the exercise instances for one workout
///
/// Every exercise of the variation must have a definition, a progression
/// state and a set scheme; any gap is a data integrity error.
pub fn build_exercises(
    program: &Program,
    workout_id: Uuid,
    variation: Variation,
    definitions: &HashMap<String, ExerciseDefinition>,
    progressions: &HashMap<String, ProgressionState>,
) -> Result<Vec<ExerciseInstance>> {
    program
        .exercise_order(variation)
        .iter()
        .enumerate()
        .map(|(index, exercise_id)| {
            let definition = definitions.get(exercise_id).ok_or_else(|| {
                Error::Integrity(format!("Missing exercise definition: {}", exercise_id))
            })?;
            let progression = progressions.get(exercise_id).ok_or_else(|| {
                Error::Integrity(format!("Missing progression state: {}", exercise_id))
            })?;
            let scheme = program.set_scheme(exercise_id).ok_or_else(|| {
                Error::Integrity(format!("Missing set scheme: {}", exercise_id))
            })?;

            let sets = (0..scheme.sets)
                .map(|order_index| Set {
                    id: Uuid::new_v4(),
                    order_index,
                    set_type: SetType::Work,
                    enabled: true,
                    target_weight: progression.current_weight,
                    target_reps: scheme.reps,
                    actual_weight: None,
                    actual_reps: None,
                    status: SetStatus::Pending,
                    rest_elapsed_seconds: None,
                })
                .collect();

            Ok(ExerciseInstance {
                id: Uuid::new_v4(),
                exercise_definition_id: definition.id.clone(),
                workout_id,
                order_index: index as u32,
                sets,
                work_weight: progression.current_weight,
                bar_type_id: progression
                    .preferred_bar_type_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BAR_TYPE_ID.to_string()),
                use_shared_bar_loading: false,
                notes: None,
            })
        })
        .collect()
}

/// Variation to train next given stored workouts
///
/// Alternates from the most recently completed, non-deleted workout;
/// `A` when there is none.
pub fn next_variation(workouts: &[Workout]) -> Variation {
    latest_completed(workouts.iter())
        .map(|w| w.variation.other())
        .unwrap_or(Variation::A)
}

/// Most recently completed, non-deleted workout by `completed_at`
pub fn latest_completed<'a>(workouts: impl Iterator<Item = &'a Workout>) -> Option<&'a Workout> {
    workouts
        .filter(|w| w.completed && !w.deleted && w.completed_at.is_some())
        .max_by_key(|w| w.completed_at)
}

impl Workout {
    /// A new, started workout
    pub fn new(id: Uuid, variation: Variation, exercise_instances: Vec<ExerciseInstance>, now: DateTime<Utc>) -> Self {
        let mut workout = Self {
            id,
            performed_at: now,
            exercise_instances,
            variation,
            completed: false,
            started_at: None,
            completed_at: None,
            deleted: false,
            notes: None,
        };
        workout.start(now);
        workout
    }

    /// Mark started if not started yet
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_some() {
            return;
        }
        self.started_at = Some(now);
        self.completed_at = None;
        self.completed = false;
    }

    /// Mark completed if not completed yet
    pub fn finish(&mut self, now: DateTime<Utc>) {
        if self.completed_at.is_some() {
            return;
        }
        self.completed_at = Some(now);
        self.completed = true;
    }

    /// Milliseconds between start and completion (or `now` while active)
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or(now);
        Some((end - started).num_milliseconds().max(0))
    }

    pub fn is_active(&self) -> bool {
        !self.completed && !self.deleted
    }

    pub fn find_set(&self, set_id: Uuid) -> Option<&Set> {
        self.exercise_instances
            .iter()
            .flat_map(|e| e.sets.iter())
            .find(|s| s.id == set_id)
    }

    pub fn find_set_mut(&mut self, set_id: Uuid) -> Option<&mut Set> {
        self.exercise_instances
            .iter_mut()
            .flat_map(|e| e.sets.iter_mut())
            .find(|s| s.id == set_id)
    }

    /// Instance for an exercise definition, if this workout contains it
    pub fn instance_for(&self, exercise_definition_id: &str) -> Option<&ExerciseInstance> {
        self.exercise_instances
            .iter()
            .find(|e| e.exercise_definition_id == exercise_definition_id)
    }

    pub fn contains_exercise(&self, exercise_definition_id: &str) -> bool {
        self.instance_for(exercise_definition_id).is_some()
    }

    /// Instances sorted by their order index
    pub fn ordered_instances(&self) -> Vec<&ExerciseInstance> {
        let mut instances: Vec<_> = self.exercise_instances.iter().collect();
        instances.sort_by_key(|e| e.order_index);
        instances
    }

    /// Enabled sets across the workout: exercises by order, then sets by order
    pub fn ordered_enabled_sets(&self) -> Vec<&Set> {
        self.ordered_instances()
            .into_iter()
            .flat_map(|e| {
                let mut sets: Vec<&Set> = e.sets.iter().filter(|s| s.enabled).collect();
                sets.sort_by_key(|s| s.order_index);
                sets
            })
            .collect()
    }

    /// Enabled set immediately before `set_id` in workout order
    pub fn previous_enabled_set(&self, set_id: Uuid) -> Option<&Set> {
        let ordered = self.ordered_enabled_sets();
        let index = ordered.iter().position(|s| s.id == set_id)?;
        index.checked_sub(1).map(|i| ordered[i])
    }

    /// Last enabled set in workout order
    pub fn last_enabled_set(&self) -> Option<&Set> {
        self.ordered_enabled_sets().last().copied()
    }
}
