//! Completed workout history: listing, historical edits, soft-delete and
//! CSV export.
//!
//! Edits and deletes only touch progression for exercises whose most recent
//! contributing workout is the one being changed. Affected progression is
//! rebuilt by replaying the surviving completed workouts oldest first.

use crate::app_state::get_or_init_app_state;
use crate::program::bar_weight;
use crate::progression::next_progression;
use crate::store::{Repositories, WorkoutRepository};
use crate::workout::latest_completed;
use crate::{Error, ProgressionState, Result, Workout};
use std::path::Path;
use uuid::Uuid;

/// Completed, non-deleted workouts, newest first
pub fn list_history(repository: &dyn WorkoutRepository) -> Result<Vec<Workout>> {
    let mut workouts: Vec<Workout> = repository
        .list_all()?
        .into_iter()
        .filter(|w| w.completed && !w.deleted)
        .collect();
    workouts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    Ok(workouts)
}

/// Most recently completed workout containing an exercise
pub fn most_recent_for_exercise<'a>(
    workouts: &'a [Workout],
    exercise_definition_id: &str,
) -> Option<&'a Workout> {
    latest_completed(
        workouts
            .iter()
            .filter(|w| w.contains_exercise(exercise_definition_id)),
    )
}

/// Rebuild an exercise's progression from completed workouts
///
/// Starts from the oldest contributing workout's work weight with no
/// failures, then applies each workout in completion order. The stored
/// increment and preferred bar are kept. Returns `None` when no workout
/// contains the exercise.
pub fn replay_progression(stored: &ProgressionState, workouts: &[Workout]) -> Option<ProgressionState> {
    let exercise_id = stored.exercise_definition_id.as_str();
    let mut contributing: Vec<&Workout> = workouts
        .iter()
        .filter(|w| w.completed && !w.deleted && w.completed_at.is_some())
        .filter(|w| w.contains_exercise(exercise_id))
        .collect();
    contributing.sort_by_key(|w| w.completed_at);

    let first = contributing.first()?.instance_for(exercise_id)?;
    let mut state = ProgressionState {
        current_weight: first.work_weight,
        failure_streak: 0,
        ..stored.clone()
    };

    for workout in contributing {
        let Some(instance) = workout.instance_for(exercise_id) else {
            continue;
        };
        let performed = ProgressionState {
            current_weight: instance.work_weight,
            ..state.clone()
        };
        let outcome = next_progression(&performed, &instance.sets, bar_weight(&instance.bar_type_id));
        state = outcome.apply_to(&state);
        state.last_workout_at = workout.completed_at;
    }

    Some(state)
}

fn require_editable(repos: Repositories<'_>, workout_id: Uuid) -> Result<Workout> {
    let app_state = get_or_init_app_state(repos.app_state)?;
    if app_state.active_workout_id == Some(workout_id) {
        return Err(Error::InvalidOperation(
            "The active workout cannot be changed from history".into(),
        ));
    }

    let workout = repos
        .workouts
        .get_by_id(workout_id)?
        .ok_or_else(|| Error::NotFound(format!("Workout {}", workout_id)))?;
    if workout.deleted {
        return Err(Error::InvalidOperation(format!("Workout {} is deleted", workout_id)));
    }
    if !workout.completed {
        return Err(Error::InvalidOperation(format!(
            "Workout {} is not completed",
            workout_id
        )));
    }
    Ok(workout)
}

fn load_progression(repos: Repositories<'_>, exercise_definition_id: &str) -> Result<ProgressionState> {
    repos
        .progressions
        .get_by_exercise_definition_id(exercise_definition_id)?
        .ok_or_else(|| {
            Error::Integrity(format!(
                "Missing progression state for {}",
                exercise_definition_id
            ))
        })
}

/// Apply set results from `draft` to a completed workout
///
/// Only each set's status and actual reps are taken from the draft, matched
/// by set id. Progression is recomputed for the exercises whose sets changed,
/// provided this workout is still their most recent contributor.
pub fn update_completed_workout(repos: Repositories<'_>, draft: &Workout) -> Result<Workout> {
    let mut workout = require_editable(repos, draft.id)?;

    let mut affected = Vec::new();
    for exercise in workout.exercise_instances.iter_mut() {
        let mut changed = false;
        for set in exercise.sets.iter_mut() {
            let Some(edited) = draft.find_set(set.id) else {
                continue;
            };
            if set.status != edited.status || set.actual_reps != edited.actual_reps {
                set.status = edited.status;
                set.actual_reps = edited.actual_reps;
                changed = true;
            }
        }
        if changed {
            affected.push(exercise.exercise_definition_id.clone());
        }
    }

    repos.workouts.save(&workout)?;

    let surviving = repos.workouts.list_all()?;
    for exercise_id in &affected {
        let is_latest = most_recent_for_exercise(&surviving, exercise_id)
            .is_some_and(|w| w.id == workout.id);
        if !is_latest {
            tracing::debug!(
                "Workout {} is not the latest for {}, progression unchanged",
                workout.id,
                exercise_id
            );
            continue;
        }

        let stored = load_progression(repos, exercise_id)?;
        if let Some(replayed) = replay_progression(&stored, &surviving) {
            tracing::info!(
                "Recomputed {} progression: {} -> {}",
                exercise_id,
                stored.current_weight,
                replayed.current_weight
            );
            repos.progressions.save(&replayed)?;
        }
    }

    tracing::info!("Updated historical workout {}", workout.id);
    Ok(workout)
}

/// Soft-delete a workout that is not the active one
///
/// If it was the latest completed workout, the last completed variation
/// falls back to the new latest. Exercises whose latest contributor it was
/// get their progression rebuilt from the survivors, or reset to this
/// workout's starting weight when none remain.
pub fn soft_delete_workout(repos: Repositories<'_>, workout_id: Uuid) -> Result<Workout> {
    let mut workout = require_editable(repos, workout_id)?;

    let before = repos.workouts.list_all()?;
    let was_latest_overall = latest_completed(before.iter()).is_some_and(|w| w.id == workout_id);
    let contributed: Vec<_> = workout
        .exercise_instances
        .iter()
        .filter(|e| {
            most_recent_for_exercise(&before, &e.exercise_definition_id)
                .is_some_and(|w| w.id == workout_id)
        })
        .map(|e| (e.exercise_definition_id.clone(), e.work_weight))
        .collect();

    workout.deleted = true;
    repos.workouts.save(&workout)?;

    let surviving: Vec<Workout> = before.into_iter().filter(|w| w.id != workout_id).collect();

    if was_latest_overall {
        let mut app_state = get_or_init_app_state(repos.app_state)?;
        let latest = latest_completed(surviving.iter());
        app_state.last_completed_variation = latest.map(|w| w.variation);
        app_state.last_workout_id = latest.map(|w| w.id);
        repos.app_state.save(&app_state)?;
    }

    for (exercise_id, starting_weight) in contributed {
        let stored = load_progression(repos, &exercise_id)?;
        let rebuilt = replay_progression(&stored, &surviving).unwrap_or_else(|| ProgressionState {
            current_weight: starting_weight,
            failure_streak: 0,
            last_workout_at: None,
            ..stored.clone()
        });
        tracing::info!(
            "Recomputed {} progression after delete: {} -> {}",
            exercise_id,
            stored.current_weight,
            rebuilt.current_weight
        );
        repos.progressions.save(&rebuilt)?;
    }

    tracing::info!("Soft-deleted workout {}", workout_id);
    Ok(workout)
}

/// A row in the history export, one per set
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    workout_id: String,
    completed_at: Option<String>,
    variation: String,
    exercise: String,
    set_index: u32,
    target_weight: f64,
    target_reps: u32,
    actual_reps: Option<u32>,
    status: String,
    rest_seconds: Option<u64>,
}

/// Write completed history to a CSV file, oldest workout first
///
/// Returns the number of rows written.
pub fn export_history_csv(repository: &dyn WorkoutRepository, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut history = list_history(repository)?;
    history.reverse();

    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = 0;
    for workout in &history {
        for exercise in workout.ordered_instances() {
            let mut sets: Vec<_> = exercise.sets.iter().collect();
            sets.sort_by_key(|s| s.order_index);
            for set in sets {
                writer.serialize(CsvRow {
                    workout_id: workout.id.to_string(),
                    completed_at: workout.completed_at.map(|t| t.to_rfc3339()),
                    variation: workout.variation.to_string(),
                    exercise: exercise.exercise_definition_id.clone(),
                    set_index: set.order_index + 1,
                    target_weight: set.target_weight,
                    target_reps: set.target_reps,
                    actual_reps: set.actual_reps,
                    status: set.status.to_string(),
                    rest_seconds: set.rest_elapsed_seconds,
                })?;
                rows += 1;
            }
        }
    }
    writer.flush()?;

    tracing::info!("Exported {} set rows to {:?}", rows, path);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{complete_active_workout, ensure_progression_seed, start_or_resume_workout, tap_set};
    use crate::program::{seed_exercise_definitions, seed_progression_states, stronglifts_5x5};
    use crate::store::{AppStateRepository, FileStore, MemoryStore, ProgressionStateRepository};
    use crate::{SetStatus, Variation};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        ensure_progression_seed(&store, &seed_progression_states()).unwrap();
        store
    }

    /// Start, optionally complete every set, then finish a workout on `day`
    fn run_workout(store: &MemoryStore, day: i64, succeed: bool) -> Workout {
        let repos = Repositories::from_store(store);
        let now = t0() + Duration::days(day);
        let workout = start_or_resume_workout(repos, stronglifts_5x5(), &seed_exercise_definitions(), now).unwrap();
        if succeed {
            for exercise in &workout.exercise_instances {
                for set in &exercise.sets {
                    tap_set(repos, set.id, now).unwrap();
                }
            }
        }
        complete_active_workout(repos, now + Duration::hours(1))
            .unwrap()
            .workout
    }

    fn progression(store: &MemoryStore, id: &str) -> ProgressionState {
        ProgressionStateRepository::get_by_exercise_definition_id(store, id)
            .unwrap()
            .unwrap()
    }

    fn fail_first_squat_set(workout: &Workout) -> Workout {
        let mut draft = workout.clone();
        let squat = draft
            .exercise_instances
            .iter_mut()
            .find(|e| e.exercise_definition_id == "squat")
            .unwrap();
        squat.sets[0].status = SetStatus::Failed;
        squat.sets[0].actual_reps = Some(3);
        draft
    }

    #[test]
    fn test_list_history_newest_first() {
        let store = seeded_store();
        let first = run_workout(&store, 0, true);
        let second = run_workout(&store, 2, true);
        start_or_resume_workout(
            Repositories::from_store(&store),
            stronglifts_5x5(),
            &seed_exercise_definitions(),
            t0() + Duration::days(4),
        )
        .unwrap();

        let ids: Vec<_> = list_history(&store).unwrap().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_replay_matches_incremental_progression() {
        let store = seeded_store();
        run_workout(&store, 0, true);
        run_workout(&store, 2, false);
        run_workout(&store, 4, true);

        let stored = progression(&store, "squat");
        let replayed = replay_progression(&stored, &store.all_workouts()).unwrap();
        assert_eq!(replayed, stored);
        assert_eq!(stored.current_weight, 25.0);
    }

    #[test]
    fn test_replay_without_contributors() {
        let store = seeded_store();
        run_workout(&store, 0, true);
        let stored = progression(&store, "deadlift");
        assert!(replay_progression(&stored, &store.all_workouts()).is_none());
    }

    #[test]
    fn test_edit_latest_workout_recomputes_progression() {
        let store = seeded_store();
        let workout = run_workout(&store, 0, true);
        assert_eq!(progression(&store, "squat").current_weight, 22.5);

        let updated =
            update_completed_workout(Repositories::from_store(&store), &fail_first_squat_set(&workout)).unwrap();

        assert_eq!(updated.instance_for("squat").unwrap().sets[0].status, SetStatus::Failed);
        let squat = progression(&store, "squat");
        assert_eq!(squat.current_weight, 20.0);
        assert_eq!(squat.failure_streak, 1);
        // Unchanged exercises keep their state
        assert_eq!(progression(&store, "bench-press").current_weight, 22.5);
    }

    #[test]
    fn test_edit_only_merges_set_results() {
        let store = seeded_store();
        let workout = run_workout(&store, 0, true);

        let mut draft = fail_first_squat_set(&workout);
        draft.variation = Variation::B;
        draft.exercise_instances[0].work_weight = 500.0;
        draft.exercise_instances[0].sets[0].target_weight = 500.0;

        let updated = update_completed_workout(Repositories::from_store(&store), &draft).unwrap();
        assert_eq!(updated.variation, Variation::A);
        assert_eq!(updated.exercise_instances[0].work_weight, 20.0);
        assert_eq!(updated.exercise_instances[0].sets[0].target_weight, 20.0);
        assert_eq!(updated.exercise_instances[0].sets[0].actual_reps, Some(3));
    }

    #[test]
    fn test_edit_superseded_workout_leaves_progression() {
        let store = seeded_store();
        let older = run_workout(&store, 0, true);
        run_workout(&store, 2, true);
        let before = progression(&store, "squat");

        update_completed_workout(Repositories::from_store(&store), &fail_first_squat_set(&older)).unwrap();

        assert_eq!(progression(&store, "squat"), before);
    }

    #[test]
    fn test_edit_rejects_active_and_unknown() {
        let store = seeded_store();
        let repos = Repositories::from_store(&store);
        let active =
            start_or_resume_workout(repos, stronglifts_5x5(), &seed_exercise_definitions(), t0()).unwrap();

        assert!(matches!(
            update_completed_workout(repos, &active),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            soft_delete_workout(repos, active.id),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            soft_delete_workout(repos, Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_unfinished_workout_is_not_deletable() {
        let store = seeded_store();
        let repos = Repositories::from_store(&store);
        let unfinished = Workout::new(Uuid::new_v4(), Variation::A, vec![], t0());
        WorkoutRepository::save(&store, &unfinished).unwrap();

        let result = soft_delete_workout(repos, unfinished.id);
        assert!(matches!(result, Err(Error::InvalidOperation(ref msg)) if msg.contains("not completed")));
        assert!(!WorkoutRepository::get_by_id(&store, unfinished.id).unwrap().unwrap().deleted);
        assert!(matches!(
            update_completed_workout(repos, &unfinished),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_delete_latest_restores_previous_state() {
        let store = seeded_store();
        let repos = Repositories::from_store(&store);
        run_workout(&store, 0, true);
        let squat_after_first = progression(&store, "squat");
        let latest = run_workout(&store, 2, true);
        assert_eq!(progression(&store, "squat").current_weight, 25.0);
        assert_eq!(progression(&store, "deadlift").current_weight, 42.5);

        let deleted = soft_delete_workout(repos, latest.id).unwrap();
        assert!(deleted.deleted);

        assert_eq!(progression(&store, "squat"), squat_after_first);
        let seed_deadlift = seed_progression_states()
            .into_iter()
            .find(|p| p.exercise_definition_id == "deadlift")
            .unwrap();
        assert_eq!(progression(&store, "deadlift"), seed_deadlift);

        let app_state = AppStateRepository::get(&store).unwrap().unwrap();
        assert_eq!(app_state.last_completed_variation, Some(Variation::A));

        // Alternation continues from the surviving workout
        let next = start_or_resume_workout(repos, stronglifts_5x5(), &seed_exercise_definitions(), t0() + Duration::days(3)).unwrap();
        assert_eq!(next.variation, Variation::B);
        assert!(WorkoutRepository::get_by_id(&store, latest.id).unwrap().unwrap().deleted);
        assert_eq!(list_history(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_older_workout_leaves_progression() {
        let store = seeded_store();
        let oldest = run_workout(&store, 0, true);
        run_workout(&store, 2, true);
        run_workout(&store, 4, true);
        let before: Vec<_> = ["squat", "bench-press", "barbell-row", "overhead-press", "deadlift"]
            .iter()
            .map(|id| progression(&store, id))
            .collect();

        soft_delete_workout(Repositories::from_store(&store), oldest.id).unwrap();

        let after: Vec<_> = ["squat", "bench-press", "barbell-row", "overhead-press", "deadlift"]
            .iter()
            .map(|id| progression(&store, id))
            .collect();
        assert_eq!(after, before);
        let app_state = AppStateRepository::get(&store).unwrap().unwrap();
        assert_eq!(app_state.last_completed_variation, Some(Variation::A));
    }

    #[test]
    fn test_delete_only_workout_clears_variation() {
        let store = seeded_store();
        let only = run_workout(&store, 0, false);
        assert_eq!(progression(&store, "squat").failure_streak, 1);

        soft_delete_workout(Repositories::from_store(&store), only.id).unwrap();

        let squat = progression(&store, "squat");
        assert_eq!(squat.current_weight, 20.0);
        assert_eq!(squat.failure_streak, 0);
        assert_eq!(squat.last_workout_at, None);
        let app_state = AppStateRepository::get(&store).unwrap().unwrap();
        assert_eq!(app_state.last_completed_variation, None);
        assert_eq!(app_state.last_workout_id, None);
    }

    #[test]
    fn test_export_history_csv() {
        let store = seeded_store();
        run_workout(&store, 0, true);
        run_workout(&store, 2, true);

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export").join("history.csv");
        let rows = export_history_csv(&store, &path).unwrap();

        // A: 3 x 5 sets, B: 5 + 5 + 1 sets
        assert_eq!(rows, 26);
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("workout_id,completed_at,variation,exercise"));
        let first = lines.next().unwrap();
        assert!(first.contains(",A,squat,1,20.0,5,5,completed,"));
        assert_eq!(contents.lines().count(), 27);
    }

    #[test]
    fn test_history_with_file_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let repos = Repositories::from_store(&store);
        ensure_progression_seed(&store, &seed_progression_states()).unwrap();

        let workout = start_or_resume_workout(repos, stronglifts_5x5(), &seed_exercise_definitions(), t0()).unwrap();
        complete_active_workout(repos, t0() + Duration::hours(1)).unwrap();

        let reopened = FileStore::new(temp_dir.path());
        let history = list_history(&reopened).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, workout.id);

        soft_delete_workout(Repositories::from_store(&reopened), workout.id).unwrap();
        assert!(list_history(&reopened).unwrap().is_empty());
    }
}
