//! Built-in StrongLifts 5×5 program, exercise seed and bar catalog.
//!
//! The program is a fixed static table: two alternating variations and a
//! set scheme (sets × reps) per exercise.

use crate::types::*;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Bar assumed when an exercise has no preferred bar
pub const DEFAULT_BAR_TYPE_ID: &str = "olympic-20kg";

/// Weight used for bar ids missing from the catalog
const FALLBACK_BAR_WEIGHT: f64 = 20.0;

/// Number of sets and target reps for one exercise
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetScheme {
    pub sets: u32,
    pub reps: u32,
}

/// A fixed training program
#[derive(Clone, Debug)]
pub struct Program {
    pub name: String,
    pub variations: HashMap<Variation, Vec<String>>,
    pub set_schemes: HashMap<String, SetScheme>,
}

impl Program {
    /// Exercise ids for a variation, in training order
    pub fn exercise_order(&self, variation: Variation) -> &[String] {
        self.variations
            .get(&variation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Set scheme for an exercise, if the program knows it
    pub fn set_scheme(&self, exercise_definition_id: &str) -> Option<SetScheme> {
        self.set_schemes.get(exercise_definition_id).copied()
    }

    /// Every exercise id referenced by any variation, deduplicated in order
    pub fn exercise_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for variation in [Variation::A, Variation::B] {
            for id in self.exercise_order(variation) {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    /// Check the program against a set of exercise definitions
    ///
    /// Returns a list of problems; an empty list means the program is usable.
    pub fn validate(&self, definitions: &HashMap<String, ExerciseDefinition>) -> Vec<String> {
        let mut errors = Vec::new();

        for variation in [Variation::A, Variation::B] {
            if self.exercise_order(variation).is_empty() {
                errors.push(format!("Variation {} has no exercises", variation));
            }
        }

        for id in self.exercise_ids() {
            match self.set_scheme(&id) {
                None => errors.push(format!("Exercise '{}' has no set scheme", id)),
                Some(scheme) if scheme.sets == 0 || scheme.reps == 0 => {
                    errors.push(format!("Exercise '{}' has an empty set scheme", id))
                }
                Some(_) => {}
            }
            if !definitions.contains_key(&id) {
                errors.push(format!("Exercise '{}' has no definition", id));
            }
        }

        errors
    }
}

static STRONGLIFTS_5X5: Lazy<Program> = Lazy::new(build_stronglifts_5x5);

static BAR_TYPES: Lazy<Vec<BarType>> = Lazy::new(|| {
    vec![
        BarType {
            id: "olympic-20kg".into(),
            name: "Olympic bar".into(),
            weight: 20.0,
            unit: Unit::Kg,
        },
        BarType {
            id: "training-15kg".into(),
            name: "Training bar".into(),
            weight: 15.0,
            unit: Unit::Kg,
        },
        BarType {
            id: "technique-7.5kg".into(),
            name: "Technique bar".into(),
            weight: 7.5,
            unit: Unit::Kg,
        },
    ]
});

/// Get a reference to the cached StrongLifts 5×5 program
pub fn stronglifts_5x5() -> &'static Program {
    &STRONGLIFTS_5X5
}

fn build_stronglifts_5x5() -> Program {
    let mut variations = HashMap::new();
    variations.insert(
        Variation::A,
        vec!["squat".into(), "bench-press".into(), "barbell-row".into()],
    );
    variations.insert(
        Variation::B,
        vec!["squat".into(), "overhead-press".into(), "deadlift".into()],
    );

    let mut set_schemes = HashMap::new();
    for id in ["squat", "bench-press", "barbell-row", "overhead-press"] {
        set_schemes.insert(id.to_string(), SetScheme { sets: 5, reps: 5 });
    }
    set_schemes.insert("deadlift".to_string(), SetScheme { sets: 1, reps: 5 });

    Program {
        name: "StrongLifts 5x5".into(),
        variations,
        set_schemes,
    }
}

/// Seed exercise definitions for the built-in program, keyed by id
pub fn seed_exercise_definitions() -> HashMap<String, ExerciseDefinition> {
    let created_at = DateTime::<Utc>::default();

    [
        ("squat", "Squat"),
        ("bench-press", "Bench Press"),
        ("barbell-row", "Barbell Row"),
        ("overhead-press", "Overhead Press"),
        ("deadlift", "Deadlift"),
    ]
    .into_iter()
    .map(|(id, name)| {
        (
            id.to_string(),
            ExerciseDefinition {
                id: id.into(),
                name: name.into(),
                default_plate_increment: 2.5,
                default_unit: Unit::Kg,
                default_rest_seconds: None,
                created_at,
                archived: false,
            },
        )
    })
    .collect()
}

/// Initial progression states for the built-in program
pub fn seed_progression_states() -> Vec<ProgressionState> {
    [
        ("squat", 20.0),
        ("bench-press", 20.0),
        ("overhead-press", 20.0),
        ("barbell-row", 20.0),
        ("deadlift", 40.0),
    ]
    .into_iter()
    .map(|(id, weight)| ProgressionState {
        exercise_definition_id: id.into(),
        current_weight: weight,
        failure_streak: 0,
        plate_increment: 2.5,
        unit: Unit::Kg,
        preferred_bar_type_id: None,
        last_workout_at: None,
    })
    .collect()
}

/// All bar types in the catalog
pub fn list_bar_types() -> &'static [BarType] {
    &BAR_TYPES
}

/// Look up a bar type by id
pub fn bar_type(bar_type_id: &str) -> Option<&'static BarType> {
    BAR_TYPES.iter().find(|b| b.id == bar_type_id)
}

/// Weight of a bar type, falling back to a standard 20 kg bar
pub fn bar_weight(bar_type_id: &str) -> f64 {
    match bar_type(bar_type_id) {
        Some(bar) => bar.weight,
        None => {
            tracing::warn!(
                "Unknown bar type '{}', assuming {} kg",
                bar_type_id,
                FALLBACK_BAR_WEIGHT
            );
            FALLBACK_BAR_WEIGHT
        }
    }
}
