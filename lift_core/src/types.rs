//! Core domain types for the lift5x5 tracker.
//!
//! This module defines the records shared by every engine and by storage:
//! - Exercise definitions and per-exercise progression state
//! - Workouts, exercise instances and sets
//! - The rest stopwatch and the application-wide state record
//! - Equipment inventory (bars and plates)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

// ============================================================================
// Enumerations
// ============================================================================

/// Unit of measurement for weights
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Kg,
    Lb,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Kg => write!(f, "kg"),
            Unit::Lb => write!(f, "lb"),
        }
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" => Ok(Unit::Kg),
            "lb" | "lbs" => Ok(Unit::Lb),
            other => Err(Error::Validation(format!("Unknown unit: {}", other))),
        }
    }
}

/// One of the two alternating workout templates
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variation {
    A,
    B,
}

impl Variation {
    /// The variation that follows this one
    pub fn other(self) -> Self {
        match self {
            Variation::A => Variation::B,
            Variation::B => Variation::A,
        }
    }
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variation::A => write!(f, "A"),
            Variation::B => write!(f, "B"),
        }
    }
}

impl FromStr for Variation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Variation::A),
            "B" => Ok(Variation::B),
            other => Err(Error::Validation(format!("Unknown variation: {}", other))),
        }
    }
}

/// Whether a set counts toward progression
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    Warmup,
    Work,
}

/// Outcome recorded for a set
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for SetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetStatus::Pending => write!(f, "pending"),
            SetStatus::Completed => write!(f, "completed"),
            SetStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SetStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SetStatus::Pending),
            "completed" | "done" => Ok(SetStatus::Completed),
            "failed" => Ok(SetStatus::Failed),
            other => Err(Error::Validation(format!("Unknown set status: {}", other))),
        }
    }
}

/// UI theme preference
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

// ============================================================================
// Reference data
// ============================================================================

/// A reusable exercise template (e.g. "Squat")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub default_plate_increment: f64,
    pub default_unit: Unit,
    pub default_rest_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub archived: bool,
}

/// A barbell type from the built-in catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BarType {
    pub id: String,
    pub name: String,
    pub weight: f64,
    pub unit: Unit,
}

/// Progression state for one exercise definition, keyed by its id
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressionState {
    pub exercise_definition_id: String,
    pub current_weight: f64,
    pub failure_streak: u32,
    pub plate_increment: f64,
    pub unit: Unit,
    #[serde(default)]
    pub preferred_bar_type_id: Option<String>,
    #[serde(default)]
    pub last_workout_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Workout records
// ============================================================================

/// A single set of an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Set {
    pub id: Uuid,
    pub order_index: u32,
    #[serde(rename = "type")]
    pub set_type: SetType,
    pub enabled: bool,
    pub target_weight: f64,
    pub target_reps: u32,
    #[serde(default)]
    pub actual_weight: Option<f64>,
    #[serde(default)]
    pub actual_reps: Option<u32>,
    pub status: SetStatus,
    /// Rest taken after this set, stamped when the next set completes
    #[serde(default)]
    pub rest_elapsed_seconds: Option<u64>,
}

/// An exercise as performed within one workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseInstance {
    pub id: Uuid,
    pub exercise_definition_id: String,
    pub workout_id: Uuid,
    pub order_index: u32,
    pub sets: Vec<Set>,
    /// Working load for this instance; work sets mirror it at build time
    pub work_weight: f64,
    pub bar_type_id: String,
    /// Reserved for shared-bar loading, not read by the core
    #[serde(default)]
    pub use_shared_bar_loading: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A workout session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub id: Uuid,
    pub performed_at: DateTime<Utc>,
    pub exercise_instances: Vec<ExerciseInstance>,
    pub variation: Variation,
    pub completed: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Stopwatch and application state
// ============================================================================

/// A count-up rest stopwatch. Time based, not tick based.
///
/// `start_time == None` with `dismissed == false` means paused (or never
/// advanced); a dismissed stopwatch stays frozen until restarted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StopwatchState {
    pub start_time: Option<DateTime<Utc>>,
    pub accumulated_ms: i64,
    pub alert_thresholds_sec: BTreeSet<u64>,
    pub fired_thresholds_sec: BTreeSet<u64>,
    pub dismissed: bool,
}

/// A bar owned by the user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InventoryBar {
    pub id: String,
    pub name: String,
    pub weight: f64,
    pub unit: Unit,
    pub enabled: bool,
}

/// A plate weight owned by the user. `quantity` counts plates in total, so
/// each side can use `quantity / 2`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InventoryPlate {
    pub weight: f64,
    pub unit: Unit,
    pub quantity: u32,
}

/// Global equipment inventory
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct EquipmentInventory {
    pub bars: Vec<InventoryBar>,
    pub plates: Vec<InventoryPlate>,
}

/// Identifier of the singleton application state record
pub const APP_STATE_ID: &str = "app";

/// Application-wide state. One record, passed explicitly and persisted
/// through an [`AppStateRepository`](crate::store::AppStateRepository).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    pub id: String,
    pub active_stopwatch: Option<StopwatchState>,
    #[serde(default)]
    pub active_workout_id: Option<Uuid>,
    #[serde(default)]
    pub last_workout_id: Option<Uuid>,
    #[serde(default)]
    pub last_completed_variation: Option<Variation>,
    pub unit_preference: Unit,
    pub theme: Theme,
    #[serde(default)]
    pub equipment_inventory: Option<EquipmentInventory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variation_alternates() {
        assert_eq!(Variation::A.other(), Variation::B);
        assert_eq!(Variation::B.other(), Variation::A);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("b".parse::<Variation>().unwrap(), Variation::B);
        assert_eq!("Failed".parse::<SetStatus>().unwrap(), SetStatus::Failed);
        assert_eq!("lbs".parse::<Unit>().unwrap(), Unit::Lb);
        assert!("C".parse::<Variation>().is_err());
        assert!("skipped".parse::<SetStatus>().is_err());
    }

    #[test]
    fn test_set_type_serializes_as_type() {
        let set = Set {
            id: Uuid::new_v4(),
            order_index: 0,
            set_type: SetType::Work,
            enabled: true,
            target_weight: 60.0,
            target_reps: 5,
            actual_weight: None,
            actual_reps: None,
            status: SetStatus::Pending,
            rest_elapsed_seconds: None,
        };

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["type"], "work");
        assert_eq!(json["status"], "pending");
    }
}
