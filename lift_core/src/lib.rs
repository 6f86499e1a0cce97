#![forbid(unsafe_code)]

//! Core domain model and business logic for the lift5x5 tracker.
//!
//! This crate provides:
//! - Domain types (workouts, sets, progression, stopwatch, app state)
//! - The built-in 5x5 program and bar catalog
//! - Progression, plate, set tap and stopwatch engines
//! - Persistence (repository traits, JSON file store, in-memory store)
//! - Workout lifecycle and history orchestration

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod program;
pub mod plates;
pub mod progression;
pub mod set_tap;
pub mod stopwatch;
pub mod workout;
pub mod store;
pub mod app_state;
pub mod lifecycle;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use program::{stronglifts_5x5, Program};
pub use store::{FileStore, MemoryStore, Repositories};
pub use lifecycle::{complete_active_workout, start_or_resume_workout, tap_set};
pub use history::{list_history, soft_delete_workout, update_completed_workout};
