//! Persistence for workouts, progression state and app state.
//!
//! The orchestration layer only sees the three repository traits. Two
//! implementations are provided:
//! - [`FileStore`]: JSON files in a data directory, read under a shared lock
//!   and replaced atomically under an exclusive lock
//! - [`MemoryStore`]: in-process maps for tests and throwaway sessions
//!
//! Every `save` is a full-record upsert; merging is the caller's job.

use crate::{AppState, Error, ProgressionState, Result, Workout};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Workout storage keyed by workout id
pub trait WorkoutRepository {
    /// Fetch a workout, including soft-deleted ones
    fn get_by_id(&self, id: Uuid) -> Result<Option<Workout>>;
    /// All workouts except soft-deleted ones
    fn list_all(&self) -> Result<Vec<Workout>>;
    fn save(&self, workout: &Workout) -> Result<()>;
    /// Hard delete
    fn delete_by_id(&self, id: Uuid) -> Result<()>;
}

/// Progression storage keyed by exercise definition id
pub trait ProgressionStateRepository {
    fn get_by_exercise_definition_id(&self, exercise_definition_id: &str) -> Result<Option<ProgressionState>>;
    fn list_all(&self) -> Result<Vec<ProgressionState>>;
    fn save(&self, state: &ProgressionState) -> Result<()>;
    fn delete_by_exercise_definition_id(&self, exercise_definition_id: &str) -> Result<()>;
}

/// Singleton app state storage
pub trait AppStateRepository {
    fn get(&self) -> Result<Option<AppState>>;
    fn save(&self, state: &AppState) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// The repositories one orchestration call needs
#[derive(Clone, Copy)]
pub struct Repositories<'a> {
    pub workouts: &'a dyn WorkoutRepository,
    pub progressions: &'a dyn ProgressionStateRepository,
    pub app_state: &'a dyn AppStateRepository,
}

impl<'a> Repositories<'a> {
    /// Use a single store for all three repositories
    pub fn from_store<S>(store: &'a S) -> Self
    where
        S: WorkoutRepository + ProgressionStateRepository + AppStateRepository,
    {
        Self {
            workouts: store,
            progressions: store,
            app_state: store,
        }
    }
}

// ============================================================================
// File-backed store
// ============================================================================

const WORKOUTS_FILE: &str = "workouts.json";
const PROGRESSIONS_FILE: &str = "progressions.json";
const APP_STATE_FILE: &str = "app_state.json";

/// JSON file store rooted at a data directory
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store in `dir`. Files are created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn workouts_path(&self) -> PathBuf {
        self.dir.join(WORKOUTS_FILE)
    }

    pub fn progressions_path(&self) -> PathBuf {
        self.dir.join(PROGRESSIONS_FILE)
    }

    pub fn app_state_path(&self) -> PathBuf {
        self.dir.join(APP_STATE_FILE)
    }

    fn load_workouts(&self) -> Result<Vec<Workout>> {
        Ok(read_collection(&self.workouts_path())?.unwrap_or_default())
    }

    fn load_progressions(&self) -> Result<Vec<ProgressionState>> {
        Ok(read_collection(&self.progressions_path())?.unwrap_or_default())
    }
}

/// Read a file's contents under a shared lock
///
/// Returns `None` if the file does not exist or holds only whitespace.
fn read_locked(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        tracing::debug!("No store file at {:?}", path);
        return Ok(None);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    if contents.trim().is_empty() {
        tracing::debug!("Empty store file at {:?}", path);
        return Ok(None);
    }
    Ok(Some(contents))
}

/// Read a multi-record file
///
/// Every save rewrites the whole collection, so an unreadable or corrupted
/// file is an integrity error: reading it as empty would let the next write
/// wipe the records it still holds.
fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = read_locked(path).map_err(|e| {
        Error::Integrity(format!("Unable to read store file {}: {}", path.display(), e))
    })?;
    let Some(contents) = contents else {
        return Ok(None);
    };

    serde_json::from_str(&contents).map(Some).map_err(|e| {
        tracing::error!("Corrupted store file {:?}: {}", path, e);
        Error::Integrity(format!(
            "Corrupted store file {}: {}. Repair or move it aside to continue.",
            path.display(),
            e
        ))
    })
}

/// Read a single-record file, falling back to `None` on corruption
///
/// The record is rewritten whole on every save, so nothing else is lost by
/// starting over from defaults.
fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match read_locked(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!("Failed to read store file {:?}: {}. Treating as empty.", path, e);
            return Ok(None);
        }
    };
    let Some(contents) = contents else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Failed to parse store file {:?}: {}. Treating as empty.", path, e);
            Ok(None)
        }
    }
}

/// Replace a JSON document atomically
///
/// Writes to a locked temp file in the same directory, syncs it, then
/// renames it over the original.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Wrote store file {:?}", path);
    Ok(())
}

impl WorkoutRepository for FileStore {
    fn get_by_id(&self, id: Uuid) -> Result<Option<Workout>> {
        Ok(self.load_workouts()?.into_iter().find(|w| w.id == id))
    }

    fn list_all(&self) -> Result<Vec<Workout>> {
        let mut workouts = self.load_workouts()?;
        workouts.retain(|w| !w.deleted);
        Ok(workouts)
    }

    fn save(&self, workout: &Workout) -> Result<()> {
        let mut workouts = self.load_workouts()?;
        match workouts.iter_mut().find(|w| w.id == workout.id) {
            Some(existing) => *existing = workout.clone(),
            None => workouts.push(workout.clone()),
        }
        write_json(&self.workouts_path(), &workouts)
    }

    fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let mut workouts = self.load_workouts()?;
        workouts.retain(|w| w.id != id);
        write_json(&self.workouts_path(), &workouts)
    }
}

impl ProgressionStateRepository for FileStore {
    fn get_by_exercise_definition_id(&self, exercise_definition_id: &str) -> Result<Option<ProgressionState>> {
        Ok(self
            .load_progressions()?
            .into_iter()
            .find(|p| p.exercise_definition_id == exercise_definition_id))
    }

    fn list_all(&self) -> Result<Vec<ProgressionState>> {
        self.load_progressions()
    }

    fn save(&self, state: &ProgressionState) -> Result<()> {
        let mut states = self.load_progressions()?;
        match states
            .iter_mut()
            .find(|p| p.exercise_definition_id == state.exercise_definition_id)
        {
            Some(existing) => *existing = state.clone(),
            None => states.push(state.clone()),
        }
        write_json(&self.progressions_path(), &states)
    }

    fn delete_by_exercise_definition_id(&self, exercise_definition_id: &str) -> Result<()> {
        let mut states = self.load_progressions()?;
        states.retain(|p| p.exercise_definition_id != exercise_definition_id);
        write_json(&self.progressions_path(), &states)
    }
}

impl AppStateRepository for FileStore {
    fn get(&self) -> Result<Option<AppState>> {
        read_record(&self.app_state_path())
    }

    fn save(&self, state: &AppState) -> Result<()> {
        write_json(&self.app_state_path(), state)
    }

    fn clear(&self) -> Result<()> {
        let path = self.app_state_path();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Repositories backed by in-process maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    workouts: RefCell<BTreeMap<Uuid, Workout>>,
    progressions: RefCell<BTreeMap<String, ProgressionState>>,
    app_state: RefCell<Option<AppState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored workout, soft-deleted ones included
    pub fn all_workouts(&self) -> Vec<Workout> {
        self.workouts.borrow().values().cloned().collect()
    }
}

impl WorkoutRepository for MemoryStore {
    fn get_by_id(&self, id: Uuid) -> Result<Option<Workout>> {
        Ok(self.workouts.borrow().get(&id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Workout>> {
        Ok(self
            .workouts
            .borrow()
            .values()
            .filter(|w| !w.deleted)
            .cloned()
            .collect())
    }

    fn save(&self, workout: &Workout) -> Result<()> {
        self.workouts.borrow_mut().insert(workout.id, workout.clone());
        Ok(())
    }

    fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.workouts.borrow_mut().remove(&id);
        Ok(())
    }
}

impl ProgressionStateRepository for MemoryStore {
    fn get_by_exercise_definition_id(&self, exercise_definition_id: &str) -> Result<Option<ProgressionState>> {
        Ok(self.progressions.borrow().get(exercise_definition_id).cloned())
    }

    fn list_all(&self) -> Result<Vec<ProgressionState>> {
        Ok(self.progressions.borrow().values().cloned().collect())
    }

    fn save(&self, state: &ProgressionState) -> Result<()> {
        self.progressions
            .borrow_mut()
            .insert(state.exercise_definition_id.clone(), state.clone());
        Ok(())
    }

    fn delete_by_exercise_definition_id(&self, exercise_definition_id: &str) -> Result<()> {
        self.progressions.borrow_mut().remove(exercise_definition_id);
        Ok(())
    }
}

impl AppStateRepository for MemoryStore {
    fn get(&self) -> Result<Option<AppState>> {
        Ok(self.app_state.borrow().clone())
    }

    fn save(&self, state: &AppState) -> Result<()> {
        *self.app_state.borrow_mut() = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.app_state.borrow_mut() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::default_app_state;
    use crate::program::seed_progression_states;
    use crate::Variation;
    use chrono::Utc;

    fn workout() -> Workout {
        Workout::new(Uuid::new_v4(), Variation::A, vec![], Utc::now())
    }

    #[test]
    fn test_file_store_workout_upsert_and_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let repos = Repositories::from_store(&store);

        let mut w = workout();
        repos.workouts.save(&w).unwrap();
        w.notes = Some("felt strong".into());
        repos.workouts.save(&w).unwrap();

        let all = repos.workouts.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            repos.workouts.get_by_id(w.id).unwrap().unwrap().notes.as_deref(),
            Some("felt strong")
        );
    }

    #[test]
    fn test_file_store_hides_soft_deleted_from_listing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let repos = Repositories::from_store(&store);

        let mut w = workout();
        w.deleted = true;
        repos.workouts.save(&w).unwrap();
        repos.workouts.save(&workout()).unwrap();

        assert_eq!(repos.workouts.list_all().unwrap().len(), 1);
        assert!(repos.workouts.get_by_id(w.id).unwrap().is_some());

        repos.workouts.delete_by_id(w.id).unwrap();
        assert!(repos.workouts.get_by_id(w.id).unwrap().is_none());
    }

    #[test]
    fn test_file_store_progressions_keyed_by_exercise() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let repos = Repositories::from_store(&store);

        for state in seed_progression_states() {
            repos.progressions.save(&state).unwrap();
        }
        let mut squat = repos
            .progressions
            .get_by_exercise_definition_id("squat")
            .unwrap()
            .unwrap();
        squat.current_weight = 62.5;
        repos.progressions.save(&squat).unwrap();

        assert_eq!(repos.progressions.list_all().unwrap().len(), 5);
        assert_eq!(
            repos
                .progressions
                .get_by_exercise_definition_id("squat")
                .unwrap()
                .unwrap()
                .current_weight,
            62.5
        );

        repos.progressions.delete_by_exercise_definition_id("squat").unwrap();
        assert!(repos
            .progressions
            .get_by_exercise_definition_id("squat")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_file_store_app_state_roundtrip_and_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().join("nested"));
        let repos = Repositories::from_store(&store);

        assert!(repos.app_state.get().unwrap().is_none());

        let mut state = default_app_state();
        state.last_completed_variation = Some(Variation::B);
        repos.app_state.save(&state).unwrap();
        assert_eq!(repos.app_state.get().unwrap(), Some(state));

        repos.app_state.clear().unwrap();
        assert!(repos.app_state.get().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_collection_is_an_integrity_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let repos = Repositories::from_store(&store);

        for state in seed_progression_states() {
            repos.progressions.save(&state).unwrap();
        }
        repos.workouts.save(&workout()).unwrap();

        // Drop the closing bracket as a torn write would
        for path in [store.workouts_path(), store.progressions_path()] {
            let contents = std::fs::read_to_string(&path).unwrap();
            std::fs::write(&path, &contents[..contents.len() - 1]).unwrap();
        }
        let workouts_before = std::fs::read_to_string(store.workouts_path()).unwrap();
        let progressions_before = std::fs::read_to_string(store.progressions_path()).unwrap();

        assert!(matches!(repos.workouts.list_all(), Err(Error::Integrity(_))));
        assert!(matches!(
            repos.progressions.get_by_exercise_definition_id("squat"),
            Err(Error::Integrity(_))
        ));
        assert!(matches!(repos.workouts.save(&workout()), Err(Error::Integrity(_))));
        let seed = seed_progression_states().remove(0);
        match repos.progressions.save(&seed) {
            Err(Error::Integrity(msg)) => assert!(msg.contains("progressions.json")),
            other => panic!("expected integrity error, got {:?}", other),
        }

        // Nothing was written over the damaged files
        assert_eq!(std::fs::read_to_string(store.workouts_path()).unwrap(), workouts_before);
        assert_eq!(
            std::fs::read_to_string(store.progressions_path()).unwrap(),
            progressions_before
        );
    }

    #[test]
    fn test_empty_collection_file_reads_as_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        std::fs::write(store.workouts_path(), "").unwrap();
        std::fs::write(store.progressions_path(), "  \n").unwrap();

        let repos = Repositories::from_store(&store);
        assert!(repos.workouts.list_all().unwrap().is_empty());
        assert!(repos.progressions.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_app_state_reads_as_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        std::fs::write(store.app_state_path(), "[1, 2").unwrap();

        let repos = Repositories::from_store(&store);
        assert!(repos.app_state.get().unwrap().is_none());

        repos.app_state.save(&default_app_state()).unwrap();
        assert!(repos.app_state.get().unwrap().is_some());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        let repos = Repositories::from_store(&store);
        repos.app_state.save(&default_app_state()).unwrap();
        repos.workouts.save(&workout()).unwrap();

        let mut names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["app_state.json", "workouts.json"]);
    }

    #[test]
    fn test_memory_store_contracts() {
        let store = MemoryStore::new();
        let repos = Repositories::from_store(&store);

        let mut w = workout();
        repos.workouts.save(&w).unwrap();
        w.deleted = true;
        repos.workouts.save(&w).unwrap();

        assert!(repos.workouts.list_all().unwrap().is_empty());
        assert_eq!(store.all_workouts().len(), 1);
        assert!(repos.app_state.get().unwrap().is_none());
    }
}
