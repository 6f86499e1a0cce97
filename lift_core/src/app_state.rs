//! Application state record: defaults, lazy initialization and the small
//! updates the front end makes outside of a workout (equipment, stopwatch).

use crate::program::list_bar_types;
use crate::store::AppStateRepository;
use crate::{
    AppState, EquipmentInventory, Error, InventoryBar, InventoryPlate, Result, StopwatchState,
    Theme, Unit, APP_STATE_ID,
};
use chrono::{DateTime, Utc};

/// Every catalog bar (only the Olympic bar enabled) and a pair of each
/// common kg plate
pub fn default_equipment_inventory() -> EquipmentInventory {
    let bars = list_bar_types()
        .iter()
        .map(|bar| InventoryBar {
            id: bar.id.clone(),
            name: bar.name.clone(),
            weight: bar.weight,
            unit: bar.unit,
            enabled: bar.id == crate::program::DEFAULT_BAR_TYPE_ID,
        })
        .collect();

    let plates = [20.0, 10.0, 5.0, 2.5, 1.25, 0.5]
        .into_iter()
        .map(|weight| InventoryPlate {
            weight,
            unit: Unit::Kg,
            quantity: 2,
        })
        .collect();

    EquipmentInventory { bars, plates }
}

pub fn default_app_state() -> AppState {
    AppState {
        id: APP_STATE_ID.to_string(),
        active_stopwatch: None,
        active_workout_id: None,
        last_workout_id: None,
        last_completed_variation: None,
        unit_preference: Unit::Kg,
        theme: Theme::System,
        equipment_inventory: Some(default_equipment_inventory()),
    }
}

/// Load the app state, persisting defaults on first access
///
/// Records written before the equipment inventory existed are backfilled.
pub fn get_or_init_app_state(repository: &dyn AppStateRepository) -> Result<AppState> {
    match repository.get()? {
        None => {
            let initial = default_app_state();
            repository.save(&initial)?;
            tracing::info!("Initialized default app state");
            Ok(initial)
        }
        Some(mut state) if state.equipment_inventory.is_none() => {
            state.equipment_inventory = Some(default_equipment_inventory());
            repository.save(&state)?;
            tracing::debug!("Backfilled equipment inventory");
            Ok(state)
        }
        Some(state) => Ok(state),
    }
}

/// Replace the equipment inventory
pub fn update_equipment_inventory(
    repository: &dyn AppStateRepository,
    inventory: EquipmentInventory,
) -> Result<AppState> {
    if let Some(plate) = inventory
        .plates
        .iter()
        .find(|p| !p.weight.is_finite() || p.weight <= 0.0)
    {
        return Err(Error::Validation(format!(
            "Plate weight must be a positive number, got {}",
            plate.weight
        )));
    }

    let mut state = get_or_init_app_state(repository)?;
    state.equipment_inventory = Some(inventory);
    repository.save(&state)?;
    Ok(state)
}

/// Start (or restart from zero) the rest stopwatch
pub fn start_stopwatch(
    repository: &dyn AppStateRepository,
    thresholds_sec: &[u64],
    now: DateTime<Utc>,
) -> Result<AppState> {
    update_stopwatch(repository, |_| {
        Some(StopwatchState::start(now, thresholds_sec.iter().copied()))
    })
}

pub fn pause_stopwatch(repository: &dyn AppStateRepository, now: DateTime<Utc>) -> Result<AppState> {
    update_stopwatch(repository, |current| {
        current.map(|mut sw| {
            sw.pause(now);
            sw
        })
    })
}

pub fn resume_stopwatch(repository: &dyn AppStateRepository, now: DateTime<Utc>) -> Result<AppState> {
    update_stopwatch(repository, |current| {
        current.map(|mut sw| {
            sw.resume(now);
            sw
        })
    })
}

pub fn dismiss_stopwatch(repository: &dyn AppStateRepository) -> Result<AppState> {
    update_stopwatch(repository, |current| {
        current.map(|mut sw| {
            sw.dismiss();
            sw
        })
    })
}

/// Load-modify-save of the active stopwatch
pub fn update_stopwatch<F>(repository: &dyn AppStateRepository, f: F) -> Result<AppState>
where
    F: FnOnce(Option<StopwatchState>) -> Option<StopwatchState>,
{
    let mut state = get_or_init_app_state(repository)?;
    state.active_stopwatch = f(state.active_stopwatch.take());
    repository.save(&state)?;
    Ok(state)
}
