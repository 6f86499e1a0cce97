//! Plate-loading calculator.
//!
//! Given a target weight and a bar, suggests the plates to load on each
//! side. Selection is greedy, heaviest plate first, rounding down whenever
//! the exact target cannot be built. Standard plate sets make greedy
//! selection optimal in practice.

use crate::types::{InventoryPlate, Unit};
use serde::Serialize;

/// Tolerance for floating point plate arithmetic (2.5, 1.25, ...)
const EPSILON: f64 = 1e-9;

/// Number of plates of one weight loaded on each side
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlateCount {
    pub weight: f64,
    pub count: u32,
}

/// Suggested loading for one bar
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlateLoad {
    /// Plates per side, heaviest first
    pub plates_per_side: Vec<PlateCount>,
    /// Bar plus both sides
    pub total_weight: f64,
    /// Whether the achieved weight differs from the target
    pub rounded: bool,
    /// Target minus achieved weight
    pub delta: f64,
}

impl PlateLoad {
    fn bar_only(target_weight: f64, bar_weight: f64) -> Self {
        Self {
            plates_per_side: Vec::new(),
            total_weight: bar_weight,
            rounded: !same_weight(target_weight, bar_weight),
            delta: target_weight - bar_weight,
        }
    }

    fn from_plates(target_weight: f64, bar_weight: f64, plates_per_side: Vec<PlateCount>) -> Self {
        let per_side: f64 = plates_per_side
            .iter()
            .map(|p| p.weight * p.count as f64)
            .sum();
        let total_weight = bar_weight + per_side * 2.0;

        Self {
            plates_per_side,
            total_weight,
            rounded: !same_weight(total_weight, target_weight),
            delta: target_weight - total_weight,
        }
    }

    /// One entry per physical plate on a side, heaviest first
    pub fn flattened(&self) -> Vec<f64> {
        self.plates_per_side
            .iter()
            .flat_map(|p| std::iter::repeat(p.weight).take(p.count as usize))
            .collect()
    }
}

/// Settings for the calculator when plates are assumed unlimited
#[derive(Clone, Debug, PartialEq)]
pub struct PlateCalculatorConfig {
    pub bar_weight: f64,
    pub available_plates: Vec<f64>,
    /// Plates lighter than this are never suggested
    pub minimum_plate_weight: f64,
    pub unit: Unit,
}

fn same_weight(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Compute plates per side with an unlimited supply of each plate weight
pub fn compute_stack(target_weight: f64, config: &PlateCalculatorConfig) -> PlateLoad {
    let bar_weight = config.bar_weight;
    if target_weight <= bar_weight {
        return PlateLoad::bar_only(target_weight, bar_weight);
    }

    let mut weights: Vec<f64> = config
        .available_plates
        .iter()
        .copied()
        .filter(|w| *w > 0.0 && *w >= config.minimum_plate_weight)
        .collect();
    weights.sort_by(|a, b| b.total_cmp(a));
    weights.dedup_by(|a, b| same_weight(*a, *b));

    let mut remaining = (target_weight - bar_weight) / 2.0;
    let mut plates_per_side = Vec::new();

    for weight in weights {
        let count = ((remaining + EPSILON) / weight).floor() as u32;
        if count == 0 {
            continue;
        }
        plates_per_side.push(PlateCount { weight, count });
        remaining -= weight * count as f64;
    }

    PlateLoad::from_plates(target_weight, bar_weight, plates_per_side)
}

/// Compute plates per side using only the plates in the inventory
///
/// Plates in another unit or with zero quantity are ignored. Each side can
/// use at most half of a plate's total quantity.
pub fn compute_inventory_stack(
    target_weight: f64,
    bar_weight: f64,
    plates: &[InventoryPlate],
    unit: Unit,
) -> PlateLoad {
    if target_weight <= bar_weight {
        return PlateLoad::bar_only(target_weight, bar_weight);
    }

    let mut available: Vec<&InventoryPlate> = plates
        .iter()
        .filter(|p| p.unit == unit && p.quantity > 0 && p.weight > 0.0)
        .collect();
    available.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let mut remaining = (target_weight - bar_weight) / 2.0;
    let mut plates_per_side = Vec::new();

    for plate in available {
        let per_side_available = plate.quantity / 2;
        if per_side_available == 0 {
            continue;
        }
        let max_by_weight = ((remaining + EPSILON) / plate.weight).floor() as u32;
        let count = per_side_available.min(max_by_weight);
        if count == 0 {
            continue;
        }
        plates_per_side.push(PlateCount {
            weight: plate.weight,
            count,
        });
        remaining -= plate.weight * count as f64;
    }

    PlateLoad::from_plates(target_weight, bar_weight, plates_per_side)
}
