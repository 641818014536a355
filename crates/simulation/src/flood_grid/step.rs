//! Pure flood-grid step, forecast and per-zone risk.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{MAX_ALTITUDE, RAINFALL_CAP_MM};
use crate::crisis_params::{CrisisParams, FloodParams};
use crate::telemetry::TelemetryPacket;

use super::resources::FloodGrid;

/// Water added per step by saturated rainfall before the cell multiplier.
pub const RAIN_INPUT_RATE: f32 = 0.04;
pub const RIVER_RAIN_MULTIPLIER: f32 = 1.5;
pub const LAND_RAIN_MULTIPLIER: f32 = 0.3;
/// Fraction of water moved per unit of normalised altitude difference.
pub const FLOW_COEFFICIENT: f32 = 2.0;
/// A cell never gives away more than this share of its water to one neighbour.
pub const MAX_EXCHANGE_FRACTION: f32 = 0.25;

/// Weather inputs to one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    pub rainfall: f64,
    pub drainage_capacity: f64,
    pub global_drainage_modifier: f32,
    /// Rainfall (mm) that saturates the rain input.
    pub rainfall_cap_mm: f64,
}

impl StepInput {
    pub fn new(rainfall: f64, drainage_capacity: f64) -> Self {
        Self {
            rainfall,
            drainage_capacity,
            global_drainage_modifier: FloodParams::default().global_drainage_modifier,
            rainfall_cap_mm: RAINFALL_CAP_MM,
        }
    }

    pub fn from_telemetry(t: &TelemetryPacket, params: &CrisisParams) -> Self {
        Self {
            rainfall: t.rainfall,
            drainage_capacity: t.drainage_capacity,
            global_drainage_modifier: params.flood.global_drainage_modifier,
            rainfall_cap_mm: params.risk.rainfall_cap_mm,
        }
    }
}

/// Advance `grid` by `dt` and return the new grid; `grid` is untouched.
pub fn step_flood_grid(grid: &FloodGrid, input: &StepInput, dt: f32) -> FloodGrid {
    let mut next = grid.clone();
    let rain_norm = (input.rainfall / input.rainfall_cap_mm).clamp(0.0, 1.0) as f32;
    let capacity = input.drainage_capacity.clamp(0.0, 1.0) as f32;

    // --- Rainfall ---
    let mut water: Vec<f32> = grid
        .cells
        .iter()
        .map(|c| {
            let mult = if c.is_river {
                RIVER_RAIN_MULTIPLIER
            } else {
                LAND_RAIN_MULTIPLIER
            };
            c.water_level + rain_norm * mult * RAIN_INPUT_RATE * dt
        })
        .collect();

    // --- Flow, computed against the post-rain snapshot ---
    let mut delta = vec![0.0_f32; water.len()];
    for (i, cell) in grid.cells.iter().enumerate() {
        let w = water[i];
        if w <= 0.0 {
            continue;
        }
        let (neighbors, count) = grid.neighbors4(cell.row, cell.col);
        for &j in &neighbors[..count] {
            let drop = cell.altitude - grid.cells[j].altitude;
            if drop <= 0.0 {
                continue;
            }
            let flow = (w * (drop / MAX_ALTITUDE) * FLOW_COEFFICIENT * dt)
                .min(w * MAX_EXCHANGE_FRACTION);
            delta[i] -= flow;
            delta[j] += flow;
        }
    }

    // --- Drainage and clamp ---
    let drain_scale = input.global_drainage_modifier * (0.2 + 0.8 * capacity) * dt;
    for (i, cell) in next.cells.iter_mut().enumerate() {
        water[i] += delta[i];
        let drained = water[i] - cell.drainage_rate * drain_scale;
        cell.water_level = drained.clamp(0.0, 1.0);
    }
    next
}

/// Outcome of running the step forward on a copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodForecast {
    pub steps: u32,
    pub peak_water_level: f32,
    /// Steps each cell spent above the flood threshold, row-major.
    pub crossing_counts: Vec<u32>,
    /// Cells above the threshold at least once.
    pub flooded_cell_count: usize,
    /// Distinct zones with at least one flooded cell, sorted.
    pub affected_zones: Vec<String>,
}

pub fn predict_future(
    grid: &FloodGrid,
    input: &StepInput,
    threshold: f32,
    steps_ahead: u32,
) -> FloodForecast {
    let mut current = grid.clone();
    let mut peak = current.max_water();
    let mut crossings = vec![0u32; current.cells.len()];
    let mut zones = BTreeSet::new();

    for _ in 0..steps_ahead {
        current = step_flood_grid(&current, input, 1.0);
        for (count, cell) in crossings.iter_mut().zip(&current.cells) {
            peak = peak.max(cell.water_level);
            if cell.water_level > threshold {
                *count += 1;
                if let Some(zone) = &cell.zone_id {
                    zones.insert(zone.clone());
                }
            }
        }
    }

    FloodForecast {
        steps: steps_ahead,
        peak_water_level: peak,
        flooded_cell_count: crossings.iter().filter(|&&c| c > 0).count(),
        crossing_counts: crossings,
        affected_zones: zones.into_iter().collect(),
    }
}

/// Mean water level per zone as a 0-100 percentage.
pub fn zone_flood_risks(grid: &FloodGrid) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for cell in &grid.cells {
        if let Some(zone) = &cell.zone_id {
            let entry = sums.entry(zone.clone()).or_insert((0.0, 0));
            entry.0 += f64::from(cell.water_level);
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(zone, (sum, n))| (zone, sum / n as f64 * 100.0))
        .collect()
}
