//! Deterministic valley heightmap for the flood grid.
//!
//! The river runs diagonally from the top-left towards the bottom-right.
//! Altitude climbs with distance from the river centreline, plus a noise term
//! that depends only on the cell coordinates, so every build yields the same
//! grid.

use fastnoise_lite::{FastNoiseLite, NoiseType};

use crate::config::{MAX_ALTITUDE, RIVER_RESIDUAL_WATER};
use crate::crisis_params::{AltitudeNoise, FloodParams};
use crate::zones::CITY_ZONES;

use super::resources::{FloodGrid, GridCell};

/// Altitude at the river centreline.
const VALLEY_FLOOR: f32 = 8.0;
/// Altitude gained per cell of distance from the river.
const VALLEY_SLOPE: f32 = 11.0;
/// Cells closer than this to the centreline are river.
const RIVER_HALF_WIDTH: f32 = 0.75;
const RIVER_DRAINAGE: f32 = 0.08;

/// Column of the river centreline on `row`.
pub fn river_center(row: usize, rows: usize, cols: usize) -> f32 {
    let span = cols.saturating_sub(5) as f32;
    let t = if rows > 1 {
        row as f32 / (rows - 1) as f32
    } else {
        0.0
    };
    2.0 + t * span
}

enum NoiseSource {
    Trig(f32),
    Simplex(Box<FastNoiseLite>, f32),
    Flat,
}

impl NoiseSource {
    fn from_params(noise: &AltitudeNoise) -> Self {
        match *noise {
            AltitudeNoise::Trigonometric { amplitude } => NoiseSource::Trig(amplitude),
            AltitudeNoise::Simplex {
                seed,
                frequency,
                amplitude,
            } => {
                let mut n = FastNoiseLite::with_seed(seed);
                n.set_noise_type(Some(NoiseType::OpenSimplex2));
                n.set_frequency(Some(frequency));
                NoiseSource::Simplex(Box::new(n), amplitude)
            }
            AltitudeNoise::None => NoiseSource::Flat,
        }
    }

    fn sample(&self, row: usize, col: usize) -> f32 {
        match self {
            NoiseSource::Trig(amplitude) => {
                amplitude * (row as f32 * 0.9).sin() * (col as f32 * 0.7).cos()
            }
            NoiseSource::Simplex(noise, amplitude) => {
                amplitude * noise.get_noise_2d(col as f32, row as f32)
            }
            NoiseSource::Flat => 0.0,
        }
    }
}

/// Zone whose centre lies within `radius` cells, first match wins.
fn zone_for(row: usize, col: usize, radius: f32) -> Option<String> {
    CITY_ZONES
        .iter()
        .find(|z| {
            let dr = row as f32 - z.grid_center.0 as f32;
            let dc = col as f32 - z.grid_center.1 as f32;
            (dr * dr + dc * dc).sqrt() <= radius
        })
        .map(|z| z.id.to_string())
}

/// Build the grid described by `params`.
pub fn build_flood_grid(params: &FloodParams) -> FloodGrid {
    let rows = params.rows;
    let cols = params.cols;
    let noise = NoiseSource::from_params(&params.altitude_noise);

    let mut cells = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        let center = river_center(row, rows, cols);
        for col in 0..cols {
            let distance = (col as f32 - center).abs();
            let is_river = distance < RIVER_HALF_WIDTH;
            let altitude = (VALLEY_FLOOR + distance * VALLEY_SLOPE + noise.sample(row, col))
                .clamp(0.0, MAX_ALTITUDE);
            let drainage_rate = if is_river {
                RIVER_DRAINAGE
            } else {
                (0.25 + 0.5 * altitude / MAX_ALTITUDE).clamp(0.0, 1.0)
            };
            cells.push(GridCell {
                row,
                col,
                altitude,
                drainage_rate,
                water_level: if is_river { RIVER_RESIDUAL_WATER } else { 0.0 },
                is_river,
                zone_id: zone_for(row, col, params.zone_radius),
            });
        }
    }

    FloodGrid { rows, cols, cells }
}
