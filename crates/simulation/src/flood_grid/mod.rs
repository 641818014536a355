//! Raster flood model of the city (the first half of the digital twin).
//!
//! `FloodGrid` is a row-major raster of `GridCell`s whose altitude and river
//! flags come from a deterministic valley heightmap. `step_flood_grid` is a
//! pure cellular-automaton step returning a new grid:
//!   1. Direct rainfall input (heavier on river cells)
//!   2. Pairwise 4-connected flow downhill, capped per exchange
//!   3. Natural drainage scaled by the current drainage capacity
//!   4. Clamp every water level to [0, 1]
//!
//! `predict_future` runs the step forward on a copy and summarises the
//! outcome; `zone_flood_risks` averages water per zone.

pub mod resources;
pub mod step;
pub mod terrain;


pub use resources::{FloodGrid, GridCell};
pub use step::{predict_future, step_flood_grid, zone_flood_risks, FloodForecast, StepInput};
pub use terrain::build_flood_grid;
