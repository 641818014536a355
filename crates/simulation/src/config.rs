/// Flood grid rows in the reference city raster.
pub const FLOOD_GRID_ROWS: usize = 20;
/// Flood grid columns in the reference city raster.
pub const FLOOD_GRID_COLS: usize = 16;

/// Maximum altitude of a grid cell.
pub const MAX_ALTITUDE: f32 = 100.0;

/// Residual water level of river cells at grid creation.
pub const RIVER_RESIDUAL_WATER: f32 = 0.15;

/// Rainfall (mm) that saturates every normalised rainfall input.
pub const RAINFALL_CAP_MM: f64 = 150.0;

/// Number of fixed city zones.
pub const ZONE_COUNT: usize = 8;

/// Rolling event-bus log length; oldest entries are evicted first.
pub const BUS_LOG_CAPACITY: usize = 200;

/// Genesis value of every decision chain: 64 hex zeros.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
