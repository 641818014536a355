//! Flood grid data: `GridCell` and the `FloodGrid` raster.

use serde::{Deserialize, Serialize};

/// One raster cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    /// Altitude in [0, 100].
    pub altitude: f32,
    /// Natural drainage rate in [0, 1].
    pub drainage_rate: f32,
    /// Water level in [0, 1].
    pub water_level: f32,
    pub is_river: bool,
    pub zone_id: Option<String>,
}

/// Row-major raster of cells. Only `water_level` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodGrid {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<GridCell>,
}

impl FloodGrid {
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &GridCell {
        &self.cells[self.index(row, col)]
    }

    #[inline]
    pub fn in_bounds(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    /// Von Neumann neighbours of `(row, col)` as cell indices.
    pub fn neighbors4(&self, row: usize, col: usize) -> ([usize; 4], usize) {
        let mut out = [0usize; 4];
        let mut count = 0;
        for (dr, dc) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
            let r = row as isize + dr;
            let c = col as isize + dc;
            if self.in_bounds(r, c) {
                out[count] = self.index(r as usize, c as usize);
                count += 1;
            }
        }
        (out, count)
    }

    pub fn total_water(&self) -> f64 {
        self.cells.iter().map(|c| f64::from(c.water_level)).sum()
    }

    pub fn max_water(&self) -> f32 {
        self.cells.iter().map(|c| c.water_level).fold(0.0, f32::max)
    }

    pub fn flooded_cells(&self, threshold: f32) -> usize {
        self.cells.iter().filter(|c| c.water_level > threshold).count()
    }

    pub fn zone_cells<'a>(&'a self, zone: &'a str) -> impl Iterator<Item = &'a GridCell> + 'a {
        self.cells
            .iter()
            .filter(move |c| c.zone_id.as_deref() == Some(zone))
    }
}

#[cfg(test)]
mod tests {
    use crate::crisis_params::FloodParams;
    use crate::flood_grid::build_flood_grid;

    #[test]
    fn test_index_is_row_major() {
        let grid = build_flood_grid(&FloodParams::default());
        assert_eq!(grid.index(0, 0), 0);
        assert_eq!(grid.index(0, 1), 1);
        assert_eq!(grid.index(1, 0), grid.cols);
        let cell = grid.get(3, 7);
        assert_eq!((cell.row, cell.col), (3, 7));
    }

    #[test]
    fn test_corner_has_two_neighbors() {
        let grid = build_flood_grid(&FloodParams::default());
        let (_, count) = grid.neighbors4(0, 0);
        assert_eq!(count, 2);
        let (_, count) = grid.neighbors4(5, 5);
        assert_eq!(count, 4);
        let (_, count) = grid.neighbors4(grid.rows - 1, 4);
        assert_eq!(count, 3);
    }
}
