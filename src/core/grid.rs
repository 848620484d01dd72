// core/grid.rs

// Immutable occupancy grid snapshots. A grid is built once from a map message
// (or a plain bitmap) and never mutated afterwards; a new map means a new grid.

use serde::{Deserialize, Serialize};

use super::pose::{GridOrigin, Pose2D, StampedPose};
use crate::{Result, SimError};

/// Occupancy value the ROS map encoding uses for unknown cells
pub const UNKNOWN_OCCUPANCY: i8 = -1;

/// Tri-state cell classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    /// Known free space
    Free,
    /// Known obstacle
    Occupied,
    /// Never observed
    Unknown,
}

impl CellState {
    /// Classify a ROS occupancy value (-1 unknown, 0..=100 probability)
    pub fn from_occupancy(value: i8, occupied_threshold: i8) -> Self {
        if value < 0 {
            CellState::Unknown
        } else if value >= occupied_threshold {
            CellState::Occupied
        } else {
            CellState::Free
        }
    }

    /// Whether a ray stops at this cell. Unknown space counts as free.
    #[inline]
    pub fn is_blocking(self) -> bool {
        matches!(self, CellState::Occupied)
    }
}

/// Complete grid description as delivered by a map source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMessage {
    /// Cells along the map X axis
    pub width: u32,
    /// Cells along the map Y axis
    pub height: u32,
    /// Meters per cell
    pub resolution: f64,
    /// Map-frame pose `[x, y, yaw]` of the corner of cell (0, 0)
    pub origin: [f64; 3],
    /// Row-major occupancy values, row 0 at the origin
    pub data: Vec<i8>,
}

/// Immutable obstacle grid snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    resolution: f64,
    origin: GridOrigin,
    cells: Vec<CellState>,
}

impl OccupancyGrid {
    /// Build a grid from row-major cells, origin at the map frame origin
    pub fn new(width: usize, height: usize, resolution: f64, cells: Vec<CellState>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SimError::Config(format!(
                "grid must not be empty, got {}x{}",
                width, height
            )));
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(SimError::Config(format!(
                "grid resolution must be positive, got {}",
                resolution
            )));
        }
        let expected = width.checked_mul(height).ok_or_else(|| {
            SimError::Config(format!("grid {}x{} is too large", width, height))
        })?;
        if cells.len() != expected {
            return Err(SimError::Map(format!(
                "grid {}x{} needs {} cells, got {}",
                width,
                height,
                expected,
                cells.len()
            )));
        }

        Ok(OccupancyGrid {
            width,
            height,
            resolution,
            origin: GridOrigin::default(),
            cells,
        })
    }

    /// Build a grid from a binary obstacle bitmap (`true` blocks rays)
    pub fn from_bitmap(width: usize, height: usize, resolution: f64, blocking: &[bool]) -> Result<Self> {
        let cells = blocking
            .iter()
            .map(|&b| if b { CellState::Occupied } else { CellState::Free })
            .collect();
        Self::new(width, height, resolution, cells)
    }

    /// Build a grid from a map message, classifying each cell by threshold
    pub fn from_message(message: &MapMessage, occupied_threshold: i8) -> Result<Self> {
        let cells = message
            .data
            .iter()
            .map(|&v| CellState::from_occupancy(v, occupied_threshold))
            .collect();
        let origin = GridOrigin::new(message.origin[0], message.origin[1], message.origin[2]);
        if !origin.is_finite() {
            return Err(SimError::Map(format!(
                "map origin must be finite, got {:?}",
                message.origin
            )));
        }

        let grid = Self::new(
            message.width as usize,
            message.height as usize,
            message.resolution,
            cells,
        )?
        .with_origin(origin);
        Ok(grid)
    }

    /// Attach the map-frame origin of cell (0, 0)
    pub fn with_origin(mut self, origin: GridOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Cells along X
    pub fn width(&self) -> usize {
        self.width
    }

    /// Cells along Y
    pub fn height(&self) -> usize {
        self.height
    }

    /// Meters per cell
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Map-frame origin of cell (0, 0)
    pub fn origin(&self) -> GridOrigin {
        self.origin
    }

    /// Cell state at (col, row), `None` outside the grid
    pub fn cell(&self, col: i64, row: i64) -> Option<CellState> {
        self.index(col, row).map(|i| self.cells[i])
    }

    /// Whether (col, row) blocks rays; cells outside the grid never do
    #[inline]
    pub fn is_blocking(&self, col: i64, row: i64) -> bool {
        self.index(col, row)
            .is_some_and(|i| self.cells[i].is_blocking())
    }

    /// Whether a continuous pixel-frame point lies on the grid
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f64 && y < self.height as f64
    }

    /// Number of blocking cells
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_blocking()).count()
    }

    /// Convert a map-frame sensor pose into this grid's pixel frame
    pub fn pixel_pose(&self, pose: &StampedPose) -> Pose2D {
        self.origin.to_pixel_pose(pose, self.resolution)
    }

    #[inline]
    fn index(&self, col: i64, row: i64) -> Option<usize> {
        if col < 0 || row < 0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(row * self.width + col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(width: u32, height: u32, data: Vec<i8>) -> MapMessage {
        MapMessage {
            width,
            height,
            resolution: 0.05,
            origin: [-1.0, -2.0, 0.0],
            data,
        }
    }

    #[test]
    fn test_occupancy_classification() {
        assert_eq!(CellState::from_occupancy(-1, 65), CellState::Unknown);
        assert_eq!(CellState::from_occupancy(0, 65), CellState::Free);
        assert_eq!(CellState::from_occupancy(64, 65), CellState::Free);
        assert_eq!(CellState::from_occupancy(65, 65), CellState::Occupied);
        assert_eq!(CellState::from_occupancy(100, 65), CellState::Occupied);
    }

    #[test]
    fn test_unknown_is_passable() {
        assert!(!CellState::Unknown.is_blocking());
        assert!(!CellState::Free.is_blocking());
        assert!(CellState::Occupied.is_blocking());
    }

    #[test]
    fn test_from_message_row_major() {
        // 3x2 grid, occupied at (col 2, row 1)
        let grid = OccupancyGrid::from_message(&message(3, 2, vec![0, 0, -1, 0, 0, 100]), 65).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.cell(2, 0), Some(CellState::Unknown));
        assert!(grid.is_blocking(2, 1));
        assert!(!grid.is_blocking(0, 1));
        assert_eq!(grid.occupied_count(), 1);
        assert_eq!(grid.origin().x, -1.0);
    }

    #[test]
    fn test_size_mismatch_is_map_error() {
        let err = OccupancyGrid::from_message(&message(3, 3, vec![0; 8]), 65).unwrap_err();
        assert!(matches!(err, SimError::Map(_)));
    }

    #[test]
    fn test_empty_grid_is_config_error() {
        let err = OccupancyGrid::new(0, 4, 0.1, Vec::new()).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        let err = OccupancyGrid::from_message(&message(4, 0, Vec::new()), 65).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn test_bad_resolution_rejected() {
        assert!(OccupancyGrid::from_bitmap(2, 2, 0.0, &[false; 4]).is_err());
        assert!(OccupancyGrid::from_bitmap(2, 2, f64::NAN, &[false; 4]).is_err());
    }

    #[test]
    fn test_out_of_bounds_lookup() {
        let grid = OccupancyGrid::from_bitmap(2, 2, 1.0, &[true; 4]).unwrap();
        assert_eq!(grid.cell(-1, 0), None);
        assert_eq!(grid.cell(2, 0), None);
        assert!(!grid.is_blocking(0, 2));
        assert!(grid.contains(1.99, 0.0));
        assert!(!grid.contains(2.0, 0.0));
        assert!(!grid.contains(-0.01, 1.0));
    }
}
