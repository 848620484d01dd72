// core/grid_store.rs

// Holds the latest occupancy grid. Maps are swapped in whole: readers clone the
// current Arc and keep scanning that snapshot even if a new map lands meanwhile.

use log::{info, warn};
use parking_lot::RwLock;
use std::sync::Arc;

use super::grid::{MapMessage, OccupancyGrid};
use crate::Result;

#[derive(Default)]
struct Slot {
    grid: Option<Arc<OccupancyGrid>>,
    generation: u64,
}

/// Latest-map holder shared between the map callback and the scan driver
#[derive(Default)]
pub struct GridStore {
    slot: RwLock<Slot>,
}

impl GridStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new grid, replacing any previous one. Returns the map generation.
    pub fn set_map(&self, grid: OccupancyGrid) -> u64 {
        let (width, height, resolution) = (grid.width(), grid.height(), grid.resolution());
        let grid = Arc::new(grid);

        let generation = {
            let mut slot = self.slot.write();
            slot.generation += 1;
            slot.grid = Some(grid);
            slot.generation
        };

        info!(
            "Installed map #{}: {}x{} cells at {:.3} m/cell",
            generation, width, height, resolution
        );
        generation
    }

    /// Build a grid from a map message and install it.
    ///
    /// A malformed message leaves the current grid in place.
    pub fn ingest(&self, message: &MapMessage, occupied_threshold: i8) -> Result<u64> {
        let grid = OccupancyGrid::from_message(message, occupied_threshold)?;
        if grid.origin().yaw.abs() > 1e-9 {
            warn!(
                "Map origin yaw {:.3} rad is ignored; grid axes are taken to align with the map frame",
                grid.origin().yaw
            );
        }
        Ok(self.set_map(grid))
    }

    /// Latest grid snapshot, `None` until the first map arrives
    pub fn current(&self) -> Option<Arc<OccupancyGrid>> {
        self.slot.read().grid.clone()
    }

    /// Latest grid together with its generation, read consistently
    pub fn current_with_generation(&self) -> Option<(Arc<OccupancyGrid>, u64)> {
        let slot = self.slot.read();
        slot.grid.clone().map(|grid| (grid, slot.generation))
    }

    /// Number of maps installed so far
    pub fn generation(&self) -> u64 {
        self.slot.read().generation
    }

    /// Whether any map has been installed
    pub fn has_map(&self) -> bool {
        self.slot.read().grid.is_some()
    }
}
