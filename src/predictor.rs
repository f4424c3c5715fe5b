//! Resting predictor: where the falling shape lands if dropped now. Never mutates the grid.

use crate::grid::{IVec2, TileGrid};

/// Result of a simulated drop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prediction {
    /// Resting cells inside the grid; cells at or above the top row are dropped.
    pub cells: Vec<IVec2>,
    /// Rows between the current cells and the resting cells.
    pub drop_distance: i32,
}

impl Prediction {
    /// Actual position already equals the predicted resting position.
    pub fn is_resting(&self) -> bool {
        self.drop_distance == 0
    }
}

/// True if moving every cell down one row hits the floor or an in-grid wall.
/// Cells above the grid never collide.
fn blocked_below(grid: &TileGrid, cells: &[IVec2]) -> bool {
    cells.iter().any(|c| c.y - 1 < 0 || grid.is_wall(c.offset(0, -1)))
}

/// True if any cell sits on a wall or below the floor.
pub fn overlaps(grid: &TileGrid, cells: &[IVec2]) -> bool {
    cells.iter().any(|&c| c.y < 0 || grid.is_wall(c))
}

/// Rows the cells must rise to stop overlapping walls or the floor. Bounded by grid height.
pub fn lift_out_of_overlap(grid: &TileGrid, cells: &[IVec2]) -> i32 {
    let max_lift = grid.height() as i32 + cells.iter().map(|c| (-c.y).max(0)).max().unwrap_or(0);
    let mut lifted: Vec<IVec2> = cells.to_vec();
    let mut lift = 0;
    while lift < max_lift && overlaps(grid, &lifted) {
        for c in &mut lifted {
            c.y += 1;
        }
        lift += 1;
    }
    lift
}

/// Shifts `cells` down one row at a time until a further shift is blocked.
pub fn predict(grid: &TileGrid, cells: &[IVec2]) -> Prediction {
    let mut resting: Vec<IVec2> = cells.to_vec();
    let mut drop_distance = 0;
    if !resting.is_empty() {
        while !blocked_below(grid, &resting) {
            for c in &mut resting {
                c.y -= 1;
            }
            drop_distance += 1;
        }
    }
    let height = grid.height() as i32;
    resting.retain(|c| c.y < height);
    Prediction {
        cells: resting,
        drop_distance,
    }
}
