//! Placement and consolidation: commit a shape, remove the same-colour region it touches,
//! then let unsupported blocks fall until the grid is stable.

use crate::grid::{Cell, IVec2, NEIGHBOURS_4, TileGrid};
use crate::shapes::ShapeId;
use std::collections::HashSet;

/// What one consolidation did to the grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Neighbour that triggered removal, if any.
    pub matched: Option<IVec2>,
    /// Cells emptied by the flood-fill removal.
    pub cleared: Vec<IVec2>,
    /// Gravity passes that moved at least one cell.
    pub gravity_passes: u32,
    /// Total single-row shifts across all passes.
    pub cells_shifted: u32,
}

/// Writes `cells` into the grid as walls tagged `tag`. Out-of-grid cells are skipped.
pub fn commit(grid: &mut TileGrid, cells: &[IVec2], tag: ShapeId) {
    for &c in cells {
        grid.set(c, Cell::Wall(tag));
    }
}

/// First neighbour of a placed cell that is a same-colour wall not in the placed set.
///
/// Outer loop over placed cells, inner loop over +X, -X, +Y, -Y.
pub fn find_match(grid: &TileGrid, placed: &[IVec2], tag: ShapeId) -> Option<IVec2> {
    let placed_set: HashSet<IVec2> = placed.iter().copied().collect();
    placed.iter().find_map(|&c| {
        NEIGHBOURS_4.iter().find_map(|&(dx, dy)| {
            let n = c.offset(dx, dy);
            (grid.tag_at(n) == Some(tag) && !placed_set.contains(&n)).then_some(n)
        })
    })
}

/// Clears the 4-connected region of `tag` walls containing `start`. Returns the cleared cells
/// in visit order. Uses an explicit stack.
pub fn remove_connected(grid: &mut TileGrid, start: IVec2, tag: ShapeId) -> Vec<IVec2> {
    let mut cleared = Vec::new();
    if grid.tag_at(start) != Some(tag) {
        return cleared;
    }
    let mut stack = vec![start];
    grid.set(start, Cell::Empty);
    while let Some(c) = stack.pop() {
        cleared.push(c);
        for (dx, dy) in NEIGHBOURS_4 {
            let n = c.offset(dx, dy);
            if grid.tag_at(n) == Some(tag) {
                // Cleared on push so no cell is visited twice.
                grid.set(n, Cell::Empty);
                stack.push(n);
            }
        }
    }
    cleared
}

/// Marks every wall 4-connected (through walls) to a wall in row 0.
/// Indexed `rooted[x * height + y]`.
pub fn mark_rooted(grid: &TileGrid) -> Vec<bool> {
    let (w, h) = (grid.width(), grid.height());
    let mut rooted = vec![false; w * h];
    let mut stack: Vec<IVec2> = (0..w as i32)
        .map(|x| IVec2::new(x, 0))
        .filter(|&c| grid.is_wall(c))
        .collect();
    for c in &stack {
        rooted[c.x as usize * h] = true;
    }
    while let Some(c) = stack.pop() {
        for (dx, dy) in NEIGHBOURS_4 {
            let n = c.offset(dx, dy);
            if grid.is_wall(n) {
                let i = n.x as usize * h + n.y as usize;
                if !rooted[i] {
                    rooted[i] = true;
                    stack.push(n);
                }
            }
        }
    }
    rooted
}

/// One gravity pass: every wall not rooted moves down exactly one row.
/// Returns the number of cells moved.
pub fn gravity_pass(grid: &mut TileGrid) -> u32 {
    let rooted = mark_rooted(grid);
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    let mut moved = 0;
    for x in 0..w {
        // Bottom-up, so the cell below a floating cell is empty or has already moved.
        for y in 1..h {
            let c = IVec2::new(x, y);
            let i = x as usize * h as usize + y as usize;
            if let Some(cell @ Cell::Wall(_)) = grid.get(c) {
                if !rooted[i] {
                    grid.set(c, Cell::Empty);
                    grid.set(c.offset(0, -1), cell);
                    moved += 1;
                }
            }
        }
    }
    moved
}

/// Runs gravity passes until one moves nothing. Returns (passes that moved, cells moved).
///
/// Terminates: every moving pass strictly lowers the sum of wall rows.
pub fn settle(grid: &mut TileGrid) -> (u32, u32) {
    let mut passes = 0;
    let mut shifted = 0;
    loop {
        let moved = gravity_pass(grid);
        if moved == 0 {
            return (passes, shifted);
        }
        passes += 1;
        shifted += moved;
    }
}

/// True if no wall cell is unsupported.
#[cfg(test)]
pub fn is_settled(grid: &TileGrid) -> bool {
    let rooted = mark_rooted(grid);
    grid.walls()
        .all(|(c, _)| rooted[c.x as usize * grid.height() + c.y as usize])
}

/// Commit `placed` with colour `tag`, then match, remove and settle.
///
/// Without a same-colour neighbour the placed cells simply stay.
pub fn place_and_consolidate(grid: &mut TileGrid, placed: &[IVec2], tag: ShapeId) -> ConsolidationReport {
    commit(grid, placed, tag);
    let Some(matched) = find_match(grid, placed, tag) else {
        return ConsolidationReport::default();
    };
    let cleared = remove_connected(grid, matched, tag);
    let (gravity_passes, cells_shifted) = settle(grid);
    ConsolidationReport {
        matched: Some(matched),
        cleared,
        gravity_passes,
        cells_shifted,
    }
}
