//! Falling shape controller: the one active shape, its movement, rotation and derived cells.

use crate::grid::IVec2;
use crate::shapes::{Rotation, ShapeDefinition, rotate_offset};
use std::rc::Rc;

/// Slack subtracted before taking the ceiling of the vertical position, so a root that
/// has drifted to 4.99999 or 5.00001 while falling onto row 5 still reads as row 5.
pub const ROW_EPSILON: f32 = 1e-4;

/// World position of a root. x grows right, y grows up; one unit per cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Logical cell of a world position: column is `round(x)`, row is `ceil(y - ROW_EPSILON)`.
///
/// Rows use the ceiling so a shape only enters a row once it has fully left the one above.
pub fn logical_cell(pos: Vec2) -> IVec2 {
    IVec2::new(pos.x.round() as i32, (pos.y - ROW_EPSILON).ceil() as i32)
}

/// One occupied cell of the active shape, as an offset from the pivot.
/// Its grid position is derived from the root every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallingShapeBlock {
    pub local: IVec2,
}

/// Per-frame controller input.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallInput {
    /// Player x in world units; the shape drifts toward it.
    pub target_x: f32,
    pub dt: f32,
    pub rotate_left: bool,
    pub rotate_right: bool,
}

/// Speeds in cells per second.
#[derive(Debug, Clone, Copy)]
pub struct FallTuning {
    pub horizontal_speed: f32,
    pub vertical_speed: f32,
}

/// The currently falling shape.
#[derive(Debug, Clone)]
pub struct FallingShapeRoot {
    pub shape: Rc<ShapeDefinition>,
    pub rotation: Rotation,
    pub position: Vec2,
    pub blocks: Vec<FallingShapeBlock>,
    /// Current logical cells; recomputed every frame.
    pub block_positions: Vec<IVec2>,
    /// Projected resting cells; recomputed every frame by the predictor.
    pub predicted_block_positions: Vec<IVec2>,
}

impl FallingShapeRoot {
    pub fn new(shape: Rc<ShapeDefinition>, rotation: Rotation, position: Vec2) -> Self {
        let blocks = shape
            .offsets()
            .into_iter()
            .map(|local| FallingShapeBlock { local })
            .collect();
        let mut root = Self {
            shape,
            rotation,
            position,
            blocks,
            block_positions: Vec::new(),
            predicted_block_positions: Vec::new(),
        };
        root.recompute_block_positions();
        root
    }

    /// Allowed root-x range `[min_x, max_x]` keeping the whole footprint inside `[0, grid_width - 1]`.
    ///
    /// A footprint wider than the grid pins the root at `min_x`.
    pub fn horizontal_range(&self, grid_width: usize) -> (i32, i32) {
        let (lo, hi) = self.shape.horizontal_extent(self.rotation);
        let min_x = -lo;
        let max_x = (grid_width as i32 - 1 - hi).max(min_x);
        (min_x, max_x)
    }

    /// Applies rotation input. Returns true if the rotation changed.
    ///
    /// Rotation never checks the grid; the horizontal clamp that follows keeps it in bounds.
    pub fn apply_rotation(&mut self, rotate_left: bool, rotate_right: bool) -> bool {
        let before = self.rotation;
        if rotate_left {
            self.rotation = self.rotation.left();
        }
        if rotate_right {
            self.rotation = self.rotation.right();
        }
        self.rotation != before
    }

    /// Moves toward `target_x` by at most `max_step`, then clamps into the allowed range.
    pub fn track_horizontal(&mut self, target_x: f32, max_step: f32, grid_width: usize) {
        let delta = (target_x - self.position.x).clamp(-max_step, max_step);
        self.position.x += delta;
        self.clamp_horizontal(grid_width);
    }

    pub fn clamp_horizontal(&mut self, grid_width: usize) {
        let (min_x, max_x) = self.horizontal_range(grid_width);
        self.position.x = self.position.x.clamp(min_x as f32, max_x as f32);
    }

    pub fn fall(&mut self, distance: f32) {
        self.position.y -= distance;
    }

    /// Logical cell of the pivot.
    pub fn logical_root(&self) -> IVec2 {
        logical_cell(self.position)
    }

    pub fn recompute_block_positions(&mut self) {
        let root = self.logical_root();
        self.block_positions.clear();
        self.block_positions.extend(self.blocks.iter().map(|b| {
            let r = rotate_offset(b.local, self.rotation);
            root.offset(r.x, r.y)
        }));
    }

    /// One controller frame: rotate, track the player, fall, recompute cells.
    /// Returns true if the shape rotated this frame.
    pub fn step(&mut self, input: &FallInput, tuning: &FallTuning, speed_multiplier: f32, grid_width: usize) -> bool {
        let rotated = self.apply_rotation(input.rotate_left, input.rotate_right);
        self.track_horizontal(input.target_x, tuning.horizontal_speed * input.dt, grid_width);
        self.fall(tuning.vertical_speed * speed_multiplier * input.dt);
        self.recompute_block_positions();
        rotated
    }
}
