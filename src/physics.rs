//! Physics collaborator: a small 2D body world, the static colliders rebuilt from the grid,
//! the kinematic mirror of the falling shape, and the player proxy.
//!
//! Bodies collide as axis-aligned boxes. Polygons collide through their bounds, which is
//! exact for the unit squares the grid produces. Dynamic bodies use axis-separable
//! move-and-slide on the box enclosing all their parts: X is resolved first, then Y
//! from the corrected X.

use crate::falling::{FallingShapeRoot, Vec2};
use crate::grid::TileGrid;
use crate::shapes::rotate_offset;
use std::collections::BTreeMap;

const EPS: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center_x: f32,
    pub center_y: f32,
    pub half_w: f32,
    pub half_h: f32,
}

impl Aabb {
    pub fn min_x(&self) -> f32 {
        self.center_x - self.half_w
    }
    pub fn max_x(&self) -> f32 {
        self.center_x + self.half_w
    }
    pub fn min_y(&self) -> f32 {
        self.center_y - self.half_h
    }
    pub fn max_y(&self) -> f32 {
        self.center_y + self.half_h
    }

    fn translated(&self, by: Vec2) -> Self {
        Self {
            center_x: self.center_x + by.x,
            center_y: self.center_y + by.y,
            ..*self
        }
    }

    /// Overlap with a small tolerance, so touching boxes do not count.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x() < other.max_x() - EPS
            && self.max_x() > other.min_x() + EPS
            && self.min_y() < other.max_y() - EPS
            && self.max_y() > other.min_y() + EPS
    }

    /// Smallest box enclosing every part. Dynamic bodies move as this one box.
    fn union(parts: &[Self]) -> Option<Self> {
        let (first, rest) = parts.split_first()?;
        let (mut lo_x, mut lo_y, mut hi_x, mut hi_y) = (first.min_x(), first.min_y(), first.max_x(), first.max_y());
        for p in rest {
            lo_x = lo_x.min(p.min_x());
            lo_y = lo_y.min(p.min_y());
            hi_x = hi_x.max(p.max_x());
            hi_y = hi_y.max(p.max_y());
        }
        Some(Self {
            center_x: (lo_x + hi_x) * 0.5,
            center_y: (lo_y + hi_y) * 0.5,
            half_w: (hi_x - lo_x) * 0.5,
            half_h: (hi_y - lo_y) * 0.5,
        })
    }

    fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (mut lo_x, mut lo_y, mut hi_x, mut hi_y) = (first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            lo_x = lo_x.min(x);
            lo_y = lo_y.min(y);
            hi_x = hi_x.max(x);
            hi_y = hi_y.max(y);
        }
        Some(Self {
            center_x: (lo_x + hi_x) * 0.5,
            center_y: (lo_y + hi_y) * 0.5,
            half_w: (hi_x - lo_x) * 0.5,
            half_h: (hi_y - lo_y) * 0.5,
        })
    }
}

pub type Polygon = Vec<(f32, f32)>;

/// Unit square centred on a cell, in world units.
pub fn cell_square(x: i32, y: i32) -> Polygon {
    let (cx, cy) = (x as f32, y as f32);
    vec![
        (cx - 0.5, cy - 0.5),
        (cx + 0.5, cy - 0.5),
        (cx + 0.5, cy + 0.5),
        (cx - 0.5, cy + 0.5),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Kinematic,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Rect { half_w: f32, half_h: f32 },
    Polygon(Polygon),
    Compound(Vec<Polygon>),
}

impl BodyShape {
    /// Collision boxes relative to the body position.
    fn parts(&self) -> Vec<Aabb> {
        match self {
            Self::Rect { half_w, half_h } => vec![Aabb {
                center_x: 0.0,
                center_y: 0.0,
                half_w: *half_w,
                half_h: *half_h,
            }],
            Self::Polygon(p) => Aabb::from_points(p).into_iter().collect(),
            Self::Compound(ps) => ps.iter().filter_map(|p| Aabb::from_points(p)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(u32);

/// Which sides stopped a dynamic body during its last step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contacts {
    pub blocked_left: bool,
    pub blocked_right: bool,
    pub blocked_down: bool,
    pub blocked_up: bool,
}

#[derive(Debug, Clone)]
struct Body {
    kind: BodyKind,
    position: Vec2,
    velocity: Vec2,
    parts: Vec<Aabb>,
    contacts: Contacts,
}

impl Body {
    fn world_parts(&self) -> impl Iterator<Item = Aabb> + '_ {
        self.parts.iter().map(|p| p.translated(self.position))
    }
}

#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    bodies: BTreeMap<BodyHandle, Body>,
    next_id: u32,
    gravity: Vec2,
    pub max_fall_speed: f32,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec2::new(0.0, -30.0))
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_id: 0,
            gravity,
            max_fall_speed: 20.0,
        }
    }

    pub fn create_body(&mut self, kind: BodyKind, shape: BodyShape, position: Vec2) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;
        self.bodies.insert(
            handle,
            Body {
                kind,
                position,
                velocity: Vec2::default(),
                parts: shape.parts(),
                contacts: Contacts::default(),
            },
        );
        handle
    }

    /// Returns false if the handle was already gone.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies.remove(&handle).is_some()
    }

    #[cfg(test)]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&handle).map(|b| b.position)
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&handle).map(|b| b.velocity)
    }

    #[cfg(test)]
    pub fn contacts(&self, handle: BodyHandle) -> Contacts {
        self.bodies
            .get(&handle)
            .map(|b| b.contacts)
            .unwrap_or_default()
    }

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec2) {
        if let Some(b) = self.bodies.get_mut(&handle) {
            b.position = position;
        }
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2) {
        if let Some(b) = self.bodies.get_mut(&handle) {
            b.velocity = velocity;
        }
    }

    #[cfg(test)]
    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    /// World boxes of every static and kinematic body except `skip`.
    fn solids_except(&self, skip: BodyHandle) -> Vec<Aabb> {
        self.bodies
            .iter()
            .filter(|(h, b)| **h != skip && b.kind != BodyKind::Dynamic)
            .flat_map(|(_, b)| b.world_parts())
            .collect()
    }

    /// True if the body currently overlaps any static or kinematic body.
    pub fn is_overlapping(&self, handle: BodyHandle) -> bool {
        let Some(body) = self.bodies.get(&handle) else {
            return false;
        };
        let solids = self.solids_except(handle);
        body.world_parts()
            .any(|p| solids.iter().any(|s| p.overlaps(s)))
    }

    /// Advances kinematic bodies by their velocity and dynamic bodies by gravity plus collision.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        for body in self.bodies.values_mut() {
            if body.kind == BodyKind::Kinematic {
                body.position.x += body.velocity.x * dt;
                body.position.y += body.velocity.y * dt;
            }
        }
        let dynamic: Vec<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.kind == BodyKind::Dynamic)
            .map(|(h, _)| *h)
            .collect();
        for handle in dynamic {
            let solids = self.solids_except(handle);
            let gravity = self.gravity;
            let max_fall = self.max_fall_speed;
            let Some(body) = self.bodies.get_mut(&handle) else {
                continue;
            };
            body.velocity.x += gravity.x * dt;
            body.velocity.y = (body.velocity.y + gravity.y * dt).clamp(-max_fall, max_fall);
            let Some(shape) = Aabb::union(&body.parts) else {
                continue;
            };
            let aabb = shape.translated(body.position);
            let dx = body.velocity.x * dt;
            let dy = body.velocity.y * dt;
            let (moved, contacts) = move_and_slide(&solids, aabb, dx, dy);
            body.position = Vec2::new(moved.center_x - shape.center_x, moved.center_y - shape.center_y);
            if contacts.blocked_left || contacts.blocked_right {
                body.velocity.x = 0.0;
            }
            if contacts.blocked_down || contacts.blocked_up {
                body.velocity.y = 0.0;
            }
            body.contacts = contacts;
        }
    }
}

fn resolve_axis_x(solids: &[Aabb], aabb: Aabb, dx: f32) -> f32 {
    if dx == 0.0 {
        return aabb.center_x;
    }
    let mut candidate_x = aabb.center_x + dx;
    for s in solids {
        if aabb.max_y() <= s.min_y() + EPS || aabb.min_y() >= s.max_y() - EPS {
            continue;
        }
        if dx > 0.0 && s.min_x() >= aabb.max_x() - EPS {
            candidate_x = candidate_x.min(s.min_x() - aabb.half_w);
        } else if dx < 0.0 && s.max_x() <= aabb.min_x() + EPS {
            candidate_x = candidate_x.max(s.max_x() + aabb.half_w);
        }
    }
    // Never push opposite to the motion.
    if dx > 0.0 {
        candidate_x.max(aabb.center_x)
    } else {
        candidate_x.min(aabb.center_x)
    }
}

fn resolve_axis_y(solids: &[Aabb], aabb: Aabb, dy: f32) -> f32 {
    if dy == 0.0 {
        return aabb.center_y;
    }
    let mut candidate_y = aabb.center_y + dy;
    for s in solids {
        if aabb.max_x() <= s.min_x() + EPS || aabb.min_x() >= s.max_x() - EPS {
            continue;
        }
        if dy > 0.0 && s.min_y() >= aabb.max_y() - EPS {
            candidate_y = candidate_y.min(s.min_y() - aabb.half_h);
        } else if dy < 0.0 && s.max_y() <= aabb.min_y() + EPS {
            candidate_y = candidate_y.max(s.max_y() + aabb.half_h);
        }
    }
    if dy > 0.0 {
        candidate_y.max(aabb.center_y)
    } else {
        candidate_y.min(aabb.center_y)
    }
}

/// Moves `aabb` by (dx, dy) against `solids`, X first.
pub fn move_and_slide(solids: &[Aabb], aabb: Aabb, dx: f32, dy: f32) -> (Aabb, Contacts) {
    let resolved_x = resolve_axis_x(solids, aabb, dx);
    let collided_x = (resolved_x - (aabb.center_x + dx)).abs() > EPS;
    let mut moved = aabb;
    moved.center_x = resolved_x;
    let resolved_y = resolve_axis_y(solids, moved, dy);
    let collided_y = (resolved_y - (aabb.center_y + dy)).abs() > EPS;
    moved.center_y = resolved_y;
    (
        moved,
        Contacts {
            blocked_left: collided_x && dx < 0.0,
            blocked_right: collided_x && dx > 0.0,
            blocked_down: collided_y && dy < 0.0,
            blocked_up: collided_y && dy > 0.0,
        },
    )
}

/// Floor under row 0 and walls either side of the grid. No ceiling.
pub fn create_bounds(world: &mut PhysicsWorld, width: usize, height: usize) -> Vec<BodyHandle> {
    let w = width as f32;
    let tall = height as f32 + 20.0;
    let rect = |half_w, half_h| BodyShape::Rect { half_w, half_h };
    vec![
        world.create_body(BodyKind::Static, rect(w * 0.5 + 1.0, 0.5), Vec2::new(w * 0.5 - 0.5, -1.0)),
        world.create_body(BodyKind::Static, rect(0.5, tall * 0.5), Vec2::new(-1.0, tall * 0.5 - 1.5)),
        world.create_body(BodyKind::Static, rect(0.5, tall * 0.5), Vec2::new(w, tall * 0.5 - 1.5)),
    ]
}

/// The one static compound body covering the grid's wall cells.
#[derive(Debug, Default)]
pub struct GridColliders {
    handle: Option<BodyHandle>,
    pub rebuilds: u32,
}

impl GridColliders {
    /// Destroys the previous body and builds a new one from the current walls.
    pub fn rebuild(&mut self, world: &mut PhysicsWorld, grid: &TileGrid) {
        if let Some(old) = self.handle.take() {
            world.destroy_body(old);
        }
        self.rebuilds += 1;
        let squares: Vec<Polygon> = grid.walls().map(|(c, _)| cell_square(c.x, c.y)).collect();
        if squares.is_empty() {
            return;
        }
        log::debug!("rebuilding grid colliders (#{}): {} cells", self.rebuilds, squares.len());
        self.handle = Some(world.create_body(
            BodyKind::Static,
            BodyShape::Compound(squares),
            Vec2::default(),
        ));
    }

    #[cfg(test)]
    pub fn handle(&self) -> Option<BodyHandle> {
        self.handle
    }
}

/// Kinematic unit boxes mirroring the active shape's blocks.
#[derive(Debug, Default)]
pub struct FallingBodies {
    handles: Vec<BodyHandle>,
}

impl FallingBodies {
    pub fn clear(&mut self, world: &mut PhysicsWorld) {
        for h in self.handles.drain(..) {
            world.destroy_body(h);
        }
    }

    /// Recreates the bodies when the shape changed, then moves them to the blocks' positions.
    pub fn sync(&mut self, world: &mut PhysicsWorld, root: Option<&FallingShapeRoot>, respawned: bool) {
        let Some(root) = root else {
            self.clear(world);
            return;
        };
        if respawned || self.handles.len() != root.blocks.len() {
            self.clear(world);
            for _ in &root.blocks {
                self.handles.push(world.create_body(
                    BodyKind::Kinematic,
                    BodyShape::Polygon(cell_square(0, 0)),
                    root.position,
                ));
            }
        }
        let x = root.position.x.round();
        for (h, block) in self.handles.iter().zip(&root.blocks) {
            let r = rotate_offset(block.local, root.rotation);
            world.set_position(*h, Vec2::new(x + r.x as f32, root.position.y + r.y as f32));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GravityDir {
    #[default]
    Down,
    Up,
}

impl GravityDir {
    pub fn flipped(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
        }
    }

    /// -1 for down, +1 for up.
    pub fn sign(self) -> f32 {
        match self {
            Self::Down => -1.0,
            Self::Up => 1.0,
        }
    }
}

/// The player's dynamic body and its gravity direction.
#[derive(Debug)]
pub struct PlayerProxy {
    body: BodyHandle,
    spawn: Vec2,
    gravity: GravityDir,
    pub gravity_strength: f32,
    pub walk_speed: f32,
}

impl PlayerProxy {
    pub const HALF_SIZE: f32 = 0.4;

    pub fn new(world: &mut PhysicsWorld, spawn: Vec2) -> Self {
        let body = world.create_body(
            BodyKind::Dynamic,
            BodyShape::Rect {
                half_w: Self::HALF_SIZE,
                half_h: Self::HALF_SIZE,
            },
            spawn,
        );
        let player = Self {
            body,
            spawn,
            gravity: GravityDir::Down,
            gravity_strength: 30.0,
            walk_speed: 5.0,
        };
        player.apply_gravity(world);
        player
    }

    fn apply_gravity(&self, world: &mut PhysicsWorld) {
        world.set_gravity(Vec2::new(0.0, self.gravity.sign() * self.gravity_strength));
    }

    pub fn gravity(&self) -> GravityDir {
        self.gravity
    }

    pub fn position(&self, world: &PhysicsWorld) -> Vec2 {
        world.position(self.body).unwrap_or(self.spawn)
    }

    /// `direction` in [-1, 1].
    pub fn walk(&self, world: &mut PhysicsWorld, direction: f32) {
        let v = world.velocity(self.body).unwrap_or_default();
        world.set_velocity(self.body, Vec2::new(direction.clamp(-1.0, 1.0) * self.walk_speed, v.y));
    }

    pub fn flip_gravity(&mut self, world: &mut PhysicsWorld) {
        self.gravity = self.gravity.flipped();
        self.apply_gravity(world);
    }

    /// Back to spawn, at rest, gravity down.
    pub fn reset(&mut self, world: &mut PhysicsWorld) {
        world.set_position(self.body, self.spawn);
        world.set_velocity(self.body, Vec2::default());
        self.gravity = GravityDir::Down;
        self.apply_gravity(world);
    }

    /// Lifts the player out of solids against gravity, one cell at a time, at most `max_cells`.
    /// Returns true if the player ended up free.
    pub fn unstick(&self, world: &mut PhysicsWorld, max_cells: usize) -> bool {
        let mut pos = self.position(world);
        for _ in 0..max_cells {
            if !world.is_overlapping(self.body) {
                return true;
            }
            pos.y -= self.gravity.sign();
            world.set_position(self.body, pos);
        }
        !world.is_overlapping(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, IVec2};
    use crate::shapes::{Rotation, ShapeCatalog, ShapeId};

    fn world_with_bounds() -> PhysicsWorld {
        let mut world = PhysicsWorld::default();
        create_bounds(&mut world, 10, 20);
        world
    }

    fn run(world: &mut PhysicsWorld, seconds: f32) {
        let steps = (seconds / 0.01) as usize;
        for _ in 0..steps {
            world.step(0.01);
        }
    }

    #[test]
    fn test_player_lands_on_floor() {
        let mut world = world_with_bounds();
        let player = PlayerProxy::new(&mut world, Vec2::new(4.0, 5.0));
        run(&mut world, 2.0);
        let pos = player.position(&world);
        assert!((pos.y - (-0.5 + PlayerProxy::HALF_SIZE)).abs() < 0.01, "y = {}", pos.y);
        assert!(world.contacts(player.body).blocked_down);
    }

    #[test]
    fn test_player_stands_on_grid_colliders() {
        let mut world = world_with_bounds();
        let mut grid = TileGrid::new(10, 20);
        for y in 0..3 {
            grid.set(IVec2::new(4, y), Cell::Wall(ShapeId(0)));
        }
        let mut colliders = GridColliders::default();
        colliders.rebuild(&mut world, &grid);
        let player = PlayerProxy::new(&mut world, Vec2::new(4.0, 8.0));
        run(&mut world, 2.0);
        let pos = player.position(&world);
        assert!((pos.y - (2.5 + PlayerProxy::HALF_SIZE)).abs() < 0.01, "y = {}", pos.y);
    }

    #[test]
    fn test_compound_dynamic_body_rests_on_lowest_part() {
        let mut world = world_with_bounds();
        let body = world.create_body(
            BodyKind::Dynamic,
            BodyShape::Compound(vec![cell_square(0, 1), cell_square(0, 0)]),
            Vec2::new(4.0, 3.0),
        );
        run(&mut world, 2.0);
        let pos = world.position(body).unwrap();
        assert!(pos.y.abs() < 0.01, "y = {}", pos.y);
        assert!(world.contacts(body).blocked_down);
        assert!(!world.is_overlapping(body));
    }

    #[test]
    fn test_rebuild_replaces_previous_body() {
        let mut world = PhysicsWorld::default();
        let mut grid = TileGrid::new(10, 20);
        let mut colliders = GridColliders::default();
        colliders.rebuild(&mut world, &grid);
        assert_eq!(world.body_count(), 0);
        assert!(colliders.handle().is_none());

        grid.set(IVec2::new(1, 0), Cell::Wall(ShapeId(1)));
        colliders.rebuild(&mut world, &grid);
        colliders.rebuild(&mut world, &grid);
        assert_eq!(world.body_count(), 1);
        assert_eq!(colliders.rebuilds, 3);
    }

    #[test]
    fn test_walls_block_walking() {
        let mut world = world_with_bounds();
        let player = PlayerProxy::new(&mut world, Vec2::new(1.0, 0.0));
        for _ in 0..300 {
            player.walk(&mut world, -1.0);
            world.step(0.01);
        }
        let pos = player.position(&world);
        assert!(pos.x >= -0.5 + PlayerProxy::HALF_SIZE - 0.01, "x = {}", pos.x);
    }

    #[test]
    fn test_flip_gravity_rises_and_reset_restores() {
        let mut world = world_with_bounds();
        let mut player = PlayerProxy::new(&mut world, Vec2::new(4.0, 1.0));
        player.flip_gravity(&mut world);
        assert_eq!(player.gravity(), GravityDir::Up);
        run(&mut world, 1.0);
        assert!(player.position(&world).y > 10.0);

        player.reset(&mut world);
        assert_eq!(player.gravity(), GravityDir::Down);
        assert_eq!(player.position(&world), Vec2::new(4.0, 1.0));
        assert_eq!(world.velocity(player.body), Some(Vec2::default()));
        assert!(world.gravity().y < 0.0);
    }

    #[test]
    fn test_unstick_lifts_player_out_of_new_cells() {
        let mut world = world_with_bounds();
        let mut grid = TileGrid::new(10, 20);
        let player = PlayerProxy::new(&mut world, Vec2::new(4.0, 0.5));
        for y in 0..2 {
            grid.set(IVec2::new(4, y), Cell::Wall(ShapeId(2)));
        }
        let mut colliders = GridColliders::default();
        colliders.rebuild(&mut world, &grid);
        assert!(world.is_overlapping(player.body));
        assert!(player.unstick(&mut world, 20));
        assert!(player.position(&world).y > 1.5);
    }

    #[test]
    fn test_falling_bodies_follow_shape() {
        let mut world = PhysicsWorld::default();
        let shape = ShapeCatalog::standard().get(ShapeId(1)).unwrap();
        let root = FallingShapeRoot::new(shape, Rotation::default(), Vec2::new(3.0, 7.25));
        let mut bodies = FallingBodies::default();
        bodies.sync(&mut world, Some(&root), true);
        assert_eq!(bodies.handles.len(), 4);
        assert_eq!(world.body_count(), 4);
        let positions: Vec<_> = bodies
            .handles
            .iter()
            .filter_map(|h| world.position(*h))
            .collect();
        assert!(positions.contains(&Vec2::new(3.0, 7.25)));
        assert!(positions.contains(&Vec2::new(4.0, 8.25)));
        let inside = world.create_body(
            BodyKind::Dynamic,
            BodyShape::Rect { half_w: 0.2, half_h: 0.2 },
            Vec2::new(4.0, 8.25),
        );
        assert!(world.is_overlapping(inside));
        world.destroy_body(inside);
        bodies.sync(&mut world, None, false);
        assert!(bodies.handles.is_empty());
        assert_eq!(world.body_count(), 0);
    }
}
