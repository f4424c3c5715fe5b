//! Shape catalog: rotatable polyominoes with a pivot cell and a colour tag.

use crate::grid::IVec2;
use rand::Rng;
use std::rc::Rc;

/// Identity and colour tag of a catalog shape. Cells placed by a shape carry its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u8);

/// Quarter-turn rotation state (0°, 90°, 180°, 270°).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rotation(u8);

impl Rotation {
    #[cfg(test)]
    pub const ALL: [Self; 4] = [Self(0), Self(1), Self(2), Self(3)];

    pub const fn quarter_turns(self) -> u8 {
        self.0
    }

    pub const fn from_quarter_turns(turns: u8) -> Self {
        Self(turns % 4)
    }

    /// Counter-clockwise by 90°.
    pub const fn left(self) -> Self {
        Self((self.0 + 1) % 4)
    }

    /// Clockwise by 90°.
    pub const fn right(self) -> Self {
        Self((self.0 + 3) % 4)
    }
}

/// Rotates an offset about the pivot: `(x, y) -> (-y, x)` applied once per quarter turn.
#[inline]
pub fn rotate_offset(offset: IVec2, rotation: Rotation) -> IVec2 {
    let mut p = offset;
    for _ in 0..rotation.quarter_turns() {
        p = IVec2::new(-p.y, p.x);
    }
    p
}

/// Immutable shape: a `local_w × local_h` occupancy grid (row 0 = bottom), pivot and colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDefinition {
    pub name: &'static str,
    pub id: ShapeId,
    /// cells[y][x]; y grows upward.
    pub cells: Vec<Vec<bool>>,
    pub pivot_x: i32,
    pub pivot_y: i32,
}

impl ShapeDefinition {
    /// Builds a shape from rows written top to bottom (`#` = filled).
    pub fn from_rows(name: &'static str, id: ShapeId, rows: &[&str], pivot_x: i32, pivot_y: i32) -> Self {
        let cells = rows
            .iter()
            .rev()
            .map(|row| row.chars().map(|c| c == '#').collect())
            .collect();
        Self {
            name,
            id,
            cells,
            pivot_x,
            pivot_y,
        }
    }

    pub fn local_width(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn local_height(&self) -> usize {
        self.cells.len()
    }

    /// Occupied cells as offsets from the pivot, unrotated.
    pub fn offsets(&self) -> Vec<IVec2> {
        let mut out = Vec::with_capacity(4);
        for (y, row) in self.cells.iter().enumerate() {
            for (x, &filled) in row.iter().enumerate() {
                if filled {
                    out.push(IVec2::new(x as i32 - self.pivot_x, y as i32 - self.pivot_y));
                }
            }
        }
        out
    }

    /// Occupied offsets after rotating about the pivot.
    #[cfg(test)]
    pub fn rotated_offsets(&self, rotation: Rotation) -> Vec<IVec2> {
        self.offsets()
            .into_iter()
            .map(|o| rotate_offset(o, rotation))
            .collect()
    }

    /// Horizontal extent `(min_dx, max_dx)` of the bounding footprint at `rotation`.
    ///
    /// The whole local box is rotated, not just the filled cells, so the range the
    /// controller allows never depends on which cells happen to be filled.
    pub fn horizontal_extent(&self, rotation: Rotation) -> (i32, i32) {
        let w = self.local_width() as i32;
        let h = self.local_height() as i32;
        let corners = [
            IVec2::new(-self.pivot_x, -self.pivot_y),
            IVec2::new(w - 1 - self.pivot_x, -self.pivot_y),
            IVec2::new(-self.pivot_x, h - 1 - self.pivot_y),
            IVec2::new(w - 1 - self.pivot_x, h - 1 - self.pivot_y),
        ];
        corners
            .iter()
            .map(|&c| rotate_offset(c, rotation).x)
            .fold((i32::MAX, i32::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)))
    }
}

/// Fixed list of shapes built once per session. Instances share definitions by `Rc`.
#[derive(Debug, Clone)]
pub struct ShapeCatalog {
    shapes: Vec<Rc<ShapeDefinition>>,
}

impl ShapeCatalog {
    pub fn new(shapes: Vec<ShapeDefinition>) -> Self {
        Self {
            shapes: shapes.into_iter().map(Rc::new).collect(),
        }
    }

    /// The seven tetrominoes, one colour each.
    pub fn standard() -> Self {
        Self::new(vec![
            ShapeDefinition::from_rows("I", ShapeId(0), &["####"], 1, 0),
            ShapeDefinition::from_rows("O", ShapeId(1), &["##", "##"], 0, 0),
            ShapeDefinition::from_rows("T", ShapeId(2), &["###", ".#."], 1, 1),
            ShapeDefinition::from_rows("S", ShapeId(3), &[".##", "##."], 1, 0),
            ShapeDefinition::from_rows("Z", ShapeId(4), &["##.", ".##"], 1, 0),
            ShapeDefinition::from_rows("J", ShapeId(5), &["#..", "###"], 1, 0),
            ShapeDefinition::from_rows("L", ShapeId(6), &["..#", "###"], 1, 0),
        ])
    }

    #[cfg(test)]
    pub fn get(&self, id: ShapeId) -> Option<Rc<ShapeDefinition>> {
        self.shapes.iter().find(|s| s.id == id).cloned()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Rc<ShapeDefinition>> {
        self.shapes.iter()
    }

    /// Uniformly random shape; `None` only for an empty catalog.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Rc<ShapeDefinition>> {
        if self.shapes.is_empty() {
            return None;
        }
        let i = rng.random_range(0..self.shapes.len());
        Some(Rc::clone(&self.shapes[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    #[test]
    fn test_four_quarter_turns_is_identity() {
        for shape in ShapeCatalog::standard().iter() {
            let original: BTreeSet<_> = shape.offsets().into_iter().collect();
            let mut rotation = Rotation::default();
            for _ in 0..4 {
                rotation = rotation.left();
            }
            let turned: BTreeSet<_> = shape.rotated_offsets(rotation).into_iter().collect();
            assert_eq!(original, turned, "shape {}", shape.name);

            let stepped: BTreeSet<_> = (0..4)
                .fold(shape.offsets(), |cells, _| {
                    cells
                        .into_iter()
                        .map(|c| rotate_offset(c, Rotation::from_quarter_turns(1)))
                        .collect()
                })
                .into_iter()
                .collect();
            assert_eq!(original, stepped, "shape {}", shape.name);
        }
    }

    #[test]
    fn test_left_and_right_cancel() {
        for r in Rotation::ALL {
            assert_eq!(r.left().right(), r);
            assert_eq!(r.right().left(), r);
        }
        assert_eq!(Rotation::default().right().quarter_turns(), 3);
    }

    #[test]
    fn test_every_shape_has_four_cells_and_pivot_is_filled() {
        for shape in ShapeCatalog::standard().iter() {
            let offsets = shape.offsets();
            assert_eq!(offsets.len(), 4, "shape {}", shape.name);
            assert!(offsets.contains(&IVec2::new(0, 0)), "shape {}", shape.name);
        }
    }

    #[test]
    fn test_horizontal_extent_swaps_when_sideways() {
        let catalog = ShapeCatalog::standard();
        let i = catalog.get(ShapeId(0)).unwrap();
        assert_eq!(i.horizontal_extent(Rotation::from_quarter_turns(0)), (-1, 2));
        assert_eq!(i.horizontal_extent(Rotation::from_quarter_turns(1)), (0, 0));
        assert_eq!(i.horizontal_extent(Rotation::from_quarter_turns(2)), (-2, 1));
    }

    #[test]
    fn test_extent_covers_rotated_cells() {
        for shape in ShapeCatalog::standard().iter() {
            for r in Rotation::ALL {
                let (lo, hi) = shape.horizontal_extent(r);
                for c in shape.rotated_offsets(r) {
                    assert!(c.x >= lo && c.x <= hi, "shape {} rot {:?}", shape.name, r);
                }
            }
        }
    }

    #[test]
    fn test_random_is_deterministic_for_seed() {
        let catalog = ShapeCatalog::standard();
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(
                catalog.random(&mut a).map(|s| s.id),
                catalog.random(&mut b).map(|s| s.id)
            );
        }
        assert!(ShapeCatalog::new(Vec::new()).random(&mut a).is_none());
    }
}
