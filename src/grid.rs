//! Tile grid: fixed-size board of wall cells tagged by shape colour. y=0 is the bottom row.

use crate::shapes::ShapeId;

/// Integer grid coordinate. May point outside the grid (spawn rows, predictions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IVec2 {
    pub x: i32,
    pub y: i32,
}

impl IVec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// 4-neighbourhood in match-search order: +X, -X, +Y, -Y.
pub const NEIGHBOURS_4: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// A cell is either empty or a wall carrying the colour of the shape that placed it.
/// An empty cell never carries a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Wall(ShapeId),
}

impl Cell {
    #[inline]
    pub const fn is_wall(self) -> bool {
        matches!(self, Self::Wall(_))
    }

    #[inline]
    pub const fn tag(self) -> Option<ShapeId> {
        match self {
            Self::Wall(id) => Some(id),
            Self::Empty => None,
        }
    }
}

/// Fixed `width × height` board. Columns are stored contiguously: `cells[x * height + y]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl TileGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, p: IVec2) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width && (p.y as usize) < self.height
    }

    #[inline]
    fn index(&self, p: IVec2) -> Option<usize> {
        self.in_bounds(p)
            .then(|| p.x as usize * self.height + p.y as usize)
    }

    /// Cell at `p`; `None` outside the grid.
    #[inline]
    pub fn get(&self, p: IVec2) -> Option<Cell> {
        self.index(p).map(|i| self.cells[i])
    }

    /// Writes are ignored outside the grid.
    #[inline]
    pub fn set(&mut self, p: IVec2, cell: Cell) {
        if let Some(i) = self.index(p) {
            self.cells[i] = cell;
        }
    }

    /// Out-of-bounds counts as "not a wall".
    #[inline]
    pub fn is_wall(&self, p: IVec2) -> bool {
        self.get(p).is_some_and(Cell::is_wall)
    }

    /// Colour tag at `p`, if it is an in-bounds wall.
    #[inline]
    pub fn tag_at(&self, p: IVec2) -> Option<ShapeId> {
        self.get(p).and_then(Cell::tag)
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::Empty);
    }

    /// True if any cell of the topmost row is a wall.
    pub fn top_row_occupied(&self) -> bool {
        let top = self.height as i32 - 1;
        (0..self.width as i32).any(|x| self.is_wall(IVec2::new(x, top)))
    }

    /// All wall cells, column-major.
    pub fn walls(&self) -> impl Iterator<Item = (IVec2, ShapeId)> + '_ {
        self.cells.iter().enumerate().filter_map(|(i, c)| {
            c.tag().map(|id| {
                let x = (i / self.height) as i32;
                let y = (i % self.height) as i32;
                (IVec2::new(x, y), id)
            })
        })
    }

    #[cfg(test)]
    pub fn wall_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_wall()).count()
    }
}
