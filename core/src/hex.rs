//! Hexagonal grid geometry.
//!
//! Cells are addressed by row and column in an offset layout where every
//! column is a vertical strip of hexagons. Odd columns sit half a cell lower
//! than even columns, so the diagonal neighbours of a cell depend on the
//! parity of its column.

use serde::{Deserialize, Serialize};

/// Location of a single hex cell expressed as row and column coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    row: u32,
    column: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    const fn is_even_column(&self) -> bool {
        self.column % 2 == 0
    }
}

/// One of the six directions a hex cell faces, spaced 60 degrees apart.
///
/// Variants are listed clockwise starting from [`Orientation::Up`]; the
/// [`Orientation::index`] of each variant follows the same order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orientation {
    /// Toward decreasing row indices in the same column.
    Up,
    /// Toward the next column, upper neighbour.
    UpRight,
    /// Toward the next column, lower neighbour.
    DownRight,
    /// Toward increasing row indices in the same column.
    Down,
    /// Toward the previous column, lower neighbour.
    DownLeft,
    /// Toward the previous column, upper neighbour.
    UpLeft,
}

impl Orientation {
    /// Every orientation in clockwise order starting from `Up`.
    pub const ALL: [Orientation; 6] = [
        Self::Up,
        Self::UpRight,
        Self::DownRight,
        Self::Down,
        Self::DownLeft,
        Self::UpLeft,
    ];

    /// Clockwise index of the orientation in `0..6`.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Up => 0,
            Self::UpRight => 1,
            Self::DownRight => 2,
            Self::Down => 3,
            Self::DownLeft => 4,
            Self::UpLeft => 5,
        }
    }

    /// Orientation with the provided clockwise index, wrapping modulo six.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        Self::ALL[(index % 6) as usize]
    }

    /// Orientation rotated by `steps` sixths of a turn; positive is clockwise.
    #[must_use]
    pub const fn rotated(self, steps: i8) -> Self {
        let shifted = (self.index() as i16 + steps as i16).rem_euclid(6);
        Self::from_index(shifted as u8)
    }

    /// Orientation rotated one step clockwise.
    #[must_use]
    pub const fn clockwise(self) -> Self {
        self.rotated(1)
    }

    /// Orientation rotated one step counterclockwise.
    #[must_use]
    pub const fn counter_clockwise(self) -> Self {
        self.rotated(-1)
    }

    /// Orientation pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        self.rotated(3)
    }

    /// Number of clockwise steps needed to turn `from` into `self`.
    #[must_use]
    pub const fn steps_from(self, from: Orientation) -> u8 {
        (self.index() + 6 - from.index()) % 6
    }
}

// (row delta, column delta) per orientation index.
const EVEN_COLUMN_OFFSETS: [(i64, i64); 6] = [(-1, 0), (-1, 1), (0, 1), (1, 0), (0, -1), (-1, -1)];
const ODD_COLUMN_OFFSETS: [(i64, i64); 6] = [(-1, 0), (0, 1), (1, 1), (1, 0), (1, -1), (0, -1)];

/// Bounded hexagonal grid dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexGrid {
    rows: u32,
    columns: u32,
}

impl HexGrid {
    /// Creates a new grid description with explicit dimensions.
    #[must_use]
    pub const fn new(rows: u32, columns: u32) -> Self {
        Self { rows, columns }
    }

    /// Number of rows contained in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns contained in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Total number of cells in the grid.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Reports whether the cell lies within `[0, rows) x [0, columns)`.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.row() < self.rows && cell.column() < self.columns
    }

    /// Dense row-major index of the cell, if it lies inside the grid.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Adjacent cell in the provided direction, or `None` past the boundary.
    #[must_use]
    pub fn neighbor(&self, cell: CellCoord, orientation: Orientation) -> Option<CellCoord> {
        let table = if cell.is_even_column() {
            &EVEN_COLUMN_OFFSETS
        } else {
            &ODD_COLUMN_OFFSETS
        };
        let (row_delta, column_delta) = table[usize::from(orientation.index())];
        let row = u32::try_from(i64::from(cell.row()) + row_delta).ok()?;
        let column = u32::try_from(i64::from(cell.column()) + column_delta).ok()?;
        let candidate = CellCoord::new(row, column);
        self.contains(candidate).then_some(candidate)
    }

    /// Direction leading from `from` to the adjacent cell `to`, if they touch.
    #[must_use]
    pub fn direction_between(&self, from: CellCoord, to: CellCoord) -> Option<Orientation> {
        Orientation::ALL
            .into_iter()
            .find(|&orientation| self.neighbor(from, orientation) == Some(to))
    }

    /// Iterator over every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let columns = self.columns;
        (0..self.rows)
            .flat_map(move |row| (0..columns).map(move |column| CellCoord::new(row, column)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_column_diagonals_lean_upward() {
        let grid = HexGrid::new(5, 5);
        let cell = CellCoord::new(2, 2);
        assert_eq!(grid.neighbor(cell, Orientation::UpRight), Some(CellCoord::new(1, 3)));
        assert_eq!(grid.neighbor(cell, Orientation::DownRight), Some(CellCoord::new(2, 3)));
        assert_eq!(grid.neighbor(cell, Orientation::DownLeft), Some(CellCoord::new(2, 1)));
        assert_eq!(grid.neighbor(cell, Orientation::UpLeft), Some(CellCoord::new(1, 1)));
    }

    #[test]
    fn odd_column_diagonals_lean_downward() {
        let grid = HexGrid::new(5, 5);
        let cell = CellCoord::new(2, 1);
        assert_eq!(grid.neighbor(cell, Orientation::UpRight), Some(CellCoord::new(2, 2)));
        assert_eq!(grid.neighbor(cell, Orientation::DownRight), Some(CellCoord::new(3, 2)));
        assert_eq!(grid.neighbor(cell, Orientation::DownLeft), Some(CellCoord::new(3, 0)));
        assert_eq!(grid.neighbor(cell, Orientation::UpLeft), Some(CellCoord::new(2, 0)));
    }

    #[test]
    fn neighbor_returns_none_outside_grid() {
        let grid = HexGrid::new(3, 3);
        assert_eq!(grid.neighbor(CellCoord::new(0, 0), Orientation::Up), None);
        assert_eq!(grid.neighbor(CellCoord::new(0, 0), Orientation::UpLeft), None);
        assert_eq!(grid.neighbor(CellCoord::new(2, 1), Orientation::DownRight), None);
        assert_eq!(grid.neighbor(CellCoord::new(1, 2), Orientation::UpRight), None);
    }

    #[test]
    fn opposite_steps_return_to_origin() {
        let grid = HexGrid::new(6, 6);
        for cell in grid.cells() {
            for orientation in Orientation::ALL {
                if let Some(next) = grid.neighbor(cell, orientation) {
                    assert_eq!(grid.neighbor(next, orientation.opposite()), Some(cell));
                }
            }
        }
    }

    #[test]
    fn rotation_wraps_around() {
        assert_eq!(Orientation::UpLeft.clockwise(), Orientation::Up);
        assert_eq!(Orientation::Up.counter_clockwise(), Orientation::UpLeft);
        assert_eq!(Orientation::DownLeft.opposite(), Orientation::UpRight);
        assert_eq!(Orientation::Down.steps_from(Orientation::UpRight), 2);
    }
}
