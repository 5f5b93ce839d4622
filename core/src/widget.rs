//! Widget shapes, orientation symmetry and occupied-cell computation.

use serde::{Deserialize, Serialize};

use crate::{CellCoord, HexGrid, Orientation};

/// Shape family of a widget. A widget never changes type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WidgetType {
    /// Three cells in a straight line through the center.
    Widget3,
    /// Center plus three alternating neighbours, forming a tripod.
    Widget4,
    /// Center plus four neighbours, leaving one opposing pair open.
    Widget5,
}

impl WidgetType {
    /// Every widget type.
    pub const ALL: [WidgetType; 3] = [Self::Widget3, Self::Widget4, Self::Widget5];

    /// Number of distinct orientations before the shape maps onto itself.
    #[must_use]
    pub const fn symmetry_period(self) -> u8 {
        match self {
            Self::Widget3 | Self::Widget5 => 3,
            Self::Widget4 => 2,
        }
    }

    /// Number of cells covered by a widget of this type.
    #[must_use]
    pub const fn cell_count(self) -> usize {
        self.template().len() + 1
    }

    /// Directions from the center to each non-center cell at orientation `Up`.
    const fn template(self) -> &'static [Orientation] {
        match self {
            Self::Widget3 => &[Orientation::Up, Orientation::Down],
            Self::Widget4 => &[Orientation::Up, Orientation::DownRight, Orientation::DownLeft],
            Self::Widget5 => &[
                Orientation::UpRight,
                Orientation::DownRight,
                Orientation::DownLeft,
                Orientation::UpLeft,
            ],
        }
    }

    /// Reduces an orientation to the representative of its symmetry class.
    #[must_use]
    pub const fn canonical_orientation(self, orientation: Orientation) -> Orientation {
        Orientation::from_index(orientation.index() % self.symmetry_period())
    }

    /// Canonical orientation that draws the provided named facing.
    ///
    /// Returns `None` when the facing does not exist for this type, e.g. a
    /// `Horizontal` three-cell widget.
    #[must_use]
    pub const fn orientation_of(self, facing: WidgetFacing) -> Option<Orientation> {
        let index = match (self, facing) {
            (Self::Widget3, WidgetFacing::Vertical)
            | (Self::Widget4, WidgetFacing::Up)
            | (Self::Widget5, WidgetFacing::Horizontal) => 0,
            (Self::Widget3, WidgetFacing::SlantRight)
            | (Self::Widget4, WidgetFacing::Down)
            | (Self::Widget5, WidgetFacing::SlantLeft) => 1,
            (Self::Widget3, WidgetFacing::SlantLeft)
            | (Self::Widget5, WidgetFacing::SlantRight) => 2,
            _ => return None,
        };
        Some(Orientation::from_index(index))
    }

    /// Named facing drawn by the provided orientation.
    #[must_use]
    pub const fn facing_of(self, orientation: Orientation) -> WidgetFacing {
        match (self, self.canonical_orientation(orientation).index()) {
            (Self::Widget3, 0) => WidgetFacing::Vertical,
            (Self::Widget3, 1) => WidgetFacing::SlantRight,
            (Self::Widget3, _) => WidgetFacing::SlantLeft,
            (Self::Widget4, 0) => WidgetFacing::Up,
            (Self::Widget4, _) => WidgetFacing::Down,
            (Self::Widget5, 0) => WidgetFacing::Horizontal,
            (Self::Widget5, 1) => WidgetFacing::SlantLeft,
            (Self::Widget5, _) => WidgetFacing::SlantRight,
        }
    }
}

/// Named widget facings as they appear in level definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetFacing {
    /// Three-cell widget standing upright.
    Vertical,
    /// Upper end leans toward decreasing columns.
    SlantLeft,
    /// Upper end leans toward increasing columns.
    SlantRight,
    /// Four-cell widget with a single cell above the center.
    Up,
    /// Four-cell widget with a single cell below the center.
    Down,
    /// Five-cell widget spread across the columns either side of its center.
    Horizontal,
}

/// Rotation applied to a widget around its fixed center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Spin {
    /// One sixth of a turn clockwise.
    Clockwise,
    /// One sixth of a turn counterclockwise.
    CounterClockwise,
}

/// Placement of a single widget.
///
/// The orientation is stored in canonical form, so two placements that draw
/// the same cells always compare and hash equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WidgetState {
    kind: WidgetType,
    center: CellCoord,
    orientation: Orientation,
}

impl WidgetState {
    /// Creates a widget placement, canonicalizing the orientation.
    #[must_use]
    pub const fn new(kind: WidgetType, center: CellCoord, orientation: Orientation) -> Self {
        Self {
            kind,
            center,
            orientation: kind.canonical_orientation(orientation),
        }
    }

    /// Type of the widget.
    #[must_use]
    pub const fn kind(&self) -> WidgetType {
        self.kind
    }

    /// Cell the widget rotates around.
    #[must_use]
    pub const fn center(&self) -> CellCoord {
        self.center
    }

    /// Canonical orientation of the widget.
    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Named facing of the widget.
    #[must_use]
    pub const fn facing(&self) -> WidgetFacing {
        self.kind.facing_of(self.orientation)
    }

    /// Every cell covered by the widget, center first.
    ///
    /// Returns `None` if any cell would fall outside the grid.
    #[must_use]
    pub fn occupied_cells(&self, grid: &HexGrid) -> Option<Vec<CellCoord>> {
        self.footprint(grid).into_iter().collect()
    }

    /// Cells covered by the widget, center first, with `None` in place of
    /// each cell that falls outside the grid.
    #[must_use]
    pub fn footprint(&self, grid: &HexGrid) -> Vec<Option<CellCoord>> {
        let steps = self.orientation.index() as i8;
        let mut cells = Vec::with_capacity(self.kind.cell_count());
        if !grid.contains(self.center) {
            cells.resize(self.kind.cell_count(), None);
            return cells;
        }
        cells.push(Some(self.center));
        cells.extend(
            self.kind
                .template()
                .iter()
                .map(|direction| grid.neighbor(self.center, direction.rotated(steps))),
        );
        cells
    }

    /// Widget shifted one cell in the provided direction, orientation kept.
    ///
    /// Returns `None` if the new center falls outside the grid.
    #[must_use]
    pub fn translated(&self, grid: &HexGrid, direction: Orientation) -> Option<Self> {
        let center = grid.neighbor(self.center, direction)?;
        Some(Self::new(self.kind, center, self.orientation))
    }

    /// Widget rotated one step about its center.
    #[must_use]
    pub const fn spun(&self, spin: Spin) -> Self {
        let orientation = match spin {
            Spin::Clockwise => self.orientation.clockwise(),
            Spin::CounterClockwise => self.orientation.counter_clockwise(),
        };
        Self::new(self.kind, self.center, orientation)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn cell_set(widget: WidgetState, grid: &HexGrid) -> BTreeSet<CellCoord> {
        widget
            .occupied_cells(grid)
            .expect("widget inside grid")
            .into_iter()
            .collect()
    }

    #[test]
    fn rotations_by_symmetry_period_collapse() {
        let center = CellCoord::new(3, 3);
        for kind in WidgetType::ALL {
            let period = kind.symmetry_period() as i8;
            for orientation in Orientation::ALL {
                let a = WidgetState::new(kind, center, orientation);
                let b = WidgetState::new(kind, center, orientation.rotated(period));
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn canonical_orientations_draw_distinct_shapes() {
        let grid = HexGrid::new(7, 7);
        let center = CellCoord::new(3, 3);
        for kind in WidgetType::ALL {
            let shapes: BTreeSet<_> = (0..kind.symmetry_period())
                .map(|index| {
                    let orientation = Orientation::from_index(index);
                    cell_set(WidgetState::new(kind, center, orientation), &grid)
                })
                .collect();
            assert_eq!(shapes.len(), usize::from(kind.symmetry_period()));
        }
    }

    #[test]
    fn equal_orientations_draw_equal_cells() {
        let grid = HexGrid::new(7, 7);
        let center = CellCoord::new(3, 2);
        for kind in WidgetType::ALL {
            for orientation in Orientation::ALL {
                let raw = WidgetState::new(kind, center, orientation);
                let turned = orientation.rotated(kind.symmetry_period() as i8);
                let shifted = WidgetState::new(kind, center, turned);
                assert_eq!(cell_set(raw, &grid), cell_set(shifted, &grid));
            }
        }
    }

    #[test]
    fn vertical_three_cell_widget_spans_column() {
        let grid = HexGrid::new(5, 5);
        let widget = WidgetState::new(WidgetType::Widget3, CellCoord::new(2, 2), Orientation::Up);
        let expected: BTreeSet<_> = [
            CellCoord::new(1, 2),
            CellCoord::new(2, 2),
            CellCoord::new(3, 2),
        ]
            .into_iter()
            .collect();
        assert_eq!(cell_set(widget, &grid), expected);
        assert_eq!(widget.facing(), WidgetFacing::Vertical);
    }

    #[test]
    fn horizontal_five_cell_widget_skips_vertical_neighbours() {
        let grid = HexGrid::new(5, 5);
        let widget = WidgetState::new(WidgetType::Widget5, CellCoord::new(2, 1), Orientation::Up);
        let cells = cell_set(widget, &grid);
        assert_eq!(cells.len(), 5);
        assert!(!cells.contains(&CellCoord::new(1, 1)));
        assert!(!cells.contains(&CellCoord::new(3, 1)));
        assert!(cells.contains(&CellCoord::new(3, 0)));
        assert!(cells.contains(&CellCoord::new(2, 2)));
    }

    #[test]
    fn facings_map_to_orientations_and_back() {
        for kind in WidgetType::ALL {
            for index in 0..kind.symmetry_period() {
                let orientation = Orientation::from_index(index);
                let facing = kind.facing_of(orientation);
                assert_eq!(kind.orientation_of(facing), Some(orientation));
            }
        }
        assert_eq!(WidgetType::Widget3.orientation_of(WidgetFacing::Horizontal), None);
        assert_eq!(WidgetType::Widget4.orientation_of(WidgetFacing::SlantLeft), None);
    }

    #[test]
    fn widgets_near_the_edge_report_out_of_bounds() {
        let grid = HexGrid::new(3, 3);
        let widget = WidgetState::new(WidgetType::Widget3, CellCoord::new(0, 1), Orientation::Up);
        assert_eq!(widget.occupied_cells(&grid), None);
        assert_eq!(widget.translated(&grid, Orientation::Up), None);
    }

    #[test]
    fn spinning_clockwise_then_back_restores_widget() {
        let widget = WidgetState::new(
            WidgetType::Widget5,
            CellCoord::new(2, 2),
            Orientation::DownRight,
        );
        assert_eq!(widget.spun(Spin::Clockwise).spun(Spin::CounterClockwise), widget);
        assert_eq!(widget.spun(Spin::Clockwise).facing(), WidgetFacing::Horizontal);
    }
}
