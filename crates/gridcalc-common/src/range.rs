use core::fmt;

use crate::coord::{CellCoordinate, quote_sheet_name};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rectangular inclusive region. `start` is always the top-left corner and
/// `end` the bottom-right one, whatever order the corners were given in.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellCoordinate,
    pub end: CellCoordinate,
}

impl CellRange {
    pub fn new(a: CellCoordinate, b: CellCoordinate) -> Self {
        let sheet = a.sheet.clone().or_else(|| b.sheet.clone());
        let (c0, c0_abs, c1, c1_abs) = if a.col <= b.col {
            (a.col, a.col_abs, b.col, b.col_abs)
        } else {
            (b.col, b.col_abs, a.col, a.col_abs)
        };
        let (r0, r0_abs, r1, r1_abs) = if a.row <= b.row {
            (a.row, a.row_abs, b.row, b.row_abs)
        } else {
            (b.row, b.row_abs, a.row, a.row_abs)
        };
        Self {
            start: CellCoordinate {
                sheet: sheet.clone(),
                col: c0,
                row: r0,
                col_abs: c0_abs,
                row_abs: r0_abs,
            },
            end: CellCoordinate {
                sheet,
                col: c1,
                row: r1,
                col_abs: c1_abs,
                row_abs: r1_abs,
            },
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        self.start.sheet.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        (self.start.col..=self.end.col).contains(&col)
            && (self.start.row..=self.end.row).contains(&row)
    }

    /// Overlap rectangle, or `None` when the ranges are disjoint or sit on
    /// different sheets.
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        let same_sheet = match (self.sheet(), other.sheet()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        if !same_sheet {
            return None;
        }
        let c0 = self.start.col.max(other.start.col);
        let c1 = self.end.col.min(other.end.col);
        let r0 = self.start.row.max(other.start.row);
        let r1 = self.end.row.min(other.end.row);
        if c0 > c1 || r0 > r1 {
            return None;
        }
        let corner = |col, row| CellCoordinate {
            sheet: self.start.sheet.clone(),
            col,
            row,
            col_abs: false,
            row_abs: false,
        };
        Some(CellRange::new(corner(c0, r0), corner(c1, r1)))
    }

    /// Row-major `(col, row)` pairs.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |r| (self.start.col..=self.end.col).map(move |c| (c, r)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = self.sheet() {
            write!(f, "{}!", quote_sheet_name(sheet))?;
        }
        let unqualified = |c: &CellCoordinate| CellCoordinate {
            sheet: None,
            ..c.clone()
        };
        write!(f, "{}:{}", unqualified(&self.start), unqualified(&self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(col: u32, row: u32) -> CellCoordinate {
        CellCoordinate::new(col, row).unwrap()
    }

    #[test]
    fn corners_are_normalised() {
        let r = CellRange::new(at(3, 1), at(1, 4));
        assert_eq!((r.start.col, r.start.row), (1, 1));
        assert_eq!((r.end.col, r.end.row), (3, 4));
        assert_eq!(r.width(), 3);
        assert_eq!(r.height(), 4);
        assert_eq!(r.to_string(), "A1:C4");
    }

    #[test]
    fn intersection() {
        let a = CellRange::new(at(1, 1), at(3, 3));
        let b = CellRange::new(at(2, 2), at(5, 5));
        let i = a.intersect(&b).unwrap();
        assert_eq!(i.to_string(), "B2:C3");
        let c = CellRange::new(at(10, 10), at(11, 11));
        assert!(a.intersect(&c).is_none());
        let other_sheet = CellRange::new(at(1, 1).with_sheet("S2"), at(2, 2));
        assert!(a.intersect(&other_sheet).is_none());
    }

    #[test]
    fn cells_are_row_major() {
        let r = CellRange::new(at(1, 1), at(2, 2));
        let cells: Vec<_> = r.cells().collect();
        assert_eq!(cells, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
        assert!(r.contains(2, 1));
        assert!(!r.contains(3, 1));
    }
}
