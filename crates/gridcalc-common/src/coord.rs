//! Cell coordinates and the column-letter alphabet.
//!
//! Columns and rows are 1-based with the same limits as Excel:
//! 1,048,576 rows × 16,384 columns. `CellCoordinate` keeps the `$A$1`
//! anchor flags and an optional sheet qualifier so it can render back to
//! the text it was parsed from.

use core::fmt;
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLS: u32 = 16_384;

/// Errors returned when constructing coordinates from unchecked inputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoordError {
    RowOutOfBounds(u64),
    ColOutOfBounds(u64),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::RowOutOfBounds(row) => {
                write!(f, "row {row} outside 1..={MAX_ROWS}")
            }
            CoordError::ColOutOfBounds(col) => {
                write!(f, "column {col} outside 1..={MAX_COLS}")
            }
        }
    }
}

impl std::error::Error for CoordError {}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellCoordinate {
    pub sheet: Option<String>,
    pub col: u32,
    pub row: u32,
    pub col_abs: bool,
    pub row_abs: bool,
}

impl CellCoordinate {
    /// Relative, unqualified coordinate after a bounds check.
    pub fn new(col: u32, row: u32) -> Result<Self, CoordError> {
        check_bounds(col as u64, row as u64)?;
        Ok(Self {
            sheet: None,
            col,
            row,
            col_abs: false,
            row_abs: false,
        })
    }

    pub fn with_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_anchors(mut self, col_abs: bool, row_abs: bool) -> Self {
        self.col_abs = col_abs;
        self.row_abs = row_abs;
        self
    }

    pub fn column_letters(&self) -> String {
        column_to_letters(self.col)
    }
}

pub(crate) fn check_bounds(col: u64, row: u64) -> Result<(), CoordError> {
    if col == 0 || col > MAX_COLS as u64 {
        return Err(CoordError::ColOutOfBounds(col));
    }
    if row == 0 || row > MAX_ROWS as u64 {
        return Err(CoordError::RowOutOfBounds(row));
    }
    Ok(())
}

impl fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", quote_sheet_name(sheet))?;
        }
        if self.col_abs {
            write!(f, "$")?;
        }
        write!(f, "{}", column_to_letters(self.col))?;
        if self.row_abs {
            write!(f, "$")?;
        }
        write!(f, "{}", self.row)
    }
}

/// Sheet names that are not plain identifiers render single-quoted, with
/// embedded quotes doubled.
pub fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// 1-based column index to letters: 1 → `A`, 27 → `AA`. Zero renders empty.
pub fn column_to_letters(mut col: u32) -> String {
    let mut buf = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        buf.push(b'A' + rem);
        col = (col - 1) / 26;
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}

/// Letters to a 1-based column index, case-insensitive. `None` for empty
/// input, non-letters, or overflow.
pub fn letters_to_column_index(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in s.bytes() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let val = (ch.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col.checked_mul(26)?.checked_add(val)?;
    }
    Some(col)
}

/// Orders column labels by their letter-sequence value: `A < Z < AA < AZ < BA`.
///
/// Comparison is by length, then by upper-cased letters, which is a total
/// order over all strings and agrees with the column index for valid labels.
pub fn column_sort(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        a.bytes()
            .map(|c| c.to_ascii_uppercase())
            .cmp(b.bytes().map(|c| c.to_ascii_uppercase()))
    })
}

/// Exact inverse of [`column_sort`].
pub fn column_reverse_sort(a: &str, b: &str) -> Ordering {
    column_sort(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert!(CellCoordinate::new(MAX_COLS, MAX_ROWS).is_ok());
        assert_eq!(
            CellCoordinate::new(MAX_COLS + 1, 1),
            Err(CoordError::ColOutOfBounds((MAX_COLS + 1) as u64))
        );
        assert_eq!(
            CellCoordinate::new(1, 0),
            Err(CoordError::RowOutOfBounds(0))
        );
    }

    #[test]
    fn display_keeps_anchors_and_sheet() {
        let c = CellCoordinate::new(28, 6).unwrap().with_anchors(true, false);
        assert_eq!(c.to_string(), "$AB6");
        let c = CellCoordinate::new(1, 1)
            .unwrap()
            .with_sheet("My Sheet")
            .with_anchors(true, true);
        assert_eq!(c.to_string(), "'My Sheet'!$A$1");
        let c = CellCoordinate::new(3, 2).unwrap().with_sheet("Data");
        assert_eq!(c.to_string(), "Data!C2");
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_to_letters(1), "A");
        assert_eq!(column_to_letters(26), "Z");
        assert_eq!(column_to_letters(27), "AA");
        assert_eq!(column_to_letters(702), "ZZ");
        assert_eq!(column_to_letters(703), "AAA");
        assert_eq!(column_to_letters(MAX_COLS), "XFD");
        assert_eq!(letters_to_column_index("xfd"), Some(MAX_COLS));
        assert_eq!(letters_to_column_index("A1"), None);
        assert_eq!(letters_to_column_index(""), None);
    }

    #[test]
    fn column_sort_orders_by_letter_value() {
        let mut cols = vec!["AA", "B", "ZZ", "A", "AAA", "BA", "AZ", "Z", "AB"];
        cols.sort_by(|a, b| column_sort(a, b));
        assert_eq!(
            cols,
            vec!["A", "B", "Z", "AA", "AB", "AZ", "BA", "ZZ", "AAA"]
        );
        cols.sort_by(|a, b| column_reverse_sort(a, b));
        assert_eq!(
            cols,
            vec!["AAA", "ZZ", "BA", "AZ", "AB", "AA", "Z", "B", "A"]
        );
    }
}
