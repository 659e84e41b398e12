//! A1-style reference resolver.
//!
//! Accepted shapes:
//! * `A1`, `$A$1`, `a$1`
//! * `A1:B2` (corners in any order; the result is normalised)
//! * `Sheet1!A1`, `'My Sheet'!A1:B2` (`''` inside quotes is a literal quote)

use core::fmt;

use thiserror::Error;

use crate::coord::{CellCoordinate, CoordError, check_bounds};
use crate::range::CellRange;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("reference `{token}` is outside the grid: {source}")]
    OutOfBounds {
        token: String,
        #[source]
        source: CoordError,
    },
    #[error("malformed reference `{0}`")]
    Malformed(String),
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    Cell(CellCoordinate),
    Range(CellRange),
}

impl Reference {
    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::Cell(c) => c.sheet.as_deref(),
            Reference::Range(r) => r.sheet(),
        }
    }

    /// A single cell widens to a one-by-one range.
    pub fn to_range(&self) -> CellRange {
        match self {
            Reference::Cell(c) => CellRange::new(c.clone(), c.clone()),
            Reference::Range(r) => r.clone(),
        }
    }

    /// Same reference with the sheet qualifier replaced.
    pub fn with_sheet(&self, sheet: Option<String>) -> Reference {
        match self {
            Reference::Cell(c) => Reference::Cell(CellCoordinate {
                sheet,
                ..c.clone()
            }),
            Reference::Range(r) => Reference::Range(CellRange {
                start: CellCoordinate {
                    sheet: sheet.clone(),
                    ..r.start.clone()
                },
                end: CellCoordinate {
                    sheet,
                    ..r.end.clone()
                },
            }),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Cell(c) => write!(f, "{c}"),
            Reference::Range(r) => write!(f, "{r}"),
        }
    }
}

/// Parse a cell or range reference token.
pub fn parse_reference(token: &str) -> Result<Reference, ReferenceError> {
    let malformed = || ReferenceError::Malformed(token.to_string());
    let (sheet, rest) = split_sheet(token).ok_or_else(malformed)?;

    let mut parts = rest.split(':');
    let first = parts.next().ok_or_else(malformed)?;
    let second = parts.next();
    if parts.next().is_some() {
        return Err(malformed());
    }

    let mut start = parse_cell(token, first)?;
    start.sheet = sheet.clone();
    match second {
        None => Ok(Reference::Cell(start)),
        Some(second) => {
            let mut end = parse_cell(token, second)?;
            end.sheet = sheet;
            Ok(Reference::Range(CellRange::new(start, end)))
        }
    }
}

/// Split off an optional `Sheet!` / `'Sheet'!` qualifier.
fn split_sheet(token: &str) -> Option<(Option<String>, &str)> {
    if let Some(quoted) = token.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((i, ch)) = chars.next() {
            if ch == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    name.push('\'');
                    chars.next();
                    continue;
                }
                let rest = quoted[i + 1..].strip_prefix('!')?;
                if name.is_empty() {
                    return None;
                }
                return Some((Some(name), rest));
            }
            name.push(ch);
        }
        return None;
    }
    match token.rfind('!') {
        Some(idx) => {
            let name = &token[..idx];
            if name.is_empty() || name.contains(['\'', '!', ':']) {
                return None;
            }
            Some((Some(name.to_string()), &token[idx + 1..]))
        }
        None => Some((None, token)),
    }
}

fn parse_cell(token: &str, text: &str) -> Result<CellCoordinate, ReferenceError> {
    let malformed = || ReferenceError::Malformed(token.to_string());
    let bytes = text.as_bytes();
    let mut i = 0;

    let col_abs = bytes.first() == Some(&b'$');
    if col_abs {
        i += 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &text[letters_start..i];
    if letters.is_empty() {
        return Err(malformed());
    }

    let row_abs = bytes.get(i) == Some(&b'$');
    if row_abs {
        i += 1;
    }
    let digits = &text[i..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let col = letters.bytes().fold(0u64, |acc, b| {
        acc.saturating_mul(26)
            .saturating_add((b.to_ascii_uppercase() - b'A') as u64 + 1)
    });
    let row = digits.parse::<u64>().unwrap_or(u64::MAX);
    check_bounds(col, row).map_err(|source| ReferenceError::OutOfBounds {
        token: token.to_string(),
        source,
    })?;

    Ok(CellCoordinate {
        sheet: None,
        col: col as u32,
        row: row as u32,
        col_abs,
        row_abs,
    })
}
