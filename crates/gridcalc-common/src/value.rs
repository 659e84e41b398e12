use chrono::NaiveDateTime;
use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use crate::{Calendar, ExcelError, native_to_excel};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An **interpreter** value. This is distinct from what a workbook cell
/// stores: a cell may hold a formula, a value is what evaluation produces.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ExcelError),
    Empty,
    Array(Vec<Vec<LiteralValue>>),
    /// Only produced by date functions when the native return-date type is active.
    DateTime(NaiveDateTime),
}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LiteralValue::Number(n) => n.to_bits().hash(state),
            LiteralValue::Text(s) => s.hash(state),
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Error(e) => e.hash(state),
            LiteralValue::Empty => {}
            LiteralValue::Array(a) => a.hash(state),
            LiteralValue::DateTime(dt) => dt.hash(state),
        }
    }
}

impl Eq for LiteralValue {}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::Text(s) => write!(f, "{s}"),
            LiteralValue::Boolean(true) => write!(f, "TRUE"),
            LiteralValue::Boolean(false) => write!(f, "FALSE"),
            LiteralValue::Error(e) => write!(f, "{}", e.kind),
            LiteralValue::Empty => Ok(()),
            LiteralValue::Array(rows) => {
                write!(f, "{{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    for (j, v) in row.iter().enumerate() {
                        if j > 0 {
                            write!(f, ",")?;
                        }
                        match v {
                            LiteralValue::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\""))?,
                            other => write!(f, "{other}")?,
                        }
                    }
                }
                write!(f, "}}")
            }
            LiteralValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Number(n)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Boolean(b)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::Text(s.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(s: String) -> Self {
        LiteralValue::Text(s)
    }
}

impl LiteralValue {
    pub fn is_error(&self) -> bool {
        matches!(self, LiteralValue::Error(_))
    }

    pub fn as_error(&self) -> Option<&ExcelError> {
        match self {
            LiteralValue::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LiteralValue::Empty)
    }

    /// Serial number of a date value under `calendar`, or the number itself.
    pub fn as_serial_number(&self, calendar: Calendar) -> Option<f64> {
        match self {
            LiteralValue::Number(n) => Some(*n),
            LiteralValue::DateTime(dt) => Some(native_to_excel(dt, calendar)),
            LiteralValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Code reported by the `TYPE` function.
    pub fn type_code(&self) -> i32 {
        match self {
            LiteralValue::Number(_) | LiteralValue::Empty | LiteralValue::DateTime(_) => 1,
            LiteralValue::Text(_) => 2,
            LiteralValue::Boolean(_) => 4,
            LiteralValue::Error(_) => 16,
            LiteralValue::Array(_) => 64,
        }
    }

    /// Short, lower-case type tag used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            LiteralValue::Number(_) => "number",
            LiteralValue::Text(_) => "text",
            LiteralValue::Boolean(_) => "boolean",
            LiteralValue::Error(_) => "error",
            LiteralValue::Empty => "empty",
            LiteralValue::Array(_) => "array",
            LiteralValue::DateTime(_) => "datetime",
        }
    }

    /// Top-left element of an array, or the value itself.
    pub fn first_scalar(&self) -> LiteralValue {
        match self {
            LiteralValue::Array(rows) => rows
                .first()
                .and_then(|r| r.first())
                .map(|v| v.first_scalar())
                .unwrap_or(LiteralValue::Empty),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExcelErrorKind;
    use std::collections::HashSet;

    #[test]
    fn display_matches_spreadsheet_rendering() {
        assert_eq!(LiteralValue::Number(5.0).to_string(), "5");
        assert_eq!(LiteralValue::Number(0.25).to_string(), "0.25");
        assert_eq!(LiteralValue::Boolean(true).to_string(), "TRUE");
        assert_eq!(LiteralValue::from(ExcelErrorKind::Na).to_string(), "#N/A");
        let arr = LiteralValue::Array(vec![
            vec![LiteralValue::Number(1.0), LiteralValue::Text("a".into())],
            vec![LiteralValue::Boolean(false), LiteralValue::Empty],
        ]);
        assert_eq!(arr.to_string(), "{1,\"a\";FALSE,}");
    }

    #[test]
    fn hash_distinguishes_variants() {
        let mut set = HashSet::new();
        set.insert(LiteralValue::Number(0.0));
        set.insert(LiteralValue::Boolean(false));
        set.insert(LiteralValue::Empty);
        set.insert(LiteralValue::Text(String::new()));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn type_codes() {
        assert_eq!(LiteralValue::Number(1.0).type_code(), 1);
        assert_eq!(LiteralValue::Text("x".into()).type_code(), 2);
        assert_eq!(LiteralValue::Boolean(true).type_code(), 4);
        assert_eq!(LiteralValue::from(ExcelErrorKind::Ref).type_code(), 16);
        assert_eq!(LiteralValue::Array(vec![]).type_code(), 64);
    }
}
