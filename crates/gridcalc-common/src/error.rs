//! Spreadsheet error values.
//!
//! - **`ExcelErrorKind`** : the closed set of in-band error codes
//! - **`ExcelError`**     : a kind plus an optional diagnostic message
//!
//! Errors are ordinary values: they flow through formulas and end up as a
//! cell's computed value. Two errors are equal when their kinds are equal;
//! the message is diagnostics only.

use std::{
    error::Error,
    fmt,
    hash::{Hash, Hasher},
};

use crate::LiteralValue;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All recognised error codes.
///
/// **Note:** names are CamelCase while `Display` renders them exactly as a
/// spreadsheet shows them (`#DIV/0!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExcelErrorKind {
    Null,
    Div,
    Value,
    Ref,
    Name,
    Num,
    Na,
}

impl fmt::Display for ExcelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl ExcelErrorKind {
    pub const ALL: [ExcelErrorKind; 7] = [
        Self::Null,
        Self::Div,
        Self::Value,
        Self::Ref,
        Self::Name,
        Self::Num,
        Self::Na,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Null => "#NULL!",
            Self::Div => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
        }
    }

    /// Case-insensitive lookup of an error literal such as `#n/a`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.code().eq_ignore_ascii_case(s))
    }

    /// The number `ERROR.TYPE` reports for this kind (1..=7).
    pub fn type_number(self) -> i32 {
        match self {
            Self::Null => 1,
            Self::Div => 2,
            Self::Value => 3,
            Self::Ref => 4,
            Self::Name => 5,
            Self::Num => 6,
            Self::Na => 7,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct ExcelError {
    pub kind: ExcelErrorKind,
    pub message: Option<String>,
}

impl From<ExcelErrorKind> for ExcelError {
    fn from(kind: ExcelErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

impl ExcelError {
    pub fn new(kind: ExcelErrorKind) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn from_error_string(s: &str) -> Option<Self> {
        ExcelErrorKind::parse(s).map(Self::new)
    }

    pub fn new_div() -> Self {
        Self::new(ExcelErrorKind::Div)
    }

    pub fn new_value() -> Self {
        Self::new(ExcelErrorKind::Value)
    }

    pub fn new_ref() -> Self {
        Self::new(ExcelErrorKind::Ref)
    }

    pub fn new_name() -> Self {
        Self::new(ExcelErrorKind::Name)
    }

    pub fn new_num() -> Self {
        Self::new(ExcelErrorKind::Num)
    }

    pub fn new_na() -> Self {
        Self::new(ExcelErrorKind::Na)
    }

    pub fn new_null() -> Self {
        Self::new(ExcelErrorKind::Null)
    }
}

impl PartialEq for ExcelError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for ExcelError {}

impl Hash for ExcelError {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl fmt::Display for ExcelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for ExcelError {}

impl From<ExcelError> for LiteralValue {
    fn from(error: ExcelError) -> Self {
        LiteralValue::Error(error)
    }
}

impl From<ExcelErrorKind> for LiteralValue {
    fn from(kind: ExcelErrorKind) -> Self {
        LiteralValue::Error(ExcelError::new(kind))
    }
}

impl PartialEq<str> for ExcelErrorKind {
    fn eq(&self, other: &str) -> bool {
        self.code() == other
    }
}

impl PartialEq<&str> for ExcelError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.code() == *other
    }
}
