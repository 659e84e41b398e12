use gridcalc_common::ReferenceError;
use gridcalc_parse::ParserError;
use thiserror::Error;

/// Failures reported to the caller of the engine. Spreadsheet errors such
/// as `#DIV/0!` are values, not `EngineError`s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("formula does not parse: {0}")]
    Parse(#[from] ParserError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("no sheet named `{0}`")]
    UnknownSheet(String),
    #[error("evaluation cancelled")]
    Cancelled,
}
