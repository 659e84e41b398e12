//! Meta crate that re-exports the gridcalc building blocks. Depend on this
//! crate and pick layers with feature flags; the underlying crates stay
//! reachable for deeper integration.
//!
//! ```rust
//! # #[cfg(feature = "eval")]
//! # {
//! use gridcalc::{Engine, EvalConfig, LiteralValue, Workbook};
//!
//! let mut engine = Engine::new(Workbook::with_sheets(["Sheet1"]), EvalConfig::default());
//! engine.set_cell_input("Sheet1", 1, 1, "20").unwrap();
//! engine.set_cell_input("Sheet1", 1, 2, "=A1*2+2").unwrap();
//! assert_eq!(engine.evaluate_cell("Sheet1", 1, 2), Ok(LiteralValue::Number(42.0)));
//! # }
//! ```

#[cfg(feature = "common")]
pub use gridcalc_common as common;

#[cfg(feature = "parse")]
pub use gridcalc_parse as parse;

#[cfg(feature = "eval")]
pub use gridcalc_eval as eval;

#[cfg(feature = "common")]
pub use gridcalc_common::{Calendar, ExcelError, ExcelErrorKind, LiteralValue};

#[cfg(feature = "parse")]
pub use gridcalc_parse::{ASTNode, ParserError, parse as parse_formula};

#[cfg(feature = "eval")]
pub use gridcalc_eval::{
    CancellationToken, CellAddr, CellContent, CompatibilityMode, Engine, EngineError, EvalConfig,
    EvalSummary, ReturnDateType, Workbook,
};
