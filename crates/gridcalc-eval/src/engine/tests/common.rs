//! Common test helpers
use gridcalc_common::{ExcelError, LiteralValue, Reference, parse_reference};

use crate::config::EvalConfig;
use crate::engine::Engine;
use crate::locale::Locale;
use crate::workbook::Workbook;

/// Sequential, locale-independent configuration.
pub fn config() -> EvalConfig {
    EvalConfig::default()
        .with_locale(Locale::invariant())
        .with_parallel(false)
}

/// `(row, col)` of an A1 cell reference.
pub fn rc(a1: &str) -> (u32, u32) {
    match parse_reference(a1) {
        Ok(Reference::Cell(c)) => (c.row, c.col),
        other => panic!("not a cell reference: {a1} ({other:?})"),
    }
}

/// An engine over `Sheet1` with each `(A1, input)` entered as typed.
pub fn engine_with(cells: &[(&str, &str)]) -> Engine {
    let mut engine = Engine::new(Workbook::with_sheets(["Sheet1"]), config());
    for (a1, input) in cells {
        let (row, col) = rc(a1);
        engine.set_cell_input("Sheet1", row, col, input).unwrap();
    }
    engine
}

pub fn eval(engine: &Engine, a1: &str) -> LiteralValue {
    let (row, col) = rc(a1);
    engine.evaluate_cell("Sheet1", row, col).unwrap()
}

pub fn set(engine: &mut Engine, a1: &str, input: &str) {
    let (row, col) = rc(a1);
    engine.set_cell_input("Sheet1", row, col, input).unwrap();
}

pub fn n(v: f64) -> LiteralValue {
    LiteralValue::Number(v)
}

pub fn ref_error() -> LiteralValue {
    LiteralValue::Error(ExcelError::new_ref())
}
