//! Lightweight in-memory workbook for unit tests of the interpreter and the
//! built-ins. Holds plain values only; formulas go through the engine.
use std::collections::HashMap;
use std::sync::Arc;

use gridcalc_common::{CellRange, ExcelError, LiteralValue, Reference, parse_reference};
use gridcalc_parse::parse;

use crate::config::EvalConfig;
use crate::function::Function;
use crate::locale::Locale;
use crate::traits::{
    EvaluationContext, FunctionProvider, InMemoryRange, Range, RangeResolver, ReferenceResolver,
    Resolver,
};

type V = LiteralValue;
type CellKey = (u32, u32); // 1-based (row, col)

#[derive(Default, Clone)]
struct Sheet {
    cells: HashMap<CellKey, V>,
}

pub struct TestWorkbook {
    sheets: HashMap<String, Sheet>,
    fns: HashMap<String, Arc<dyn Function>>,
    config: EvalConfig,
}

impl Default for TestWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkbook {
    /* ─────────────── constructors ─────────────── */
    /// An empty `Sheet1` and an invariant locale, so results do not depend
    /// on the environment running the tests.
    pub fn new() -> Self {
        crate::builtins::load_builtins();
        let mut sheets = HashMap::new();
        sheets.insert("Sheet1".to_string(), Sheet::default());
        Self {
            sheets,
            fns: HashMap::new(),
            config: EvalConfig::default().with_locale(Locale::invariant()),
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config_mut(&mut self) -> &mut EvalConfig {
        &mut self.config
    }

    /* ─────────────── cell helpers ─────────────── */
    pub fn with_cell<S: Into<String>>(mut self, sheet: S, row: u32, col: u32, v: V) -> Self {
        let sh = self.sheets.entry(sheet.into()).or_default();
        sh.cells.insert((row, col), v);
        self
    }

    pub fn with_cell_a1<S: Into<String>, A: AsRef<str>>(self, sheet: S, a1: A, v: V) -> Self {
        match parse_reference(a1.as_ref()) {
            Ok(Reference::Cell(c)) => self.with_cell(sheet, c.row, c.col, v),
            _ => panic!("bad A1 reference in with_cell_a1: {}", a1.as_ref()),
        }
    }

    pub fn with_range<S: Into<String>>(
        mut self,
        sheet: S,
        row: u32,
        col: u32,
        data: Vec<Vec<V>>,
    ) -> Self {
        let sh = self.sheets.entry(sheet.into()).or_default();
        for (r_off, r) in data.into_iter().enumerate() {
            for (c_off, v) in r.into_iter().enumerate() {
                sh.cells.insert((row + r_off as u32, col + c_off as u32), v);
            }
        }
        self
    }

    /* ─────────────── function helpers ─────────── */
    /// Shadows a registered built-in of the same name for this workbook.
    pub fn with_function(mut self, func: Arc<dyn Function>) -> Self {
        self.fns.insert(func.name().to_ascii_uppercase(), func);
        self
    }

    /* ─────────────── interpreter shortcut ─────── */
    pub fn interpreter(&self) -> crate::interpreter::Interpreter<'_> {
        crate::interpreter::Interpreter::new(self, "Sheet1")
    }

    /// Parse and evaluate `formula` as if it sat on `Sheet1`.
    pub fn eval(&self, formula: &str) -> V {
        let ast = parse(formula).unwrap_or_else(|e| panic!("{formula}: {e}"));
        self.interpreter()
            .evaluate_ast(&ast)
            .unwrap_or_else(LiteralValue::Error)
    }
}

/* ─────────────────────── trait impls ─────────────────────── */

impl TestWorkbook {
    fn sheet(&self, name: &str) -> Result<&Sheet, ExcelError> {
        self.sheets
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, s)| s)
            .ok_or_else(|| ExcelError::new_ref().with_message(format!("no sheet {name}")))
    }
}

impl ReferenceResolver for TestWorkbook {
    fn resolve_cell_reference(&self, sheet: &str, row: u32, col: u32) -> Result<V, ExcelError> {
        Ok(self
            .sheet(sheet)?
            .cells
            .get(&(row, col))
            .cloned()
            .unwrap_or(V::Empty))
    }
}

impl RangeResolver for TestWorkbook {
    fn resolve_range_reference(
        &self,
        sheet: &str,
        range: &CellRange,
    ) -> Result<Box<dyn Range>, ExcelError> {
        let sh = self.sheet(sheet)?;
        let data = (range.start.row..=range.end.row)
            .map(|r| {
                (range.start.col..=range.end.col)
                    .map(|c| sh.cells.get(&(r, c)).cloned().unwrap_or(V::Empty))
                    .collect()
            })
            .collect();
        Ok(Box::new(InMemoryRange::new(data)))
    }
}

impl Resolver for TestWorkbook {}

impl FunctionProvider for TestWorkbook {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.fns
            .get(&name.to_ascii_uppercase())
            .cloned()
            .or_else(|| crate::function_registry::get(name))
    }
}

impl EvaluationContext for TestWorkbook {
    fn config(&self) -> &EvalConfig {
        &self.config
    }
}
