//! One top-level evaluation request.
//!
//! A pass owns its visit map and a snapshot of the configuration, so passes
//! running side by side never see each other's in-progress cells. Committed
//! values are shared through the engine's cache.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use gridcalc_common::{CellRange, ExcelError, LiteralValue};
use gridcalc_parse::ASTNode;
use rustc_hash::{FxHashMap, FxHashSet};

use super::Engine;
use super::cancel::CancellationToken;
use super::error::EngineError;
use super::graph::{Area, CellAddr, extract_areas};
use crate::config::EvalConfig;
use crate::function::Function;
use crate::interpreter::Interpreter;
use crate::traits::{
    EvaluationContext, FunctionProvider, Range, RangeResolver, ReferenceResolver, Resolver,
};
use crate::workbook::{CellContent, SheetId};

#[derive(Debug, Clone)]
enum Visit {
    InProgress,
    /// Re-entered while in progress; its final value is `#REF!`.
    Cyclic,
    Done(LiteralValue),
}

fn circular() -> LiteralValue {
    LiteralValue::Error(ExcelError::new_ref().with_message("circular reference"))
}

fn cancelled() -> LiteralValue {
    LiteralValue::Error(ExcelError::new_na().with_message("evaluation cancelled"))
}

pub(crate) struct Pass<'e> {
    engine: &'e Engine,
    config: EvalConfig,
    /// Read and write the shared cache. Off for passes run under a
    /// configuration other than the engine's.
    use_cache: bool,
    cancel: Option<&'e CancellationToken>,
    visits: RefCell<FxHashMap<CellAddr, Visit>>,
    cancelled: Cell<bool>,
    evaluated: Cell<usize>,
    pinned: RefCell<Vec<CellAddr>>,
}

impl<'e> Pass<'e> {
    pub(crate) fn new(
        engine: &'e Engine,
        config: EvalConfig,
        use_cache: bool,
        cancel: Option<&'e CancellationToken>,
    ) -> Self {
        Self {
            engine,
            config,
            use_cache,
            cancel,
            visits: RefCell::new(FxHashMap::default()),
            cancelled: Cell::new(false),
            evaluated: Cell::new(0),
            pinned: RefCell::new(Vec::new()),
        }
    }

    /// Formula cells computed so far.
    pub(crate) fn evaluated(&self) -> usize {
        self.evaluated.get()
    }

    /// Cells whose value was pinned to `#REF!` by a circular reference.
    pub(crate) fn pinned(&self) -> Vec<CellAddr> {
        self.pinned.borrow().clone()
    }

    /// The value of one cell, evaluating it and its precedents if needed.
    pub(crate) fn evaluate_root(&self, addr: CellAddr) -> Result<LiteralValue, EngineError> {
        self.warm(addr);
        let value = self.cell_value(addr);
        self.finish(value)
    }

    /// An ad-hoc formula evaluated as if it sat on `home`.
    pub(crate) fn evaluate_formula(
        &self,
        ast: &ASTNode,
        home: SheetId,
    ) -> Result<LiteralValue, EngineError> {
        for area in extract_areas(ast, home, &self.engine.workbook) {
            for cell in self.formula_cells_in(&area) {
                self.warm(cell);
            }
        }
        let value = self.interpret(ast, home);
        self.finish(value)
    }

    fn finish(&self, value: LiteralValue) -> Result<LiteralValue, EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(value)
        }
    }

    fn is_cancelled(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            #[cfg(feature = "tracing")]
            tracing::debug!(evaluated = self.evaluated.get(), "pass cancelled");
            self.cancelled.set(true);
            return true;
        }
        false
    }

    fn formula_text(&self, addr: CellAddr) -> Option<&'e str> {
        let engine: &'e Engine = self.engine;
        engine
            .workbook
            .sheet(addr.sheet)?
            .cell(addr.row, addr.col)?
            .formula()
    }

    fn cached(&self, addr: &CellAddr) -> Option<LiteralValue> {
        if self.use_cache {
            self.engine.cache.clean_value(addr)
        } else {
            None
        }
    }

    /// Formula cells inside `area`.
    fn formula_cells_in(&self, area: &Area) -> Vec<CellAddr> {
        if let Some(cell) = area.single_cell() {
            return if self.formula_text(cell).is_some() {
                vec![cell]
            } else {
                Vec::new()
            };
        }
        let Some(sheet) = self.engine.workbook.sheet(area.sheet) else {
            return Vec::new();
        };
        sheet
            .formula_cells()
            .into_iter()
            .map(|(row, col, _)| CellAddr::new(area.sheet, row, col))
            .filter(|cell| area.contains(cell))
            .collect()
    }

    /// Evaluates the formula precedents of `root` bottom-up with an explicit
    /// stack, so a long chain of references never deepens the call stack.
    /// Cells on the current path are `InProgress`, exactly as they would be
    /// under plain recursion, so circular references are caught the same
    /// way.
    fn warm(&self, root: CellAddr) {
        let mut stack = vec![(root, false)];
        while let Some((addr, expanded)) = stack.pop() {
            if self.is_cancelled() {
                return;
            }
            let Some(text) = self.formula_text(addr) else {
                continue;
            };
            if expanded {
                self.compute(addr, text);
                continue;
            }
            if self.visits.borrow().contains_key(&addr) {
                continue;
            }
            if let Some(v) = self.cached(&addr) {
                self.visits.borrow_mut().insert(addr, Visit::Done(v));
                continue;
            }
            self.visits.borrow_mut().insert(addr, Visit::InProgress);
            stack.push((addr, true));

            let mut seen = FxHashSet::default();
            let precedents: Vec<CellAddr> = self
                .engine
                .graph
                .precedents(&addr)
                .iter()
                .flat_map(|area| self.formula_cells_in(area))
                .filter(|cell| seen.insert(*cell))
                .collect();
            // reversed so the leftmost reference is evaluated first
            for cell in precedents.into_iter().rev() {
                if !self.visits.borrow().contains_key(&cell) {
                    stack.push((cell, false));
                }
            }
        }
    }

    /// Stored value of a cell; formula cells are evaluated on first read.
    fn cell_value(&self, addr: CellAddr) -> LiteralValue {
        let engine: &'e Engine = self.engine;
        let content = engine
            .workbook
            .sheet(addr.sheet)
            .and_then(|s| s.cell(addr.row, addr.col));
        match content {
            None => LiteralValue::Empty,
            Some(CellContent::Value(v)) => v.clone(),
            Some(CellContent::Formula(text)) => self.formula_value(addr, text),
        }
    }

    fn formula_value(&self, addr: CellAddr, text: &str) -> LiteralValue {
        let state = self.visits.borrow().get(&addr).cloned();
        match state {
            Some(Visit::Done(v)) => return v,
            Some(Visit::Cyclic) => return circular(),
            Some(Visit::InProgress) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(cell = %addr, "circular reference");
                self.visits.borrow_mut().insert(addr, Visit::Cyclic);
                self.pinned.borrow_mut().push(addr);
                return circular();
            }
            None => {}
        }
        if let Some(v) = self.cached(&addr) {
            self.visits.borrow_mut().insert(addr, Visit::Done(v.clone()));
            return v;
        }
        if self.is_cancelled() {
            return cancelled();
        }
        self.visits.borrow_mut().insert(addr, Visit::InProgress);
        self.compute(addr, text)
    }

    /// Evaluates a cell already marked in progress and records the result.
    fn compute(&self, addr: CellAddr, text: &str) -> LiteralValue {
        let value = match self.engine.formulas.get_or_parse(text) {
            Ok(ast) => cell_result(self.interpret(&ast, addr.sheet)),
            Err(e) => LiteralValue::Error(ExcelError::new_name().with_message(e.to_string())),
        };
        let pinned = matches!(self.visits.borrow().get(&addr), Some(Visit::Cyclic));
        let value = if pinned { circular() } else { value };

        self.visits
            .borrow_mut()
            .insert(addr, Visit::Done(value.clone()));
        self.evaluated.set(self.evaluated.get() + 1);
        if self.use_cache && !self.is_cancelled() {
            self.engine.cache.commit(addr, value.clone());
        }
        value
    }

    fn interpret(&self, ast: &ASTNode, home: SheetId) -> LiteralValue {
        let Some(sheet) = self.engine.workbook.sheet(home) else {
            return LiteralValue::Error(ExcelError::new_ref());
        };
        Interpreter::new(self, sheet.name())
            .evaluate_ast(ast)
            .unwrap_or_else(LiteralValue::Error)
    }

    fn sheet_id(&self, name: &str) -> Result<SheetId, ExcelError> {
        self.engine
            .workbook
            .sheet_id(name)
            .ok_or_else(|| ExcelError::new_ref().with_message(format!("no sheet {name}")))
    }
}

/// What a formula cell stores: a blank result reads as zero and an array
/// keeps only its top-left element.
fn cell_result(value: LiteralValue) -> LiteralValue {
    match value {
        LiteralValue::Empty => LiteralValue::Number(0.0),
        LiteralValue::Array(_) => match value.first_scalar() {
            LiteralValue::Empty => LiteralValue::Number(0.0),
            v => v,
        },
        v => v,
    }
}

/// A block of sheet cells. Only the part inside the sheet's used extent is
/// held; the rest of the block reads as blank.
#[derive(Debug)]
struct SheetBlock {
    data: Vec<Vec<LiteralValue>>,
    rows: usize,
    cols: usize,
}

impl Range for SheetBlock {
    fn get(&self, row: usize, col: usize) -> Result<LiteralValue, ExcelError> {
        if row >= self.rows || col >= self.cols {
            return Err(ExcelError::new_ref());
        }
        Ok(self
            .data
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or(LiteralValue::Empty))
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl ReferenceResolver for Pass<'_> {
    fn resolve_cell_reference(
        &self,
        sheet: &str,
        row: u32,
        col: u32,
    ) -> Result<LiteralValue, ExcelError> {
        let id = self.sheet_id(sheet)?;
        Ok(self.cell_value(CellAddr::new(id, row, col)))
    }
}

impl RangeResolver for Pass<'_> {
    fn resolve_range_reference(
        &self,
        sheet: &str,
        range: &CellRange,
    ) -> Result<Box<dyn Range>, ExcelError> {
        let id = self.sheet_id(sheet)?;
        let (used_rows, used_cols) = self
            .engine
            .workbook
            .sheet(id)
            .map_or((0, 0), |s| s.used_extent());
        let last_row = range.end.row.min(used_rows);
        let last_col = range.end.col.min(used_cols);
        let data = (range.start.row..=last_row)
            .map(|r| {
                (range.start.col..=last_col)
                    .map(|c| self.cell_value(CellAddr::new(id, r, c)))
                    .collect()
            })
            .collect();
        Ok(Box::new(SheetBlock {
            data,
            rows: range.height() as usize,
            cols: range.width() as usize,
        }))
    }
}

impl Resolver for Pass<'_> {}

impl FunctionProvider for Pass<'_> {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.engine
            .functions
            .get(&name.to_ascii_uppercase())
            .cloned()
            .or_else(|| crate::function_registry::get(name))
    }
}

impl EvaluationContext for Pass<'_> {
    fn config(&self) -> &EvalConfig {
        &self.config
    }
}
