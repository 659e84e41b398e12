//! Cached, cycle-safe recalculation over a [`Workbook`].
//!
//! Formula cells are evaluated on demand. Each request runs as a *pass* with
//! its own visit map, so a circular reference is detected per request and
//! answered with `#REF!` instead of unbounded recursion. Results are kept in
//! a shared cache and marked dirty when anything they read changes.

mod cache;
mod cancel;
mod error;
mod graph;
mod pass;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::{Duration, Instant};

use gridcalc_common::{LiteralValue, parse_reference};
use gridcalc_parse::parse;
use rayon::ThreadPoolBuilder;
use rustc_hash::{FxHashMap, FxHashSet};

pub use cache::{CacheEntry, FormulaCache, ValueCache};
pub use cancel::CancellationToken;
pub use error::EngineError;
pub use graph::{Area, Areas, CellAddr, DependencyGraph, extract_areas};

use crate::binder::{AdvancedValueBinder, BoundInput, ValueBinder};
use crate::config::EvalConfig;
use crate::function::Function;
use crate::workbook::{CellContent, SheetId, Workbook};
use pass::Pass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalSummary {
    /// Formula cells computed (cache hits excluded).
    pub evaluated: usize,
    /// Cells whose value was pinned to `#REF!` by a circular reference.
    pub cycle_errors: usize,
    pub elapsed: Duration,
}

pub struct Engine {
    workbook: Workbook,
    config: EvalConfig,
    cache: ValueCache,
    formulas: FormulaCache,
    graph: DependencyGraph,
    functions: FxHashMap<String, Arc<dyn Function>>,
    binder: Box<dyn ValueBinder>,
    thread_pool: Option<Arc<rayon::ThreadPool>>,
}

impl Engine {
    pub fn new(workbook: Workbook, config: EvalConfig) -> Self {
        let thread_pool = if config.enable_parallel {
            let mut builder = ThreadPoolBuilder::new();
            if let Some(max_threads) = config.max_threads {
                builder = builder.num_threads(max_threads);
            }
            // sequential evaluation when no pool can be built
            builder.build().ok().map(Arc::new)
        } else {
            None
        };
        Self::build(workbook, config, thread_pool)
    }

    /// An engine sharing an existing thread pool.
    pub fn with_thread_pool(
        workbook: Workbook,
        config: EvalConfig,
        thread_pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        Self::build(workbook, config, Some(thread_pool))
    }

    fn build(
        workbook: Workbook,
        config: EvalConfig,
        thread_pool: Option<Arc<rayon::ThreadPool>>,
    ) -> Self {
        crate::builtins::load_builtins();
        let mut engine = Self {
            workbook,
            config,
            cache: ValueCache::new(),
            formulas: FormulaCache::new(),
            graph: DependencyGraph::new(),
            functions: FxHashMap::default(),
            binder: Box::new(AdvancedValueBinder),
            thread_pool,
        };
        for (_, sheet) in engine.workbook.sheets() {
            for (_, _, text) in sheet.formula_cells() {
                let _ = engine.formulas.acquire(text);
            }
        }
        engine.rebuild_graph();
        engine
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Replaces the configuration. Cached values computed under the old one
    /// are dropped when anything changed.
    pub fn set_config(&mut self, config: EvalConfig) {
        if config != self.config {
            self.config = config;
            self.flush_cache();
        }
    }

    pub fn update_config<F: FnOnce(&mut EvalConfig)>(&mut self, f: F) {
        let mut config = self.config.clone();
        f(&mut config);
        self.set_config(config);
    }

    /// `false`, and nothing changes, for an unknown mode.
    pub fn set_compatibility_mode(&mut self, mode: &str) -> bool {
        let mut config = self.config.clone();
        let ok = config.set_compatibility_mode(mode);
        self.set_config(config);
        ok
    }

    pub fn set_calendar(&mut self, calendar: &str) -> bool {
        let mut config = self.config.clone();
        let ok = config.set_calendar(calendar);
        self.set_config(config);
        ok
    }

    pub fn set_return_date_type(&mut self, kind: &str) -> bool {
        let mut config = self.config.clone();
        let ok = config.set_return_date_type(kind);
        self.set_config(config);
        ok
    }

    pub fn set_timezone(&mut self, name: &str) -> bool {
        let mut config = self.config.clone();
        let ok = config.set_timezone(name);
        self.set_config(config);
        ok
    }

    /// Binder used by [`Engine::set_cell_input`].
    pub fn set_value_binder<B: ValueBinder + 'static>(&mut self, binder: B) {
        self.binder = Box::new(binder);
    }

    /// Registers a function for this engine only, shadowing any built-in of
    /// the same name.
    pub fn register_function(&mut self, function: Arc<dyn Function>) {
        self.functions
            .insert(function.name().to_ascii_uppercase(), function);
        self.flush_cache();
    }

    /// Returns the id of the sheet, creating it if needed. References to a
    /// sheet that did not exist yet start resolving once it does.
    pub fn add_sheet(&mut self, name: &str) -> SheetId {
        if let Some(id) = self.workbook.sheet_id(name) {
            return id;
        }
        let id = self.workbook.add_sheet(name);
        self.rebuild_graph();
        self.flush_cache();
        id
    }

    fn rebuild_graph(&mut self) {
        self.graph.clear();
        let mut edges = Vec::new();
        for (id, sheet) in self.workbook.sheets() {
            for (row, col, text) in sheet.formula_cells() {
                if let Ok(ast) = self.formulas.get_or_parse(text) {
                    let areas = extract_areas(&ast, id, &self.workbook);
                    edges.push((CellAddr::new(id, row, col), areas));
                }
            }
        }
        for (addr, areas) in edges {
            self.graph.set_precedents(addr, areas);
        }
    }

    /// Distinct formula texts currently parsed and shared between cells.
    pub fn parsed_formula_count(&self) -> usize {
        self.formulas.len()
    }

    pub fn addr(&self, sheet: &str, row: u32, col: u32) -> Result<CellAddr, EngineError> {
        self.workbook
            .sheet_id(sheet)
            .map(|id| CellAddr::new(id, row, col))
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))
    }

    /* ───────────────────────── edits ───────────────────────── */

    pub fn set_cell_value(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        value: LiteralValue,
    ) -> Result<(), EngineError> {
        let addr = self.addr(sheet, row, col)?;
        self.store(addr, CellContent::Value(value));
        self.graph.remove_precedents(addr);
        self.invalidate(addr);
        self.cache.remove(&addr);
        Ok(())
    }

    /// Stores a formula. Text that does not parse is kept as entered; the
    /// cell then evaluates to `#NAME?`.
    pub fn set_cell_formula(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        formula: &str,
    ) -> Result<(), EngineError> {
        let addr = self.addr(sheet, row, col)?;
        let areas = match self.formulas.acquire(formula) {
            Ok(ast) => extract_areas(&ast, addr.sheet, &self.workbook),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(cell = %addr, error = %_e, "formula does not parse");
                Areas::new()
            }
        };
        self.store(addr, CellContent::Formula(formula.to_string()));
        self.graph.set_precedents(addr, areas);
        self.invalidate(addr);
        Ok(())
    }

    /// Raw user input, classified by the engine's value binder.
    pub fn set_cell_input(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        input: &str,
    ) -> Result<(), EngineError> {
        match self.binder.bind(input, &self.config) {
            BoundInput::Formula(text) => self.set_cell_formula(sheet, row, col, &text),
            BoundInput::Value(value) => self.set_cell_value(sheet, row, col, value),
        }
    }

    pub fn clear_cell(&mut self, sheet: &str, row: u32, col: u32) -> Result<(), EngineError> {
        let addr = self.addr(sheet, row, col)?;
        if let Some(s) = self.workbook.sheet_mut(addr.sheet)
            && let Some(CellContent::Formula(old)) = s.clear_cell(row, col)
        {
            self.formulas.release(&old);
        }
        self.graph.remove_precedents(addr);
        self.invalidate(addr);
        self.cache.remove(&addr);
        Ok(())
    }

    pub fn cell_content(&self, sheet: &str, row: u32, col: u32) -> Option<&CellContent> {
        let id = self.workbook.sheet_id(sheet)?;
        self.workbook.sheet(id)?.cell(row, col)
    }

    /// The cache entry of a formula cell, if it was ever evaluated.
    pub fn cached_value(&self, sheet: &str, row: u32, col: u32) -> Option<CacheEntry> {
        let addr = self.addr(sheet, row, col).ok()?;
        self.cache.entry(&addr)
    }

    fn store(&mut self, addr: CellAddr, content: CellContent) {
        let Some(s) = self.workbook.sheet_mut(addr.sheet) else {
            return;
        };
        if let Some(CellContent::Formula(old)) = s.set_cell(addr.row, addr.col, content) {
            self.formulas.release(&old);
        }
    }

    /// Marks `addr` and everything downstream of it stale.
    fn invalidate(&self, addr: CellAddr) {
        let affected = self.graph.affected_by(addr);
        let _flipped = self.cache.mark_dirty(&affected);
        #[cfg(feature = "tracing")]
        tracing::debug!(cell = %addr, affected = affected.len(), flipped = _flipped, "invalidated");
    }

    /// Drops every computed value; the next request recomputes from scratch.
    pub fn flush_cache(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(entries = self.cache.len(), "flushing value cache");
        self.cache.flush();
    }

    /* ──────────────────────── evaluation ─────────────────────── */

    /// Where an ad-hoc formula sits: `Sheet!A1`, `A1` on the first sheet,
    /// or a bare sheet name.
    fn origin(&self, origin: &str) -> Result<SheetId, EngineError> {
        match parse_reference(origin) {
            Ok(reference) => match reference.sheet() {
                Some(name) => self
                    .workbook
                    .sheet_id(name)
                    .ok_or_else(|| EngineError::UnknownSheet(name.to_string())),
                None if self.workbook.sheet_count() > 0 => Ok(0),
                None => Err(EngineError::UnknownSheet(origin.to_string())),
            },
            Err(e) => self
                .workbook
                .sheet_id(origin)
                .ok_or(EngineError::Reference(e)),
        }
    }

    /// Parse and evaluate `formula` as if it were entered at `origin`. The
    /// result is returned as computed, arrays included.
    pub fn evaluate(&self, formula: &str, origin: &str) -> Result<LiteralValue, EngineError> {
        self.evaluate_in_pass(formula, origin, self.config.clone(), true, None)
    }

    /// [`Engine::evaluate`] under another configuration. The shared cache is
    /// neither read nor written.
    pub fn evaluate_with_config(
        &self,
        formula: &str,
        origin: &str,
        config: &EvalConfig,
    ) -> Result<LiteralValue, EngineError> {
        let use_cache = *config == self.config;
        self.evaluate_in_pass(formula, origin, config.clone(), use_cache, None)
    }

    pub fn evaluate_cancellable(
        &self,
        formula: &str,
        origin: &str,
        cancel: &CancellationToken,
    ) -> Result<LiteralValue, EngineError> {
        self.evaluate_in_pass(formula, origin, self.config.clone(), true, Some(cancel))
    }

    fn evaluate_in_pass(
        &self,
        formula: &str,
        origin: &str,
        config: EvalConfig,
        use_cache: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<LiteralValue, EngineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluate", formula, origin).entered();
        let home = self.origin(origin)?;
        let ast = parse(formula)?;
        Pass::new(self, config, use_cache, cancel).evaluate_formula(&ast, home)
    }

    pub fn evaluate_cell(&self, sheet: &str, row: u32, col: u32) -> Result<LiteralValue, EngineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluate_cell", sheet, row, col).entered();
        let addr = self.addr(sheet, row, col)?;
        Pass::new(self, self.config.clone(), true, None).evaluate_root(addr)
    }

    pub fn evaluate_cell_cancellable(
        &self,
        sheet: &str,
        row: u32,
        col: u32,
        cancel: &CancellationToken,
    ) -> Result<LiteralValue, EngineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluate_cell", sheet, row, col).entered();
        let addr = self.addr(sheet, row, col)?;
        Pass::new(self, self.config.clone(), true, Some(cancel)).evaluate_root(addr)
    }

    /// Values of `targets`, in order. With a thread pool each target runs as
    /// its own pass on the pool.
    pub fn evaluate_cells(
        &self,
        targets: &[(&str, u32, u32)],
    ) -> Result<Vec<LiteralValue>, EngineError> {
        self.evaluate_cells_inner(targets, None)
    }

    pub fn evaluate_cells_cancellable(
        &self,
        targets: &[(&str, u32, u32)],
        cancel: &CancellationToken,
    ) -> Result<Vec<LiteralValue>, EngineError> {
        self.evaluate_cells_inner(targets, Some(cancel))
    }

    fn evaluate_cells_inner(
        &self,
        targets: &[(&str, u32, u32)],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<LiteralValue>, EngineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluate_cells", count = targets.len()).entered();
        let addrs = targets
            .iter()
            .map(|&(sheet, row, col)| self.addr(sheet, row, col))
            .collect::<Result<Vec<_>, _>>()?;
        let (values, _) = self.run(&addrs, cancel)?;
        Ok(values)
    }

    /// Evaluates every formula cell whose cached value is missing or stale.
    pub fn evaluate_all(&self) -> Result<EvalSummary, EngineError> {
        self.evaluate_all_inner(None)
    }

    pub fn evaluate_all_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Result<EvalSummary, EngineError> {
        self.evaluate_all_inner(Some(cancel))
    }

    fn evaluate_all_inner(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<EvalSummary, EngineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluate_all").entered();
        let start = Instant::now();
        let targets: Vec<CellAddr> = self
            .workbook
            .sheets()
            .flat_map(|(id, sheet)| {
                sheet
                    .formula_cells()
                    .into_iter()
                    .map(move |(row, col, _)| CellAddr::new(id, row, col))
            })
            .filter(|addr| self.cache.clean_value(addr).is_none())
            .collect();
        let (_, stats) = self.run(&targets, cancel)?;
        Ok(EvalSummary {
            evaluated: stats.evaluated,
            cycle_errors: stats.pinned,
            elapsed: start.elapsed(),
        })
    }

    /// Evaluates `addrs`: one pass for all of them, or one pass per cell on
    /// the thread pool.
    fn run(
        &self,
        addrs: &[CellAddr],
        cancel: Option<&CancellationToken>,
    ) -> Result<(Vec<LiteralValue>, RunStats), EngineError> {
        use rayon::prelude::*;

        match &self.thread_pool {
            Some(pool) if addrs.len() > 1 => {
                let results: Vec<(LiteralValue, usize, Vec<CellAddr>)> = pool.install(|| {
                    addrs
                        .par_iter()
                        .map(|&addr| {
                            let pass = Pass::new(self, self.config.clone(), true, cancel);
                            let value = pass.evaluate_root(addr)?;
                            Ok((value, pass.evaluated(), pass.pinned()))
                        })
                        .collect::<Result<Vec<_>, EngineError>>()
                })?;
                let mut stats = RunStats::default();
                let mut pinned = FxHashSet::default();
                let mut values = Vec::with_capacity(results.len());
                for (value, evaluated, cells) in results {
                    stats.evaluated += evaluated;
                    pinned.extend(cells);
                    values.push(value);
                }
                stats.pinned = pinned.len();
                Ok((values, stats))
            }
            _ => {
                let pass = Pass::new(self, self.config.clone(), true, cancel);
                let values = addrs
                    .iter()
                    .map(|&addr| pass.evaluate_root(addr))
                    .collect::<Result<Vec<_>, _>>()?;
                let stats = RunStats {
                    evaluated: pass.evaluated(),
                    pinned: pass.pinned().len(),
                };
                Ok((values, stats))
            }
        }
    }
}

#[derive(Debug, Default)]
struct RunStats {
    evaluated: usize,
    pinned: usize,
}
