use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

use gridcalc_common::{Calendar, CellRange, ExcelError, LiteralValue, Reference};
use gridcalc_parse::{ASTNode, ASTNodeType};

use crate::config::{CompatibilityMode, EvalConfig, ReturnDateType};
use crate::function::Function;
use crate::interpreter::Interpreter;
use crate::locale::Locale;

/* ───────────────────────────── Range ───────────────────────────── */

/// A rectangular block of already-evaluated values, indexed from zero.
pub trait Range: Debug {
    fn get(&self, row: usize, col: usize) -> Result<LiteralValue, ExcelError>;

    /// `(rows, cols)`
    fn dimensions(&self) -> (usize, usize);

    fn materialise(&self) -> Cow<'_, [Vec<LiteralValue>]> {
        let (rows, cols) = self.dimensions();
        Cow::Owned(
            (0..rows)
                .map(|r| {
                    (0..cols)
                        .map(|c| self.get(r, c).unwrap_or(LiteralValue::Empty))
                        .collect()
                })
                .collect(),
        )
    }

    /// Row-major.
    fn iter_cells<'a>(&'a self) -> Box<dyn Iterator<Item = LiteralValue> + 'a> {
        let (rows, cols) = self.dimensions();
        Box::new((0..rows).flat_map(move |r| {
            (0..cols).map(move |c| self.get(r, c).unwrap_or(LiteralValue::Empty))
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryRange {
    data: Vec<Vec<LiteralValue>>,
}

impl InMemoryRange {
    pub fn new(data: Vec<Vec<LiteralValue>>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<Vec<LiteralValue>> {
        self.data
    }
}

impl Range for InMemoryRange {
    fn get(&self, row: usize, col: usize) -> Result<LiteralValue, ExcelError> {
        self.data
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .ok_or_else(ExcelError::new_ref)
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.data.len(), self.data.first().map_or(0, Vec::len))
    }

    fn materialise(&self) -> Cow<'_, [Vec<LiteralValue>]> {
        Cow::Borrowed(&self.data)
    }
}

/* ─────────────────────────── Resolvers ─────────────────────────── */

pub trait ReferenceResolver {
    /// `sheet` is always explicit; unqualified references have already been
    /// given the sheet of the formula being evaluated.
    fn resolve_cell_reference(
        &self,
        sheet: &str,
        row: u32,
        col: u32,
    ) -> Result<LiteralValue, ExcelError>;
}

pub trait RangeResolver {
    fn resolve_range_reference(
        &self,
        sheet: &str,
        range: &CellRange,
    ) -> Result<Box<dyn Range>, ExcelError>;
}

pub trait Resolver: ReferenceResolver + RangeResolver {
    fn resolve_range_like(
        &self,
        reference: &Reference,
        current_sheet: &str,
    ) -> Result<Box<dyn Range>, ExcelError> {
        let sheet = reference.sheet().unwrap_or(current_sheet);
        match reference {
            Reference::Cell(c) => {
                let value = self.resolve_cell_reference(sheet, c.row, c.col)?;
                Ok(Box::new(InMemoryRange::new(vec![vec![value]])))
            }
            Reference::Range(r) => self.resolve_range_reference(sheet, r),
        }
    }
}

pub trait FunctionProvider {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>>;
}

pub trait EvaluationContext: Resolver + FunctionProvider {
    fn config(&self) -> &EvalConfig;
}

/* ──────────────────────── Function context ─────────────────────── */

/// What a built-in may ask of its surroundings.
pub trait FunctionContext {
    fn config(&self) -> &EvalConfig;

    fn compatibility(&self) -> CompatibilityMode {
        self.config().compatibility
    }

    fn calendar(&self) -> Calendar {
        self.config().calendar
    }

    fn return_date_type(&self) -> ReturnDateType {
        self.config().return_date_type
    }

    fn locale(&self) -> &Locale {
        &self.config().locale
    }
}

pub struct DefaultFunctionContext<'a> {
    config: &'a EvalConfig,
}

impl<'a> DefaultFunctionContext<'a> {
    pub fn new(config: &'a EvalConfig) -> Self {
        Self { config }
    }
}

impl FunctionContext for DefaultFunctionContext<'_> {
    fn config(&self) -> &EvalConfig {
        self.config
    }
}

/* ─────────────────────────── Arguments ─────────────────────────── */

/// An argument as a function prefers to see it.
pub enum EvaluatedArg<'a> {
    LiteralValue(Cow<'a, LiteralValue>),
    Range(Box<dyn Range>),
}

/// A lazily evaluated function argument.
pub struct ArgumentHandle<'a, 'b> {
    node: &'a ASTNode,
    interp: &'a Interpreter<'b>,
}

impl<'a, 'b> ArgumentHandle<'a, 'b> {
    pub fn new(node: &'a ASTNode, interp: &'a Interpreter<'b>) -> Self {
        Self { node, interp }
    }

    /// Evaluates the argument. Spreadsheet errors come back as
    /// `Ok(LiteralValue::Error(..))`.
    pub fn value(&self) -> Result<Cow<'a, LiteralValue>, ExcelError> {
        if let ASTNodeType::Literal(v) = &self.node.node_type {
            return Ok(Cow::Borrowed(v));
        }
        self.interp.evaluate_ast(self.node).map(Cow::Owned)
    }

    /// The argument as a block of values. References and array literals
    /// qualify, as does any expression that evaluates to an array; a scalar
    /// is a `#VALUE!`.
    pub fn range(&self) -> Result<Box<dyn Range>, ExcelError> {
        match self.value_or_range()? {
            EvaluatedArg::Range(r) => Ok(r),
            EvaluatedArg::LiteralValue(v) => match v.as_ref() {
                LiteralValue::Error(e) => Err(e.clone()),
                _ => Err(ExcelError::new_value().with_message("expected a range")),
            },
        }
    }

    pub fn value_or_range(&self) -> Result<EvaluatedArg<'a>, ExcelError> {
        match &self.node.node_type {
            _ if self.is_reference() => self
                .interp
                .resolve_node_range(self.node)
                .map(EvaluatedArg::Range),
            _ => match self.value()? {
                Cow::Owned(LiteralValue::Array(rows)) => {
                    Ok(EvaluatedArg::Range(Box::new(InMemoryRange::new(rows))))
                }
                Cow::Borrowed(LiteralValue::Array(rows)) => {
                    Ok(EvaluatedArg::Range(Box::new(InMemoryRange::new(rows.clone()))))
                }
                other => Ok(EvaluatedArg::LiteralValue(other)),
            },
        }
    }

    /// Whether the argument was written as a reference (or a reference
    /// expression) rather than a value.
    pub fn is_reference(&self) -> bool {
        match &self.node.node_type {
            ASTNodeType::Reference { .. } => true,
            ASTNodeType::BinaryOp { op, .. } => op == " " || op == ",",
            _ => false,
        }
    }

    pub fn ast(&self) -> &'a ASTNode {
        self.node
    }

    pub fn config(&self) -> &EvalConfig {
        self.interp.config()
    }
}
