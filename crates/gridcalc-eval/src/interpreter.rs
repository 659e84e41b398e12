//! Tree-walking evaluator for parsed formulas.

use std::cmp::Ordering;

use gridcalc_common::{CellRange, ExcelError, LiteralValue, Reference};
use gridcalc_parse::{ASTNode, ASTNodeType};

use crate::coercion::{compare_values, sanitize_numeric, to_number_lenient, to_text};
use crate::config::EvalConfig;
use crate::traits::{
    ArgumentHandle, DefaultFunctionContext, EvaluationContext, InMemoryRange, Range,
};

pub struct Interpreter<'a> {
    pub context: &'a dyn EvaluationContext,
    current_sheet: &'a str,
}

impl<'a> Interpreter<'a> {
    pub fn new(context: &'a dyn EvaluationContext, current_sheet: &'a str) -> Self {
        Self {
            context,
            current_sheet,
        }
    }

    pub fn current_sheet(&self) -> &'a str {
        self.current_sheet
    }

    pub fn config(&self) -> &EvalConfig {
        self.context.config()
    }

    pub fn function_context(&self) -> DefaultFunctionContext<'_> {
        DefaultFunctionContext::new(self.context.config())
    }

    /// Evaluate an AST node. Spreadsheet errors are returned as
    /// `Ok(LiteralValue::Error(..))`; `Err` is reserved for failures a
    /// caller may want to distinguish, and callers treat it the same way.
    pub fn evaluate_ast(&self, node: &ASTNode) -> Result<LiteralValue, ExcelError> {
        match &node.node_type {
            ASTNodeType::Literal(v) => Ok(v.clone()),
            ASTNodeType::Reference { reference, .. } => self.eval_reference(reference),
            ASTNodeType::UnaryOp { op, expr } => self.eval_unary(op, expr),
            ASTNodeType::BinaryOp { op, left, right } => self.eval_binary(op, left, right, node),
            ASTNodeType::Function { name, args } => self.eval_function(name, args),
            ASTNodeType::Array(rows) => self.eval_array_literal(rows),
        }
    }

    /* ===================  references  =================== */

    fn qualify(&self, reference: &Reference) -> Reference {
        match reference.sheet() {
            Some(_) => reference.clone(),
            None => reference.with_sheet(Some(self.current_sheet.to_string())),
        }
    }

    fn eval_reference(&self, reference: &Reference) -> Result<LiteralValue, ExcelError> {
        let sheet = reference.sheet().unwrap_or(self.current_sheet);
        let resolved = match reference {
            Reference::Cell(c) => self.context.resolve_cell_reference(sheet, c.row, c.col),
            Reference::Range(r) if r.width() == 1 && r.height() == 1 => self
                .context
                .resolve_cell_reference(sheet, r.start.row, r.start.col),
            Reference::Range(r) => self
                .context
                .resolve_range_reference(sheet, r)
                .map(|range| LiteralValue::Array(range.materialise().into_owned())),
        };
        Ok(resolved.unwrap_or_else(LiteralValue::Error))
    }

    /// The areas a reference expression denotes, each qualified with a
    /// sheet. Intersections of disjoint areas are `#NULL!`; anything that is
    /// not a reference is `#VALUE!`.
    pub fn resolve_areas(&self, node: &ASTNode) -> Result<Vec<CellRange>, ExcelError> {
        match &node.node_type {
            ASTNodeType::Reference { reference, .. } => {
                Ok(vec![self.qualify(reference).to_range()])
            }
            ASTNodeType::BinaryOp { op, left, right } if op == "," => {
                let mut areas = self.resolve_areas(left)?;
                areas.extend(self.resolve_areas(right)?);
                Ok(areas)
            }
            ASTNodeType::BinaryOp { op, left, right } if op == " " => {
                let lefts = self.resolve_areas(left)?;
                let rights = self.resolve_areas(right)?;
                let overlaps: Vec<CellRange> = lefts
                    .iter()
                    .flat_map(|l| rights.iter().filter_map(move |r| l.intersect(r)))
                    .collect();
                if overlaps.is_empty() {
                    Err(ExcelError::new_null().with_message("ranges do not intersect"))
                } else {
                    Ok(overlaps)
                }
            }
            _ => Err(ExcelError::new_value().with_message("expected a reference")),
        }
    }

    /// Materialise a reference expression. A single area keeps its shape;
    /// a union is laid out as one row, area after area.
    pub fn resolve_node_range(&self, node: &ASTNode) -> Result<Box<dyn Range>, ExcelError> {
        let areas = self.resolve_areas(node)?;
        if let [area] = areas.as_slice() {
            return self.resolve_area(area);
        }
        let mut row = Vec::new();
        for area in &areas {
            row.extend(self.resolve_area(area)?.iter_cells());
        }
        Ok(Box::new(InMemoryRange::new(vec![row])))
    }

    fn resolve_area(&self, area: &CellRange) -> Result<Box<dyn Range>, ExcelError> {
        let sheet = area.sheet().unwrap_or(self.current_sheet);
        self.context.resolve_range_reference(sheet, area)
    }

    /* ===================  unary ops  =================== */

    fn eval_unary(&self, op: &str, expr: &ASTNode) -> Result<LiteralValue, ExcelError> {
        let v = self.evaluate_ast(expr)?;
        match v {
            LiteralValue::Array(arr) => {
                Ok(map_array(arr, |cell| self.eval_unary_scalar(op, cell)))
            }
            other => Ok(self.eval_unary_scalar(op, other)),
        }
    }

    fn eval_unary_scalar(&self, op: &str, v: LiteralValue) -> LiteralValue {
        let f: fn(f64) -> f64 = match op {
            "+" => |n| n,
            "-" => |n| -n,
            "%" => |n| n / 100.0,
            _ => {
                return LiteralValue::Error(
                    ExcelError::new_value().with_message(format!("unary operator '{op}'")),
                );
            }
        };
        to_number_lenient(&v, self.config())
            .and_then(|n| sanitize_numeric(f(n)))
            .map_or_else(LiteralValue::Error, LiteralValue::Number)
    }

    /* ===================  binary ops  =================== */

    fn eval_binary(
        &self,
        op: &str,
        left: &ASTNode,
        right: &ASTNode,
        node: &ASTNode,
    ) -> Result<LiteralValue, ExcelError> {
        match op {
            " " => {
                return match self.resolve_areas(node) {
                    Ok(areas) => match areas.as_slice() {
                        [area] => self.eval_reference(&Reference::Range(area.clone())),
                        _ => Ok(LiteralValue::Error(
                            ExcelError::new_value().with_message("multiple areas"),
                        )),
                    },
                    Err(e) => Ok(LiteralValue::Error(e)),
                };
            }
            "," => {
                return Ok(LiteralValue::Error(
                    ExcelError::new_value().with_message("a union is not a single value"),
                ));
            }
            _ => {}
        }

        let l = self.evaluate_ast(left)?;
        let r = self.evaluate_ast(right)?;
        Ok(broadcast_apply(l, r, |a, b| self.eval_binary_scalar(op, a, b)))
    }

    fn eval_binary_scalar(&self, op: &str, l: LiteralValue, r: LiteralValue) -> LiteralValue {
        // errors win left to right
        if let LiteralValue::Error(e) = l {
            return LiteralValue::Error(e);
        }
        if let LiteralValue::Error(e) = r {
            return LiteralValue::Error(e);
        }
        let config = self.config();
        match op {
            "=" | "<>" | "<" | "<=" | ">" | ">=" => {
                let ord = compare_values(&l, &r, config);
                LiteralValue::Boolean(match op {
                    "=" => ord == Ordering::Equal,
                    "<>" => ord != Ordering::Equal,
                    "<" => ord == Ordering::Less,
                    "<=" => ord != Ordering::Greater,
                    ">" => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                })
            }
            "&" => match (to_text(&l, config), to_text(&r, config)) {
                (Ok(a), Ok(b)) => LiteralValue::Text(a + &b),
                (Err(e), _) | (_, Err(e)) => LiteralValue::Error(e),
            },
            "+" | "-" | "*" | "/" | "^" => {
                let a = match to_number_lenient(&l, config) {
                    Ok(n) => n,
                    Err(e) => return LiteralValue::Error(e),
                };
                let b = match to_number_lenient(&r, config) {
                    Ok(n) => n,
                    Err(e) => return LiteralValue::Error(e),
                };
                arithmetic(op, a, b).map_or_else(LiteralValue::Error, LiteralValue::Number)
            }
            _ => LiteralValue::Error(
                ExcelError::new_value().with_message(format!("binary operator '{op}'")),
            ),
        }
    }

    /* ===================  functions  =================== */

    fn eval_function(&self, name: &str, args: &[ASTNode]) -> Result<LiteralValue, ExcelError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("function", fn_name = name).entered();

        let Some(fun) = self.context.get_function(name) else {
            return Ok(LiteralValue::Error(
                ExcelError::new_name().with_message(format!("unknown function {name}")),
            ));
        };
        let handles: Vec<ArgumentHandle> =
            args.iter().map(|a| ArgumentHandle::new(a, self)).collect();
        let fctx = self.function_context();
        let value = match fun.dispatch(&handles, &fctx) {
            Ok(LiteralValue::Number(n)) => {
                sanitize_numeric(n).map_or_else(LiteralValue::Error, LiteralValue::Number)
            }
            Ok(v) => v,
            Err(e) => LiteralValue::Error(e),
        };
        Ok(value)
    }

    fn eval_array_literal(&self, rows: &[Vec<ASTNode>]) -> Result<LiteralValue, ExcelError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut vals = Vec::with_capacity(row.len());
            for cell in row {
                vals.push(self.evaluate_ast(cell)?.first_scalar());
            }
            out.push(vals);
        }
        Ok(LiteralValue::Array(out))
    }
}

pub(crate) fn arithmetic(op: &str, a: f64, b: f64) -> Result<f64, ExcelError> {
    let n = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Err(ExcelError::new_div());
            }
            a / b
        }
        "^" => {
            if a == 0.0 && b == 0.0 {
                return Err(ExcelError::new_num());
            }
            if a == 0.0 && b < 0.0 {
                return Err(ExcelError::new_div());
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(ExcelError::new_num());
            }
            a.powf(b)
        }
        _ => return Err(ExcelError::new_value()),
    };
    sanitize_numeric(n)
}

fn map_array<F>(arr: Vec<Vec<LiteralValue>>, f: F) -> LiteralValue
where
    F: Fn(LiteralValue) -> LiteralValue,
{
    LiteralValue::Array(
        arr.into_iter()
            .map(|row| row.into_iter().map(&f).collect())
            .collect(),
    )
}

fn shape(v: &LiteralValue) -> (usize, usize) {
    match v {
        LiteralValue::Array(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
        _ => (1, 1),
    }
}

/// Element `(i, j)` of `v` stretched over a larger grid: a dimension of
/// size one repeats, indices past any other dimension are `#N/A`.
fn project(v: &LiteralValue, i: usize, j: usize) -> LiteralValue {
    match v {
        LiteralValue::Array(rows) => {
            let (h, w) = shape(v);
            let ri = if h == 1 { 0 } else { i };
            let cj = if w == 1 { 0 } else { j };
            rows.get(ri)
                .and_then(|r| r.get(cj))
                .cloned()
                .unwrap_or_else(|| LiteralValue::Error(ExcelError::new_na()))
        }
        other => other.clone(),
    }
}

/// Apply `f` elementwise when either side is an array.
fn broadcast_apply<F>(left: LiteralValue, right: LiteralValue, f: F) -> LiteralValue
where
    F: Fn(LiteralValue, LiteralValue) -> LiteralValue,
{
    let is_array = |v: &LiteralValue| matches!(v, LiteralValue::Array(_));
    if !is_array(&left) && !is_array(&right) {
        return f(left, right);
    }
    let (lh, lw) = shape(&left);
    let (rh, rw) = shape(&right);
    let (h, w) = (lh.max(rh), lw.max(rw));
    LiteralValue::Array(
        (0..h)
            .map(|i| {
                (0..w)
                    .map(|j| f(project(&left, i, j), project(&right, i, j)))
                    .collect()
            })
            .collect(),
    )
}
