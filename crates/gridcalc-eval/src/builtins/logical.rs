use gridcalc_common::{ExcelError, LiteralValue};

use super::utils::{coerce_bool, scalar};
use crate::coercion::to_logical;
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, EvaluatedArg, FunctionContext, Range};

/* ─────────────────────────── TRUE() / FALSE() ─────────────────────────── */

#[derive(Debug)]
pub struct TrueFn;

impl Function for TrueFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "TRUE"
    }
    fn eval_scalar<'a, 'b>(
        &self,
        _args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(true))
    }
}

#[derive(Debug)]
pub struct FalseFn;

impl Function for FalseFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "FALSE"
    }
    fn eval_scalar<'a, 'b>(
        &self,
        _args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(false))
    }
}

/* ─────────────────────────── NOT() ─────────────────────────── */

#[derive(Debug)]
pub struct NotFn;

impl Function for NotFn {
    func_caps!(PURE | BOOL_ONLY);
    fn name(&self) -> &'static str {
        "NOT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(!coerce_bool(&args[0], ctx)?))
    }
}

/* ─────────────────────────── AND() / OR() ─────────────────────────── */

/// Shared fold for `AND`/`OR`. Every argument is evaluated; inside ranges,
/// text and blanks are skipped. The first error met left to right is the
/// result, and having no logical values at all is `#VALUE!`.
fn fold_logical(
    args: &[ArgumentHandle],
    ctx: &dyn FunctionContext,
    init: bool,
    step: fn(bool, bool) -> bool,
) -> Result<LiteralValue, ExcelError> {
    let mut acc = init;
    let mut seen = false;
    let mut first_error: Option<ExcelError> = None;
    let mut note = |r: Result<bool, ExcelError>, first_error: &mut Option<ExcelError>| match r {
        Ok(b) => {
            acc = step(acc, b);
            seen = true;
        }
        Err(e) => {
            first_error.get_or_insert(e);
        }
    };

    for arg in args {
        match arg.value_or_range() {
            Ok(EvaluatedArg::Range(range)) => {
                for cell in range.iter_cells() {
                    match cell {
                        LiteralValue::Text(_) | LiteralValue::Empty => {}
                        LiteralValue::Error(e) => note(Err(e), &mut first_error),
                        other => note(to_logical(&other, ctx.config()), &mut first_error),
                    }
                }
            }
            Ok(EvaluatedArg::LiteralValue(v)) => {
                note(to_logical(v.as_ref(), ctx.config()), &mut first_error)
            }
            Err(e) => note(Err(e), &mut first_error),
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if !seen {
        return Err(ExcelError::new_value().with_message("no logical values"));
    }
    Ok(LiteralValue::Boolean(acc))
}

#[derive(Debug)]
pub struct AndFn;

impl Function for AndFn {
    func_caps!(PURE | REDUCTION | BOOL_ONLY);
    fn name(&self) -> &'static str {
        "AND"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        fold_logical(args, ctx, true, |acc, b| acc && b)
    }
}

#[derive(Debug)]
pub struct OrFn;

impl Function for OrFn {
    func_caps!(PURE | REDUCTION | BOOL_ONLY);
    fn name(&self) -> &'static str {
        "OR"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        fold_logical(args, ctx, false, |acc, b| acc || b)
    }
}

/* ─────────────────────────── IF() ─────────────────────────── */

#[derive(Debug)]
pub struct IfFn;

impl Function for IfFn {
    func_caps!(PURE | SHORT_CIRCUIT);
    fn name(&self) -> &'static str {
        "IF"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let cond = to_logical(&scalar(&args[0])?, ctx.config())?;
        let branch = if cond { args.get(1) } else { args.get(2) };
        match branch {
            Some(arg) => {
                let v = arg.value()?.into_owned();
                // an empty argument slot reads as zero
                Ok(match (&arg.ast().node_type, v) {
                    (gridcalc_parse::ASTNodeType::Literal(_), LiteralValue::Empty) => {
                        LiteralValue::Number(0.0)
                    }
                    (_, v) => v,
                })
            }
            None => Ok(LiteralValue::Boolean(false)),
        }
    }
}

/* ─────────────────────────── IFERROR() ─────────────────────────── */

#[derive(Debug)]
pub struct IfErrorFn;

impl Function for IfErrorFn {
    func_caps!(PURE | SHORT_CIRCUIT | HANDLES_ERRORS);
    fn name(&self) -> &'static str {
        "IFERROR"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let v = match args[0].value() {
            Ok(v) => v.into_owned(),
            Err(e) => LiteralValue::Error(e),
        };
        match v {
            LiteralValue::Error(_) => Ok(args[1].value()?.into_owned()),
            other => Ok(other),
        }
    }
}

pub fn register_builtins() {
    crate::register_functions!(TrueFn, FalseFn, NotFn, AndFn, OrFn, IfFn, IfErrorFn);
}

/* ─────────────────────────── tests ─────────────────────────────── */

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gridcalc_common::{ExcelErrorKind, LiteralValue};
    use gridcalc_parse::{ASTNode, ASTNodeType};

    use super::*;
    use crate::test_workbook::TestWorkbook;

    fn lit(v: LiteralValue) -> ASTNode {
        ASTNode::new(ASTNodeType::Literal(v), None)
    }

    #[test]
    fn true_false_dispatch() {
        let wb = TestWorkbook::new()
            .with_function(Arc::new(TrueFn))
            .with_function(Arc::new(FalseFn));
        let ctx = wb.interpreter();
        let t = ctx.context.get_function("TRUE").unwrap();
        let f = ctx.context.get_function("false").unwrap();
        let fctx = ctx.function_context();
        assert_eq!(t.dispatch(&[], &fctx).unwrap(), LiteralValue::Boolean(true));
        assert_eq!(f.dispatch(&[], &fctx).unwrap(), LiteralValue::Boolean(false));
    }

    #[test]
    fn and_or_over_literals() {
        let wb = TestWorkbook::new();
        let ctx = wb.interpreter();
        let and = ctx.context.get_function("AND").unwrap();
        let or = ctx.context.get_function("OR").unwrap();
        let nodes = [
            lit(LiteralValue::Boolean(true)),
            lit(LiteralValue::Number(1.0)),
            lit(LiteralValue::Boolean(false)),
        ];
        let args: Vec<ArgumentHandle> = nodes.iter().map(|n| ArgumentHandle::new(n, &ctx)).collect();
        let fctx = ctx.function_context();
        assert_eq!(and.dispatch(&args, &fctx).unwrap(), LiteralValue::Boolean(false));
        assert_eq!(or.dispatch(&args, &fctx).unwrap(), LiteralValue::Boolean(true));
        // arity
        assert_eq!(
            and.dispatch(&[], &fctx).unwrap_err().kind,
            ExcelErrorKind::Value
        );
    }

    #[test]
    fn and_or_skip_text_in_ranges_and_report_first_error() {
        let wb = TestWorkbook::new()
            .with_cell_a1("Sheet1", "A1", LiteralValue::Boolean(true))
            .with_cell_a1("Sheet1", "A2", LiteralValue::Text("x".into()))
            .with_cell_a1("Sheet1", "A4", LiteralValue::Number(2.0))
            .with_cell_a1("Sheet1", "B1", LiteralValue::Text("only text".into()))
            .with_cell_a1("Sheet1", "C1", LiteralValue::Error(ExcelError::new_div()));
        assert_eq!(wb.eval("=AND(A1:A4)"), LiteralValue::Boolean(true));
        assert_eq!(wb.eval("=OR(B1, FALSE)"), LiteralValue::Boolean(false));
        assert_eq!(wb.eval("=AND(B1)"), LiteralValue::Error(ExcelError::new_value()));
        assert_eq!(wb.eval("=AND(\"x\", TRUE)"), LiteralValue::Error(ExcelError::new_value()));
        assert_eq!(wb.eval("=OR(\"true\", FALSE)"), LiteralValue::Boolean(true));
        // every argument is looked at, the earliest error wins
        assert_eq!(
            wb.eval("=OR(TRUE, C1, NA())"),
            LiteralValue::Error(ExcelError::new_div())
        );
        assert_eq!(
            wb.eval("=AND(FALSE, NA(), C1)"),
            LiteralValue::Error(ExcelError::new_na())
        );
    }

    #[test]
    fn if_and_iferror() {
        let wb = TestWorkbook::new().with_cell_a1("Sheet1", "A1", LiteralValue::Number(5.0));
        assert_eq!(wb.eval("=IF(A1>3, \"big\", \"small\")"), LiteralValue::Text("big".into()));
        assert_eq!(wb.eval("=IF(A1>9, \"big\")"), LiteralValue::Boolean(false));
        assert_eq!(wb.eval("=IF(A1>9, 1,)"), LiteralValue::Number(0.0));
        assert_eq!(wb.eval("=IF(\"maybe\", 1, 2)"), LiteralValue::Error(ExcelError::new_value()));
        // the untaken branch is never evaluated
        assert_eq!(wb.eval("=IF(TRUE, 1, 1/0)"), LiteralValue::Number(1.0));

        assert_eq!(wb.eval("=IFERROR(1/0, \"fallback\")"), LiteralValue::Text("fallback".into()));
        assert_eq!(wb.eval("=IFERROR(A1*2, \"fallback\")"), LiteralValue::Number(10.0));
        assert_eq!(wb.eval("=IFERROR(NA(), 7)"), LiteralValue::Number(7.0));
        assert_eq!(wb.eval("=IFERROR(\"\", 7)"), LiteralValue::Text(String::new()));
        assert_eq!(wb.eval("=NOT(0)"), LiteralValue::Boolean(true));
    }
}
