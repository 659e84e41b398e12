use gridcalc_common::{ExcelError, ExcelErrorKind, LiteralValue};

use super::utils::coerce_num;
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

/* Info and type-introspection builtins. These inspect their argument
instead of propagating errors out of it. */

/// The argument as evaluated, errors included, arrays reduced to their
/// top-left element.
fn inspect(arg: &ArgumentHandle) -> LiteralValue {
    match arg.value() {
        Ok(v) => v.first_scalar(),
        Err(e) => LiteralValue::Error(e),
    }
}

macro_rules! predicate_fn {
    ($(#[$doc:meta])* $ty:ident, $name:literal, |$v:ident| $test:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $ty;

        impl Function for $ty {
            func_caps!(PURE | HANDLES_ERRORS);
            fn name(&self) -> &'static str {
                $name
            }
            fn min_args(&self) -> usize {
                1
            }
            fn eval_scalar<'a, 'b>(
                &self,
                args: &'a [ArgumentHandle<'a, 'b>],
                _ctx: &dyn FunctionContext,
            ) -> Result<LiteralValue, ExcelError> {
                let $v = inspect(&args[0]);
                Ok(LiteralValue::Boolean($test))
            }
        }
    };
}

predicate_fn!(
    /// TRUE for a reference to an empty cell.
    IsBlankFn, "ISBLANK", |v| matches!(v, LiteralValue::Empty)
);
predicate_fn!(
    /// Any error except `#N/A`.
    IsErrFn, "ISERR", |v| matches!(&v, LiteralValue::Error(e) if e.kind != ExcelErrorKind::Na)
);
predicate_fn!(IsErrorFn, "ISERROR", |v| v.is_error());
predicate_fn!(
    IsNaFn, "ISNA", |v| matches!(&v, LiteralValue::Error(e) if e.kind == ExcelErrorKind::Na)
);
predicate_fn!(
    /// Numeric text is still text.
    IsNumberFn, "ISNUMBER", |v| matches!(v, LiteralValue::Number(_) | LiteralValue::DateTime(_))
);
predicate_fn!(IsTextFn, "ISTEXT", |v| matches!(v, LiteralValue::Text(_)));
predicate_fn!(IsNonTextFn, "ISNONTEXT", |v| !matches!(v, LiteralValue::Text(_)));
predicate_fn!(IsLogicalFn, "ISLOGICAL", |v| matches!(v, LiteralValue::Boolean(_)));

/* ─────────────────────────── ISEVEN / ISODD ─────────────────────────── */

fn parity(arg: &ArgumentHandle, ctx: &dyn FunctionContext) -> Result<i64, ExcelError> {
    if let LiteralValue::Boolean(_) = inspect(arg) {
        return Err(ExcelError::new_value());
    }
    let n = coerce_num(arg, ctx)?.trunc();
    Ok((n % 2.0).abs() as i64)
}

#[derive(Debug)]
pub struct IsEvenFn;

impl Function for IsEvenFn {
    func_caps!(PURE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "ISEVEN"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(parity(&args[0], ctx)? == 0))
    }
}

#[derive(Debug)]
pub struct IsOddFn;

impl Function for IsOddFn {
    func_caps!(PURE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "ISODD"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(parity(&args[0], ctx)? == 1))
    }
}

/* ─────────────────────────── ERROR.TYPE / TYPE ─────────────────────────── */

/// 1 `#NULL!`, 2 `#DIV/0!`, 3 `#VALUE!`, 4 `#REF!`, 5 `#NAME?`, 6 `#NUM!`,
/// 7 `#N/A`; anything that is not an error is `#N/A`.
#[derive(Debug)]
pub struct ErrorTypeFn;

impl Function for ErrorTypeFn {
    func_caps!(PURE | HANDLES_ERRORS);
    fn name(&self) -> &'static str {
        "ERROR.TYPE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        match inspect(&args[0]) {
            LiteralValue::Error(e) => Ok(LiteralValue::Number(f64::from(e.kind.type_number()))),
            _ => Err(ExcelError::new_na()),
        }
    }
}

#[derive(Debug)]
pub struct TypeFn;

impl Function for TypeFn {
    func_caps!(PURE | HANDLES_ERRORS);
    fn name(&self) -> &'static str {
        "TYPE"
    }
    fn min_args(&self) -> usize {
        1
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
        Ok(LiteralValue::Number(f64::from(v.type_code())))
    }
}

/* ─────────────────────────── N / NA ─────────────────────────── */

#[derive(Debug)]
pub struct NFn;

impl Function for NFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "N"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let n = match inspect(&args[0]) {
            LiteralValue::Number(n) => n,
            LiteralValue::DateTime(dt) => gridcalc_common::native_to_excel(&dt, ctx.calendar()),
            LiteralValue::Boolean(b) => f64::from(u8::from(b)),
            LiteralValue::Error(e) => return Err(e),
            _ => 0.0,
        };
        Ok(LiteralValue::Number(n))
    }
}

#[derive(Debug)]
pub struct NaFn;

impl Function for NaFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "NA"
    }
    fn eval_scalar<'a, 'b>(
        &self,
        _args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Err(ExcelError::new_na())
    }
}

pub fn register_builtins() {
    crate::register_functions!(
        IsBlankFn,
        IsErrFn,
        IsErrorFn,
        IsNaFn,
        IsNumberFn,
        IsTextFn,
        IsNonTextFn,
        IsLogicalFn,
        IsEvenFn,
        IsOddFn,
        ErrorTypeFn,
        TypeFn,
        NFn,
        NaFn,
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gridcalc_parse::{ASTNode, ASTNodeType};

    use super::*;
    use crate::test_workbook::TestWorkbook;

    fn b(v: bool) -> LiteralValue {
        LiteralValue::Boolean(v)
    }

    fn n(v: f64) -> LiteralValue {
        LiteralValue::Number(v)
    }

    #[test]
    fn isnumber_dispatch() {
        let wb = TestWorkbook::new().with_function(Arc::new(IsNumberFn));
        let ctx = wb.interpreter();
        let f = ctx.context.get_function("ISNUMBER").unwrap();
        let num = ASTNode::new(ASTNodeType::Literal(n(std::f64::consts::PI)), None);
        let txt = ASTNode::new(ASTNodeType::Literal(LiteralValue::Text("42".into())), None);
        let fctx = ctx.function_context();
        assert_eq!(f.dispatch(&[ArgumentHandle::new(&num, &ctx)], &fctx).unwrap(), b(true));
        assert_eq!(f.dispatch(&[ArgumentHandle::new(&txt, &ctx)], &fctx).unwrap(), b(false));
    }

    #[test]
    fn predicates_do_not_propagate_errors() {
        let wb = TestWorkbook::new()
            .with_cell_a1("Sheet1", "A1", LiteralValue::Text("t".into()))
            .with_cell_a1("Sheet1", "A2", LiteralValue::Error(ExcelError::new_ref()));
        assert_eq!(wb.eval("=ISBLANK(B9)"), b(true));
        assert_eq!(wb.eval("=ISBLANK(A1)"), b(false));
        assert_eq!(wb.eval("=ISERROR(1/0)"), b(true));
        assert_eq!(wb.eval("=ISERR(NA())"), b(false));
        assert_eq!(wb.eval("=ISERR(A2)"), b(true));
        assert_eq!(wb.eval("=ISNA(NA())"), b(true));
        assert_eq!(wb.eval("=ISTEXT(A1)"), b(true));
        assert_eq!(wb.eval("=ISNONTEXT(A2)"), b(true));
        assert_eq!(wb.eval("=ISLOGICAL(1=1)"), b(true));
    }

    #[test]
    fn iseven_isodd() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=ISEVEN(-2.9)"), b(true));
        assert_eq!(wb.eval("=ISODD(3)"), b(true));
        assert_eq!(wb.eval("=ISODD(\"5\")"), b(true));
        assert_eq!(wb.eval("=ISEVEN(TRUE)"), LiteralValue::Error(ExcelError::new_value()));
        assert_eq!(wb.eval("=ISEVEN(1/0)"), LiteralValue::Error(ExcelError::new_div()));
    }

    #[test]
    fn error_type_type_and_n() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=ERROR.TYPE(#NULL!)"), n(1.0));
        assert_eq!(wb.eval("=ERROR.TYPE(1/0)"), n(2.0));
        assert_eq!(wb.eval("=ERROR.TYPE(NA())"), n(7.0));
        assert_eq!(wb.eval("=ERROR.TYPE(1)"), LiteralValue::Error(ExcelError::new_na()));
        assert_eq!(wb.eval("=TYPE(1)"), n(1.0));
        assert_eq!(wb.eval("=TYPE(\"a\")"), n(2.0));
        assert_eq!(wb.eval("=TYPE(TRUE)"), n(4.0));
        assert_eq!(wb.eval("=TYPE(#REF!)"), n(16.0));
        assert_eq!(wb.eval("=TYPE({1,2})"), n(64.0));
        assert_eq!(wb.eval("=N(TRUE)"), n(1.0));
        assert_eq!(wb.eval("=N(\"7\")"), n(0.0));
        assert_eq!(wb.eval("=NA()"), LiteralValue::Error(ExcelError::new_na()));
    }
}
