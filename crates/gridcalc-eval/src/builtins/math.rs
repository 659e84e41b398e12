use gridcalc_common::{ExcelError, LiteralValue};

use super::utils::{NumberPolicy, coerce_num, collect_numbers, coerce_to_int, round_to_precision};
use crate::function::Function;
use crate::func_caps;
use crate::interpreter::arithmetic;
use crate::traits::{ArgumentHandle, FunctionContext};

/* ─────────────────────────── reducers ─────────────────────────── */

#[derive(Debug)]
pub struct SumFn;

impl Function for SumFn {
    func_caps!(PURE | REDUCTION | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "SUM"
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
        let nums = collect_numbers(args, ctx, NumberPolicy::Strict)?;
        Ok(LiteralValue::Number(nums.iter().sum()))
    }
}

/// An empty product is 0, as in every spreadsheet.
#[derive(Debug)]
pub struct ProductFn;

impl Function for ProductFn {
    func_caps!(PURE | REDUCTION | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "PRODUCT"
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
        let nums = collect_numbers(args, ctx, NumberPolicy::Strict)?;
        if nums.is_empty() {
            return Ok(LiteralValue::Number(0.0));
        }
        Ok(LiteralValue::Number(nums.iter().product()))
    }
}

/* ─────────────────────────── elementwise ─────────────────────────── */

#[derive(Debug)]
pub struct AbsFn;

impl Function for AbsFn {
    func_caps!(PURE | ELEMENTWISE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "ABS"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Number(coerce_num(&args[0], ctx)?.abs()))
    }
}

/// Rounds down to the nearest integer (toward negative infinity).
#[derive(Debug)]
pub struct IntFn;

impl Function for IntFn {
    func_caps!(PURE | ELEMENTWISE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "INT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Number(coerce_num(&args[0], ctx)?.floor()))
    }
}

/// The result takes the sign of the divisor.
#[derive(Debug)]
pub struct ModFn;

impl Function for ModFn {
    func_caps!(PURE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "MOD"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let n = coerce_num(&args[0], ctx)?;
        let d = coerce_num(&args[1], ctx)?;
        if d == 0.0 {
            return Err(ExcelError::new_div());
        }
        Ok(LiteralValue::Number(n - d * (n / d).floor()))
    }
}

#[derive(Debug)]
pub struct RoundFn;

impl Function for RoundFn {
    func_caps!(PURE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "ROUND"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let n = coerce_num(&args[0], ctx)?;
        let digits = coerce_to_int(&args[1], ctx)?.clamp(-308, 308) as i32;
        Ok(LiteralValue::Number(round_to_precision(n, digits)))
    }
}

#[derive(Debug)]
pub struct PowerFn;

impl Function for PowerFn {
    func_caps!(PURE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "POWER"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let base = coerce_num(&args[0], ctx)?;
        let exp = coerce_num(&args[1], ctx)?;
        arithmetic("^", base, exp).map(LiteralValue::Number)
    }
}

#[derive(Debug)]
pub struct SqrtFn;

impl Function for SqrtFn {
    func_caps!(PURE | ELEMENTWISE | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "SQRT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let n = coerce_num(&args[0], ctx)?;
        if n < 0.0 {
            return Err(ExcelError::new_num());
        }
        Ok(LiteralValue::Number(n.sqrt()))
    }
}

pub fn register_builtins() {
    crate::register_functions!(
        SumFn, ProductFn, AbsFn, IntFn, ModFn, RoundFn, PowerFn, SqrtFn
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gridcalc_common::{ExcelError, LiteralValue};
    use gridcalc_parse::{ASTNode, ASTNodeType};

    use super::SumFn;
    use crate::test_workbook::TestWorkbook;
    use crate::traits::ArgumentHandle;

    fn n(v: f64) -> LiteralValue {
        LiteralValue::Number(v)
    }

    fn wb() -> TestWorkbook {
        TestWorkbook::new().with_range(
            "Sheet1",
            1,
            1,
            vec![
                vec![n(1.0), LiteralValue::Text("2".into())],
                vec![n(3.0), LiteralValue::Boolean(true)],
                vec![LiteralValue::Empty, n(4.0)],
            ],
        )
    }

    #[test]
    fn sum_dispatch_over_a_range_handle() {
        let wb = wb().with_function(Arc::new(SumFn));
        let ctx = wb.interpreter();
        let sum = ctx.context.get_function("SUM").unwrap();
        let range = gridcalc_parse::parse("=A1:B3").unwrap();
        let extra = ASTNode::new(ASTNodeType::Literal(n(10.0)), None);
        let args = vec![ArgumentHandle::new(&range, &ctx), ArgumentHandle::new(&extra, &ctx)];
        assert_eq!(sum.dispatch(&args, &ctx.function_context()).unwrap(), n(18.0));
    }

    #[test]
    fn direct_arguments_coerce_but_range_text_is_skipped() {
        let wb = wb();
        assert_eq!(wb.eval("=SUM(A1:B3)"), n(8.0));
        assert_eq!(wb.eval("=SUM(\"2\", TRUE, 1)"), n(4.0));
        assert_eq!(wb.eval("=SUM(\"x\")"), LiteralValue::Error(ExcelError::new_value()));
        assert_eq!(wb.eval("=SUM((A1,B3), 1)"), n(6.0));
        assert_eq!(wb.eval("=PRODUCT(A1:A2, 2)"), n(6.0));
        assert_eq!(wb.eval("=PRODUCT(C1:C2)"), n(0.0));
        assert_eq!(wb.eval("=SUM(A1:A2 A2:B2)"), n(3.0));
        assert_eq!(wb.eval("=SUM(A1 B2)"), LiteralValue::Error(ExcelError::new_null()));
    }

    #[test]
    fn scalar_math() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=ABS(-2.5)"), n(2.5));
        assert_eq!(wb.eval("=INT(-2.5)"), n(-3.0));
        assert_eq!(wb.eval("=MOD(-3, 2)"), n(1.0));
        assert_eq!(wb.eval("=MOD(3, -2)"), n(-1.0));
        assert_eq!(wb.eval("=MOD(1, 0)"), LiteralValue::Error(ExcelError::new_div()));
        assert_eq!(wb.eval("=ROUND(2.675, 2)"), n(2.68));
        assert_eq!(wb.eval("=ROUND(1250, -2)"), n(1300.0));
        assert_eq!(wb.eval("=ROUND(1, 400)"), n(1.0));
        assert_eq!(wb.eval("=ROUND(-2.5, 20)"), n(-2.5));
        assert_eq!(wb.eval("=ROUND(1250, -400)"), n(0.0));
        assert_eq!(wb.eval("=POWER(2, 10)"), n(1024.0));
        assert_eq!(wb.eval("=POWER(-8, 0.5)"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(wb.eval("=SQRT(16)"), n(4.0));
        assert_eq!(wb.eval("=SQRT(-1)"), LiteralValue::Error(ExcelError::new_num()));
    }
}
