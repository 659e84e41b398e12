use gridcalc_common::{ExcelError, LiteralValue};

use super::utils::{NumberPolicy, collect_numbers};
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, EvaluatedArg, FunctionContext, Range};

#[derive(Debug)]
pub struct AverageFn;

impl Function for AverageFn {
    func_caps!(PURE | REDUCTION | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "AVERAGE"
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
            return Err(ExcelError::new_div().with_message("no numbers to average"));
        }
        Ok(LiteralValue::Number(nums.iter().sum::<f64>() / nums.len() as f64))
    }
}

/// Counts numbers; errors and text never fail the count.
#[derive(Debug)]
pub struct CountFn;

impl Function for CountFn {
    func_caps!(PURE | REDUCTION);
    fn name(&self) -> &'static str {
        "COUNT"
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
        let nums = collect_numbers(args, ctx, NumberPolicy::Lenient)?;
        Ok(LiteralValue::Number(nums.len() as f64))
    }
}

/// Counts non-empty cells in ranges; every direct argument counts,
/// errors included.
#[derive(Debug)]
pub struct CountAFn;

impl Function for CountAFn {
    func_caps!(PURE | REDUCTION | HANDLES_ERRORS);
    fn name(&self) -> &'static str {
        "COUNTA"
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
        _ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let mut count = 0usize;
        for arg in args {
            match arg.value_or_range() {
                Ok(EvaluatedArg::Range(range)) => {
                    count += range.iter_cells().filter(|v| !v.is_empty()).count();
                }
                Ok(EvaluatedArg::LiteralValue(_)) | Err(_) => count += 1,
            }
        }
        Ok(LiteralValue::Number(count as f64))
    }
}

fn extremum(
    args: &[ArgumentHandle],
    ctx: &dyn FunctionContext,
    pick: fn(f64, f64) -> f64,
) -> Result<LiteralValue, ExcelError> {
    let nums = collect_numbers(args, ctx, NumberPolicy::Strict)?;
    // with nothing to compare the answer is zero
    Ok(LiteralValue::Number(
        nums.into_iter().reduce(pick).unwrap_or(0.0),
    ))
}

#[derive(Debug)]
pub struct MinFn;

impl Function for MinFn {
    func_caps!(PURE | REDUCTION | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "MIN"
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
        extremum(args, ctx, f64::min)
    }
}

#[derive(Debug)]
pub struct MaxFn;

impl Function for MaxFn {
    func_caps!(PURE | REDUCTION | NUMERIC_ONLY);
    fn name(&self) -> &'static str {
        "MAX"
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
        extremum(args, ctx, f64::max)
    }
}

pub fn register_builtins() {
    crate::register_functions!(AverageFn, CountFn, CountAFn, MinFn, MaxFn);
}
