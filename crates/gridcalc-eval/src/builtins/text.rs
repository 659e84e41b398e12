//! Text functions. Lengths and positions count characters, not bytes.

use gridcalc_common::{ExcelError, LiteralValue};

use super::number_format::{format_text_with_mask, format_with_mask};
use super::utils::{coerce_text, coerce_to_int, opt_num, scalar};
use crate::binder::parse_numeric_text;
use crate::coercion::to_text;
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

/// CONCATENATE(text, ...). Each argument must be a single value; a range or
/// array of more than one cell is `#VALUE!`.
#[derive(Debug)]
pub struct ConcatenateFn;

impl Function for ConcatenateFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "CONCATENATE"
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
        let mut out = String::new();
        for arg in args {
            let value = arg.value()?;
            if let LiteralValue::Array(rows) = value.as_ref()
                && rows.iter().map(Vec::len).sum::<usize>() > 1
            {
                return Err(ExcelError::new_value()
                    .with_message("CONCATENATE takes single values, not ranges"));
            }
            out.push_str(&to_text(&value.first_scalar(), ctx.config())?);
        }
        Ok(LiteralValue::Text(out))
    }
}

#[derive(Debug)]
pub struct LenFn;

impl Function for LenFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "LEN"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let s = coerce_text(&args[0], ctx)?;
        Ok(LiteralValue::Number(s.chars().count() as f64))
    }
}

/// Optional character count for `LEFT`/`RIGHT`; defaults to one and must
/// not be negative.
fn char_count(
    args: &[ArgumentHandle],
    idx: usize,
    ctx: &dyn FunctionContext,
) -> Result<usize, ExcelError> {
    let n = opt_num(args, idx, 1.0, ctx)?.trunc();
    if n < 0.0 {
        return Err(ExcelError::new_value().with_message("negative character count"));
    }
    Ok(n.min(usize::MAX as f64) as usize)
}

#[derive(Debug)]
pub struct LeftFn;

impl Function for LeftFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "LEFT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let s = coerce_text(&args[0], ctx)?;
        let n = char_count(args, 1, ctx)?;
        Ok(LiteralValue::Text(s.chars().take(n).collect()))
    }
}

#[derive(Debug)]
pub struct RightFn;

impl Function for RightFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "RIGHT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let s = coerce_text(&args[0], ctx)?;
        let n = char_count(args, 1, ctx)?;
        let len = s.chars().count();
        Ok(LiteralValue::Text(s.chars().skip(len.saturating_sub(n)).collect()))
    }
}

#[derive(Debug)]
pub struct MidFn;

impl Function for MidFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "MID"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let s = coerce_text(&args[0], ctx)?;
        let start = coerce_to_int(&args[1], ctx)?;
        let count = coerce_to_int(&args[2], ctx)?;
        if start < 1 || count < 0 {
            return Err(ExcelError::new_value());
        }
        Ok(LiteralValue::Text(
            s.chars()
                .skip((start - 1) as usize)
                .take(count as usize)
                .collect(),
        ))
    }
}

#[derive(Debug)]
pub struct UpperFn;

impl Function for UpperFn {
    func_caps!(PURE | ELEMENTWISE);
    fn name(&self) -> &'static str {
        "UPPER"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Text(coerce_text(&args[0], ctx)?.to_uppercase()))
    }
}

#[derive(Debug)]
pub struct LowerFn;

impl Function for LowerFn {
    func_caps!(PURE | ELEMENTWISE);
    fn name(&self) -> &'static str {
        "LOWER"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Text(coerce_text(&args[0], ctx)?.to_lowercase()))
    }
}

/// Strips leading and trailing spaces and collapses inner runs to one.
#[derive(Debug)]
pub struct TrimFn;

impl Function for TrimFn {
    func_caps!(PURE | ELEMENTWISE);
    fn name(&self) -> &'static str {
        "TRIM"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let s = coerce_text(&args[0], ctx)?;
        let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
        Ok(LiteralValue::Text(words.join(" ")))
    }
}

/// Reads text as a number using the configured locale; percentages,
/// currency amounts, dates and times are accepted.
#[derive(Debug)]
pub struct ValueFn;

impl Function for ValueFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "VALUE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        match scalar(&args[0])? {
            LiteralValue::Number(n) => Ok(LiteralValue::Number(n)),
            LiteralValue::DateTime(dt) => Ok(LiteralValue::Number(
                gridcalc_common::native_to_excel(&dt, ctx.calendar()),
            )),
            LiteralValue::Empty => Ok(LiteralValue::Number(0.0)),
            LiteralValue::Text(s) => parse_numeric_text(&s, ctx.config())
                .map(LiteralValue::Number)
                .ok_or_else(|| ExcelError::new_value().with_message(format!("{s:?} is not a number"))),
            _ => Err(ExcelError::new_value()),
        }
    }
}

/// TEXT(value, format_text). Numbers, dates and numeric text go through the
/// mask; any other text only meets the mask's `@` section.
#[derive(Debug)]
pub struct TextFn;

impl Function for TextFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "TEXT"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let value = scalar(&args[0])?;
        let mask = coerce_text(&args[1], ctx)?;
        let config = ctx.config();
        let rendered = match value {
            LiteralValue::Number(n) => format_with_mask(n, &mask, config)?,
            LiteralValue::Empty => format_with_mask(0.0, &mask, config)?,
            LiteralValue::DateTime(dt) => format_with_mask(
                gridcalc_common::native_to_excel(&dt, ctx.calendar()),
                &mask,
                config,
            )?,
            LiteralValue::Text(s) => match parse_numeric_text(&s, config) {
                Some(n) => format_with_mask(n, &mask, config)?,
                None => format_text_with_mask(&s, &mask),
            },
            LiteralValue::Boolean(b) => {
                format_text_with_mask(if b { "TRUE" } else { "FALSE" }, &mask)
            }
            other => to_text(&other, config)?,
        };
        Ok(LiteralValue::Text(rendered))
    }
}

pub fn register_builtins() {
    crate::register_functions!(
        ConcatenateFn,
        LenFn,
        LeftFn,
        RightFn,
        MidFn,
        UpperFn,
        LowerFn,
        TrimFn,
        ValueFn,
        TextFn,
    );
}
