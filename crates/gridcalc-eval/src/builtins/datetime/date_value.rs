//! DATEVALUE and TIMEVALUE: dates and times written as text.

use gridcalc_common::{ExcelError, LiteralValue};

use super::serial::date_result;
use crate::binder::{parse_date_text, parse_time_text};
use crate::builtins::utils::scalar;
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

fn text_arg(arg: &ArgumentHandle) -> Result<String, ExcelError> {
    match scalar(arg)? {
        LiteralValue::Text(s) => Ok(s),
        other => Err(ExcelError::new_value()
            .with_message(format!("expected text, got {}", other.type_name()))),
    }
}

/// DATEVALUE(text). Any time of day in the text is dropped.
#[derive(Debug)]
pub struct DateValueFn;

impl Function for DateValueFn {
    func_caps!(PURE | RETURNS_DATE);
    fn name(&self) -> &'static str {
        "DATEVALUE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let text = text_arg(&args[0])?;
        let serial = parse_date_text(&text, ctx.calendar()).ok_or_else(|| {
            ExcelError::new_value().with_message(format!("{text:?} is not a date"))
        })?;
        Ok(date_result(serial.floor(), ctx))
    }
}

/// TIMEVALUE(text). A date in the text is ignored; hours past a day wrap.
#[derive(Debug)]
pub struct TimeValueFn;

impl Function for TimeValueFn {
    func_caps!(PURE | RETURNS_DATE);
    fn name(&self) -> &'static str {
        "TIMEVALUE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let text = text_arg(&args[0])?;
        let serial = parse_time_text(&text)
            .or_else(|| parse_date_text(&text, ctx.calendar()))
            .ok_or_else(|| {
                ExcelError::new_value().with_message(format!("{text:?} is not a time"))
            })?;
        Ok(date_result(serial.fract(), ctx))
    }
}

pub fn register_builtins() {
    crate::register_functions!(DateValueFn, TimeValueFn);
}
