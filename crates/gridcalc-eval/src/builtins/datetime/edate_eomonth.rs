//! EDATE and EOMONTH: month arithmetic on serials.

use chrono::{Datelike, Months, NaiveDate};
use gridcalc_common::{ExcelError, LiteralValue, ymd_rollover};

use super::serial::{coerce_serial, date_result, date_to_serial, serial_to_date};
use crate::builtins::utils::coerce_to_int;
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

fn shift_months(date: NaiveDate, months: i64) -> Result<NaiveDate, ExcelError> {
    let count = u32::try_from(months.unsigned_abs()).map_err(|_| ExcelError::new_num())?;
    let step = Months::new(count);
    let shifted = if months >= 0 {
        date.checked_add_months(step)
    } else {
        date.checked_sub_months(step)
    };
    shifted.ok_or_else(ExcelError::new_num)
}

fn checked_serial(date: NaiveDate, ctx: &dyn FunctionContext) -> Result<LiteralValue, ExcelError> {
    if date.year() > 9999 {
        return Err(ExcelError::new_num());
    }
    let serial = date_to_serial(date, ctx.calendar());
    if serial < 0.0 {
        return Err(ExcelError::new_num().with_message("date precedes the epoch"));
    }
    Ok(date_result(serial, ctx))
}

/// EDATE(start, months). The day is clamped to the length of the target month.
#[derive(Debug)]
pub struct EdateFn;

impl Function for EdateFn {
    func_caps!(PURE | RETURNS_DATE);
    fn name(&self) -> &'static str {
        "EDATE"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let start = serial_to_date(coerce_serial(&args[0], ctx)?, ctx.calendar())?;
        let months = coerce_to_int(&args[1], ctx)?;
        checked_serial(shift_months(start, months)?, ctx)
    }
}

/// EOMONTH(start, months): last day of the month `months` away.
#[derive(Debug)]
pub struct EomonthFn;

impl Function for EomonthFn {
    func_caps!(PURE | RETURNS_DATE);
    fn name(&self) -> &'static str {
        "EOMONTH"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let start = serial_to_date(coerce_serial(&args[0], ctx)?, ctx.calendar())?;
        let months = coerce_to_int(&args[1], ctx)?;
        let month = i64::from(start.month())
            .checked_add(months)
            .and_then(|m| m.checked_add(1))
            .ok_or_else(ExcelError::new_num)?;
        // day zero of the following month
        let end =
            ymd_rollover(i64::from(start.year()), month, 0).ok_or_else(ExcelError::new_num)?;
        checked_serial(end, ctx)
    }
}

pub fn register_builtins() {
    crate::register_functions!(EdateFn, EomonthFn);
}

#[cfg(test)]
mod tests {
    use gridcalc_common::{ExcelError, LiteralValue};

    use crate::test_workbook::TestWorkbook;

    fn n(v: f64) -> LiteralValue {
        LiteralValue::Number(v)
    }

    #[test]
    fn edate_clamps_the_day() {
        let wb = TestWorkbook::new();
        // 2012-01-31 + 1 month = 2012-02-29
        assert_eq!(wb.eval("=EDATE(DATE(2012,1,31), 1)"), wb.eval("=DATE(2012,2,29)"));
        assert_eq!(wb.eval("=EDATE(DATE(2012,3,15), -14)"), wb.eval("=DATE(2011,1,15)"));
        assert_eq!(wb.eval("=EDATE(\"2012-01-31\", 12)"), wb.eval("=DATE(2013,1,31)"));
        assert_eq!(wb.eval("=EDATE(DATE(2012,1,31), 1.9)"), n(40968.0));
        assert_eq!(wb.eval("=EDATE(1, -1)"), LiteralValue::Error(ExcelError::new_num()));
    }

    #[test]
    fn eomonth() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=EOMONTH(DATE(2012,1,15), 1)"), wb.eval("=DATE(2012,2,29)"));
        assert_eq!(wb.eval("=EOMONTH(DATE(2012,1,15), 0)"), n(40939.0));
        assert_eq!(wb.eval("=EOMONTH(DATE(2012,1,15), -13)"), wb.eval("=DATE(2010,12,31)"));
        assert_eq!(wb.eval("=EOMONTH(DATE(1900,1,15), -2)"), LiteralValue::Error(ExcelError::new_num()));
    }
}
