//! DATEDIF, DAYS360, YEARFRAC: distances between two dates.

use chrono::{Datelike, NaiveDate};
use gridcalc_common::{ExcelError, LiteralValue, ymd_rollover};

use super::serial::{coerce_serial, is_leap_year, last_day_of_month, serial_to_date};
use crate::builtins::utils::{coerce_text, opt_bool, opt_num};
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Whole months from `start` to `end`; a month only counts once its day of
/// the month is reached.
fn whole_months(start: NaiveDate, end: NaiveDate) -> i64 {
    let months = i64::from(end.year() - start.year()) * 12 + i64::from(end.month())
        - i64::from(start.month());
    if end.day() < start.day() { months - 1 } else { months }
}

/// DATEDIF(start, end, unit) with units `Y`, `M`, `D`, `MD`, `YM`, `YD`.
#[derive(Debug)]
pub struct DatedifFn;

impl Function for DatedifFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "DATEDIF"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let calendar = ctx.calendar();
        let start_serial = coerce_serial(&args[0], ctx)?.floor();
        let end_serial = coerce_serial(&args[1], ctx)?.floor();
        let unit = coerce_text(&args[2], ctx)?.to_ascii_uppercase();
        if start_serial > end_serial {
            return Err(ExcelError::new_num().with_message("start date after end date"));
        }
        let start = serial_to_date(start_serial, calendar)?;
        let end = serial_to_date(end_serial, calendar)?;

        let n = match unit.as_str() {
            "D" => (end_serial - start_serial) as i64,
            "M" => whole_months(start, end),
            "Y" => whole_months(start, end) / 12,
            "YM" => whole_months(start, end) % 12,
            "MD" => {
                if end.day() >= start.day() {
                    i64::from(end.day() - start.day())
                } else {
                    // start's day of the month, one month before end
                    let anchor = ymd_rollover(
                        i64::from(end.year()),
                        i64::from(end.month()) - 1,
                        i64::from(start.day()),
                    )
                    .ok_or_else(ExcelError::new_num)?;
                    days_between(anchor, end)
                }
            }
            "YD" => {
                let mut anchor = ymd_rollover(
                    i64::from(end.year()),
                    i64::from(start.month()),
                    i64::from(start.day()),
                )
                .ok_or_else(ExcelError::new_num)?;
                if anchor > end {
                    anchor = ymd_rollover(
                        i64::from(end.year()) - 1,
                        i64::from(start.month()),
                        i64::from(start.day()),
                    )
                    .ok_or_else(ExcelError::new_num)?;
                }
                days_between(anchor, end)
            }
            _ => return Err(ExcelError::new_num().with_message(format!("unknown unit {unit:?}"))),
        };
        Ok(LiteralValue::Number(n as f64))
    }
}

fn is_last_of_february(date: NaiveDate) -> bool {
    date.month() == 2 && date.day() == last_day_of_month(date.year(), 2)
}

/// 30/360 day count. The US (NASD) method moves a start on the 31st or the
/// last day of February to the 30th and lets an end on the 31st roll into
/// the next month unless the start is the 30th; the European method moves
/// any 31st to the 30th.
fn days_360(start: NaiveDate, end: NaiveDate, european: bool) -> i64 {
    let (sy, sm, mut sd) = (i64::from(start.year()), i64::from(start.month()), start.day());
    let (mut ey, mut em, mut ed) = (i64::from(end.year()), i64::from(end.month()), end.day());
    if european {
        sd = sd.min(30);
        ed = ed.min(30);
    } else {
        if sd == 31 || is_last_of_february(start) {
            sd = 30;
        }
        if ed == 31 {
            if sd < 30 {
                ed = 1;
                if em == 12 {
                    em = 1;
                    ey += 1;
                } else {
                    em += 1;
                }
            } else {
                ed = 30;
            }
        }
    }
    (ey - sy) * 360 + (em - sm) * 30 + i64::from(ed) - i64::from(sd)
}

/// DAYS360(start, end, [european=FALSE])
#[derive(Debug)]
pub struct Days360Fn;

impl Function for Days360Fn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "DAYS360"
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
        let calendar = ctx.calendar();
        let start = serial_to_date(coerce_serial(&args[0], ctx)?, calendar)?;
        let end = serial_to_date(coerce_serial(&args[1], ctx)?, calendar)?;
        let european = opt_bool(args, 2, false, ctx)?;
        Ok(LiteralValue::Number(days_360(start, end, european) as f64))
    }
}

/// Actual/actual: the length of the year the interval sits in, or the
/// average year length over every year it touches when it spans more than
/// one year.
fn actual_actual(start: NaiveDate, end: NaiveDate) -> f64 {
    let days = days_between(start, end) as f64;
    if start.year() == end.year() {
        let len = if is_leap_year(start.year()) { 366.0 } else { 365.0 };
        return days / len;
    }
    let one_year_on = start.with_year(start.year() + 1).unwrap_or_else(|| {
        // 29 February has no counterpart
        NaiveDate::from_ymd_opt(start.year() + 1, 3, 1).unwrap_or(end)
    });
    if end <= one_year_on {
        let crosses_leap_day = (start.year()..=end.year()).any(|y| {
            NaiveDate::from_ymd_opt(y, 2, 29).is_some_and(|d| d >= start && d <= end)
        });
        return days / if crosses_leap_day { 366.0 } else { 365.0 };
    }
    let years = (start.year()..=end.year())
        .map(|y| if is_leap_year(y) { 366.0 } else { 365.0 })
        .collect::<Vec<f64>>();
    let average = years.iter().sum::<f64>() / years.len() as f64;
    days / average
}

/// YEARFRAC(start, end, [basis=0]). Basis 0 US 30/360, 1 actual/actual,
/// 2 actual/360, 3 actual/365, 4 European 30/360.
#[derive(Debug)]
pub struct YearfracFn;

impl Function for YearfracFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "YEARFRAC"
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
        let calendar = ctx.calendar();
        let mut start = serial_to_date(coerce_serial(&args[0], ctx)?, calendar)?;
        let mut end = serial_to_date(coerce_serial(&args[1], ctx)?, calendar)?;
        let basis = opt_num(args, 2, 0.0, ctx)?.trunc() as i64;
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        let fraction = match basis {
            0 => days_360(start, end, false) as f64 / 360.0,
            1 => actual_actual(start, end),
            2 => days_between(start, end) as f64 / 360.0,
            3 => days_between(start, end) as f64 / 365.0,
            4 => days_360(start, end, true) as f64 / 360.0,
            _ => return Err(ExcelError::new_num().with_message("basis must be 0..=4")),
        };
        Ok(LiteralValue::Number(fraction))
    }
}

pub fn register_builtins() {
    crate::register_functions!(DatedifFn, Days360Fn, YearfracFn);
}

#[cfg(test)]
mod tests {
    use gridcalc_common::{ExcelError, LiteralValue};

    use crate::test_workbook::TestWorkbook;

    fn n(v: f64) -> LiteralValue {
        LiteralValue::Number(v)
    }

    fn approx(v: LiteralValue, expected: f64) {
        match v {
            LiteralValue::Number(x) => assert!((x - expected).abs() < 1e-9, "{x} != {expected}"),
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn datedif_units() {
        let wb = TestWorkbook::new();
        let f = |unit: &str| wb.eval(&format!("=DATEDIF(DATE(2001,6,15), DATE(2012,1,10), \"{unit}\")"));
        assert_eq!(f("Y"), n(10.0));
        assert_eq!(f("M"), n(126.0));
        assert_eq!(f("YM"), n(6.0));
        assert_eq!(f("D"), n(3861.0));
        assert_eq!(f("md"), n(26.0));
        assert_eq!(f("YD"), n(209.0));
        assert_eq!(f("W"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(
            wb.eval("=DATEDIF(DATE(2012,1,2), DATE(2012,1,1), \"D\")"),
            LiteralValue::Error(ExcelError::new_num())
        );
    }

    #[test]
    fn days360_methods() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=DAYS360(DATE(2012,1,1), DATE(2012,12,31))"), n(360.0));
        assert_eq!(wb.eval("=DAYS360(DATE(2012,1,1), DATE(2012,12,31), TRUE)"), n(359.0));
        assert_eq!(wb.eval("=DAYS360(DATE(2011,2,28), DATE(2011,3,31))"), n(30.0));
        assert_eq!(wb.eval("=DAYS360(DATE(2012,1,31), DATE(2012,1,1))"), n(-29.0));
    }

    #[test]
    fn yearfrac_bases() {
        let wb = TestWorkbook::new();
        approx(wb.eval("=YEARFRAC(DATE(2012,1,1), DATE(2012,7,1))"), 0.5);
        approx(wb.eval("=YEARFRAC(DATE(2012,1,1), DATE(2012,7,1), 1)"), 182.0 / 366.0);
        approx(wb.eval("=YEARFRAC(DATE(2012,1,1), DATE(2012,7,1), 2)"), 182.0 / 360.0);
        approx(wb.eval("=YEARFRAC(DATE(2012,1,1), DATE(2012,7,1), 3)"), 182.0 / 365.0);
        approx(wb.eval("=YEARFRAC(DATE(2012,7,1), DATE(2012,1,1), 4)"), 0.5);
        approx(
            wb.eval("=YEARFRAC(DATE(2010,1,1), DATE(2013,1,1), 1)"),
            1096.0 / ((365.0 * 3.0 + 366.0) / 4.0),
        );
        assert_eq!(
            wb.eval("=YEARFRAC(1, 2, 5)"),
            LiteralValue::Error(ExcelError::new_num())
        );
    }
}
