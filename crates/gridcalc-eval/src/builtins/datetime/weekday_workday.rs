//! WEEKDAY, WEEKNUM, NETWORKDAYS, WORKDAY

use chrono::Datelike;
use gridcalc_common::{Calendar, ExcelError, LiteralValue};
use rustc_hash::FxHashSet;

use super::serial::{
    coerce_serial, date_result, date_to_serial, day_of_week, is_weekend, serial_to_date,
};
use crate::builtins::utils::{coerce_to_int, flatten_values, opt_num};
use crate::coercion::to_number_lenient;
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

/// Number of the weekday `dow` (0 = Sunday) under a WEEKDAY return type.
fn weekday_number(dow: u32, return_type: i64) -> Result<u32, ExcelError> {
    // day the numbering starts on, and the number it starts at
    let (first, base) = match return_type {
        1 => (0, 1),
        2 => (1, 1),
        3 => (1, 0),
        11..=17 => ((return_type - 10) as u32 % 7, 1),
        _ => return Err(ExcelError::new_num().with_message("unknown WEEKDAY return type")),
    };
    Ok((dow + 7 - first) % 7 + base)
}

/// WEEKDAY(serial, [return_type=1])
#[derive(Debug)]
pub struct WeekdayFn;

impl Function for WeekdayFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "WEEKDAY"
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
        let serial = coerce_serial(&args[0], ctx)?;
        let return_type = opt_num(args, 1, 1.0, ctx)?.trunc() as i64;
        let n = weekday_number(day_of_week(serial, ctx.calendar()), return_type)?;
        Ok(LiteralValue::Number(f64::from(n)))
    }
}

/// WEEKNUM(serial, [return_type=1]). Week 1 contains January 1st; types 1
/// and 2 start weeks on Sunday and Monday, 11..=17 on Monday..=Sunday, 21 is
/// the ISO week number.
#[derive(Debug)]
pub struct WeeknumFn;

impl Function for WeeknumFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "WEEKNUM"
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
        let calendar = ctx.calendar();
        let serial = coerce_serial(&args[0], ctx)?.floor();
        let return_type = opt_num(args, 1, 1.0, ctx)?.trunc() as i64;
        let date = serial_to_date(serial, calendar)?;
        if return_type == 21 {
            return Ok(LiteralValue::Number(f64::from(date.iso_week().week())));
        }
        let week_start = match return_type {
            1 | 17 => 0,
            2 | 11 => 1,
            12..=16 => (return_type - 10) as u32,
            _ => return Err(ExcelError::new_num().with_message("unknown WEEKNUM return type")),
        };
        let jan1 = date.with_ordinal(1).ok_or_else(ExcelError::new_num)?;
        let jan1_serial = date_to_serial(jan1, calendar);
        let lead = (day_of_week(jan1_serial, calendar) + 7 - week_start) % 7;
        let day_index = (serial - jan1_serial).max(0.0) as u32;
        Ok(LiteralValue::Number(f64::from((day_index + lead) / 7 + 1)))
    }
}

/// Whole-day serials of every holiday argument. Blanks are skipped; errors
/// and unreadable values fail.
fn holiday_set(
    args: &[ArgumentHandle],
    idx: usize,
    ctx: &dyn FunctionContext,
) -> Result<FxHashSet<i64>, ExcelError> {
    let mut set = FxHashSet::default();
    let Some(arg) = args.get(idx) else {
        return Ok(set);
    };
    for v in flatten_values(arg)? {
        match v {
            LiteralValue::Empty => {}
            LiteralValue::Error(e) => return Err(e),
            other => {
                let serial = to_number_lenient(&other, ctx.config())?;
                if serial < 0.0 {
                    return Err(ExcelError::new_num());
                }
                set.insert(serial.floor() as i64);
            }
        }
    }
    Ok(set)
}

fn is_workday(day: i64, holidays: &FxHashSet<i64>, calendar: Calendar) -> bool {
    !is_weekend(day as f64, calendar) && !holidays.contains(&day)
}

/// NETWORKDAYS(start, end, [holidays]). Both ends count; the result is
/// negative when `end` precedes `start`.
#[derive(Debug)]
pub struct NetworkdaysFn;

impl Function for NetworkdaysFn {
    func_caps!(PURE);
    fn name(&self) -> &'static str {
        "NETWORKDAYS"
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
        let start = coerce_serial(&args[0], ctx)?.floor() as i64;
        let end = coerce_serial(&args[1], ctx)?.floor() as i64;
        let holidays = holiday_set(args, 2, ctx)?;
        let (lo, hi, sign) = if start <= end {
            (start, end, 1.0)
        } else {
            (end, start, -1.0)
        };

        // whole weeks hold five workdays each, the remainder is walked
        let span = hi
            .checked_sub(lo)
            .and_then(|d| d.checked_add(1))
            .ok_or_else(ExcelError::new_num)?;
        let mut count = span / 7 * 5;
        let tail_start = lo + span / 7 * 7;
        count += (tail_start..=hi)
            .filter(|&d| !is_weekend(d as f64, calendar))
            .count() as i64;
        count -= holidays
            .iter()
            .filter(|&&d| d >= lo && d <= hi && !is_weekend(d as f64, calendar))
            .count() as i64;
        Ok(LiteralValue::Number(sign * count as f64))
    }
}

/// WORKDAY(start, days, [holidays]): the workday `days` workdays away from
/// `start`, stepping backwards for negative `days`.
#[derive(Debug)]
pub struct WorkdayFn;

impl Function for WorkdayFn {
    func_caps!(PURE | RETURNS_DATE);
    fn name(&self) -> &'static str {
        "WORKDAY"
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
        let mut day = coerce_serial(&args[0], ctx)?.floor() as i64;
        let days = coerce_to_int(&args[1], ctx)?;
        let holidays = holiday_set(args, 2, ctx)?;
        let last = ctx.calendar().last_serial() as i64;
        let step = days.signum();
        let mut remaining = days.unsigned_abs();
        while remaining > 0 {
            day += step;
            if !(0..=last).contains(&day) {
                return Err(ExcelError::new_num());
            }
            if is_workday(day, &holidays, calendar) {
                remaining -= 1;
            }
        }
        serial_to_date(day as f64, calendar)?;
        Ok(date_result(day as f64, ctx))
    }
}

pub fn register_builtins() {
    crate::register_functions!(WeekdayFn, WeeknumFn, NetworkdaysFn, WorkdayFn);
}
