//! Serial-number helpers shared by the date and time functions.

use chrono::{Datelike, NaiveDate, NaiveTime};
use gridcalc_common::{
    Calendar, ExcelError, LiteralValue, excel_to_native, native_to_excel,
};

use crate::builtins::utils::{coerce_num, scalar};
use crate::config::ReturnDateType;
use crate::traits::{ArgumentHandle, FunctionContext};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Present a computed serial the way the configuration asks for. Unix
/// timestamps read the serial as wall-clock time in the configured zone.
pub fn date_result(serial: f64, ctx: &dyn FunctionContext) -> LiteralValue {
    let calendar = ctx.calendar();
    match ctx.return_date_type() {
        ReturnDateType::ExcelSerial => LiteralValue::Number(serial),
        ReturnDateType::NumericSerial => {
            LiteralValue::Number(ctx.config().timezone.serial_to_unix(serial, calendar) as f64)
        }
        ReturnDateType::NativeDateObject => excel_to_native(serial, calendar)
            .map(LiteralValue::DateTime)
            .unwrap_or(LiteralValue::Number(serial)),
    }
}

/// A date argument as a serial. Numbers pass through, dates convert under the
/// active calendar, text is read as a date, time or number. Serials before
/// the epoch or past 9999-12-31 are `#NUM!`.
pub fn coerce_serial(arg: &ArgumentHandle, ctx: &dyn FunctionContext) -> Result<f64, ExcelError> {
    let serial = match scalar(arg)? {
        LiteralValue::DateTime(dt) => native_to_excel(&dt, ctx.calendar()),
        LiteralValue::Boolean(_) => return Err(ExcelError::new_value()),
        _ => coerce_num(arg, ctx)?,
    };
    if serial < 0.0 {
        return Err(ExcelError::new_num().with_message("negative date serial"));
    }
    if !serial.is_finite() || serial >= ctx.calendar().last_serial() + 1.0 {
        return Err(ExcelError::new_num().with_message("date serial past 9999-12-31"));
    }
    Ok(serial)
}

/// Calendar date of a serial; the time of day is dropped. Serial 60 on the
/// 1900 calendar comes back as 1900-02-28.
pub fn serial_to_date(serial: f64, calendar: Calendar) -> Result<NaiveDate, ExcelError> {
    excel_to_native(serial.floor(), calendar)
        .map(|dt| dt.date())
        .ok_or_else(ExcelError::new_num)
}

pub fn date_to_serial(date: NaiveDate, calendar: Calendar) -> f64 {
    native_to_excel(&date.and_time(NaiveTime::MIN), calendar)
}

/// `(year, month, day)` as the 1900 calendar reports them, including the
/// day-zero `1900-01-00` and the phantom `1900-02-29`.
pub fn serial_to_ymd(serial: f64, calendar: Calendar) -> Result<(i32, u32, u32), ExcelError> {
    let days = serial.floor();
    if calendar == Calendar::Windows1900 {
        if days == 0.0 {
            return Ok((1900, 1, 0));
        }
        if days == 60.0 {
            return Ok((1900, 2, 29));
        }
    }
    let date = serial_to_date(days, calendar)?;
    Ok((date.year(), date.month(), date.day()))
}

/// Day of the week of a serial, 0 = Sunday. Computed on the serial itself so
/// the early 1900 serials agree with the phantom leap day.
pub fn day_of_week(serial: f64, calendar: Calendar) -> u32 {
    let days = serial.floor() as i64;
    let offset = match calendar {
        // serial 1 was reported as a Sunday
        Calendar::Windows1900 => 6,
        // 1904-01-01 was a Friday
        Calendar::Mac1904 => 5,
    };
    ((days.rem_euclid(7) + offset) % 7) as u32
}

pub fn is_weekend(serial: f64, calendar: Calendar) -> bool {
    matches!(day_of_week(serial, calendar), 0 | 6)
}

/// Seconds past midnight of a serial, rounded to the nearest second.
pub fn seconds_of_day(serial: f64) -> u32 {
    let secs = ((serial - serial.floor()) * SECONDS_PER_DAY).round() as u32;
    secs % 86_400
}

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map_or(31, |d| d.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_follows_the_serial() {
        // 2012-01-31 was a Tuesday
        assert_eq!(day_of_week(40939.0, Calendar::Windows1900), 2);
        assert_eq!(day_of_week(1.0, Calendar::Windows1900), 0);
        // 1918-11-11 was a Monday
        assert_eq!(day_of_week(5428.0, Calendar::Mac1904), 1);
        assert!(is_weekend(40944.0, Calendar::Windows1900));
    }

    #[test]
    fn ymd_quirks_of_the_1900_calendar() {
        assert_eq!(serial_to_ymd(0.0, Calendar::Windows1900).unwrap(), (1900, 1, 0));
        assert_eq!(serial_to_ymd(60.0, Calendar::Windows1900).unwrap(), (1900, 2, 29));
        assert_eq!(serial_to_ymd(61.5, Calendar::Windows1900).unwrap(), (1900, 3, 1));
        assert_eq!(serial_to_ymd(0.0, Calendar::Mac1904).unwrap(), (1904, 1, 1));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(last_day_of_month(2012, 2), 29);
        assert_eq!(last_day_of_month(2011, 2), 28);
        assert_eq!(last_day_of_month(2011, 12), 31);
        assert!(!is_leap_year(1900));
    }
}
