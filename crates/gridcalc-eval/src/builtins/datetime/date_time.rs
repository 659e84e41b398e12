//! DATE and TIME

use gridcalc_common::{Calendar, ExcelError, LiteralValue, excel_to_native, formatted_to_excel};

use super::serial::{SECONDS_PER_DAY, date_result};
use crate::builtins::utils::coerce_to_int;
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

/// Two-digit and short years are offsets from 1900. The 1904 calendar has no
/// room for years 1900..=1903 or offsets below 4.
fn normalize_year(year: i64, calendar: Calendar) -> Result<i64, ExcelError> {
    let floor = match calendar {
        Calendar::Windows1900 => 0,
        Calendar::Mac1904 => 4,
    };
    if year < floor || year > 9999 {
        return Err(ExcelError::new_num().with_message(format!("year {year} out of range")));
    }
    if calendar == Calendar::Mac1904 && (1900..1904).contains(&year) {
        return Err(ExcelError::new_num().with_message(format!("year {year} precedes 1904")));
    }
    Ok(if year < 1900 { year + 1900 } else { year })
}

/// DATE(year, month, day). Months and days outside their range roll over
/// into neighbouring months and years.
#[derive(Debug)]
pub struct DateFn;

impl Function for DateFn {
    func_caps!(PURE | RETURNS_DATE);
    fn name(&self) -> &'static str {
        "DATE"
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
        let year = normalize_year(coerce_to_int(&args[0], ctx)?, calendar)?;
        let month = coerce_to_int(&args[1], ctx)?;
        let day = coerce_to_int(&args[2], ctx)?;

        let serial = formatted_to_excel(year, month, day, 0, 0, 0, calendar)
            .ok_or_else(|| ExcelError::new_num().with_message("date precedes the epoch"))?;
        // rolled past 9999-12-31
        if excel_to_native(serial, calendar).is_none() {
            return Err(ExcelError::new_num());
        }
        Ok(date_result(serial, ctx))
    }
}

/// TIME(hour, minute, second). Totals past a day wrap around.
#[derive(Debug)]
pub struct TimeFn;

impl Function for TimeFn {
    func_caps!(PURE | RETURNS_DATE);
    fn name(&self) -> &'static str {
        "TIME"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let hours = coerce_to_int(&args[0], ctx)?;
        let minutes = coerce_to_int(&args[1], ctx)?;
        let seconds = coerce_to_int(&args[2], ctx)?;
        let total = hours
            .checked_mul(3600)
            .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
            .and_then(|hm| hm.checked_add(seconds))
            .ok_or_else(ExcelError::new_num)?;
        if total < 0 {
            return Err(ExcelError::new_num().with_message("negative time"));
        }
        let fraction = (total % 86_400) as f64 / SECONDS_PER_DAY;
        Ok(date_result(fraction, ctx))
    }
}

pub fn register_builtins() {
    crate::register_functions!(DateFn, TimeFn);
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use gridcalc_common::{Calendar, ExcelError, LiteralValue};

    use crate::config::{EvalConfig, ReturnDateType};
    use crate::test_workbook::TestWorkbook;

    fn n(v: f64) -> LiteralValue {
        LiteralValue::Number(v)
    }

    fn with(config: impl FnOnce(EvalConfig) -> EvalConfig) -> TestWorkbook {
        let wb = TestWorkbook::new();
        let base = EvalConfig::default().with_locale(crate::locale::Locale::invariant());
        wb.with_config(config(base))
    }

    #[test]
    fn date_rolls_over_and_maps_short_years() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=DATE(2012,1,31)"), n(40939.0));
        assert_eq!(wb.eval("=DATE(2012,2,0)"), n(40939.0));
        assert_eq!(wb.eval("=DATE(2011,13,31)"), n(40939.0));
        assert_eq!(wb.eval("=DATE(112,1,31)"), n(40939.0));
        assert_eq!(wb.eval("=DATE(1900,2,29)"), n(60.0));
        assert_eq!(wb.eval("=DATE(1900,3,1)"), n(61.0));
        assert_eq!(wb.eval("=DATE(1900,1,0)"), n(0.0));
        assert_eq!(wb.eval("=DATE(1900,1,-1)"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(wb.eval("=DATE(-1,1,1)"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(wb.eval("=DATE(10000,1,1)"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(wb.eval("=DATE(9999,12,32)"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(wb.eval("=DATE(\"2012\",\"1\",31.9)"), n(40939.0));
        assert_eq!(wb.eval("=DATE(\"x\",1,1)"), LiteralValue::Error(ExcelError::new_value()));
    }

    #[test]
    fn date_on_the_1904_calendar() {
        let wb = with(|c| c.with_calendar(Calendar::Mac1904));
        assert_eq!(wb.eval("=DATE(1918,11,11)"), n(5428.0));
        assert_eq!(wb.eval("=DATE(1904,1,1)"), n(0.0));
        assert_eq!(wb.eval("=DATE(1901,1,31)"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(wb.eval("=DATE(3,1,1)"), LiteralValue::Error(ExcelError::new_num()));
        assert_eq!(wb.eval("=DATE(1903,12,31)"), LiteralValue::Error(ExcelError::new_num()));
    }

    #[test]
    fn date_honours_the_return_type() {
        let unix = with(|c| c.with_return_date_type(ReturnDateType::NumericSerial));
        assert_eq!(unix.eval("=DATE(2012,1,31)"), n(1_327_968_000.0));

        let native = with(|c| c.with_return_date_type(ReturnDateType::NativeDateObject));
        let expected = NaiveDate::from_ymd_opt(2012, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(native.eval("=DATE(2012,1,31)"), LiteralValue::DateTime(expected));
    }

    #[test]
    fn time_wraps_and_rejects_negative_totals() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=TIME(12,0,0)"), n(0.5));
        assert_eq!(wb.eval("=TIME(36,0,0)"), n(0.5));
        assert_eq!(wb.eval("=TIME(0,-30,3600)"), n(1800.0 / 86_400.0));
        assert_eq!(wb.eval("=TIME(0,0,-1)"), LiteralValue::Error(ExcelError::new_num()));

        let unix = with(|c| c.with_return_date_type(ReturnDateType::NumericSerial));
        assert_eq!(unix.eval("=TIME(7,30,20)"), n(27_020.0));
    }

    #[cfg(feature = "chrono-tz")]
    #[test]
    fn unix_results_follow_the_configured_timezone() {
        let in_zone = |name: &str| {
            with(|mut c| {
                assert!(c.set_timezone(name));
                c.with_return_date_type(ReturnDateType::NumericSerial)
            })
        };
        let new_york = in_zone("America/New_York");
        assert_eq!(new_york.eval("=DATE(2012,1,31)"), n(1_327_968_000.0 + 5.0 * 3600.0));
        // daylight saving: UTC-4 in July
        assert_eq!(new_york.eval("=DATE(2012,7,31)"), n(1_343_692_800.0 + 4.0 * 3600.0));
        assert_eq!(new_york.eval("=TIME(7,30,20)"), n(27_020.0));

        let tokyo = in_zone("Asia/Tokyo");
        assert_eq!(tokyo.eval("=DATE(2012,1,31)"), n(1_327_968_000.0 - 9.0 * 3600.0));

        // serial results ignore the zone
        let serial = with(|mut c| {
            assert!(c.set_timezone("Asia/Tokyo"));
            c
        });
        assert_eq!(serial.eval("=DATE(2012,1,31)"), n(40939.0));
    }
}
