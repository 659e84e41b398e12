//! YEAR, MONTH, DAY, HOUR, MINUTE, SECOND

use gridcalc_common::{ExcelError, LiteralValue};

use super::serial::{coerce_serial, seconds_of_day, serial_to_ymd};
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext};

/// One function per component; `extract` maps the serial to the component.
macro_rules! date_part_fn {
    ($(#[$doc:meta])* $ty:ident, $name:literal, |$serial:ident, $ctx:ident| $extract:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $ty;

        impl Function for $ty {
            func_caps!(PURE | ELEMENTWISE);
            fn name(&self) -> &'static str {
                $name
            }
            fn min_args(&self) -> usize {
                1
            }
            fn eval_scalar<'a, 'b>(
                &self,
                args: &'a [ArgumentHandle<'a, 'b>],
                $ctx: &dyn FunctionContext,
            ) -> Result<LiteralValue, ExcelError> {
                let $serial = coerce_serial(&args[0], $ctx)?;
                let part: u32 = $extract;
                Ok(LiteralValue::Number(f64::from(part)))
            }
        }
    };
}

date_part_fn!(YearFn, "YEAR", |serial, ctx| {
    serial_to_ymd(serial, ctx.calendar())?.0 as u32
});
date_part_fn!(MonthFn, "MONTH", |serial, ctx| serial_to_ymd(serial, ctx.calendar())?.1);
date_part_fn!(
    /// Serial 0 on the 1900 calendar is day zero of January.
    DayFn, "DAY", |serial, ctx| serial_to_ymd(serial, ctx.calendar())?.2
);
date_part_fn!(HourFn, "HOUR", |serial, _ctx| seconds_of_day(serial) / 3600);
date_part_fn!(MinuteFn, "MINUTE", |serial, _ctx| seconds_of_day(serial) / 60 % 60);
date_part_fn!(SecondFn, "SECOND", |serial, _ctx| seconds_of_day(serial) % 60);

pub fn register_builtins() {
    crate::register_functions!(YearFn, MonthFn, DayFn, HourFn, MinuteFn, SecondFn);
}
