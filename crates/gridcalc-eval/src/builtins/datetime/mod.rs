//! Date and time functions
//! Functions implemented: DATE, TIME, DATEVALUE, TIMEVALUE, YEAR, MONTH, DAY,
//! HOUR, MINUTE, SECOND, WEEKDAY, WEEKNUM, EDATE, EOMONTH, DATEDIF, DAYS360,
//! YEARFRAC, NETWORKDAYS, WORKDAY

mod date_parts;
mod date_time;
mod date_value;
mod day_count;
mod edate_eomonth;
mod serial;
mod weekday_workday;

pub use date_parts::*;
pub use date_time::*;
pub use date_value::*;
pub use day_count::*;
pub use edate_eomonth::*;
pub use serial::*;
pub use weekday_workday::*;

pub fn register_builtins() {
    date_time::register_builtins();
    date_parts::register_builtins();
    date_value::register_builtins();
    edate_eomonth::register_builtins();
    day_count::register_builtins();
    weekday_workday::register_builtins();
}
