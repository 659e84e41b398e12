/* ───────────────────── Serial date utilities ─────────────────────────
Windows1900:
  Serial 0  = 1899-12-31 (time-only values anchor here)
  Serial 1  = 1900-01-01
  Serial 59 = 1900-02-28
  Serial 60 = 1900-02-29  (phantom, mapped to 1900-02-28 natively)
  Serial 61 = 1900-03-01
Mac1904:
  Serial 0  = 1904-01-01, no phantom day.
The fractional part is the time of day. Serials carry no timezone; the
`*_in` conversions read them as wall-clock time in a given zone.
------------------------------------------------------------------- */

use std::{fmt, str::FromStr};

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone, Timelike,
};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const WINDOWS_EPOCH: NaiveDate = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
const MAC_EPOCH: NaiveDate = NaiveDate::from_ymd_opt(1904, 1, 1).unwrap();
const FIRST_REAL_MARCH_1900: NaiveDate = NaiveDate::from_ymd_opt(1900, 3, 1).unwrap();

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Unix epoch (1970-01-01) expressed as a serial.
const UNIX_EPOCH_SERIAL_1900: f64 = 25_569.0;
const UNIX_EPOCH_SERIAL_1904: f64 = 24_107.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Calendar {
    #[default]
    Windows1900,
    Mac1904,
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Windows1900 => write!(f, "1900"),
            Calendar::Mac1904 => write!(f, "1904"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown calendar `{0}` (expected 1900, 1904, Windows1900 or Mac1904)")]
pub struct CalendarParseError(pub String);

impl FromStr for Calendar {
    type Err = CalendarParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1900" | "windows1900" => Ok(Calendar::Windows1900),
            "1904" | "mac1904" => Ok(Calendar::Mac1904),
            _ => Err(CalendarParseError(s.to_string())),
        }
    }
}

impl Calendar {
    pub fn epoch(self) -> NaiveDate {
        match self {
            Calendar::Windows1900 => WINDOWS_EPOCH,
            Calendar::Mac1904 => MAC_EPOCH,
        }
    }

    /// Serial of 9999-12-31, the last representable day.
    pub fn last_serial(self) -> f64 {
        match self {
            Calendar::Windows1900 => 2_958_465.0,
            Calendar::Mac1904 => 2_957_003.0,
        }
    }
}

/// Serial → calendar date-time. `None` for negative, non-finite, or
/// post-9999 serials.
pub fn excel_to_native(serial: f64, calendar: Calendar) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut days = serial.trunc() as i64;
    let mut secs = ((serial - serial.trunc()) * SECONDS_PER_DAY).round() as i64;
    if secs >= 86_400 {
        days += 1;
        secs -= 86_400;
    }

    let date = match calendar {
        Calendar::Windows1900 if days == 60 => NaiveDate::from_ymd_opt(1900, 2, 28)?,
        Calendar::Windows1900 => {
            let offset = if days < 60 { days } else { days - 1 };
            WINDOWS_EPOCH.checked_add_signed(TimeDelta::try_days(offset)?)?
        }
        Calendar::Mac1904 => MAC_EPOCH.checked_add_signed(TimeDelta::try_days(days)?)?,
    };
    if date.year() > 9999 {
        return None;
    }
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    Some(date.and_time(time))
}

/// Calendar date-time → serial. Dates before the epoch give negative serials.
pub fn native_to_excel(dt: &NaiveDateTime, calendar: Calendar) -> f64 {
    let date = dt.date();
    let days = match calendar {
        Calendar::Windows1900 => {
            let days = (date - WINDOWS_EPOCH).num_days();
            if date >= FIRST_REAL_MARCH_1900 {
                days + 1
            } else {
                days
            }
        }
        Calendar::Mac1904 => (date - MAC_EPOCH).num_days(),
    };
    let secs = dt.time().num_seconds_from_midnight() as f64
        + dt.time().nanosecond() as f64 / 1_000_000_000.0;
    days as f64 + secs / SECONDS_PER_DAY
}

/// Serial → Unix seconds. Serials below 1 are times of day and map to
/// seconds since midnight.
pub fn excel_to_unix(serial: f64, calendar: Calendar) -> i64 {
    if serial < 1.0 {
        return (serial * SECONDS_PER_DAY).round() as i64;
    }
    let base = match calendar {
        // Before the phantom day the offset is one smaller.
        Calendar::Windows1900 if serial < 60.0 => UNIX_EPOCH_SERIAL_1900 - 1.0,
        Calendar::Windows1900 => UNIX_EPOCH_SERIAL_1900,
        Calendar::Mac1904 => UNIX_EPOCH_SERIAL_1904,
    };
    ((serial - base) * SECONDS_PER_DAY).round() as i64
}

/// Unix seconds → serial.
pub fn unix_to_excel(timestamp: i64, calendar: Calendar) -> f64 {
    let days = timestamp as f64 / SECONDS_PER_DAY;
    match calendar {
        Calendar::Windows1900 => {
            let serial = days + UNIX_EPOCH_SERIAL_1900;
            if serial < 61.0 { serial - 1.0 } else { serial }
        }
        Calendar::Mac1904 => days + UNIX_EPOCH_SERIAL_1904,
    }
}

/// Serial → Unix seconds, reading the serial as wall-clock time in `zone`.
/// Times of day (serials below 1) are durations and are not shifted. A wall
/// time skipped by a daylight-saving change is read with the offset in force
/// just before it.
pub fn excel_to_unix_in<Z: TimeZone>(serial: f64, calendar: Calendar, zone: &Z) -> i64 {
    let wall = excel_to_unix(serial, calendar);
    if serial < 1.0 {
        return wall;
    }
    let Some(naive) = DateTime::from_timestamp(wall, 0).map(|dt| dt.naive_utc()) else {
        return wall;
    };
    match zone.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.timestamp(),
        None => {
            let offset = zone.offset_from_utc_datetime(&naive).fix().local_minus_utc();
            wall - i64::from(offset)
        }
    }
}

/// Unix seconds → serial of the wall-clock time in `zone` at that instant.
pub fn unix_to_excel_in<Z: TimeZone>(timestamp: i64, calendar: Calendar, zone: &Z) -> f64 {
    let offset = DateTime::from_timestamp(timestamp, 0).map_or(0, |utc| {
        zone.offset_from_utc_datetime(&utc.naive_utc())
            .fix()
            .local_minus_utc()
    });
    unix_to_excel(timestamp + i64::from(offset), calendar)
}

/// First-of-month arithmetic with overflow: month 13 is January of the next
/// year, day 0 is the last day of the previous month.
pub fn ymd_rollover(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    let m0 = month - 1;
    let y = year.checked_add(m0.div_euclid(12))?;
    let m = (m0.rem_euclid(12) + 1) as u32;
    let first = NaiveDate::from_ymd_opt(i32::try_from(y).ok()?, m, 1)?;
    first.checked_add_signed(TimeDelta::try_days(day.checked_sub(1)?)?)
}

/// Date and time components → serial, rolling over out-of-range months and
/// days. `None` when the result precedes the calendar's epoch.
pub fn formatted_to_excel(
    year: i64,
    month: i64,
    day: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    calendar: Calendar,
) -> Option<f64> {
    let time = (hours * 3600 + minutes * 60 + seconds) as f64 / SECONDS_PER_DAY;
    if calendar == Calendar::Windows1900 && (year, month, day) == (1900, 2, 29) {
        return Some(60.0 + time);
    }
    let date = ymd_rollover(year, month, day)?;
    let days = native_to_excel(&date.and_time(NaiveTime::MIN), calendar);
    if days < 0.0 {
        return None;
    }
    Some(days + time)
}

/// Whether a number-format mask renders its value as a date or time.
///
/// Quoted literals, `\x` escapes and `_x`/`*x` padding are skipped. Brackets
/// are colour, locale or condition markers except the elapsed-time forms
/// `[h]`, `[mm]`, `[ss]`. An `m` is ambiguous (month/minute vs nothing) and
/// only counts next to another date/time token or when the mask has no digit
/// placeholders at all.
pub fn is_date_time_format_code(code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() || code.eq_ignore_ascii_case("general") || code == "@" {
        return false;
    }

    let is_anchor = |c: char| matches!(c, 'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S');
    let mut in_quotes = false;
    let mut prev: Option<char> = None;
    let mut saw_m = false;
    let mut saw_digit_placeholder = false;
    let mut chars = code.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                in_quotes = false;
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            '\\' | '_' | '*' => {
                let _ = chars.next();
            }
            '[' => {
                let mut content = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    content.push(c);
                }
                let elapsed = ["h", "hh", "m", "mm", "s", "ss"];
                if elapsed.iter().any(|e| content.eq_ignore_ascii_case(e)) {
                    return true;
                }
            }
            '0' | '#' | '?' => saw_digit_placeholder = true,
            c if is_anchor(c) => return true,
            'm' | 'M' => {
                saw_m = true;
                let near_anchor = prev.is_some_and(is_anchor)
                    || chars.peek().copied().is_some_and(is_anchor)
                    || prev == Some(':')
                    || chars.peek() == Some(&':');
                if near_anchor {
                    return true;
                }
            }
            'a' | 'A' => {
                let rest: String = chars.clone().take(4).collect();
                let probe = format!("{ch}{rest}");
                let is_marker = |m: &str| {
                    probe
                        .get(..m.len())
                        .is_some_and(|p| p.eq_ignore_ascii_case(m))
                };
                if is_marker("am/pm") || is_marker("a/p") {
                    return true;
                }
            }
            _ => {}
        }
        prev = Some(ch);
    }

    saw_m && !saw_digit_placeholder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn windows_1900_landmarks() {
        let cal = Calendar::Windows1900;
        assert_eq!(excel_to_native(1.0, cal), Some(dt(1900, 1, 1, 0, 0, 0)));
        assert_eq!(excel_to_native(59.0, cal), Some(dt(1900, 2, 28, 0, 0, 0)));
        assert_eq!(excel_to_native(60.0, cal), Some(dt(1900, 2, 28, 0, 0, 0)));
        assert_eq!(excel_to_native(61.0, cal), Some(dt(1900, 3, 1, 0, 0, 0)));
        assert_eq!(excel_to_native(0.5, cal), Some(dt(1899, 12, 31, 12, 0, 0)));
        assert_eq!(native_to_excel(&dt(2012, 1, 31, 0, 0, 0), cal), 40939.0);
        assert_eq!(native_to_excel(&dt(9999, 12, 31, 0, 0, 0), cal), 2_958_465.0);
        assert_eq!(excel_to_native(2_958_466.0, cal), None);
        assert_eq!(excel_to_native(-1.0, cal), None);
        assert!(excel_to_native(cal.last_serial() + 0.5, cal).is_some());
    }

    #[test]
    fn mac_1904_landmarks() {
        let cal = Calendar::Mac1904;
        assert_eq!(excel_to_native(0.0, cal), Some(dt(1904, 1, 1, 0, 0, 0)));
        assert_eq!(native_to_excel(&dt(1918, 11, 11, 0, 0, 0), cal), 5428.0);
        assert!(native_to_excel(&dt(1901, 1, 31, 0, 0, 0), cal) < 0.0);
        assert_eq!(native_to_excel(&dt(9999, 12, 31, 0, 0, 0), cal), cal.last_serial());
    }

    #[test]
    fn time_fraction_carries_to_next_day() {
        let cal = Calendar::Windows1900;
        let almost = 100.0 + 86_399.9 / 86_400.0;
        assert_eq!(excel_to_native(almost, cal), Some(dt(1900, 4, 10, 0, 0, 0)));
    }

    #[test]
    fn unix_conversions() {
        let cal = Calendar::Windows1900;
        assert_eq!(excel_to_unix(40939.0, cal), 1_327_968_000);
        assert_eq!(excel_to_unix(25569.0, cal), 0);
        assert_eq!(excel_to_unix(27020.0 / 86_400.0, cal), 27020);
        assert_eq!(excel_to_unix(24107.0, Calendar::Mac1904), 0);
        assert_eq!(unix_to_excel(1_327_968_000, cal), 40939.0);
        assert_eq!(unix_to_excel(0, Calendar::Mac1904), 24107.0);
        let feb28 = excel_to_unix(59.0, cal);
        assert_eq!(unix_to_excel(feb28, cal), 59.0);
    }

    #[test]
    fn zoned_unix_conversions() {
        use chrono::FixedOffset;

        let cal = Calendar::Windows1900;
        let utc = chrono::Utc;
        assert_eq!(excel_to_unix_in(40939.0, cal, &utc), 1_327_968_000);
        assert_eq!(unix_to_excel_in(1_327_968_000, cal, &utc), 40939.0);

        // midnight five hours behind UTC is 05:00 UTC
        let behind = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(excel_to_unix_in(40939.0, cal, &behind), 1_327_968_000 + 18_000);
        assert_eq!(unix_to_excel_in(1_327_968_000 + 18_000, cal, &behind), 40939.0);

        let ahead = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(excel_to_unix_in(40939.5, cal, &ahead), 1_327_968_000 + 43_200 - 32_400);
        // a bare time of day is not shifted
        assert_eq!(excel_to_unix_in(0.25, cal, &ahead), 21_600);
    }

    #[test]
    fn formatted_components() {
        let cal = Calendar::Windows1900;
        assert_eq!(formatted_to_excel(2012, 1, 31, 0, 0, 0, cal), Some(40939.0));
        assert_eq!(formatted_to_excel(2011, 13, 31, 0, 0, 0, cal), Some(40939.0));
        assert_eq!(formatted_to_excel(2012, 2, 0, 0, 0, 0, cal), Some(40939.0));
        assert_eq!(formatted_to_excel(1900, 2, 29, 0, 0, 0, cal), Some(60.0));
        assert_eq!(formatted_to_excel(1900, 1, 0, 0, 0, 0, cal), Some(0.0));
        assert_eq!(formatted_to_excel(1899, 12, 30, 0, 0, 0, cal), None);
        assert_eq!(
            formatted_to_excel(1901, 1, 31, 0, 0, 0, Calendar::Mac1904),
            None
        );
        let with_time = formatted_to_excel(2012, 1, 31, 12, 0, 0, cal).unwrap();
        assert!((with_time - 40939.5).abs() < 1e-12);
    }

    #[test]
    fn calendar_names() {
        assert_eq!("1904".parse::<Calendar>(), Ok(Calendar::Mac1904));
        assert_eq!("windows1900".parse::<Calendar>(), Ok(Calendar::Windows1900));
        assert!("1901".parse::<Calendar>().is_err());
        assert_eq!(Calendar::Mac1904.to_string(), "1904");
    }

    #[test]
    fn format_code_classification() {
        for code in [
            "General", "@", "0", "0.00", "#,##0.00", "0%", "0.00E+00", "[Red]#,##0",
            "\"Days\" 0", "[$EUR ]#,##0.00", "#,##0_);(#,##0)",
        ] {
            assert!(!is_date_time_format_code(code), "{code} is not a date");
        }
        for code in [
            "mm/dd/yyyy", "d-mmm-yy", "h:mm AM/PM", "[h]:mm:ss", "mm:ss", "yyyy", "mmm",
            "[$-409]d-mmm-yy", "hh:mm a/p", "[mm]",
        ] {
            assert!(is_date_time_format_code(code), "{code} is a date");
        }
    }
}
