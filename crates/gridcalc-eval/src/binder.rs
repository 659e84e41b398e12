//! Turning raw user input into cell content.
//!
//! [`DefaultValueBinder`] only separates formulas, booleans, error codes and
//! plain numbers from text. [`AdvancedValueBinder`] also reads percentages,
//! currency amounts, fractions, dates and times, using the separators and
//! currency symbol of the configured [`Locale`](crate::locale::Locale).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use gridcalc_common::{Calendar, ExcelError, ExcelErrorKind, LiteralValue, native_to_excel};

use crate::config::EvalConfig;
use crate::locale::Locale;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    String,
    Formula,
    Numeric,
    Bool,
    Error,
}

/// Classify raw input without any locale-dependent interpretation.
pub fn data_type_for_value(text: &str) -> DataType {
    if text.is_empty() {
        return DataType::Null;
    }
    if text.len() > 1 && text.starts_with('=') {
        return DataType::Formula;
    }
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("TRUE") || trimmed.eq_ignore_ascii_case("FALSE") {
        return DataType::Bool;
    }
    if ExcelErrorKind::parse(trimmed).is_some() {
        return DataType::Error;
    }
    if is_plain_number(trimmed) {
        return DataType::Numeric;
    }
    DataType::String
}

fn is_plain_number(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-' | b'e' | b'E'))
        && s.bytes().any(|b| b.is_ascii_digit())
        && s.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Result of binding one piece of input.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundInput {
    Formula(String),
    Value(LiteralValue),
}

pub trait ValueBinder: Send + Sync {
    fn bind(&self, text: &str, config: &EvalConfig) -> BoundInput;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValueBinder;

impl ValueBinder for DefaultValueBinder {
    fn bind(&self, text: &str, _config: &EvalConfig) -> BoundInput {
        let trimmed = text.trim();
        let value = match data_type_for_value(text) {
            DataType::Null => LiteralValue::Empty,
            DataType::Formula => return BoundInput::Formula(text.to_string()),
            DataType::Bool => LiteralValue::Boolean(trimmed.eq_ignore_ascii_case("TRUE")),
            DataType::Error => match ExcelErrorKind::parse(trimmed) {
                Some(kind) => LiteralValue::Error(ExcelError::new(kind)),
                None => LiteralValue::Text(text.to_string()),
            },
            DataType::Numeric => match trimmed.parse::<f64>() {
                Ok(n) => LiteralValue::Number(n),
                Err(_) => LiteralValue::Text(text.to_string()),
            },
            DataType::String => LiteralValue::Text(text.to_string()),
        };
        BoundInput::Value(value)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AdvancedValueBinder;

impl ValueBinder for AdvancedValueBinder {
    fn bind(&self, text: &str, config: &EvalConfig) -> BoundInput {
        match DefaultValueBinder.bind(text, config) {
            BoundInput::Value(LiteralValue::Text(s)) => BoundInput::Value(
                parse_numeric_text(&s, config)
                    .map(LiteralValue::Number)
                    .unwrap_or(LiteralValue::Text(s)),
            ),
            other => other,
        }
    }
}

/// Read text the way a spreadsheet does when it needs a number: plain
/// numbers in the configured locale, then percentages, currency amounts,
/// fractions, dates and times.
pub fn parse_numeric_text(text: &str, config: &EvalConfig) -> Option<f64> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    let locale = &config.locale;
    parse_amount(s, locale)
        .or_else(|| parse_fraction(s))
        .or_else(|| parse_date_text(s, config.calendar))
        .or_else(|| parse_time_text(s))
}

/// Number, percentage or currency amount.
fn parse_amount(s: &str, locale: &Locale) -> Option<f64> {
    if let Some(n) = locale.parse_number(s) {
        return Some(n);
    }
    if let Some(inner) = s.strip_suffix('%') {
        return parse_amount(inner.trim_end(), locale).map(|n| n / 100.0);
    }
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s.strip_prefix('+').unwrap_or(s).trim_start()),
    };
    let symbol = locale.currency_symbol.as_str();
    if symbol.is_empty() {
        return None;
    }
    let unsigned = body
        .strip_prefix(symbol)
        .or_else(|| body.strip_suffix(symbol))?
        .trim();
    let n = locale.parse_number(unsigned)?;
    if unsigned.starts_with(['-', '+']) {
        return None;
    }
    Some(if negative { -n } else { n })
}

/// `1/2`, `-3/4` or the mixed form `1 1/2`.
fn parse_fraction(s: &str) -> Option<f64> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, frac) = match body.rsplit_once(' ') {
        Some((whole, frac)) => (Some(whole.trim()), frac.trim()),
        None => (None, body),
    };
    let (num, den) = frac.split_once('/')?;
    let digits = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit());
    if !digits(num.trim()) || !digits(den.trim()) {
        return None;
    }
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    let mut value = num.trim().parse::<f64>().ok()? / den;
    if let Some(whole) = whole {
        if !digits(whole) {
            return None;
        }
        value += whole.parse::<f64>().ok()?;
    }
    Some(if negative { -value } else { value })
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

/// Serial for a date written in one of the recognised layouts, optionally
/// followed by a time of day.
pub fn parse_date_text(s: &str, calendar: Calendar) -> Option<f64> {
    let s = s.trim();
    let date_only = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN));
    let parsed = date_only.or_else(|| {
        // date followed by a time: split at the first space that leaves a
        // parseable time on the right
        s.char_indices()
            .filter(|(_, c)| *c == ' ')
            .find_map(|(i, _)| {
                let (date, time) = (&s[..i], s[i + 1..].trim());
                let date = DATE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(date.trim(), fmt).ok())?;
                let fraction = parse_time_text(time)?;
                if fraction >= 1.0 {
                    return None;
                }
                let secs = (fraction * 86_400.0).round() as u32;
                Some(NaiveDateTime::new(
                    date,
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?,
                ))
            })
    })?;
    let serial = native_to_excel(&parsed, calendar);
    (serial >= 0.0).then_some(serial)
}

/// Fraction of a day for `h:mm`, `h:mm:ss`, optionally with `AM`/`PM`.
/// Hours past 24 are allowed without a meridiem and produce values ≥ 1.
pub fn parse_time_text(s: &str) -> Option<f64> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else {
        (upper.as_str(), None)
    };
    let mut parts = clock.split(':');
    let component = |p: Option<&str>| -> Option<u32> {
        let p = p?.trim();
        if p.is_empty() || p.len() > 4 || !p.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        p.parse().ok()
    };
    let hours = component(parts.next())?;
    let minutes = component(parts.next())?;
    let seconds = match parts.next() {
        Some(p) => component(Some(p))?,
        None => 0,
    };
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    let hours = match meridiem {
        Some(pm) => {
            if hours == 0 || hours > 12 {
                return None;
            }
            (hours % 12) + if pm { 12 } else { 0 }
        }
        None => hours,
    };
    Some(f64::from(hours * 3600 + minutes * 60 + seconds) / 86_400.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EvalConfig {
        EvalConfig::default().with_locale(Locale::invariant())
    }

    fn bind(text: &str, config: &EvalConfig) -> BoundInput {
        AdvancedValueBinder.bind(text, config)
    }

    fn num(n: f64) -> BoundInput {
        BoundInput::Value(LiteralValue::Number(n))
    }

    #[test]
    fn data_types() {
        assert_eq!(data_type_for_value(""), DataType::Null);
        assert_eq!(data_type_for_value("=A1+1"), DataType::Formula);
        assert_eq!(data_type_for_value("="), DataType::String);
        assert_eq!(data_type_for_value("true"), DataType::Bool);
        assert_eq!(data_type_for_value("#REF!"), DataType::Error);
        assert_eq!(data_type_for_value("-12.5e2"), DataType::Numeric);
        assert_eq!(data_type_for_value("NaN"), DataType::String);
        assert_eq!(data_type_for_value("10%"), DataType::String);
    }

    #[test]
    fn default_binder_keeps_rich_text_as_text() {
        assert_eq!(
            DefaultValueBinder.bind("10%", &cfg()),
            BoundInput::Value(LiteralValue::Text("10%".into()))
        );
        assert_eq!(
            DefaultValueBinder.bind("=SUM(A1:A3)", &cfg()),
            BoundInput::Formula("=SUM(A1:A3)".into())
        );
    }

    #[test]
    fn advanced_binder_reads_percent_currency_and_fractions() {
        let c = cfg();
        assert_eq!(bind("10%", &c), num(0.1));
        assert_eq!(bind("$1,010.12", &c), num(1010.12));
        assert_eq!(bind("-$5", &c), num(-5.0));
        assert_eq!(bind("1 1/2", &c), num(1.5));
        assert_eq!(bind("3/4", &c), num(0.75));
        assert_eq!(
            bind("1/0", &c),
            BoundInput::Value(LiteralValue::Text("1/0".into()))
        );

        let euro = EvalConfig::default().with_locale(
            Locale::invariant()
                .with_decimal_separator(',')
                .with_thousands_separator('.')
                .with_currency_symbol("€"),
        );
        assert_eq!(bind("€ 2.020,20", &euro), num(2020.2));
    }

    #[test]
    fn advanced_binder_reads_dates_and_times() {
        let c = cfg();
        assert_eq!(bind("2012-01-31", &c), num(40939.0));
        assert_eq!(bind("31-Jan-2012", &c), num(40939.0));
        assert_eq!(bind("7:30", &c), num(0.3125));
        let BoundInput::Value(LiteralValue::Number(n)) = bind("2012-01-31 12:00", &c) else {
            panic!("expected a number");
        };
        assert!((n - 40939.5).abs() < 1e-9);
        assert_eq!(bind("12:00 AM", &c), num(0.0));
        assert_eq!(
            bind("13:00 PM", &c),
            BoundInput::Value(LiteralValue::Text("13:00 PM".into()))
        );
    }
}
