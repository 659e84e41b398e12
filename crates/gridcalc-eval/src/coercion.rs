//! Value coercions and comparison rules shared by the interpreter and the
//! built-in functions.

use std::cmp::Ordering;

use gridcalc_common::{ExcelError, LiteralValue};

use crate::binder::parse_numeric_text;
use crate::config::{CompatibilityMode, EvalConfig};

/// NaN and infinities surface as `#NUM!`.
pub fn sanitize_numeric(n: f64) -> Result<f64, ExcelError> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(ExcelError::new_num())
    }
}

/// Arithmetic coercion: booleans are 0/1, blanks 0, numeric-looking text is
/// read with the configured locale, anything else is `#VALUE!`.
pub fn to_number_lenient(value: &LiteralValue, config: &EvalConfig) -> Result<f64, ExcelError> {
    match value {
        LiteralValue::Number(n) => Ok(*n),
        LiteralValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        LiteralValue::Empty => Ok(0.0),
        LiteralValue::DateTime(dt) => Ok(gridcalc_common::native_to_excel(dt, config.calendar)),
        LiteralValue::Text(s) => parse_numeric_text(s, config).ok_or_else(|| {
            ExcelError::new_value().with_message(format!("cannot convert {s:?} to a number"))
        }),
        LiteralValue::Error(e) => Err(e.clone()),
        LiteralValue::Array(_) => to_number_lenient(&value.first_scalar(), config),
    }
}

/// Text coercion used by `&` and the text functions. Numbers render in
/// General format with the configured decimal separator.
pub fn to_text(value: &LiteralValue, config: &EvalConfig) -> Result<String, ExcelError> {
    match value {
        LiteralValue::Text(s) => Ok(s.clone()),
        LiteralValue::Number(n) => Ok(config.locale.format_general(*n)),
        LiteralValue::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        LiteralValue::Empty => Ok(String::new()),
        LiteralValue::DateTime(dt) => Ok(config
            .locale
            .format_general(gridcalc_common::native_to_excel(dt, config.calendar))),
        LiteralValue::Error(e) => Err(e.clone()),
        LiteralValue::Array(_) => to_text(&value.first_scalar(), config),
    }
}

/// Renders a number the way a cell in General format shows it: integers
/// without a fractional part, everything else to 15 significant digits.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{n:.0}");
    }
    let rounded: f64 = format!("{n:.14e}").parse().unwrap_or(n);
    format!("{rounded}")
}

/// Condition coercion for `IF`, `NOT` and friends.
pub fn to_logical(value: &LiteralValue, config: &EvalConfig) -> Result<bool, ExcelError> {
    match value {
        LiteralValue::Boolean(b) => Ok(*b),
        LiteralValue::Number(n) => Ok(*n != 0.0),
        LiteralValue::Empty => Ok(false),
        LiteralValue::DateTime(_) => Ok(true),
        LiteralValue::Text(s) => {
            let t = s.trim();
            if t.eq_ignore_ascii_case("TRUE") {
                Ok(true)
            } else if t.eq_ignore_ascii_case("FALSE") {
                Ok(false)
            } else {
                Err(ExcelError::new_value()
                    .with_message(format!("cannot convert {s:?} to a logical value")))
            }
        }
        LiteralValue::Error(e) => Err(e.clone()),
        LiteralValue::Array(_) => to_logical(&value.first_scalar(), config),
    }
}

/// Relative tolerance applied when comparing numbers, so that
/// `0.1 + 0.2 = 0.3` holds as it does in a spreadsheet.
const EQ_EPSILON: f64 = 1e-15;

pub fn cmp_f64(a: f64, b: f64) -> Ordering {
    let scale = a.abs().max(b.abs());
    if (a - b).abs() <= EQ_EPSILON * scale {
        Ordering::Equal
    } else {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
}

/// Type ranks: numbers sort before text, text before booleans.
fn rank(v: &LiteralValue) -> u8 {
    match v {
        LiteralValue::Number(_) | LiteralValue::DateTime(_) | LiteralValue::Empty => 0,
        LiteralValue::Text(_) => 1,
        LiteralValue::Boolean(_) => 2,
        LiteralValue::Error(_) | LiteralValue::Array(_) => 3,
    }
}

/// Stand-in for a blank compared against `other`: 0, "" or FALSE.
fn blank_like(other: &LiteralValue) -> LiteralValue {
    match other {
        LiteralValue::Text(_) => LiteralValue::Text(String::new()),
        LiteralValue::Boolean(_) => LiteralValue::Boolean(false),
        _ => LiteralValue::Number(0.0),
    }
}

/// Ordering of two non-error scalars under the given compatibility mode.
pub fn compare_values(
    left: &LiteralValue,
    right: &LiteralValue,
    config: &EvalConfig,
) -> Ordering {
    let (left, right) = match (left, right) {
        (LiteralValue::Empty, LiteralValue::Empty) => return Ordering::Equal,
        (LiteralValue::Empty, r) => (blank_like(r), r.clone()),
        (l, LiteralValue::Empty) => (l.clone(), blank_like(l)),
        (l, r) => (l.first_scalar(), r.first_scalar()),
    };
    let number = |v: &LiteralValue| match v {
        LiteralValue::Number(n) => Some(*n),
        LiteralValue::DateTime(dt) => Some(gridcalc_common::native_to_excel(dt, config.calendar)),
        _ => None,
    };

    if config.compatibility == CompatibilityMode::OpenOffice {
        let as_number = |v: &LiteralValue| match v {
            LiteralValue::Text(s) => config.locale.parse_number(s),
            other => number(other),
        };
        let numeric_side = number(&left).is_some() || number(&right).is_some();
        if numeric_side && let (Some(a), Some(b)) = (as_number(&left), as_number(&right)) {
            return cmp_f64(a, b);
        }
        if let (LiteralValue::Text(a), LiteralValue::Text(b)) = (&left, &right) {
            return cmp_lowercase_first(a, b);
        }
    }

    match (&left, &right) {
        (LiteralValue::Text(a), LiteralValue::Text(b)) => {
            config.locale.fold_case(a).cmp(&config.locale.fold_case(b))
        }
        (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a.cmp(b),
        _ => match (number(&left), number(&right)) {
            (Some(a), Some(b)) => cmp_f64(a, b),
            _ => rank(&left).cmp(&rank(&right)),
        },
    }
}

/// Case-sensitive ordering in which a lower-case letter sorts before its
/// upper-case form and before every upper-case letter.
pub fn cmp_lowercase_first(a: &str, b: &str) -> Ordering {
    let swap = |c: char| {
        if c.is_lowercase() {
            c.to_uppercase().next().unwrap_or(c)
        } else if c.is_uppercase() {
            c.to_lowercase().next().unwrap_or(c)
        } else {
            c
        }
    };
    a.chars().map(swap).cmp(b.chars().map(swap))
}
