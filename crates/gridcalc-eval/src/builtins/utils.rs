use gridcalc_common::{ExcelError, LiteralValue};

use crate::coercion::{to_logical, to_number_lenient, to_text};
use crate::traits::{ArgumentHandle, EvaluatedArg, FunctionContext, Range};

/// Evaluate an argument down to one scalar. Errors become `Err`; an array
/// contributes its top-left element.
pub fn scalar(arg: &ArgumentHandle) -> Result<LiteralValue, ExcelError> {
    let v = arg.value()?;
    match v.as_ref() {
        LiteralValue::Error(e) => Err(e.clone()),
        LiteralValue::Array(_) => match v.first_scalar() {
            LiteralValue::Error(e) => Err(e),
            other => Ok(other),
        },
        _ => Ok(v.into_owned()),
    }
}

pub fn coerce_num(arg: &ArgumentHandle, ctx: &dyn FunctionContext) -> Result<f64, ExcelError> {
    to_number_lenient(&scalar(arg)?, ctx.config())
}

pub fn coerce_text(arg: &ArgumentHandle, ctx: &dyn FunctionContext) -> Result<String, ExcelError> {
    to_text(&scalar(arg)?, ctx.config())
}

pub fn coerce_bool(arg: &ArgumentHandle, ctx: &dyn FunctionContext) -> Result<bool, ExcelError> {
    to_logical(&scalar(arg)?, ctx.config())
}

/// Numeric argument truncated toward zero.
pub fn coerce_to_int(arg: &ArgumentHandle, ctx: &dyn FunctionContext) -> Result<i64, ExcelError> {
    let n = coerce_num(arg, ctx)?;
    if n.abs() >= i64::MAX as f64 {
        return Err(ExcelError::new_num());
    }
    Ok(n.trunc() as i64)
}

/// Optional numeric argument; an omitted or empty argument takes `default`.
pub fn opt_num(
    args: &[ArgumentHandle],
    idx: usize,
    default: f64,
    ctx: &dyn FunctionContext,
) -> Result<f64, ExcelError> {
    match args.get(idx) {
        Some(arg) if !is_omitted(arg)? => coerce_num(arg, ctx),
        _ => Ok(default),
    }
}

/// Optional logical argument; an omitted or empty argument takes `default`.
pub fn opt_bool(
    args: &[ArgumentHandle],
    idx: usize,
    default: bool,
    ctx: &dyn FunctionContext,
) -> Result<bool, ExcelError> {
    match args.get(idx) {
        Some(arg) if !is_omitted(arg)? => coerce_bool(arg, ctx),
        _ => Ok(default),
    }
}

/// `IF(A1,,1)`: an empty argument slot.
fn is_omitted(arg: &ArgumentHandle) -> Result<bool, ExcelError> {
    Ok(matches!(
        &arg.ast().node_type,
        gridcalc_parse::ASTNodeType::Literal(LiteralValue::Empty)
    ))
}

/// Round half away from zero to `digits` decimal places (negative digits
/// round to the left of the decimal point). A number with no digit past
/// `digits` within its 15 significant digits comes back unchanged.
pub fn round_to_precision(n: f64, digits: i32) -> f64 {
    if n == 0.0 || !n.is_finite() {
        return n;
    }
    let magnitude = n.abs().log10().floor() as i32;
    if digits >= 0 && magnitude.saturating_add(digits) >= 15 {
        return n;
    }
    let factor = 10f64.powi(digits.abs());
    let scaled = if digits >= 0 { n * factor } else { n / factor };
    // 2.675 * 100 is 267.49999999999997; round at 15 significant digits first
    let scaled: f64 = format!("{scaled:.14e}").parse().unwrap_or(scaled);
    if digits >= 0 {
        scaled.round() / factor
    } else {
        scaled.round() * factor
    }
}

/// How a reducing function treats the values it is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberPolicy {
    /// `SUM`, `AVERAGE`, `MIN`, `MAX`, `PRODUCT`: direct arguments are
    /// coerced (bad text is `#VALUE!`), values inside ranges count only when
    /// numeric, errors anywhere propagate.
    Strict,
    /// `COUNT`: nothing errors, only numbers (and numeric-looking direct
    /// arguments) are kept.
    Lenient,
}

/// Flatten the arguments of a numeric reducer into the numbers it acts on.
pub fn collect_numbers(
    args: &[ArgumentHandle],
    ctx: &dyn FunctionContext,
    policy: NumberPolicy,
) -> Result<Vec<f64>, ExcelError> {
    let mut out = Vec::new();
    for arg in args {
        match arg.value_or_range() {
            Ok(EvaluatedArg::Range(range)) => {
                for cell in range.iter_cells() {
                    match cell {
                        LiteralValue::Number(n) => out.push(n),
                        LiteralValue::DateTime(dt) => {
                            out.push(gridcalc_common::native_to_excel(&dt, ctx.calendar()))
                        }
                        LiteralValue::Error(e) if policy == NumberPolicy::Strict => {
                            return Err(e);
                        }
                        _ => {}
                    }
                }
            }
            Ok(EvaluatedArg::LiteralValue(v)) => match (v.as_ref(), policy) {
                (LiteralValue::Error(e), NumberPolicy::Strict) => return Err(e.clone()),
                (LiteralValue::Error(_), NumberPolicy::Lenient) => {}
                (other, NumberPolicy::Strict) => out.push(to_number_lenient(other, ctx.config())?),
                (other, NumberPolicy::Lenient) => {
                    if let Ok(n) = to_number_lenient(other, ctx.config()) {
                        if !matches!(other, LiteralValue::Empty) {
                            out.push(n);
                        }
                    }
                }
            },
            Err(e) if policy == NumberPolicy::Strict => return Err(e),
            Err(_) => {}
        }
    }
    Ok(out)
}

/// Every value an argument stands for, row-major for ranges.
pub fn flatten_values(arg: &ArgumentHandle) -> Result<Vec<LiteralValue>, ExcelError> {
    Ok(match arg.value_or_range()? {
        EvaluatedArg::Range(range) => range.iter_cells().collect(),
        EvaluatedArg::LiteralValue(v) => vec![v.into_owned()],
    })
}

#[cfg(test)]
mod tests {
    use super::round_to_precision;

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to_precision(2.5, 0), 3.0);
        assert_eq!(round_to_precision(-2.5, 0), -3.0);
        assert_eq!(round_to_precision(2.675, 2), 2.68);
        assert_eq!(round_to_precision(1234.5678, -2), 1200.0);
        assert_eq!(round_to_precision(-1.005, 2), -1.01);
    }
}
