//! MATCH, VLOOKUP, HLOOKUP

use gridcalc_common::{ExcelError, LiteralValue};

use super::lookup_utils::{approximate_position, descending_position, exact_position};
use crate::builtins::utils::{coerce_to_int, opt_bool, opt_num, scalar};
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext, Range};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    /// search down the first column, read across
    Vertical,
    /// search along the first row, read down
    Horizontal,
}

fn not_found() -> ExcelError {
    ExcelError::new_na().with_message("lookup value not found")
}

/// Shared body of VLOOKUP/HLOOKUP.
fn table_lookup(
    args: &[ArgumentHandle],
    ctx: &dyn FunctionContext,
    axis: Axis,
) -> Result<LiteralValue, ExcelError> {
    let key = scalar(&args[0])?;
    let table = args[1].range()?;
    let index = coerce_to_int(&args[2], ctx)?;
    let approximate = opt_bool(args, 3, true, ctx)?;

    let (rows, cols) = table.dimensions();
    let (along, across) = match axis {
        Axis::Vertical => (rows, cols),
        Axis::Horizontal => (cols, rows),
    };
    if index < 1 {
        return Err(ExcelError::new_value().with_message("index must be at least 1"));
    }
    if index as usize > across {
        return Err(ExcelError::new_ref().with_message("index beyond the table"));
    }

    let cell = |i: usize, j: usize| match axis {
        Axis::Vertical => table.get(i, j),
        Axis::Horizontal => table.get(j, i),
    };
    let keys = (0..along)
        .map(|i| cell(i, 0))
        .collect::<Result<Vec<_>, _>>()?;
    let (calendar, locale) = (ctx.calendar(), ctx.locale());
    let hit = if approximate {
        approximate_position(&keys, &key, calendar, locale)
    } else {
        exact_position(&keys, &key, calendar, locale)
    };
    let i = hit.ok_or_else(not_found)?;
    cell(i, index as usize - 1)
}

/// VLOOKUP(key, table, col_index, [approximate=TRUE])
#[derive(Debug)]
pub struct VLookupFn;

impl Function for VLookupFn {
    func_caps!(PURE | LOOKUP);
    fn name(&self) -> &'static str {
        "VLOOKUP"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn max_args(&self) -> Option<usize> {
        Some(4)
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        table_lookup(args, ctx, Axis::Vertical)
    }
}

/// HLOOKUP(key, table, row_index, [approximate=TRUE])
#[derive(Debug)]
pub struct HLookupFn;

impl Function for HLookupFn {
    func_caps!(PURE | LOOKUP);
    fn name(&self) -> &'static str {
        "HLOOKUP"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn max_args(&self) -> Option<usize> {
        Some(4)
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        table_lookup(args, ctx, Axis::Horizontal)
    }
}

/// MATCH(key, vector, [type=1]): 1-based position. Type 1 finds the largest
/// value ≤ key in ascending data, 0 an exact match, -1 the smallest value ≥
/// key in descending data.
#[derive(Debug)]
pub struct MatchFn;

impl Function for MatchFn {
    func_caps!(PURE | LOOKUP);
    fn name(&self) -> &'static str {
        "MATCH"
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
        let key = scalar(&args[0])?;
        let vector = args[1].range()?;
        let match_type = opt_num(args, 2, 1.0, ctx)?;

        let (rows, cols) = vector.dimensions();
        if rows > 1 && cols > 1 {
            return Err(ExcelError::new_na().with_message("MATCH needs a single row or column"));
        }
        let values: Vec<LiteralValue> = vector.iter_cells().collect();
        let (calendar, locale) = (ctx.calendar(), ctx.locale());
        let hit = if match_type > 0.0 {
            approximate_position(&values, &key, calendar, locale)
        } else if match_type == 0.0 {
            exact_position(&values, &key, calendar, locale)
        } else {
            descending_position(&values, &key, calendar, locale)
        };
        let i = hit.ok_or_else(not_found)?;
        Ok(LiteralValue::Number((i + 1) as f64))
    }
}

pub fn register_builtins() {
    crate::register_functions!(VLookupFn, HLookupFn, MatchFn);
}
