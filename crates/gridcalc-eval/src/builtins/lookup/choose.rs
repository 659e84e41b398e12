//! INDEX and CHOOSE

use gridcalc_common::{ExcelError, LiteralValue};

use crate::builtins::utils::{coerce_to_int, opt_num};
use crate::function::Function;
use crate::func_caps;
use crate::traits::{ArgumentHandle, FunctionContext, Range};

/// INDEX(array, row, [col]). A zero row or column selects the whole column
/// or row. For a one-row array a lone index counts along the row.
#[derive(Debug)]
pub struct IndexFn;

impl Function for IndexFn {
    func_caps!(PURE | LOOKUP);
    fn name(&self) -> &'static str {
        "INDEX"
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
        let array = args[0].range()?;
        let (rows, cols) = array.dimensions();
        let first = coerce_to_int(&args[1], ctx)?;
        let second = if args.len() > 2 {
            Some(opt_num(args, 2, 0.0, ctx)?.trunc() as i64)
        } else {
            None
        };
        let (row, col) = match second {
            Some(col) => (first, col),
            None if rows == 1 => (1, first),
            None if cols == 1 => (first, 1),
            None => (first, 0),
        };
        if row < 0 || col < 0 {
            return Err(ExcelError::new_value());
        }
        let (row, col) = (row as usize, col as usize);
        if row > rows || col > cols {
            return Err(ExcelError::new_ref().with_message("index outside the array"));
        }

        match (row, col) {
            (0, 0) => Ok(LiteralValue::Array(array.materialise().into_owned())),
            (0, c) => {
                let column = (0..rows)
                    .map(|r| array.get(r, c - 1).map(|v| vec![v]))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LiteralValue::Array(column))
            }
            (r, 0) => {
                let line = (0..cols)
                    .map(|c| array.get(r - 1, c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LiteralValue::Array(vec![line]))
            }
            (r, c) => array.get(r - 1, c - 1),
        }
    }
}

/// CHOOSE(index, value1, ...). Only the chosen value is evaluated.
#[derive(Debug)]
pub struct ChooseFn;

impl Function for ChooseFn {
    func_caps!(PURE | SHORT_CIRCUIT);
    fn name(&self) -> &'static str {
        "CHOOSE"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let index = coerce_to_int(&args[0], ctx)?;
        if index < 1 || index as usize >= args.len() {
            return Err(ExcelError::new_value().with_message("CHOOSE index out of range"));
        }
        Ok(args[index as usize].value()?.into_owned())
    }
}

pub fn register_builtins() {
    crate::register_functions!(IndexFn, ChooseFn);
}
