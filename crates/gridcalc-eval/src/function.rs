//! The core `Function` trait and its capability flags.

use gridcalc_common::{ExcelError, LiteralValue};

use crate::traits::{ArgumentHandle, FunctionContext};

bitflags::bitflags! {
    /// Describes the capabilities and properties of a function.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FnCaps: u16 {
        // --- Semantics ---
        /// Same output for the same inputs, no side effects.
        const PURE           = 0b0000_0000_0001;
        /// Output may change without any input changing.
        const VOLATILE       = 0b0000_0000_0010;

        // --- Shape ---
        /// Reduces any number of values and ranges to one value (`SUM`).
        const REDUCTION      = 0b0000_0000_0100;
        /// Maps one scalar to one scalar (`ABS`).
        const ELEMENTWISE    = 0b0000_0000_1000;
        /// Searches a range (`VLOOKUP`).
        const LOOKUP         = 0b0000_0001_0000;

        // --- Inputs / outputs ---
        const NUMERIC_ONLY   = 0b0000_0010_0000;
        const BOOL_ONLY      = 0b0000_0100_0000;
        /// Produces a date or time whose shape follows the return-date type.
        const RETURNS_DATE   = 0b0000_1000_0000;

        // --- Evaluation strategy ---
        /// Evaluates only some of its arguments (`IF`).
        const SHORT_CIRCUIT  = 0b0001_0000_0000;
        /// Receives error arguments instead of propagating them (`IFERROR`).
        const HANDLES_ERRORS = 0b0010_0000_0000;
    }
}

/// A built-in spreadsheet function.
///
/// Implementations are stateless unit structs registered once in the global
/// registry. Arguments arrive unevaluated as [`ArgumentHandle`]s so that a
/// function decides which ones to evaluate and whether it wants a scalar or
/// a range.
pub trait Function: Send + Sync + 'static {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE
    }

    fn name(&self) -> &'static str;

    fn min_args(&self) -> usize {
        0
    }

    fn variadic(&self) -> bool {
        false
    }

    /// Upper arity bound; `None` means unbounded.
    fn max_args(&self) -> Option<usize> {
        if self.variadic() {
            None
        } else {
            Some(self.min_args())
        }
    }

    fn volatile(&self) -> bool {
        self.caps().contains(FnCaps::VOLATILE)
    }

    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError>;

    /// Arity check, then evaluation.
    fn dispatch<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let too_few = args.len() < self.min_args();
        let too_many = self.max_args().is_some_and(|max| args.len() > max);
        if too_few || too_many {
            return Err(ExcelError::new_value().with_message(format!(
                "{} received {} argument(s)",
                self.name(),
                args.len()
            )));
        }
        self.eval_scalar(args, ctx)
    }
}
