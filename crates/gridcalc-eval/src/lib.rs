pub mod binder;
pub mod coercion;
pub mod config;
pub mod function;
pub mod function_registry;
pub mod interpreter;
pub mod locale;
pub mod timezone;
pub mod traits;

pub mod builtins;

mod macros;
pub mod test_workbook;
pub mod workbook;

pub mod engine;

pub use config::{CompatibilityMode, EvalConfig, ReturnDateType};
pub use timezone::TimeZoneSpec;
pub use engine::{CancellationToken, CellAddr, Engine, EngineError, EvalSummary};
pub use workbook::{CellContent, Sheet, SheetId, Workbook};

#[cfg(test)]
mod tests;
