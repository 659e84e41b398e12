//! Lookup and reference functions: VLOOKUP, HLOOKUP, MATCH, INDEX, CHOOSE

mod choose;
mod core;
pub mod lookup_utils;

pub use choose::*;
pub use self::core::*;

pub fn register_builtins() {
    self::core::register_builtins();
    choose::register_builtins();
}
