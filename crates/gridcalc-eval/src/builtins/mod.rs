pub mod datetime;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod number_format;
pub mod stats;
pub mod text;
pub(crate) mod utils;

use std::sync::Once;

static LOAD: Once = Once::new();

/// Registers every built-in with the global registry. Later calls are no-ops.
pub fn load_builtins() {
    LOAD.call_once(|| {
        logical::register_builtins();
        info::register_builtins();
        math::register_builtins();
        stats::register_builtins();
        text::register_builtins();
        datetime::register_builtins();
        lookup::register_builtins();
    });
}
