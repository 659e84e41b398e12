/// Implements `Function::caps` from a list of capability flags.
#[macro_export]
macro_rules! func_caps {
    ( $($cap:ident)|+ ) => {
        fn caps(&self) -> $crate::function::FnCaps {
            $( $crate::function::FnCaps::$cap )|+
        }
    };
}

/// Registers each listed function value in the global registry.
#[macro_export]
macro_rules! register_functions {
    ( $($fn:path),+ $(,)? ) => {{
        use std::sync::Arc;
        $(
            $crate::function_registry::register(Arc::new($fn));
        )+
    }};
}
