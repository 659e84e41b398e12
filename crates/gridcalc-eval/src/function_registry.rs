//! Process-wide table of built-in functions, keyed by upper-case name.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::function::Function;

static REG: Lazy<DashMap<String, Arc<dyn Function>>> = Lazy::new(DashMap::new);

pub fn register(f: Arc<dyn Function>) {
    REG.insert(f.name().to_ascii_uppercase(), f);
}

/// Case-insensitive lookup.
pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    let found = REG.get(name).map(|v| Arc::clone(v.value()));
    found.or_else(|| {
        REG.get(&name.to_ascii_uppercase())
            .map(|v| Arc::clone(v.value()))
    })
}

/// Registered names in alphabetical order.
pub fn names() -> Vec<String> {
    let mut names: Vec<String> = REG.iter().map(|e| e.key().clone()).collect();
    names.sort();
    names
}
