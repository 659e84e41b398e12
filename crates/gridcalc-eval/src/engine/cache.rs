//! Computed values and parsed formulas shared between passes.

use std::sync::Arc;

use dashmap::DashMap;
use gridcalc_common::LiteralValue;
use gridcalc_parse::{ASTNode, ParserError, parse};

use super::graph::CellAddr;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: LiteralValue,
    /// Set when an input changed since `value` was computed.
    pub dirty: bool,
}

/// Last committed value of every evaluated formula cell.
#[derive(Debug, Default)]
pub struct ValueCache {
    entries: DashMap<CellAddr, CacheEntry>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed value, unless it is stale.
    pub fn clean_value(&self, addr: &CellAddr) -> Option<LiteralValue> {
        self.entries
            .get(addr)
            .filter(|e| !e.dirty)
            .map(|e| e.value.clone())
    }

    pub fn entry(&self, addr: &CellAddr) -> Option<CacheEntry> {
        self.entries.get(addr).map(|e| e.clone())
    }

    pub fn commit(&self, addr: CellAddr, value: LiteralValue) {
        self.entries.insert(addr, CacheEntry { value, dirty: false });
    }

    /// Flags the entries of `addrs` stale; returns how many were clean.
    pub fn mark_dirty<'a, I>(&self, addrs: I) -> usize
    where
        I: IntoIterator<Item = &'a CellAddr>,
    {
        let mut flipped = 0;
        for addr in addrs {
            if let Some(mut e) = self.entries.get_mut(addr)
                && !e.dirty
            {
                e.dirty = true;
                flipped += 1;
            }
        }
        flipped
    }

    pub fn remove(&self, addr: &CellAddr) {
        self.entries.remove(addr);
    }

    pub fn flush(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.iter().filter(|e| e.dirty).count()
    }
}

#[derive(Debug)]
struct Interned {
    tree: Result<Arc<ASTNode>, ParserError>,
    /// Cells currently holding this text.
    cells: usize,
}

/// Parsed trees keyed by formula text, so identical formulas share one
/// read-only tree. Parse failures are remembered too. An entry lives as long
/// as some cell holds its text.
#[derive(Debug, Default)]
pub struct FormulaCache {
    trees: DashMap<String, Interned>,
}

impl FormulaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more cell holding `text` and returns its tree.
    pub fn acquire(&self, text: &str) -> Result<Arc<ASTNode>, ParserError> {
        let mut entry = self
            .trees
            .entry(text.to_string())
            .or_insert_with(|| Interned {
                tree: parse(text).map(Arc::new),
                cells: 0,
            });
        entry.cells += 1;
        entry.tree.clone()
    }

    /// Drops one cell's hold on `text`; the tree goes once no cell holds it.
    pub fn release(&self, text: &str) {
        let unused = match self.trees.get_mut(text) {
            Some(mut entry) => {
                entry.cells = entry.cells.saturating_sub(1);
                entry.cells == 0
            }
            None => false,
        };
        if unused {
            self.trees.remove_if(text, |_, entry| entry.cells == 0);
        }
    }

    /// The shared tree for `text`, or a fresh parse that is not kept.
    pub fn get_or_parse(&self, text: &str) -> Result<Arc<ASTNode>, ParserError> {
        match self.trees.get(text) {
            Some(hit) => hit.tree.clone(),
            None => parse(text).map(Arc::new),
        }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_entries_are_not_served() {
        let cache = ValueCache::new();
        let a1 = CellAddr::new(0, 1, 1);
        cache.commit(a1, LiteralValue::Number(3.0));
        assert_eq!(cache.clean_value(&a1), Some(LiteralValue::Number(3.0)));

        assert_eq!(cache.mark_dirty([&a1, &CellAddr::new(0, 9, 9)]), 1);
        assert_eq!(cache.mark_dirty([&a1]), 0);
        assert_eq!(cache.clean_value(&a1), None);
        assert_eq!(
            cache.entry(&a1),
            Some(CacheEntry {
                value: LiteralValue::Number(3.0),
                dirty: true
            })
        );
        assert_eq!(cache.dirty_count(), 1);

        cache.flush();
        assert!(cache.is_empty());
    }

    #[test]
    fn identical_formulas_share_a_tree() {
        let formulas = FormulaCache::new();
        let a = formulas.acquire("=SUM(A1:A3)*2").unwrap();
        let b = formulas.acquire("=SUM(A1:A3)*2").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &formulas.get_or_parse("=SUM(A1:A3)*2").unwrap()));
        assert!(formulas.acquire("=SUM(").is_err());
        assert!(formulas.acquire("=SUM(").is_err());
        assert_eq!(formulas.len(), 2);
    }

    #[test]
    fn trees_go_with_their_last_cell() {
        let formulas = FormulaCache::new();
        formulas.acquire("=A1+1").unwrap();
        formulas.acquire("=A1+1").unwrap();
        formulas.acquire("=(").unwrap_err();

        formulas.release("=A1+1");
        assert_eq!(formulas.len(), 2);
        formulas.release("=A1+1");
        formulas.release("=(");
        assert!(formulas.is_empty());

        // lookups alone never store anything
        formulas.get_or_parse("=B2*3").unwrap();
        formulas.release("=never seen");
        assert!(formulas.is_empty());
    }
}
