use std::fmt;

use gridcalc_parse::ASTNode;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::workbook::{SheetId, Workbook};

/// A cell position with its sheet resolved.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellAddr {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u32,
}

impl CellAddr {
    pub fn new(sheet: SheetId, row: u32, col: u32) -> Self {
        Self { sheet, row, col }
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}!{}{}",
            self.sheet,
            gridcalc_common::column_to_letters(self.col),
            self.row
        )
    }
}

/// A rectangle of cells a formula reads, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Area {
    pub sheet: SheetId,
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl Area {
    pub fn contains(&self, addr: &CellAddr) -> bool {
        addr.sheet == self.sheet
            && (self.start_row..=self.end_row).contains(&addr.row)
            && (self.start_col..=self.end_col).contains(&addr.col)
    }

    pub fn single_cell(&self) -> Option<CellAddr> {
        (self.start_row == self.end_row && self.start_col == self.end_col)
            .then(|| CellAddr::new(self.sheet, self.start_row, self.start_col))
    }
}

/// Areas read by one formula; most formulas read only a few.
pub type Areas = SmallVec<[Area; 4]>;

/// Every area `ast` references. Unqualified references belong to `home`;
/// references to sheets the workbook does not have are left out.
pub fn extract_areas(ast: &ASTNode, home: SheetId, workbook: &Workbook) -> Areas {
    let mut areas = Areas::new();
    for reference in ast.get_dependencies() {
        let sheet = match reference.sheet() {
            Some(name) => match workbook.sheet_id(name) {
                Some(id) => id,
                None => continue,
            },
            None => home,
        };
        let range = reference.to_range();
        let area = Area {
            sheet,
            start_row: range.start.row,
            start_col: range.start.col,
            end_row: range.end.row,
            end_col: range.end.col,
        };
        if !areas.contains(&area) {
            areas.push(area);
        }
    }
    areas
}

/// Precedent and dependent edges between formula cells and the cells they
/// read. Single-cell precedents are indexed both ways; multi-cell areas are
/// kept as a list and matched by containment.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    precedents: FxHashMap<CellAddr, Areas>,
    cell_dependents: FxHashMap<CellAddr, FxHashSet<CellAddr>>,
    range_dependents: Vec<(Area, CellAddr)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the areas `formula` reads.
    pub fn set_precedents<A: Into<Areas>>(&mut self, formula: CellAddr, areas: A) {
        let areas = areas.into();
        self.remove_precedents(formula);
        for area in &areas {
            match area.single_cell() {
                Some(cell) => {
                    self.cell_dependents.entry(cell).or_default().insert(formula);
                }
                None => self.range_dependents.push((*area, formula)),
            }
        }
        if !areas.is_empty() {
            self.precedents.insert(formula, areas);
        }
    }

    /// Drop every edge out of `formula`, e.g. when the cell becomes a value.
    pub fn remove_precedents(&mut self, formula: CellAddr) {
        let Some(old) = self.precedents.remove(&formula) else {
            return;
        };
        for area in old {
            if let Some(cell) = area.single_cell() {
                if let Some(set) = self.cell_dependents.get_mut(&cell) {
                    set.remove(&formula);
                    if set.is_empty() {
                        self.cell_dependents.remove(&cell);
                    }
                }
            }
        }
        self.range_dependents.retain(|(_, f)| *f != formula);
    }

    pub fn precedents(&self, formula: &CellAddr) -> &[Area] {
        self.precedents.get(formula).map_or(&[], |areas| areas.as_slice())
    }

    /// Formula cells reading `addr` directly.
    pub fn dependents(&self, addr: &CellAddr) -> Vec<CellAddr> {
        let mut out: Vec<CellAddr> = self
            .cell_dependents
            .get(addr)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for (area, formula) in &self.range_dependents {
            if area.contains(addr) && !out.contains(formula) {
                out.push(*formula);
            }
        }
        out
    }

    /// `addr` and everything that reads it, directly or transitively.
    pub fn affected_by(&self, addr: CellAddr) -> Vec<CellAddr> {
        let mut affected = FxHashSet::default();
        let mut to_visit = vec![addr];
        while let Some(cell) = to_visit.pop() {
            if !affected.insert(cell) {
                continue;
            }
            to_visit.extend(self.dependents(&cell));
        }
        let mut out: Vec<CellAddr> = affected.into_iter().collect();
        out.sort_unstable();
        out
    }

    pub fn formula_count(&self) -> usize {
        self.precedents.len()
    }

    pub fn clear(&mut self) {
        self.precedents.clear();
        self.cell_dependents.clear();
        self.range_dependents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_parse::parse;

    fn a(row: u32, col: u32) -> CellAddr {
        CellAddr::new(0, row, col)
    }

    #[test]
    fn areas_are_qualified_and_deduplicated() {
        let wb = Workbook::with_sheets(["Main", "Data"]);
        let ast = parse("=A1 + data!B2:C3 + A1 + Missing!A1").unwrap();
        let areas = extract_areas(&ast, 0, &wb);
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].single_cell(), Some(a(1, 1)));
        assert_eq!(areas[1].sheet, 1);
        assert_eq!((areas[1].start_row, areas[1].end_col), (2, 3));
    }

    #[test]
    fn transitive_dependents_through_cells_and_ranges() {
        let mut g = DependencyGraph::new();
        let cell = |r, c| Area {
            sheet: 0,
            start_row: r,
            start_col: c,
            end_row: r,
            end_col: c,
        };
        // B1 = A1, C1 = SUM(A1:B5), D1 = C1
        g.set_precedents(a(1, 2), vec![cell(1, 1)]);
        g.set_precedents(
            a(1, 3),
            vec![Area {
                sheet: 0,
                start_row: 1,
                start_col: 1,
                end_row: 5,
                end_col: 2,
            }],
        );
        g.set_precedents(a(1, 4), vec![cell(1, 3)]);

        assert_eq!(g.affected_by(a(1, 1)), vec![a(1, 1), a(1, 2), a(1, 3), a(1, 4)]);
        assert_eq!(g.affected_by(a(4, 2)), vec![a(1, 3), a(1, 4), a(4, 2)]);
        assert_eq!(g.affected_by(a(9, 9)), vec![a(9, 9)]);

        g.remove_precedents(a(1, 3));
        assert_eq!(g.affected_by(a(4, 2)), vec![a(4, 2)]);
        assert_eq!(g.formula_count(), 2);
    }
}
