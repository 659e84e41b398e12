//! In-memory cell storage the engine evaluates against.
//!
//! Sheets are addressed by position ([`SheetId`]) once they exist and by
//! name, case-insensitively, when a formula or caller names them. Sheets are
//! never removed, so a `SheetId` stays valid for the life of the workbook.

use gridcalc_common::LiteralValue;
use rustc_hash::FxHashMap;

pub type SheetId = usize;

/// What a cell holds as entered, before any evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Value(LiteralValue),
    /// Formula text, with or without the leading `=`.
    Formula(String),
}

impl CellContent {
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellContent::Formula(text) => Some(text),
            CellContent::Value(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: FxHashMap<(u32, u32), CellContent>,
    /// Largest (row, col) ever written; 0 when nothing has been.
    max_row: u32,
    max_col: u32,
}

impl Sheet {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&CellContent> {
        self.cells.get(&(row, col))
    }

    /// Stores `content`, returning what the cell held before.
    pub fn set_cell(&mut self, row: u32, col: u32, content: CellContent) -> Option<CellContent> {
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
        self.cells.insert((row, col), content)
    }

    pub fn clear_cell(&mut self, row: u32, col: u32) -> Option<CellContent> {
        self.cells.remove(&(row, col))
    }

    /// `(rows, cols)` of the block from A1 that holds every written cell.
    pub fn used_extent(&self) -> (u32, u32) {
        (self.max_row, self.max_col)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Formula cells as `(row, col, text)`, in row-major order.
    pub fn formula_cells(&self) -> Vec<(u32, u32, &str)> {
        let mut out: Vec<(u32, u32, &str)> = self
            .cells
            .iter()
            .filter_map(|(&(r, c), content)| content.formula().map(|f| (r, c, f)))
            .collect();
        out.sort_unstable_by_key(|&(r, c, _)| (r, c));
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// A workbook with no sheets.
    pub fn new() -> Self {
        Self::default()
    }

    /// A workbook holding one empty sheet per name.
    pub fn with_sheets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut wb = Self::new();
        for name in names {
            wb.add_sheet(name);
        }
        wb
    }

    /// Returns the id of the sheet called `name`, creating it if needed.
    pub fn add_sheet<S: Into<String>>(&mut self, name: S) -> SheetId {
        let name = name.into();
        if let Some(id) = self.sheet_id(&name) {
            return id;
        }
        self.sheets.push(Sheet::new(name));
        self.sheets.len() - 1
    }

    /// Case-insensitive lookup.
    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.get(id)
    }

    pub fn sheet_mut(&mut self, id: SheetId) -> Option<&mut Sheet> {
        self.sheets.get_mut(id)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheet_id(name).and_then(|id| self.sheet(id))
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheets(&self) -> impl Iterator<Item = (SheetId, &Sheet)> {
        self.sheets.iter().enumerate()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }
}
