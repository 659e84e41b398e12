//! JSON workbook files.
//!
//! ```json
//! { "sheets": [ { "name": "Sheet1", "cells": { "A1": 10, "B1": "=A1*2" } } ] }
//! ```
//!
//! Cell entries are entered the way a user types them: strings go through
//! the engine's value binder, numbers and booleans are stored as they are.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use gridcalc_common::{LiteralValue, Reference, parse_reference};
use gridcalc_eval::{Engine, EvalConfig, Workbook};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WorkbookFile {
    pub sheets: Vec<SheetFile>,
}

#[derive(Debug, Deserialize)]
pub struct SheetFile {
    pub name: String,
    #[serde(default)]
    pub cells: BTreeMap<String, serde_json::Value>,
}

impl WorkbookFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: WorkbookFile = serde_json::from_str(text)?;
        if file.sheets.is_empty() {
            bail!("workbook has no sheets");
        }
        Ok(file)
    }

    /// An engine holding every sheet and cell of the file.
    pub fn into_engine(self, config: EvalConfig) -> Result<Engine> {
        let workbook = Workbook::with_sheets(self.sheets.iter().map(|s| s.name.clone()));
        let mut engine = Engine::new(workbook, config);
        for sheet in &self.sheets {
            for (a1, value) in &sheet.cells {
                let (row, col) = cell_position(a1)
                    .with_context(|| format!("cell {a1} on sheet {}", sheet.name))?;
                match value {
                    serde_json::Value::String(input) => {
                        engine.set_cell_input(&sheet.name, row, col, input)?
                    }
                    serde_json::Value::Number(n) => {
                        let n = n
                            .as_f64()
                            .with_context(|| format!("{a1}: number out of range"))?;
                        engine.set_cell_value(&sheet.name, row, col, LiteralValue::Number(n))?
                    }
                    serde_json::Value::Bool(b) => {
                        engine.set_cell_value(&sheet.name, row, col, LiteralValue::Boolean(*b))?
                    }
                    serde_json::Value::Null => {}
                    other => bail!("{}!{a1}: unsupported cell value {other}", sheet.name),
                }
            }
        }
        Ok(engine)
    }
}

fn cell_position(a1: &str) -> Result<(u32, u32)> {
    match parse_reference(a1)? {
        Reference::Cell(c) if c.sheet.is_none() => Ok((c.row, c.col)),
        _ => bail!("expected a plain cell address such as B7"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BOOK: &str = r#"{
        "sheets": [
            { "name": "Inputs", "cells": { "A1": 10, "A2": "32", "A3": true } },
            { "name": "Report", "cells": { "B2": "=SUM(Inputs!A1:A2)", "C2": null } }
        ]
    }"#;

    fn config() -> EvalConfig {
        EvalConfig::default().with_parallel(false)
    }

    #[test]
    fn loads_sheets_in_file_order() {
        let engine = WorkbookFile::from_json(BOOK)
            .unwrap()
            .into_engine(config())
            .unwrap();
        assert_eq!(engine.workbook().sheet_names(), vec!["Inputs", "Report"]);
        assert_eq!(
            engine.evaluate_cell("Report", 2, 2),
            Ok(LiteralValue::Number(42.0))
        );
        assert_eq!(
            engine.evaluate("=Inputs!A3", "Report!A1"),
            Ok(LiteralValue::Boolean(true))
        );
    }

    #[test]
    fn rejects_bad_cells() {
        let bad_address = r#"{ "sheets": [ { "name": "S", "cells": { "A1:B2": 1 } } ] }"#;
        let err = WorkbookFile::from_json(bad_address)
            .unwrap()
            .into_engine(config())
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("A1:B2"));

        let nested = r#"{ "sheets": [ { "name": "S", "cells": { "A1": [1] } } ] }"#;
        assert!(
            WorkbookFile::from_json(nested)
                .unwrap()
                .into_engine(config())
                .is_err()
        );
        assert!(WorkbookFile::from_json(r#"{ "sheets": [] }"#).is_err());
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BOOK.as_bytes()).unwrap();
        let book = WorkbookFile::read(file.path()).unwrap();
        assert_eq!(book.sheets.len(), 2);
        assert!(WorkbookFile::read(Path::new("/no/such/book.json")).is_err());
    }
}
