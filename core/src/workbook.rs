//! Source grid model: named sheets of cell rows.

use crate::cell::CellValue;

/// Number of header rows (type row, then name row) at the top of a sheet.
pub const HEADER_ROWS: usize = 2;

/// One sheet as delivered by the source: a title and a grid of cells.
///
/// Rows may be ragged; a missing trailing cell reads as
/// [`CellValue::Absent`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Builds a sheet from JSON rows, `null` meaning an absent cell.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use sheet_tree_core::Sheet;
    ///
    /// let sheet = Sheet::from_json_rows("Users", &[
    ///     json!(["Key", "String"]),
    ///     json!(["id", "name"]),
    ///     json!(["u1", null]),
    /// ]);
    /// assert_eq!(sheet.data_rows().len(), 1);
    /// assert!(sheet.data_rows()[0][1].is_absent());
    /// ```
    pub fn from_json_rows(name: impl Into<String>, rows: &[serde_json::Value]) -> Self {
        let rows = rows
            .iter()
            .map(|row| match row {
                serde_json::Value::Array(cells) => cells.iter().map(CellValue::from_json).collect(),
                other => vec![CellValue::from_json(other)],
            })
            .collect();
        Self::new(name, rows)
    }

    /// The type row and the name row rendered as text, if both exist.
    pub fn header_rows(&self) -> Option<(Vec<String>, Vec<String>)> {
        if self.rows.len() < HEADER_ROWS {
            return None;
        }
        let text = |row: &[CellValue]| -> Vec<String> {
            row.iter().map(|c| c.text().unwrap_or_default()).collect()
        };
        Some((text(&self.rows[0]), text(&self.rows[1])))
    }

    /// Rows after the two header rows.
    pub fn data_rows(&self) -> &[Vec<CellValue>] {
        self.rows.get(HEADER_ROWS..).unwrap_or_default()
    }
}

/// All sheets of one spreadsheet, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// First sheet with the given title.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
