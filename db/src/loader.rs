//! Workbook loading from files on disk.
//!
//! Two layouts are supported:
//!
//! - a spreadsheet document with grid data, as returned by a spreadsheet
//!   API (`sheets[].properties.title`,
//!   `sheets[].data[0].rowData[].values[].effectiveValue`);
//! - a directory of `*.json` files, one per sheet, each a JSON array of
//!   rows.
//!
//! ```no_run
//! use sheet_tree_db::WorkbookLoader;
//!
//! let workbook = WorkbookLoader::load("exports/shop.json").unwrap();
//! println!("{} sheets", workbook.len());
//!
//! let workbook = WorkbookLoader::from_grid_dir("exports/shop/").unwrap();
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use sheet_tree_core::{CellValue, Sheet, Workbook};
use tracing::debug;

use crate::error::{DatabaseError, Result};

/// Describes where a [`Workbook`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkbookSource {
    /// A single spreadsheet document with grid data.
    SpreadsheetJson(PathBuf),
    /// A directory of per-sheet JSON grids.
    GridDir(PathBuf),
}

impl WorkbookSource {
    /// Picks the layout from the path: directories are grid dirs, anything
    /// else is a spreadsheet document.
    pub fn detect(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.is_dir() {
            Self::GridDir(path.to_path_buf())
        } else {
            Self::SpreadsheetJson(path.to_path_buf())
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::SpreadsheetJson(path) | Self::GridDir(path) => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetDocument {
    #[serde(default)]
    sheets: Vec<SheetDocument>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetDocument {
    properties: Option<SheetProperties>,
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetProperties {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Default, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    effective_value: Option<ExtendedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedValue {
    string_value: Option<String>,
    number_value: Option<f64>,
    bool_value: Option<bool>,
}

impl From<CellData> for CellValue {
    fn from(cell: CellData) -> Self {
        let Some(value) = cell.effective_value else {
            return CellValue::Absent;
        };
        match (value.string_value, value.number_value, value.bool_value) {
            (Some(s), _, _) => CellValue::Str(s),
            (None, Some(n), _) => CellValue::Num(n),
            (None, None, Some(b)) => CellValue::Bool(b),
            (None, None, None) => CellValue::Absent,
        }
    }
}

/// Loads workbooks from the supported on-disk layouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookLoader;

impl WorkbookLoader {
    /// Loads from `path`, choosing the layout with [`WorkbookSource::detect`].
    ///
    /// # Errors
    ///
    /// See [`from_spreadsheet_json`](Self::from_spreadsheet_json) and
    /// [`from_grid_dir`](Self::from_grid_dir).
    pub fn load(path: impl AsRef<Path>) -> Result<Workbook> {
        Self::load_source(&WorkbookSource::detect(path))
    }

    pub fn load_source(source: &WorkbookSource) -> Result<Workbook> {
        match source {
            WorkbookSource::SpreadsheetJson(path) => Self::from_spreadsheet_json(path),
            WorkbookSource::GridDir(path) => Self::from_grid_dir(path),
        }
    }

    /// Reads a spreadsheet document with grid data.
    ///
    /// Only the first grid range of each sheet is used. A cell without an
    /// `effectiveValue` is absent; a row without `values` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the file cannot be read,
    /// [`DatabaseError::JsonError`] if it is not a spreadsheet document, or
    /// [`DatabaseError::InvalidWorkbook`] if a sheet has no title.
    pub fn from_spreadsheet_json(path: impl AsRef<Path>) -> Result<Workbook> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let document: SpreadsheetDocument = serde_json::from_reader(reader)?;

        let mut workbook = Workbook::default();
        for (index, sheet) in document.sheets.into_iter().enumerate() {
            let title = sheet
                .properties
                .and_then(|p| p.title)
                .ok_or_else(|| DatabaseError::InvalidWorkbook(format!("sheet {index} has no title")))?;
            let rows = sheet
                .data
                .into_iter()
                .next()
                .map(|grid| {
                    grid.row_data
                        .into_iter()
                        .map(|row| row.values.into_iter().map(CellValue::from).collect())
                        .collect()
                })
                .unwrap_or_default();
            workbook.push(Sheet::new(title, rows));
        }

        debug!(path = %path.display(), sheets = workbook.len(), "Loaded spreadsheet document");
        Ok(workbook)
    }

    /// Reads every `*.json` file in `dir` as one sheet named after the file
    /// stem. Sheets are ordered by file name.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the directory or a file cannot
    /// be read, [`DatabaseError::JsonError`] on invalid JSON, or
    /// [`DatabaseError::InvalidWorkbook`] if a file is not an array of rows.
    pub fn from_grid_dir(dir: impl AsRef<Path>) -> Result<Workbook> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let file_path = entry?.path();
            if file_path.is_file() && file_path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(file_path);
            }
        }
        files.sort();

        let mut workbook = Workbook::default();
        for file_path in files {
            let name = file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    DatabaseError::InvalidWorkbook(format!(
                        "sheet file name is not UTF-8: {}",
                        file_path.display()
                    ))
                })?
                .to_string();
            let reader = BufReader::new(File::open(&file_path)?);
            let Value::Array(rows) = serde_json::from_reader::<_, Value>(reader)? else {
                return Err(DatabaseError::InvalidWorkbook(format!(
                    "{} is not a JSON array of rows",
                    file_path.display()
                )));
            };
            workbook.push(Sheet::from_json_rows(name, &rows));
        }

        debug!(path = %dir.display(), sheets = workbook.len(), "Loaded grid directory");
        Ok(workbook)
    }
}
