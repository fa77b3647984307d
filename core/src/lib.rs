//! Spreadsheet-to-tree conversion core.
//!
//! A workbook is a set of named sheets. Row 1 of each sheet declares column
//! types, row 2 declares column names, and every following row is data.
//! This crate turns that grid into a tree of branches:
//!
//! - [`schema::parse_schema`] reads the two header rows into a
//!   [`SheetSchema`] of [`ColumnDescriptor`]s (scalars, `Ref(Sheet,key)`
//!   references, JSON list and record literals).
//! - [`coerce::coerce`] turns one [`CellValue`] into a typed [`Scalar`].
//! - [`builder::build_sheet`] grows one sheet branch with one child per row
//!   into any [`TreeSink`]; [`DataTree`] is the in-memory sink.
//! - [`validate_references`] checks accumulated [`ReferenceRecord`]s
//!   against the finished tree.
//! - [`grow_tree`] runs all of the above over a [`Workbook`].
//!
//! Bad data never aborts a build. Every finding is returned as a
//! [`Diagnostic`]; only sink contract violations ([`SinkError`]) are errors.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use sheet_tree_core::*;
//!
//! let workbook = Workbook::new(vec![Sheet::from_json_rows("Items", &[
//!     json!(["Key", r#"["Int"]"#]),
//!     json!(["sku", "sizes"]),
//!     json!(["a1", "[1,2,3]"]),
//! ])]);
//!
//! let mut tree = DataTree::new();
//! let report = grow_tree(&workbook, &mut tree, &GrowOptions::default()).unwrap();
//! assert!(report.diagnostics.is_empty());
//!
//! let items = tree.root_view().child_where(SHEET_NAME_KEY, "Items").unwrap();
//! let row = items.children().next().unwrap();
//! let sizes = row.child_where(BRANCH_NAME_KEY, "sizes").unwrap();
//! assert_eq!(sizes.elements().len(), 3);
//! ```

pub mod builder;
pub mod cell;
pub mod coerce;
mod diagnostics;
mod pipeline;
pub mod schema;
pub mod sink;
mod tree;
mod types;
mod validate;
mod workbook;

pub use builder::{BRANCH_NAME_KEY, SheetBuild, build_sheet};
pub use cell::CellValue;
pub use coerce::{Coerced, coerce};
pub use diagnostics::*;
pub use pipeline::{GrowOptions, GrowReport, SHEET_NAME_KEY, SheetSummary, grow_tree};
pub use schema::parse_schema;
pub use sink::{BranchHeader, BranchId, HeaderColumn, SinkError, TreeSink};
pub use tree::{BranchView, DataTree, Field};
pub use types::*;
pub use validate::{ReferenceRecord, validate_references};
pub use workbook::{HEADER_ROWS, Sheet, Workbook};
