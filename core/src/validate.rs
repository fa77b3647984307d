//! Cross-sheet reference validation.
//!
//! Reference columns (`Ref(Sheet,key)`) accumulate every value they carry
//! while rows are built. Once all sheets exist, [`validate_references`]
//! checks each value against the keyed branches of the target sheet.
//! Unresolved references are reported as diagnostics and never block
//! export.

use serde::Serialize;

use crate::diagnostics::{Diagnostic, ReferenceIssue};
use crate::pipeline::SHEET_NAME_KEY;
use crate::sink::TreeSink;

/// Values collected from one reference column of one sheet.
///
/// `rows[i]` is the 1-based spreadsheet row that `values[i]` came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    pub source_sheet: String,
    /// Column name, or a dotted path for references inside nested columns.
    pub source_column: String,
    pub target_sheet: String,
    pub target_key: String,
    pub values: Vec<String>,
    pub rows: Vec<usize>,
}

impl ReferenceRecord {
    pub fn new(
        source_sheet: impl Into<String>,
        source_column: impl Into<String>,
        target_sheet: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            source_sheet: source_sheet.into(),
            source_column: source_column.into(),
            target_sheet: target_sheet.into(),
            target_key: target_key.into(),
            values: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: usize, value: impl Into<String>) {
        self.rows.push(row);
        self.values.push(value.into());
    }
}

/// Checks every accumulated reference value against the built tree.
///
/// Sheets are located under the sink root by their `sheetName` key. A
/// record whose target sheet is missing yields one diagnostic and its
/// values are skipped. Otherwise each value that matches no branch with key
/// `target_key` in the target sheet yields one diagnostic. Lookups are
/// first-match-wins, so duplicate keys in the target sheet still resolve.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::{DataTree, ReferenceRecord, TreeSink, validate_references};
///
/// let mut tree = DataTree::new();
/// let root = tree.root();
/// tree.add_key(root, "sheetName").unwrap();
/// let users = tree.grow_branch(root).unwrap();
/// tree.set_hash(users, "sheetName", "Users").unwrap();
/// tree.add_key(users, "id").unwrap();
/// let user = tree.grow_branch(users).unwrap();
/// tree.set_hash(user, "id", "u41").unwrap();
///
/// let mut record = ReferenceRecord::new("Orders", "user", "Users", "id");
/// record.push(3, "u42");
///
/// let diagnostics = validate_references(&[record], &tree);
/// assert_eq!(diagnostics.len(), 1);
/// assert!(diagnostics[0].to_string().contains("value u42"));
/// ```
pub fn validate_references<S: TreeSink>(records: &[ReferenceRecord], sink: &S) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let root = sink.root();

    for record in records {
        let Some(sheet) = sink.find_branch(root, SHEET_NAME_KEY, &record.target_sheet) else {
            diagnostics.push(
                Diagnostic::new(
                    record.source_sheet.as_str(),
                    ReferenceIssue::MissingSheet {
                        target_sheet: record.target_sheet.clone(),
                    },
                )
                .in_column(record.source_column.as_str()),
            );
            continue;
        };

        for (index, value) in record.values.iter().enumerate() {
            if sink.has_branch(sheet, &record.target_key, value) {
                continue;
            }
            let mut diagnostic = Diagnostic::new(
                record.source_sheet.as_str(),
                ReferenceIssue::MissingRef {
                    target_sheet: record.target_sheet.clone(),
                    key: record.target_key.clone(),
                    value: value.clone(),
                },
            )
            .in_column(record.source_column.as_str());
            if let Some(&row) = record.rows.get(index) {
                diagnostic = diagnostic.at_row(row);
            }
            diagnostics.push(diagnostic);
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, Issue};
    use crate::tree::DataTree;

    fn tree_with_users(ids: &[&str]) -> DataTree {
        let mut tree = DataTree::new();
        let root = tree.root();
        tree.add_key(root, SHEET_NAME_KEY).unwrap();
        let users = tree.grow_branch(root).unwrap();
        tree.set_hash(users, SHEET_NAME_KEY, "Users").unwrap();
        tree.add_key(users, "id").unwrap();
        for id in ids {
            let user = tree.grow_branch(users).unwrap();
            tree.set_hash(user, "id", id).unwrap();
            tree.branch_ready(user).unwrap();
        }
        tree.branch_ready(users).unwrap();
        tree
    }

    fn orders_record(values: &[&str]) -> ReferenceRecord {
        let mut record = ReferenceRecord::new("Orders", "user", "Users", "id");
        for (i, value) in values.iter().enumerate() {
            record.push(i + 3, *value);
        }
        record
    }

    #[test]
    fn test_unresolved_value_names_sheet_key_and_value() {
        let tree = tree_with_users(&["u41"]);
        let diagnostics = validate_references(&[orders_record(&["u42"])], &tree);

        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.sheet, "Orders");
        assert_eq!(d.row, Some(3));
        assert_eq!(
            d.issue,
            Issue::Reference(ReferenceIssue::MissingRef {
                target_sheet: "Users".into(),
                key: "id".into(),
                value: "u42".into(),
            })
        );
    }

    #[test]
    fn test_resolved_value_is_silent() {
        let tree = tree_with_users(&["u41", "u42"]);
        assert!(validate_references(&[orders_record(&["u42", "u41"])], &tree).is_empty());
    }

    #[test]
    fn test_missing_sheet_reports_once_and_skips_values() {
        let tree = tree_with_users(&[]);
        let mut record = ReferenceRecord::new("Orders", "sku", "Products", "sku");
        record.push(3, "a");
        record.push(4, "b");

        let diagnostics = validate_references(&[record], &tree);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind(), DiagnosticKind::Reference);
        assert!(diagnostics[0].to_string().contains("missing sheet reference: Products"));
    }

    #[test]
    fn test_each_unresolved_occurrence_is_reported() {
        let tree = tree_with_users(&["u1"]);
        let diagnostics = validate_references(&[orders_record(&["x", "u1", "x"])], &tree);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[1].row, Some(5));
    }

    #[test]
    fn test_unregistered_target_key_does_not_resolve() {
        let tree = tree_with_users(&["u1"]);
        let mut record = ReferenceRecord::new("Orders", "user", "Users", "email");
        record.push(3, "u1");
        assert_eq!(validate_references(&[record], &tree).len(), 1);
    }
}
