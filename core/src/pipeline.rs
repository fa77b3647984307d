//! Whole-workbook build: every allowed sheet, then one validation pass.

use serde::Serialize;
use tracing::{debug, info};

use crate::builder::build_sheet;
use crate::diagnostics::{Diagnostic, DiagnosticCounts};
use crate::sink::{Result, TreeSink};
use crate::validate::{ReferenceRecord, validate_references};
use crate::workbook::Workbook;

/// Key registered on the sink root; each sheet branch carries its title
/// under it.
pub const SHEET_NAME_KEY: &str = "sheetName";

/// Sheet selection applied before building.
///
/// `exclude` wins over `include`; an empty `include` admits every sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrowOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl GrowOptions {
    pub fn is_sheet_allowed(&self, name: &str) -> bool {
        if self.exclude.iter().any(|s| s == name) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|s| s == name)
    }
}

/// What one sheet contributed to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub columns: usize,
    pub rows: usize,
    pub keys: Vec<String>,
}

/// Result of [`grow_tree`]: per-sheet summaries, every accumulated reference
/// record, and all diagnostics in discovery order (sheet build findings
/// first, reference findings last).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GrowReport {
    pub sheets: Vec<SheetSummary>,
    pub references: Vec<ReferenceRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl GrowReport {
    pub fn counts(&self) -> DiagnosticCounts {
        DiagnosticCounts::from_diagnostics(&self.diagnostics)
    }

    pub fn has_reference_issues(&self) -> bool {
        self.counts().reference > 0
    }
}

/// Builds every allowed sheet of `workbook` into `sink`, then validates all
/// accumulated references against the finished tree.
///
/// The root is keyed by [`SHEET_NAME_KEY`] and is never readied.
///
/// # Errors
///
/// Returns a [`SinkError`](crate::SinkError) only when the sink rejects an
/// operation.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sheet_tree_core::{DataTree, GrowOptions, Sheet, Workbook, grow_tree};
///
/// let workbook = Workbook::new(vec![
///     Sheet::from_json_rows("Users", &[json!(["Key"]), json!(["id"]), json!(["u41"])]),
///     Sheet::from_json_rows("Orders", &[
///         json!(["Key", "Ref(Users,id)"]),
///         json!(["id", "user"]),
///         json!(["o1", "u42"]),
///     ]),
/// ]);
/// let mut tree = DataTree::new();
/// let report = grow_tree(&workbook, &mut tree, &GrowOptions::default()).unwrap();
///
/// assert_eq!(report.sheets.len(), 2);
/// assert_eq!(report.diagnostics.len(), 1);
/// assert_eq!(
///     report.diagnostics[0].issue.to_string(),
///     "missing ref: sheet Users, key id, value u42"
/// );
/// ```
pub fn grow_tree<S: TreeSink>(
    workbook: &Workbook,
    sink: &mut S,
    options: &GrowOptions,
) -> Result<GrowReport> {
    let root = sink.root();
    sink.add_key(root, SHEET_NAME_KEY)?;

    let mut report = GrowReport::default();
    for sheet in &workbook.sheets {
        if !options.is_sheet_allowed(&sheet.name) {
            debug!(sheet = %sheet.name, "Skipping excluded sheet");
            continue;
        }
        let build = build_sheet(sink, sheet)?;
        report.sheets.push(SheetSummary {
            name: sheet.name.clone(),
            columns: build.schema.len(),
            rows: build.rows,
            keys: build.schema.key_names().map(str::to_string).collect(),
        });
        report.references.extend(build.references);
        report.diagnostics.extend(build.diagnostics);
    }

    let unresolved = validate_references(&report.references, sink);
    report.diagnostics.extend(unresolved);

    let counts = report.counts();
    info!(
        sheets = report.sheets.len(),
        references = report.references.len(),
        schema = counts.schema,
        coercion = counts.coercion,
        structural = counts.structural,
        reference = counts.reference,
        "Grew tree"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DataTree;
    use crate::workbook::Sheet;
    use serde_json::json;

    fn users() -> Sheet {
        Sheet::from_json_rows(
            "Users",
            &[json!(["Key", "String"]), json!(["id", "name"]), json!(["u41", "Ann"])],
        )
    }

    fn orders(user: &str) -> Sheet {
        Sheet::from_json_rows(
            "Orders",
            &[
                json!(["Key", "Ref(Users,id)"]),
                json!(["id", "user"]),
                json!(["o1", user]),
            ],
        )
    }

    #[test]
    fn test_sheet_filter_exclude_wins() {
        let options = GrowOptions {
            include: vec!["A".into(), "B".into()],
            exclude: vec!["B".into()],
        };
        assert!(options.is_sheet_allowed("A"));
        assert!(!options.is_sheet_allowed("B"));
        assert!(!options.is_sheet_allowed("C"));
        assert!(GrowOptions::default().is_sheet_allowed("C"));
    }

    #[test]
    fn test_forward_reference_resolves_after_all_sheets() {
        let workbook = Workbook::new(vec![orders("u41"), users()]);
        let mut tree = DataTree::new();
        let report = grow_tree(&workbook, &mut tree, &GrowOptions::default()).unwrap();
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.references[0].values, vec!["u41"]);
        assert!(tree.is_complete());
    }

    #[test]
    fn test_excluded_target_sheet_reports_missing_sheet() {
        let workbook = Workbook::new(vec![users(), orders("u41")]);
        let options = GrowOptions {
            exclude: vec!["Users".into()],
            ..GrowOptions::default()
        };
        let mut tree = DataTree::new();
        let report = grow_tree(&workbook, &mut tree, &options).unwrap();
        assert_eq!(report.sheets.len(), 1);
        assert!(report.has_reference_issues());
        assert_eq!(report.counts().total(), 1);
    }

    #[test]
    fn test_summary_lists_keys() {
        let mut tree = DataTree::new();
        let report = grow_tree(&Workbook::new(vec![users()]), &mut tree, &GrowOptions::default())
            .unwrap();
        assert_eq!(
            report.sheets[0],
            SheetSummary {
                name: "Users".into(),
                columns: 2,
                rows: 1,
                keys: vec!["id".into()],
            }
        );
    }

    #[test]
    fn test_empty_workbook_yields_empty_root() {
        let mut tree = DataTree::new();
        let report = grow_tree(&Workbook::default(), &mut tree, &GrowOptions::default()).unwrap();
        assert!(report.sheets.is_empty());
        assert!(tree.is_empty());
        assert_eq!(tree.root_view().keys(), [SHEET_NAME_KEY.to_string()]);
    }
}
