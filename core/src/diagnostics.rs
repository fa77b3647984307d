//! Non-fatal diagnostics collected during schema parsing, coercion, tree
//! construction, and reference validation.
//!
//! Every stage returns its findings as data alongside the value it built.
//! Nothing here unwinds construction; callers decide whether to log, report,
//! or fail on them.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::types::ScalarType;

/// Problems found while reading the two header rows.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum SchemaIssue {
    /// Type token is not one of the recognized scalar types.
    #[error("unrecognized header type '{token}'")]
    UnrecognizedType { token: String },
    /// `Ref(...)` wrapper does not contain exactly one `sheet,key` pair.
    #[error("malformed reference declaration '{text}'")]
    MalformedReference { text: String },
    /// `[...]` or `{...}` header literal failed to parse.
    #[error("malformed nested header '{text}': {reason}")]
    MalformedNestedHeader { text: String, reason: String },
    /// A second column reuses a name already declared in the same schema.
    #[error("duplicate column name '{name}'")]
    DuplicateColumn { name: String },
    /// Name contains `.`, the separator of nested column paths.
    #[error("column name '{name}' must not contain '.'")]
    InvalidColumnName { name: String },
    /// Type cell is set but the name cell is empty.
    #[error("column type '{token}' has no name")]
    MissingColumnName { token: String },
    /// Sheet has fewer than the two required header rows.
    #[error("sheet has fewer than two header rows")]
    MissingHeaderRows,
}

/// Values outside the expected shape for their declared type.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum CoercionIssue {
    #[error("empty hash")]
    EmptyHash,
    #[error("integer cell has unexpected value {value}")]
    NonInteger { value: f64 },
    #[error("{expected} cell has non-numeric value '{text}', using 0")]
    NotNumeric { expected: ScalarType, text: String },
    #[error("boolean cell has unexpected string '{text}', treated as 'true'")]
    UnexpectedBoolString { text: String },
}

/// Malformed or absent nested list/record literals.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum StructuralIssue {
    #[error("missing nested literal")]
    MissingLiteral,
    #[error("malformed nested literal: {reason}")]
    MalformedLiteral { reason: String },
    #[error("nested literal is not a JSON {expected}")]
    WrongLiteralShape { expected: String },
    #[error("list element {index} is not an object")]
    ElementNotRecord { index: usize },
}

/// Unresolved cross-sheet references.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ReferenceIssue {
    #[error("missing sheet reference: {target_sheet}")]
    MissingSheet { target_sheet: String },
    #[error("missing ref: sheet {target_sheet}, key {key}, value {value}")]
    MissingRef {
        target_sheet: String,
        key: String,
        value: String,
    },
}

/// Diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Schema,
    Coercion,
    Structural,
    Reference,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Coercion => write!(f, "coercion"),
            Self::Structural => write!(f, "structural"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// Issue payload of a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Issue {
    #[error(transparent)]
    Schema(SchemaIssue),
    #[error(transparent)]
    Coercion(CoercionIssue),
    #[error(transparent)]
    Structural(StructuralIssue),
    #[error(transparent)]
    Reference(ReferenceIssue),
}

impl Issue {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::Schema(_) => DiagnosticKind::Schema,
            Self::Coercion(_) => DiagnosticKind::Coercion,
            Self::Structural(_) => DiagnosticKind::Structural,
            Self::Reference(_) => DiagnosticKind::Reference,
        }
    }
}

impl From<SchemaIssue> for Issue {
    fn from(issue: SchemaIssue) -> Self {
        Self::Schema(issue)
    }
}

impl From<CoercionIssue> for Issue {
    fn from(issue: CoercionIssue) -> Self {
        Self::Coercion(issue)
    }
}

impl From<StructuralIssue> for Issue {
    fn from(issue: StructuralIssue) -> Self {
        Self::Structural(issue)
    }
}

impl From<ReferenceIssue> for Issue {
    fn from(issue: ReferenceIssue) -> Self {
        Self::Reference(issue)
    }
}

/// A located, non-fatal finding.
///
/// `row` is the 1-based row number as shown in a spreadsheet UI. For nested
/// fields `column` is the dotted path, e.g. `items.qty`.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::{CoercionIssue, Diagnostic, DiagnosticKind};
///
/// let d = Diagnostic::new("Orders", CoercionIssue::EmptyHash)
///     .at_row(3)
///     .in_column("user");
/// assert_eq!(d.kind(), DiagnosticKind::Coercion);
/// assert_eq!(d.to_string(), "[coercion] sheet 'Orders', row 3, column 'user': empty hash");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub sheet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub issue: Issue,
}

impl Diagnostic {
    pub fn new(sheet: impl Into<String>, issue: impl Into<Issue>) -> Self {
        Self {
            sheet: sheet.into(),
            row: None,
            column: None,
            issue: issue.into(),
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.issue.kind()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] sheet '{}'", self.kind(), self.sheet)?;
        if let Some(row) = self.row {
            write!(f, ", row {row}")?;
        }
        if let Some(ref column) = self.column {
            write!(f, ", column '{column}'")?;
        }
        write!(f, ": {}", self.issue)
    }
}

/// Per-category diagnostic totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct DiagnosticCounts {
    pub schema: usize,
    pub coercion: usize,
    pub structural: usize,
    pub reference: usize,
}

impl DiagnosticCounts {
    pub fn from_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> Self {
        let mut counts = Self::default();
        for diagnostic in diagnostics {
            match diagnostic.kind() {
                DiagnosticKind::Schema => counts.schema += 1,
                DiagnosticKind::Coercion => counts.coercion += 1,
                DiagnosticKind::Structural => counts.structural += 1,
                DiagnosticKind::Reference => counts.reference += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.schema + self.coercion + self.structural + self.reference
    }
}
