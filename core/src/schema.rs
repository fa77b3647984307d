//! Header parsing: two rows of type and name cells into a [`SheetSchema`].
//!
//! The type row accepts scalar tokens (`Key`, `Hash`, `Int`, `Float`,
//! `Bool`, `String`, case-insensitive), reference wrappers
//! (`Ref(Sheet,key)`), list literals (`["Int"]`, `[{"a":"Int"}]`), and
//! record literals (`{"a":"Int","b":"String"}`). A bad column is reported
//! and dropped; parsing never aborts.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::diagnostics::SchemaIssue;
use crate::types::{ColumnDescriptor, ListItem, Reference, ScalarType, SheetColumn, SheetSchema};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Ref\(([^,()]+),([^,()]+)\)$").expect("static regex must compile")
});

/// A header problem tied to a source column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIssue {
    /// Zero-based column index in the header rows.
    pub position: usize,
    /// Declared column name, when the name cell was set.
    pub name: Option<String>,
    pub issue: SchemaIssue,
}

impl HeaderIssue {
    /// Column label for diagnostics: the declared name, or the spreadsheet
    /// column letter when the name is missing.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| column_letter(self.position))
    }
}

/// Parses a type row and a name row into a schema.
///
/// Rows are paired positionally and truncated to the shorter of the two.
/// Columns whose type and name cells are both blank are skipped silently.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::schema::parse_schema;
/// use sheet_tree_core::ScalarType;
///
/// let types = ["Key", "Ref(Users,id)", "Int", "Date"].map(String::from);
/// let names = ["id", "user", "qty", "when"].map(String::from);
/// let (schema, issues) = parse_schema(&types, &names);
///
/// assert_eq!(schema.len(), 3);
/// assert_eq!(issues.len(), 1);
/// let user = schema.column("user").unwrap();
/// assert_eq!(user.scalar_type(), Some(ScalarType::Hash));
/// assert_eq!(user.reference.as_ref().unwrap().key, "id");
/// ```
pub fn parse_schema(type_row: &[String], name_row: &[String]) -> (SheetSchema, Vec<HeaderIssue>) {
    let mut columns = Vec::new();
    let mut issues = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (position, (type_text, name)) in type_row.iter().zip(name_row).enumerate() {
        let type_text = type_text.trim();
        let name = name.trim();

        if type_text.is_empty() && name.is_empty() {
            continue;
        }

        let named = (!name.is_empty()).then(|| name.to_string());
        let mut report = |issue| {
            issues.push(HeaderIssue {
                position,
                name: named.clone(),
                issue,
            })
        };

        if name.is_empty() {
            report(SchemaIssue::MissingColumnName {
                token: type_text.to_string(),
            });
            continue;
        }

        match parse_column(type_text, name) {
            Ok(descriptor) => {
                if !seen.insert(descriptor.name.clone()) {
                    report(SchemaIssue::DuplicateColumn {
                        name: descriptor.name,
                    });
                    continue;
                }
                columns.push(SheetColumn {
                    position,
                    descriptor,
                });
            }
            Err(issue) => report(issue),
        }
    }

    (SheetSchema { columns }, issues)
}

/// Parses one type cell into a column descriptor named `name`.
///
/// # Errors
///
/// Returns the [`SchemaIssue`] describing why the column must be dropped.
pub fn parse_column(type_text: &str, name: &str) -> Result<ColumnDescriptor, SchemaIssue> {
    check_name(name)?;
    let type_text = type_text.trim();

    if type_text.starts_with("Ref") {
        let reference = parse_reference(type_text)?;
        return Ok(ColumnDescriptor {
            reference: Some(reference),
            ..ColumnDescriptor::scalar(name, ScalarType::Hash)
        });
    }

    if type_text.starts_with('[') || type_text.starts_with('{') {
        let value: Value =
            serde_json::from_str(type_text).map_err(|e| SchemaIssue::MalformedNestedHeader {
                text: type_text.to_string(),
                reason: e.to_string(),
            })?;
        return nested_column(name, &value).map_err(|reason| SchemaIssue::MalformedNestedHeader {
            text: type_text.to_string(),
            reason,
        });
    }

    match ScalarType::from_token(type_text) {
        Some((_, true)) => Ok(ColumnDescriptor::key(name)),
        Some((scalar_type, false)) => Ok(ColumnDescriptor::scalar(name, scalar_type)),
        None => Err(SchemaIssue::UnrecognizedType {
            token: type_text.to_string(),
        }),
    }
}

/// Nested values are addressed by dotted paths, so names cannot contain `.`.
fn check_name(name: &str) -> Result<(), SchemaIssue> {
    if name.contains('.') {
        return Err(SchemaIssue::InvalidColumnName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Extracts `(sheet, key)` from a `Ref(sheet,key)` wrapper.
///
/// # Errors
///
/// Returns [`SchemaIssue::MalformedReference`] unless the text is exactly a
/// `Ref(...)` wrapper around one non-empty comma-separated pair.
pub fn parse_reference(text: &str) -> Result<Reference, SchemaIssue> {
    let malformed = || SchemaIssue::MalformedReference {
        text: text.to_string(),
    };
    let captures = REFERENCE_RE.captures(text.trim()).ok_or_else(malformed)?;
    let sheet = captures[1].trim();
    let key = captures[2].trim();
    if sheet.is_empty() || key.is_empty() {
        return Err(malformed());
    }
    Ok(Reference::new(sheet, key))
}

fn nested_column(name: &str, value: &Value) -> Result<ColumnDescriptor, String> {
    match value {
        Value::Array(items) => {
            let [item] = items.as_slice() else {
                return Err(format!(
                    "list header must declare exactly one element type, found {}",
                    items.len()
                ));
            };
            let item = match item {
                Value::String(token) => match ScalarType::from_token(token) {
                    Some((scalar_type, _)) => ListItem::Scalar(scalar_type),
                    None => return Err(format!("unrecognized list element type '{token}'")),
                },
                Value::Object(fields) => ListItem::Record(record_fields(fields)?),
                other => return Err(format!("unsupported list element declaration {other}")),
            };
            Ok(ColumnDescriptor::list(name, item))
        }
        Value::Object(fields) => Ok(ColumnDescriptor::record(name, record_fields(fields)?)),
        other => Err(format!("expected a JSON array or object, found {other}")),
    }
}

fn record_fields(fields: &Map<String, Value>) -> Result<Vec<ColumnDescriptor>, String> {
    if fields.is_empty() {
        return Err("record header declares no fields".to_string());
    }
    fields
        .iter()
        .map(|(field, declared)| match declared {
            Value::String(type_text) => {
                parse_column(type_text, field).map_err(|issue| format!("field '{field}': {issue}"))
            }
            Value::Array(_) | Value::Object(_) => check_name(field)
                .map_err(|issue| issue.to_string())
                .and_then(|()| nested_column(field, declared))
                .map_err(|reason| format!("field '{field}': {reason}")),
            other => Err(format!("field '{field}': unsupported type declaration {other}")),
        })
        .collect()
}

/// Converts a zero-based column index into spreadsheet letters (`0` → `A`,
/// `26` → `AA`).
pub fn column_letter(position: usize) -> String {
    let mut n = position + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
