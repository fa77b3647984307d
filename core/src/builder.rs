//! Tree construction from a parsed schema and data rows.
//!
//! Each sheet becomes one branch under the sink root, tagged with its
//! title. Each data row becomes one child branch of the sheet. List and
//! record columns expand their embedded JSON literal into further child
//! branches through one recursive path. Branches are readied strictly in
//! post-order: nested elements, then their list/record branch, then the
//! row, then (after the last row) the sheet.

use std::borrow::Cow;

use serde_json::{Map, Value};
use tracing::debug;

use crate::cell::CellValue;
use crate::coerce::coerce;
use crate::diagnostics::{Diagnostic, Issue, SchemaIssue, StructuralIssue};
use crate::pipeline::SHEET_NAME_KEY;
use crate::schema::parse_schema;
use crate::sink::{BranchHeader, BranchId, Result, TreeSink};
use crate::types::{ColumnDescriptor, ColumnShape, ListItem, ScalarType, SheetSchema};
use crate::validate::ReferenceRecord;
use crate::workbook::{HEADER_ROWS, Sheet};

/// Key registered on row branches that own list/record children, and set on
/// each such child to the column name.
pub const BRANCH_NAME_KEY: &str = "branchName";

static ABSENT: CellValue = CellValue::Absent;

/// Everything one sheet build produced.
#[derive(Debug, Clone)]
pub struct SheetBuild {
    pub branch: BranchId,
    pub schema: SheetSchema,
    pub rows: usize,
    pub references: Vec<ReferenceRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-sheet accumulator for reference values and diagnostics.
///
/// Passed into every row build and handed back to the caller afterwards;
/// nothing is shared between sheets.
#[derive(Debug, Clone)]
pub struct SheetContext {
    sheet: String,
    row: usize,
    references: Vec<ReferenceRecord>,
    diagnostics: Vec<Diagnostic>,
}

impl SheetContext {
    /// Creates a context with one empty [`ReferenceRecord`] per reference
    /// column of `schema`, nested columns included.
    pub fn new(sheet: impl Into<String>, schema: &SheetSchema) -> Self {
        let sheet = sheet.into();
        let mut references = Vec::new();
        collect_references(&sheet, schema.descriptors(), None, &mut references);
        Self {
            sheet,
            row: 0,
            references,
            diagnostics: Vec::new(),
        }
    }

    /// Sets the 1-based spreadsheet row used to locate findings.
    pub fn set_row(&mut self, row: usize) {
        self.row = row;
    }

    pub fn references(&self) -> &[ReferenceRecord] {
        &self.references
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (Vec<ReferenceRecord>, Vec<Diagnostic>) {
        (self.references, self.diagnostics)
    }

    fn report(&mut self, path: &ColumnPath, issue: impl Into<Issue>) {
        self.diagnostics.push(
            Diagnostic::new(self.sheet.as_str(), issue)
                .at_row(self.row)
                .in_column(path.display.as_str()),
        );
    }

    fn record_reference(&mut self, path: &ColumnPath, value: &str) {
        let row = self.row;
        if let Some(record) = self
            .references
            .iter_mut()
            .find(|r| r.source_column == path.schema)
        {
            record.push(row, value);
        }
    }
}

fn collect_references<'a>(
    sheet: &str,
    descriptors: impl IntoIterator<Item = &'a ColumnDescriptor>,
    prefix: Option<&str>,
    out: &mut Vec<ReferenceRecord>,
) {
    for descriptor in descriptors {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{}", descriptor.name),
            None => descriptor.name.clone(),
        };
        if let Some(ref reference) = descriptor.reference {
            out.push(ReferenceRecord::new(
                sheet,
                path.as_str(),
                reference.sheet.as_str(),
                reference.key.as_str(),
            ));
        }
        match descriptor.shape {
            ColumnShape::Record(ref fields) | ColumnShape::List(ListItem::Record(ref fields)) => {
                collect_references(sheet, fields, Some(&path), out);
            }
            _ => {}
        }
    }
}

/// Column location: `schema` joins field names (`items.sku`) and keys
/// reference records; `display` adds element indexes (`items[2].sku`).
#[derive(Debug, Clone)]
struct ColumnPath {
    schema: String,
    display: String,
}

impl ColumnPath {
    fn root(name: &str) -> Self {
        Self {
            schema: name.to_string(),
            display: name.to_string(),
        }
    }

    fn field(&self, name: &str) -> Self {
        Self {
            schema: format!("{}.{name}", self.schema),
            display: format!("{}.{name}", self.display),
        }
    }

    fn element(&self, index: usize) -> Self {
        Self {
            schema: self.schema.clone(),
            display: format!("{}[{index}]", self.display),
        }
    }
}

/// Parses the header rows of `sheet`, locating each header problem on row 1.
pub fn sheet_schema(sheet: &Sheet) -> (SheetSchema, Vec<Diagnostic>) {
    let Some((types, names)) = sheet.header_rows() else {
        return (
            SheetSchema::default(),
            vec![Diagnostic::new(sheet.name.as_str(), SchemaIssue::MissingHeaderRows)],
        );
    };
    let (schema, issues) = parse_schema(&types, &names);
    let diagnostics = issues
        .into_iter()
        .map(|issue| {
            let column = issue.label();
            Diagnostic::new(sheet.name.as_str(), issue.issue)
                .at_row(1)
                .in_column(column)
        })
        .collect();
    (schema, diagnostics)
}

/// Builds one sheet under the sink root.
///
/// The sheet branch is tagged `sheetName = <title>`, registers every
/// declared key column in header order, declares the scalar columns on its
/// header, gets one child per data row, and is readied last.
///
/// # Errors
///
/// Returns a [`SinkError`](crate::SinkError) only when the sink rejects an
/// operation; bad data never fails the build.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sheet_tree_core::builder::build_sheet;
/// use sheet_tree_core::{DataTree, Sheet, TreeSink};
///
/// let sheet = Sheet::from_json_rows("Users", &[
///     json!(["Key", "Int"]),
///     json!(["id", "age"]),
///     json!(["u1", 30]),
///     json!(["u2", 41]),
/// ]);
/// let mut tree = DataTree::new();
/// let build = build_sheet(&mut tree, &sheet).unwrap();
///
/// assert_eq!(build.rows, 2);
/// assert!(build.diagnostics.is_empty());
/// assert!(tree.has_branch(build.branch, "id", "u2"));
/// ```
pub fn build_sheet<S: TreeSink>(sink: &mut S, sheet: &Sheet) -> Result<SheetBuild> {
    let root = sink.root();
    let branch = sink.grow_branch(root)?;
    sink.set_hash(branch, SHEET_NAME_KEY, &sheet.name)?;

    let (schema, header_diagnostics) = sheet_schema(sheet);
    for key in schema.key_names() {
        sink.add_key(branch, key)?;
    }
    sink.set_header(branch, BranchHeader::from_descriptors(schema.descriptors()))?;

    let mut ctx = SheetContext::new(sheet.name.as_str(), &schema);
    ctx.diagnostics = header_diagnostics;

    let rows = sheet.data_rows();
    for (index, values) in rows.iter().enumerate() {
        ctx.set_row(index + HEADER_ROWS + 1);
        build_row(sink, branch, &schema, values, &mut ctx)?;
    }
    sink.branch_ready(branch)?;

    debug!(
        sheet = %sheet.name,
        columns = schema.len(),
        rows = rows.len(),
        diagnostics = ctx.diagnostics.len(),
        "Built sheet"
    );

    let (references, diagnostics) = ctx.into_parts();
    Ok(SheetBuild {
        branch,
        schema,
        rows: rows.len(),
        references,
        diagnostics,
    })
}

/// Builds and readies one row branch under `parent`.
///
/// Columns are visited in header order; a cell missing from a short row
/// reads as absent.
///
/// # Errors
///
/// Returns a [`SinkError`](crate::SinkError) when the sink rejects an
/// operation.
pub fn build_row<S: TreeSink>(
    sink: &mut S,
    parent: BranchId,
    schema: &SheetSchema,
    values: &[CellValue],
    ctx: &mut SheetContext,
) -> Result<BranchId> {
    let branch = sink.grow_branch(parent)?;
    if schema.has_nested() {
        sink.add_key(branch, BRANCH_NAME_KEY)?;
    }

    for column in &schema.columns {
        let descriptor = &column.descriptor;
        let cell = values.get(column.position).unwrap_or(&ABSENT);
        let path = ColumnPath::root(&descriptor.name);
        match descriptor.shape {
            ColumnShape::Scalar(scalar_type) => {
                set_scalar(sink, branch, descriptor, scalar_type, cell, &path, ctx)?;
            }
            _ => match literal_from_cell(cell) {
                Ok(literal) => build_nested(sink, branch, descriptor, &literal, &path, ctx)?,
                Err(issue) => ctx.report(&path, issue),
            },
        }
    }

    sink.branch_ready(branch)?;
    Ok(branch)
}

fn set_scalar<S: TreeSink>(
    sink: &mut S,
    branch: BranchId,
    descriptor: &ColumnDescriptor,
    scalar_type: ScalarType,
    cell: &CellValue,
    path: &ColumnPath,
    ctx: &mut SheetContext,
) -> Result<()> {
    let coerced = coerce(scalar_type, cell);
    match coerced.issue {
        Some(issue) => ctx.report(path, issue),
        None if descriptor.reference.is_some() => {
            if let Some(text) = coerced.value.as_text() {
                ctx.record_reference(path, text);
            }
        }
        None => {}
    }
    sink.set_value(branch, &descriptor.name, coerced.value)
}

fn build_nested<S: TreeSink>(
    sink: &mut S,
    parent: BranchId,
    descriptor: &ColumnDescriptor,
    literal: &Value,
    path: &ColumnPath,
    ctx: &mut SheetContext,
) -> Result<()> {
    match descriptor.shape {
        ColumnShape::Scalar(_) => Ok(()),
        ColumnShape::List(ref item) => {
            let Value::Array(elements) = literal else {
                ctx.report(path, wrong_shape("array"));
                return Ok(());
            };
            let list = sink.grow_branch(parent)?;
            sink.set_hash(list, BRANCH_NAME_KEY, &descriptor.name)?;
            match item {
                ListItem::Scalar(scalar_type) => {
                    for (index, element) in elements.iter().enumerate() {
                        let coerced = coerce(*scalar_type, &CellValue::from_json(element));
                        if let Some(issue) = coerced.issue {
                            ctx.report(&path.element(index), issue);
                        }
                        sink.push_element(list, coerced.value)?;
                    }
                }
                ListItem::Record(fields) => {
                    sink.set_header(list, BranchHeader::from_descriptors(fields))?;
                    for field in fields.iter().filter(|f| f.is_key) {
                        sink.add_key(list, &field.name)?;
                    }
                    for (index, element) in elements.iter().enumerate() {
                        let element_path = path.element(index);
                        let Value::Object(object) = element else {
                            ctx.report(&element_path, StructuralIssue::ElementNotRecord { index });
                            continue;
                        };
                        let leaf = sink.grow_branch(list)?;
                        populate_record(sink, leaf, fields, object, &element_path, ctx)?;
                        sink.branch_ready(leaf)?;
                    }
                }
            }
            sink.branch_ready(list)
        }
        ColumnShape::Record(ref fields) => {
            let Value::Object(object) = literal else {
                ctx.report(path, wrong_shape("object"));
                return Ok(());
            };
            let record = sink.grow_branch(parent)?;
            sink.set_hash(record, BRANCH_NAME_KEY, &descriptor.name)?;
            populate_record(sink, record, fields, object, path, ctx)?;
            sink.branch_ready(record)
        }
    }
}

/// Sets each declared field present in `object`; absent and `null` fields
/// are skipped.
fn populate_record<S: TreeSink>(
    sink: &mut S,
    branch: BranchId,
    fields: &[ColumnDescriptor],
    object: &Map<String, Value>,
    path: &ColumnPath,
    ctx: &mut SheetContext,
) -> Result<()> {
    if fields.iter().any(ColumnDescriptor::is_nested) {
        sink.add_key(branch, BRANCH_NAME_KEY)?;
    }
    for field in fields {
        let Some(value) = object.get(&field.name).filter(|v| !v.is_null()) else {
            continue;
        };
        let field_path = path.field(&field.name);
        match field.shape {
            ColumnShape::Scalar(scalar_type) => {
                let cell = CellValue::from_json(value);
                set_scalar(sink, branch, field, scalar_type, &cell, &field_path, ctx)?;
            }
            _ => match literal_from_json(value) {
                Ok(literal) => build_nested(sink, branch, field, &literal, &field_path, ctx)?,
                Err(issue) => ctx.report(&field_path, issue),
            },
        }
    }
    Ok(())
}

fn literal_from_cell(cell: &CellValue) -> std::result::Result<Value, StructuralIssue> {
    match cell {
        CellValue::Absent => Err(StructuralIssue::MissingLiteral),
        CellValue::Str(text) if text.trim().is_empty() => Err(StructuralIssue::MissingLiteral),
        CellValue::Str(text) => parse_literal(text),
        other => Err(StructuralIssue::MalformedLiteral {
            reason: format!(
                "expected JSON text, found '{}'",
                other.text().unwrap_or_default()
            ),
        }),
    }
}

fn literal_from_json(value: &Value) -> std::result::Result<Cow<'_, Value>, StructuralIssue> {
    match value {
        Value::String(text) => parse_literal(text).map(Cow::Owned),
        other => Ok(Cow::Borrowed(other)),
    }
}

fn parse_literal(text: &str) -> std::result::Result<Value, StructuralIssue> {
    serde_json::from_str(text).map_err(|e| StructuralIssue::MalformedLiteral {
        reason: e.to_string(),
    })
}

fn wrong_shape(expected: &str) -> StructuralIssue {
    StructuralIssue::WrongLiteralShape {
        expected: expected.to_string(),
    }
}
