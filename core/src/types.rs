//! Column schema and scalar type definitions.
//!
//! This module defines the data model shared by the schema parser, the
//! coercion engine, and the tree builder. Column shapes are a tagged variant
//! so that nested list and record columns recurse through one build path.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::cell::format_number;

/// Scalar column types recognized in a header type row.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::ScalarType;
///
/// assert_eq!(ScalarType::from_token("int"), Some((ScalarType::Int, false)));
/// assert_eq!(ScalarType::from_token("KEY"), Some((ScalarType::Hash, true)));
/// assert_eq!(ScalarType::from_token("Date"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarType {
    /// Identifier string, stored in hashed form by the sink.
    Hash,
    /// Integer-declared number.
    Int,
    Float,
    Bool,
    String,
}

impl ScalarType {
    /// Parses a type token, case-insensitively.
    ///
    /// Returns the scalar type and whether the token declared a key column.
    /// `Key` is a `Hash` column that is also registered as a lookup key.
    pub fn from_token(token: &str) -> Option<(Self, bool)> {
        let token = token.trim();
        let parsed = match token.to_ascii_lowercase().as_str() {
            "key" => (Self::Hash, true),
            "hash" => (Self::Hash, false),
            "int" => (Self::Int, false),
            "float" => (Self::Float, false),
            "bool" => (Self::Bool, false),
            "string" => (Self::String, false),
            _ => return None,
        };
        Some(parsed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "Hash",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Bool => "Bool",
            Self::String => "String",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced, strictly typed value ready to be stored on a branch.
///
/// `Int` keeps the numeric value as read: a fractional value in an integer
/// column is flagged during coercion but never truncated.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Hash(String),
    Int(f64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Hash(_) => ScalarType::Hash,
            Self::Int(_) => ScalarType::Int,
            Self::Float(_) => ScalarType::Float,
            Self::Bool(_) => ScalarType::Bool,
            Self::String(_) => ScalarType::String,
        }
    }

    /// Returns the text of a `Hash` or `String` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Hash(s) | Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as text regardless of type.
    pub fn to_text(&self) -> String {
        match self {
            Self::Hash(s) | Self::String(s) => s.clone(),
            Self::Int(n) | Self::Float(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Hash(s) | Self::String(s) => serializer.serialize_str(s),
            Self::Int(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Int(n) | Self::Float(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Cross-sheet reference target declared with `Ref(sheet,key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub sheet: String,
    pub key: String,
}

impl Reference {
    pub fn new(sheet: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            key: key.into(),
        }
    }
}

/// Element shape of a list column.
///
/// Adjacently tagged (`item` / `shape`) so it nests inside [`ColumnShape`]
/// when written as YAML.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "item", content = "shape", rename_all = "snake_case")]
pub enum ListItem {
    /// Positional, unnamed scalar elements.
    Scalar(ScalarType),
    /// One record branch per element.
    Record(Vec<ColumnDescriptor>),
}

/// Structural shape of a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum ColumnShape {
    Scalar(ScalarType),
    List(ListItem),
    Record(Vec<ColumnDescriptor>),
}

/// One typed, named column.
///
/// Invariants: `reference.is_some()` implies a `Hash` scalar shape, and
/// `is_key` implies a `Hash` scalar shape.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::{ColumnDescriptor, ScalarType};
///
/// let user = ColumnDescriptor::reference("user", "Users", "id");
/// assert_eq!(user.scalar_type(), Some(ScalarType::Hash));
/// assert_eq!(user.reference.as_ref().unwrap().sheet, "Users");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub shape: ColumnShape,
    pub is_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
}

impl ColumnDescriptor {
    pub fn scalar(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            shape: ColumnShape::Scalar(scalar_type),
            is_key: false,
            reference: None,
        }
    }

    /// A `Hash` column registered as a lookup key.
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            is_key: true,
            ..Self::scalar(name, ScalarType::Hash)
        }
    }

    /// A `Hash` column pointing at `key` in sheet `sheet`.
    pub fn reference(
        name: impl Into<String>,
        sheet: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            reference: Some(Reference::new(sheet, key)),
            ..Self::scalar(name, ScalarType::Hash)
        }
    }

    pub fn list(name: impl Into<String>, item: ListItem) -> Self {
        Self {
            name: name.into(),
            shape: ColumnShape::List(item),
            is_key: false,
            reference: None,
        }
    }

    pub fn record(name: impl Into<String>, fields: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            shape: ColumnShape::Record(fields),
            is_key: false,
            reference: None,
        }
    }

    /// Returns the scalar type for scalar columns.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.shape {
            ColumnShape::Scalar(t) => Some(t),
            _ => None,
        }
    }

    /// Whether the column expands into child branches.
    pub fn is_nested(&self) -> bool {
        !matches!(self.shape, ColumnShape::Scalar(_))
    }
}

/// A column descriptor bound to its source column position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetColumn {
    /// Zero-based column index in the source grid.
    pub position: usize,
    #[serde(flatten)]
    pub descriptor: ColumnDescriptor,
}

/// Ordered column schema for one sheet, built from its two header rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetSchema {
    pub columns: Vec<SheetColumn>,
}

impl SheetSchema {
    /// Builds a schema whose columns sit at consecutive positions.
    pub fn from_descriptors(descriptors: Vec<ColumnDescriptor>) -> Self {
        let columns = descriptors
            .into_iter()
            .enumerate()
            .map(|(position, descriptor)| SheetColumn {
                position,
                descriptor,
            })
            .collect();
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().map(|c| &c.descriptor)
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.descriptors().find(|d| d.name == name)
    }

    /// Declared key names in header order.
    pub fn key_names(&self) -> impl Iterator<Item = &str> {
        self.descriptors()
            .filter(|d| d.is_key)
            .map(|d| d.name.as_str())
    }

    /// Whether any column expands into child branches.
    pub fn has_nested(&self) -> bool {
        self.descriptors().any(ColumnDescriptor::is_nested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parsing_is_case_insensitive() {
        for token in ["Int", "int", "INT", " iNt "] {
            assert_eq!(ScalarType::from_token(token), Some((ScalarType::Int, false)));
        }
        assert_eq!(ScalarType::from_token("Key"), Some((ScalarType::Hash, true)));
        assert_eq!(ScalarType::from_token("List"), None);
    }

    #[test]
    fn test_scalar_serializes_integral_int_as_integer() {
        assert_eq!(serde_json::to_string(&Scalar::Int(3.0)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Scalar::Int(2.5)).unwrap(), "2.5");
        assert_eq!(serde_json::to_string(&Scalar::Float(1.0)).unwrap(), "1.0");
        assert_eq!(
            serde_json::to_string(&Scalar::Hash("u1".into())).unwrap(),
            "\"u1\""
        );
    }

    #[test]
    fn test_schema_key_names_follow_header_order() {
        let schema = SheetSchema::from_descriptors(vec![
            ColumnDescriptor::key("id"),
            ColumnDescriptor::scalar("name", ScalarType::String),
            ColumnDescriptor::key("code"),
        ]);
        assert_eq!(schema.key_names().collect::<Vec<_>>(), vec!["id", "code"]);
        assert!(!schema.has_nested());
        assert_eq!(schema.column("name").unwrap().scalar_type(), Some(ScalarType::String));
    }

    #[test]
    fn test_nested_detection() {
        let schema = SheetSchema::from_descriptors(vec![ColumnDescriptor::list(
            "tags",
            ListItem::Scalar(ScalarType::String),
        )]);
        assert!(schema.has_nested());
    }

    #[test]
    fn test_list_shapes_serialize_as_yaml() {
        let schema = SheetSchema::from_descriptors(vec![
            ColumnDescriptor::list("qty", ListItem::Scalar(ScalarType::Int)),
            ColumnDescriptor::list(
                "items",
                ListItem::Record(vec![ColumnDescriptor::key("s")]),
            ),
        ]);
        let yaml = serde_yaml::to_string(&schema).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        let qty = &value["columns"][0]["shape"];
        assert_eq!(qty["kind"], "list");
        assert_eq!(qty["of"]["item"], "scalar");
        assert_eq!(qty["of"]["shape"], "Int");

        let items = &value["columns"][1]["shape"];
        assert_eq!(items["of"]["item"], "record");
        assert_eq!(items["of"]["shape"][0]["name"], "s");
        assert_eq!(items["of"]["shape"][0]["is_key"], true);
    }

    #[test]
    fn test_column_shape_json_is_tagged_by_kind() {
        let column = ColumnDescriptor::scalar("total", ScalarType::Float);
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["shape"], serde_json::json!({"kind": "scalar", "of": "Float"}));
    }
}
