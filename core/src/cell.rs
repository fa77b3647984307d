//! Uniform cell values.
//!
//! A source cell exposes at most one effective representation: a string, a
//! number, or a boolean. [`CellValue`] normalizes that into a tagged union
//! so every later stage matches on one shape instead of probing optional
//! fields.

use serde_json::Value;

/// One spreadsheet cell after normalization.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::CellValue;
///
/// let cell = CellValue::from_json(&serde_json::json!(42));
/// assert_eq!(cell.number_form(), Some(42.0));
/// assert_eq!(cell.text().as_deref(), Some("42"));
/// assert!(CellValue::from_json(&serde_json::Value::Null).is_absent());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No effective value.
    #[default]
    Absent,
    /// String form.
    Str(String),
    /// Numeric form.
    Num(f64),
    /// Boolean form.
    Bool(bool),
}

impl CellValue {
    /// Converts a JSON scalar into a cell.
    ///
    /// Arrays and objects are kept as their compact JSON text, which is how
    /// nested literals appear when a grid was exported with structured values
    /// already decoded.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Absent, Self::Num),
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Str(value.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn string_form(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn number_form(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn bool_form(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Renders any present form as text, used for header rows.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            Self::Str(s) => Some(s.clone()),
            Self::Num(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
        }
    }

    /// Truth value under the boolean column rules.
    ///
    /// See [`bool_from_forms`] for the precedence between forms.
    pub fn truthiness(&self) -> bool {
        bool_from_forms(self.string_form(), self.number_form(), self.bool_form())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Combines the string, numeric, and boolean forms of a value into one
/// boolean.
///
/// A value is false-ish when its string form equals `false` ignoring case,
/// its number is zero, or its boolean is `false`. It is truthy when its
/// string is non-empty, its number is non-zero, or its boolean is `true`.
/// The result is `truthy && !false_ish`, so an explicit false signal wins
/// over any truthy-looking form.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::cell::bool_from_forms;
///
/// assert!(!bool_from_forms(Some("FALSE"), None, None));
/// assert!(!bool_from_forms(None, Some(0.0), None));
/// assert!(bool_from_forms(Some("true"), Some(5.0), None));
/// assert!(!bool_from_forms(Some("false"), Some(5.0), None));
/// assert!(!bool_from_forms(None, None, None));
/// ```
pub fn bool_from_forms(string: Option<&str>, number: Option<f64>, boolean: Option<bool>) -> bool {
    let is_false = string.is_some_and(|s| s.eq_ignore_ascii_case("false"))
        || number == Some(0.0)
        || boolean == Some(false);
    let is_truthy = string.is_some_and(|s| !s.is_empty())
        || number.is_some_and(|n| n != 0.0 && !n.is_nan())
        || boolean == Some(true);
    is_truthy && !is_false
}

/// Formats a number without a trailing `.0` when it is integral.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
