//! Value coercion: weakly typed cells into strict scalars.
//!
//! Coercion never fails. Every call yields a value, substituting a default
//! where the cell does not fit its declared type, plus at most one
//! [`CoercionIssue`] describing what was substituted or flagged.

use crate::cell::CellValue;
use crate::diagnostics::CoercionIssue;
use crate::types::{Scalar, ScalarType};

/// Result of coercing one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: Scalar,
    pub issue: Option<CoercionIssue>,
}

impl Coerced {
    fn clean(value: Scalar) -> Self {
        Self { value, issue: None }
    }

    fn flagged(value: Scalar, issue: CoercionIssue) -> Self {
        Self {
            value,
            issue: Some(issue),
        }
    }
}

/// Coerces a cell to `scalar_type`.
///
/// | Type | Absent | Fallback rules |
/// |------|--------|----------------|
/// | `Hash` | `""`, flagged empty | string verbatim; numbers and booleans as text |
/// | `Int` | `0` | number or numeric string; non-integers flagged, not truncated |
/// | `Float` | `0.0` | number or numeric string, verbatim |
/// | `Bool` | `false` | see [`bool_from_forms`](crate::cell::bool_from_forms) |
/// | `String` | `""` | string form verbatim, otherwise `""` |
///
/// A numeric string is any string that parses as a finite number once
/// trimmed. Anything else in an `Int` or `Float` column, including `"NaN"`
/// and `"inf"`, is flagged and becomes `0`. A `Bool` column flags any
/// non-empty string other than `true`, `TRUE`, `false` or `FALSE`.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::coerce::coerce;
/// use sheet_tree_core::{CellValue, Scalar, ScalarType};
///
/// let c = coerce(ScalarType::Int, &CellValue::Num(2.5));
/// assert_eq!(c.value, Scalar::Int(2.5));
/// assert!(c.issue.is_some());
///
/// let c = coerce(ScalarType::Bool, &CellValue::from("FALSE"));
/// assert_eq!(c.value, Scalar::Bool(false));
/// ```
pub fn coerce(scalar_type: ScalarType, cell: &CellValue) -> Coerced {
    match scalar_type {
        ScalarType::Hash => coerce_hash(cell),
        ScalarType::Int => coerce_int(cell),
        ScalarType::Float => coerce_float(cell),
        ScalarType::Bool => coerce_bool(cell),
        ScalarType::String => Coerced::clean(Scalar::String(
            cell.string_form().unwrap_or_default().to_string(),
        )),
    }
}

fn coerce_hash(cell: &CellValue) -> Coerced {
    match cell.text() {
        Some(text) => Coerced::clean(Scalar::Hash(text)),
        None => Coerced::flagged(Scalar::Hash(String::new()), CoercionIssue::EmptyHash),
    }
}

fn coerce_int(cell: &CellValue) -> Coerced {
    match numeric(cell, ScalarType::Int) {
        Ok(n) if n.fract() != 0.0 => {
            Coerced::flagged(Scalar::Int(n), CoercionIssue::NonInteger { value: n })
        }
        Ok(n) => Coerced::clean(Scalar::Int(n)),
        Err(issue) => Coerced::flagged(Scalar::Int(0.0), issue),
    }
}

fn coerce_float(cell: &CellValue) -> Coerced {
    match numeric(cell, ScalarType::Float) {
        Ok(n) => Coerced::clean(Scalar::Float(n)),
        Err(issue) => Coerced::flagged(Scalar::Float(0.0), issue),
    }
}

/// Numeric form of a cell. NaN and infinities are not numbers here, whether
/// stored or spelled out as `"NaN"` or `"inf"`.
fn numeric(cell: &CellValue, expected: ScalarType) -> Result<f64, CoercionIssue> {
    let not_numeric = |text: String| CoercionIssue::NotNumeric { expected, text };
    match cell {
        CellValue::Absent => Ok(0.0),
        CellValue::Num(n) if n.is_finite() => Ok(*n),
        CellValue::Num(n) => Err(not_numeric(n.to_string())),
        CellValue::Str(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(not_numeric(s.clone())),
        },
        CellValue::Bool(b) => Err(not_numeric(b.to_string())),
    }
}

/// String forms a `Bool` column accepts without a warning.
const BOOL_LITERALS: [&str; 4] = ["true", "TRUE", "false", "FALSE"];

fn coerce_bool(cell: &CellValue) -> Coerced {
    let value = Scalar::Bool(cell.truthiness());
    match cell.string_form() {
        Some(s) if !s.is_empty() && !BOOL_LITERALS.contains(&s) => {
            Coerced::flagged(value, CoercionIssue::UnexpectedBoolString { text: s.to_string() })
        }
        _ => Coerced::clean(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_string_verbatim() {
        let c = coerce(ScalarType::Hash, &CellValue::from(" u42 "));
        assert_eq!(c, Coerced::clean(Scalar::Hash(" u42 ".into())));
    }

    #[test]
    fn test_hash_absent_is_flagged_empty() {
        let c = coerce(ScalarType::Hash, &CellValue::Absent);
        assert_eq!(c.value, Scalar::Hash(String::new()));
        assert_eq!(c.issue, Some(CoercionIssue::EmptyHash));
    }

    #[test]
    fn test_hash_renders_numbers_as_text() {
        let c = coerce(ScalarType::Hash, &CellValue::Num(1001.0));
        assert_eq!(c.value, Scalar::Hash("1001".into()));
        assert!(c.issue.is_none());
    }

    #[test]
    fn test_int_absent_defaults_to_zero_without_issue() {
        assert_eq!(coerce(ScalarType::Int, &CellValue::Absent), Coerced::clean(Scalar::Int(0.0)));
    }

    #[test]
    fn test_int_fraction_is_flagged_not_truncated() {
        let c = coerce(ScalarType::Int, &CellValue::Num(3.7));
        assert_eq!(c.value, Scalar::Int(3.7));
        assert_eq!(c.issue, Some(CoercionIssue::NonInteger { value: 3.7 }));
    }

    #[test]
    fn test_int_non_numeric_string_defaults_to_zero() {
        let c = coerce(ScalarType::Int, &CellValue::from("many"));
        assert_eq!(c.value, Scalar::Int(0.0));
        assert!(matches!(c.issue, Some(CoercionIssue::NotNumeric { .. })));
        assert_eq!(coerce(ScalarType::Int, &CellValue::from("12")).value, Scalar::Int(12.0));
    }

    #[test]
    fn test_non_finite_strings_are_not_numeric() {
        for text in ["NaN", "inf", "-infinity", " +Infinity "] {
            for (scalar_type, zero) in [
                (ScalarType::Int, Scalar::Int(0.0)),
                (ScalarType::Float, Scalar::Float(0.0)),
            ] {
                let c = coerce(scalar_type, &CellValue::from(text));
                assert_eq!(c.value, zero, "{text}");
                assert_eq!(
                    c.issue,
                    Some(CoercionIssue::NotNumeric {
                        expected: scalar_type,
                        text: text.to_string(),
                    }),
                    "{text}"
                );
            }
        }
        let c = coerce(ScalarType::Float, &CellValue::Num(f64::INFINITY));
        assert_eq!(c.value, Scalar::Float(0.0));
        assert!(matches!(c.issue, Some(CoercionIssue::NotNumeric { .. })));
    }

    #[test]
    fn test_float_defaults_and_verbatim() {
        assert_eq!(coerce(ScalarType::Float, &CellValue::Absent).value, Scalar::Float(0.0));
        assert_eq!(coerce(ScalarType::Float, &CellValue::Num(0.25)).value, Scalar::Float(0.25));
    }

    #[test]
    fn test_bool_coercion_table() {
        let cases = [
            (CellValue::from("FALSE"), false, false),
            (CellValue::from("false"), false, false),
            (CellValue::from("TRUE"), true, false),
            (CellValue::Num(0.0), false, false),
            (CellValue::Num(5.0), true, false),
            (CellValue::Bool(true), true, false),
            (CellValue::Bool(false), false, false),
            (CellValue::Absent, false, false),
            (CellValue::from(""), false, false),
            (CellValue::from("yes"), true, true),
            (CellValue::from("True"), true, true),
            (CellValue::from("False"), false, true),
            (CellValue::from("tRUE"), true, true),
            (CellValue::from("fAlSe"), false, true),
        ];
        for (cell, expected, flagged) in cases {
            let c = coerce(ScalarType::Bool, &cell);
            assert_eq!(c.value, Scalar::Bool(expected), "{cell:?}");
            assert_eq!(c.issue.is_some(), flagged, "{cell:?}");
        }
    }

    #[test]
    fn test_string_requires_string_form() {
        assert_eq!(coerce(ScalarType::String, &CellValue::from("hi")).value, Scalar::String("hi".into()));
        assert_eq!(coerce(ScalarType::String, &CellValue::Num(4.0)).value, Scalar::String(String::new()));
        assert_eq!(coerce(ScalarType::String, &CellValue::Absent).value, Scalar::String(String::new()));
    }
}
