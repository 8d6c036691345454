use std::fmt;

use serde::{Deserialize, Serialize};

/// Converting float to int has undefined behaviour for huge floats: https://stackoverflow.com/a/41139453.
/// To avoid this, refuse to convert floats with magnitude greater than 2**53 - 1, after which 64-bit
/// floats no longer retain integer precision.
const FLOAT_TO_INT_MAX: f64 = 9007199254740991_f64;

/// A feature state value or trait value as carried by the environment document: any JSON scalar,
/// or null.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    #[default]
    Null,
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> TypedValue {
        TypedValue::Bool(b)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> TypedValue {
        TypedValue::Int(i)
    }
}

impl From<f64> for TypedValue {
    fn from(f: f64) -> TypedValue {
        TypedValue::Float(f)
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> TypedValue {
        TypedValue::Str(s)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> TypedValue {
        TypedValue::Str(s.to_string())
    }
}

impl TypedValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Int(i) => Some(*i as f64),
            TypedValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(i) => Some(*i),
            TypedValue::Float(f) if f.abs() <= FLOAT_TO_INT_MAX => Some(*f as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }
}

impl fmt::Display for TypedValue {
    /// String rendering used by the IN and REGEX operators. Booleans render lowercase and
    /// integral floats render without a fraction part, matching how the remote evaluator
    /// stringifies values.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Int(i) => write!(f, "{}", i),
            TypedValue::Float(v) if v.fract() == 0.0 && v.abs() <= FLOAT_TO_INT_MAX => {
                write!(f, "{}", *v as i64)
            }
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Str(s) => f.write_str(s),
            TypedValue::Null => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    #[test]
    fn parses_untagged_scalars() {
        let value: TypedValue = serde_json::from_str("true").unwrap();
        assert_that!(value).is_equal_to(TypedValue::Bool(true));

        let value: TypedValue = serde_json::from_str("42").unwrap();
        assert_that!(value).is_equal_to(TypedValue::Int(42));

        let value: TypedValue = serde_json::from_str("1.5").unwrap();
        assert_that!(value).is_equal_to(TypedValue::Float(1.5));

        let value: TypedValue = serde_json::from_str(r#""banner""#).unwrap();
        assert_that!(value).is_equal_to(TypedValue::Str("banner".to_string()));

        let value: TypedValue = serde_json::from_str("null").unwrap();
        assert_that!(value).is_equal_to(TypedValue::Null);
    }

    #[test]
    fn display_renderings() {
        assert_eq!(TypedValue::Bool(true).to_string(), "true");
        assert_eq!(TypedValue::Bool(false).to_string(), "false");
        assert_eq!(TypedValue::Int(7).to_string(), "7");
        assert_eq!(TypedValue::Float(1.0).to_string(), "1");
        assert_eq!(TypedValue::Float(1.25).to_string(), "1.25");
        assert_eq!(TypedValue::Str("x".into()).to_string(), "x");
        assert_eq!(TypedValue::Null.to_string(), "");
    }

    #[test]
    fn float_bounds() {
        let test_cases = vec![
            (1.99, Some(1)),
            (9007199254740990.0, Some(9007199254740990)),
            (9007199254740991.0, Some(9007199254740991)),
            (9007199254740992.0, None),
            (-1.99, Some(-1)),
            (-9007199254740991.0, Some(-9007199254740991)),
            (-9007199254740992.0, None),
        ];
        for (have, expect) in test_cases {
            assert_that!(TypedValue::Float(have).as_int()).is_equal_to(expect);
        }
    }
}
