use std::cmp::Ordering;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::features::FeatureState;
use crate::value::TypedValue;

/// How a rule node combines its own leaf conditions. This does not govern how a node combines
/// its child rules; those are always a conjunction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    All,
    Any,
    None,
}

/// A node in a segment's rule tree: a type discriminant plus two homogeneous child collections.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SegmentRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default)]
    pub conditions: Vec<SegmentCondition>,
    #[serde(default, rename = "rules")]
    pub sub_rules: Vec<SegmentRule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanInclusive,
    LessThan,
    LessThanInclusive,
    Contains,
    NotContains,
    In,
    Regex,
    Modulo,
    PercentageSplit,
    IsSet,
    IsNotSet,
    /// An operator this engine does not recognise. Evaluates to false rather than failing the
    /// whole evaluation.
    #[serde(other)]
    Unknown,
}

/// A single predicate against a trait value or a context-derived value.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SegmentCondition {
    pub operator: Operator,
    /// Trait key this condition reads, or a `$.`-prefixed context property path. Absent for
    /// conditions intrinsic to the evaluation itself, such as a percentage split.
    #[serde(default, rename = "property_")]
    pub property: Option<String>,
    /// The expected value, always transmitted as a string and cast to the runtime type of the
    /// trait value before comparison.
    #[serde(default)]
    pub value: Option<String>,
}

/// A named targeting rule set. Rules are evaluated as a forest; feature states carried here
/// override environment defaults for identities inside the segment.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Segment {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    #[serde(default)]
    pub feature_states: Vec<FeatureState>,
}

impl SegmentCondition {
    /// Evaluates this condition against a concrete value. Percentage splits and IS_SET /
    /// IS_NOT_SET are intrinsic to the evaluation context and are special-cased by the evaluator
    /// before it gets here.
    pub fn matches_value(&self, value: &TypedValue) -> bool {
        match &self.value {
            Some(expected) => self.operator.matches(value, expected),
            None => false,
        }
    }
}

impl Operator {
    fn matches(&self, value: &TypedValue, expected: &str) -> bool {
        match self {
            Operator::Equal => compare(value, expected, Ordering::is_eq),
            Operator::NotEqual => compare(value, expected, Ordering::is_ne),
            Operator::GreaterThan => compare(value, expected, Ordering::is_gt),
            Operator::GreaterThanInclusive => compare(value, expected, Ordering::is_ge),
            Operator::LessThan => compare(value, expected, Ordering::is_lt),
            Operator::LessThanInclusive => compare(value, expected, Ordering::is_le),

            Operator::Contains => string_op(value, expected, |v, e| v.contains(e)),
            Operator::NotContains => string_op(value, expected, |v, e| !v.contains(e)),
            Operator::In => in_op(value, expected),
            Operator::Regex => regex_op(value, expected),
            Operator::Modulo => modulo_op(value, expected),

            // Intrinsic operators never reach value comparison; the evaluator resolves them
            // before calling here.
            Operator::PercentageSplit | Operator::IsSet | Operator::IsNotSet => false,

            Operator::Unknown => {
                warn!("unknown segment condition operator, failing closed");
                false
            }
        }
    }
}

/// Casts the expected string to the runtime type of the trait value, then compares. A cast that
/// fails makes the condition false rather than erroring.
fn compare<F: Fn(Ordering) -> bool>(value: &TypedValue, expected: &str, f: F) -> bool {
    let ordering = match value {
        TypedValue::Bool(b) => {
            let expected = !matches!(expected, "False" | "false");
            Some(b.cmp(&expected))
        }
        TypedValue::Int(i) => expected
            .parse::<f64>()
            .ok()
            .and_then(|e| (*i as f64).partial_cmp(&e)),
        TypedValue::Float(v) => expected.parse::<f64>().ok().and_then(|e| v.partial_cmp(&e)),
        TypedValue::Str(s) => Some(s.as_str().cmp(expected)),
        TypedValue::Null => None,
    };
    ordering.map(f).unwrap_or(false)
}

fn string_op<F: Fn(&str, &str) -> bool>(value: &TypedValue, expected: &str, f: F) -> bool {
    match value {
        TypedValue::Str(s) => f(s, expected),
        _ => false,
    }
}

fn in_op(value: &TypedValue, expected: &str) -> bool {
    if expected.is_empty() || value.is_null() {
        return false;
    }
    let rendered = value.to_string();
    expected.split(',').any(|candidate| candidate == rendered)
}

fn regex_op(value: &TypedValue, expected: &str) -> bool {
    if value.is_null() {
        return false;
    }
    match Regex::new(expected) {
        Ok(re) => re.is_match(&value.to_string()),
        Err(e) => {
            warn!("invalid regex in segment condition ({}): {}", e, expected);
            false
        }
    }
}

fn modulo_op(value: &TypedValue, expected: &str) -> bool {
    let operand = match value.as_f64() {
        Some(operand) => operand,
        None => return false,
    };
    let (divisor, remainder) = match expected.split_once('|') {
        Some(parts) => parts,
        None => {
            warn!("malformed modulo expression in segment condition: {}", expected);
            return false;
        }
    };
    match (divisor.parse::<f64>(), remainder.parse::<f64>()) {
        (Ok(divisor), Ok(remainder)) => operand % divisor == remainder,
        _ => false,
    }
}
