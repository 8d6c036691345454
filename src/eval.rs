use std::collections::HashMap;

use crate::context::{EvaluationContext, FeatureContext, SegmentContext, SegmentSource};
use crate::hashing::hashed_percentage;
use crate::segments::{Operator, RuleType, SegmentCondition, SegmentRule};
use crate::value::TypedValue;

/// One evaluated flag, with a human-auditable explanation of how its value was chosen.
#[derive(Clone, Debug, PartialEq)]
pub struct FlagResult {
    pub feature_key: String,
    pub name: String,
    pub enabled: bool,
    pub value: TypedValue,
    /// `DEFAULT`, `IDENTITY_OVERRIDE`, or `TARGETING_MATCH; segment=<segment name>`.
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SegmentResult {
    pub key: String,
    pub name: String,
}

/// The output of one evaluation: one entry per feature in the context, plus the segments the
/// identity matched.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationResult {
    pub flags: Vec<FlagResult>,
    pub segments: Vec<SegmentResult>,
}

/// The segments in the context whose rule forest matches the attached identity, in segment-map
/// order. Empty when the context carries no identity.
pub fn identity_segments(context: &EvaluationContext) -> Vec<&SegmentContext> {
    if context.identity.is_none() {
        return Vec::new();
    }
    context
        .segments
        .values()
        .filter(|segment| segment_matches(segment, context))
        .collect()
}

struct Override<'a> {
    feature: &'a FeatureContext,
    segment: &'a SegmentContext,
    priority: f64,
}

/// Evaluates every feature in the context.
///
/// Matched segments are collected first; among their overrides the numerically lowest priority
/// per feature wins, with ties keeping the first seen. A winning override's enabled state and
/// value are final. Features without an override fall back to their own configuration, with
/// multivariate selection keyed by the identity when one is attached.
pub fn evaluate(context: &EvaluationContext) -> EvaluationResult {
    let matched = identity_segments(context);

    let mut winners: HashMap<&str, Override> = HashMap::new();
    for &segment in &matched {
        for feature in &segment.overrides {
            let priority = feature.priority.unwrap_or(f64::INFINITY);
            match winners.get(feature.feature_name.as_str()) {
                Some(current) if priority >= current.priority => {}
                _ => {
                    winners.insert(
                        &feature.feature_name,
                        Override {
                            feature,
                            segment,
                            priority,
                        },
                    );
                }
            }
        }
    }

    let flags = context
        .features
        .iter()
        .map(|(name, feature)| match winners.get(name.as_str()) {
            Some(winner) => FlagResult {
                feature_key: feature.key.clone(),
                name: name.clone(),
                enabled: winner.feature.enabled,
                value: winner.feature.value.clone(),
                reason: match winner.segment.source {
                    SegmentSource::IdentityOverride => "IDENTITY_OVERRIDE".to_string(),
                    SegmentSource::Api => {
                        format!("TARGETING_MATCH; segment={}", winner.segment.name)
                    }
                },
            },
            None => FlagResult {
                feature_key: feature.key.clone(),
                name: name.clone(),
                enabled: feature.enabled,
                value: default_value(feature, context),
                reason: "DEFAULT".to_string(),
            },
        })
        .collect();

    EvaluationResult {
        flags,
        segments: matched
            .iter()
            .map(|segment| SegmentResult {
                key: segment.key.clone(),
                name: segment.name.clone(),
            })
            .collect(),
    }
}

fn default_value(feature: &FeatureContext, context: &EvaluationContext) -> TypedValue {
    match &context.identity {
        Some(identity) if !feature.variants.is_empty() => {
            multivariate_value(feature, &identity.key)
        }
        _ => feature.value.clone(),
    }
}

/// Deterministic variant selection: the identity's hashed percentage is looked up in the
/// `[start, start + weight)` buckets formed by walking the variants in order. A gap left by
/// allocations summing short of 100 falls back to the feature's base value.
fn multivariate_value(feature: &FeatureContext, identity_key: &str) -> TypedValue {
    let percentage = hashed_percentage(&[feature.key.as_str(), identity_key]);

    let mut start = 0.0;
    for variant in &feature.variants {
        let limit = start + variant.weight;
        if percentage >= start && percentage < limit {
            return variant.value.clone();
        }
        start = limit;
    }
    feature.value.clone()
}

/// A segment matches iff every top-level rule in its forest matches. An empty forest matches
/// vacuously; such segments do not occur in practice.
pub(crate) fn segment_matches(segment: &SegmentContext, context: &EvaluationContext) -> bool {
    segment
        .rules
        .iter()
        .all(|rule| rule_matches(rule, segment, context))
}

/// A rule node matches iff its own conditions combine truthfully under its type AND every
/// sub-rule matches. The type governs only the node's own conditions; sub-rules are always a
/// strict conjunction. That lets the whole tree be walked with a work list rather than
/// recursion, so arbitrarily nested documents cannot exhaust the stack.
fn rule_matches(rule: &SegmentRule, segment: &SegmentContext, context: &EvaluationContext) -> bool {
    let mut pending = vec![rule];
    while let Some(node) = pending.pop() {
        let own_conditions_match = match node.rule_type {
            RuleType::All => node
                .conditions
                .iter()
                .all(|condition| condition_matches(condition, segment, context)),
            RuleType::Any => node
                .conditions
                .iter()
                .any(|condition| condition_matches(condition, segment, context)),
            RuleType::None => !node
                .conditions
                .iter()
                .any(|condition| condition_matches(condition, segment, context)),
        };
        if !own_conditions_match {
            return false;
        }
        pending.extend(node.sub_rules.iter());
    }
    true
}

fn condition_matches(
    condition: &SegmentCondition,
    segment: &SegmentContext,
    context: &EvaluationContext,
) -> bool {
    if condition.operator == Operator::PercentageSplit {
        return percentage_split_matches(condition, segment, context);
    }

    let resolved = condition
        .property
        .as_deref()
        .and_then(|property| resolve_property(property, context));

    match condition.operator {
        Operator::IsSet => resolved.is_some(),
        Operator::IsNotSet => resolved.is_none(),
        _ => match resolved {
            Some(value) => condition.matches_value(&value),
            None => false,
        },
    }
}

/// Percentage splits ignore traits entirely: the identity's hashed percentage within this
/// segment decides membership.
fn percentage_split_matches(
    condition: &SegmentCondition,
    segment: &SegmentContext,
    context: &EvaluationContext,
) -> bool {
    let identity = match &context.identity {
        Some(identity) => identity,
        None => return false,
    };
    let threshold = match condition.value.as_deref().and_then(|v| v.parse::<f64>().ok()) {
        Some(threshold) => threshold,
        None => return false,
    };
    hashed_percentage(&[segment.key.as_str(), identity.key.as_str()]) <= threshold
}

/// Resolves a condition property to a concrete value: `$.`-prefixed paths read context-intrinsic
/// fields, everything else reads the identity's traits. A null trait counts as absent, and an
/// unknown context path resolves to nothing rather than erroring.
fn resolve_property(property: &str, context: &EvaluationContext) -> Option<TypedValue> {
    if let Some(path) = property.strip_prefix("$.") {
        return match path {
            "identity.identifier" => context
                .identity
                .as_ref()
                .map(|identity| TypedValue::Str(identity.identifier.clone())),
            "environment.name" => Some(TypedValue::Str(context.environment.name.clone())),
            "environment.key" => Some(TypedValue::Str(context.environment.key.clone())),
            _ => None,
        };
    }

    context.identity.as_ref().and_then(|identity| {
        identity
            .traits
            .get(property)
            .filter(|value| !value.is_null())
            .cloned()
    })
}
