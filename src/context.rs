use std::collections::BTreeMap;

use itertools::Itertools;
use md5::{Digest, Md5};

use crate::environments::Environment;
use crate::features::FeatureState;
use crate::identities::{Identity, Trait};
use crate::segments::{Operator, RuleType, Segment, SegmentCondition, SegmentRule};
use crate::value::TypedValue;

/// Marks where a segment in the evaluation context came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentSource {
    /// A real segment from the environment document.
    Api,
    /// A synthetic segment materialized from per-identity feature overrides.
    IdentityOverride,
}

/// Orders multivariate variants for bucket walking. Document ids sort ahead of derived UUID
/// keys, so the walk order survives snapshots that add or drop ids.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum VariantOrder {
    Stable(i64),
    Derived(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantContext {
    pub value: TypedValue,
    /// Share of the `[0, 100)` bucket space, taken from the variant's percentage allocation.
    pub weight: f64,
    pub order: VariantOrder,
}

/// A feature descriptor flattened for evaluation, with its multivariate variants resolved and
/// sorted.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureContext {
    /// Stable feature state key: persistent id if the document carries one, else the UUID.
    pub key: String,
    pub feature_name: String,
    pub enabled: bool,
    pub value: TypedValue,
    /// Sorted ascending by [VariantContext::order]; empty for standard features.
    pub variants: Vec<VariantContext>,
    /// Override priority, for feature contexts that live inside a segment. `None` is the weakest
    /// possible priority; identity-override segments carry negative infinity so they always win.
    pub priority: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SegmentContext {
    pub key: String,
    pub name: String,
    pub rules: Vec<SegmentRule>,
    pub overrides: Vec<FeatureContext>,
    pub source: SegmentSource,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentContext {
    pub key: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IdentityContext {
    pub identifier: String,
    /// Hashing key for percentage splits and variant selection: the persistent id when known,
    /// otherwise the composite key.
    pub key: String,
    pub traits: BTreeMap<String, TypedValue>,
}

/// The flattened evaluation input: everything the evaluator needs, detached from the long-lived
/// environment snapshot. Built fresh per evaluation call and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationContext {
    pub environment: EnvironmentContext,
    pub identity: Option<IdentityContext>,
    pub features: BTreeMap<String, FeatureContext>,
    pub segments: BTreeMap<String, SegmentContext>,
}

/// Flattens an environment snapshot, an optional identity and optional trait overrides into the
/// structure the evaluator consumes.
///
/// Override traits fully replace the identity's stored traits for this evaluation only. With
/// `environment_only` set the identity is omitted even when supplied, producing the
/// environment-wide default view.
pub fn build_evaluation_context(
    environment: &Environment,
    identity: Option<&Identity>,
    override_traits: Option<&[Trait]>,
    environment_only: bool,
) -> EvaluationContext {
    let mut features = BTreeMap::new();
    for feature_state in &environment.feature_states {
        features.insert(
            feature_state.feature.name.clone(),
            feature_context(feature_state, None),
        );
    }

    let mut segments = BTreeMap::new();
    for segment in &environment.project.segments {
        segments.insert(segment.id.to_string(), segment_context(segment));
    }
    segments.extend(identity_override_segments(&environment.identity_overrides));

    let identity = match (environment_only, identity) {
        (false, Some(identity)) => Some(identity_context(identity, override_traits)),
        _ => None,
    };

    EvaluationContext {
        environment: EnvironmentContext {
            key: environment.api_key.clone(),
            name: environment.project.name.clone(),
        },
        identity,
        features,
        segments,
    }
}

fn feature_context(feature_state: &FeatureState, priority: Option<f64>) -> FeatureContext {
    let mut variants: Vec<VariantContext> = feature_state
        .multivariate_feature_state_values
        .iter()
        .map(|mv| VariantContext {
            value: mv.multivariate_feature_option.value.clone(),
            weight: mv.percentage_allocation,
            order: match mv.id {
                Some(id) => VariantOrder::Stable(id),
                None => VariantOrder::Derived(mv.mv_fs_value_uuid.clone()),
            },
        })
        .collect();
    variants.sort_by(|a, b| a.order.cmp(&b.order));

    FeatureContext {
        key: feature_state.key(),
        feature_name: feature_state.feature.name.clone(),
        enabled: feature_state.enabled,
        value: feature_state.feature_state_value.clone(),
        variants,
        priority,
    }
}

fn segment_context(segment: &Segment) -> SegmentContext {
    SegmentContext {
        key: segment.id.to_string(),
        name: segment.name.clone(),
        rules: segment.rules.clone(),
        overrides: segment
            .feature_states
            .iter()
            .map(|feature_state| {
                let priority = feature_state
                    .feature_segment
                    .as_ref()
                    .map(|feature_segment| feature_segment.priority as f64);
                feature_context(feature_state, priority)
            })
            .collect(),
        source: SegmentSource::Api,
    }
}

fn identity_context(identity: &Identity, override_traits: Option<&[Trait]>) -> IdentityContext {
    let source_traits = override_traits.unwrap_or(&identity.traits);
    let mut traits = BTreeMap::new();
    for t in source_traits {
        // Last write wins for repeated keys.
        traits.insert(t.key.clone(), t.value.clone());
    }

    IdentityContext {
        identifier: identity.identifier.clone(),
        key: match identity.django_id {
            Some(id) => id.to_string(),
            None => identity.composite_key(),
        },
        traits,
    }
}

/// Groups the environment's pinned identity overrides into synthetic segments.
///
/// Identities whose override sets are feature-for-feature identical (same feature, enabled state
/// and value, compared by content hash) merge into one segment whose single rule matches their
/// identifiers. The overrides carry negative-infinity priority so they beat any numbered segment
/// override.
fn identity_override_segments(identities: &[Identity]) -> BTreeMap<String, SegmentContext> {
    let groups = identities
        .iter()
        .filter(|identity| !identity.feature_overrides.is_empty())
        .map(|identity| (override_set_hash(&identity.feature_overrides), identity))
        .into_group_map();

    groups
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(hash, members)| {
            let identifiers: Vec<String> = members
                .iter()
                .map(|identity| identity.identifier.clone())
                .sorted()
                .collect();
            let key = format!("identity_override_{}", hash);

            let rule = SegmentRule {
                rule_type: RuleType::All,
                conditions: vec![SegmentCondition {
                    operator: Operator::In,
                    property: Some("$.identity.identifier".to_string()),
                    value: Some(identifiers.join(",")),
                }],
                sub_rules: vec![],
            };

            let segment = SegmentContext {
                key: key.clone(),
                name: key.clone(),
                rules: vec![rule],
                overrides: members[0]
                    .feature_overrides
                    .iter()
                    .map(|feature_state| feature_context(feature_state, Some(f64::NEG_INFINITY)))
                    .collect(),
                source: SegmentSource::IdentityOverride,
            };
            (key, segment)
        })
        .collect()
}

/// Content hash over an override set, insensitive to declaration order.
fn override_set_hash(overrides: &[FeatureState]) -> String {
    let entries: Vec<String> = overrides
        .iter()
        .map(|feature_state| {
            format!(
                "{}:{}:{}",
                feature_state.feature.name,
                feature_state.enabled,
                serde_json::to_string(&feature_state.feature_state_value).unwrap_or_default()
            )
        })
        .sorted()
        .collect();

    let digest = Md5::digest(entries.join(";").as_bytes());
    base16ct::lower::encode_string(&digest)
}
