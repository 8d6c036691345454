use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::TypedValue;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    #[default]
    Standard,
    Multivariate,
}

/// A flag definition. Two features are the same feature iff their ids match, regardless of any
/// attribute drift between document snapshots.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Feature {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub feature_type: FeatureType,
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Feature {}

/// One weighted alternative value of a multivariate feature.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MultivariateFeatureOption {
    pub value: TypedValue,
    #[serde(default)]
    pub id: Option<i64>,
}

/// Binds a [MultivariateFeatureOption] to a feature state with a share of the rollout space.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MultivariateFeatureStateValue {
    pub multivariate_feature_option: MultivariateFeatureOption,
    /// Share of the `[0, 100)` bucket space this variant claims. The engine trusts the document;
    /// allocations summing past 100 are not rejected here.
    pub percentage_allocation: f64,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default = "new_uuid")]
    pub mv_fs_value_uuid: String,
}

/// Links a feature state to the segment that overrides it, carrying the override's priority.
/// Lower numbers win.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FeatureSegment {
    pub priority: i64,
}

/// A feature's configuration within one scope: the environment itself, a segment override or an
/// identity override. Exactly one feature state exists per feature per scope.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FeatureState {
    pub feature: Feature,
    pub enabled: bool,
    #[serde(default)]
    pub feature_state_value: TypedValue,
    #[serde(default)]
    pub multivariate_feature_state_values: Vec<MultivariateFeatureStateValue>,
    #[serde(default)]
    pub django_id: Option<i64>,
    #[serde(default = "new_uuid")]
    pub featurestate_uuid: String,
    #[serde(default)]
    pub feature_segment: Option<FeatureSegment>,
}

impl FeatureState {
    /// Stable key for hashing and context lookups: the persistent id when the document carries
    /// one, otherwise the feature state UUID.
    pub fn key(&self) -> String {
        match self.django_id {
            Some(id) => id.to_string(),
            None => self.featurestate_uuid.clone(),
        }
    }
}

pub(crate) fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}
