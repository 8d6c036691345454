use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::features::{new_uuid, FeatureState};
use crate::value::TypedValue;

/// A key/value fact about an identity. Keys are unique per identity; when a payload repeats a
/// key, the last occurrence wins.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Trait {
    #[serde(rename = "trait_key")]
    pub key: String,
    #[serde(rename = "trait_value")]
    pub value: TypedValue,
    /// Transient traits are evaluated but never persisted by the service.
    #[serde(default)]
    pub transient: bool,
}

impl Trait {
    pub fn new(key: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            transient: false,
        }
    }
}

/// A specific end user within an environment.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Identity {
    pub identifier: String,
    pub environment_api_key: String,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "identity_traits")]
    pub traits: Vec<Trait>,
    #[serde(default, rename = "identity_features")]
    pub feature_overrides: Vec<FeatureState>,
    #[serde(default)]
    pub django_id: Option<i64>,
    #[serde(default = "new_uuid")]
    pub identity_uuid: String,
    #[serde(default)]
    pub transient: bool,
}

/// Builds the composite key identifying an identity within an environment.
pub fn composite_key(environment_api_key: &str, identifier: &str) -> String {
    format!("{}_{}", environment_api_key, identifier)
}

impl Identity {
    pub fn composite_key(&self) -> String {
        composite_key(&self.environment_api_key, &self.identifier)
    }

    /// Registers a per-identity feature override. At most one override may exist per feature;
    /// a second override for the same feature is a data error and is rejected.
    pub fn add_feature_override(&mut self, feature_state: FeatureState) -> Result<(), Error> {
        if self
            .feature_overrides
            .iter()
            .any(|existing| existing.feature.id == feature_state.feature.id)
        {
            return Err(Error::DuplicateFeatureOverride {
                feature_id: feature_state.feature.id,
            });
        }
        self.feature_overrides.push(feature_state);
        Ok(())
    }

    pub(crate) fn check_feature_overrides(&self) -> Result<(), Error> {
        let mut seen = std::collections::HashSet::new();
        for feature_state in &self.feature_overrides {
            if !seen.insert(feature_state.feature.id) {
                return Err(Error::DuplicateFeatureOverride {
                    feature_id: feature_state.feature.id,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    fn override_for(feature_id: i64) -> FeatureState {
        serde_json::from_value(serde_json::json!({
            "feature": {"id": feature_id, "name": format!("feature-{}", feature_id)},
            "enabled": true
        }))
        .unwrap()
    }

    fn identity(identifier: &str) -> Identity {
        serde_json::from_value(serde_json::json!({
            "identifier": identifier,
            "environment_api_key": "api-key"
        }))
        .unwrap()
    }

    #[test]
    fn composite_key_joins_api_key_and_identifier() {
        assert_eq!(composite_key("api-key", "test-identity"), "api-key_test-identity");
        assert_eq!(identity("test-identity").composite_key(), "api-key_test-identity");
    }

    #[test]
    fn rejects_duplicate_feature_override() {
        let mut identity = identity("user-1");
        identity.add_feature_override(override_for(1)).unwrap();
        identity.add_feature_override(override_for(2)).unwrap();

        let result = identity.add_feature_override(override_for(1));
        assert!(matches!(
            result,
            Err(Error::DuplicateFeatureOverride { feature_id: 1 })
        ));
        assert_that!(identity.feature_overrides).has_length(2);
    }

    #[test]
    fn parses_identity_with_traits() {
        let identity: Identity = serde_json::from_value(serde_json::json!({
            "identifier": "user-1",
            "environment_api_key": "api-key",
            "identity_traits": [
                {"trait_key": "age", "trait_value": 25},
                {"trait_key": "beta", "trait_value": true, "transient": true}
            ],
            "django_id": 9
        }))
        .unwrap();

        assert_that!(identity.traits).has_length(2);
        assert_that!(identity.traits[0].value).is_equal_to(TypedValue::Int(25));
        assert!(identity.traits[1].transient);
        assert_that!(identity.django_id).contains_value(9);
        asserting!("identity uuid is generated when absent")
            .that(&identity.identity_uuid.is_empty())
            .is_false();
    }
}
