//! Fail-fast entry points turning wire JSON into models.
//!
//! A document that does not build produces no partial model: missing required fields surface as
//! [Error::InvalidDocument], and duplicate per-identity feature overrides as
//! [Error::DuplicateFeatureOverride].

use serde_json::Value;

use crate::environments::{Environment, Organisation, Project};
use crate::error::Error;
use crate::features::FeatureState;
use crate::identities::Identity;
use crate::segments::Segment;

/// Parses a full environment document, validating every attached identity override set.
pub fn build_environment(document: Value) -> Result<Environment, Error> {
    let environment: Environment =
        serde_json::from_value(document).map_err(Error::InvalidDocument)?;
    for identity in &environment.identity_overrides {
        identity.check_feature_overrides()?;
    }
    Ok(environment)
}

pub fn build_identity(document: Value) -> Result<Identity, Error> {
    let identity: Identity = serde_json::from_value(document).map_err(Error::InvalidDocument)?;
    identity.check_feature_overrides()?;
    Ok(identity)
}

pub fn build_organisation(document: Value) -> Result<Organisation, Error> {
    serde_json::from_value(document).map_err(Error::InvalidDocument)
}

pub fn build_project(document: Value) -> Result<Project, Error> {
    serde_json::from_value(document).map_err(Error::InvalidDocument)
}

pub fn build_segment(document: Value) -> Result<Segment, Error> {
    serde_json::from_value(document).map_err(Error::InvalidDocument)
}

pub fn build_feature_state(document: Value) -> Result<FeatureState, Error> {
    serde_json::from_value(document).map_err(Error::InvalidDocument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::test_document;
    use assert_json_diff::assert_json_include;
    use serde_json::json;
    use spectral::prelude::*;

    #[test]
    fn builds_full_document() {
        let environment = build_environment(test_document()).unwrap();

        assert_eq!(environment.api_key, "test-api-key");
        assert_eq!(environment.project.name, "Test Project");
        assert_that!(environment.feature_states).has_length(2);
        assert_that!(environment.project.segments).has_length(1);
        assert_that!(environment.identity_overrides).has_length(2);
    }

    #[test]
    fn missing_required_field_fails_fast() {
        let result = build_environment(json!({
            "id": 1,
            "project": {
                "id": 1,
                "name": "Test Project",
                "organisation": {"id": 1, "name": "Test Org"}
            }
        }));
        assert!(matches!(result, Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn duplicate_identity_override_fails_fast() {
        let mut document = test_document();
        let dup = json!({
            "identifier": "dup-user",
            "environment_api_key": "test-api-key",
            "identity_features": [
                {"feature": {"id": 1, "name": "standard_feature"}, "enabled": true},
                {"feature": {"id": 1, "name": "standard_feature"}, "enabled": false}
            ]
        });
        document["identity_overrides"].as_array_mut().unwrap().push(dup);

        let result = build_environment(document);
        assert!(matches!(
            result,
            Err(Error::DuplicateFeatureOverride { feature_id: 1 })
        ));
    }

    #[test]
    fn build_identity_rejects_duplicate_overrides() {
        let result = build_identity(json!({
            "identifier": "user-1",
            "environment_api_key": "test-api-key",
            "identity_features": [
                {"feature": {"id": 4, "name": "x"}, "enabled": true},
                {"feature": {"id": 4, "name": "x"}, "enabled": true}
            ]
        }));
        assert!(matches!(
            result,
            Err(Error::DuplicateFeatureOverride { feature_id: 4 })
        ));
    }

    #[test]
    fn round_trip_rebuilds_an_equivalent_model() {
        let environment = build_environment(test_document()).unwrap();
        let serialized = serde_json::to_value(&environment).unwrap();
        let rebuilt = build_environment(serialized.clone()).unwrap();

        assert_eq!(environment, rebuilt);
        // The serialized form is a superset of the original document (defaults are made
        // explicit), never a reshaping of it.
        assert_json_include!(actual: serialized, expected: json!({
            "api_key": "test-api-key",
            "project": {"name": "Test Project"},
        }));
    }

    #[test]
    fn build_segment_and_feature_state() {
        let segment = build_segment(json!({
            "id": 1,
            "name": "seg",
            "rules": [{"type": "ANY", "conditions": []}]
        }))
        .unwrap();
        assert_eq!(segment.name, "seg");

        let state = build_feature_state(json!({
            "feature": {"id": 1, "name": "banner"},
            "enabled": false
        }))
        .unwrap();
        assert!(!state.enabled);

        assert!(matches!(
            build_feature_state(json!({"enabled": true})),
            Err(Error::InvalidDocument(_))
        ));
    }
}
