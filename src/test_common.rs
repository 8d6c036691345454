#![cfg(test)]

use serde_json::json;

use crate::builders::build_environment;
use crate::environments::Environment;
use crate::identities::{Identity, Trait};
use crate::value::TypedValue;

/// A representative environment document: one standard feature overridden by a segment and by
/// two pinned identities, one multivariate feature with an even two-way split, and an under-40
/// targeting segment.
pub fn test_document() -> serde_json::Value {
    json!({
        "id": 1,
        "api_key": "test-api-key",
        "project": {
            "id": 1,
            "name": "Test Project",
            "organisation": {
                "id": 1,
                "name": "Test Org",
                "feature_analytics": false,
                "stop_serving_flags": false,
                "persist_trait_data": true
            },
            "hide_disabled_flags": false,
            "segments": [
                {
                    "id": 1,
                    "name": "Power Users",
                    "rules": [
                        {
                            "type": "ALL",
                            "conditions": [
                                {"operator": "LESS_THAN", "property_": "age", "value": "40"}
                            ],
                            "rules": []
                        }
                    ],
                    "feature_states": [
                        {
                            "feature": {"id": 1, "name": "standard_feature", "type": "STANDARD"},
                            "enabled": true,
                            "feature_state_value": "segment value",
                            "django_id": 201,
                            "featurestate_uuid": "16c9ca39-ae01-4b5e-b8e3-dd17d7bfa2f4",
                            "feature_segment": {"priority": 5}
                        }
                    ]
                }
            ]
        },
        "feature_states": [
            {
                "feature": {"id": 1, "name": "standard_feature", "type": "STANDARD"},
                "enabled": false,
                "feature_state_value": null,
                "django_id": 101,
                "featurestate_uuid": "40bf58b3-24b5-4b0c-a5af-dfa2cab3f9b1"
            },
            {
                "feature": {"id": 2, "name": "mv_feature", "type": "MULTIVARIATE"},
                "enabled": true,
                "feature_state_value": "control",
                "django_id": 102,
                "featurestate_uuid": "6ab5c068-4015-4397-9ef6-ca64c0e28e75",
                "multivariate_feature_state_values": [
                    {
                        "id": 10,
                        "multivariate_feature_option": {"id": 20, "value": "variant-a"},
                        "percentage_allocation": 50.0
                    },
                    {
                        "id": 11,
                        "multivariate_feature_option": {"id": 21, "value": "variant-b"},
                        "percentage_allocation": 50.0
                    }
                ]
            }
        ],
        "identity_overrides": [
            {
                "identifier": "overridden-user",
                "environment_api_key": "test-api-key",
                "identity_features": [
                    {
                        "feature": {"id": 1, "name": "standard_feature", "type": "STANDARD"},
                        "enabled": true,
                        "feature_state_value": "identity value"
                    }
                ]
            },
            {
                "identifier": "overridden-user-2",
                "environment_api_key": "test-api-key",
                "identity_features": [
                    {
                        "feature": {"id": 1, "name": "standard_feature", "type": "STANDARD"},
                        "enabled": true,
                        "feature_state_value": "identity value"
                    }
                ]
            }
        ]
    })
}

pub fn test_environment() -> Environment {
    build_environment(test_document()).expect("test document should build")
}

pub fn test_identity(identifier: &str, traits: &[(&str, TypedValue)]) -> Identity {
    let mut identity: Identity = serde_json::from_value(json!({
        "identifier": identifier,
        "environment_api_key": "test-api-key"
    }))
    .expect("test identity should build");
    identity.traits = traits
        .iter()
        .map(|(key, value)| Trait::new(*key, value.clone()))
        .collect();
    identity
}
