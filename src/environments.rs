use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::FeatureState;
use crate::identities::Identity;
use crate::segments::Segment;

/// Billing/account root. Immutable once built from a document.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Organisation {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub feature_analytics: bool,
    #[serde(default)]
    pub stop_serving_flags: bool,
    #[serde(default)]
    pub persist_trait_data: bool,
}

/// A group of environments. Owns the segment list shared by those environments.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub organisation: Organisation,
    #[serde(default)]
    pub hide_disabled_flags: bool,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// A deployable configuration snapshot. The api key is the environment's external identity.
///
/// The snapshot exclusively owns its project and feature state list; refreshes replace the whole
/// environment rather than mutating it in place, so once built it is safe to share across
/// threads for the lifetime of the snapshot.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Environment {
    pub id: i64,
    pub api_key: String,
    pub project: Project,
    #[serde(default)]
    pub feature_states: Vec<FeatureState>,
    /// Feature configurations pinned to specific identities, visible to the whole environment.
    #[serde(default)]
    pub identity_overrides: Vec<Identity>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A server-side access key for an environment.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EnvironmentApiKey {
    pub id: i64,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub client_api_key: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl EnvironmentApiKey {
    /// A key grants access while it is active and unexpired.
    pub fn is_valid(&self) -> bool {
        self.active && self.expires_at.map_or(true, |expires_at| expires_at > Utc::now())
    }
}
