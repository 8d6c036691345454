use std::fmt;

/// Error describes why an environment document or identity payload could not be turned into a
/// usable model.
///
/// Building is all-or-nothing: a document that fails to build produces no partial model, and the
/// caller is expected to treat the failure as a fatal configuration error rather than evaluating
/// against an empty environment.
#[derive(Debug)]
pub enum Error {
    /// The document was structurally invalid or missing required fields.
    InvalidDocument(serde_json::Error),
    /// An identity carried two feature overrides for the same feature.
    DuplicateFeatureOverride {
        /// The id of the feature that was overridden more than once.
        feature_id: i64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDocument(e) => write!(f, "invalid environment document: {}", e),
            Error::DuplicateFeatureOverride { feature_id } => {
                write!(f, "duplicate feature override for feature {}", feature_id)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidDocument(e) => Some(e),
            Error::DuplicateFeatureOverride { .. } => None,
        }
    }
}
