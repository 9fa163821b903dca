use thiserror::Error;

use crate::remote::error::RemoteError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Could not parse the document as JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid GeoJSON format: unsupported type {0:?}")]
    UnsupportedType(Option<String>),

    #[error("Invalid GeoJSON format: FeatureCollection without a features array")]
    MissingFeatures,

    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Uploaded document after validation of its top-level type. Members are kept as raw JSON, each
/// one is parsed on its own so that one bad feature does not reject its siblings.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDocument {
    Collection(Vec<serde_json::Value>),
    Single(serde_json::Value),
}

impl ImportDocument {
    pub fn into_features(self) -> Vec<serde_json::Value> {
        match self {
            ImportDocument::Collection(features) => features,
            ImportDocument::Single(feature) => vec![feature],
        }
    }
}

/// Parse an uploaded document. Only `Feature` and `FeatureCollection` documents are accepted.
pub fn parse_document(contents: &str) -> Result<ImportDocument, ImportError> {
    let mut document: serde_json::Value = serde_json::from_str(contents)
        .map_err(|err| ImportError::InvalidJson(err.to_string()))?;

    let kind = document["type"].as_str().map(str::to_string);
    match kind.as_deref() {
        Some("FeatureCollection") => match document["features"].take() {
            serde_json::Value::Array(features) => Ok(ImportDocument::Collection(features)),
            _ => Err(ImportError::MissingFeatures),
        },
        Some("Feature") => Ok(ImportDocument::Single(document)),
        _ => Err(ImportError::UnsupportedType(kind)),
    }
}

/// Parse one member of a document into a feature that can be sent to the server.
pub fn parse_feature(value: serde_json::Value) -> Result<geojson::Feature, ImportError> {
    let feature = geojson::Feature::from_json_value(value)
        .map_err(|err| ImportError::InvalidFeature(err.to_string()))?;
    if feature.geometry.is_none() {
        return Err(ImportError::InvalidFeature("missing geometry".to_string()));
    }
    Ok(feature)
}
