//! Feature database file parsing.
//!
//! Accepts the protobuf-JSON layout `{"feature": [...]}` as well as a bare JSON array
//! of features.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::geo::Feature;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureDatabase {
    Wrapped {
        #[serde(default)]
        feature: Vec<Feature>,
    },
    Bare(Vec<Feature>),
}

impl FeatureDatabase {
    fn into_features(self) -> Vec<Feature> {
        match self {
            Self::Wrapped { feature } => feature,
            Self::Bare(features) => features,
        }
    }
}

/// Parse a feature database from a JSON string, preserving file order.
pub fn parse_features(json: &str) -> Result<Vec<Feature>> {
    let database: FeatureDatabase =
        serde_json::from_str(json).context("failed to parse feature database JSON")?;
    Ok(database.into_features())
}

/// Read and parse the feature database at `path`.
pub fn load_features(path: impl AsRef<Path>) -> Result<Vec<Feature>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read feature database: {}", path.display()))?;
    let features = parse_features(&json)
        .with_context(|| format!("invalid feature database: {}", path.display()))?;
    tracing::debug!(path = %path.display(), count = features.len(), "feature database parsed");
    Ok(features)
}
