pub mod doctor;
pub mod list;
pub mod lookup;

use anyhow::Result;

use routeguide::config::RouteGuideConfig;
use routeguide::store::{self, FeatureStore};

/// Load the configured feature database into a store.
fn open_store(config: &RouteGuideConfig) -> Result<FeatureStore> {
    let path = config.resolved_features_path();
    let features = store::load_features(&path)?;
    Ok(FeatureStore::new(features))
}
