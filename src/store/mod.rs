//! Immutable in-memory feature store.
//!
//! [`FeatureStore`] is built once from an ordered feature list and never mutated, so it
//! is shared across calls as a plain `Arc<FeatureStore>` with no locking. Point lookups
//! go through an exact-match index; region queries scan in insertion order.

pub mod loader;

use std::collections::HashMap;
use std::sync::Arc;

use crate::geo::{Bounds, Feature, Point, Rectangle};

pub use loader::load_features;

#[derive(Debug, Default)]
pub struct FeatureStore {
    features: Vec<Feature>,
    /// First index in `features` for each location.
    index: HashMap<Point, usize>,
}

impl FeatureStore {
    pub fn new(features: impl IntoIterator<Item = Feature>) -> Self {
        let features: Vec<Feature> = features.into_iter().collect();
        let mut index = HashMap::with_capacity(features.len());
        for (i, feature) in features.iter().enumerate() {
            index.entry(feature.location).or_insert(i);
        }
        Self { features, index }
    }

    /// The first stored feature at exactly `location`, or the unnamed sentinel there.
    pub fn lookup(&self, location: Point) -> Feature {
        self.index
            .get(&location)
            .map(|&i| self.features[i].clone())
            .unwrap_or_else(|| Feature::unnamed(location))
    }

    /// Named features inside `rect` (inclusive, corners in any order), in insertion order.
    pub fn range_query(&self, rect: &Rectangle) -> impl Iterator<Item = &Feature> + '_ {
        let bounds = rect.bounds();
        self.features
            .iter()
            .filter(move |f| in_range(&bounds, f))
    }

    /// Like [`FeatureStore::range_query`], but holds its own reference to the store so
    /// the iterator can outlive the borrow, e.g. inside a response stream.
    pub fn range_query_shared(self: &Arc<Self>, rect: &Rectangle) -> RangeQuery {
        RangeQuery {
            store: Arc::clone(self),
            bounds: rect.bounds(),
            next: 0,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of stored entries with a non-empty name.
    pub fn named_count(&self) -> usize {
        self.features.iter().filter(|f| f.exists()).count()
    }
}

fn in_range(bounds: &Bounds, feature: &Feature) -> bool {
    feature.exists() && bounds.contains(&feature.location)
}

/// Owning, lazy range query. See [`FeatureStore::range_query_shared`].
#[derive(Debug)]
pub struct RangeQuery {
    store: Arc<FeatureStore>,
    bounds: Bounds,
    next: usize,
}

impl Iterator for RangeQuery {
    type Item = Feature;

    fn next(&mut self) -> Option<Feature> {
        while let Some(feature) = self.store.features.get(self.next) {
            self.next += 1;
            if in_range(&self.bounds, feature) {
                return Some(feature.clone());
            }
        }
        None
    }
}
