//! CLI `doctor` command — check configuration and the feature database.

use anyhow::Result;
use std::collections::HashSet;

use routeguide::config::RouteGuideConfig;
use routeguide::geo::Feature;
use routeguide::store;

/// Findings about a feature list.
#[derive(Debug, Default, PartialEq, Eq)]
struct FeatureReport {
    total: usize,
    named: usize,
    unnamed: usize,
    /// Entries whose location was already used by an earlier entry (lookup returns the first).
    duplicate_locations: usize,
    /// Entries outside ±90° latitude / ±180° longitude.
    out_of_range: usize,
}

fn diagnose(features: &[Feature]) -> FeatureReport {
    let mut seen = HashSet::with_capacity(features.len());
    let mut report = FeatureReport {
        total: features.len(),
        ..FeatureReport::default()
    };
    for feature in features {
        if feature.exists() {
            report.named += 1;
        } else {
            report.unnamed += 1;
        }
        if !seen.insert(feature.location) {
            report.duplicate_locations += 1;
        }
        if !feature.location.is_valid() {
            report.out_of_range += 1;
        }
    }
    report
}

/// Run diagnostics and print a report.
pub fn doctor(config: &RouteGuideConfig) -> Result<()> {
    let path = config.resolved_features_path();

    println!("RouteGuide Health Report");
    println!("========================");
    println!();
    println!("Listen address:    {}", config.bind_addr());
    println!("Log level:         {}", config.server.log_level);
    match config.chat.history_limit {
        Some(limit) => println!("Chat history:      last {limit} notes per location"),
        None => println!("Chat history:      unbounded"),
    }
    println!("Subscriber queue:  {}", config.chat.subscriber_buffer);
    println!();
    println!("Feature database:  {}", path.display());

    if !path.exists() {
        println!("  Status:          not found");
        println!("Set [store] features_path or ROUTEGUIDE_FEATURES to a feature database.");
        return Ok(());
    }

    let features = match store::load_features(&path) {
        Ok(features) => features,
        Err(e) => {
            println!("  Status:          FAILED ({e:#})");
            return Ok(());
        }
    };

    let report = diagnose(&features);
    println!("  Entries:         {}", report.total);
    println!("  Named:           {}", report.named);
    println!("  Unnamed:         {}", report.unnamed);
    println!("  Duplicate spots: {}", report.duplicate_locations);
    println!("  Out of range:    {}", report.out_of_range);
    if report.duplicate_locations > 0 {
        println!("  WARNING: lookups at duplicate locations return the first entry only.");
    }
    if report.out_of_range == 0 {
        println!("  Status:          OK");
    } else {
        println!("  Status:          WARNING (coordinates outside valid range)");
    }

    Ok(())
}
