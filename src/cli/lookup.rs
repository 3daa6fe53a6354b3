use anyhow::Result;

use routeguide::config::RouteGuideConfig;
use routeguide::geo::Point;

/// Print the feature at a point, or note that there is none.
pub fn lookup(config: &RouteGuideConfig, latitude: i32, longitude: i32) -> Result<()> {
    let store = super::open_store(config)?;
    let point = Point::new(latitude, longitude);
    let feature = store.lookup(point);

    if feature.exists() {
        println!("{} at {}", feature.name, point);
    } else {
        println!("No feature at {point}");
    }
    Ok(())
}
