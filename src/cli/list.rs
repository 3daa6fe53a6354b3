use anyhow::Result;

use routeguide::config::RouteGuideConfig;
use routeguide::geo::{Point, Rectangle};

/// Print every named feature inside the rectangle spanned by two corners.
pub fn list(config: &RouteGuideConfig, lo: (i32, i32), hi: (i32, i32)) -> Result<()> {
    let store = super::open_store(config)?;
    let rect = Rectangle::new(Point::new(lo.0, lo.1), Point::new(hi.0, hi.1));

    let mut count = 0usize;
    for feature in store.range_query(&rect) {
        println!("  {:<60} {}", feature.name, feature.location);
        count += 1;
    }
    println!("{count} feature(s) between {} and {}", rect.lo, rect.hi);
    Ok(())
}
