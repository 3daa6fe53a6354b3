pub mod distance;
pub mod types;

pub use distance::haversine_meters;
pub use types::{Bounds, Feature, Point, Rectangle, RouteNote, RouteSummary, COORD_FACTOR};
