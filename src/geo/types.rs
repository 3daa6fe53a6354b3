//! Message types shared by the store, the recorder, the chat router and the transport.
//!
//! Coordinates are fixed-point: degrees multiplied by [`COORD_FACTOR`] and stored as
//! `i32`. Equality is exact integer equality, which is what lets [`Point`] serve as a
//! hash key for both the feature index and the chat rooms.

use serde::{Deserialize, Serialize};

/// Fixed-point scale between stored integers and real degrees.
pub const COORD_FACTOR: f64 = 1e7;

/// A location in degrees × 1e7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    pub latitude: i32,
    pub longitude: i32,
}

impl Point {
    pub const fn new(latitude: i32, longitude: i32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude in real degrees.
    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / COORD_FACTOR
    }

    /// Longitude in real degrees.
    pub fn longitude_degrees(&self) -> f64 {
        f64::from(self.longitude) / COORD_FACTOR
    }

    /// Whether the decoded coordinates fall within ±90° latitude and ±180° longitude.
    pub fn is_valid(&self) -> bool {
        self.latitude_degrees().abs() <= 90.0 && self.longitude_degrees().abs() <= 180.0
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.7}, {:.7})",
            self.latitude_degrees(),
            self.longitude_degrees()
        )
    }
}

/// A named location. An empty `name` means "nothing here" and is a normal value,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub name: String,
    pub location: Point,
}

impl Feature {
    pub fn new(name: impl Into<String>, location: Point) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }

    /// The "no feature at this point" sentinel.
    pub fn unnamed(location: Point) -> Self {
        Self {
            name: String::new(),
            location,
        }
    }

    /// `true` when the feature carries a name.
    pub fn exists(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Two opposite corners of a lat/lon box, in no particular order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rectangle {
    pub lo: Point,
    pub hi: Point,
}

impl Rectangle {
    pub const fn new(lo: Point, hi: Point) -> Self {
        Self { lo, hi }
    }

    /// Normalize the corners into inclusive per-axis bounds.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            left: self.lo.longitude.min(self.hi.longitude),
            right: self.lo.longitude.max(self.hi.longitude),
            top: self.lo.latitude.max(self.hi.latitude),
            bottom: self.lo.latitude.min(self.hi.latitude),
        }
    }
}

/// Normalized rectangle: `left <= right` on longitude, `bottom <= top` on latitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Inclusive containment on both axes.
    pub fn contains(&self, point: &Point) -> bool {
        point.longitude >= self.left
            && point.longitude <= self.right
            && point.latitude >= self.bottom
            && point.latitude <= self.top
    }
}

/// Aggregate statistics for one recorded route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub point_count: i32,
    pub feature_count: i32,
    /// Total great-circle distance in meters.
    #[serde(rename = "distance")]
    pub distance_meters: i32,
    /// Whole seconds between the first point and the end of the route.
    #[serde(rename = "elapsedTime")]
    pub elapsed_seconds: i32,
}

/// A chat message pinned to a location. The location is also its routing key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteNote {
    pub location: Point,
    pub message: String,
}

impl RouteNote {
    pub fn new(location: Point, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_normalize_swapped_corners() {
        let a = Rectangle::new(Point::new(10, -20), Point::new(-10, 20));
        let b = Rectangle::new(Point::new(-10, 20), Point::new(10, -20));
        let expected = Bounds {
            left: -20,
            right: 20,
            top: 10,
            bottom: -10,
        };
        assert_eq!(a.bounds(), expected);
        assert_eq!(b.bounds(), expected);
    }

    #[test]
    fn bounds_are_inclusive() {
        let bounds = Rectangle::new(Point::new(0, 0), Point::new(5, 5)).bounds();
        assert!(bounds.contains(&Point::new(0, 0)));
        assert!(bounds.contains(&Point::new(5, 5)));
        assert!(bounds.contains(&Point::new(0, 5)));
        assert!(!bounds.contains(&Point::new(6, 5)));
        assert!(!bounds.contains(&Point::new(5, -1)));
    }

    #[test]
    fn degenerate_rectangle_matches_single_point() {
        let p = Point::new(409146138, -746188906);
        let bounds = Rectangle::new(p, p).bounds();
        assert!(bounds.contains(&p));
        assert!(!bounds.contains(&Point::new(p.latitude + 1, p.longitude)));
    }

    #[test]
    fn sentinel_feature_does_not_exist() {
        let f = Feature::unnamed(Point::new(1, 2));
        assert!(!f.exists());
        assert_eq!(f.location, Point::new(1, 2));
        assert!(Feature::new("Berkshire Valley", Point::default()).exists());
    }

    #[test]
    fn summary_uses_protobuf_json_names() {
        let summary = RouteSummary {
            point_count: 2,
            feature_count: 1,
            distance_meters: 1111,
            elapsed_seconds: 3,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "pointCount": 2,
                "featureCount": 1,
                "distance": 1111,
                "elapsedTime": 3
            })
        );
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let f: Feature = serde_json::from_str(r#"{"location": {"latitude": 5}}"#).unwrap();
        assert_eq!(f.name, "");
        assert_eq!(f.location, Point::new(5, 0));
    }

    #[test]
    fn point_validity() {
        assert!(Point::new(900_000_000, 1_800_000_000).is_valid());
        assert!(!Point::new(900_000_001, 0).is_valid());
        assert!(!Point::new(0, -1_800_000_001).is_valid());
    }
}
