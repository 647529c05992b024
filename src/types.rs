//! Core value types shared across the query and write paths.

use geo::{Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An item as stored in the underlying table: a flat map of attribute
/// names to JSON values. Items are exchanged by value; the engine never
/// mutates a caller's item in place.
pub type GeoItem = serde_json::Map<String, Value>;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the position lies within the coordinate domain.
    pub fn in_domain(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn to_point(self) -> Point {
        // x = longitude, y = latitude
        Point::new(self.longitude, self.latitude)
    }
}

/// A latitude/longitude aligned rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            south: rect.min().y,
            west: rect.min().x,
            north: rect.max().y,
            east: rect.max().x,
        }
    }

    /// Restrict the box to the coordinate domain. Boxes spanning the
    /// antimeridian or poles are cut off at the domain edge.
    pub fn clamped(&self) -> Self {
        Self {
            south: self.south.max(-90.0),
            west: self.west.max(-180.0),
            north: self.north.min(90.0),
            east: self.east.min(180.0),
        }
    }

    /// A box is empty when it encloses no area at all.
    pub fn is_empty(&self) -> bool {
        self.south > self.north || self.west > self.east
    }

    pub fn center(&self) -> GeoPosition {
        GeoPosition::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }

    pub fn contains_position(&self, position: &GeoPosition) -> bool {
        (self.south..=self.north).contains(&position.latitude)
            && (self.west..=self.east).contains(&position.longitude)
    }
}

/// Attribute layout of the position field on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionFormat {
    /// `{"latitude": .., "longitude": ..}`
    #[default]
    LatitudeLongitude,
    /// `{"lat": .., "long": ..}`
    LatLong,
}

impl PositionFormat {
    /// Read a position out of the value stored under the position field.
    /// Numeric and numeric-string attribute encodings are both accepted.
    pub fn extract(&self, value: &Value) -> Option<GeoPosition> {
        let (lat_key, lon_key) = match self {
            PositionFormat::LatitudeLongitude => ("latitude", "longitude"),
            PositionFormat::LatLong => ("lat", "long"),
        };
        let obj = value.as_object()?;
        let lat = number_of(obj.get(lat_key)?)?;
        let lon = number_of(obj.get(lon_key)?)?;
        Some(GeoPosition::new(lat, lon))
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One page of a polygon query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Matching items, at most `limit` of them, in cell iteration order.
    pub items: Vec<GeoItem>,
    /// Continuation token for the next page; `None` once all cells in the
    /// plan are exhausted.
    pub last_evaluated_key: Option<String>,
}
