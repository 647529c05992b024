//! Error types for geotable operations.

use thiserror::Error;

/// Errors surfaced by table and statistics operations.
#[derive(Error, Debug)]
pub enum GeoTableError {
    /// Latitude or longitude outside the coordinate domain.
    #[error("invalid coordinate: latitude {lat}, longitude {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// A geohash string (or prefix) not drawn from the base-32 alphabet.
    /// Hitting this on a stored row indicates index corruption.
    #[error("invalid geohash: {0:?}")]
    InvalidGeohash(String),

    /// The item to write lacks a usable position attribute.
    #[error("item is missing a valid position attribute {0:?}")]
    MissingPosition(String),

    /// A continuation token that does not decode to a valid plan and
    /// cell-cursor map. Surfaced instead of silently restarting the query.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Opaque failure reported by the underlying store. Not retried here;
    /// callers apply their own retry policy.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid configuration or call arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GeoTableError>;
