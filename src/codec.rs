//! Validated geohash encode/decode.
//!
//! The bit-interleaving itself comes from the `geohash` crate; this layer
//! owns domain validation, error mapping, and the alphabet constants the
//! range translator builds sort-key spans from.

use crate::error::{GeoTableError, Result};
use crate::types::BoundingBox;
use geo::Coord;

/// Shortest usable geohash.
pub const MIN_PRECISION: usize = 1;
/// Longest supported geohash (sub-centimeter cells).
pub const MAX_PRECISION: usize = 12;

/// Lexicographically smallest character of the geohash base-32 alphabet.
pub const ALPHABET_MIN: char = '0';
/// Lexicographically largest character of the geohash base-32 alphabet.
pub const ALPHABET_MAX: char = 'z';

const ALPHABET: &str = "0123456789bcdefghjkmnpqrstuvwxyz";

/// Encode a coordinate into a `precision`-character geohash.
pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<String> {
    if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat)
        || !(-180.0..=180.0).contains(&lon)
    {
        return Err(GeoTableError::InvalidCoordinate { lat, lon });
    }
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        return Err(GeoTableError::InvalidInput(format!(
            "geohash precision must be between {MIN_PRECISION} and {MAX_PRECISION}, got {precision}"
        )));
    }
    // The bisection wraps at the domain edge, sending lat 90 / lon 180 to
    // the opposite corner. Keep boundary points in the northernmost and
    // easternmost cells instead.
    let lat = if lat == 90.0 { lat.next_down() } else { lat };
    let lon = if lon == 180.0 { lon.next_down() } else { lon };
    geohash::encode(Coord { x: lon, y: lat }, precision)
        .map_err(|e| GeoTableError::InvalidInput(format!("geohash encode failed: {e}")))
}

/// Decode a geohash (or prefix) into the bounding box of its cell.
pub fn decode_bbox(hash: &str) -> Result<BoundingBox> {
    if hash.is_empty() || hash.len() > MAX_PRECISION {
        return Err(GeoTableError::InvalidGeohash(hash.to_string()));
    }
    if !hash.chars().all(|c| ALPHABET.contains(c)) {
        return Err(GeoTableError::InvalidGeohash(hash.to_string()));
    }
    let rect = geohash::decode_bbox(hash)
        .map_err(|_| GeoTableError::InvalidGeohash(hash.to_string()))?;
    Ok(BoundingBox::from_rect(&rect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_value() {
        // Reference vector: Munich city center at precision 10.
        let hash = encode(48.137154, 11.576124, 10).unwrap();
        assert_eq!(hash, "u281z7j7pp");
        assert_eq!(encode(48.1, 10.1, 6).unwrap(), "u0x1tu");
    }

    #[test]
    fn test_encode_rejects_out_of_domain() {
        assert!(matches!(
            encode(91.0, 0.0, 6),
            Err(GeoTableError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            encode(0.0, -180.5, 6),
            Err(GeoTableError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            encode(f64::NAN, 0.0, 6),
            Err(GeoTableError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_bad_precision() {
        assert!(matches!(
            encode(0.0, 0.0, 0),
            Err(GeoTableError::InvalidInput(_))
        ));
        assert!(matches!(
            encode(0.0, 0.0, 13),
            Err(GeoTableError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_domain_edge_encodes_to_boundary_cell() {
        // lat 90 / lon 180 must land in the far corner cell, not wrap
        // around to (-90, -180).
        assert_eq!(encode(90.0, 180.0, 1).unwrap(), "z");
        assert_eq!(decode_bbox(&encode(90.0, 0.0, 4).unwrap()).unwrap().north, 90.0);
        assert_eq!(decode_bbox(&encode(0.0, 180.0, 4).unwrap()).unwrap().east, 180.0);
        assert_eq!(decode_bbox(&encode(-90.0, -180.0, 4).unwrap()).unwrap().south, -90.0);
    }

    #[test]
    fn test_decode_bbox_contains_encoded_point() {
        // decode_bbox(encode(p)) must contain p, at every precision.
        let samples = [
            (48.137154, 11.576124),
            (-33.8688, 151.2093),
            (0.0, 0.0),
            (89.9, -179.9),
            (-90.0, -180.0),
            (90.0, 180.0),
        ];
        for (lat, lon) in samples {
            for precision in MIN_PRECISION..=MAX_PRECISION {
                let hash = encode(lat, lon, precision).unwrap();
                let bbox = decode_bbox(&hash).unwrap();
                assert!(
                    bbox.south <= lat && lat <= bbox.north,
                    "{hash}: lat {lat} outside [{}, {}]",
                    bbox.south,
                    bbox.north
                );
                assert!(
                    bbox.west <= lon && lon <= bbox.east,
                    "{hash}: lon {lon} outside [{}, {}]",
                    bbox.west,
                    bbox.east
                );
            }
        }
    }

    #[test]
    fn test_decode_bbox_of_prefix_contains_finer_cells() {
        let fine = decode_bbox("u281z7").unwrap();
        let coarse = decode_bbox("u281").unwrap();
        assert!(coarse.south <= fine.south && fine.north <= coarse.north);
        assert!(coarse.west <= fine.west && fine.east <= coarse.east);
    }

    #[test]
    fn test_decode_bbox_rejects_malformed() {
        for bad in ["", "u28a", "u28i", "u28l", "U28", "u281z7j7ppzzz", "u 2"] {
            assert!(
                matches!(decode_bbox(bad), Err(GeoTableError::InvalidGeohash(_))),
                "expected InvalidGeohash for {bad:?}"
            );
        }
    }
}
