//! Polygon range queries over a key-value table with a geohash range index.
//!
//! Items carry a position; on write they are enriched with a geohash and a
//! fixed-length geohash prefix, and the store indexes them by
//! `(prefix, geohash)`. A query covers the polygon's bounding box with
//! geohash cells, translates each cell into a sort-key range scan, filters
//! the retrieved items against the exact polygon, and merges the per-cell
//! results into pages with an opaque resumable cursor.
//!
//! ```rust
//! use geo::{Coord, LineString, Polygon};
//! use geotable::{GeoTable, GeoTableConfig, MemoryStore};
//! use serde_json::json;
//!
//! let config = GeoTableConfig::new("id");
//! let table = GeoTable::new(MemoryStore::new(&config), config)?;
//!
//! let item = json!({
//!     "id": "munich",
//!     "position": { "latitude": 48.137154, "longitude": 11.576124 },
//! });
//! table.put_item(item.as_object().unwrap())?;
//!
//! let polygon = Polygon::new(
//!     LineString::from(vec![
//!         Coord { x: 11.0, y: 48.0 },
//!         Coord { x: 12.0, y: 48.0 },
//!         Coord { x: 12.0, y: 49.0 },
//!         Coord { x: 11.0, y: 49.0 },
//!         Coord { x: 11.0, y: 48.0 },
//!     ]),
//!     vec![],
//! );
//! let page = table.query(&polygon, 10, None)?;
//! assert_eq!(page.items.len(), 1);
//! # Ok::<(), geotable::GeoTableError>(())
//! ```

pub mod codec;
pub mod config;
pub mod cover;
pub mod cursor;
pub mod enrich;
pub mod error;
mod query;
pub mod stats;
pub mod store;
pub mod table;
pub mod types;

pub use config::{GeoTableConfig, StatisticsConfig};
pub use error::{GeoTableError, Result};

pub use table::GeoTable;

pub use geo::{Point, Polygon, Rect};

pub use codec::{MAX_PRECISION, MIN_PRECISION};

pub use cover::{GeohashCell, QueryPlan, cover};

pub use cursor::{CellCursor, GeoQueryCursor, PageToken};

pub use enrich::GeoItemEnricher;

pub use stats::{
    ItemChange, MemoryStatsStore, StatBucket, StatKey, StatisticsProjector, StatisticsTable,
    StatsStore,
};

pub use store::{GeoStore, MemoryStore, RangePage, RangeQuery, RangeRow};

pub use types::{BoundingBox, GeoItem, GeoPosition, PositionFormat, QueryResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeoTable, GeoTableConfig, GeoTableError, Result};

    pub use geo::{Point, Polygon, Rect};

    pub use crate::{GeoStore, MemoryStore};

    pub use crate::{BoundingBox, GeoItem, GeoPosition, QueryResult};

    pub use crate::{MemoryStatsStore, StatisticsConfig, StatisticsProjector, StatisticsTable};
}
