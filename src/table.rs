//! The geo-indexed table facade.
//!
//! `GeoTable` ties the pieces together: the write path enriches items with
//! their geohash attributes before handing them to the store, and the read
//! path plans a covering, runs the per-cell range queries, and returns one
//! merged page with an opaque continuation key.

use crate::config::GeoTableConfig;
use crate::cover::{QueryPlan, cover};
use crate::cursor::GeoQueryCursor;
use crate::enrich::GeoItemEnricher;
use crate::error::{GeoTableError, Result};
use crate::query::advance;
use crate::store::GeoStore;
use crate::types::{BoundingBox, GeoItem, QueryResult};
use geo::{BoundingRect, Polygon};
use log::debug;

/// Geospatial polygon queries over a key-value table with a geohash index.
///
/// # Example
///
/// ```rust
/// use geo::{Rect, coord};
/// use geotable::{GeoTable, GeoTableConfig, MemoryStore};
/// use serde_json::json;
///
/// let config = GeoTableConfig::new("id").with_prefix_length(4).with_precision(10);
/// let table = GeoTable::new(MemoryStore::new(&config), config)?;
///
/// let item = json!({
///     "id": "munich",
///     "position": {"latitude": 48.137154, "longitude": 11.576124},
/// });
/// table.put_item(item.as_object().unwrap())?;
///
/// let polygon = Rect::new(coord! { x: 11.0, y: 48.0 }, coord! { x: 12.0, y: 49.0 })
///     .to_polygon();
/// let page = table.query(&polygon, 10, None)?;
/// assert_eq!(page.items.len(), 1);
/// # Ok::<(), geotable::GeoTableError>(())
/// ```
pub struct GeoTable<S: GeoStore> {
    store: S,
    config: GeoTableConfig,
    enricher: GeoItemEnricher,
}

impl<S: GeoStore> GeoTable<S> {
    /// Create a table over the given store. Fails on invalid configuration.
    pub fn new(store: S, config: GeoTableConfig) -> Result<Self> {
        config.validate().map_err(GeoTableError::InvalidInput)?;
        let enricher = GeoItemEnricher::new(config.clone());
        Ok(Self {
            store,
            config,
            enricher,
        })
    }

    pub fn config(&self) -> &GeoTableConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write one item, computing its geohash index attributes from the
    /// position attribute. The caller's item is not modified.
    pub fn put_item(&self, item: &GeoItem) -> Result<()> {
        let enriched = self.enricher.enrich_item(item, false)?;
        self.store.put_item(&enriched)
    }

    /// Fetch one page of items inside `polygon`, at most `limit` of them.
    ///
    /// Pass the previous page's `last_evaluated_key` to resume; an absent
    /// key on the result means the query is complete. Item order within a
    /// page follows cell iteration order and carries no spatial meaning.
    pub fn query(
        &self,
        polygon: &Polygon,
        limit: usize,
        exclusive_start_key: Option<&str>,
    ) -> Result<QueryResult> {
        if limit == 0 {
            return Err(GeoTableError::InvalidInput(
                "query limit must be greater than zero".to_string(),
            ));
        }

        let mut cursor = match exclusive_start_key.filter(|key| !key.is_empty()) {
            Some(encoded) => {
                let cursor = GeoQueryCursor::decode(encoded)?;
                self.check_plan_shape(cursor.plan())?;
                cursor
            }
            None => GeoQueryCursor::new(self.plan_for(polygon)?),
        };

        let (items, stats) = advance(&self.store, &self.config, &mut cursor, polygon, limit)?;
        debug!(
            "geo query limit={} cells={} queries={} scanned_rows={} filtered_rows={}",
            limit,
            cursor.plan().len(),
            stats.queries,
            stats.rows_scanned,
            stats.rows_filtered,
        );

        let last_evaluated_key = if cursor.has_more() {
            Some(cursor.encode()?)
        } else {
            None
        };
        Ok(QueryResult {
            items,
            last_evaluated_key,
        })
    }

    /// Plan the covering for a fresh query. Planning happens once per
    /// logical query; subsequent pages reuse the plan from the cursor.
    fn plan_for(&self, polygon: &Polygon) -> Result<QueryPlan> {
        let rect = polygon.bounding_rect().ok_or_else(|| {
            GeoTableError::InvalidInput("query polygon has no extent".to_string())
        })?;
        let bbox = BoundingBox::from_rect(&rect);
        let plan = cover(
            &bbox,
            self.config.prefix_length,
            self.config.precision,
            self.config.max_cells_per_query,
        )?;
        if plan.len() > self.config.max_cells_per_query {
            return Err(GeoTableError::InvalidInput(format!(
                "the given polygon covers {} cells, no more than {} are supported; \
                 use a shorter prefix length to query larger areas",
                plan.len(),
                self.config.max_cells_per_query
            )));
        }
        Ok(plan)
    }

    /// Reject cursors whose plan cannot have come from this configuration.
    fn check_plan_shape(&self, plan: &QueryPlan) -> Result<()> {
        if plan.precision() < self.config.prefix_length
            || plan.precision() > self.config.precision
        {
            return Err(GeoTableError::InvalidCursor(format!(
                "cursor plan precision {} is outside the table's range {}..={}",
                plan.precision(),
                self.config.prefix_length,
                self.config.precision
            )));
        }
        if plan.len() > self.config.max_cells_per_query {
            return Err(GeoTableError::InvalidCursor(format!(
                "cursor plan has {} cells, table allows {}",
                plan.len(),
                self.config.max_cells_per_query
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use geo::{Rect, coord};
    use serde_json::json;

    fn table() -> GeoTable<MemoryStore> {
        let config = GeoTableConfig::new("id").with_prefix_length(4).with_precision(10);
        GeoTable::new(MemoryStore::new(&config), config).unwrap()
    }

    fn rect_polygon(west: f64, south: f64, east: f64, north: f64) -> Polygon {
        Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north }).to_polygon()
    }

    fn put(table: &GeoTable<MemoryStore>, id: &str, lat: f64, lon: f64) {
        let item = json!({"id": id, "position": {"latitude": lat, "longitude": lon}});
        table.put_item(item.as_object().unwrap()).unwrap();
    }

    #[test]
    fn test_put_item_enriches() {
        let table = table();
        put(&table, "munich", 48.137154, 11.576124);

        let stored = &table.store().scan()[0];
        assert_eq!(stored["_geohash"], "u281z7j7pp");
        assert_eq!(stored["_geohash_prefix"], "u281");
    }

    #[test]
    fn test_query_zero_limit_rejected() {
        let table = table();
        let polygon = rect_polygon(11.0, 48.0, 12.0, 49.0);
        assert!(matches!(
            table.query(&polygon, 0, None),
            Err(GeoTableError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_query_rejects_malformed_cursor() {
        let table = table();
        let polygon = rect_polygon(11.0, 48.0, 12.0, 49.0);
        assert!(matches!(
            table.query(&polygon, 5, Some("{broken")),
            Err(GeoTableError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_empty_start_key_is_first_page() {
        let table = table();
        put(&table, "munich", 48.137154, 11.576124);
        let polygon = rect_polygon(11.0, 48.0, 12.0, 49.0);
        let page = table.query(&polygon, 5, Some("")).unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_oversized_polygon_rejected() {
        let table = table();
        // Half the planet at prefix length 4 blows any reasonable budget.
        let polygon = rect_polygon(-180.0, -90.0, 0.0, 90.0);
        assert!(matches!(
            table.query(&polygon, 5, None),
            Err(GeoTableError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GeoTableConfig::new("id").with_prefix_length(8).with_precision(6);
        let store = MemoryStore::new(&config);
        assert!(matches!(
            GeoTable::new(store, config),
            Err(GeoTableError::InvalidInput(_))
        ));
    }
}
