//! Geohash statistics: per-cell item counts at several precisions.
//!
//! A change feed from the indexed table is projected into counters keyed
//! by truncated geohash, one counter per configured precision step. A
//! statistics query then picks the step whose cells best match the size of
//! the requested box and returns the non-empty buckets, which is enough to
//! drive density views without scanning items.

use crate::config::{GeoTableConfig, StatisticsConfig};
use crate::cover::{CellGrid, FALLBACK_CELL_CAP};
use crate::error::{GeoTableError, Result};
use crate::types::{BoundingBox, GeoItem, GeoPosition};
use log::{debug, warn};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key of one counter: partition prefix plus truncated geohash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatKey {
    pub prefix: String,
    pub geohash: String,
}

/// One non-empty counter cell returned by a statistics query.
#[derive(Debug, Clone, PartialEq)]
pub struct StatBucket {
    pub geohash: String,
    pub item_count: u64,
    pub center: GeoPosition,
    pub boundaries: BoundingBox,
}

/// A change observed on the indexed table, carrying the affected item
/// images. Old and new images must already hold their geohash attribute.
#[derive(Debug, Clone)]
pub enum ItemChange {
    Insert { new: GeoItem },
    Modify { old: GeoItem, new: GeoItem },
    Remove { old: GeoItem },
}

/// Counter store consumed by the statistics layer.
pub trait StatsStore: Send + Sync {
    /// Add `delta` to a counter, creating it at zero first if absent.
    fn add_count(&self, key: &StatKey, delta: i64) -> Result<()>;

    /// Remove the counter if its count has dropped to zero or below; keep
    /// it untouched otherwise.
    fn delete_if_drained(&self, key: &StatKey) -> Result<()>;

    /// Current count for a key, `None` when no counter exists.
    fn get_count(&self, key: &StatKey) -> Result<Option<i64>>;
}

/// In-memory counter store used by the test-suite.
#[derive(Default)]
pub struct MemoryStatsStore {
    counts: RwLock<BTreeMap<(String, String), i64>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        self.counts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatsStore for MemoryStatsStore {
    fn add_count(&self, key: &StatKey, delta: i64) -> Result<()> {
        let mut counts = self.counts.write();
        *counts
            .entry((key.prefix.clone(), key.geohash.clone()))
            .or_insert(0) += delta;
        Ok(())
    }

    fn delete_if_drained(&self, key: &StatKey) -> Result<()> {
        let mut counts = self.counts.write();
        let map_key = (key.prefix.clone(), key.geohash.clone());
        if counts.get(&map_key).is_some_and(|count| *count <= 0) {
            counts.remove(&map_key);
        }
        Ok(())
    }

    fn get_count(&self, key: &StatKey) -> Result<Option<i64>> {
        Ok(self
            .counts
            .read()
            .get(&(key.prefix.clone(), key.geohash.clone()))
            .copied())
    }
}

/// Projects item changes into counter updates.
#[derive(Debug, Clone)]
pub struct StatisticsProjector {
    geohash_field: String,
    config: StatisticsConfig,
}

impl StatisticsProjector {
    pub fn new(source_config: &GeoTableConfig, config: StatisticsConfig) -> Result<Self> {
        config.validate().map_err(GeoTableError::InvalidInput)?;
        Ok(Self {
            geohash_field: source_config.geohash_field.clone(),
            config,
        })
    }

    /// Apply one change to the counter store. A modify only touches the
    /// precision steps at which the truncated geohash actually moved.
    pub fn apply<S: StatsStore>(&self, store: &S, change: &ItemChange) -> Result<()> {
        match change {
            ItemChange::Insert { new } => {
                let geohash = self.geohash_of(new)?;
                for &step in &self.config.precision_steps {
                    store.add_count(&self.key_at(&geohash, step)?, 1)?;
                }
            }
            ItemChange::Modify { old, new } => {
                let old_hash = self.geohash_of(old)?;
                let new_hash = self.geohash_of(new)?;
                for &step in &self.config.precision_steps {
                    let old_key = self.key_at(&old_hash, step)?;
                    let new_key = self.key_at(&new_hash, step)?;
                    if old_key == new_key {
                        continue;
                    }
                    store.add_count(&old_key, -1)?;
                    store.add_count(&new_key, 1)?;
                    store.delete_if_drained(&old_key)?;
                }
            }
            ItemChange::Remove { old } => {
                let geohash = self.geohash_of(old)?;
                for &step in &self.config.precision_steps {
                    let key = self.key_at(&geohash, step)?;
                    store.add_count(&key, -1)?;
                    store.delete_if_drained(&key)?;
                }
            }
        }
        Ok(())
    }

    fn geohash_of(&self, item: &GeoItem) -> Result<String> {
        match item.get(&self.geohash_field) {
            Some(Value::String(geohash)) => Ok(geohash.clone()),
            _ => Err(GeoTableError::InvalidInput(format!(
                "item is missing geohash attribute {:?}",
                self.geohash_field
            ))),
        }
    }

    fn key_at(&self, geohash: &str, precision: usize) -> Result<StatKey> {
        if geohash.len() < precision {
            return Err(GeoTableError::InvalidInput(format!(
                "cannot truncate geohash {geohash:?} to precision {precision}"
            )));
        }
        Ok(StatKey {
            prefix: geohash[..self.config.prefix_length].to_string(),
            geohash: geohash[..precision].to_string(),
        })
    }
}

/// Read side of the statistics layer.
pub struct StatisticsTable<S: StatsStore> {
    store: S,
    config: StatisticsConfig,
}

impl<S: StatsStore> StatisticsTable<S> {
    pub fn new(store: S, config: StatisticsConfig) -> Result<Self> {
        config.validate().map_err(GeoTableError::InvalidInput)?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the non-empty buckets covering `bbox`, at the finest
    /// configured precision step whose covering fits the cell budget. A
    /// small box therefore yields high-resolution buckets and a large box
    /// coarse ones.
    pub fn query(&self, bbox: &BoundingBox) -> Result<Vec<StatBucket>> {
        let bbox = bbox.clamped();
        if bbox.is_empty() {
            return Err(GeoTableError::InvalidInput(
                "bounding box is empty after clamping to the coordinate domain".to_string(),
            ));
        }

        let grid = self.pick_step(&bbox)?;
        let step = grid.precision();
        let cells = grid.cells()?;
        debug!(
            "statistics query step={} cells={} box=({}, {})..({}, {})",
            step,
            cells.len(),
            bbox.south,
            bbox.west,
            bbox.north,
            bbox.east,
        );

        let mut buckets = Vec::new();
        for cell in cells {
            let key = StatKey {
                prefix: cell.prefix()[..self.config.prefix_length].to_string(),
                geohash: cell.prefix().to_string(),
            };
            let Some(count) = self.store.get_count(&key)? else {
                continue;
            };
            if count <= 0 {
                continue;
            }
            let boundaries = cell.bbox()?;
            buckets.push(StatBucket {
                geohash: key.geohash,
                item_count: count as u64,
                center: boundaries.center(),
                boundaries,
            });
        }
        Ok(buckets)
    }

    fn pick_step(&self, bbox: &BoundingBox) -> Result<CellGrid> {
        for &step in self.config.precision_steps.iter().rev() {
            let grid = CellGrid::at(bbox, step)?;
            if grid.cell_count() <= self.config.max_cells_per_query as u128 {
                return Ok(grid);
            }
        }
        // Even the coarsest step blows the budget; fall back to it, but
        // never enumerate an unbounded covering.
        let coarsest = self.config.precision_steps[0];
        let grid = CellGrid::at(bbox, coarsest)?;
        let count = grid.cell_count();
        if count > FALLBACK_CELL_CAP {
            return Err(GeoTableError::InvalidInput(format!(
                "bounding box covers {count} cells at the coarsest precision step {coarsest}, \
                 more than the supported maximum; use a coarser step or a larger budget"
            )));
        }
        warn!(
            "statistics covering exceeds cell budget: {count} cells at step {coarsest} \
             (budget {})",
            self.config.max_cells_per_query
        );
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GEOHASH: &str = "u281z7j7ppzs";
    const OTHER_GEOHASH: &str = "u281hsd54tnu";

    fn projector() -> StatisticsProjector {
        StatisticsProjector::new(
            &GeoTableConfig::new("id"),
            StatisticsConfig::new([3usize, 7]),
        )
        .unwrap()
    }

    fn item(geohash: &str) -> GeoItem {
        json!({"id": "id-1", "_geohash": geohash, "_geohash_prefix": &geohash[..3]})
            .as_object()
            .unwrap()
            .clone()
    }

    fn key(geohash: &str, precision: usize) -> StatKey {
        StatKey {
            prefix: geohash[..3].to_string(),
            geohash: geohash[..precision].to_string(),
        }
    }

    #[test]
    fn test_insert_increments_every_step() {
        let store = MemoryStatsStore::new();
        let projector = projector();
        projector
            .apply(&store, &ItemChange::Insert { new: item(GEOHASH) })
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_count(&key(GEOHASH, 3)).unwrap(), Some(1));
        assert_eq!(store.get_count(&key(GEOHASH, 7)).unwrap(), Some(1));
    }

    #[test]
    fn test_modify_moves_only_changed_steps() {
        let store = MemoryStatsStore::new();
        let projector = projector();
        projector
            .apply(&store, &ItemChange::Insert { new: item(GEOHASH) })
            .unwrap();
        // Same precision-3 prefix, different precision-7 prefix.
        projector
            .apply(
                &store,
                &ItemChange::Modify {
                    old: item(GEOHASH),
                    new: item(OTHER_GEOHASH),
                },
            )
            .unwrap();

        assert_eq!(store.get_count(&key(GEOHASH, 3)).unwrap(), Some(1));
        assert_eq!(store.get_count(&key(GEOHASH, 7)).unwrap(), None);
        assert_eq!(store.get_count(&key(OTHER_GEOHASH, 7)).unwrap(), Some(1));
    }

    #[test]
    fn test_remove_drains_counters() {
        let store = MemoryStatsStore::new();
        let projector = projector();
        projector
            .apply(&store, &ItemChange::Insert { new: item(GEOHASH) })
            .unwrap();
        projector
            .apply(&store, &ItemChange::Remove { old: item(GEOHASH) })
            .unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn test_shared_counter_survives_partial_removal() {
        let store = MemoryStatsStore::new();
        let projector = projector();
        projector
            .apply(&store, &ItemChange::Insert { new: item(GEOHASH) })
            .unwrap();
        projector
            .apply(
                &store,
                &ItemChange::Insert {
                    new: item(OTHER_GEOHASH),
                },
            )
            .unwrap();
        projector
            .apply(&store, &ItemChange::Remove { old: item(GEOHASH) })
            .unwrap();

        // The precision-3 bucket is shared and still holds one item.
        assert_eq!(store.get_count(&key(GEOHASH, 3)).unwrap(), Some(1));
        assert_eq!(store.get_count(&key(GEOHASH, 7)).unwrap(), None);
        assert_eq!(store.get_count(&key(OTHER_GEOHASH, 7)).unwrap(), Some(1));
    }

    #[test]
    fn test_huge_query_at_coarsest_step_is_rejected() {
        // A world-sized box at a fine coarsest step would enumerate far
        // beyond the fallback cap.
        let table = StatisticsTable::new(
            MemoryStatsStore::new(),
            StatisticsConfig::new([6usize]).with_max_cells_per_query(16),
        )
        .unwrap();
        let world = BoundingBox::new(-90.0, -180.0, 90.0, 180.0);
        assert!(matches!(
            table.query(&world),
            Err(GeoTableError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_over_budget_fallback_within_cap_still_answers() {
        // 1024 cells at step 2 exceed a budget of 4 but stay under the cap.
        let table = StatisticsTable::new(
            MemoryStatsStore::new(),
            StatisticsConfig::new([2usize]).with_max_cells_per_query(4).with_prefix_length(2),
        )
        .unwrap();
        let world = BoundingBox::new(-90.0, -180.0, 90.0, 180.0);
        assert!(table.query(&world).unwrap().is_empty());
    }

    #[test]
    fn test_too_short_geohash_is_rejected() {
        let store = MemoryStatsStore::new();
        let projector = projector();
        let result = projector.apply(&store, &ItemChange::Insert { new: item("u28") });
        assert!(matches!(result, Err(GeoTableError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_geohash_attribute_is_rejected() {
        let store = MemoryStatsStore::new();
        let projector = projector();
        let bare = json!({"id": "x"}).as_object().unwrap().clone();
        assert!(matches!(
            projector.apply(&store, &ItemChange::Insert { new: bare }),
            Err(GeoTableError::InvalidInput(_))
        ));
    }
}
