//! Write-path encoder.
//!
//! Before an item is persisted, its position is encoded into the two
//! attributes driving the geohash index: the full-precision geohash and
//! its truncated prefix. Enrichment produces a new item; the caller's
//! item is never touched, so reusing one item value across writes is safe.

use crate::codec;
use crate::config::GeoTableConfig;
use crate::error::{GeoTableError, Result};
use crate::types::{GeoItem, GeoPosition};
use serde_json::Value;

/// Read the configured position attribute off an item.
pub(crate) fn position_of(item: &GeoItem, config: &GeoTableConfig) -> Result<GeoPosition> {
    let value = item
        .get(&config.position_field)
        .ok_or_else(|| GeoTableError::MissingPosition(config.position_field.clone()))?;
    config
        .position_format
        .extract(value)
        .ok_or_else(|| GeoTableError::MissingPosition(config.position_field.clone()))
}

/// Computes the derived geohash attributes for the write path. The two
/// attributes it sets are owned by this component; nothing else in the
/// engine writes them.
#[derive(Debug, Clone)]
pub struct GeoItemEnricher {
    config: GeoTableConfig,
}

impl GeoItemEnricher {
    pub fn new(config: GeoTableConfig) -> Self {
        Self { config }
    }

    /// Return a copy of `item` with the geohash and geohash-prefix
    /// attributes set from its position. Refuses to overwrite attributes
    /// already present unless `overwrite_existing` is set.
    pub fn enrich_item(&self, item: &GeoItem, overwrite_existing: bool) -> Result<GeoItem> {
        let position = position_of(item, &self.config)?;
        let geohash = codec::encode(position.latitude, position.longitude, self.config.precision)?;
        let prefix = geohash[..self.config.prefix_length].to_string();

        let mut enriched = item.clone();
        self.set_value(&mut enriched, &self.config.geohash_field, geohash, overwrite_existing)?;
        self.set_value(
            &mut enriched,
            &self.config.geohash_prefix_field,
            prefix,
            overwrite_existing,
        )?;
        Ok(enriched)
    }

    fn set_value(
        &self,
        item: &mut GeoItem,
        field: &str,
        value: String,
        overwrite_existing: bool,
    ) -> Result<()> {
        if !overwrite_existing && item.contains_key(field) {
            return Err(GeoTableError::InvalidInput(format!(
                "field {field:?} already exists"
            )));
        }
        item.insert(field.to_string(), Value::String(value));
        Ok(())
    }
}
