//! Table and statistics configuration.
//!
//! Configurations are serde-serializable so they can be loaded from JSON
//! (or TOML with the `toml` feature) alongside deployment descriptors.

use crate::codec::{MAX_PRECISION, MIN_PRECISION};
use crate::types::PositionFormat;
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Configuration of a geo-indexed table.
///
/// The table is assumed to carry a secondary index keyed by
/// (`geohash_prefix_field`, `geohash_field`); both attributes are computed
/// by the write path from the item's position attribute.
///
/// # Example
///
/// ```rust
/// use geotable::GeoTableConfig;
///
/// let config = GeoTableConfig::new("id")
///     .with_prefix_length(4)
///     .with_precision(10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTableConfig {
    /// Name of the table's own partition key attribute. Passed through
    /// unchanged; the engine never interprets its value.
    pub partition_key_field: String,

    /// Optional sort key attribute of the table's primary key.
    #[serde(default)]
    pub sort_key_field: Option<String>,

    /// Attribute holding the full-precision geohash (index sort key).
    #[serde(default = "GeoTableConfig::default_geohash_field")]
    pub geohash_field: String,

    /// Attribute holding the truncated geohash (index partition key).
    #[serde(default = "GeoTableConfig::default_geohash_prefix_field")]
    pub geohash_prefix_field: String,

    /// Attribute holding the item position.
    #[serde(default = "GeoTableConfig::default_position_field")]
    pub position_field: String,

    /// Layout of the position attribute.
    #[serde(default)]
    pub position_format: PositionFormat,

    /// Length of the indexed geohash prefix (1-12). Governs partition
    /// granularity: shorter prefixes mean fewer, larger partitions.
    #[serde(default = "GeoTableConfig::default_prefix_length")]
    pub prefix_length: usize,

    /// Full geohash precision stored on items (1-12, >= `prefix_length`).
    #[serde(default = "GeoTableConfig::default_precision")]
    pub precision: usize,

    /// Maximum number of covering cells one query may fan out to.
    #[serde(default = "GeoTableConfig::default_max_cells_per_query")]
    pub max_cells_per_query: usize,
}

impl GeoTableConfig {
    fn default_geohash_field() -> String {
        "_geohash".to_string()
    }

    fn default_geohash_prefix_field() -> String {
        "_geohash_prefix".to_string()
    }

    fn default_position_field() -> String {
        "position".to_string()
    }

    const fn default_prefix_length() -> usize {
        3
    }

    const fn default_precision() -> usize {
        12
    }

    const fn default_max_cells_per_query() -> usize {
        128
    }

    /// Create a configuration with defaults for the given partition key.
    pub fn new(partition_key_field: impl Into<String>) -> Self {
        Self {
            partition_key_field: partition_key_field.into(),
            sort_key_field: None,
            geohash_field: Self::default_geohash_field(),
            geohash_prefix_field: Self::default_geohash_prefix_field(),
            position_field: Self::default_position_field(),
            position_format: PositionFormat::default(),
            prefix_length: Self::default_prefix_length(),
            precision: Self::default_precision(),
            max_cells_per_query: Self::default_max_cells_per_query(),
        }
    }

    pub fn with_sort_key_field(mut self, field: impl Into<String>) -> Self {
        self.sort_key_field = Some(field.into());
        self
    }

    pub fn with_geohash_field(mut self, field: impl Into<String>) -> Self {
        self.geohash_field = field.into();
        self
    }

    pub fn with_geohash_prefix_field(mut self, field: impl Into<String>) -> Self {
        self.geohash_prefix_field = field.into();
        self
    }

    pub fn with_position_field(mut self, field: impl Into<String>) -> Self {
        self.position_field = field.into();
        self
    }

    pub fn with_position_format(mut self, format: PositionFormat) -> Self {
        self.position_format = format;
        self
    }

    pub fn with_prefix_length(mut self, prefix_length: usize) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_cells_per_query(mut self, max_cells: usize) -> Self {
        self.max_cells_per_query = max_cells;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.partition_key_field.is_empty() {
            return Err("Partition key field must not be empty".to_string());
        }
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.prefix_length) {
            return Err(format!(
                "Prefix length must be between {MIN_PRECISION} and {MAX_PRECISION}"
            ));
        }
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.precision) {
            return Err(format!(
                "Precision must be between {MIN_PRECISION} and {MAX_PRECISION}"
            ));
        }
        if self.precision < self.prefix_length {
            return Err("Precision must not be smaller than prefix length".to_string());
        }
        if self.max_cells_per_query == 0 {
            return Err("Max cells per query must be greater than zero".to_string());
        }
        if self.geohash_field == self.geohash_prefix_field {
            return Err("Geohash field and geohash prefix field must differ".to_string());
        }
        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: GeoTableConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from a TOML string (requires the `toml` feature).
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: GeoTableConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as a TOML string (requires the `toml` feature).
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Configuration of the statistics layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Geohash precisions at which item counts are maintained, coarsest
    /// first. Each step must be at least `prefix_length` long so a counter
    /// key can be formed.
    #[serde(default = "StatisticsConfig::default_precision_steps")]
    pub precision_steps: Vec<usize>,

    /// Length of the counter table's partition key prefix.
    #[serde(default = "StatisticsConfig::default_prefix_length")]
    pub prefix_length: usize,

    /// Cell budget for one statistics query.
    #[serde(default = "StatisticsConfig::default_max_cells_per_query")]
    pub max_cells_per_query: usize,
}

impl StatisticsConfig {
    fn default_precision_steps() -> Vec<usize> {
        vec![3, 5, 7]
    }

    const fn default_prefix_length() -> usize {
        3
    }

    const fn default_max_cells_per_query() -> usize {
        1024
    }

    pub fn new(precision_steps: impl Into<Vec<usize>>) -> Self {
        Self {
            precision_steps: precision_steps.into(),
            prefix_length: Self::default_prefix_length(),
            max_cells_per_query: Self::default_max_cells_per_query(),
        }
    }

    pub fn with_prefix_length(mut self, prefix_length: usize) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    pub fn with_max_cells_per_query(mut self, max_cells: usize) -> Self {
        self.max_cells_per_query = max_cells;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.precision_steps.is_empty() {
            return Err("At least one precision step is required".to_string());
        }
        if !self.precision_steps.windows(2).all(|w| w[0] < w[1]) {
            return Err("Precision steps must be strictly increasing".to_string());
        }
        for &step in &self.precision_steps {
            if !(MIN_PRECISION..=MAX_PRECISION).contains(&step) {
                return Err(format!(
                    "Precision steps must be between {MIN_PRECISION} and {MAX_PRECISION}"
                ));
            }
            if step < self.prefix_length {
                return Err(format!(
                    "Precision step {step} is shorter than prefix length {}",
                    self.prefix_length
                ));
            }
        }
        if self.max_cells_per_query == 0 {
            return Err("Max cells per query must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self::new(Self::default_precision_steps())
    }
}
