//! Underlying store interface.
//!
//! The engine talks to the table through `GeoStore`: upsert by primary key
//! plus sorted range queries over a secondary index keyed by
//! (geohash prefix, geohash). `MemoryStore` is the in-process reference
//! implementation used by the test-suite; adapters for real key-value
//! stores implement the same trait.

use crate::config::GeoTableConfig;
use crate::cursor::PageToken;
use crate::error::{GeoTableError, Result};
use crate::types::GeoItem;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Bound;

/// One range query against the geohash index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// Index partition key (a geohash prefix of the configured length).
    pub partition: String,
    /// Inclusive lower bound on the index sort key.
    pub sort_min: String,
    /// Inclusive upper bound on the index sort key.
    pub sort_max: String,
    /// Resume strictly after this token, if present.
    pub exclusive_start: Option<PageToken>,
    /// Maximum number of rows to return. Must be greater than zero.
    pub limit: usize,
}

/// A returned row together with the token that resumes the range strictly
/// after it.
#[derive(Debug, Clone)]
pub struct RangeRow {
    pub item: GeoItem,
    pub resume_key: PageToken,
}

/// One page of a range query. An absent `last_evaluated_key` means the
/// range is drained; stores must report this accurately.
#[derive(Debug, Clone)]
pub struct RangePage {
    pub rows: Vec<RangeRow>,
    pub last_evaluated_key: Option<PageToken>,
}

/// Store collaborator consumed by the engine.
pub trait GeoStore: Send + Sync {
    /// Upsert one (already enriched) item by primary key.
    fn put_item(&self, item: &GeoItem) -> Result<()>;

    /// Execute a sorted range query over the geohash index. Rows come back
    /// in ascending lexicographic sort-key order.
    fn query_index(&self, query: &RangeQuery) -> Result<RangePage>;
}

type IndexKey = (String, String, String); // (prefix, geohash, primary key)

#[derive(Default)]
struct MemoryStoreInner {
    items: BTreeMap<String, GeoItem>,
    index: BTreeMap<IndexKey, String>,
}

/// In-memory store backed by sorted maps. Shared behind `&self` like a
/// real store client; writes take the inner lock.
pub struct MemoryStore {
    partition_key_field: String,
    sort_key_field: Option<String>,
    geohash_field: String,
    geohash_prefix_field: String,
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new(config: &GeoTableConfig) -> Self {
        Self {
            partition_key_field: config.partition_key_field.clone(),
            sort_key_field: config.sort_key_field.clone(),
            geohash_field: config.geohash_field.clone(),
            geohash_prefix_field: config.geohash_prefix_field.clone(),
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored item, for test assertions.
    pub fn scan(&self) -> Vec<GeoItem> {
        self.inner.read().items.values().cloned().collect()
    }

    fn primary_key(&self, item: &GeoItem) -> Result<String> {
        let mut key = key_string(item, &self.partition_key_field)?;
        if let Some(sort_field) = &self.sort_key_field {
            key.push('\u{1f}');
            key.push_str(&key_string(item, sort_field)?);
        }
        Ok(key)
    }

    fn index_key(&self, item: &GeoItem, primary_key: &str) -> Result<IndexKey> {
        let prefix = key_string(item, &self.geohash_prefix_field)?;
        let geohash = key_string(item, &self.geohash_field)?;
        Ok((prefix, geohash, primary_key.to_string()))
    }
}

fn key_string(item: &GeoItem, field: &str) -> Result<String> {
    match item.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(GeoTableError::Store(format!(
            "attribute {field:?} is not a key type: {other}"
        ))),
        None => Err(GeoTableError::Store(format!(
            "item is missing key attribute {field:?}"
        ))),
    }
}

fn encode_token(key: &IndexKey) -> Result<PageToken> {
    // The token format belongs to this store; the engine round-trips it
    // without interpretation.
    let payload = serde_json::to_string(&(&key.0, &key.1, &key.2))
        .map_err(|e| GeoTableError::Store(format!("pagination token encoding failed: {e}")))?;
    Ok(PageToken::new(payload))
}

fn decode_token(token: &PageToken) -> Result<IndexKey> {
    serde_json::from_str(token.as_str())
        .map_err(|e| GeoTableError::Store(format!("unrecognized pagination token: {e}")))
}

impl GeoStore for MemoryStore {
    fn put_item(&self, item: &GeoItem) -> Result<()> {
        let primary_key = self.primary_key(item)?;
        let index_key = self.index_key(item, &primary_key)?;

        let mut inner = self.inner.write();
        if let Some(previous) = inner.items.get(&primary_key) {
            let old_key = self.index_key(previous, &primary_key)?;
            inner.index.remove(&old_key);
        }
        inner.index.insert(index_key, primary_key.clone());
        inner.items.insert(primary_key, item.clone());
        Ok(())
    }

    fn query_index(&self, query: &RangeQuery) -> Result<RangePage> {
        if query.limit == 0 {
            return Err(GeoTableError::Store(
                "range query limit must be greater than zero".to_string(),
            ));
        }

        let start = match &query.exclusive_start {
            Some(token) => {
                let key = decode_token(token)?;
                if key.0 != query.partition {
                    return Err(GeoTableError::Store(format!(
                        "pagination token belongs to partition {:?}, not {:?}",
                        key.0, query.partition
                    )));
                }
                Bound::Excluded(key)
            }
            None => Bound::Included((
                query.partition.clone(),
                query.sort_min.clone(),
                String::new(),
            )),
        };

        let inner = self.inner.read();
        let mut rows = Vec::new();
        let mut truncated = false;
        for (key, primary_key) in inner.index.range((start, Bound::Unbounded)) {
            if key.0 != query.partition || key.1 > query.sort_max {
                break;
            }
            if key.1 < query.sort_min {
                continue;
            }
            if rows.len() == query.limit {
                truncated = true;
                break;
            }
            let item = inner.items.get(primary_key).cloned().ok_or_else(|| {
                GeoTableError::Store(format!("index points at missing item {primary_key:?}"))
            })?;
            rows.push(RangeRow {
                item,
                resume_key: encode_token(key)?,
            });
        }

        // Only report a continuation when rows actually remain, so callers
        // can treat an absent key as a drained range.
        let last_evaluated_key = if truncated {
            rows.last().map(|row| row.resume_key.clone())
        } else {
            None
        };
        Ok(RangePage {
            rows,
            last_evaluated_key,
        })
    }
}
