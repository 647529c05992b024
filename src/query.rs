//! Range query translation and result merging.
//!
//! Each covering cell maps onto one range query against the geohash index:
//! partition-key equality on the cell's truncated prefix, sort-key range
//! spanning every full-precision geohash under the cell. The merger runs
//! the per-cell queries, drops geohash false positives by exact polygon
//! containment, and assembles one limit-bounded page. The per-cell queries
//! are mutually independent; the iteration order here only fixes the order
//! of items within a page, not which items are eventually returned.

use crate::codec::{ALPHABET_MAX, ALPHABET_MIN};
use crate::config::GeoTableConfig;
use crate::cover::GeohashCell;
use crate::cursor::{CellCursor, GeoQueryCursor, PageToken};
use crate::enrich::position_of;
use crate::error::Result;
use crate::store::{GeoStore, RangeQuery};
use crate::types::GeoItem;
use geo::{Contains, Polygon};

/// Execution counters for one page, surfaced through debug logging.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct QueryStats {
    pub queries: usize,
    pub rows_scanned: usize,
    pub rows_filtered: usize,
}

/// Build the range query descriptor for one covering cell.
///
/// The sort-key span covers the entire lexicographic range of
/// full-precision geohashes sharing the cell's prefix. No polygon
/// filtering is pushed down; containment is evaluated on retrieval.
pub(crate) fn cell_range_query(
    cell: &GeohashCell,
    config: &GeoTableConfig,
    cursor: &CellCursor,
    limit: usize,
) -> RangeQuery {
    let remaining = config.precision.saturating_sub(cell.precision());
    let mut sort_min = String::with_capacity(config.precision);
    let mut sort_max = String::with_capacity(config.precision);
    sort_min.push_str(cell.prefix());
    sort_max.push_str(cell.prefix());
    for _ in 0..remaining {
        sort_min.push(ALPHABET_MIN);
        sort_max.push(ALPHABET_MAX);
    }

    RangeQuery {
        partition: cell.prefix()[..config.prefix_length].to_string(),
        sort_min,
        sort_max,
        exclusive_start: cursor.token().cloned(),
        limit,
    }
}

/// Produce the next page for `cursor`, advancing its per-cell states in
/// place.
///
/// Every non-exhausted cell is queried once for up to `limit` rows. Rows
/// outside the polygon are dropped and never counted against the limit;
/// surviving rows beyond the limit are pushed back by resetting the cell's
/// token to the last consumed row. A failing cell query fails the whole
/// page so pagination state is never silently corrupted.
pub(crate) fn advance<S: GeoStore>(
    store: &S,
    config: &GeoTableConfig,
    cursor: &mut GeoQueryCursor,
    polygon: &Polygon,
    limit: usize,
) -> Result<(Vec<GeoItem>, QueryStats)> {
    let cells: Vec<GeohashCell> = cursor.plan().cells().to_vec();
    let mut items = Vec::new();
    let mut stats = QueryStats::default();

    for cell in &cells {
        if items.len() >= limit {
            break;
        }
        let state = cursor.cell(cell.prefix()).clone();
        if state.is_exhausted() {
            continue;
        }

        let page = store.query_index(&cell_range_query(cell, config, &state, limit))?;
        stats.queries += 1;
        stats.rows_scanned += page.rows.len();

        let total = page.rows.len();
        let store_end = page.last_evaluated_key;
        let mut consumed = 0usize;
        let mut last_consumed: Option<PageToken> = None;

        for row in page.rows {
            if items.len() >= limit {
                break;
            }
            let position = position_of(&row.item, config)?;
            consumed += 1;
            last_consumed = Some(row.resume_key);
            if polygon.contains(&position.to_point()) {
                items.push(row.item);
            } else {
                stats.rows_filtered += 1;
            }
        }

        let next_state = if consumed == total {
            // Whole page consumed: the store's own continuation decides
            // whether the cell is drained.
            match store_end {
                Some(token) => CellCursor::InProgress(token),
                None => CellCursor::Exhausted,
            }
        } else {
            // Page limit reached mid-cell: unread rows are pushed back by
            // resuming after the last row actually consumed.
            match last_consumed {
                Some(token) => CellCursor::InProgress(token),
                None => state,
            }
        };
        cursor.set_cell(cell.prefix(), next_state);
    }

    Ok((items, stats))
}
