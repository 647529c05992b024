//! Cell covering planner.
//!
//! Decomposes a bounding box into the set of geohash cells of one fixed
//! precision that intersect it. `cover` searches for the finest precision
//! whose cell count stays within the caller's budget: finer cells mean
//! fewer geohash false positives per range query, coarser cells mean fewer
//! range queries.

use crate::codec::{self, MAX_PRECISION, MIN_PRECISION};
use crate::error::{GeoTableError, Result};
use crate::types::BoundingBox;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound on enumerated cells when even the coarsest candidate
/// precision exceeds the budget.
pub(crate) const FALLBACK_CELL_CAP: u128 = 4096;

/// One rectangular covering cell, identified by its geohash prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeohashCell(String);

impl GeohashCell {
    pub fn prefix(&self) -> &str {
        &self.0
    }

    pub fn precision(&self) -> usize {
        self.0.len()
    }

    /// Bounding box of the cell. Every geohash sharing this prefix decodes
    /// to a box nested inside it.
    pub fn bbox(&self) -> Result<BoundingBox> {
        codec::decode_bbox(&self.0)
    }
}

/// An immutable covering of one query's bounding box. Computed once on the
/// first page and carried verbatim across pages, so the decomposition never
/// shifts mid-pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    cells: Vec<GeohashCell>,
}

impl QueryPlan {
    pub fn cells(&self) -> &[GeohashCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Precision shared by every cell in the plan.
    pub fn precision(&self) -> usize {
        self.cells.first().map(|c| c.precision()).unwrap_or(0)
    }

    /// Structural validation for plans arriving from outside, e.g. decoded
    /// from a continuation cursor.
    pub(crate) fn check(&self) -> Result<()> {
        let Some(first) = self.cells.first() else {
            return Err(GeoTableError::InvalidCursor("plan has no cells".to_string()));
        };
        let precision = first.precision();
        for cell in &self.cells {
            if cell.precision() != precision {
                return Err(GeoTableError::InvalidCursor(
                    "plan cells have mixed precisions".to_string(),
                ));
            }
            cell.bbox().map_err(|_| {
                GeoTableError::InvalidCursor(format!("plan cell {:?} is not a geohash", cell.0))
            })?;
        }
        Ok(())
    }
}

/// The aligned grid of geohash cells of one precision that intersect a
/// bounding box. Cheap to construct; cell enumeration is deferred so a
/// too-large grid can be rejected by count alone.
pub(crate) struct CellGrid {
    precision: usize,
    cell_width: f64,
    cell_height: f64,
    col_range: (u64, u64),
    row_range: (u64, u64),
}

impl CellGrid {
    pub(crate) fn at(bbox: &BoundingBox, precision: usize) -> Result<Self> {
        // Derive grid geometry from the codec itself: decoding the cells of
        // two opposite corners gives exact cell edges, immune to float
        // boundary drift in the input box.
        let sw = codec::decode_bbox(&codec::encode(bbox.south, bbox.west, precision)?)?;
        let ne = codec::decode_bbox(&codec::encode(bbox.north, bbox.east, precision)?)?;
        let cell_width = sw.east - sw.west;
        let cell_height = sw.north - sw.south;

        let col0 = ((sw.west + 180.0) / cell_width).round() as u64;
        let col1 = ((ne.west + 180.0) / cell_width).round() as u64;
        let row0 = ((sw.south + 90.0) / cell_height).round() as u64;
        let row1 = ((ne.south + 90.0) / cell_height).round() as u64;

        Ok(Self {
            precision,
            cell_width,
            cell_height,
            col_range: (col0, col1),
            row_range: (row0, row1),
        })
    }

    pub(crate) fn precision(&self) -> usize {
        self.precision
    }

    pub(crate) fn cell_count(&self) -> u128 {
        let cols = (self.col_range.1 - self.col_range.0 + 1) as u128;
        let rows = (self.row_range.1 - self.row_range.0 + 1) as u128;
        cols * rows
    }

    /// Enumerate the grid's cells in lexicographic prefix order.
    pub(crate) fn cells(&self) -> Result<Vec<GeohashCell>> {
        let mut prefixes = BTreeSet::new();
        for row in self.row_range.0..=self.row_range.1 {
            let lat = -90.0 + (row as f64 + 0.5) * self.cell_height;
            for col in self.col_range.0..=self.col_range.1 {
                let lon = -180.0 + (col as f64 + 0.5) * self.cell_width;
                prefixes.insert(codec::encode(lat, lon, self.precision)?);
            }
        }
        Ok(prefixes.into_iter().map(GeohashCell).collect())
    }

    fn into_plan(self) -> Result<QueryPlan> {
        Ok(QueryPlan {
            cells: self.cells()?,
        })
    }
}

/// Compute a covering of `bbox` with at most `max_cells` cells, using the
/// finest precision in `[min_precision, max_precision]` that fits the
/// budget.
///
/// The union of the returned cells always contains the (domain-clamped)
/// input box. When even `min_precision` exceeds the budget the coarsest
/// covering is returned anyway, leaving the budget decision to the caller.
pub fn cover(
    bbox: &BoundingBox,
    min_precision: usize,
    max_precision: usize,
    max_cells: usize,
) -> Result<QueryPlan> {
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&min_precision)
        || !(MIN_PRECISION..=MAX_PRECISION).contains(&max_precision)
        || min_precision > max_precision
    {
        return Err(GeoTableError::InvalidInput(format!(
            "invalid covering precision range {min_precision}..={max_precision}"
        )));
    }
    if max_cells == 0 {
        return Err(GeoTableError::InvalidInput(
            "cell budget must be greater than zero".to_string(),
        ));
    }

    let bbox = bbox.clamped();
    if bbox.is_empty() {
        return Err(GeoTableError::InvalidInput(
            "bounding box is empty after clamping to the coordinate domain".to_string(),
        ));
    }

    let mut best: Option<CellGrid> = None;
    for precision in min_precision..=max_precision {
        let grid = CellGrid::at(&bbox, precision)?;
        if grid.cell_count() > max_cells as u128 {
            break;
        }
        best = Some(grid);
    }

    match best {
        Some(grid) => grid.into_plan(),
        None => {
            let grid = CellGrid::at(&bbox, min_precision)?;
            let count = grid.cell_count();
            if count > FALLBACK_CELL_CAP {
                return Err(GeoTableError::InvalidInput(format!(
                    "bounding box covers {count} cells at precision {min_precision}, \
                     more than the supported maximum; use a shorter prefix or a larger budget"
                )));
            }
            warn!(
                "covering exceeds cell budget: {count} cells at minimum precision \
                 {min_precision} (budget {max_cells})"
            );
            grid.into_plan()
        }
    }
}
