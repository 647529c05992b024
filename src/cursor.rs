//! Continuation cursors.
//!
//! A polygon query paginates over many independent per-cell range queries.
//! The externally visible cursor therefore carries the whole query plan
//! (so the decomposition stays fixed across pages) plus one pagination
//! state per cell. Cursors are versioned, tagged structures so corruption
//! is caught structurally rather than by a confusing store failure.

use crate::cover::QueryPlan;
use crate::error::{GeoTableError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire version of the encoded cursor.
pub const CURSOR_VERSION: u32 = 1;

/// An opaque pagination token minted by the underlying store. Round-tripped
/// verbatim; no engine component parses or constructs one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pagination state of a single covering cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellCursor {
    /// The cell has not been read yet.
    Pending,
    /// The cell has been partially read; resume after the token.
    InProgress(PageToken),
    /// The cell's range is drained; it is never queried again.
    Exhausted,
}

impl CellCursor {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, CellCursor::Exhausted)
    }

    /// The store token to resume from, if any.
    pub fn token(&self) -> Option<&PageToken> {
        match self {
            CellCursor::InProgress(token) => Some(token),
            _ => None,
        }
    }
}

/// Continuation state of one logical polygon query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoQueryCursor {
    version: u32,
    plan: QueryPlan,
    cells: BTreeMap<String, CellCursor>,
}

impl GeoQueryCursor {
    /// Fresh cursor for the first page: every plan cell pending.
    pub fn new(plan: QueryPlan) -> Self {
        let cells = plan
            .cells()
            .iter()
            .map(|cell| (cell.prefix().to_string(), CellCursor::Pending))
            .collect();
        Self {
            version: CURSOR_VERSION,
            plan,
            cells,
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn cell(&self, prefix: &str) -> &CellCursor {
        static EXHAUSTED: CellCursor = CellCursor::Exhausted;
        self.cells.get(prefix).unwrap_or(&EXHAUSTED)
    }

    pub(crate) fn set_cell(&mut self, prefix: &str, state: CellCursor) {
        self.cells.insert(prefix.to_string(), state);
    }

    /// True while at least one cell is not exhausted, regardless of how
    /// full the last page was.
    pub fn has_more(&self) -> bool {
        self.cells.values().any(|c| !c.is_exhausted())
    }

    /// Serialize into the opaque string handed to callers.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GeoTableError::InvalidCursor(format!("cursor encoding failed: {e}")))
    }

    /// Decode and structurally validate a caller-supplied cursor.
    pub fn decode(encoded: &str) -> Result<Self> {
        let cursor: GeoQueryCursor = serde_json::from_str(encoded)
            .map_err(|e| GeoTableError::InvalidCursor(format!("malformed cursor: {e}")))?;
        if cursor.version != CURSOR_VERSION {
            return Err(GeoTableError::InvalidCursor(format!(
                "unsupported cursor version {}",
                cursor.version
            )));
        }
        cursor.plan.check()?;
        for prefix in cursor.cells.keys() {
            if !cursor.plan.cells().iter().any(|c| c.prefix() == prefix) {
                return Err(GeoTableError::InvalidCursor(format!(
                    "cursor references cell {prefix:?} outside its plan"
                )));
            }
        }
        Ok(cursor)
    }
}
