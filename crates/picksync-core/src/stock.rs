//! Product/location stock snapshots consumed by the inventory upserter.

use serde::{Deserialize, Serialize};

/// One stock figure for a product at a canonical warehouse location, as
/// assembled by the feed layer from the upstream location-stock lookup.
///
/// Keyed by `(product_id, location_id)`; everything else is descriptive
/// payload persisted only on first sighting of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub product_id: String,
    pub description: String,
    /// Canonical location identifier (not free text).
    pub location_id: String,
    pub shelf_id: Option<String>,
    pub stock: i32,
    pub stock_minimum: i32,
    /// Downstream WMS synchronization flag; `0` for freshly ingested rows.
    pub sync_flag: i16,
    pub sync_user: Option<String>,
    pub swap_tmp: Option<String>,
}
