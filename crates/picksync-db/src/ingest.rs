//! The batch reconciliation engines.
//!
//! [`ingest_pick_batch`] converges a feed batch into the order master/detail
//! tables inside one transaction; [`sync_location_stock`] converges stock
//! snapshots and resolves free-text locations inside a second, independent
//! transaction so a stock failure never rolls back committed order data.
//!
//! Both engines are replay-safe: every write goes through a natural-key
//! conditional insert, so running the same batch twice yields the same rows
//! as running it once.

use picksync_core::{group_records, ExternalRecord, StockSnapshot};
use sqlx::PgPool;

use crate::{inventory, orders, refs, DbError};

/// Counters from one order-batch ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub records_received: usize,
    pub records_invalid: usize,
    pub groups_processed: usize,
    pub orders_created: u64,
    pub orders_existing: u64,
    pub items_created: u64,
    pub items_skipped: u64,
    pub rows_propagated: u64,
    pub products_backfilled: u64,
}

impl BatchSummary {
    /// Valid records that reached the database, for run bookkeeping.
    #[must_use]
    pub fn records_processed(&self) -> i32 {
        i32::try_from(self.records_received - self.records_invalid).unwrap_or(i32::MAX)
    }
}

/// Counters from one stock sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockSummary {
    pub snapshots_received: usize,
    pub stock_created: u64,
    pub stock_skipped: u64,
    pub items_resolved: u64,
}

/// Ingests a batch of raw feed records into the order tables.
///
/// Pipeline: normalize + validate (invalid records are warned about and
/// counted, never partially inserted) → group by order natural key → for
/// each group, ensure client/store parents, insert-or-locate the header,
/// insert non-duplicate line items → propagate header fields into line
/// items → backfill missing catalog products. Everything after grouping
/// runs in a single transaction; any failure rolls the whole batch back.
///
/// # Errors
///
/// Returns [`DbError`] if any statement or the commit fails; the
/// transaction is rolled back and the store is left exactly as before the
/// call.
pub async fn ingest_pick_batch(
    pool: &PgPool,
    records: &[ExternalRecord],
) -> Result<BatchSummary, DbError> {
    let mut summary = BatchSummary {
        records_received: records.len(),
        ..BatchSummary::default()
    };

    let mut valid = Vec::with_capacity(records.len());
    for (idx, raw) in records.iter().enumerate() {
        match raw.normalize() {
            Ok(record) => valid.push(record),
            Err(e) => {
                summary.records_invalid += 1;
                tracing::warn!(index = idx + 1, error = %e, "skipping invalid feed record");
            }
        }
    }

    let groups = group_records(valid);
    if groups.is_empty() {
        tracing::info!("no valid records to process");
        return Ok(summary);
    }
    summary.groups_processed = groups.len();

    let mut tx = pool.begin().await?;
    let mut affected_ids: Vec<i64> = Vec::with_capacity(groups.len());

    for group in &groups {
        refs::ensure_client_store(&mut tx, &group.key.client, &group.key.store).await?;

        let (order_id, is_new) =
            orders::upsert_pick_order(&mut tx, &group.key, &group.display_name).await?;
        if is_new {
            summary.orders_created += 1;
        } else {
            summary.orders_existing += 1;
            tracing::debug!(order_id, key = %group.key, "pick order already exists");
        }
        if !affected_ids.contains(&order_id) {
            affected_ids.push(order_id);
        }

        for record in &group.records {
            if orders::insert_line_item(&mut tx, order_id, record).await? {
                summary.items_created += 1;
            } else {
                summary.items_skipped += 1;
                tracing::debug!(
                    order_id,
                    product = %record.product,
                    location = %record.location_text,
                    "duplicate line item omitted"
                );
            }
        }
    }

    summary.rows_propagated = orders::propagate_order_fields(&mut tx, &affected_ids).await?;
    summary.products_backfilled = refs::backfill_missing_products(&mut tx).await?;

    tx.commit().await?;

    tracing::info!(
        groups = summary.groups_processed,
        orders_created = summary.orders_created,
        items_created = summary.items_created,
        items_skipped = summary.items_skipped,
        invalid = summary.records_invalid,
        "pick batch committed"
    );

    Ok(summary)
}

/// Upserts stock snapshots and resolves line-item locations.
///
/// Runs in its own transaction, deliberately independent of
/// [`ingest_pick_batch`]: order data committed by a previous phase stays
/// committed even if the stock sync fails. Resolution runs after the
/// snapshot inserts so freshly inserted stock rows are visible to it.
///
/// # Errors
///
/// Returns [`DbError`] if any statement or the commit fails; the stock
/// transaction is rolled back.
pub async fn sync_location_stock(
    pool: &PgPool,
    snapshots: &[StockSnapshot],
) -> Result<StockSummary, DbError> {
    let mut summary = StockSummary {
        snapshots_received: snapshots.len(),
        ..StockSummary::default()
    };

    let mut tx = pool.begin().await?;

    for snapshot in snapshots {
        if inventory::insert_stock_if_absent(&mut tx, snapshot).await? {
            summary.stock_created += 1;
        } else {
            summary.stock_skipped += 1;
            tracing::debug!(
                product = %snapshot.product_id,
                location = %snapshot.location_id,
                "stock row already exists, left untouched"
            );
        }
    }

    summary.items_resolved = inventory::resolve_item_locations(&mut tx).await?;

    tx.commit().await?;

    tracing::info!(
        stock_created = summary.stock_created,
        stock_skipped = summary.stock_skipped,
        items_resolved = summary.items_resolved,
        "stock sync committed"
    );

    Ok(summary)
}
