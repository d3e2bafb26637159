//! Database operations for `product_location_stock` and location resolution.

use picksync_core::StockSnapshot;
use sqlx::PgConnection;

use crate::DbError;

/// Inserts a stock snapshot keyed by `(product_id, location_id)` if absent.
///
/// Policy is insert-ignore: an existing row's stock figures and sync
/// metadata are left untouched on conflict, so re-ingesting the same batch
/// never resets state the downstream WMS has since modified.
///
/// Returns `true` if a new row was created.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_stock_if_absent(
    conn: &mut PgConnection,
    snapshot: &StockSnapshot,
) -> Result<bool, DbError> {
    let rows_affected = sqlx::query(
        "INSERT INTO product_location_stock \
             (product_id, location_id, product_description, shelf_id, \
              stock, stock_minimum, sync_flag, sync_user, swap_tmp) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (product_id, location_id) DO NOTHING",
    )
    .bind(&snapshot.product_id)
    .bind(&snapshot.location_id)
    .bind(&snapshot.description)
    .bind(&snapshot.shelf_id)
    .bind(snapshot.stock)
    .bind(snapshot.stock_minimum)
    .bind(snapshot.sync_flag)
    .bind(&snapshot.sync_user)
    .bind(&snapshot.swap_tmp)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows_affected == 1)
}

/// Resolves free-text locations on line items into canonical location ids.
///
/// For every line item whose `canonical_location_id` is still NULL and whose
/// `location_text` is non-blank, finds a stock row for the same product
/// whose location id matches under case-insensitive, whitespace-trimmed
/// comparison, and fills in that id. Already-resolved items are never
/// overwritten. Must run after the stock upsert so freshly inserted rows
/// are visible.
///
/// Returns the number of line items resolved.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn resolve_item_locations(conn: &mut PgConnection) -> Result<u64, DbError> {
    let rows_affected = sqlx::query(
        "UPDATE pick_order_items AS d \
         SET canonical_location_id = s.location_id \
         FROM product_location_stock AS s \
         WHERE d.canonical_location_id IS NULL \
           AND d.location_text <> '' \
           AND s.product_id = d.product_id \
           AND UPPER(TRIM(s.location_id)) = UPPER(TRIM(d.location_text))",
    )
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows_affected)
}
