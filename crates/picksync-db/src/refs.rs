//! Reference-row maintenance: clients, stores, and the product catalog.
//!
//! These are conditional inserts, never upserts — an existing name or
//! description is owned by whoever curated it and is not overwritten here.

use sqlx::PgConnection;

use crate::DbError;

/// Ensures the client and store parent rows for a pick-order header exist.
///
/// Missing rows are created with a placeholder name equal to the id; rows
/// that already exist are left untouched. Must run before the header upsert
/// so the `pick_orders` foreign key always resolves.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either insert fails.
pub async fn ensure_client_store(
    conn: &mut PgConnection,
    client_id: &str,
    store_id: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO clients (client_id, name) \
         VALUES ($1, $1) \
         ON CONFLICT (client_id) DO NOTHING",
    )
    .bind(client_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO stores (client_id, store_id, name) \
         VALUES ($1, $2, $2) \
         ON CONFLICT (client_id, store_id) DO NOTHING",
    )
    .bind(client_id)
    .bind(store_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts a `products` row for every distinct product id referenced by a
/// line item but absent from the catalog.
///
/// The line item's own description is used as the label, falling back to the
/// product id itself when blank. Only the missing set is written; existing
/// catalog rows are never touched.
///
/// Returns the number of products inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn backfill_missing_products(conn: &mut PgConnection) -> Result<u64, DbError> {
    let rows_affected = sqlx::query(
        "INSERT INTO products (product_id, description) \
         SELECT DISTINCT ON (TRIM(d.product_id)) \
                TRIM(d.product_id), \
                COALESCE(NULLIF(TRIM(d.product_description), ''), TRIM(d.product_id)) \
         FROM pick_order_items d \
         LEFT JOIN products p ON p.product_id = TRIM(d.product_id) \
         WHERE TRIM(d.product_id) <> '' \
           AND p.product_id IS NULL \
         ORDER BY TRIM(d.product_id), d.id \
         ON CONFLICT (product_id) DO NOTHING",
    )
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows_affected)
}
