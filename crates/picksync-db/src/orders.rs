//! Database operations for `pick_orders` and `pick_order_items`.

use chrono::{DateTime, Utc};
use picksync_core::{GroupKey, NormalizedRecord};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `pick_orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PickOrderRow {
    pub id: i64,
    pub client_id: String,
    pub depot: String,
    pub order_ref: String,
    pub display_name: String,
    pub store_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `pick_order_items` table.
///
/// The mirror columns (`order_ref`, `client_id`, `store_id`, `display_key`)
/// are `NULL` until the batch propagation step has run for the owning header.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItemRow {
    pub id: i64,
    pub pick_order_id: i64,
    pub product_id: String,
    pub product_description: String,
    pub requested_qty: Option<Decimal>,
    pub location_text: String,
    pub canonical_location_id: Option<String>,
    pub collected_qty: Decimal,
    pub picked_qty: Decimal,
    pub line_no: Option<i64>,
    pub order_ref: Option<String>,
    pub client_id: Option<String>,
    pub store_id: Option<String>,
    pub display_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// pick_orders operations
// ---------------------------------------------------------------------------

/// Inserts the header row for a group, or locates the existing one.
///
/// Single atomic insert-or-locate on the natural key
/// `(client_id, store_id, order_ref, depot)`. Conflict policy is
/// keep-existing: the `DO UPDATE` assigns a column to itself purely so
/// `RETURNING` yields the surviving row's id in the same statement; no
/// incoming value ever overwrites a stored header field, and `display_name`
/// stays whatever the first sighting recorded.
///
/// Returns `(id, is_new)` where `is_new` is `true` when this call created
/// the row (`xmax = 0` on the returned tuple).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_pick_order(
    conn: &mut PgConnection,
    key: &GroupKey,
    display_name: &str,
) -> Result<(i64, bool), DbError> {
    let (id, is_new): (i64, bool) = sqlx::query_as(
        "INSERT INTO pick_orders (client_id, depot, order_ref, display_name, store_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (client_id, store_id, order_ref, depot) DO UPDATE SET \
             order_ref = pick_orders.order_ref \
         RETURNING id, (xmax = 0) AS is_new",
    )
    .bind(&key.client)
    .bind(&key.depot)
    .bind(&key.order_ref)
    .bind(display_name)
    .bind(&key.store)
    .fetch_one(conn)
    .await?;

    Ok((id, is_new))
}

/// Fetches a header row by its natural key, if present.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_pick_order(pool: &PgPool, key: &GroupKey) -> Result<Option<PickOrderRow>, DbError> {
    let row = sqlx::query_as::<_, PickOrderRow>(
        "SELECT id, client_id, depot, order_ref, display_name, store_id, \
                created_at, updated_at \
         FROM pick_orders \
         WHERE client_id = $1 AND store_id = $2 AND order_ref = $3 AND depot = $4",
    )
    .bind(&key.client)
    .bind(&key.store)
    .bind(&key.order_ref)
    .bind(&key.depot)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// pick_order_items operations
// ---------------------------------------------------------------------------

/// Inserts a line item for a header, skipping exact natural-key duplicates.
///
/// The natural key is `(pick_order_id, product_id, location_text)`. On
/// conflict the statement is a strict no-op — in particular
/// `collected_qty`/`picked_qty` of the existing row are never touched, since
/// those are operational state owned by downstream pickers. New rows start
/// with both progress counters at zero via the column defaults.
///
/// `requested_qty` is bound as `f64` and cast to `NUMERIC(12,3)` so the
/// database engine performs the coercion consistently.
///
/// Returns `true` if a new row was created.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_line_item(
    conn: &mut PgConnection,
    pick_order_id: i64,
    record: &NormalizedRecord,
) -> Result<bool, DbError> {
    let rows_affected = sqlx::query(
        "INSERT INTO pick_order_items \
             (pick_order_id, product_id, product_description, requested_qty, \
              location_text, line_no) \
         VALUES ($1, $2, $3, $4::numeric(12,3), $5, $6) \
         ON CONFLICT (pick_order_id, product_id, location_text) DO NOTHING",
    )
    .bind(pick_order_id)
    .bind(&record.product)
    .bind(&record.description)
    .bind(record.requested_qty)
    .bind(&record.location_text)
    .bind(record.line_no())
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows_affected == 1)
}

/// Copies header fields down into every line item of the given headers.
///
/// Mirrors `order_ref`, `client_id`, `store_id`, and the composite
/// `display_key` (`client_id-store_id`) from `pick_orders` into
/// `pick_order_items`. Runs once per batch after all groups are processed so
/// items always reflect the final header state; re-running produces
/// identical results.
///
/// Returns the number of line items updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn propagate_order_fields(
    conn: &mut PgConnection,
    pick_order_ids: &[i64],
) -> Result<u64, DbError> {
    if pick_order_ids.is_empty() {
        return Ok(0);
    }

    let rows_affected = sqlx::query(
        "UPDATE pick_order_items AS d \
         SET order_ref   = p.order_ref, \
             client_id   = p.client_id, \
             store_id    = p.store_id, \
             display_key = p.client_id || '-' || p.store_id \
         FROM pick_orders AS p \
         WHERE d.pick_order_id = p.id \
           AND p.id = ANY($1::bigint[])",
    )
    .bind(pick_order_ids)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

/// Returns all line items of a header, ordered by insertion id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_line_items(pool: &PgPool, pick_order_id: i64) -> Result<Vec<LineItemRow>, DbError> {
    let rows = sqlx::query_as::<_, LineItemRow>(
        "SELECT id, pick_order_id, product_id, product_description, requested_qty, \
                location_text, canonical_location_id, collected_qty, picked_qty, \
                line_no, order_ref, client_id, store_id, display_key, created_at \
         FROM pick_order_items \
         WHERE pick_order_id = $1 \
         ORDER BY id",
    )
    .bind(pick_order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
