//! Live integration tests for picksync-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/picksync-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use picksync_core::{ExternalRecord, FieldValue, GroupKey, StockSnapshot};
use picksync_db::{
    complete_ingest_run, create_ingest_run, fail_ingest_run, find_pick_order, get_ingest_run,
    ingest_pick_batch, list_line_items, start_ingest_run, sync_location_stock, DbError,
};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn raw_record(
    client: &str,
    depot: &str,
    order: &str,
    display_name: &str,
    store: &str,
    product: &str,
    description: &str,
    requested_qty: f64,
    location: &str,
) -> ExternalRecord {
    let text = |s: &str| Some(FieldValue::Text(s.to_string()));
    ExternalRecord {
        client: text(client),
        depot: text(depot),
        order: text(order),
        display_name: text(display_name),
        store: text(store),
        item: None,
        product: text(product),
        description: text(description),
        requested_qty: Some(FieldValue::Number(requested_qty)),
        location_text: text(location),
    }
}

/// The worked example record from the feed: client C1, order O1, product P1.
fn example_record() -> ExternalRecord {
    raw_record("C1", "D1", "O1", "Acme", "S1", "P1", "Widget", 5.0, "a1")
}

fn example_key() -> GroupKey {
    GroupKey {
        order_ref: "O1".to_string(),
        store: "S1".to_string(),
        client: "C1".to_string(),
        depot: "D1".to_string(),
    }
}

fn snapshot(product: &str, location: &str, stock: i32) -> StockSnapshot {
    StockSnapshot {
        product_id: product.to_string(),
        description: "Widget".to_string(),
        location_id: location.to_string(),
        shelf_id: Some("R2".to_string()),
        stock,
        stock_minimum: 1,
        sync_flag: 0,
        sync_user: Some("api-sync".to_string()),
        swap_tmp: None,
    }
}

async fn count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count of {table} failed: {e}"))
}

// ---------------------------------------------------------------------------
// Section 1: Master/detail ingest
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_creates_header_item_and_reference_rows(pool: sqlx::PgPool) {
    let summary = ingest_pick_batch(&pool, &[example_record()])
        .await
        .expect("ingest failed");

    assert_eq!(summary.groups_processed, 1);
    assert_eq!(summary.orders_created, 1);
    assert_eq!(summary.items_created, 1);
    assert_eq!(summary.records_invalid, 0);
    assert_eq!(summary.products_backfilled, 1);

    assert_eq!(count(&pool, "clients").await, 1);
    assert_eq!(count(&pool, "stores").await, 1);
    assert_eq!(count(&pool, "products").await, 1);

    let order = find_pick_order(&pool, &example_key())
        .await
        .expect("lookup failed")
        .expect("order should exist");
    assert_eq!(order.display_name, "Acme");

    let items = list_line_items(&pool, order.id).await.expect("list failed");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].requested_qty, Some(Decimal::from(5)));
    assert_eq!(items[0].collected_qty, Decimal::ZERO);
    assert_eq!(items[0].picked_qty, Decimal::ZERO);
    // Location text is canonicalized to uppercase at normalization time.
    assert_eq!(items[0].location_text, "A1");
}

#[sqlx::test(migrations = "../../migrations")]
async fn replaying_the_same_batch_creates_no_new_rows(pool: sqlx::PgPool) {
    let batch = vec![
        example_record(),
        raw_record("C1", "D1", "O1", "Acme", "S1", "P2", "Gadget", 2.0, "b2"),
    ];

    let first = ingest_pick_batch(&pool, &batch).await.expect("first run");
    assert_eq!(first.orders_created, 1);
    assert_eq!(first.items_created, 2);

    let second = ingest_pick_batch(&pool, &batch).await.expect("second run");
    assert_eq!(second.orders_created, 0);
    assert_eq!(second.orders_existing, 1);
    assert_eq!(second.items_created, 0);
    assert_eq!(second.items_skipped, 2);

    assert_eq!(count(&pool, "pick_orders").await, 1);
    assert_eq!(count(&pool, "pick_order_items").await, 2);
    assert_eq!(count(&pool, "products").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn verbatim_duplicate_records_produce_one_item(pool: sqlx::PgPool) {
    // The same tuple twice in one batch: 1 header, 1 line item, qty 5.
    let summary = ingest_pick_batch(&pool, &[example_record(), example_record()])
        .await
        .expect("ingest failed");

    assert_eq!(summary.groups_processed, 1);
    assert_eq!(summary.items_created, 1);
    assert_eq!(summary.items_skipped, 1);
    assert_eq!(count(&pool, "pick_orders").await, 1);
    assert_eq!(count(&pool, "pick_order_items").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn two_products_share_one_header(pool: sqlx::PgPool) {
    let summary = ingest_pick_batch(
        &pool,
        &[
            example_record(),
            raw_record("C1", "D1", "O1", "Acme", "S1", "P2", "Gadget", 1.0, "a1"),
        ],
    )
    .await
    .expect("ingest failed");

    assert_eq!(summary.groups_processed, 1);
    assert_eq!(summary.orders_created, 1);
    assert_eq!(summary.items_created, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn header_keeps_first_display_name(pool: sqlx::PgPool) {
    ingest_pick_batch(
        &pool,
        &[
            raw_record("C1", "D1", "O1", "First Name", "S1", "P1", "Widget", 5.0, ""),
            raw_record("C1", "D1", "O1", "Second Name", "S1", "P2", "Gadget", 1.0, ""),
        ],
    )
    .await
    .expect("first batch");

    // A replay with yet another display name must not rewrite the header.
    ingest_pick_batch(
        &pool,
        &[raw_record(
            "C1", "D1", "O1", "Third Name", "S1", "P3", "Sprocket", 2.0, "",
        )],
    )
    .await
    .expect("second batch");

    let order = find_pick_order(&pool, &example_key())
        .await
        .expect("lookup failed")
        .expect("order should exist");
    assert_eq!(order.display_name, "First Name");
}

#[sqlx::test(migrations = "../../migrations")]
async fn collected_quantity_survives_replay(pool: sqlx::PgPool) {
    ingest_pick_batch(&pool, &[example_record()])
        .await
        .expect("first run");

    let order = find_pick_order(&pool, &example_key())
        .await
        .expect("lookup failed")
        .expect("order should exist");
    let items = list_line_items(&pool, order.id).await.expect("list failed");

    // A picker collects 3 units between feed deliveries.
    sqlx::query("UPDATE pick_order_items SET collected_qty = 3, picked_qty = 2 WHERE id = $1")
        .bind(items[0].id)
        .execute(&pool)
        .await
        .expect("progress update failed");

    ingest_pick_batch(&pool, &[example_record()])
        .await
        .expect("replay");

    let items = list_line_items(&pool, order.id).await.expect("list failed");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].collected_qty, Decimal::from(3));
    assert_eq!(items[0].picked_qty, Decimal::from(2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn propagation_mirrors_header_fields_onto_items(pool: sqlx::PgPool) {
    ingest_pick_batch(
        &pool,
        &[
            example_record(),
            raw_record("C1", "D1", "O1", "Acme", "S1", "P2", "Gadget", 1.0, "b2"),
        ],
    )
    .await
    .expect("ingest failed");

    let order = find_pick_order(&pool, &example_key())
        .await
        .expect("lookup failed")
        .expect("order should exist");

    for item in list_line_items(&pool, order.id).await.expect("list failed") {
        assert_eq!(item.order_ref.as_deref(), Some("O1"));
        assert_eq!(item.client_id.as_deref(), Some("C1"));
        assert_eq!(item.store_id.as_deref(), Some("S1"));
        assert_eq!(item.display_key.as_deref(), Some("C1-S1"));
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_record_is_skipped_but_batch_commits(pool: sqlx::PgPool) {
    let mut missing_description = example_record();
    missing_description.description = None;
    missing_description.product = Some(FieldValue::Text("P9".to_string()));

    let summary = ingest_pick_batch(
        &pool,
        &[
            missing_description,
            raw_record("C1", "D1", "O1", "Acme", "S1", "P1", "Widget", 5.0, "a1"),
        ],
    )
    .await
    .expect("ingest failed");

    assert_eq!(summary.records_invalid, 1);
    assert_eq!(summary.items_created, 1);
    assert_eq!(count(&pool, "pick_order_items").await, 1);

    // The invalid record left no trace in any table.
    let orphan: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pick_order_items WHERE product_id = 'P9'",
    )
    .fetch_one(&pool)
    .await
    .expect("query failed");
    assert_eq!(orphan, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn existing_client_name_is_not_overwritten(pool: sqlx::PgPool) {
    sqlx::query("INSERT INTO clients (client_id, name) VALUES ('C1', 'Curated Client Name')")
        .execute(&pool)
        .await
        .expect("seed client failed");

    ingest_pick_batch(&pool, &[example_record()])
        .await
        .expect("ingest failed");

    let name: String = sqlx::query_scalar("SELECT name FROM clients WHERE client_id = 'C1'")
        .fetch_one(&pool)
        .await
        .expect("query failed");
    assert_eq!(name, "Curated Client Name");
}

#[sqlx::test(migrations = "../../migrations")]
async fn backfill_falls_back_to_product_id_for_blank_description(pool: sqlx::PgPool) {
    ingest_pick_batch(
        &pool,
        &[
            raw_record("C1", "D1", "O1", "Acme", "S1", "P1", "   ", 1.0, ""),
            raw_record("C1", "D1", "O1", "Acme", "S1", "P2", "Gadget", 1.0, ""),
        ],
    )
    .await
    .expect("ingest failed");

    let blank_label: String =
        sqlx::query_scalar("SELECT description FROM products WHERE product_id = 'P1'")
            .fetch_one(&pool)
            .await
            .expect("query failed");
    assert_eq!(blank_label, "P1");

    let real_label: String =
        sqlx::query_scalar("SELECT description FROM products WHERE product_id = 'P2'")
            .fetch_one(&pool)
            .await
            .expect("query failed");
    assert_eq!(real_label, "Gadget");
}

#[sqlx::test(migrations = "../../migrations")]
async fn backfill_never_touches_existing_catalog_rows(pool: sqlx::PgPool) {
    sqlx::query("INSERT INTO products (product_id, description) VALUES ('P1', 'Curated Label')")
        .execute(&pool)
        .await
        .expect("seed product failed");

    ingest_pick_batch(&pool, &[example_record()])
        .await
        .expect("ingest failed");

    let label: String =
        sqlx::query_scalar("SELECT description FROM products WHERE product_id = 'P1'")
            .fetch_one(&pool)
            .await
            .expect("query failed");
    assert_eq!(label, "Curated Label");
}

// ---------------------------------------------------------------------------
// Section 2: Stock sync and location resolution
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn stock_sync_is_insert_if_absent(pool: sqlx::PgPool) {
    let first = sync_location_stock(&pool, &[snapshot("P1", "A1", 40)])
        .await
        .expect("first sync");
    assert_eq!(first.stock_created, 1);

    // Re-ingesting the same key with a different figure is a no-op.
    let second = sync_location_stock(&pool, &[snapshot("P1", "A1", 99)])
        .await
        .expect("second sync");
    assert_eq!(second.stock_created, 0);
    assert_eq!(second.stock_skipped, 1);

    let stock: i32 = sqlx::query_scalar(
        "SELECT stock FROM product_location_stock WHERE product_id = 'P1' AND location_id = 'A1'",
    )
    .fetch_one(&pool)
    .await
    .expect("query failed");
    assert_eq!(stock, 40);
}

#[sqlx::test(migrations = "../../migrations")]
async fn location_resolution_is_case_and_whitespace_insensitive(pool: sqlx::PgPool) {
    // Item arrives with free text "a1" (stored uppercased as "A1"); the
    // canonical stock row spells it lowercase.
    ingest_pick_batch(&pool, &[example_record()])
        .await
        .expect("ingest failed");

    let summary = sync_location_stock(&pool, &[snapshot("P1", "a1", 40)])
        .await
        .expect("stock sync failed");
    assert_eq!(summary.items_resolved, 1);

    let order = find_pick_order(&pool, &example_key())
        .await
        .expect("lookup failed")
        .expect("order should exist");
    let items = list_line_items(&pool, order.id).await.expect("list failed");
    assert_eq!(items[0].canonical_location_id.as_deref(), Some("a1"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn location_resolution_only_fills_empty_mappings(pool: sqlx::PgPool) {
    ingest_pick_batch(&pool, &[example_record()])
        .await
        .expect("ingest failed");

    sqlx::query("UPDATE pick_order_items SET canonical_location_id = 'MANUAL'")
        .execute(&pool)
        .await
        .expect("manual mapping failed");

    let summary = sync_location_stock(&pool, &[snapshot("P1", "A1", 40)])
        .await
        .expect("stock sync failed");
    assert_eq!(summary.items_resolved, 0);

    let order = find_pick_order(&pool, &example_key())
        .await
        .expect("lookup failed")
        .expect("order should exist");
    let items = list_line_items(&pool, order.id).await.expect("list failed");
    assert_eq!(items[0].canonical_location_id.as_deref(), Some("MANUAL"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn blank_location_text_is_never_resolved(pool: sqlx::PgPool) {
    ingest_pick_batch(
        &pool,
        &[raw_record("C1", "D1", "O1", "Acme", "S1", "P1", "Widget", 5.0, "")],
    )
    .await
    .expect("ingest failed");

    let summary = sync_location_stock(&pool, &[snapshot("P1", "A1", 40)])
        .await
        .expect("stock sync failed");
    assert_eq!(summary.items_resolved, 0);

    let unresolved: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pick_order_items WHERE canonical_location_id IS NULL",
    )
    .fetch_one(&pool)
    .await
    .expect("query failed");
    assert_eq!(unresolved, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn stock_replay_yields_identical_row_counts(pool: sqlx::PgPool) {
    let batch = vec![snapshot("P1", "A1", 40), snapshot("P1", "B2", 10)];
    sync_location_stock(&pool, &batch).await.expect("first");
    sync_location_stock(&pool, &batch).await.expect("second");
    assert_eq!(count(&pool, "product_location_stock").await, 2);
}

// ---------------------------------------------------------------------------
// Section 3: Ingest run lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "orders", "cli")
        .await
        .expect("create failed");
    assert_eq!(run.status, "queued");
    assert!(run.started_at.is_none());

    start_ingest_run(&pool, run.id).await.expect("start failed");
    complete_ingest_run(&pool, run.id, 12)
        .await
        .expect("complete failed");

    let reloaded = get_ingest_run(&pool, run.id).await.expect("get failed");
    assert_eq!(reloaded.status, "succeeded");
    assert_eq!(reloaded.records_processed, 12);
    assert!(reloaded.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_failure_records_message(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "inventory", "cli")
        .await
        .expect("create failed");
    start_ingest_run(&pool, run.id).await.expect("start failed");
    fail_ingest_run(&pool, run.id, "feed unreachable")
        .await
        .expect("fail failed");

    let reloaded = get_ingest_run(&pool, run.id).await.expect("get failed");
    assert_eq!(reloaded.status, "failed");
    assert_eq!(reloaded.error_message.as_deref(), Some("feed unreachable"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn completing_a_queued_run_is_an_invalid_transition(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "orders", "cli")
        .await
        .expect("create failed");

    let result = complete_ingest_run(&pool, run.id, 0).await;
    assert!(
        matches!(
            result,
            Err(DbError::InvalidIngestRunTransition {
                expected_status: "running",
                ..
            })
        ),
        "expected InvalidIngestRunTransition, got: {result:?}"
    );
}
