//! Sync command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established. Each non-dry-run sync is recorded as an `ingest_runs` row;
//! failures are marked on the run best-effort before the error propagates
//! to the scheduler that invoked us.

use clap::Subcommand;
use picksync_core::{group_records, AppConfig, NormalizedRecord};
use picksync_db::{BatchSummary, StockSummary};
use picksync_feed::FeedClient;
use sqlx::PgPool;

/// Sub-commands available under `sync`.
#[derive(Debug, Subcommand)]
pub enum SyncCommands {
    /// Ingest pick requests into the order tables
    Orders {
        /// Preview what would be ingested without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Upsert product/location stock and resolve item locations
    Inventory,
    /// Run orders then inventory, each in its own transactional scope
    Full,
}

pub async fn handle(
    command: SyncCommands,
    pool: &PgPool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    match command {
        SyncCommands::Orders { dry_run } => run_sync_orders(pool, config, dry_run).await,
        SyncCommands::Inventory => run_sync_inventory(pool, config).await,
        SyncCommands::Full => run_sync_full(pool, config).await,
    }
}

/// Fetch pick requests and converge them into the order tables.
///
/// When `dry_run` is `true` the function prints what would be ingested and
/// returns without touching the database.
///
/// # Errors
///
/// Returns an error if the feed fetch fails, the ingest run cannot be
/// created, or the batch transaction fails (after marking the run failed).
async fn run_sync_orders(pool: &PgPool, config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let client = FeedClient::new(config)?;
    let records = client.fetch_pick_records().await?;

    if dry_run {
        let (valid, invalid) = normalize_counting(&records);
        let groups = group_records(valid);
        println!(
            "dry-run: {} records ({invalid} invalid) in {} groups; nothing written",
            records.len(),
            groups.len()
        );
        return Ok(());
    }

    let run = picksync_db::create_ingest_run(pool, "orders", "cli").await?;
    picksync_db::start_ingest_run(pool, run.id).await?;

    match picksync_db::ingest_pick_batch(pool, &records).await {
        Ok(summary) => {
            picksync_db::complete_ingest_run(pool, run.id, summary.records_processed()).await?;
            print_batch_summary(&summary);
            Ok(())
        }
        Err(e) => {
            fail_run_best_effort(pool, run.id, "orders", format!("{e:#}")).await;
            Err(e.into())
        }
    }
}

/// Fetch stock candidates for the current pick requests and converge them
/// into `product_location_stock`, then resolve item locations.
async fn run_sync_inventory(pool: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let client = FeedClient::new(config)?;
    let records = client.fetch_pick_records().await?;
    let (valid, invalid) = normalize_counting(&records);
    if invalid > 0 {
        tracing::warn!(invalid, "invalid feed records excluded from stock lookup");
    }

    let snapshots = client.build_stock_batch(&valid).await?;

    let run = picksync_db::create_ingest_run(pool, "inventory", "cli").await?;
    picksync_db::start_ingest_run(pool, run.id).await?;

    match picksync_db::sync_location_stock(pool, &snapshots).await {
        Ok(summary) => {
            let processed = i32::try_from(summary.snapshots_received).unwrap_or(i32::MAX);
            picksync_db::complete_ingest_run(pool, run.id, processed).await?;
            print_stock_summary(&summary);
            Ok(())
        }
        Err(e) => {
            fail_run_best_effort(pool, run.id, "inventory", format!("{e:#}")).await;
            Err(e.into())
        }
    }
}

/// Orders then inventory off a single feed fetch.
///
/// The two phases run in independent transactional scopes: if the stock
/// phase fails, the committed order data stays committed and only the run
/// is marked failed.
async fn run_sync_full(pool: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let client = FeedClient::new(config)?;
    let records = client.fetch_pick_records().await?;

    let run = picksync_db::create_ingest_run(pool, "full", "cli").await?;
    picksync_db::start_ingest_run(pool, run.id).await?;

    let batch = match picksync_db::ingest_pick_batch(pool, &records).await {
        Ok(summary) => summary,
        Err(e) => {
            fail_run_best_effort(pool, run.id, "full", format!("{e:#}")).await;
            return Err(e.into());
        }
    };
    print_batch_summary(&batch);

    let (valid, _) = normalize_counting(&records);
    let snapshots = match client.build_stock_batch(&valid).await {
        Ok(snapshots) => snapshots,
        Err(e) => {
            fail_run_best_effort(pool, run.id, "full", format!("{e:#}")).await;
            return Err(e.into());
        }
    };

    match picksync_db::sync_location_stock(pool, &snapshots).await {
        Ok(summary) => {
            picksync_db::complete_ingest_run(pool, run.id, batch.records_processed()).await?;
            print_stock_summary(&summary);
            Ok(())
        }
        Err(e) => {
            fail_run_best_effort(pool, run.id, "full", format!("{e:#}")).await;
            Err(e.into())
        }
    }
}

/// Normalize raw records, returning the valid set and the invalid count.
fn normalize_counting(
    records: &[picksync_core::ExternalRecord],
) -> (Vec<NormalizedRecord>, usize) {
    let mut valid = Vec::with_capacity(records.len());
    let mut invalid = 0usize;
    for record in records {
        match record.normalize() {
            Ok(normalized) => valid.push(normalized),
            Err(_) => invalid += 1,
        }
    }
    (valid, invalid)
}

fn print_batch_summary(summary: &BatchSummary) {
    println!(
        "orders: {} groups | {} headers created, {} existing | {} items created, {} skipped | {} invalid records | {} products backfilled",
        summary.groups_processed,
        summary.orders_created,
        summary.orders_existing,
        summary.items_created,
        summary.items_skipped,
        summary.records_invalid,
        summary.products_backfilled
    );
}

fn print_stock_summary(summary: &StockSummary) {
    println!(
        "inventory: {} snapshots | {} stock rows created, {} skipped | {} item locations resolved",
        summary.snapshots_received,
        summary.stock_created,
        summary.stock_skipped,
        summary.items_resolved
    );
}

/// Attempt to mark an ingest run as failed, logging any secondary error.
async fn fail_run_best_effort(
    pool: &PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = picksync_db::fail_ingest_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}
