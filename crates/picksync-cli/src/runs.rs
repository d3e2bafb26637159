//! Ingest-run inspection commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use sqlx::PgPool;

/// Sub-commands available under `runs`.
#[derive(Debug, Subcommand)]
pub enum RunsCommands {
    /// List recent ingest runs
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

pub async fn handle(command: RunsCommands, pool: &PgPool) -> anyhow::Result<()> {
    match command {
        RunsCommands::List { limit } => list_runs(pool, limit).await,
    }
}

async fn list_runs(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = picksync_db::list_ingest_runs(pool, limit).await?;

    if runs.is_empty() {
        println!("no ingest runs recorded");
        return Ok(());
    }

    println!("| ID | Type | Trigger | Status | Records | Started | Completed |");
    println!("|----|------|---------|--------|---------|---------|-----------|");
    for run in &runs {
        println!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            run.id,
            run.run_type,
            run.trigger_source,
            run.status,
            run.records_processed,
            fmt_time(run.started_at),
            fmt_time(run.completed_at),
        );
    }

    Ok(())
}

fn fmt_time(t: Option<DateTime<Utc>>) -> String {
    t.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
