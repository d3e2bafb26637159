mod runs;
mod sync;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "picksync")]
#[command(about = "Warehouse pick-request synchronization CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Synchronize data from the ERP feed into the local database
    Sync {
        #[command(subcommand)]
        command: sync::SyncCommands,
    },
    /// Inspect ingest runs
    Runs {
        #[command(subcommand)]
        command: runs::RunsCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending schema migrations
    Migrate,
    /// Verify database connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = picksync_core::load_app_config_from_env()?;
    let pool = picksync_db::connect_pool(
        &config.database_url,
        picksync_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    match cli.command {
        Commands::Sync { command } => sync::handle(command, &pool, &config).await,
        Commands::Runs { command } => runs::handle(command, &pool).await,
        Commands::Db { command } => match command {
            DbCommands::Migrate => {
                let applied = picksync_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
                Ok(())
            }
            DbCommands::Ping => {
                picksync_db::health_check(&pool).await?;
                println!("database is reachable");
                Ok(())
            }
        },
    }
}
