use anyhow::Result;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use vantage::analytics::Aggregator;
use vantage::auth::{StaticTokenProvider, TokenProvider};
use vantage::config::{Config, DatabaseBackend};
use vantage::report::{HttpReportingClient, PropertyId, ReportingClient};
use vantage::storage::{MemoryStore, PostgresStore, SqliteStore, Store};
use vantage::sync::{SyncJob, SyncStatus, SyncSubject};

#[derive(Parser)]
#[command(name = "vantage-admin")]
#[command(about = "Vantage admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily metrics sync for one or more properties
    Sync {
        /// Property ids (numeric or properties/{id} form)
        #[arg(required = true)]
        properties: Vec<String>,
        /// Target date (YYYY-MM-DD); defaults to yesterday
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List captured daily snapshots for a property
    Snapshots {
        /// Property id (numeric or properties/{id} form)
        property: String,
        /// First day of the window (YYYY-MM-DD); defaults to 30 days ago
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day of the window (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(SqliteStore::new(&config.database.url).await?),
        DatabaseBackend::Postgres => Arc::new(PostgresStore::new(&config.database.url).await?),
        DatabaseBackend::Memory => Arc::new(MemoryStore::new()),
    };

    // Ensure the store is initialized
    store.init().await?;

    match cli.command {
        Commands::Sync { properties, date } => {
            let subjects = properties
                .iter()
                .map(|raw| {
                    let property = PropertyId::new(raw)?;
                    let name = property.numeric().to_string();
                    Ok(SyncSubject { property, name })
                })
                .collect::<Result<Vec<_>>>()?;

            let target = date.unwrap_or_else(|| Utc::now().date_naive() - ChronoDuration::days(1));

            let client: Arc<dyn ReportingClient> = Arc::new(HttpReportingClient::new(
                config.reporting.base_url.clone(),
                config.reporting.timeout(),
            )?);
            let tokens: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::from_env()?);
            let job = SyncJob::new(Aggregator::new(client, tokens), Arc::clone(&store));

            let outcomes = job.run(&subjects, target).await;
            for outcome in &outcomes {
                match outcome.status {
                    SyncStatus::Synced => {
                        println!("✓ Synced {} for {}", outcome.property, target);
                    }
                    SyncStatus::Failed => {
                        println!(
                            "✗ Failed {} for {}: {}",
                            outcome.property,
                            target,
                            outcome.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
            }

            let failed = outcomes
                .iter()
                .filter(|o| o.status == SyncStatus::Failed)
                .count();
            println!("{} synced, {} failed", outcomes.len() - failed, failed);
        }
        Commands::Snapshots {
            property,
            start,
            end,
        } => {
            let property = PropertyId::new(&property)?;
            let end = end.unwrap_or_else(|| Utc::now().date_naive());
            let start = start.unwrap_or_else(|| end - ChronoDuration::days(29));

            let snapshots = store
                .daily_snapshots(property.resource_name(), start, end)
                .await?;
            if snapshots.is_empty() {
                println!("No snapshots found for {property} between {start} and {end}.");
            } else {
                println!(
                    "{:<12} {:>10} {:>10} {:>12} {:>12} {:>10}",
                    "Day", "Sessions", "Users", "Page views", "Bounce", "Avg dur"
                );
                println!("{}", "-".repeat(72));
                for s in snapshots {
                    println!(
                        "{:<12} {:>10} {:>10} {:>12} {:>12.2} {:>9.1}s",
                        s.day.to_string(),
                        s.metrics.sessions,
                        s.metrics.users,
                        s.metrics.page_views,
                        s.metrics.bounce_rate,
                        s.metrics.avg_session_duration,
                    );
                }
            }
        }
    }

    Ok(())
}
