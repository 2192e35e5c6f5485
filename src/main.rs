use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clan_sync::api::{BattleFilter, HttpRankingApi};
use clan_sync::config::AppConfig;
use clan_sync::models::{BatchOutcome, SyncOutcome};
use clan_sync::reconcile::Reconciler;
use clan_sync::registry::ClanRegistry;
use clan_sync::storage::JsonlStore;
use clan_sync::sync::{SyncOrchestrator, SyncTarget};

#[derive(Parser)]
#[command(name = "clan-sync")]
#[command(about = "Clan roster and battle ladder synchronization")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize clan data from the ranking service
    Sync {
        /// Sync a single clan by tag (default: the configured default clan)
        #[arg(long)]
        clan: Option<String>,

        /// Sync every configured clan
        #[arg(long)]
        all: bool,

        /// What to synchronize
        #[arg(long, value_enum, default_value = "players")]
        target: Target,

        /// Restrict battle fetches to one team side
        #[arg(long)]
        team_side: Option<u32>,
    },

    /// Rewrite store files, dropping superseded player lines
    Compact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    Players,
    Battles,
}

impl From<Target> for SyncTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Players => SyncTarget::Players,
            Target::Battles => SyncTarget::Battles,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting clan-sync v{}", env!("CARGO_PKG_VERSION"));

    let config_path = PathBuf::from(&cli.config);
    let config = AppConfig::from_file(&config_path)
        .with_context(|| format!("loading configuration from {}", cli.config))?;

    let store = Arc::new(
        JsonlStore::open(&config.storage.data_dir)
            .await
            .context("opening store")?,
    );

    match cli.command {
        Commands::Sync {
            clan,
            all,
            target,
            team_side,
        } => {
            let registry =
                Arc::new(ClanRegistry::from_config(&config).context("building clan registry")?);
            let api = Arc::new(HttpRankingApi::new(&config.api).context("building API client")?);
            let reconciler = Arc::new(Reconciler::new(
                store,
                Duration::from_secs(config.sync.staleness_hours * 3600),
            ));

            let orchestrator = Arc::new(
                SyncOrchestrator::new(registry.clone(), api, reconciler, &config.sync)
                    .with_battle_filter(BattleFilter { team_side }),
            );

            if all {
                let batch = orchestrator.sync_all_clans(target.into()).await;
                print_batch(&batch);
            } else {
                let tag = match clan {
                    Some(tag) => tag,
                    None => registry.default_clan().context("no clan requested")?.tag.clone(),
                };
                let outcome = orchestrator.sync_one_clan(&tag, target.into()).await?;
                print_outcome(&outcome);
            }
        }

        Commands::Compact => {
            store.compact().await.context("compacting store")?;
            println!("Store compacted");
        }
    }

    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    println!(
        "{}: attempted {}, succeeded {}, failed {}, new {}{}",
        outcome.clan_tag,
        outcome.attempted,
        outcome.succeeded,
        outcome.failed,
        outcome.new_records,
        if outcome.cancelled { " (cancelled)" } else { "" }
    );
    for error in &outcome.per_item_errors {
        println!("  failed {}: {:?}", error.item_id, error.kind);
    }
}

fn print_batch(batch: &BatchOutcome) {
    for outcome in &batch.per_clan_outcomes {
        print_outcome(outcome);
    }
    println!(
        "total: succeeded {}, failed {}",
        batch.total_succeeded, batch.total_failed
    );
}
