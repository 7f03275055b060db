//! Lendscore - credit scores for lending-protocol wallets
//!
//! Two input modes:
//! - `explorer`: fetch each wallet's transaction list from an Etherscan-compatible API
//! - `log`: read a pre-extracted JSON action log

mod commands;
mod config;
mod error;
mod explorer;
mod io;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lendscore_core::ScoringStrategy;

use crate::config::AppConfig;
use crate::explorer::ExplorerClient;

pub use crate::error::{AppError, AppResult};

/// Lending-protocol wallet credit scoring
#[derive(Parser)]
#[command(name = "lendscore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score wallets from block-explorer transaction history
    Explorer {
        /// CSV file with a `wallet_id` column
        #[arg(short, long)]
        wallets: String,

        /// Explorer API key (overrides LENDSCORE__EXPLORER__API_KEY)
        #[arg(long, env = "ETHERSCAN_API_KEY")]
        api_key: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Score wallets from a JSON action log
    Log {
        /// JSON array of action records
        #[arg(short, long)]
        input: String,

        /// Optional wallet list; defaults to every wallet in the log
        #[arg(short, long)]
        wallets: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Scoring strategy: rules or cluster
    #[arg(long)]
    strategy: Option<String>,

    /// Reference time for recency, Unix seconds (default: now)
    #[arg(long)]
    as_of: Option<i64>,

    /// Output directory
    #[arg(long)]
    out_dir: Option<String>,

    /// JSON market registry (default: built-in Compound V2/V3)
    #[arg(long)]
    registry: Option<String>,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) -> AppResult<()> {
        if let Some(strategy) = &self.strategy {
            config.scoring.strategy = ScoringStrategy::from_str(strategy)
                .ok_or_else(|| AppError::InvalidInput(format!("unknown strategy '{}'", strategy)))?;
        }
        if let Some(dir) = &self.out_dir {
            config.output.dir = dir.clone();
        }
        if let Some(path) = &self.registry {
            config.registry.path = Some(path.clone());
        }
        Ok(())
    }

    fn as_of(&self) -> i64 {
        self.as_of.unwrap_or_else(|| chrono::Utc::now().timestamp())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lendscore=info,lendscore_core=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    let cli = Cli::parse();

    println!("================================================");
    println!("     LENDSCORE - Wallet Credit Scoring          ");
    println!("================================================");

    let mut config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    let report = match cli.command {
        Commands::Explorer {
            wallets,
            api_key,
            run,
        } => {
            run.apply(&mut config)?;
            if let Some(key) = api_key {
                config.explorer.api_key = key;
            }

            println!("[CONFIG] Explorer: {}", config.explorer.base_url);
            println!("[CONFIG] API Key: {}", config.api_key_preview());
            if config.explorer.api_key.is_empty() {
                println!("[CONFIG] *** EMPTY - PLEASE SET LENDSCORE__EXPLORER__API_KEY ***");
            }

            println!("\n1. Loading wallet addresses...");
            let universe = io::load_wallets(&wallets)?;
            println!("Loaded {} valid wallet addresses from {}", universe.len(), wallets);
            if universe.is_empty() {
                anyhow::bail!("No valid wallet addresses in {}", wallets);
            }

            println!("\n2. Fetching transaction history...");
            let client = ExplorerClient::new(&config.explorer)?;
            let events = client.collect_events(&universe).await;

            println!("\n3. Scoring wallets...");
            commands::score_and_write(&config, &universe, &events, run.as_of())?
        }
        Commands::Log {
            input,
            wallets,
            run,
        } => {
            run.apply(&mut config)?;

            println!("\n1. Loading action log...");
            let events = io::load_action_log(&input)?;
            println!("Loaded {} records from {}", events.len(), input);

            let universe = match &wallets {
                Some(path) => io::load_wallets(path)?,
                None => Vec::new(),
            };

            println!("\n2. Scoring wallets...");
            commands::score_and_write(&config, &universe, &events, run.as_of())?
        }
    };

    commands::print_report(&report);
    tracing::info!(wallets = report.summary.wallets, "Lendscore finished");

    Ok(())
}
