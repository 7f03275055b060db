use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use lendscore_core::{ClusterConfig, ScoringStrategy};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub explorer: ExplorerConfig,
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExplorerConfig {
    pub base_url: String,
    pub api_key: String,
    /// Delay between per-wallet requests
    pub rate_limit_ms: u64,
    pub timeout_seconds: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    pub strategy: ScoringStrategy,
    #[serde(default)]
    pub cluster: ClusterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: String,
    pub scores_file: String,
    pub features_file: String,
    pub transactions_file: String,
    pub chart_file: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegistryConfig {
    /// JSON registry file; the built-in Compound registry is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("explorer.base_url", "https://api.etherscan.io/api")?
            .set_default("explorer.api_key", "")?
            .set_default("explorer.rate_limit_ms", 250)?
            .set_default("explorer.timeout_seconds", 30)?
            .set_default("explorer.start_block", 0)?
            .set_default("explorer.end_block", 99_999_999)?
            .set_default("explorer.page_size", 10_000)?
            .set_default("scoring.strategy", "rules")?
            .set_default("output.dir", ".")?
            .set_default("output.scores_file", "wallet_scores.csv")?
            .set_default("output.features_file", "wallet_features.csv")?
            .set_default("output.transactions_file", "raw_transactions.csv")?
            .set_default("output.chart_file", "score_distribution.json")?
            // Load from config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (LENDSCORE__EXPLORER__API_KEY, etc.)
            .add_source(
                Environment::with_prefix("LENDSCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key_preview(&self) -> String {
        let key = &self.explorer.api_key;
        let length = key.chars().count();
        if key.is_empty() {
            "EMPTY".to_string()
        } else if length > 8 {
            let head: String = key.chars().take(4).collect();
            let mut tail: Vec<char> = key.chars().rev().take(4).collect();
            tail.reverse();
            let tail: String = tail.into_iter().collect();
            format!("{}...{} (length: {})", head, tail, length)
        } else {
            "***".to_string()
        }
    }
}
