use std::time::Instant;

use lendscore_core::{
    AssetTable, MarketRegistry, PipelineOutput, RawEvent, RiskSummary, ScoringPipeline,
};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::io::{self, WrittenFiles};

/// Registry from the configured JSON file, or the built-in Compound markets.
pub fn build_registry(config: &AppConfig) -> AppResult<(MarketRegistry, AssetTable)> {
    match &config.registry.path {
        Some(path) => {
            println!("[REGISTRY] Loading {}", path);
            let (registry, assets) = io::load_registry(path)?.build()?;
            tracing::info!(path = %path, markets = registry.market_count(), "Registry loaded");
            Ok((registry, assets))
        }
        None => {
            let registry = MarketRegistry::compound();
            println!("[REGISTRY] Built-in Compound V2/V3 ({} markets)", registry.market_count());
            Ok((registry, AssetTable::default()))
        }
    }
}

pub struct RunReport {
    pub output: PipelineOutput,
    pub summary: RiskSummary,
    pub files: WrittenFiles,
}

/// Score `events` for `universe` and write every output file.
pub fn score_and_write(
    config: &AppConfig,
    universe: &[String],
    events: &[RawEvent],
    as_of: i64,
) -> AppResult<RunReport> {
    let start = Instant::now();
    let (registry, assets) = build_registry(config)?;
    let pipeline = ScoringPipeline::new(
        registry,
        assets,
        config.scoring.strategy,
        &config.scoring.cluster,
    )?;

    println!(
        "[SCORING] Strategy: {} | events: {} | as_of: {}",
        pipeline.scorer_name(),
        events.len(),
        as_of
    );

    let output = pipeline.run(universe, events, as_of);
    let files = io::write_outputs(
        &config.output,
        &output.scores,
        &output.features,
        &output.transactions,
    )?;
    let summary = RiskSummary::from_scores(&output.scores);

    tracing::info!(
        wallets = summary.wallets,
        average_score = summary.average_score,
        duration_ms = %start.elapsed().as_millis(),
        "Run finished"
    );

    Ok(RunReport {
        output,
        summary,
        files,
    })
}

pub fn print_report(report: &RunReport) {
    let summary = &report.summary;
    let stats = &report.output.stats;

    println!();
    println!("=== RESULTS ===");
    println!(
        "Processed {} wallets ({} active, {} of {} events recognized)",
        summary.wallets, stats.active_wallets, stats.recognized, stats.events
    );
    println!("Score distribution:");
    println!("  High Risk (0-300): {}", summary.high_risk);
    println!("  Medium Risk (301-600): {}", summary.medium_risk);
    println!("  Low Risk (601-1000): {}", summary.low_risk);
    println!();
    println!("Average score: {:.1}", summary.average_score);
    println!("Results saved to '{}'", report.files.scores.display());
    println!("Features saved to '{}'", report.files.features.display());
    if let Some(path) = &report.files.transactions {
        println!("Transactions saved to '{}'", path.display());
    }
    println!("Chart saved to '{}'", report.files.chart.display());

    println!();
    println!("Sample results:");
    println!("{:<44} {:>5}", "wallet_id", "score");
    for s in report.output.scores.iter().take(10) {
        println!("{:<44} {:>5}", s.wallet, s.score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendscore_core::{Decimal, EventPayload, ScoringStrategy};

    const AS_OF: i64 = 1_700_000_000;
    const ALICE: &str = "0x0039f22efb07a647557c7c5d17854cfd6d489ef3";
    const BOB: &str = "0x06b51c6882b27cb05e712185531c1f74996dd988";

    fn label_event(wallet: &str, action: &str, ts: i64) -> RawEvent {
        RawEvent {
            wallet: wallet.to_string(),
            to: None,
            payload: EventPayload::Label(action.to_string()),
            amount: Some("1000000".to_string()),
            asset_symbol: Some("USDC".to_string()),
            asset_price_usd: Some(Decimal::ONE),
            timestamp: ts,
            gas_used: 0,
            gas_price: 0,
            tx_hash: format!("0x{:x}", ts),
            block_number: 0,
            success: true,
        }
    }

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::load().unwrap();
        config.output.dir = dir.display().to_string();
        config.registry.path = None;
        config
    }

    #[test]
    fn test_score_and_write_log_events() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let events = vec![
            label_event(ALICE, "deposit", AS_OF - 10 * 86_400),
            label_event(ALICE, "borrow", AS_OF - 8 * 86_400),
            label_event(ALICE, "repay", AS_OF - 2 * 86_400),
        ];
        let universe = vec![ALICE.to_string(), BOB.to_string()];

        let report = score_and_write(&config, &universe, &events, AS_OF).unwrap();
        assert_eq!(report.summary.wallets, 2);
        assert_eq!(report.output.stats.recognized, 3);
        assert_eq!(report.output.scores[1].score, 200);
        assert!(report.files.scores.exists());
        assert!(report.files.chart.exists());
        assert!(report.files.transactions.is_some());

        let alice = &report.output.features[0];
        assert_eq!(alice.total_supply_usd, Decimal::ONE);
        assert_eq!(alice.repay_to_borrow_ratio, 1.0);
    }

    #[test]
    fn test_invalid_cluster_config_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.scoring.strategy = ScoringStrategy::Cluster;
        config.scoring.cluster.clusters = 8;

        let universe = vec![ALICE.to_string()];
        let err = score_and_write(&config, &universe, &[], AS_OF)
            .err()
            .unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(!dir.path().join(&config.output.scores_file).exists());
    }

    #[test]
    fn test_registry_file_override() {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("registry.json");
        std::fs::write(
            &registry_path,
            r#"{"deployments": [{
                "version": "custom-v1",
                "markets": [{"name": "mUSDC", "address": "0x1111111111111111111111111111111111111111"}],
                "selectors": {"0xa0712d68": "supply"}
            }]}"#,
        )
        .unwrap();

        let mut config = test_config(dir.path());
        config.registry.path = Some(registry_path.display().to_string());

        let (registry, _) = build_registry(&config).unwrap();
        assert_eq!(registry.market_count(), 1);

        config.registry.path = Some(dir.path().join("missing.json").display().to_string());
        assert!(build_registry(&config).is_err());
    }
}
