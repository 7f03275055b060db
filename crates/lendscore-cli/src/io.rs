//! File inputs and outputs of a scoring run

use std::fs;
use std::path::{Path, PathBuf};

use csv::{Reader, Writer};
use serde::Serialize;

use lendscore_core::report::ScoreDistribution;
use lendscore_core::sources::parse_action_log;
use lendscore_core::{
    is_valid_address, normalize_address, CanonicalTransaction, FeatureVector, RawEvent,
    RegistryFile, ScoreResult,
};

use crate::config::OutputConfig;
use crate::error::{AppError, AppResult};

pub const WALLET_COLUMN: &str = "wallet_id";

/// Load the `wallet_id` column of a CSV file. Invalid addresses are skipped.
pub fn load_wallets(path: impl AsRef<Path>) -> AppResult<Vec<String>> {
    let path = path.as_ref();
    let mut reader = Reader::from_path(path)?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == WALLET_COLUMN)
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "{} has no '{}' column",
                path.display(),
                WALLET_COLUMN
            ))
        })?;

    let mut wallets = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let raw = record.get(column).unwrap_or_default();
        if is_valid_address(raw) {
            wallets.push(normalize_address(raw));
        } else {
            skipped += 1;
            tracing::warn!(address = %raw.trim(), "Skipping invalid address");
        }
    }

    tracing::info!(
        path = %path.display(),
        wallets = wallets.len(),
        skipped = skipped,
        "Loaded wallet list"
    );

    Ok(wallets)
}

/// Read a JSON action-log array into raw events.
pub fn load_action_log(path: impl AsRef<Path>) -> AppResult<Vec<RawEvent>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    let records = parse_action_log(&text)?;

    let events: Vec<RawEvent> = records.iter().filter_map(|r| r.to_raw_event()).collect();
    let dropped = records.len() - events.len();
    if dropped > 0 {
        println!("Dropped {} records with invalid timestamps", dropped);
    }

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        dropped = dropped,
        "Loaded action log"
    );

    Ok(events)
}

pub fn load_registry(path: impl AsRef<Path>) -> AppResult<RegistryFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    Ok(RegistryFile::from_json(&text)?)
}

// ============================================================================
// Outputs
// ============================================================================

/// Paths written by [`write_outputs`]
#[derive(Debug, Clone, Default)]
pub struct WrittenFiles {
    pub scores: PathBuf,
    pub features: PathBuf,
    pub transactions: Option<PathBuf>,
    pub chart: PathBuf,
}

pub fn write_outputs(
    output: &OutputConfig,
    scores: &[ScoreResult],
    features: &[FeatureVector],
    transactions: &[CanonicalTransaction],
) -> AppResult<WrittenFiles> {
    let dir = Path::new(&output.dir);
    fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;

    let scores_path = dir.join(&output.scores_file);
    write_csv(&scores_path, scores)?;

    let features_path = dir.join(&output.features_file);
    write_csv(&features_path, features)?;

    // Only written when the run recognized something
    let transactions_path = if transactions.is_empty() {
        None
    } else {
        let path = dir.join(&output.transactions_file);
        write_csv(&path, transactions)?;
        Some(path)
    };

    let chart_path = dir.join(&output.chart_file);
    let chart = ScoreDistribution::from_scores(scores).chart_json();
    let body = serde_json::to_string_pretty(&chart)?;
    fs::write(&chart_path, body).map_err(|e| AppError::io(&chart_path, e))?;

    tracing::debug!(dir = %dir.display(), "Outputs written");

    Ok(WrittenFiles {
        scores: scores_path,
        features: features_path,
        transactions: transactions_path,
        chart: chart_path,
    })
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> AppResult<()> {
    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendscore_core::{ActionKind, Decimal};

    const ALICE: &str = "0x0039f22efb07a647557c7c5d17854cfd6d489ef3";

    fn output_config(dir: &Path) -> OutputConfig {
        OutputConfig {
            dir: dir.display().to_string(),
            scores_file: "wallet_scores.csv".to_string(),
            features_file: "wallet_features.csv".to_string(),
            transactions_file: "raw_transactions.csv".to_string(),
            chart_file: "score_distribution.json".to_string(),
        }
    }

    #[test]
    fn test_load_wallets_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.csv");
        fs::write(
            &path,
            "wallet_id\n0x0039F22EFB07A647557C7C5D17854CFD6D489EF3\nnot-a-wallet\n0x06b51c6882b27cb05e712185531c1f74996dd988\n",
        )
        .unwrap();

        let wallets = load_wallets(&path).unwrap();
        assert_eq!(
            wallets,
            vec![ALICE, "0x06b51c6882b27cb05e712185531c1f74996dd988"]
        );
    }

    #[test]
    fn test_load_wallets_requires_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.csv");
        fs::write(&path, "address\n0x0039f22efb07a647557c7c5d17854cfd6d489ef3\n").unwrap();

        let err = load_wallets(&path).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_load_action_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(
            &path,
            r#"[{"userWallet": "0x0039f22efb07a647557c7c5d17854cfd6d489ef3",
                 "action": "deposit", "timestamp": 1629178166,
                 "actionData": {"amount": "2000000000", "assetSymbol": "USDC", "assetPriceUSD": "1.0"}}]"#,
        )
        .unwrap();

        let events = load_action_log(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 1_629_178_166);

        assert!(load_action_log(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_action_log_drops_bad_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(
            &path,
            r#"[{"userWallet": "0x0039f22efb07a647557c7c5d17854cfd6d489ef3",
                 "action": "deposit", "timestamp": "-9223372036854775808"},
                {"userWallet": "0x0039f22efb07a647557c7c5d17854cfd6d489ef3",
                 "action": "borrow", "timestamp": 1629178166}]"#,
        )
        .unwrap();

        let events = load_action_log(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 1_629_178_166);
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let config = output_config(&out_dir);

        let scores = vec![ScoreResult {
            wallet: ALICE.to_string(),
            score: 795,
        }];
        let features = vec![FeatureVector::inactive(ALICE)];
        let transactions = vec![CanonicalTransaction {
            wallet: ALICE.to_string(),
            timestamp: 1_629_178_166,
            action: ActionKind::Supply,
            contract: Some("cUSDC".to_string()),
            asset: None,
            amount_usd: Decimal::ZERO,
            gas_used: 21_000,
            tx_hash: "0x01".to_string(),
            success: true,
        }];

        let written = write_outputs(&config, &scores, &features, &transactions).unwrap();

        let scores_csv = fs::read_to_string(&written.scores).unwrap();
        assert_eq!(
            scores_csv,
            format!("wallet_id,score\n{},795\n", ALICE)
        );

        let features_csv = fs::read_to_string(&written.features).unwrap();
        assert!(features_csv.starts_with("wallet,total_transactions,"));

        let tx_csv = fs::read_to_string(written.transactions.unwrap()).unwrap();
        assert!(tx_csv.contains(",supply,cUSDC,"));

        let chart: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written.chart).unwrap()).unwrap();
        assert_eq!(chart["data"]["datasets"][0]["data"][7], 1);
    }

    #[test]
    fn test_transactions_file_skipped_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = output_config(dir.path());
        let written = write_outputs(&config, &[], &[], &[]).unwrap();
        assert!(written.transactions.is_none());
        assert!(!dir.path().join("raw_transactions.csv").exists());
    }
}
