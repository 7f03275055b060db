//! Score distribution and risk-band summaries

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::ScoreResult;

pub const BUCKET_COUNT: usize = 10;
pub const BUCKET_WIDTH: u16 = 100;

const BACKGROUND_COLORS: [&str; BUCKET_COUNT] = [
    "#36A2EB", "#FF6384", "#FFCE56", "#4BC0C0", "#9966FF", "#FF9F40", "#66BB6A", "#EF5350",
    "#26A69A", "#AB47BC",
];

const BORDER_COLORS: [&str; BUCKET_COUNT] = [
    "#2E86C1", "#E91E63", "#FFB300", "#26A69A", "#7B1FA2", "#F57C00", "#388E3C", "#C62828",
    "#00897B", "#8E24AA",
];

/// Ten buckets of width 100 over [0, 1000]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDistribution {
    pub counts: [u64; BUCKET_COUNT],
}

impl ScoreDistribution {
    pub fn from_scores(scores: &[ScoreResult]) -> Self {
        let mut counts = [0u64; BUCKET_COUNT];
        for s in scores {
            counts[bucket_of(s.score)] += 1;
        }
        Self { counts }
    }

    pub fn labels() -> Vec<String> {
        (0..BUCKET_COUNT as u16)
            .map(|i| format!("{}-{}", i * BUCKET_WIDTH, (i + 1) * BUCKET_WIDTH))
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Bar-chart description of the histogram
    pub fn chart_json(&self) -> Value {
        json!({
            "type": "bar",
            "data": {
                "labels": Self::labels(),
                "datasets": [{
                    "label": "Wallet Score Distribution",
                    "data": self.counts,
                    "backgroundColor": BACKGROUND_COLORS,
                    "borderColor": BORDER_COLORS,
                    "borderWidth": 1
                }]
            },
            "options": {
                "scales": {
                    "y": {
                        "beginAtZero": true,
                        "title": { "display": true, "text": "Number of Wallets" }
                    },
                    "x": {
                        "title": { "display": true, "text": "Score Range" }
                    }
                },
                "plugins": {
                    "legend": { "display": false },
                    "title": { "display": true, "text": "Wallet Credit Score Distribution" }
                }
            }
        })
    }
}

/// 1000 shares the last bucket with 900..999.
fn bucket_of(score: u16) -> usize {
    ((score / BUCKET_WIDTH) as usize).min(BUCKET_COUNT - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    High,
    Medium,
    Low,
}

impl RiskBand {
    pub fn of(score: u16) -> Self {
        match score {
            0..=300 => RiskBand::High,
            301..=600 => RiskBand::Medium,
            _ => RiskBand::Low,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskSummary {
    pub wallets: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub average_score: f64,
    pub min_score: Option<u16>,
    pub max_score: Option<u16>,
}

impl RiskSummary {
    pub fn from_scores(scores: &[ScoreResult]) -> Self {
        let mut summary = RiskSummary {
            wallets: scores.len(),
            ..Default::default()
        };

        for s in scores {
            match RiskBand::of(s.score) {
                RiskBand::High => summary.high_risk += 1,
                RiskBand::Medium => summary.medium_risk += 1,
                RiskBand::Low => summary.low_risk += 1,
            }
        }

        if !scores.is_empty() {
            let total: u64 = scores.iter().map(|s| s.score as u64).sum();
            summary.average_score = total as f64 / scores.len() as f64;
            summary.min_score = scores.iter().map(|s| s.score).min();
            summary.max_score = scores.iter().map(|s| s.score).max();
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[u16]) -> Vec<ScoreResult> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ScoreResult {
                wallet: format!("0x{:040x}", i),
                score: *v,
            })
            .collect()
    }

    #[test]
    fn test_histogram_buckets() {
        let dist = ScoreDistribution::from_scores(&scores(&[0, 99, 100, 200, 550, 999, 1000]));
        assert_eq!(dist.counts, [2, 1, 1, 0, 0, 1, 0, 0, 0, 2]);
        assert_eq!(dist.total(), 7);
    }

    #[test]
    fn test_chart_json_shape() {
        let chart = ScoreDistribution::from_scores(&scores(&[200, 200, 800])).chart_json();
        assert_eq!(chart["type"], "bar");
        assert_eq!(chart["data"]["labels"][0], "0-100");
        assert_eq!(chart["data"]["labels"][9], "900-1000");

        let dataset = &chart["data"]["datasets"][0];
        assert_eq!(dataset["label"], "Wallet Score Distribution");
        assert_eq!(dataset["data"][2], 2);
        assert_eq!(dataset["data"][8], 1);
        assert_eq!(dataset["backgroundColor"].as_array().map(Vec::len), Some(10));
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(RiskBand::of(0), RiskBand::High);
        assert_eq!(RiskBand::of(300), RiskBand::High);
        assert_eq!(RiskBand::of(301), RiskBand::Medium);
        assert_eq!(RiskBand::of(600), RiskBand::Medium);
        assert_eq!(RiskBand::of(601), RiskBand::Low);
        assert_eq!(RiskBand::of(1000), RiskBand::Low);
    }

    #[test]
    fn test_risk_summary() {
        let summary = RiskSummary::from_scores(&scores(&[200, 300, 450, 700, 850]));
        assert_eq!(summary.wallets, 5);
        assert_eq!(summary.high_risk, 2);
        assert_eq!(summary.medium_risk, 1);
        assert_eq!(summary.low_risk, 2);
        assert_eq!(summary.average_score, 500.0);
        assert_eq!(summary.min_score, Some(200));
        assert_eq!(summary.max_score, Some(850));

        let empty = RiskSummary::from_scores(&[]);
        assert_eq!(empty.wallets, 0);
        assert_eq!(empty.average_score, 0.0);
        assert_eq!(empty.max_score, None);
    }
}
