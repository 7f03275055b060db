//! Fixed rule set scoring
//!
//! Additive adjustments on a neutral base of 500, clamped to [0, 1000] and
//! rounded once at the end.

use crate::models::{FeatureVector, ScoreResult, MAX_SCORE, MIN_SCORE};
use crate::scoring::WalletScorer;

const BASE_SCORE: f64 = 500.0;

/// Deterministic rule-based scorer.
///
/// Starts from a neutral 500 and sums fixed adjustments for activity,
/// liquidations, repayment, frequency, recency, diversification and gas.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

impl RuleScorer {
    /// Unrounded score, clamped to [0, 1000].
    pub fn raw_score(&self, fv: &FeatureVector) -> f64 {
        let mut score = BASE_SCORE;

        // Activity (up to +200)
        if fv.is_active() {
            let tx_bonus = (fv.total_transactions as f64 * 2.0).min(100.0);
            let age_bonus = (fv.wallet_age_days * 0.5).min(100.0);
            score += tx_bonus + age_bonus;
        } else {
            score -= 300.0;
        }

        // Liquidations
        if fv.has_liquidation {
            score -= 400.0;
        }
        score -= fv.liquidation_ratio * 300.0;

        // Repayment
        if fv.num_borrows > 0 {
            score += match fv.borrow_repay_ratio {
                r if r >= 1.0 => 150.0,
                r if r >= 0.8 => 100.0,
                r if r >= 0.5 => 50.0,
                _ => -100.0,
            };
        }

        // Frequency
        if fv.tx_frequency_per_day > 1.0 {
            score += 50.0;
        } else if fv.tx_frequency_per_day > 0.1 {
            score += 25.0;
        }

        // Recency. A never-active wallet carries the sentinel, not a real gap.
        if fv.is_active() {
            let days = fv.recent_activity_days;
            if days < 30.0 {
                score += 50.0;
            } else if days < 90.0 {
                score += 25.0;
            } else if days > 365.0 {
                score -= 100.0;
            }
        }

        // Diversification
        if fv.unique_contracts > 3 {
            score += 30.0;
        } else if fv.unique_contracts > 1 {
            score += 15.0;
        }

        // Gas efficiency
        if fv.avg_gas_per_tx > 0.0 {
            if fv.avg_gas_per_tx < 100_000.0 {
                score += 25.0;
            } else if fv.avg_gas_per_tx > 500_000.0 {
                score -= 25.0;
            }
        }

        score.clamp(MIN_SCORE, MAX_SCORE)
    }

    pub fn score_wallet(&self, fv: &FeatureVector) -> ScoreResult {
        ScoreResult::from_raw(fv.wallet.clone(), self.raw_score(fv))
    }
}

impl WalletScorer for RuleScorer {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn score(&self, features: &[FeatureVector]) -> Vec<ScoreResult> {
        features.iter().map(|fv| self.score_wallet(fv)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(total: u64) -> FeatureVector {
        let mut fv = FeatureVector::inactive("0x0039f22efb07a647557c7c5d17854cfd6d489ef3");
        fv.total_transactions = total;
        fv.recent_activity_days = 200.0;
        fv
    }

    #[test]
    fn test_zero_activity_scores_200() {
        let fv = FeatureVector::inactive("0x0039f22efb07a647557c7c5d17854cfd6d489ef3");
        assert_eq!(RuleScorer.score_wallet(&fv).score, 200);
    }

    #[test]
    fn test_worked_example_scores_795() {
        let mut fv = active(10);
        fv.num_supplies = 5;
        fv.num_borrows = 3;
        fv.num_repays = 3;
        fv.borrow_repay_ratio = 1.0;
        fv.wallet_age_days = 20.0;
        fv.tx_frequency_per_day = 0.5;
        fv.recent_activity_days = 5.0;
        fv.unique_contracts = 2;
        fv.total_gas_used = 500_000;
        fv.avg_gas_per_tx = 50_000.0;

        // 500 + 30 activity + 150 repay + 25 frequency + 50 recency + 15 diversity + 25 gas
        assert_eq!(RuleScorer.score_wallet(&fv).score, 795);
    }

    #[test]
    fn test_maximal_wallet_clamps_to_1000() {
        let mut fv = active(250);
        fv.num_borrows = 50;
        fv.borrow_repay_ratio = 1.2;
        fv.wallet_age_days = 200.0;
        fv.tx_frequency_per_day = 1.25;
        fv.recent_activity_days = 1.0;
        fv.unique_contracts = 8;
        fv.avg_gas_per_tx = 80_000.0;

        assert_eq!(RuleScorer.raw_score(&fv), 1000.0);
        assert_eq!(RuleScorer.score_wallet(&fv).score, 1000);
    }

    #[test]
    fn test_worst_wallet_clamps_to_0() {
        let mut fv = active(4);
        fv.num_borrows = 2;
        fv.num_liquidations = 2;
        fv.has_liquidation = true;
        fv.liquidation_ratio = 0.5;
        fv.borrow_repay_ratio = 0.0;
        fv.recent_activity_days = 500.0;
        fv.avg_gas_per_tx = 600_000.0;

        // 500 + 8 - 400 - 150 - 100 - 100 - 25 < 0
        assert_eq!(RuleScorer.raw_score(&fv), 0.0);
        assert_eq!(RuleScorer.score_wallet(&fv).score, 0);
    }

    #[test]
    fn test_repayment_buckets_boundaries() {
        let score_with = |ratio: f64| {
            let mut fv = active(1);
            fv.num_borrows = 1;
            fv.borrow_repay_ratio = ratio;
            RuleScorer.raw_score(&fv)
        };
        // active(1): 500 + 2, no recency adjustment at 200 days
        assert_eq!(score_with(1.0), 652.0);
        assert_eq!(score_with(0.8), 602.0);
        assert_eq!(score_with(0.5), 552.0);
        assert_eq!(score_with(0.49), 402.0);
    }

    #[test]
    fn test_repayment_ignored_without_borrows() {
        let mut fv = active(1);
        fv.borrow_repay_ratio = 0.0;
        assert_eq!(RuleScorer.raw_score(&fv), 502.0);
    }

    #[test]
    fn test_frequency_and_recency_thresholds_are_strict() {
        let mut fv = active(1);
        fv.tx_frequency_per_day = 1.0;
        assert_eq!(RuleScorer.raw_score(&fv), 527.0);
        fv.tx_frequency_per_day = 0.1;
        assert_eq!(RuleScorer.raw_score(&fv), 502.0);

        fv.tx_frequency_per_day = 0.0;
        fv.recent_activity_days = 30.0;
        assert_eq!(RuleScorer.raw_score(&fv), 527.0);
        fv.recent_activity_days = 90.0;
        assert_eq!(RuleScorer.raw_score(&fv), 502.0);
        fv.recent_activity_days = 365.0;
        assert_eq!(RuleScorer.raw_score(&fv), 502.0);
        fv.recent_activity_days = 365.5;
        assert_eq!(RuleScorer.raw_score(&fv), 402.0);
    }

    #[test]
    fn test_liquidation_penalty_is_cumulative() {
        let mut fv = active(10);
        fv.wallet_age_days = 0.0;
        fv.has_liquidation = true;
        fv.num_liquidations = 1;
        fv.liquidation_ratio = 0.1;
        // 500 + 20 - 400 - 30
        assert_eq!(RuleScorer.raw_score(&fv), 90.0);
    }

    #[test]
    fn test_gas_bands() {
        let mut fv = active(1);
        fv.avg_gas_per_tx = 100_000.0;
        assert_eq!(RuleScorer.raw_score(&fv), 502.0);
        fv.avg_gas_per_tx = 500_001.0;
        assert_eq!(RuleScorer.raw_score(&fv), 477.0);
    }

    #[test]
    fn test_fractional_scores_round() {
        let mut fv = active(1);
        fv.wallet_age_days = 3.0; // +1.5
        assert_eq!(RuleScorer.raw_score(&fv), 503.5);
        assert_eq!(RuleScorer.score_wallet(&fv).score, 504);
    }
}
