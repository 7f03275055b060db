//! End-to-end scoring: classify, normalize, aggregate, score.

use serde::Serialize;

use crate::classifier::ActionClassifier;
use crate::error::LendscoreResult;
use crate::features::{build_universe, FeatureAggregator};
use crate::models::{CanonicalTransaction, FeatureVector, RawEvent, ScoreResult};
use crate::normalizer::EventNormalizer;
use crate::registry::{AssetTable, MarketRegistry};
use crate::scoring::{ClusterConfig, RuleScorer, ScoringStrategy, WalletScorer};

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub events: usize,
    pub recognized: usize,
    pub failed: usize,
    pub wallets: usize,
    pub active_wallets: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub transactions: Vec<CanonicalTransaction>,
    pub features: Vec<FeatureVector>,
    pub scores: Vec<ScoreResult>,
    pub stats: PipelineStats,
}

pub struct ScoringPipeline {
    registry: MarketRegistry,
    assets: AssetTable,
    scorer: Box<dyn WalletScorer>,
}

impl ScoringPipeline {
    /// Fails when the cluster settings are unusable for the chosen strategy.
    pub fn new(
        registry: MarketRegistry,
        assets: AssetTable,
        strategy: ScoringStrategy,
        cluster: &ClusterConfig,
    ) -> LendscoreResult<Self> {
        Ok(Self {
            registry,
            assets,
            scorer: strategy.scorer(cluster)?,
        })
    }

    /// Built-in Compound registry with the rule-based scorer.
    pub fn compound_rules() -> Self {
        Self {
            registry: MarketRegistry::compound(),
            assets: AssetTable::default(),
            scorer: Box::new(RuleScorer),
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn WalletScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn registry(&self) -> &MarketRegistry {
        &self.registry
    }

    /// Turn raw events into canonical transactions; unrecognized events are dropped.
    pub fn canonicalize(&self, events: &[RawEvent]) -> Vec<CanonicalTransaction> {
        let classifier = ActionClassifier::new(&self.registry);
        let normalizer = EventNormalizer::new(&self.registry, &self.assets);

        events
            .iter()
            .filter_map(|event| {
                let action = classifier.classify(event)?;
                Some(normalizer.normalize(event, action))
            })
            .collect()
    }

    /// Score every wallet of `universe` as of `as_of` (Unix seconds).
    ///
    /// An empty universe means "every wallet that appears in `events`".
    pub fn run(&self, universe: &[String], events: &[RawEvent], as_of: i64) -> PipelineOutput {
        let universe = if universe.is_empty() {
            build_universe(events.iter().map(|e| e.wallet.as_str()))
        } else {
            build_universe(universe)
        };

        let transactions = self.canonicalize(events);
        let features = FeatureAggregator::new(as_of).aggregate(&universe, &transactions);
        let scores = self.scorer.score(&features);

        let stats = PipelineStats {
            events: events.len(),
            recognized: transactions.len(),
            failed: transactions.iter().filter(|t| !t.success).count(),
            wallets: features.len(),
            active_wallets: features.iter().filter(|f| f.is_active()).count(),
        };

        tracing::info!(
            scorer = self.scorer.name(),
            events = stats.events,
            recognized = stats.recognized,
            failed = stats.failed,
            wallets = stats.wallets,
            active_wallets = stats.active_wallets,
            "Scoring run complete"
        );

        PipelineOutput {
            transactions,
            features,
            scores,
            stats,
        }
    }
}
