//! Wallet scoring strategies
//!
//! Both strategies take the full feature set and return one [`ScoreResult`]
//! per row, in the same order.

pub mod cluster;
pub mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LendscoreResult;
use crate::models::{FeatureVector, ScoreResult};

pub use cluster::{ClusterAssignment, ClusterConfig, ClusterScorer, KMeans, KMeansFit};
pub use rules::RuleScorer;

pub trait WalletScorer {
    fn name(&self) -> &'static str;

    fn score(&self, features: &[FeatureVector]) -> Vec<ScoreResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringStrategy {
    #[default]
    Rules,
    Cluster,
}

impl fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringStrategy::Rules => write!(f, "rules"),
            ScoringStrategy::Cluster => write!(f, "cluster"),
        }
    }
}

impl ScoringStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "rule" | "rule-based" => Some(ScoringStrategy::Rules),
            "cluster" | "clustering" | "kmeans" => Some(ScoringStrategy::Cluster),
            _ => None,
        }
    }

    /// Cluster settings are validated only for [`ScoringStrategy::Cluster`].
    pub fn scorer(self, cluster: &ClusterConfig) -> LendscoreResult<Box<dyn WalletScorer>> {
        let scorer: Box<dyn WalletScorer> = match self {
            ScoringStrategy::Rules => Box::new(RuleScorer),
            ScoringStrategy::Cluster => Box::new(ClusterScorer::new(cluster.clone())?),
        };
        Ok(scorer)
    }
}
