//! # Lendscore Core
//!
//! Credit scoring for lending-protocol wallets.
//!
//! Raw on-chain interactions (block-explorer call data or pre-extracted action
//! logs) are classified against a market registry, normalized to USD, reduced
//! to one feature vector per wallet, and scored on a 0 to 1000 scale by either
//! a fixed rule set or seeded clustering.

pub mod classifier;
pub mod error;
pub mod features;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod scoring;
pub mod sources;

pub use error::*;
pub use rust_decimal::Decimal;
pub use models::*;
pub use pipeline::{PipelineOutput, PipelineStats, ScoringPipeline};
pub use registry::{AssetTable, MarketRegistry, RegistryFile};
pub use report::{RiskBand, RiskSummary, ScoreDistribution};
pub use scoring::{ClusterConfig, ScoringStrategy, WalletScorer};
