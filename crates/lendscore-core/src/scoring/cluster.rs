//! Cluster-based scoring
//!
//! Features are standardized per column, wallets are partitioned with seeded
//! k-means, and each cluster index maps to a base score from a fixed table.
//! A linear adjustment on repayment, liquidation, leverage and age is added.
//!
//! The cluster-to-score mapping is positional: cluster 0 is not guaranteed to
//! be the least risky group. Results are reproducible for a given seed and
//! wallet population only. Rows are sorted by wallet before clustering so the
//! caller's ordering does not change the outcome.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{LendscoreError, LendscoreResult};
use crate::models::{FeatureVector, ScoreResult, MAX_SCORE, MIN_SCORE};
use crate::scoring::WalletScorer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_clusters")]
    pub clusters: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold, relative to the mean column variance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Independent k-means++ restarts; the lowest-inertia run wins
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    /// Base score by cluster index
    #[serde(default = "default_base_scores")]
    pub base_scores: Vec<f64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
            seed: default_seed(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            n_init: default_n_init(),
            base_scores: default_base_scores(),
        }
    }
}

fn default_clusters() -> usize {
    5
}

fn default_seed() -> u64 {
    42
}

fn default_max_iterations() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_n_init() -> usize {
    10
}

fn default_base_scores() -> Vec<f64> {
    vec![800.0, 600.0, 400.0, 200.0, 0.0]
}

impl ClusterConfig {
    /// Every cluster index needs a base score.
    pub fn validate(&self) -> LendscoreResult<()> {
        if self.clusters == 0 {
            return Err(LendscoreError::InvalidConfig(
                "cluster count must be at least 1".to_string(),
            ));
        }
        if self.base_scores.len() < self.clusters {
            return Err(LendscoreError::InvalidConfig(format!(
                "{} clusters but only {} base scores",
                self.clusters,
                self.base_scores.len()
            )));
        }
        if self.base_scores.iter().any(|s| !s.is_finite()) {
            return Err(LendscoreError::InvalidConfig(
                "base scores must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-wallet detail of a cluster scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub wallet: String,
    pub cluster: usize,
    pub base_score: f64,
    pub adjustment: f64,
    /// base + adjustment, clamped to [0, 1000], not rounded
    pub raw_score: f64,
}

#[derive(Debug)]
pub struct ClusterScorer {
    config: ClusterConfig,
}

impl ClusterScorer {
    pub fn new(config: ClusterConfig) -> LendscoreResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster the population and score each wallet. Output follows input order.
    pub fn assign(&self, features: &[FeatureVector]) -> Vec<ClusterAssignment> {
        if features.is_empty() {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| features[a].wallet.cmp(&features[b].wallet));

        let sorted: Vec<&FeatureVector> = order.iter().map(|&i| &features[i]).collect();
        let scaled = standardize(&feature_matrix(&sorted));

        let fit = KMeans::from_config(&self.config).fit(&scaled);

        let mut labels = vec![0usize; features.len()];
        for (row, &original) in order.iter().enumerate() {
            labels[original] = fit.labels[row];
        }

        tracing::debug!(
            wallets = features.len(),
            clusters = fit.centroids.nrows(),
            inertia = fit.inertia,
            iterations = fit.iterations,
            "Cluster scoring fitted"
        );

        features
            .iter()
            .zip(labels)
            .map(|(fv, cluster)| {
                // validate() guarantees a base score for every label
                let base_score = self.config.base_scores[cluster];
                let adjustment = adjustment(fv);
                ClusterAssignment {
                    wallet: fv.wallet.clone(),
                    cluster,
                    base_score,
                    adjustment,
                    raw_score: (base_score + adjustment).clamp(MIN_SCORE, MAX_SCORE),
                }
            })
            .collect()
    }
}

impl WalletScorer for ClusterScorer {
    fn name(&self) -> &'static str {
        "cluster"
    }

    fn score(&self, features: &[FeatureVector]) -> Vec<ScoreResult> {
        self.assign(features)
            .into_iter()
            .map(|a| ScoreResult::from_raw(a.wallet, a.raw_score))
            .collect()
    }
}

/// `repay/borrow × 100 − liquidations/total × 200 − borrow/deposit × 50 + age × 0.1`
pub fn adjustment(fv: &FeatureVector) -> f64 {
    fv.repay_to_borrow_ratio * 100.0 - fv.liquidation_to_total_ratio * 200.0
        - fv.borrow_to_deposit_ratio * 50.0
        + fv.wallet_age_days * 0.1
}

/// One row per wallet, one column per [`FeatureVector::NUMERIC_COLUMNS`] entry.
pub fn feature_matrix(features: &[&FeatureVector]) -> Array2<f64> {
    let rows: Vec<_> = features.iter().map(|fv| fv.numeric_columns()).collect();
    Array2::from_shape_fn(
        (rows.len(), FeatureVector::NUMERIC_COLUMNS.len()),
        |(i, j)| rows[i][j],
    )
}

/// Zero mean, unit (population) variance per column. Constant columns become 0.
pub fn standardize(data: &Array2<f64>) -> Array2<f64> {
    let Some(mean) = data.mean_axis(Axis(0)) else {
        return data.clone();
    };
    let std = data.std_axis(Axis(0), 0.0);

    let mut scaled = data - &mean;
    for (mut column, s) in scaled.axis_iter_mut(Axis(1)).zip(std.iter()) {
        if *s > f64::EPSILON && s.is_finite() {
            column.mapv_inplace(|v| v / s);
        } else {
            column.fill(0.0);
        }
    }
    scaled
}

// ============================================================================
// K-means
// ============================================================================

#[derive(Debug, Clone)]
pub struct KMeans {
    pub clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub n_init: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    /// One row per cluster
    pub centroids: Array2<f64>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeans {
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            clusters: config.clusters,
            seed: config.seed,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            n_init: config.n_init,
        }
    }

    /// Fit on the rows of `data`. With fewer rows than clusters, k drops to the row count.
    pub fn fit(&self, data: &Array2<f64>) -> KMeansFit {
        let n = data.nrows();
        if n == 0 {
            return KMeansFit {
                labels: Vec::new(),
                centroids: Array2::zeros((0, data.ncols())),
                inertia: 0.0,
                iterations: 0,
            };
        }

        let k = self.clusters.clamp(1, n);
        let threshold = self.tolerance * mean_variance(data);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut best = lloyd(
            data,
            kmeans_plus_plus(data, k, &mut rng),
            self.max_iterations,
            threshold,
        );
        for _ in 1..self.n_init.max(1) {
            let fit = lloyd(
                data,
                kmeans_plus_plus(data, k, &mut rng),
                self.max_iterations,
                threshold,
            );
            if fit.inertia < best.inertia {
                best = fit;
            }
        }
        best
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    (&a - &b).mapv(|d| d * d).sum()
}

fn mean_variance(data: &Array2<f64>) -> f64 {
    data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

/// Nearest centroid; ties go to the lowest index.
fn nearest(point: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, c) in centroids.outer_iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

/// k-means++ seeding: first centre uniform, the rest sampled proportional to D².
fn kmeans_plus_plus(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    centroids.row_mut(0).assign(&data.row(rng.gen_range(0..n)));

    let mut dist: Array1<f64> = data
        .outer_iter()
        .map(|p| squared_distance(p, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total = dist.sum();
        let pick = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = n - 1;
            for (idx, d) in dist.iter().enumerate() {
                acc += d;
                if acc > target {
                    chosen = idx;
                    break;
                }
            }
            chosen
        } else {
            // All remaining points coincide with a centre
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&data.row(pick));
        for (d, p) in dist.iter_mut().zip(data.outer_iter()) {
            *d = d.min(squared_distance(p, centroids.row(c)));
        }
    }

    centroids
}

fn lloyd(
    data: &Array2<f64>,
    mut centroids: Array2<f64>,
    max_iterations: usize,
    threshold: f64,
) -> KMeansFit {
    let k = centroids.nrows();
    let mut labels = vec![0usize; data.nrows()];
    let mut iterations = 0;

    for _ in 0..max_iterations.max(1) {
        iterations += 1;
        for (label, point) in labels.iter_mut().zip(data.outer_iter()) {
            *label = nearest(point, &centroids).0;
        }

        let mut sums = Array2::<f64>::zeros((k, data.ncols()));
        let mut counts = vec![0usize; k];
        for (label, point) in labels.iter().zip(data.outer_iter()) {
            counts[*label] += 1;
            let mut row = sums.row_mut(*label);
            row += &point;
        }

        let mut shift = 0.0;
        for (idx, count) in counts.iter().enumerate() {
            // An empty cluster keeps its previous centre
            if *count == 0 {
                continue;
            }
            let updated = sums.row(idx).mapv(|s| s / *count as f64);
            shift += squared_distance(updated.view(), centroids.row(idx));
            centroids.row_mut(idx).assign(&updated);
        }

        if shift <= threshold {
            break;
        }
    }

    let mut inertia = 0.0;
    for (label, point) in labels.iter_mut().zip(data.outer_iter()) {
        let (idx, d) = nearest(point, &centroids);
        *label = idx;
        inertia += d;
    }

    KMeansFit {
        labels,
        centroids,
        inertia,
        iterations,
    }
}
