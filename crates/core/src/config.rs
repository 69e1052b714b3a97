use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

/// Tunables for a detection call. Defaults: seed 42, 70% evaluation split,
/// k ≤ 10, 100 trees at 1% contamination, nu capped at 0.1 and a
/// 99th-percentile boundary threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seed for every randomized step (split, k-means++, trees).
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub isolation: IsolationConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
}

fn default_seed() -> u64 {
    42
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            split: SplitConfig::default(),
            cluster: ClusterConfig::default(),
            isolation: IsolationConfig::default(),
            boundary: BoundaryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `OUTLIER_*` environment variables
    /// (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `OUTLIER_*` environment variables. Unparseable
    /// values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(seed) = env_parse("OUTLIER_SEED") {
            self.seed = seed;
        }
        if let Some(max_clusters) = env_parse("OUTLIER_MAX_CLUSTERS") {
            self.cluster.max_clusters = max_clusters;
        }
        if let Some(n_trees) = env_parse("OUTLIER_N_TREES") {
            self.isolation.n_trees = n_trees;
        }
        if let Some(contamination) = env_parse("OUTLIER_CONTAMINATION") {
            self.isolation.contamination = contamination;
        }
        if let Some(nu_cap) = env_parse("OUTLIER_NU_CAP") {
            self.boundary.nu_cap = nu_cap;
        }
    }

    /// Print the effective configuration for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Engine config loaded:");
        tracing::info!("  seed:       {}", self.seed);
        tracing::info!("  split:      eval_fraction={}", self.split.eval_fraction);
        tracing::info!(
            "  cluster:    max_clusters={}, max_iterations={}, tolerance={}, iqr_multiplier={}",
            self.cluster.max_clusters,
            self.cluster.max_iterations,
            self.cluster.tolerance,
            self.cluster.iqr_multiplier
        );
        tracing::info!(
            "  isolation:  n_trees={}, max_samples={}, contamination={}",
            self.isolation.n_trees,
            self.isolation.max_samples,
            self.isolation.contamination
        );
        tracing::info!(
            "  boundary:   nu_cap={}, threshold_percentile={}, max_fit_rows={}",
            self.boundary.nu_cap,
            self.boundary.threshold_percentile,
            self.boundary.max_fit_rows
        );
    }
}

// ── Split ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows assigned to the evaluation partition (rounded up).
    #[serde(default = "default_eval_fraction")]
    pub eval_fraction: f64,
}

fn default_eval_fraction() -> f64 {
    0.7
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            eval_fraction: default_eval_fraction(),
        }
    }
}

// ── Cluster-based ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Largest k tried by the elbow sweep.
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,
    /// Lloyd iteration cap per k-means fit.
    #[serde(default = "default_kmeans_iterations")]
    pub max_iterations: usize,
    /// Centroid-shift tolerance, relative to mean per-column variance.
    #[serde(default = "default_kmeans_tolerance")]
    pub tolerance: f64,
    /// Fence multiplier in `Q3 + m * IQR`.
    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,
}

fn default_max_clusters() -> usize {
    10
}
fn default_kmeans_iterations() -> usize {
    300
}
fn default_kmeans_tolerance() -> f64 {
    1e-4
}
fn default_iqr_multiplier() -> f64 {
    1.5
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_clusters: default_max_clusters(),
            max_iterations: default_kmeans_iterations(),
            tolerance: default_kmeans_tolerance(),
            iqr_multiplier: default_iqr_multiplier(),
        }
    }
}

// ── Isolation-based ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Ensemble size.
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// Sub-sample size per tree (capped at the fit partition size).
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Expected anomaly fraction; threshold is the `1 - contamination` quantile.
    #[serde(default = "default_contamination")]
    pub contamination: f64,
}

fn default_n_trees() -> usize {
    100
}
fn default_max_samples() -> usize {
    256
}
fn default_contamination() -> f64 {
    0.01
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            max_samples: default_max_samples(),
            contamination: default_contamination(),
        }
    }
}

// ── Boundary-based ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Upper bound for nu; the effective value is `min(nu_cap, 0.1, 1/sqrt(n_fit))`.
    #[serde(default = "default_nu_cap")]
    pub nu_cap: f64,
    /// Percentile of evaluation scores used as the anomaly threshold.
    #[serde(default = "default_threshold_percentile")]
    pub threshold_percentile: f64,
    /// SMO stopping tolerance on the maximal KKT violation.
    #[serde(default = "default_svm_tolerance")]
    pub tolerance: f64,
    /// SMO iteration cap.
    #[serde(default = "default_svm_iterations")]
    pub max_iterations: usize,
    /// Largest fit partition accepted; SMO work grows with n².
    #[serde(default = "default_max_fit_rows")]
    pub max_fit_rows: usize,
    /// Kernel row cache budget in megabytes.
    #[serde(default = "default_cache_mb")]
    pub cache_mb: usize,
}

fn default_nu_cap() -> f64 {
    0.1
}
fn default_threshold_percentile() -> f64 {
    99.0
}
fn default_svm_tolerance() -> f64 {
    1e-3
}
fn default_svm_iterations() -> usize {
    100_000
}
fn default_max_fit_rows() -> usize {
    10_000
}
fn default_cache_mb() -> usize {
    200
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            nu_cap: default_nu_cap(),
            threshold_percentile: default_threshold_percentile(),
            tolerance: default_svm_tolerance(),
            max_iterations: default_svm_iterations(),
            max_fit_rows: default_max_fit_rows(),
            cache_mb: default_cache_mb(),
        }
    }
}
