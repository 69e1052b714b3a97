//! Isolation forest.
//!
//! Random recursive partitioning isolates anomalous points in fewer splits
//! than normal ones. Scores follow the usual normalisation
//! `s(x) = 2^(-E[h(x)] / c(ψ))`, so values near 1 are anomalous and values
//! around 0.5 or below are normal.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// A single isolation tree.
#[derive(Debug, Clone)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split value; samples below go left
        threshold: f64,
        left: Box<IsolationTree>,
        right: Box<IsolationTree>,
    },
    /// Leaf holding the number of training rows that reached it
    External { size: usize },
}

impl IsolationTree {
    /// Build a tree over `indices` into `data`.
    ///
    /// Splits on a random feature among those that still vary inside the
    /// node, at a uniform random value in `[min, max)`. Stops at `max_depth`,
    /// at a single row, or when every feature is constant.
    pub fn build<R: Rng + ?Sized>(
        data: &[Vec<f64>],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        let n_samples = indices.len();
        if depth >= max_depth || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        let n_features = data[indices[0]].len();
        let ranges: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|f| {
                let (lo, hi) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(data[i][f]), hi.max(data[i][f])),
                );
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();

        if ranges.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
        // Interpolate instead of `gen_range`; `hi - lo` overflows for
        // finite values near f64::MAX.
        let t = rng.gen::<f64>();
        let threshold = (lo * (1.0 - t) + hi * t).clamp(lo, hi);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| data[i][feature] < threshold);

        // Only possible when the draw lands exactly on the minimum.
        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let left = Box::new(Self::build(data, &left_indices, depth + 1, max_depth, rng));
        let right = Box::new(Self::build(data, &right_indices, depth + 1, max_depth, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Depth at which `sample` lands, plus the expected remaining depth of
    /// the rows sharing its leaf.
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = self;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationTree::External { size } => {
                    return depth as f64 + average_path_length(*size);
                }
                IsolationTree::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful binary-search-tree lookup over
/// `n` items: `c(n) = 2 (ln(n - 1) + γ) - 2 (n - 1) / n`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A fitted ensemble of isolation trees.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Rows drawn per tree (ψ).
    sample_size: usize,
}

impl IsolationForest {
    /// Fit `n_trees` trees, each on `min(max_samples, data.len())` rows drawn
    /// without replacement.
    ///
    /// Per-tree seeds are drawn from `rng` up front; trees are then built in
    /// parallel, so the forest depends only on the caller's seed.
    ///
    /// # Panics
    /// Panics if `data` is empty or `n_trees` is 0.
    pub fn fit<R: Rng + ?Sized>(
        data: &[Vec<f64>],
        n_trees: usize,
        max_samples: usize,
        rng: &mut R,
    ) -> Self {
        assert!(!data.is_empty(), "isolation forest: data must not be empty");
        assert!(n_trees >= 1, "isolation forest: need at least one tree");

        let n = data.len();
        let sample_size = max_samples.clamp(1, n);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let seeds: Vec<u64> = (0..n_trees).map(|_| rng.gen()).collect();

        let trees = seeds
            .par_iter()
            .map(|&seed| {
                let mut local = StdRng::seed_from_u64(seed);
                let rows = index::sample(&mut local, n, sample_size).into_vec();
                IsolationTree::build(data, &rows, 0, max_depth, &mut local)
            })
            .collect();

        Self { trees, sample_size }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Mean path length of `sample` across the ensemble.
    pub fn mean_path_length(&self, sample: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.path_length(sample)).sum::<f64>() / self.trees.len() as f64
    }

    /// Anomaly score in (0, 1]; higher is more anomalous.
    ///
    /// With ψ = 1 the normaliser `c(ψ)` is zero and every sample scores 0.5.
    pub fn score(&self, sample: &[f64]) -> f64 {
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-self.mean_path_length(sample) / c)
    }

    /// Score many samples in parallel, preserving order.
    pub fn score_all(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        samples.par_iter().map(|s| self.score(s)).collect()
    }
}
