use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::pipeline::stats::{column_variances, mean};

/// Result of a full batch K-means run.
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster index of each input point, in input order.
    pub assignments: Vec<usize>,
    /// Final centroid vectors, indexed by cluster id.
    pub centroids: Vec<Vec<f64>>,
    /// Number of clusters.
    pub k: usize,
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
}

impl KmeansResult {
    /// Nearest centroid of an arbitrary point and the Euclidean distance to it.
    pub fn predict(&self, point: &[f64]) -> (usize, f64) {
        let (idx, sq) = nearest_centroid(point, &self.centroids);
        (idx, sq.sqrt())
    }
}

/// Run Lloyd's K-means algorithm.
///
/// Uses K-means++ initialization drawn from `rng`. Iterates until
/// assignments stabilize, the total squared centroid shift drops to
/// `tolerance * mean column variance`, or `max_iterations` is reached.
///
/// # Arguments
/// * `points` — feature vectors, all of the same length
/// * `k` — number of clusters (must be >= 1 and <= points.len())
/// * `max_iterations` — upper bound on Lloyd's iterations
/// * `tolerance` — relative centroid-shift tolerance
///
/// # Panics
/// Panics if `k` is 0, `points` is empty, or `k > points.len()`.
pub fn kmeans<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> KmeansResult {
    assert!(!points.is_empty(), "kmeans: points must not be empty");
    assert!(k >= 1, "kmeans: k must be at least 1");
    assert!(k <= points.len(), "kmeans: k must be <= number of points");

    let dim = points[0].len();
    let n = points.len();
    let shift_tolerance = tolerance * mean(&column_variances(points));

    let mut centroids = kmeanspp_init(points, k, rng);

    let mut assignments = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;

        // Assignment step: assign each point to nearest centroid.
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let (nearest, _) = nearest_centroid(point, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        // If no assignments changed, we've converged.
        if !changed && iterations > 1 {
            break;
        }

        // Update step: recompute centroids as mean of assigned points.
        let mut new_centroids = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];

        for (i, point) in points.iter().enumerate() {
            let cluster = assignments[i];
            counts[cluster] += 1;
            for (j, &val) in point.iter().enumerate() {
                new_centroids[cluster][j] += val;
            }
        }

        for (c, centroid) in new_centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                let count = counts[c] as f64;
                for val in centroid.iter_mut() {
                    *val /= count;
                }
            } else {
                // Empty cluster: keep previous centroid.
                centroid.clone_from(&centroids[c]);
            }
        }

        let shift: f64 = centroids
            .iter()
            .zip(new_centroids.iter())
            .map(|(old, new)| squared_euclidean(old, new))
            .sum();

        centroids = new_centroids;

        if shift <= shift_tolerance {
            break;
        }
    }

    // Final assignment against the final centroids, plus inertia.
    let mut inertia = 0.0;
    for (i, point) in points.iter().enumerate() {
        let (cluster, dist) = nearest_centroid(point, &centroids);
        assignments[i] = cluster;
        inertia += dist;
    }

    KmeansResult {
        assignments,
        centroids,
        k,
        iterations,
        inertia,
    }
}

/// Inertia curve and the fitted model for every candidate k.
#[derive(Debug, Clone)]
pub struct ElbowSweep {
    /// Inertia for k = 1, 2, ..., in order.
    pub inertias: Vec<f64>,
    /// One fitted model per candidate k (index `k - 1`).
    pub models: Vec<KmeansResult>,
    /// The elbow choice.
    pub best_k: usize,
}

impl ElbowSweep {
    /// The model fitted with `best_k` clusters.
    pub fn best(&self) -> &KmeansResult {
        &self.models[self.best_k - 1]
    }

    pub fn into_best(mut self) -> KmeansResult {
        self.models.swap_remove(self.best_k - 1)
    }
}

/// Pick k at the "elbow" of an inertia curve indexed from k = 1.
///
/// Takes the second discrete difference of the curve and returns
/// `argmax + 2`; the first maximum wins on ties. Needs at least three points
/// (returns None otherwise). The result always lies in `[2, len - 1]`.
pub fn elbow_k(inertias: &[f64]) -> Option<usize> {
    if inertias.len() < 3 {
        return None;
    }

    let first: Vec<f64> = inertias.windows(2).map(|w| w[1] - w[0]).collect();
    let second: Vec<f64> = first.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best = 0;
    for (i, &v) in second.iter().enumerate().skip(1) {
        if v > second[best] {
            best = i;
        }
    }
    Some(best + 2)
}

/// Run K-means for k = 1..=min(max_clusters, points.len()) and choose k by
/// the elbow rule.
///
/// Each candidate gets its own seed, drawn from `rng` in k order before the
/// fits run in parallel, so the sweep is reproducible regardless of
/// scheduling. Returns None when fewer than three candidates exist.
pub fn elbow_kmeans<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    max_clusters: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> Option<ElbowSweep> {
    let max_k = max_clusters.min(points.len());
    if max_k < 3 {
        return None;
    }

    let seeds: Vec<u64> = (0..max_k).map(|_| rng.gen()).collect();

    let models: Vec<KmeansResult> = seeds
        .par_iter()
        .enumerate()
        .map(|(i, &seed)| {
            let mut local = StdRng::seed_from_u64(seed);
            kmeans(points, i + 1, max_iterations, tolerance, &mut local)
        })
        .collect();

    let inertias: Vec<f64> = models.iter().map(|m| m.inertia).collect();
    let best_k = elbow_k(&inertias)?;

    Some(ElbowSweep {
        inertias,
        models,
        best_k,
    })
}

// ── Internal helpers ─────────────────────────────────────────

/// K-means++ initialization: pick k centroids with D²-weighted sampling.
fn kmeanspp_init<R: Rng + ?Sized>(points: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);

    centroids.push(points[rng.gen_range(0..n)].clone());

    let mut min_dist: Vec<f64> = points
        .iter()
        .map(|p| squared_euclidean(p, &centroids[0]))
        .collect();

    for _ in 1..k {
        let total: f64 = min_dist.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = None;
            let mut last_positive = 0;
            for (i, &d) in min_dist.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                last_positive = i;
                if target < d {
                    chosen = Some(i);
                    break;
                }
                target -= d;
            }
            // Rounding can leave a sliver of `target`; fall back to the last
            // point that still had weight.
            chosen.unwrap_or(last_positive)
        } else {
            // Every point coincides with a centroid already.
            rng.gen_range(0..n)
        };

        let centroid = points[next].clone();
        for (d, p) in min_dist.iter_mut().zip(points.iter()) {
            *d = d.min(squared_euclidean(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Index of the nearest centroid and the squared distance to it.
pub(crate) fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    (best_idx, best_dist)
}

/// Squared Euclidean distance.
#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
