//! Order statistics and moments shared by the scaler, the k-means tolerance
//! and the detector thresholds.
//!
//! Percentiles use linear interpolation between closest ranks, so
//! `percentile(v, 50.0)` is the usual median and quartiles of small samples
//! fall between observations.

/// Linear-interpolated percentile, `q` in `[0, 100]`.
///
/// Returns 0.0 for an empty slice. NaN inputs are not expected (the
/// preprocessor rejects them) and sort to the end.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

/// Same as [`percentile`] on an already ascending slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// First and third quartiles.
pub fn quartiles(values: &[f64]) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    (percentile_sorted(&sorted, 25.0), percentile_sorted(&sorted, 75.0))
}

/// Tukey fence `Q3 + multiplier * (Q3 - Q1)`.
pub fn upper_fence(values: &[f64], multiplier: f64) -> f64 {
    let (q1, q3) = quartiles(values);
    q3 + multiplier * (q3 - q1)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance of every element of a row-major matrix.
pub fn matrix_variance(rows: &[Vec<f64>]) -> f64 {
    let n: usize = rows.iter().map(Vec::len).sum();
    if n == 0 {
        return 0.0;
    }
    let mean = rows.iter().flatten().sum::<f64>() / n as f64;
    rows.iter()
        .flatten()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64
}

/// Per-column population variances.
pub fn column_variances(rows: &[Vec<f64>]) -> Vec<f64> {
    if rows.is_empty() {
        return Vec::new();
    }

    let dim = rows[0].len();
    let n = rows.len() as f64;

    let mut means = vec![0.0; dim];
    for row in rows {
        for i in 0..dim.min(row.len()) {
            means[i] += row[i];
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut variance = vec![0.0; dim];
    for row in rows {
        for i in 0..dim.min(row.len()) {
            let diff = row[i] - means[i];
            variance[i] += diff * diff;
        }
    }

    variance.iter().map(|v| v / n).collect()
}

/// Summary of the scores that crossed the threshold: (avg, min, max).
///
/// Zero anomalies is a valid outcome, reported as all-zero.
pub fn score_extremes(scores: &[f64]) -> (f64, f64, f64) {
    if scores.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (mean(scores), min, max)
}
