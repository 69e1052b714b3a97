use outlier_core::{NumericMatrix, RowId};
use serde::Serialize;

use crate::detectors::{Algorithm, Detection, DetectorDetails};
use crate::pipeline::stats::score_extremes;

/// Uniform summary of one detection call.
///
/// Score statistics cover the anomalous rows only; when nothing crosses the
/// threshold they are all zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub algorithm: Algorithm,
    /// Row ids of anomalous evaluation rows, in evaluation order.
    pub anomaly_indices: Vec<RowId>,
    pub num_anomalies: usize,
    /// Evaluation rows scored.
    pub n_samples: usize,
    pub anomaly_percentage: f64,
    pub threshold: f64,
    pub avg_anomaly_score: f64,
    pub min_anomaly_score: f64,
    pub max_anomaly_score: f64,
    pub details: DetectorDetails,
}

impl AnomalyReport {
    /// Combine a detection with the evaluation rows it was computed on.
    pub fn from_detection(algorithm: Algorithm, eval: &NumericMatrix, detection: Detection) -> Self {
        let mut anomaly_indices = Vec::new();
        let mut anomalous_scores = Vec::new();
        for ((id, &score), &anomalous) in eval
            .row_ids
            .iter()
            .zip(detection.scores.iter())
            .zip(detection.labels.iter())
        {
            if anomalous {
                anomaly_indices.push(id.clone());
                anomalous_scores.push(score);
            }
        }

        let n_samples = detection.scores.len();
        let num_anomalies = anomaly_indices.len();
        let anomaly_percentage = if n_samples == 0 {
            0.0
        } else {
            num_anomalies as f64 / n_samples as f64 * 100.0
        };
        let (avg, min, max) = score_extremes(&anomalous_scores);

        Self {
            algorithm,
            anomaly_indices,
            num_anomalies,
            n_samples,
            anomaly_percentage,
            threshold: detection.threshold,
            avg_anomaly_score: avg,
            min_anomaly_score: min,
            max_anomaly_score: max,
            details: detection.details,
        }
    }
}
