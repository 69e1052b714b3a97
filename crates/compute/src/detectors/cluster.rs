//! Cluster-based detection.
//!
//! Fits k-means on the unscaled fit rows with k chosen at the elbow of the
//! inertia curve, then scores each evaluation row by its Euclidean distance
//! to the nearest centroid. Distance is already "larger = more anomalous".
//! The threshold is the Tukey fence `Q3 + m·IQR` of the evaluation
//! distances.

use indexmap::IndexMap;
use outlier_core::{ClusterConfig, DetectError, NumericMatrix};
use rand::RngCore;
use serde::Serialize;
use tracing::debug;

use super::{Algorithm, Detection, Detector, DetectorDetails};
use crate::algorithms::kmeans::elbow_kmeans;
use crate::pipeline::stats::{column_variances, upper_fence};

/// Auxiliary output of the cluster-based detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterDetails {
    pub n_clusters: usize,
    /// Inertia for k = 1, 2, ... as swept.
    pub inertias: Vec<f64>,
    /// Nearest cluster per evaluation row.
    pub clusters: Vec<usize>,
    /// Distances of the anomalous rows, in evaluation order.
    pub anomaly_distances: Vec<f64>,
    /// Anomaly count for every cluster id, zero counts included.
    pub anomalies_per_cluster: IndexMap<usize, usize>,
    /// Per numeric column: anomalous rows / evaluation rows.
    pub anomaly_density_per_feature: IndexMap<String, f64>,
    pub x_label: String,
    pub x_values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_values: Option<Vec<f64>>,
}

pub struct ClusterDetector {
    config: ClusterConfig,
}

impl ClusterDetector {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }
}

impl Detector for ClusterDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ClusterBased
    }

    fn detect(
        &self,
        fit: &NumericMatrix,
        eval: &NumericMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<Detection, DetectError> {
        let candidates = self.config.max_clusters.min(fit.n_rows());
        if candidates < 3 {
            return Err(DetectError::FitFailure(format!(
                "elbow selection needs at least 3 candidate cluster counts, have {} \
                 (fit rows: {}, max_clusters: {})",
                candidates,
                fit.n_rows(),
                self.config.max_clusters
            )));
        }
        if column_variances(&fit.values).iter().all(|&v| v == 0.0) {
            return Err(DetectError::FitFailure(
                "all fit rows are identical; cluster distances are undefined".to_string(),
            ));
        }

        let sweep = elbow_kmeans(
            &fit.values,
            self.config.max_clusters,
            self.config.max_iterations,
            self.config.tolerance,
            rng,
        )
        .ok_or_else(|| DetectError::FitFailure("elbow selection failed".to_string()))?;

        debug!(
            best_k = sweep.best_k,
            iterations = sweep.best().iterations,
            "Elbow selected cluster count"
        );

        let inertias = sweep.inertias.clone();
        let model = sweep.into_best();

        let (clusters, distances): (Vec<usize>, Vec<f64>) =
            eval.values.iter().map(|row| model.predict(row)).unzip();

        let threshold = upper_fence(&distances, self.config.iqr_multiplier);
        let labels = super::label(&distances, threshold);

        let mut anomalies_per_cluster: IndexMap<usize, usize> =
            (0..model.k).map(|c| (c, 0)).collect();
        let mut anomaly_distances = Vec::new();
        for ((&cluster, &distance), &anomalous) in
            clusters.iter().zip(distances.iter()).zip(labels.iter())
        {
            if anomalous {
                *anomalies_per_cluster.entry(cluster).or_insert(0) += 1;
                anomaly_distances.push(distance);
            }
        }

        let num_anomalies = anomaly_distances.len();
        let density = if eval.is_empty() {
            0.0
        } else {
            num_anomalies as f64 / eval.n_rows() as f64
        };
        let anomaly_density_per_feature = eval
            .columns
            .iter()
            .map(|c| (c.clone(), density))
            .collect();

        let details = ClusterDetails {
            n_clusters: model.k,
            inertias,
            clusters,
            anomaly_distances,
            anomalies_per_cluster,
            anomaly_density_per_feature,
            x_label: eval.columns.first().cloned().unwrap_or_default(),
            x_values: eval.column(0).unwrap_or_default(),
            y_label: eval.columns.get(1).cloned(),
            y_values: eval.column(1),
        };

        Ok(Detection {
            scores: distances,
            labels,
            threshold,
            details: DetectorDetails::Cluster(details),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn matrix(columns: &[&str], values: Vec<Vec<f64>>) -> NumericMatrix {
        let ids = (0..values.len()).map(|i| format!("r{}", i)).collect();
        NumericMatrix::new(columns.iter().map(|c| c.to_string()).collect(), ids, values)
    }

    fn blobs() -> Vec<Vec<f64>> {
        let centers = [(0.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let mut rows = Vec::new();
        for (cx, cy) in centers {
            for i in 0..10 {
                let dx = (i % 3) as f64 * 0.1;
                let dy = (i / 3) as f64 * 0.1;
                rows.push(vec![cx + dx, cy + dy]);
            }
        }
        rows
    }

    fn run(fit: &NumericMatrix, eval: &NumericMatrix) -> Result<Detection, DetectError> {
        ClusterDetector::new(ClusterConfig::default()).detect(
            fit,
            eval,
            &mut StdRng::seed_from_u64(42),
        )
    }

    #[test]
    fn far_point_is_flagged() {
        let fit = matrix(&["x", "y"], blobs());
        let mut eval_rows = blobs();
        eval_rows.push(vec![50.0, -40.0]);
        let eval = matrix(&["x", "y"], eval_rows);

        let det = run(&fit, &eval).unwrap();
        assert!(det.labels[30], "far row should be anomalous");
        assert!(det.labels[..30].iter().all(|&l| !l));

        let DetectorDetails::Cluster(details) = &det.details else {
            panic!("wrong details variant");
        };
        assert_eq!(details.anomaly_distances.len(), 1);
        assert_eq!(details.anomalies_per_cluster.len(), details.n_clusters);
        assert_eq!(details.anomalies_per_cluster.values().sum::<usize>(), 1);
        assert_eq!(details.inertias.len(), 10);
        assert_eq!(details.anomaly_density_per_feature["x"], 1.0 / 31.0);
        assert_eq!(details.y_label.as_deref(), Some("y"));
    }

    #[test]
    fn uniform_distances_give_no_anomalies() {
        let fit = matrix(&["x", "y"], blobs());
        let eval = matrix(&["x", "y"], blobs());
        let det = run(&fit, &eval).unwrap();
        assert!(det.threshold >= det.scores.iter().cloned().fold(0.0, f64::max) - 1e-9);
        assert_eq!(det.num_anomalies(), 0);
    }

    #[test]
    fn single_column_has_no_y_axis() {
        let values: Vec<Vec<f64>> = (0..20).map(|i| vec![(i % 7) as f64]).collect();
        let fit = matrix(&["amount"], values.clone());
        let eval = matrix(&["amount"], values);
        let det = run(&fit, &eval).unwrap();

        let DetectorDetails::Cluster(details) = &det.details else {
            panic!("wrong details variant");
        };
        assert_eq!(details.x_label, "amount");
        assert!(details.y_label.is_none());
        assert!(details.y_values.is_none());
        let json = serde_json::to_value(&det.details).unwrap();
        assert!(json.get("y_values").is_none());
    }

    #[test]
    fn too_few_fit_rows_fail() {
        let fit = matrix(&["x"], vec![vec![1.0], vec![2.0]]);
        let eval = matrix(&["x"], vec![vec![1.0]]);
        assert!(matches!(run(&fit, &eval), Err(DetectError::FitFailure(_))));
    }

    #[test]
    fn identical_fit_rows_fail() {
        let fit = matrix(&["x", "y"], vec![vec![1.0, 5.0]; 12]);
        let eval = matrix(&["x", "y"], vec![vec![1.0, 5.0]; 4]);
        assert!(matches!(run(&fit, &eval), Err(DetectError::FitFailure(_))));
    }

    #[test]
    fn detection_is_reproducible() {
        let fit = matrix(&["x", "y"], blobs());
        let eval = matrix(&["x", "y"], blobs());
        let a = run(&fit, &eval).unwrap();
        let b = run(&fit, &eval).unwrap();
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.details, b.details);
    }
}
