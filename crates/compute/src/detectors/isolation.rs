//! Isolation-based detection.
//!
//! Robust-scales both partitions with parameters from the fit rows, grows an
//! isolation forest on the scaled fit rows and scores the evaluation rows
//! with `s(x) = 2^(-E[h(x)] / c(ψ))`. Short average paths give scores near
//! 1, so the score is used as-is (larger = more anomalous). The threshold is
//! the `1 - contamination` quantile of the evaluation scores.

use outlier_core::{DetectError, IsolationConfig, NumericMatrix};
use rand::RngCore;
use serde::Serialize;
use tracing::debug;

use super::{partition_scores, Algorithm, Detection, Detector, DetectorDetails};
use crate::algorithms::isolation_forest::IsolationForest;
use crate::pipeline::stats::percentile;
use crate::pipeline::RobustScaler;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsolationDetails {
    pub normal_scores: Vec<f64>,
    pub anomalous_scores: Vec<f64>,
    pub threshold: f64,
    /// Evaluation rows scored.
    pub n_samples: usize,
    pub n_trees: usize,
    /// Rows drawn per tree after capping at the fit size.
    pub max_samples: usize,
    pub contamination: f64,
    /// Fraction of evaluation rows actually flagged.
    pub observed_anomaly_rate: f64,
}

pub struct IsolationDetector {
    config: IsolationConfig,
}

impl IsolationDetector {
    pub fn new(config: IsolationConfig) -> Self {
        Self { config }
    }
}

impl Detector for IsolationDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::IsolationBased
    }

    fn detect(
        &self,
        fit: &NumericMatrix,
        eval: &NumericMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<Detection, DetectError> {
        if fit.is_empty() {
            return Err(DetectError::FitFailure(
                "isolation forest needs at least one fit row".to_string(),
            ));
        }
        if self.config.n_trees == 0 {
            return Err(DetectError::FitFailure(
                "isolation forest needs at least one tree".to_string(),
            ));
        }
        let contamination = self.config.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(DetectError::FitFailure(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }

        let scaler = RobustScaler::fit(fit);
        let fit_scaled = scaler.transform(fit);
        let eval_scaled = scaler.transform(eval);

        let forest = IsolationForest::fit(
            &fit_scaled.values,
            self.config.n_trees,
            self.config.max_samples,
            rng,
        );
        debug!(
            n_trees = forest.n_trees(),
            sample_size = forest.sample_size(),
            "Isolation forest fitted"
        );

        let scores = forest.score_all(&eval_scaled.values);
        let threshold = percentile(&scores, (1.0 - contamination) * 100.0);
        let labels = super::label(&scores, threshold);
        let (normal_scores, anomalous_scores) = partition_scores(&scores, &labels);

        let observed_anomaly_rate = if scores.is_empty() {
            0.0
        } else {
            anomalous_scores.len() as f64 / scores.len() as f64
        };

        let details = IsolationDetails {
            normal_scores,
            anomalous_scores,
            threshold,
            n_samples: eval.n_rows(),
            n_trees: forest.n_trees(),
            max_samples: forest.sample_size(),
            contamination,
            observed_anomaly_rate,
        };

        Ok(Detection {
            scores,
            labels,
            threshold,
            details: DetectorDetails::Isolation(details),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn matrix(values: Vec<Vec<f64>>) -> NumericMatrix {
        let ids = (0..values.len()).map(|i| format!("r{}", i)).collect();
        NumericMatrix::new(vec!["x".into(), "y".into()], ids, values)
    }

    /// Deterministic, roughly uniform cloud on the unit square.
    fn cloud(n: usize, offset: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| {
                let k = (i + offset) as f64;
                vec![(k * 0.618_033_988_7).fract(), (k * 0.414_213_562_3).fract()]
            })
            .collect()
    }

    fn run(config: IsolationConfig, fit: &NumericMatrix, eval: &NumericMatrix) -> Detection {
        IsolationDetector::new(config)
            .detect(fit, eval, &mut StdRng::seed_from_u64(42))
            .unwrap()
    }

    #[test]
    fn injected_outlier_scores_highest() {
        let fit = matrix(cloud(300, 0));
        let mut eval_rows = cloud(99, 1000);
        eval_rows.push(vec![8.0, -7.0]);
        let eval = matrix(eval_rows);

        let det = run(IsolationConfig::default(), &fit, &eval);
        let max_idx = det
            .scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(max_idx, 99);
        assert!(det.labels[99]);
    }

    #[test]
    fn flagged_fraction_tracks_contamination() {
        let fit = matrix(cloud(600, 0));
        let eval = matrix(cloud(1400, 5000));
        let det = run(IsolationConfig::default(), &fit, &eval);

        // Quantile threshold with strict `>` flags at most 1% of 1400 rows.
        assert!(det.num_anomalies() <= 14, "flagged {}", det.num_anomalies());
        assert!(det.num_anomalies() >= 1);

        let DetectorDetails::Isolation(details) = &det.details else {
            panic!("wrong details variant");
        };
        assert_eq!(details.n_samples, 1400);
        assert_eq!(details.max_samples, 256);
        assert_eq!(details.n_trees, 100);
        assert_eq!(
            details.normal_scores.len() + details.anomalous_scores.len(),
            1400
        );
        assert!((details.observed_anomaly_rate - det.num_anomalies() as f64 / 1400.0).abs() < 1e-12);
    }

    #[test]
    fn one_fit_row_scores_half_and_flags_nothing() {
        let fit = matrix(vec![vec![1.0, 1.0]]);
        let eval = matrix(cloud(10, 0));
        let det = run(IsolationConfig::default(), &fit, &eval);
        assert!(det.scores.iter().all(|&s| s == 0.5));
        assert_eq!(det.num_anomalies(), 0);
    }

    #[test]
    fn empty_fit_fails() {
        let fit = matrix(Vec::new());
        let eval = matrix(cloud(3, 0));
        let result = IsolationDetector::new(IsolationConfig::default()).detect(
            &fit,
            &eval,
            &mut StdRng::seed_from_u64(1),
        );
        assert!(matches!(result, Err(DetectError::FitFailure(_))));
    }

    #[test]
    fn invalid_contamination_fails() {
        let config = IsolationConfig {
            contamination: 0.0,
            ..IsolationConfig::default()
        };
        let result = IsolationDetector::new(config).detect(
            &matrix(cloud(20, 0)),
            &matrix(cloud(5, 0)),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(matches!(result, Err(DetectError::FitFailure(_))));
    }
}
