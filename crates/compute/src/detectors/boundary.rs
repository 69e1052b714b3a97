//! Boundary-based detection.
//!
//! Robust-scales both partitions, fits a one-class RBF SVM on the scaled fit
//! rows with `nu = min(nu_cap, 0.1, 1/sqrt(n_fit))` and the "scale" bandwidth,
//! and scores evaluation rows by the **negated** decision value, so rows far
//! outside the learned boundary get the largest scores. The threshold is a
//! high percentile (99th by default) of the evaluation scores.

use outlier_core::{BoundaryConfig, DetectError, NumericMatrix};
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, warn};

use super::{partition_scores, Algorithm, Detection, Detector, DetectorDetails};
use crate::algorithms::one_class_svm::{scale_gamma, OneClassSvm, SvmParams};
use crate::pipeline::stats::percentile;
use crate::pipeline::RobustScaler;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryDetails {
    pub normal_scores: Vec<f64>,
    pub anomalous_scores: Vec<f64>,
    pub threshold: f64,
    pub n_samples: usize,
    pub nu: f64,
    pub gamma: f64,
    pub n_support_vectors: usize,
    /// First raw feature of each evaluation row.
    pub actual: Vec<f64>,
    /// Score of each evaluation row.
    pub predicted: Vec<f64>,
    /// `-1` anomalous, `1` normal.
    pub predictions: Vec<i8>,
}

/// Hard ceiling on nu; a larger configured cap is ignored.
pub const MAX_NU: f64 = 0.1;

pub struct BoundaryDetector {
    config: BoundaryConfig,
}

impl BoundaryDetector {
    pub fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    /// Effective nu for a fit partition of `n_fit` rows.
    pub fn nu_for(&self, n_fit: usize) -> f64 {
        self.config
            .nu_cap
            .min(MAX_NU)
            .min(1.0 / (n_fit as f64).sqrt())
    }
}

impl Detector for BoundaryDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::BoundaryBased
    }

    /// Deterministic; `_rng` is unused.
    fn detect(
        &self,
        fit: &NumericMatrix,
        eval: &NumericMatrix,
        _rng: &mut dyn RngCore,
    ) -> Result<Detection, DetectError> {
        let n_fit = fit.n_rows();
        if n_fit < 2 {
            return Err(DetectError::FitFailure(format!(
                "one-class svm needs at least 2 fit rows, got {}",
                n_fit
            )));
        }
        if n_fit > self.config.max_fit_rows {
            return Err(DetectError::FitFailure(format!(
                "fit partition has {} rows, limit is {}",
                n_fit, self.config.max_fit_rows
            )));
        }

        let nu = self.nu_for(n_fit);
        if !(nu > 0.0 && nu <= 1.0) {
            return Err(DetectError::FitFailure(format!(
                "nu must be in (0, 1], got {}",
                nu
            )));
        }

        let scaler = RobustScaler::fit(fit);
        let fit_scaled = scaler.transform(fit);
        let eval_scaled = scaler.transform(eval);

        let gamma = scale_gamma(&fit_scaled.values);
        let params = SvmParams {
            nu,
            gamma,
            tolerance: self.config.tolerance,
            max_iterations: self.config.max_iterations,
            cache_mb: self.config.cache_mb,
        };
        let model = OneClassSvm::fit(&fit_scaled.values, &params);

        if model.iterations() >= self.config.max_iterations {
            warn!(
                iterations = model.iterations(),
                "SMO stopped at the iteration cap before converging"
            );
        }
        debug!(
            nu,
            gamma,
            support_vectors = model.n_support_vectors(),
            iterations = model.iterations(),
            "One-class SVM fitted"
        );

        let scores: Vec<f64> = model
            .decision_all(&eval_scaled.values)
            .into_iter()
            .map(|f| -f)
            .collect();
        let threshold = percentile(&scores, self.config.threshold_percentile);
        let labels = super::label(&scores, threshold);
        let (normal_scores, anomalous_scores) = partition_scores(&scores, &labels);

        let details = BoundaryDetails {
            normal_scores,
            anomalous_scores,
            threshold,
            n_samples: eval.n_rows(),
            nu,
            gamma,
            n_support_vectors: model.n_support_vectors(),
            actual: eval.column(0).unwrap_or_default(),
            predicted: scores.clone(),
            predictions: labels.iter().map(|&l| if l { -1 } else { 1 }).collect(),
        };

        Ok(Detection {
            scores,
            labels,
            threshold,
            details: DetectorDetails::Boundary(details),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn matrix(values: Vec<Vec<f64>>) -> NumericMatrix {
        let n_features = values.first().map_or(2, Vec::len);
        let columns = (0..n_features).map(|j| format!("f{}", j)).collect();
        let ids = (0..values.len()).map(|i| format!("r{}", i)).collect();
        NumericMatrix::new(columns, ids, values)
    }

    fn cloud(n: usize, offset: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| {
                let k = (i + offset) as f64;
                vec![(k * 0.618_033_988_7).fract(), (k * 0.414_213_562_3).fract()]
            })
            .collect()
    }

    fn run(fit: &NumericMatrix, eval: &NumericMatrix) -> Result<Detection, DetectError> {
        BoundaryDetector::new(BoundaryConfig::default()).detect(
            fit,
            eval,
            &mut StdRng::seed_from_u64(42),
        )
    }

    #[test]
    fn nu_is_capped() {
        let detector = BoundaryDetector::new(BoundaryConfig::default());
        assert_eq!(detector.nu_for(30), 0.1);
        assert_eq!(detector.nu_for(100), 0.1);
        assert!((detector.nu_for(50) - 0.1).abs() < 1e-12);
        assert!((detector.nu_for(4) - 0.1).abs() < 1e-12);
        for n in [2usize, 3, 10, 99, 1000] {
            let nu = detector.nu_for(n);
            assert!(nu <= 0.1 && nu <= 1.0 / (n as f64).sqrt());
        }
    }

    #[test]
    fn configured_cap_above_ceiling_is_ignored() {
        let detector = BoundaryDetector::new(BoundaryConfig {
            nu_cap: 0.5,
            ..BoundaryConfig::default()
        });
        assert_eq!(detector.nu_for(12), MAX_NU);
        assert_eq!(detector.nu_for(1000), 1.0 / 1000f64.sqrt());

        let fit = matrix(cloud(12, 0));
        let eval = matrix(cloud(28, 100));
        let detection = detector
            .detect(&fit, &eval, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let DetectorDetails::Boundary(details) = &detection.details else {
            panic!("expected boundary details");
        };
        assert!(details.nu <= MAX_NU);
        assert!(details.nu <= 1.0 / 12f64.sqrt());
    }

    #[test]
    fn injected_outlier_is_flagged() {
        let fit = matrix(cloud(120, 0));
        let mut eval_rows = cloud(99, 500);
        eval_rows.push(vec![6.0, 6.0]);
        let eval = matrix(eval_rows);

        let det = run(&fit, &eval).unwrap();
        assert!(det.labels[99]);
        let max = det.scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(det.scores[99], max);

        let DetectorDetails::Boundary(details) = &det.details else {
            panic!("wrong details variant");
        };
        assert_eq!(details.predictions[99], -1);
        assert_eq!(details.actual[99], 6.0);
        assert_eq!(details.predicted, det.scores);
        assert!(details.nu <= 0.1);
        assert!(details.n_support_vectors >= 1);
    }

    #[test]
    fn identical_rows_flag_nothing() {
        let fit = matrix(vec![vec![2.0, 2.0]; 10]);
        let eval = matrix(vec![vec![2.0, 2.0]; 20]);
        let det = run(&fit, &eval).unwrap();
        assert_eq!(det.num_anomalies(), 0);
    }

    #[test]
    fn too_few_fit_rows_fail() {
        let fit = matrix(vec![vec![1.0, 1.0]]);
        let eval = matrix(cloud(5, 0));
        assert!(matches!(run(&fit, &eval), Err(DetectError::FitFailure(_))));
    }

    #[test]
    fn oversized_fit_partition_fails() {
        let config = BoundaryConfig {
            max_fit_rows: 10,
            ..BoundaryConfig::default()
        };
        let result = BoundaryDetector::new(config).detect(
            &matrix(cloud(11, 0)),
            &matrix(cloud(5, 0)),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(matches!(result, Err(DetectError::FitFailure(_))));
    }

    #[test]
    fn scores_are_negated_decision_values() {
        let fit = matrix(cloud(40, 0));
        let eval = matrix(cloud(10, 100));
        let det = run(&fit, &eval).unwrap();

        let scaler = RobustScaler::fit(&fit);
        let fit_scaled = scaler.transform(&fit);
        let params = SvmParams {
            nu: 0.1,
            gamma: scale_gamma(&fit_scaled.values),
            tolerance: 1e-3,
            max_iterations: 100_000,
            cache_mb: 200,
        };
        let model = OneClassSvm::fit(&fit_scaled.values, &params);
        let expected: Vec<f64> = model
            .decision_all(&scaler.transform(&eval).values)
            .iter()
            .map(|f| -f)
            .collect();
        assert_eq!(det.scores, expected);
    }
}
