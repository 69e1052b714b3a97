use std::time::Instant;

use outlier_core::{DetectError, EngineConfig, Table};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::detectors::Algorithm;
use crate::pipeline::prepare;
use crate::report::AnomalyReport;

/// Stateless entry point: table in, report out.
///
/// Each call seeds a fresh generator from `config.seed`; the split, k-means++
/// seeding and tree sampling all draw from it in a fixed order, so equal
/// inputs give equal reports.
#[derive(Debug, Clone, Default)]
pub struct AnomalyEngine {
    config: EngineConfig,
}

impl AnomalyEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one detector over `table`.
    pub fn detect(&self, table: &Table, algorithm: Algorithm) -> Result<AnomalyReport, DetectError> {
        let start = Instant::now();
        info!(
            %algorithm,
            rows = table.n_rows(),
            columns = table.n_columns(),
            "Running anomaly detection"
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let partition = prepare(table, &self.config.split, &mut rng)?;
        debug!(
            fit_rows = partition.fit.n_rows(),
            eval_rows = partition.eval.n_rows(),
            features = partition.eval.n_features(),
            "Partitioned input"
        );

        let detector = algorithm.detector(&self.config);
        let fit_start = Instant::now();
        let detection = detector.detect(&partition.fit, &partition.eval, &mut rng)?;
        info!(
            "  {} done in {:.3}s",
            detector.algorithm(),
            fit_start.elapsed().as_secs_f64()
        );

        let report = AnomalyReport::from_detection(algorithm, &partition.eval, detection);
        info!(
            "Detection complete in {:.3}s, {} of {} rows anomalous (threshold {:.4})",
            start.elapsed().as_secs_f64(),
            report.num_anomalies,
            report.n_samples,
            report.threshold
        );

        Ok(report)
    }

    /// Same as [`detect`](Self::detect) with the algorithm given by name.
    pub fn detect_named(&self, table: &Table, algorithm: &str) -> Result<AnomalyReport, DetectError> {
        let algorithm = algorithm.parse::<Algorithm>()?;
        self.detect(table, algorithm)
    }
}

/// One-shot helper around [`AnomalyEngine`].
pub fn detect(
    table: &Table,
    algorithm: Algorithm,
    config: &EngineConfig,
) -> Result<AnomalyReport, DetectError> {
    AnomalyEngine::new(config.clone()).detect(table, algorithm)
}
