//! The three interchangeable detectors and the selector that picks one.
//!
//! Every detector fits on the fit partition, scores each evaluation row and
//! thresholds the scores. Scores follow a single convention across
//! detectors: **larger means more anomalous**, and a row is labelled
//! anomalous iff its score is strictly greater than the threshold.

pub mod boundary;
pub mod cluster;
pub mod isolation;

use std::fmt;
use std::str::FromStr;

use outlier_core::{DetectError, EngineConfig, NumericMatrix};
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub use boundary::{BoundaryDetails, BoundaryDetector};
pub use cluster::{ClusterDetails, ClusterDetector};
pub use isolation::{IsolationDetails, IsolationDetector};

/// Detector selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Distance to the nearest k-means centroid, IQR fence.
    ClusterBased,
    /// Isolation forest path lengths, contamination quantile.
    IsolationBased,
    /// One-class SVM decision values, high percentile.
    BoundaryBased,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::ClusterBased,
        Algorithm::IsolationBased,
        Algorithm::BoundaryBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::ClusterBased => "cluster-based",
            Algorithm::IsolationBased => "isolation-based",
            Algorithm::BoundaryBased => "boundary-based",
        }
    }

    /// Build the detector for this variant from the matching config section.
    pub fn detector(&self, config: &EngineConfig) -> Box<dyn Detector> {
        match self {
            Algorithm::ClusterBased => Box::new(ClusterDetector::new(config.cluster.clone())),
            Algorithm::IsolationBased => {
                Box::new(IsolationDetector::new(config.isolation.clone()))
            }
            Algorithm::BoundaryBased => Box::new(BoundaryDetector::new(config.boundary.clone())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = DetectError;

    /// Accepts the kebab-case names and the model names ("K-Means",
    /// "Isolation Forest", "One-Class SVM"), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cluster-based" | "k-means" | "kmeans" => Ok(Algorithm::ClusterBased),
            "isolation-based" | "isolation forest" => Ok(Algorithm::IsolationBased),
            "boundary-based" | "one-class svm" => Ok(Algorithm::BoundaryBased),
            _ => Err(DetectError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// A fitted-and-applied detector run over one evaluation partition.
///
/// `scores` and `labels` are aligned with the evaluation rows.
#[derive(Debug, Clone)]
pub struct Detection {
    pub scores: Vec<f64>,
    pub labels: Vec<bool>,
    pub threshold: f64,
    pub details: DetectorDetails,
}

impl Detection {
    pub fn num_anomalies(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }
}

/// Detector-specific auxiliary output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorDetails {
    Cluster(ClusterDetails),
    Isolation(IsolationDetails),
    Boundary(BoundaryDetails),
}

/// One anomaly detection method.
///
/// Implementations own their configuration section; randomness comes only
/// from `rng`, so a seeded generator makes `detect` reproducible.
pub trait Detector: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn detect(
        &self,
        fit: &NumericMatrix,
        eval: &NumericMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<Detection, DetectError>;
}

/// `score > threshold` per row.
pub fn label(scores: &[f64], threshold: f64) -> Vec<bool> {
    scores.iter().map(|&s| s > threshold).collect()
}

/// Split scores into (normal, anomalous) by label, keeping order.
pub(crate) fn partition_scores(scores: &[f64], labels: &[bool]) -> (Vec<f64>, Vec<f64>) {
    let mut normal = Vec::new();
    let mut anomalous = Vec::new();
    for (&s, &l) in scores.iter().zip(labels.iter()) {
        if l {
            anomalous.push(s);
        } else {
            normal.push(s);
        }
    }
    (normal, anomalous)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_model_names() {
        assert_eq!("cluster-based".parse::<Algorithm>().unwrap(), Algorithm::ClusterBased);
        assert_eq!("K-Means".parse::<Algorithm>().unwrap(), Algorithm::ClusterBased);
        assert_eq!(
            "Isolation Forest".parse::<Algorithm>().unwrap(),
            Algorithm::IsolationBased
        );
        assert_eq!(
            " boundary-based ".parse::<Algorithm>().unwrap(),
            Algorithm::BoundaryBased
        );
        assert_eq!("One-Class SVM".parse::<Algorithm>().unwrap(), Algorithm::BoundaryBased);
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert_eq!(
            "dbscan".parse::<Algorithm>(),
            Err(DetectError::UnknownAlgorithm("dbscan".into()))
        );
    }

    #[test]
    fn display_round_trips() {
        for a in Algorithm::ALL {
            assert_eq!(a.to_string().parse::<Algorithm>().unwrap(), a);
        }
        assert_eq!(
            serde_json::to_string(&Algorithm::IsolationBased).unwrap(),
            "\"isolation-based\""
        );
    }

    #[test]
    fn ties_with_threshold_are_normal() {
        assert_eq!(label(&[1.0, 2.0, 2.0, 3.0], 2.0), vec![false, false, false, true]);
    }

    #[test]
    fn partition_keeps_order() {
        let (normal, anomalous) =
            partition_scores(&[0.1, 0.9, 0.2, 0.8], &[false, true, false, true]);
        assert_eq!(normal, vec![0.1, 0.2]);
        assert_eq!(anomalous, vec![0.9, 0.8]);
    }
}
