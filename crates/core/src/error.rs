use thiserror::Error;

/// Terminal failures of a detection call. None are retried internally and no
/// partial result accompanies them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error("No usable numeric data: {0}")]
    EmptyNumericData(String),

    #[error("Missing value in row '{row}', column '{column}'")]
    MissingValues { row: String, column: String },

    #[error("Model fitting failed: {0}")]
    FitFailure(String),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}
