//! Input preparation shared by every detector.
//!
//! - **preprocess**: numeric column selection, missing-value rejection and the
//!   seeded fit/evaluation split.
//! - **scaler**: median/IQR scaling fit on the fit partition.
//! - **stats**: percentiles, fences and variances used across the crate.

pub mod preprocess;
pub mod scaler;
pub mod stats;

pub use preprocess::{prepare, Partition};
pub use scaler::RobustScaler;
