pub mod algorithms;
pub mod detectors;
pub mod engine;
pub mod pipeline;
pub mod report;

pub use detectors::{Algorithm, Detection, Detector, DetectorDetails};
pub use engine::{detect, AnomalyEngine};
pub use report::AnomalyReport;
