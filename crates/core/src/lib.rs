pub mod config;
pub mod dataset;
pub mod error;

pub use config::{BoundaryConfig, ClusterConfig, EngineConfig, IsolationConfig, SplitConfig};
pub use dataset::*;
pub use error::*;
