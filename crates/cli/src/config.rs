use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use outlier_core::config::load_dotenv;
use outlier_core::EngineConfig;

/// Resolve the engine configuration.
///
/// Priority: cli seed > `OUTLIER_*` env (incl. `.env`) > config file > defaults.
pub fn load(path: Option<&Path>, seed_override: Option<u64>) -> Result<EngineConfig> {
    load_dotenv();

    let mut config = match path {
        Some(path) => read_file(path)?,
        None => {
            debug!("No config file given, using defaults");
            EngineConfig::default()
        }
    };

    config.apply_env();

    if let Some(seed) = seed_override {
        config.seed = seed;
    }

    Ok(config)
}

fn read_file(path: &Path) -> Result<EngineConfig> {
    debug!(?path, "Loading config");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: EngineConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;
    Ok(config)
}
