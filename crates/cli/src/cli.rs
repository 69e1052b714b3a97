use std::path::PathBuf;

use clap::Parser;

/// Flag anomalous rows in a CSV file.
///
/// Loads the file, keeps its numeric columns, runs one detector and prints
/// the report as JSON on stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "outlier-cli", about = "Unsupervised anomaly detection for tabular data")]
pub struct CliArgs {
    /// CSV file to analyse
    #[arg(long, short)]
    pub input: PathBuf,

    /// Detector: cluster-based, isolation-based or boundary-based
    /// (also accepts "K-Means", "Isolation Forest", "One-Class SVM")
    #[arg(long, short, env = "OUTLIER_ALGORITHM", default_value = "cluster-based")]
    pub algorithm: String,

    /// Engine config file (TOML). Missing sections fall back to defaults.
    #[arg(long, env = "OUTLIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed override (takes precedence over config file and environment)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Treat the first column as data instead of the row index
    #[arg(long)]
    pub no_index: bool,

    /// Only validate the file (numeric columns, no missing values) and exit
    #[arg(long)]
    pub check: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}
