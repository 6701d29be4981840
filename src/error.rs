use thiserror::Error;

/// Errors surfaced by a feature selection run.
///
/// `Config` errors are raised before any generation is computed. `Evaluation`
/// errors come from the estimator or the fold layout and abort the run.
/// An empty feature subset is never an error: it scores `f64::NEG_INFINITY`.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
