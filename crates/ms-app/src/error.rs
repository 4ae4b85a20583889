//! Error types for the ms-app service layer.

use std::path::PathBuf;

/// Application error wrapping the backend crates' errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read scenario file: {path}")]
    ScenarioFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Simulation error: {0}")]
    Simulation(#[from] ms_sim::SimError),

    #[error("Sweep error: {0}")]
    Sweep(#[from] ms_sweep::SweepError),

    #[error("Output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ms-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Scenario(format!("Failed to parse scenario YAML: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Output(format!("Failed to serialize report: {}", err))
    }
}
