//! Application service layer for the motor study.
//!
//! Ties the simulation and sweep crates into one scenario run that the CLI
//! (or any other frontend) drives: configuration loading, progress events,
//! visualization sinks and the run report.

pub mod error;
pub mod progress;
pub mod run_service;
pub mod scenario;
pub mod sink;

// Re-export key types for convenience
pub use error::{AppError, AppResult};
pub use progress::{RunProgressEvent, RunStage};
pub use run_service::{
    ReferenceSummary, RunReport, RunTimingSummary, run_scenario, run_scenario_with_progress,
};
pub use scenario::{ScenarioConfig, load_scenario};
pub use sink::{CsvSink, GridCell, GridLayout, NullSink, VisualizationSink, fit_label};
