//! Error types for sweeps and fits.

use ms_sim::SimError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SweepError {
    #[error("Invalid sweep configuration: {what}")]
    InvalidConfiguration { what: &'static str },

    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error("Integration failed at V = {voltage} V: {source}")]
    IntegrationFailure {
        voltage: f64,
        #[source]
        source: SimError,
    },

    #[error("Insufficient data for a linear fit: {points} points, {distinct} distinct voltages")]
    InsufficientData { points: usize, distinct: usize },
}
