//! Supply-voltage sweeps of the DC motor model.
//!
//! - `sweeps`: sweep range definitions (linear / logarithmic spacing)
//! - `executor`: one integration per voltage, probing ω at a fixed time
//! - `probe`: nearest-sample or interpolated trajectory lookup
//! - `fit`: least-squares line through the swept characteristic

pub mod error;
pub mod executor;
pub mod fit;
pub mod probe;
pub mod sweeps;

mod special;

pub use error::SweepError;
pub use executor::{
    FailurePolicy, SkippedPoint, SweepOptions, SweepPoint, SweepResult, sweep_voltage,
    sweep_voltage_observed,
};
pub use fit::{FitResult, fit, linear_regression};
pub use probe::{ProbeMethod, probe_omega};
pub use sweeps::{SweepDefinition, SweepType};
