//! Transient simulation of lumped ODE models.
//!
//! Provides:
//! - `TransientModel` trait for pluggable dynamic systems
//! - Adaptive Dormand-Prince RK45 integrator with local error control
//! - Fixed-step RK4 and forward Euler integrators behind the same trait
//! - Trajectory recording of accepted steps
//! - DC motor armature/rotor model

pub mod error;
pub mod integrator;
pub mod model;
pub mod motor;
pub mod sim;

// Re-exports for public API
pub use error::{FailureReason, SimError, SimResult};
pub use integrator::{
    DormandPrince, ErrorNorm, FixedStep, ForwardEuler, Integrator, RK4, StepMethod,
};
pub use model::TransientModel;
pub use motor::{DcMotor, MotorParameters, MotorState, derivative, simulate};
pub use sim::{
    IntegrationStats, IntegratorType, SimOptions, SimProgress, TimeSpan, Trajectory, run_sim,
    run_sim_from, run_sim_with_progress,
};
