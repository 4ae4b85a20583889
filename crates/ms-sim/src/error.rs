//! Error types for simulation operations.

use std::fmt;
use thiserror::Error;

/// Why an integration gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Step size shrank below the minimum representable step at `t`.
    StepUnderflow,
    /// Too many consecutive rejected attempts within one step.
    TooManyRejections,
    /// Accepted-step budget exhausted before reaching the end of the span.
    StepBudgetExhausted,
    /// State or derivative became NaN or infinite.
    NonFinite,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepUnderflow => write!(f, "step size underflow"),
            Self::TooManyRejections => write!(f, "too many rejected steps"),
            Self::StepBudgetExhausted => write!(f, "maximum number of steps exceeded"),
            Self::NonFinite => write!(f, "non-finite state"),
        }
    }
}

/// Errors encountered during transient simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid parameter {what} = {value}: {reason}")]
    InvalidParameter {
        what: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Integration failed at t = {t} s: {reason}")]
    IntegrationFailure { t: f64, reason: FailureReason },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<ms_core::CoreError> for SimError {
    fn from(e: ms_core::CoreError) -> Self {
        match e {
            ms_core::CoreError::NonFinite { what, value } => SimError::InvalidParameter {
                what,
                value,
                reason: "must be finite",
            },
            ms_core::CoreError::NotPositive { what, value } => SimError::InvalidParameter {
                what,
                value,
                reason: "must be strictly positive",
            },
            ms_core::CoreError::InvalidArg { what } => SimError::InvalidArg { what },
        }
    }
}
