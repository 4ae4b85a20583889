//! Sweep range generation.
//!
//! Supports linear and logarithmic spacing of the swept supply voltage.

use ms_core::linspace;
use std::fmt;

use crate::error::SweepError;

/// Type of sweep progression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SweepType {
    /// Uniformly spaced points
    #[default]
    Linear,
    /// Logarithmically spaced points
    Logarithmic,
}

/// Definition of a single parameter sweep, endpoints inclusive.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SweepDefinition {
    /// First value (volts)
    pub start: f64,
    /// Last value (volts)
    pub end: f64,
    /// Number of points to generate
    pub num_points: usize,
    /// Spacing type
    pub sweep_type: SweepType,
}

impl Default for SweepDefinition {
    /// 100 points from 1 V to 10 V.
    fn default() -> Self {
        Self {
            start: 1.0,
            end: 10.0,
            num_points: 100,
            sweep_type: SweepType::Linear,
        }
    }
}

impl SweepDefinition {
    pub fn new(
        start: f64,
        end: f64,
        num_points: usize,
        sweep_type: SweepType,
    ) -> Result<Self, SweepError> {
        let sweep = SweepDefinition {
            start,
            end,
            num_points,
            sweep_type,
        };
        sweep.validate()?;
        Ok(sweep)
    }

    pub fn linear(start: f64, end: f64, num_points: usize) -> Result<Self, SweepError> {
        Self::new(start, end, num_points, SweepType::Linear)
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(SweepError::InvalidConfiguration {
                what: "sweep bounds must be finite",
            });
        }
        if self.sweep_type == SweepType::Logarithmic && (self.start <= 0.0 || self.end <= 0.0) {
            return Err(SweepError::InvalidConfiguration {
                what: "logarithmic sweep bounds must be positive",
            });
        }
        Ok(())
    }

    /// Generate all points in the sweep.
    pub fn generate_points(&self) -> Vec<f64> {
        match self.sweep_type {
            SweepType::Linear => linspace(self.start, self.end, self.num_points),
            SweepType::Logarithmic => self.generate_logarithmic(),
        }
    }

    fn generate_logarithmic(&self) -> Vec<f64> {
        let mut points: Vec<f64> = linspace(self.start.ln(), self.end.ln(), self.num_points)
            .into_iter()
            .map(f64::exp)
            .collect();

        // Ensure exact endpoints
        if let Some(first) = points.first_mut() {
            *first = self.start;
        }
        if self.num_points > 1 {
            if let Some(last) = points.last_mut() {
                *last = self.end;
            }
        }
        points
    }
}

impl fmt::Display for SweepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "Linear"),
            Self::Logarithmic => write!(f, "Logarithmic"),
        }
    }
}

impl fmt::Display for SweepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sweep V from {} V to {} V ({} points, {})",
            self.start, self.end, self.num_points, self.sweep_type
        )
    }
}
