//! Sweep execution: one motor integration per supply voltage.
//!
//! Each voltage gets its own copy of the base parameters, so iterations share
//! no mutable state and the output order always matches the input order.

use ms_sim::{DcMotor, MotorParameters, MotorState, SimOptions, Trajectory, run_sim_from};
use tracing::{debug, info, warn};

use crate::error::SweepError;
use crate::probe::{ProbeMethod, probe_omega};

/// What to do when the integration for one voltage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FailurePolicy {
    /// Fail the whole sweep; no partial result is returned.
    #[default]
    Abort,
    /// Record the voltage as skipped and continue.
    Skip,
}

/// Options for a voltage sweep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SweepOptions {
    /// Time at which ω is read (seconds)
    pub probe_time: f64,
    /// End of each integration; `max(probe_time, 1.0)` when unset
    pub t_end: Option<f64>,
    /// Solver settings; `t_end` is replaced by the sweep span
    pub sim: SimOptions,
    pub probe: ProbeMethod,
    pub failure_policy: FailurePolicy,
    /// State every integration starts from
    pub initial_state: MotorState,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            probe_time: 1.0,
            t_end: None,
            sim: SimOptions::default(),
            probe: ProbeMethod::default(),
            failure_policy: FailurePolicy::default(),
            initial_state: MotorState::rest(),
        }
    }
}

impl SweepOptions {
    /// End time of every integration in the sweep.
    pub fn span_end(&self) -> f64 {
        self.t_end.unwrap_or(self.probe_time.max(1.0))
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if !(self.probe_time.is_finite() && self.probe_time >= 0.0) {
            return Err(SweepError::InvalidConfiguration {
                what: "probe time must be finite and non-negative",
            });
        }
        let end = self.span_end();
        if !(end.is_finite() && end > 0.0) {
            return Err(SweepError::InvalidConfiguration {
                what: "integration end time must be positive",
            });
        }
        if end < self.probe_time {
            return Err(SweepError::InvalidConfiguration {
                what: "integration span must include the probe time",
            });
        }
        Ok(())
    }
}

/// One swept voltage and the angular velocity probed for it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SweepPoint {
    pub voltage: f64,
    pub omega: f64,
}

/// A voltage left out under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkippedPoint {
    /// Position in the input voltage sequence
    pub index: usize,
    pub voltage: f64,
    pub message: String,
}

/// Result of a voltage sweep, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SweepResult {
    pub probe_time: f64,
    pub points: Vec<SweepPoint>,
    pub skipped: Vec<SkippedPoint>,
}

impl SweepResult {
    pub fn voltages(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.voltage).collect()
    }

    pub fn omegas(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.omega).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn num_successful(&self) -> usize {
        self.points.len()
    }

    pub fn num_failed(&self) -> usize {
        self.skipped.len()
    }
}

/// Integrate the motor once per voltage and probe ω at `opts.probe_time`.
pub fn sweep_voltage(
    base: &MotorParameters,
    voltages: &[f64],
    opts: &SweepOptions,
) -> Result<SweepResult, SweepError> {
    sweep_voltage_observed(base, voltages, opts, None)
}

/// Like [`sweep_voltage`], calling `observer` once per voltage with its index.
///
/// The trajectory is `None` for a voltage skipped under [`FailurePolicy::Skip`].
pub fn sweep_voltage_observed(
    base: &MotorParameters,
    voltages: &[f64],
    opts: &SweepOptions,
    mut observer: Option<&mut dyn FnMut(usize, f64, Option<&Trajectory<MotorState>>)>,
) -> Result<SweepResult, SweepError> {
    opts.validate()?;
    base.validate()?;
    if voltages.iter().any(|v| !v.is_finite()) {
        return Err(SweepError::InvalidConfiguration {
            what: "swept voltages must be finite",
        });
    }

    let sim = opts.sim.clone().with_t_end(opts.span_end());
    info!(
        points = voltages.len(),
        probe_time = opts.probe_time,
        t_end = sim.t_end,
        "starting voltage sweep"
    );

    let mut result = SweepResult {
        probe_time: opts.probe_time,
        points: Vec::with_capacity(voltages.len()),
        skipped: Vec::new(),
    };

    for (index, &voltage) in voltages.iter().enumerate() {
        let params = base.with_supply_voltage(voltage);
        let run = DcMotor::new(params)
            .and_then(|motor| run_sim_from(&motor, opts.initial_state, &sim));

        let traj = match run {
            Ok(traj) => traj,
            Err(source) => match opts.failure_policy {
                FailurePolicy::Abort => {
                    return Err(SweepError::IntegrationFailure { voltage, source });
                }
                FailurePolicy::Skip => {
                    warn!(index, voltage, error = %source, "skipping sweep point");
                    result.skipped.push(SkippedPoint {
                        index,
                        voltage,
                        message: source.to_string(),
                    });
                    if let Some(cb) = observer.as_deref_mut() {
                        cb(index, voltage, None);
                    }
                    continue;
                }
            },
        };

        let omega = probe_omega(&traj, opts.probe_time, opts.probe).ok_or(
            SweepError::InvalidConfiguration {
                what: "integration produced an empty trajectory",
            },
        )?;
        debug!(index, voltage, omega, samples = traj.len(), "sweep point");

        if let Some(cb) = observer.as_deref_mut() {
            cb(index, voltage, Some(&traj));
        }
        result.points.push(SweepPoint { voltage, omega });
    }

    info!(
        successful = result.num_successful(),
        skipped = result.num_failed(),
        "voltage sweep finished"
    );
    Ok(result)
}
