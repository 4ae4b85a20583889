//! Simulation runner and result recording.

use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::integrator::{DormandPrince, ErrorNorm, FixedStep, ForwardEuler, Integrator, RK4};
use crate::model::TransientModel;

/// Integration interval `[t0, t_end]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSpan {
    pub t0: f64,
    pub t_end: f64,
}

impl TimeSpan {
    /// Validated span; both ends finite and `t_end > t0`.
    pub fn new(t0: f64, t_end: f64) -> SimResult<Self> {
        if !t0.is_finite() || !t_end.is_finite() {
            return Err(SimError::InvalidArg {
                what: "time span bounds must be finite",
            });
        }
        if t_end <= t0 {
            return Err(SimError::InvalidArg {
                what: "time span end must be greater than start",
            });
        }
        Ok(Self { t0, t_end })
    }

    /// Span `[0, t_end]`.
    pub fn from_zero(t_end: f64) -> SimResult<Self> {
        Self::new(0.0, t_end)
    }

    pub fn duration(&self) -> f64 {
        self.t_end - self.t0
    }
}

/// Counters collected while integrating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegrationStats {
    /// Accepted steps (one recorded sample each).
    pub accepted_steps: usize,
    /// Attempts discarded by error control.
    pub rejected_steps: usize,
    /// Right-hand-side evaluations.
    pub rhs_calls: usize,
}

/// Accepted samples of one integration.
///
/// Times are strictly increasing, the first sample is the initial state at
/// `t0` and the last sample sits exactly at the end of the span.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory<S> {
    t: Vec<f64>,
    x: Vec<S>,
    stats: IntegrationStats,
}

impl<S> Trajectory<S> {
    pub(crate) fn start(t0: f64, x0: S) -> Self {
        Self {
            t: vec![t0],
            x: vec![x0],
            stats: IntegrationStats::default(),
        }
    }

    pub(crate) fn push(&mut self, t: f64, x: S) {
        self.t.push(t);
        self.x.push(x);
        self.stats.accepted_steps += 1;
    }

    pub(crate) fn stats_mut(&mut self) -> &mut IntegrationStats {
        &mut self.stats
    }

    /// Build a trajectory from existing samples.
    ///
    /// Fails unless both sequences are non-empty, equally long and the times
    /// are finite and strictly increasing.
    pub fn from_samples(t: Vec<f64>, x: Vec<S>) -> SimResult<Self> {
        if t.is_empty() || t.len() != x.len() {
            return Err(SimError::InvalidArg {
                what: "trajectory needs matching, non-empty time and state samples",
            });
        }
        if t.iter().any(|ti| !ti.is_finite()) || t.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidArg {
                what: "trajectory times must be finite and strictly increasing",
            });
        }
        let accepted_steps = t.len() - 1;
        Ok(Self {
            t,
            x,
            stats: IntegrationStats {
                accepted_steps,
                ..IntegrationStats::default()
            },
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.t
    }

    pub fn states(&self) -> &[S] {
        &self.x
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, &S)> {
        self.t.iter().copied().zip(self.x.iter())
    }

    pub fn last(&self) -> Option<(f64, &S)> {
        self.t.last().copied().zip(self.x.last())
    }

    /// Index of the sample closest in time to `t`.
    ///
    /// Ties go to the earlier sample.
    pub fn nearest_index(&self, t: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, ti) in self.t.iter().enumerate() {
            let dist = (ti - t).abs();
            match best {
                Some((_, d)) if dist >= d => {}
                _ => best = Some((idx, dist)),
            }
        }
        best.map(|(idx, _)| idx)
    }
}

/// Integrator selection for simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "method", rename_all = "snake_case")
)]
pub enum IntegratorType {
    /// Adaptive Dormand-Prince 5(4) (default).
    #[default]
    DormandPrince,
    /// Classical 4th-order Runge-Kutta with a fixed step.
    Rk4 { dt: f64 },
    /// Forward Euler (1st-order, 1 rhs call per step) with a fixed step.
    ForwardEuler { dt: f64 },
}

/// Options for simulation runs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SimOptions {
    /// Final simulation time (seconds); integration starts at t=0.
    pub t_end: f64,
    /// Relative tolerance of adaptive error control
    pub rtol: f64,
    /// Absolute tolerance of adaptive error control
    pub atol: f64,
    /// Norm used to compare the error estimate against the tolerances
    pub norm: ErrorNorm,
    /// Integrator type (default: Dormand-Prince)
    pub integrator: IntegratorType,
    /// Maximum number of accepted steps (safety limit)
    pub max_steps: usize,
    /// Maximum consecutive rejections within one step
    pub max_rejections: usize,
    /// Upper bound on the adaptive step size (seconds)
    pub max_step: Option<f64>,
    /// Initial adaptive step; chosen automatically when unset
    pub first_step: Option<f64>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            t_end: 1.0,
            rtol: 1e-6,
            atol: 1e-8,
            norm: ErrorNorm::default(),
            integrator: IntegratorType::default(),
            max_steps: 100_000,
            max_rejections: 100,
            max_step: None,
            first_step: None,
        }
    }
}

impl SimOptions {
    /// Same options over `[0, t_end]`.
    pub fn with_t_end(mut self, t_end: f64) -> Self {
        self.t_end = t_end;
        self
    }

    /// Adaptive integrator configured from these options.
    pub fn dormand_prince(&self) -> DormandPrince {
        DormandPrince {
            rtol: self.rtol,
            atol: self.atol,
            norm: self.norm,
            first_step: self.first_step,
            max_step: self.max_step,
            max_steps: self.max_steps,
            max_rejections: self.max_rejections,
        }
    }
}

/// Progress snapshot emitted after each accepted step.
#[derive(Clone, Debug)]
pub struct SimProgress {
    pub step: usize,
    pub sim_time: f64,
    pub t_end: f64,
    pub fraction_complete: f64,
    pub rejected_steps: usize,
}

/// Run a transient simulation from the model's initial state.
pub fn run_sim<M: TransientModel>(model: &M, opts: &SimOptions) -> SimResult<Trajectory<M::State>> {
    run_sim_with_progress(model, model.initial_state(), opts, None)
}

/// Run a transient simulation from an explicit initial state.
pub fn run_sim_from<M: TransientModel>(
    model: &M,
    x0: M::State,
    opts: &SimOptions,
) -> SimResult<Trajectory<M::State>> {
    run_sim_with_progress(model, x0, opts, None)
}

/// Run a transient simulation, reporting progress after every accepted step.
pub fn run_sim_with_progress<M: TransientModel>(
    model: &M,
    x0: M::State,
    opts: &SimOptions,
    mut progress: Option<&mut dyn FnMut(SimProgress)>,
) -> SimResult<Trajectory<M::State>> {
    let span = TimeSpan::from_zero(opts.t_end)?;
    let mut observer = |p: SimProgress| {
        if let Some(cb) = progress.as_deref_mut() {
            cb(p);
        }
    };

    let record = match opts.integrator {
        IntegratorType::DormandPrince => {
            opts.dormand_prince()
                .integrate_observed(model, x0, span, &mut observer)?
        }
        IntegratorType::Rk4 { dt } => FixedStep::new(RK4, dt, opts.max_steps)
            .integrate_observed(model, x0, span, &mut observer)?,
        IntegratorType::ForwardEuler { dt } => FixedStep::new(ForwardEuler, dt, opts.max_steps)
            .integrate_observed(model, x0, span, &mut observer)?,
    };

    let stats = record.stats();
    debug!(
        integrator = ?opts.integrator,
        t_end = opts.t_end,
        accepted = stats.accepted_steps,
        rejected = stats.rejected_steps,
        rhs_calls = stats.rhs_calls,
        "integration finished"
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.t_end, 1.0);
        assert_eq!(opts.rtol, 1e-6);
        assert_eq!(opts.atol, 1e-8);
        assert_eq!(opts.max_steps, 100_000);
        assert_eq!(opts.integrator, IntegratorType::DormandPrince);
    }

    #[test]
    fn time_span_rejects_empty_or_reversed() {
        assert!(TimeSpan::from_zero(0.0).is_err());
        assert!(TimeSpan::from_zero(-1.0).is_err());
        assert!(TimeSpan::new(0.0, f64::NAN).is_err());
        assert_eq!(TimeSpan::from_zero(2.0).unwrap().duration(), 2.0);
    }

    #[test]
    fn nearest_index_prefers_first_on_tie() {
        let traj = Trajectory::from_samples(vec![0.0, 0.5, 1.5], vec![[0.0], [1.0], [2.0]]).unwrap();
        // 1.0 is equidistant from 0.5 and 1.5
        assert_eq!(traj.nearest_index(1.0), Some(1));
        assert_eq!(traj.nearest_index(1.4), Some(2));
        assert_eq!(traj.nearest_index(-3.0), Some(0));
    }

    #[test]
    fn from_samples_rejects_bad_input() {
        assert!(Trajectory::<[f64; 1]>::from_samples(vec![], vec![]).is_err());
        assert!(Trajectory::from_samples(vec![0.0, 1.0], vec![[0.0]]).is_err());
        assert!(Trajectory::from_samples(vec![0.0, 0.0], vec![[0.0], [1.0]]).is_err());
    }

    #[test]
    fn last_returns_final_sample() {
        let traj = Trajectory::from_samples(vec![0.0, 1.0], vec![[3.0], [4.0]]).unwrap();
        let (t, x) = traj.last().unwrap();
        assert_eq!(t, 1.0);
        assert_eq!(x, &[4.0]);
        assert_eq!(traj.stats().accepted_steps, 1);
    }
}
