//! Time integrators.
//!
//! [`Integrator`] turns a model, an initial state and a span into a
//! [`Trajectory`]. [`DormandPrince`] is the adaptive default; [`FixedStep`]
//! wraps any single-step [`StepMethod`] for determinism-sensitive runs.

use ms_core::Tolerances;

use crate::error::{FailureReason, SimError, SimResult};
use crate::model::TransientModel;
use crate::sim::{SimProgress, TimeSpan, Trajectory};

/// Produces a trajectory of accepted steps over a time span.
///
/// Implementations hold configuration only, so one value can serve any number
/// of independent integrations.
pub trait Integrator {
    /// Integrate, calling `observer` after every accepted step.
    fn integrate_observed<M: TransientModel>(
        &self,
        model: &M,
        x0: M::State,
        span: TimeSpan,
        observer: &mut dyn FnMut(SimProgress),
    ) -> SimResult<Trajectory<M::State>>;

    fn integrate<M: TransientModel>(
        &self,
        model: &M,
        x0: M::State,
        span: TimeSpan,
    ) -> SimResult<Trajectory<M::State>> {
        self.integrate_observed(model, x0, span, &mut |_: SimProgress| {})
    }
}

/// Single explicit step of a fixed-step scheme.
pub trait StepMethod {
    /// Right-hand-side evaluations per step.
    const RHS_PER_STEP: usize;

    /// Advance state by one time step using the transient model.
    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State>;
}

/// Classical RK4 (Runge-Kutta 4th order) step.
#[derive(Clone, Copy, Debug, Default)]
pub struct RK4;

impl StepMethod for RK4 {
    const RHS_PER_STEP: usize = 4;

    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let k1 = model.rhs(t, x)?;

        let x2 = model.add_scaled(x, 0.5 * dt, &k1);
        let k2 = model.rhs(t + 0.5 * dt, &x2)?;

        let x3 = model.add_scaled(x, 0.5 * dt, &k2);
        let k3 = model.rhs(t + 0.5 * dt, &x3)?;

        let x4 = model.add_scaled(x, dt, &k3);
        let k4 = model.rhs(t + dt, &x4)?;

        // Combine: x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        let k_sum = model.add(
            &model.add(&k1, &model.scale(&k2, 2.0)),
            &model.add(&model.scale(&k3, 2.0), &k4),
        );

        Ok(model.add_scaled(x, dt / 6.0, &k_sum))
    }
}

/// Forward Euler (explicit, 1st order, fast for testing).
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardEuler;

impl StepMethod for ForwardEuler {
    const RHS_PER_STEP: usize = 1;

    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let xdot = model.rhs(t, x)?;
        Ok(model.add_scaled(x, dt, &xdot))
    }
}

/// Fixed-step integration with any [`StepMethod`].
///
/// The final step is shortened so the trajectory ends exactly at `t_end`.
#[derive(Clone, Copy, Debug)]
pub struct FixedStep<S> {
    pub method: S,
    pub dt: f64,
    pub max_steps: usize,
}

impl<S: StepMethod> FixedStep<S> {
    pub fn new(method: S, dt: f64, max_steps: usize) -> Self {
        Self {
            method,
            dt,
            max_steps,
        }
    }
}

impl<S: StepMethod> Integrator for FixedStep<S> {
    fn integrate_observed<M: TransientModel>(
        &self,
        model: &M,
        x0: M::State,
        span: TimeSpan,
        observer: &mut dyn FnMut(SimProgress),
    ) -> SimResult<Trajectory<M::State>> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }

        let end_slack = 1e-12 * span.duration();
        let mut t = span.t0;
        let mut x = x0;
        let mut record = Trajectory::start(t, x.clone());
        let mut step = 0;

        while t < span.t_end {
            if step >= self.max_steps {
                return Err(SimError::IntegrationFailure {
                    t,
                    reason: FailureReason::StepBudgetExhausted,
                });
            }

            // Step times are t0 + n*dt so rounding does not accumulate.
            let mut t_next = (span.t0 + (step + 1) as f64 * self.dt).min(span.t_end);
            if span.t_end - t_next <= end_slack {
                t_next = span.t_end;
            }

            x = self.method.step(model, t, &x, t_next - t)?;
            record.stats_mut().rhs_calls += S::RHS_PER_STEP;
            if !is_finite_state(&x) {
                return Err(SimError::IntegrationFailure {
                    t,
                    reason: FailureReason::NonFinite,
                });
            }

            t = t_next;
            step += 1;
            record.push(t, x.clone());
            observer(progress(step, t, span, 0));
        }

        Ok(record)
    }
}

/// Norm applied to the scaled local error estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ErrorNorm {
    /// Root-mean-square over components (accept when < 1).
    #[default]
    Rms,
    /// Largest component: every component must meet `atol + rtol*|y|`.
    Max,
}

impl ErrorNorm {
    fn apply(self, scaled: impl Iterator<Item = f64>) -> f64 {
        match self {
            Self::Rms => rms(scaled),
            Self::Max => scaled.map(f64::abs).fold(0.0, f64::max),
        }
    }
}

/// Adaptive Dormand-Prince 5(4) integrator with FSAL.
///
/// A step is accepted when the norm of `err_k / (atol + rtol*max(|y_k|, |y_new_k|))`
/// is below one. The next step is scaled by `0.9 * err^(-1/5)`, clamped to
/// `[0.2, 10]`, and may not grow right after a rejection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DormandPrince {
    pub rtol: f64,
    pub atol: f64,
    pub norm: ErrorNorm,
    /// Initial step; estimated from the problem when `None`.
    pub first_step: Option<f64>,
    /// Upper bound on step size; unbounded when `None`.
    pub max_step: Option<f64>,
    pub max_steps: usize,
    pub max_rejections: usize,
}

impl Default for DormandPrince {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-8,
            norm: ErrorNorm::Rms,
            first_step: None,
            max_step: None,
            max_steps: 100_000,
            max_rejections: 100,
        }
    }
}

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
/// -1 / (error estimator order + 1)
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];
const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
/// Difference between the 5th and embedded 4th order weights.
const E: [f64; 7] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

/// Outcome of one Dormand-Prince attempt.
struct Attempt<S> {
    y_new: S,
    f_new: S,
    error: S,
}

impl DormandPrince {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            ..Self::default()
        }
    }

    fn validate(&self, span: TimeSpan) -> SimResult<()> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(SimError::InvalidArg {
                what: "rtol must be positive",
            });
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(SimError::InvalidArg {
                what: "atol must be positive",
            });
        }
        if let Some(h) = self.max_step {
            if !(h > 0.0) {
                return Err(SimError::InvalidArg {
                    what: "max_step must be positive",
                });
            }
        }
        if let Some(h) = self.first_step {
            if !(h.is_finite() && h > 0.0 && h <= span.duration()) {
                return Err(SimError::InvalidArg {
                    what: "first_step must be positive and within the span",
                });
            }
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        Ok(())
    }

    fn tolerances(&self) -> Tolerances {
        Tolerances {
            abs: self.atol,
            rel: self.rtol,
        }
    }

    fn error_norm(&self, y: &[f64], y_new: &[f64], err: &[f64]) -> f64 {
        let tol = self.tolerances();
        let scaled = y
            .iter()
            .zip(y_new)
            .zip(err)
            .map(|((a, b), e)| e / tol.scale(a.abs().max(b.abs())));
        self.norm.apply(scaled)
    }

    /// Starting step estimate from the first two derivative evaluations
    /// (Hairer, Norsett & Wanner, Sec. II.4).
    fn initial_step<M: TransientModel>(
        &self,
        model: &M,
        t0: f64,
        y0: &M::State,
        f0: &M::State,
        span: TimeSpan,
    ) -> SimResult<f64> {
        let interval = span.duration();
        let tol = self.tolerances();
        let scale: Vec<f64> = y0.as_ref().iter().map(|y| tol.scale(y.abs())).collect();

        let d0 = rms(y0.as_ref().iter().zip(&scale).map(|(y, s)| y / s));
        let d1 = rms(f0.as_ref().iter().zip(&scale).map(|(f, s)| f / s));

        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
        .min(interval);

        let y1 = model.add_scaled(y0, h0, f0);
        let f1 = model.rhs(t0 + h0, &y1)?;
        let d2 = rms(
            f1.as_ref()
                .iter()
                .zip(f0.as_ref())
                .zip(&scale)
                .map(|((a, b), s)| (a - b) / s),
        ) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(-ERROR_EXPONENT)
        };

        Ok((100.0 * h0).min(h1).min(interval))
    }

    fn attempt<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        y: &M::State,
        f: &M::State,
        h: f64,
    ) -> SimResult<Attempt<M::State>> {
        let mut k: Vec<M::State> = Vec::with_capacity(7);
        k.push(f.clone());

        for s in 1..6 {
            let dy = combine(model, &k[..s], &A[s][..s]);
            let ys = model.add_scaled(y, h, &dy);
            k.push(model.rhs(t + C[s] * h, &ys)?);
        }

        let y_new = model.add_scaled(y, h, &combine(model, &k, &B));
        let f_new = model.rhs(t + h, &y_new)?;
        k.push(f_new.clone());

        let error = model.scale(&combine(model, &k, &E), h);
        Ok(Attempt {
            y_new,
            f_new,
            error,
        })
    }
}

impl Integrator for DormandPrince {
    fn integrate_observed<M: TransientModel>(
        &self,
        model: &M,
        x0: M::State,
        span: TimeSpan,
        observer: &mut dyn FnMut(SimProgress),
    ) -> SimResult<Trajectory<M::State>> {
        self.validate(span)?;
        if !is_finite_state(&x0) {
            return Err(SimError::IntegrationFailure {
                t: span.t0,
                reason: FailureReason::NonFinite,
            });
        }

        let max_step = self.max_step.unwrap_or(f64::INFINITY);
        let mut t = span.t0;
        let mut y = x0;
        let mut f = model.rhs(t, &y)?;
        let mut record = Trajectory::start(t, y.clone());
        record.stats_mut().rhs_calls += 1;

        let mut h_abs = match self.first_step {
            Some(h) => h,
            None => {
                record.stats_mut().rhs_calls += 1;
                self.initial_step(model, t, &y, &f, span)?
            }
        };

        let mut step = 0;
        while t < span.t_end {
            if step >= self.max_steps {
                return Err(SimError::IntegrationFailure {
                    t,
                    reason: FailureReason::StepBudgetExhausted,
                });
            }

            let min_step = 10.0 * (t.next_up() - t).abs();
            if h_abs > max_step {
                h_abs = max_step;
            } else if h_abs < min_step {
                h_abs = min_step;
            }

            let mut rejected = false;
            let mut rejections = 0;
            loop {
                if h_abs < min_step {
                    return Err(SimError::IntegrationFailure {
                        t,
                        reason: FailureReason::StepUnderflow,
                    });
                }

                let t_new = (t + h_abs).min(span.t_end);
                let h = t_new - t;
                h_abs = h.abs();

                let attempt = self.attempt(model, t, &y, &f, h)?;
                record.stats_mut().rhs_calls += 6;

                // NaN compares false, so a non-finite estimate is rejected.
                let err = self.error_norm(y.as_ref(), attempt.y_new.as_ref(), attempt.error.as_ref());
                if err < 1.0 && is_finite_state(&attempt.y_new) {
                    let mut factor = if err == 0.0 {
                        MAX_FACTOR
                    } else {
                        MAX_FACTOR.min(SAFETY * err.powf(ERROR_EXPONENT))
                    };
                    if rejected {
                        factor = factor.min(1.0);
                    }
                    h_abs *= factor;

                    t = t_new;
                    y = attempt.y_new;
                    f = attempt.f_new;
                    break;
                }

                h_abs *= MIN_FACTOR.max(SAFETY * err.powf(ERROR_EXPONENT));
                rejected = true;
                rejections += 1;
                record.stats_mut().rejected_steps += 1;
                if rejections > self.max_rejections {
                    return Err(SimError::IntegrationFailure {
                        t,
                        reason: if is_finite_state(&attempt.y_new) {
                            FailureReason::TooManyRejections
                        } else {
                            FailureReason::NonFinite
                        },
                    });
                }
            }

            step += 1;
            record.push(t, y.clone());
            let rejected_total = record.stats().rejected_steps;
            observer(progress(step, t, span, rejected_total));
        }

        Ok(record)
    }
}

/// Weighted sum `sum_j coeffs[j] * ks[j]`.
fn combine<M: TransientModel>(model: &M, ks: &[M::State], coeffs: &[f64]) -> M::State {
    let mut acc = model.scale(&ks[0], coeffs[0]);
    for (k, c) in ks.iter().zip(coeffs).skip(1) {
        if *c != 0.0 {
            acc = model.add_scaled(&acc, *c, k);
        }
    }
    acc
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    if n == 0 { 0.0 } else { (sum / n as f64).sqrt() }
}

fn is_finite_state<S: AsRef<[f64]>>(x: &S) -> bool {
    x.as_ref().iter().all(|v| v.is_finite())
}

fn progress(step: usize, t: f64, span: TimeSpan, rejected_steps: usize) -> SimProgress {
    SimProgress {
        step,
        sim_time: t,
        t_end: span.t_end,
        fraction_complete: ((t - span.t0) / span.duration()).clamp(0.0, 1.0),
        rejected_steps,
    }
}
