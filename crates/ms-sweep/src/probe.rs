//! Reading a trajectory at a probe time.

use ms_sim::{MotorState, Trajectory};

/// How the observable is read from a trajectory at the probe time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ProbeMethod {
    /// Sample closest in time; the earlier sample wins a tie.
    #[default]
    Nearest,
    /// Linear interpolation between the samples bracketing the probe time.
    Interpolated,
}

/// Angular velocity at `t`.
///
/// Probe times outside the trajectory clamp to its first or last sample.
/// Returns `None` only for an empty trajectory.
pub fn probe_omega(traj: &Trajectory<MotorState>, t: f64, method: ProbeMethod) -> Option<f64> {
    match method {
        ProbeMethod::Nearest => traj
            .nearest_index(t)
            .map(|idx| traj.states()[idx].omega()),
        ProbeMethod::Interpolated => interpolate(traj, t),
    }
}

fn interpolate(traj: &Trajectory<MotorState>, t: f64) -> Option<f64> {
    let times = traj.times();
    let states = traj.states();
    let first = *times.first()?;

    if t <= first {
        return Some(states[0].omega());
    }
    // First sample at or after t.
    let hi = times.partition_point(|ti| *ti < t);
    if hi == times.len() {
        return states.last().map(MotorState::omega);
    }
    if times[hi] == t {
        return Some(states[hi].omega());
    }
    let lo = hi - 1;
    let (t0, t1) = (times[lo], times[hi]);
    let (w0, w1) = (states[lo].omega(), states[hi].omega());
    let frac = (t - t0) / (t1 - t0);
    Some(w0 + frac * (w1 - w0))
}
