//! Scenario execution: reference trajectory, voltage sweep, fit.

use std::time::Instant;

use ms_sim::{MotorState, Trajectory, simulate};
use ms_sweep::{FitResult, SweepError, SweepResult, fit, sweep_voltage_observed};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::progress::{RunProgressEvent, RunStage};
use crate::scenario::ScenarioConfig;
use crate::sink::{GridCell, GridLayout, VisualizationSink};

/// Wall-clock time spent in each phase of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunTimingSummary {
    pub simulate_time_s: f64,
    pub sweep_time_s: f64,
    pub fit_time_s: f64,
    pub total_time_s: f64,
}

/// Outcome of the reference trajectory.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSummary {
    pub supply_voltage: f64,
    pub t_end: f64,
    pub final_omega: f64,
    pub final_current: f64,
    /// Analytic equilibrium ω, when one exists
    pub steady_state_omega: Option<f64>,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_calls: usize,
}

impl ReferenceSummary {
    fn from_trajectory(config: &ScenarioConfig, traj: &Trajectory<MotorState>) -> Self {
        let (t_end, last) = traj
            .last()
            .map(|(t, x)| (t, *x))
            .unwrap_or((0.0, config.initial_state));
        let stats = traj.stats();
        Self {
            supply_voltage: config.motor.supply_voltage,
            t_end,
            final_omega: last.omega(),
            final_current: last.current(),
            steady_state_omega: config.motor.steady_state().map(|s| s.omega()),
            accepted_steps: stats.accepted_steps,
            rejected_steps: stats.rejected_steps,
            rhs_calls: stats.rhs_calls,
        }
    }
}

/// Everything a scenario run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub reference: ReferenceSummary,
    pub sweep: SweepResult,
    /// `None` when the sweep had too few distinct voltages to fit
    pub fit: Option<FitResult>,
    pub fit_error: Option<String>,
    pub timing: RunTimingSummary,
}

impl RunReport {
    pub fn to_json_pretty(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent::stage(
            stage,
            started.elapsed().as_secs_f64(),
            message,
        ));
    }
}

/// Run a scenario, sending every view to `sink`.
pub fn run_scenario(
    config: &ScenarioConfig,
    sink: &mut dyn VisualizationSink,
) -> AppResult<RunReport> {
    run_scenario_with_progress(config, sink, None)
}

/// Run a scenario and stream progress events.
pub fn run_scenario_with_progress(
    config: &ScenarioConfig,
    sink: &mut dyn VisualizationSink,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunReport> {
    let started = Instant::now();
    let mut timing = RunTimingSummary::default();
    config.validate()?;

    emit_progress(
        &mut progress_cb,
        RunStage::Simulating,
        started,
        Some(format!(
            "Simulating reference motor at {} V",
            config.motor.supply_voltage
        )),
    );
    let phase = Instant::now();
    let traj = simulate(&config.motor, config.initial_state, &config.simulation)?;
    timing.simulate_time_s = phase.elapsed().as_secs_f64();
    let reference = ReferenceSummary::from_trajectory(config, &traj);
    info!(
        voltage = reference.supply_voltage,
        final_omega = reference.final_omega,
        steps = reference.accepted_steps,
        "reference trajectory done"
    );
    sink.trajectory(
        &format!("DC motor at {} V", config.motor.supply_voltage),
        &traj,
    )?;

    let voltages = config.sweep.generate_points();
    let total = voltages.len();
    let keep_cells = config.grid;
    let mut cells: Vec<GridCell> = Vec::new();
    let phase = Instant::now();
    let mut on_point = |index: usize, voltage: f64, point_traj: Option<&Trajectory<MotorState>>| {
        emit_progress(
            &mut progress_cb,
            RunStage::Sweeping {
                index,
                total,
                voltage,
                skipped: point_traj.is_none(),
            },
            started,
            None,
        );
        if let (true, Some(traj)) = (keep_cells, point_traj) {
            cells.push(GridCell {
                voltage,
                trajectory: traj.clone(),
            });
        }
    };
    let sweep = sweep_voltage_observed(
        &config.motor,
        &voltages,
        &config.sweep_options,
        Some(&mut on_point),
    )?;
    timing.sweep_time_s = phase.elapsed().as_secs_f64();

    if keep_cells {
        sink.grid(GridLayout::for_count(cells.len()), &cells)?;
    }

    emit_progress(
        &mut progress_cb,
        RunStage::Fitting,
        started,
        Some(format!("Fitting {} sweep points", sweep.len())),
    );
    let phase = Instant::now();
    let (fit_result, fit_error) = match fit(&sweep) {
        Ok(result) => {
            info!(
                slope = result.slope,
                intercept = result.intercept,
                r = result.r_value,
                "linear fit"
            );
            (Some(result), None)
        }
        Err(err @ SweepError::InsufficientData { .. }) => {
            warn!(error = %err, "sweep cannot be fitted");
            (None, Some(err.to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    timing.fit_time_s = phase.elapsed().as_secs_f64();
    sink.sweep(&sweep, fit_result.as_ref())?;

    timing.total_time_s = started.elapsed().as_secs_f64();
    emit_progress(&mut progress_cb, RunStage::Completed, started, None);

    Ok(RunReport {
        reference,
        sweep,
        fit: fit_result,
        fit_error,
        timing,
    })
}
