use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ms_app::{
    AppResult, CsvSink, NullSink, RunProgressEvent, RunStage, ScenarioConfig,
    VisualizationSink, fit_label, load_scenario, run_scenario_with_progress,
};
use ms_sim::{IntegratorType, simulate};
use ms_sweep::{ProbeMethod, SweepDefinition, SweepError, SweepType, fit, sweep_voltage};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ms-cli")]
#[command(about = "Motor study CLI - DC motor transients and supply-voltage sweeps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate one motor and print the trajectory as CSV
    Simulate {
        /// Scenario YAML file (defaults to the reference motor)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Supply voltage override in volts
        #[arg(long)]
        voltage: Option<f64>,
        /// End time override in seconds
        #[arg(long)]
        t_end: Option<f64>,
        /// Use fixed-step RK4 with this step (seconds) instead of the adaptive solver
        #[arg(long)]
        rk4_dt: Option<f64>,
    },
    /// Sweep the supply voltage and fit omega against V
    Sweep {
        /// Scenario YAML file (defaults to the reference motor)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// First voltage
        #[arg(long)]
        start: Option<f64>,
        /// Last voltage
        #[arg(long)]
        end: Option<f64>,
        /// Number of voltages
        #[arg(long)]
        points: Option<usize>,
        /// Space voltages logarithmically
        #[arg(long)]
        log: bool,
        /// Time at which omega is read (seconds)
        #[arg(long)]
        probe_time: Option<f64>,
        /// Interpolate between samples instead of taking the nearest one
        #[arg(long)]
        interpolate: bool,
    },
    /// Run the full scenario: reference trajectory, sweep grid and fit
    Run {
        /// Scenario YAML file (defaults to the reference motor)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the run report as JSON instead of CSV views
        #[arg(long)]
        json: bool,
        /// Skip the per-voltage trajectory grid
        #[arg(long)]
        no_grid: bool,
    },
}

fn main() -> AppResult<()> {
    // Logs go to stderr so CSV and JSON on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            voltage,
            t_end,
            rk4_dt,
        } => cmd_simulate(config.as_deref(), voltage, t_end, rk4_dt),
        Commands::Sweep {
            config,
            start,
            end,
            points,
            log,
            probe_time,
            interpolate,
        } => {
            let mut scenario = scenario_from(config.as_deref())?;
            if let Some(start) = start {
                scenario.sweep.start = start;
            }
            if let Some(end) = end {
                scenario.sweep.end = end;
            }
            if let Some(points) = points {
                scenario.sweep.num_points = points;
            }
            if log {
                scenario.sweep.sweep_type = SweepType::Logarithmic;
            }
            if let Some(probe_time) = probe_time {
                scenario.sweep_options.probe_time = probe_time;
            }
            if interpolate {
                scenario.sweep_options.probe = ProbeMethod::Interpolated;
            }
            cmd_sweep(&scenario)
        }
        Commands::Run {
            config,
            json,
            no_grid,
        } => {
            let mut scenario = scenario_from(config.as_deref())?;
            if no_grid {
                scenario.grid = false;
            }
            cmd_run(&scenario, json)
        }
    }
}

fn scenario_from(path: Option<&Path>) -> AppResult<ScenarioConfig> {
    match path {
        Some(path) => load_scenario(path),
        None => Ok(ScenarioConfig::default()),
    }
}

fn cmd_simulate(
    config: Option<&Path>,
    voltage: Option<f64>,
    t_end: Option<f64>,
    rk4_dt: Option<f64>,
) -> AppResult<()> {
    let mut scenario = scenario_from(config)?;
    if let Some(v) = voltage {
        scenario.motor.supply_voltage = v;
    }
    if let Some(t) = t_end {
        scenario.simulation.t_end = t;
    }
    if let Some(dt) = rk4_dt {
        scenario.simulation.integrator = IntegratorType::Rk4 { dt };
    }
    scenario.validate()?;

    let traj = simulate(
        &scenario.motor,
        scenario.initial_state,
        &scenario.simulation,
    )?;
    let stats = traj.stats();
    eprintln!(
        "✓ Integrated to t = {} s: {} steps ({} rejected, {} rhs calls)",
        scenario.simulation.t_end, stats.accepted_steps, stats.rejected_steps, stats.rhs_calls
    );

    let stdout = io::stdout();
    let mut sink = CsvSink::new(stdout.lock());
    sink.trajectory(
        &format!("DC motor at {} V", scenario.motor.supply_voltage),
        &traj,
    )?;
    Ok(())
}

fn cmd_sweep(scenario: &ScenarioConfig) -> AppResult<()> {
    let definition: &SweepDefinition = &scenario.sweep;
    definition.validate()?;
    info!(sweep = %definition, probe_time = scenario.sweep_options.probe_time, "running sweep");

    let voltages = definition.generate_points();
    let result = sweep_voltage(&scenario.motor, &voltages, &scenario.sweep_options)?;

    println!("{:>12}  {:>16}", "V [V]", "omega [rad/s]");
    for point in &result.points {
        println!("{:>12.4}  {:>16.4}", point.voltage, point.omega);
    }
    for skipped in &result.skipped {
        println!("{:>12.4}  {:>16}  ({})", skipped.voltage, "skipped", skipped.message);
    }

    match fit(&result) {
        Ok(fit) => {
            println!();
            println!("{}", fit_label(&fit));
            println!("{}", fit);
        }
        Err(err @ SweepError::InsufficientData { .. }) => {
            println!();
            println!("No fit: {}", err);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn cmd_run(scenario: &ScenarioConfig, json: bool) -> AppResult<()> {
    info!(sweep = %scenario.sweep, grid = scenario.grid, json, "running scenario");
    let mut last_emit = Instant::now();
    let mut on_progress = |event: RunProgressEvent| {
        let is_sweep = matches!(event.stage, RunStage::Sweeping { .. });
        if !is_sweep || last_emit.elapsed().as_millis() >= 100 {
            render_cli_progress(&event);
            last_emit = Instant::now();
        }
    };

    let report = if json {
        run_scenario_with_progress(scenario, &mut NullSink, Some(&mut on_progress))?
    } else {
        let stdout = io::stdout();
        let mut sink = CsvSink::new(stdout.lock());
        run_scenario_with_progress(scenario, &mut sink, Some(&mut on_progress))?
    };
    clear_progress_line();

    if json {
        println!("{}", report.to_json_pretty()?);
    }

    match &report.fit {
        Some(fit) => eprintln!("✓ {} (r = {:.6})", fit_label(fit), fit.r_value),
        None => eprintln!(
            "✓ Run completed without fit: {}",
            report.fit_error.as_deref().unwrap_or("no data")
        ),
    }
    eprintln!(
        "  Timing: simulate {:.3}s, sweep {:.3}s, fit {:.3}s, total {:.3}s",
        report.timing.simulate_time_s,
        report.timing.sweep_time_s,
        report.timing.fit_time_s,
        report.timing.total_time_s
    );

    Ok(())
}

fn clear_progress_line() {
    eprint!("\r{}\r", " ".repeat(100));
    let _ = io::stderr().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match event.stage {
        RunStage::Sweeping {
            index,
            total,
            voltage,
            skipped,
        } => {
            let fraction = event.sweep_fraction().unwrap_or(0.0);
            let width = 28usize;
            let filled = ((fraction * width as f64).round() as usize).min(width);
            eprint!(
                "\r[{}{}] {:>6.2}%  point {}/{}  V={:.3}{}  elapsed={:.1}s",
                "#".repeat(filled),
                "-".repeat(width - filled),
                fraction * 100.0,
                index + 1,
                total,
                voltage,
                if skipped { " (skipped)" } else { "" },
                event.elapsed_wall_s
            );
        }
        _ => {
            clear_progress_line();
            eprint!(
                "\r{:?}: {}",
                event.stage,
                event.message.as_deref().unwrap_or("")
            );
        }
    }
    let _ = io::stderr().flush();
}
