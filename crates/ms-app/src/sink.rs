//! Visualization sinks.
//!
//! The run service never draws anything itself; it hands trajectories, the
//! sweep scatter and the fitted line to a [`VisualizationSink`]. [`CsvSink`]
//! writes them as plain CSV sections, [`NullSink`] discards them.

use std::io::Write;

use ms_sim::{MotorState, Trajectory};
use ms_sweep::{FitResult, SweepResult};

use crate::error::AppResult;

/// One cell of a trajectory grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub voltage: f64,
    pub trajectory: Trajectory<MotorState>,
}

/// Rows and columns of a trajectory grid, filled row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
}

impl GridLayout {
    /// Smallest near-square grid for `n` cells: `cols = ⌈√n⌉`, `rows = ⌈n/cols⌉`.
    pub fn for_count(n: usize) -> Self {
        if n == 0 {
            return Self { rows: 0, cols: 0 };
        }
        let mut cols = (n as f64).sqrt().ceil() as usize;
        // Correct float rounding in either direction.
        while cols * cols < n {
            cols += 1;
        }
        while cols > 1 && (cols - 1) * (cols - 1) >= n {
            cols -= 1;
        }
        Self {
            rows: n.div_ceil(cols),
            cols,
        }
    }

    /// `(row, col)` of cell `index`, or `None` past the end of the grid.
    pub fn position(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.rows * self.cols {
            return None;
        }
        Some((index / self.cols, index % self.cols))
    }
}

/// Legend text for the best-fit overlay.
pub fn fit_label(fit: &FitResult) -> String {
    format!("ω = {:.3}·V + {:.3}", fit.slope, fit.intercept)
}

/// Receiver for everything a scenario run can show.
pub trait VisualizationSink {
    /// Time series of ω and i for one integration.
    fn trajectory(&mut self, title: &str, trajectory: &Trajectory<MotorState>) -> AppResult<()>;

    /// Probed ω against V, with the fitted line when one exists.
    fn sweep(&mut self, result: &SweepResult, fit: Option<&FitResult>) -> AppResult<()>;

    /// One trajectory per swept voltage; `cells` never exceeds the layout.
    fn grid(&mut self, layout: GridLayout, cells: &[GridCell]) -> AppResult<()>;
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn trajectory(&mut self, _title: &str, _trajectory: &Trajectory<MotorState>) -> AppResult<()> {
        Ok(())
    }

    fn sweep(&mut self, _result: &SweepResult, _fit: Option<&FitResult>) -> AppResult<()> {
        Ok(())
    }

    fn grid(&mut self, _layout: GridLayout, _cells: &[GridCell]) -> AppResult<()> {
        Ok(())
    }
}

/// Writes each view as a `#`-headed CSV section.
pub struct CsvSink<W: Write> {
    out: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> VisualizationSink for CsvSink<W> {
    fn trajectory(&mut self, title: &str, trajectory: &Trajectory<MotorState>) -> AppResult<()> {
        writeln!(self.out, "# trajectory: {}", title)?;
        writeln!(self.out, "t_s,omega_rad_s,current_a")?;
        for (t, x) in trajectory.samples() {
            writeln!(self.out, "{},{},{}", t, x.omega(), x.current())?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn sweep(&mut self, result: &SweepResult, fit: Option<&FitResult>) -> AppResult<()> {
        writeln!(self.out, "# sweep: omega at t = {} s", result.probe_time)?;
        match fit {
            Some(fit) => {
                writeln!(self.out, "# fit: {}", fit_label(fit))?;
                writeln!(self.out, "voltage_v,omega_rad_s,fit_omega_rad_s")?;
            }
            None => writeln!(self.out, "voltage_v,omega_rad_s")?,
        }
        for point in &result.points {
            match fit {
                Some(fit) => writeln!(
                    self.out,
                    "{},{},{}",
                    point.voltage,
                    point.omega,
                    fit.predict(point.voltage)
                )?,
                None => writeln!(self.out, "{},{}", point.voltage, point.omega)?,
            }
        }
        for skipped in &result.skipped {
            writeln!(
                self.out,
                "# skipped: V = {} ({})",
                skipped.voltage, skipped.message
            )?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn grid(&mut self, layout: GridLayout, cells: &[GridCell]) -> AppResult<()> {
        writeln!(self.out, "# grid: {} x {}", layout.rows, layout.cols)?;
        writeln!(self.out, "row,col,voltage_v,t_s,omega_rad_s,current_a")?;
        for (index, cell) in cells.iter().enumerate() {
            let Some((row, col)) = layout.position(index) else {
                break;
            };
            for (t, x) in cell.trajectory.samples() {
                writeln!(
                    self.out,
                    "{},{},{},{},{},{}",
                    row,
                    col,
                    cell.voltage,
                    t,
                    x.omega(),
                    x.current()
                )?;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }
}
