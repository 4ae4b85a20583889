/// Phase of a scenario run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStage {
    /// Integrating the reference trajectory.
    Simulating,
    /// Finished the sweep point `index` of `total`, successfully or not.
    Sweeping {
        index: usize,
        total: usize,
        voltage: f64,
        skipped: bool,
    },
    Fitting,
    Completed,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
        }
    }

    /// Fraction of the sweep completed, when the event belongs to the sweep.
    pub fn sweep_fraction(&self) -> Option<f64> {
        match self.stage {
            RunStage::Sweeping { index, total, .. } if total > 0 => {
                Some((index + 1) as f64 / total as f64)
            }
            _ => None,
        }
    }
}
