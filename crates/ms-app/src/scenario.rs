//! Scenario configuration: everything one run needs, loadable from YAML.

use std::path::Path;

use ms_sim::{MotorParameters, MotorState, SimOptions};
use ms_sweep::{SweepDefinition, SweepOptions};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Full description of a motor study run.
///
/// Every field has a default, so a YAML file only needs the values it
/// changes:
///
/// ```yaml
/// motor:
///   supply_voltage: 12.0
/// sweep:
///   start: 1.0
///   end: 24.0
///   num_points: 24
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Motor for the reference trajectory; the sweep overrides its supply voltage.
    pub motor: MotorParameters,
    /// State the reference trajectory starts from.
    pub initial_state: MotorState,
    /// Solver settings for the reference trajectory.
    pub simulation: SimOptions,
    /// Swept supply voltages.
    pub sweep: SweepDefinition,
    /// Probe, span and solver settings for every sweep point.
    pub sweep_options: SweepOptions,
    /// Keep every sweep trajectory and hand them to the sink as a grid.
    pub grid: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            motor: MotorParameters::default(),
            initial_state: MotorState::rest(),
            simulation: SimOptions::default(),
            sweep: SweepDefinition::default(),
            sweep_options: SweepOptions::default(),
            grid: true,
        }
    }
}

impl ScenarioConfig {
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let config: ScenarioConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> AppResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AppError::Scenario(format!("Failed to serialize scenario: {}", e)))
    }

    /// Check the parts that can be checked without integrating.
    pub fn validate(&self) -> AppResult<()> {
        self.motor.validate()?;
        self.sweep.validate()?;
        self.sweep_options.validate()?;
        if !(self.simulation.t_end.is_finite() && self.simulation.t_end > 0.0) {
            return Err(AppError::Scenario(format!(
                "simulation.t_end must be positive, got {}",
                self.simulation.t_end
            )));
        }
        Ok(())
    }
}

/// Load and validate a scenario from a YAML file.
pub fn load_scenario(path: &Path) -> AppResult<ScenarioConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ScenarioFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    ScenarioConfig::from_yaml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_sim::IntegratorType;
    use ms_sweep::{ProbeMethod, SweepType};

    #[test]
    fn empty_document_gives_defaults() {
        let config = ScenarioConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.motor.supply_voltage, 6.0);
        assert_eq!(config.sweep.num_points, 100);
        assert_eq!(config.sweep_options.probe_time, 1.0);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let yaml = r#"
motor:
  supply_voltage: 12
  damping: 5.0e-5
simulation:
  t_end: 0.5
  integrator:
    method: rk4
    dt: 0.001
sweep:
  start: 2
  end: 20
  num_points: 10
  sweep_type: logarithmic
sweep_options:
  probe_time: 0.75
  probe: interpolated
grid: false
"#;
        let config = ScenarioConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.motor.supply_voltage, 12.0);
        assert_eq!(config.motor.damping, 5e-5);
        assert_eq!(config.motor.resistance, 8.57);
        assert_eq!(config.simulation.t_end, 0.5);
        assert_eq!(config.simulation.integrator, IntegratorType::Rk4 { dt: 0.001 });
        assert_eq!(config.simulation.rtol, 1e-6);
        assert_eq!(config.sweep.sweep_type, SweepType::Logarithmic);
        assert_eq!(config.sweep.num_points, 10);
        assert_eq!(config.sweep_options.probe_time, 0.75);
        assert_eq!(config.sweep_options.probe, ProbeMethod::Interpolated);
        assert!(!config.grid);
    }

    #[test]
    fn yaml_round_trip_preserves_config() {
        let mut config = ScenarioConfig::default();
        config.motor.supply_voltage = 9.0;
        config.sweep_options.t_end = Some(2.0);
        let text = config.to_yaml_string().unwrap();
        assert_eq!(ScenarioConfig::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn invalid_motor_is_rejected_on_load() {
        let err = ScenarioConfig::from_yaml_str("motor:\n  inertia: 0.0\n").unwrap_err();
        assert!(matches!(err, AppError::Simulation(_)));
    }

    #[test]
    fn invalid_sweep_is_rejected_on_load() {
        let yaml = "sweep:\n  start: 0.0\n  sweep_type: logarithmic\n";
        assert!(matches!(
            ScenarioConfig::from_yaml_str(yaml),
            Err(AppError::Sweep(_))
        ));
    }

    #[test]
    fn malformed_yaml_is_a_scenario_error() {
        assert!(matches!(
            ScenarioConfig::from_yaml_str("motor: [1, 2"),
            Err(AppError::Scenario(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_scenario(Path::new("/nonexistent/scenario.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/scenario.yaml"));
    }
}
