//! Brushed DC motor: armature circuit coupled to a damped rotor.
//!
//! State is `(ω, i)`:
//!
//! ```text
//! dω/dt = (kt·i − b·ω) / J
//! di/dt = (V − R·i − ke·ω) / L
//! ```

use ms_core::units::{self, AngularVelocity, Current, Inductance, Inertia, Resistance, Voltage};
use ms_core::{ensure_finite, ensure_positive};
use nalgebra::Vector2;

use crate::error::SimResult;
use crate::model::TransientModel;
use crate::sim::{SimOptions, Trajectory, run_sim_from};

/// Physical parameters of the motor, SI units throughout.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MotorParameters {
    /// Armature resistance R (ohm)
    pub resistance: f64,
    /// Armature inductance L (henry)
    pub inductance: f64,
    /// Back-EMF constant ke (V·s/rad)
    pub back_emf_constant: f64,
    /// Torque constant kt (N·m/A)
    pub torque_constant: f64,
    /// Rotor inertia J (kg·m²)
    pub inertia: f64,
    /// Viscous damping b (N·m·s/rad)
    pub damping: f64,
    /// Supply voltage V (volt)
    pub supply_voltage: f64,
}

impl Default for MotorParameters {
    /// Small geared hobby motor driven at 6 V.
    fn default() -> Self {
        Self {
            resistance: 8.57,
            inductance: 0.1692,
            back_emf_constant: 1.624e-4,
            torque_constant: 0.67375,
            inertia: 2.7e-6,
            damping: 4e-5,
            supply_voltage: 6.0,
        }
    }
}

impl MotorParameters {
    /// Check that every field is finite and that L and J are positive.
    pub fn validate(&self) -> SimResult<()> {
        ensure_finite(self.resistance, "resistance")?;
        ensure_positive(self.inductance, "inductance")?;
        ensure_finite(self.back_emf_constant, "back_emf_constant")?;
        ensure_finite(self.torque_constant, "torque_constant")?;
        ensure_positive(self.inertia, "inertia")?;
        ensure_finite(self.damping, "damping")?;
        ensure_finite(self.supply_voltage, "supply_voltage")?;
        Ok(())
    }

    /// Copy with a different supply voltage.
    #[must_use]
    pub fn with_supply_voltage(self, volts: f64) -> Self {
        Self {
            supply_voltage: volts,
            ..self
        }
    }

    #[must_use]
    pub fn with_supply(self, supply: Voltage) -> Self {
        self.with_supply_voltage(units::si::volts(supply))
    }

    pub fn supply(&self) -> Voltage {
        units::volt(self.supply_voltage)
    }

    pub fn armature_resistance(&self) -> Resistance {
        units::ohm(self.resistance)
    }

    pub fn armature_inductance(&self) -> Inductance {
        units::henry(self.inductance)
    }

    pub fn rotor_inertia(&self) -> Inertia {
        units::kg_m2(self.inertia)
    }

    /// Equilibrium where both derivatives vanish.
    ///
    /// `ω_ss = V·kt / (R·b + ke·kt)`, `i_ss = b·ω_ss / kt`. `None` when the
    /// denominator is zero (no unique equilibrium).
    pub fn steady_state(&self) -> Option<MotorState> {
        let denom =
            self.resistance * self.damping + self.back_emf_constant * self.torque_constant;
        if denom == 0.0 || !denom.is_finite() {
            return None;
        }
        let omega = self.supply_voltage * self.torque_constant / denom;
        let current = if self.torque_constant != 0.0 {
            self.damping * omega / self.torque_constant
        } else {
            // kt = 0 decouples the rotor: ω_ss = 0 and the armature is purely resistive.
            self.supply_voltage / self.resistance
        };
        Some(MotorState::new(omega, current))
    }
}

/// Motor state `(ω [rad/s], i [A])`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorState(Vector2<f64>);

impl Default for MotorState {
    fn default() -> Self {
        Self(Vector2::zeros())
    }
}

impl MotorState {
    pub fn new(omega: f64, current: f64) -> Self {
        Self(Vector2::new(omega, current))
    }

    /// Motor at rest with no current.
    pub fn rest() -> Self {
        Self::default()
    }

    pub fn omega(&self) -> f64 {
        self.0.x
    }

    pub fn current(&self) -> f64 {
        self.0.y
    }

    pub fn angular_velocity(&self) -> AngularVelocity {
        units::rad_per_s(self.omega())
    }

    pub fn armature_current(&self) -> Current {
        units::ampere(self.current())
    }

    pub fn as_vector(&self) -> &Vector2<f64> {
        &self.0
    }
}

impl From<Vector2<f64>> for MotorState {
    fn from(v: Vector2<f64>) -> Self {
        Self(v)
    }
}

impl AsRef<[f64]> for MotorState {
    fn as_ref(&self) -> &[f64] {
        self.0.as_slice()
    }
}

/// Right-hand side of the motor ODE. `t` is unused; the system is autonomous.
pub fn derivative(_t: f64, state: &MotorState, p: &MotorParameters) -> MotorState {
    let (omega, current) = (state.omega(), state.current());
    let d_omega = (p.torque_constant * current - p.damping * omega) / p.inertia;
    let d_current =
        (p.supply_voltage - p.resistance * current - p.back_emf_constant * omega) / p.inductance;
    MotorState::new(d_omega, d_current)
}

/// DC motor as a [`TransientModel`].
///
/// Parameters are validated on construction, so the derivative is always
/// well defined.
#[derive(Clone, Debug, PartialEq)]
pub struct DcMotor {
    params: MotorParameters,
    initial: MotorState,
}

impl DcMotor {
    /// Motor starting at rest.
    pub fn new(params: MotorParameters) -> SimResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            initial: MotorState::rest(),
        })
    }

    pub fn with_initial_state(mut self, initial: MotorState) -> SimResult<Self> {
        ensure_finite(initial.omega(), "initial omega")?;
        ensure_finite(initial.current(), "initial current")?;
        self.initial = initial;
        Ok(self)
    }

    pub fn params(&self) -> &MotorParameters {
        &self.params
    }

    pub fn derivative(&self, t: f64, state: &MotorState) -> MotorState {
        derivative(t, state, &self.params)
    }
}

impl TransientModel for DcMotor {
    type State = MotorState;

    fn initial_state(&self) -> MotorState {
        self.initial
    }

    fn rhs(&self, t: f64, x: &MotorState) -> SimResult<MotorState> {
        Ok(self.derivative(t, x))
    }

    fn add(&self, a: &MotorState, b: &MotorState) -> MotorState {
        MotorState(a.0 + b.0)
    }

    fn scale(&self, a: &MotorState, scale: f64) -> MotorState {
        MotorState(a.0 * scale)
    }

    fn add_scaled(&self, a: &MotorState, scale: f64, b: &MotorState) -> MotorState {
        MotorState(a.0 + b.0 * scale)
    }
}

/// Integrate the motor from `initial` over `[0, opts.t_end]`.
pub fn simulate(
    params: &MotorParameters,
    initial: MotorState,
    opts: &SimOptions,
) -> SimResult<Trajectory<MotorState>> {
    let motor = DcMotor::new(*params)?.with_initial_state(initial)?;
    run_sim_from(&motor, initial, opts)
}

impl Trajectory<MotorState> {
    /// Angular velocity at every sample.
    pub fn omega_series(&self) -> Vec<f64> {
        self.states().iter().map(MotorState::omega).collect()
    }

    /// Armature current at every sample.
    pub fn current_series(&self) -> Vec<f64> {
        self.states().iter().map(MotorState::current).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    #[test]
    fn derivative_at_rest_is_pure_voltage_drive() {
        let p = MotorParameters::default();
        let d = derivative(0.0, &MotorState::rest(), &p);
        assert_eq!(d.omega(), 0.0);
        assert!((d.current() - 6.0 / 0.1692).abs() < 1e-12);
    }

    #[test]
    fn derivative_matches_hand_computation() {
        let p = MotorParameters {
            resistance: 2.0,
            inductance: 0.5,
            back_emf_constant: 0.1,
            torque_constant: 0.2,
            inertia: 0.01,
            damping: 0.05,
            supply_voltage: 12.0,
        };
        let d = derivative(3.0, &MotorState::new(10.0, 1.5), &p);
        // (0.2*1.5 - 0.05*10) / 0.01 = -20
        assert!((d.omega() + 20.0).abs() < 1e-12);
        // (12 - 2*1.5 - 0.1*10) / 0.5 = 16
        assert!((d.current() - 16.0).abs() < 1e-12);
    }

    #[test]
    fn derivative_vanishes_at_steady_state() {
        let p = MotorParameters::default();
        let ss = p.steady_state().unwrap();
        let d = derivative(0.0, &ss, &p);
        assert!(d.omega().abs() < 1e-6 * ss.omega());
        assert!(d.current().abs() < 1e-9);
    }

    #[test]
    fn reference_steady_state_value() {
        let ss = MotorParameters::default().steady_state().unwrap();
        let expected = 6.0 * 0.67375 / (8.57 * 4e-5 + 1.624e-4 * 0.67375);
        assert!((ss.omega() - expected).abs() < 1e-9);
        assert!((ss.omega() - 8939.3).abs() < 0.1);
        assert!((ss.current() - 4e-5 * expected / 0.67375).abs() < 1e-12);
    }

    #[test]
    fn zero_inductance_or_inertia_rejected() {
        let zero_l = MotorParameters {
            inductance: 0.0,
            ..MotorParameters::default()
        };
        assert!(matches!(
            DcMotor::new(zero_l),
            Err(SimError::InvalidParameter {
                what: "inductance",
                ..
            })
        ));

        let negative_j = MotorParameters {
            inertia: -1e-6,
            ..MotorParameters::default()
        };
        assert!(matches!(
            DcMotor::new(negative_j),
            Err(SimError::InvalidParameter { what: "inertia", .. })
        ));
    }

    #[test]
    fn non_finite_parameter_rejected() {
        let p = MotorParameters {
            resistance: f64::NAN,
            ..MotorParameters::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn with_supply_voltage_copies() {
        let base = MotorParameters::default();
        let swept = base.with_supply_voltage(9.5);
        assert_eq!(base.supply_voltage, 6.0);
        assert_eq!(swept.supply_voltage, 9.5);
        assert_eq!(swept.resistance, base.resistance);
        assert_eq!(base.with_supply(units::volt(3.0)).supply_voltage, 3.0);
        assert_eq!(units::si::ohms(base.armature_resistance()), 8.57);
        assert!((units::si::henries(base.armature_inductance()) - 0.1692).abs() < 1e-15);
        assert!((units::si::kg_m2(base.rotor_inertia()) - 2.7e-6).abs() < 1e-20);
    }

    #[test]
    fn state_accessors() {
        let s = MotorState::new(12.5, 0.25);
        assert_eq!(s.as_ref(), &[12.5, 0.25]);
        assert_eq!(units::si::rad_per_s(s.angular_velocity()), 12.5);
        assert_eq!(units::si::amperes(s.armature_current()), 0.25);
    }

    #[test]
    fn no_unique_equilibrium_without_losses() {
        let p = MotorParameters {
            damping: 0.0,
            back_emf_constant: 0.0,
            ..MotorParameters::default()
        };
        assert!(p.steady_state().is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn steady_state_is_an_equilibrium(volts in -24.0_f64..24.0, damping in 1e-6_f64..1e-3) {
            let p = MotorParameters {
                damping,
                ..MotorParameters::default()
            }
            .with_supply_voltage(volts);
            let ss = p.steady_state().unwrap();
            let d = derivative(0.0, &ss, &p);
            // Residuals are rounding noise relative to the terms that cancel.
            let omega_terms = (p.torque_constant * ss.current()).abs() / p.inertia + 1.0;
            let current_terms = volts.abs() / p.inductance + 1.0;
            prop_assert!(d.omega().abs() <= 1e-9 * omega_terms);
            prop_assert!(d.current().abs() <= 1e-9 * current_terms);
        }

        #[test]
        fn derivative_is_linear_in_state(w in -1e4_f64..1e4, i in -10.0_f64..10.0) {
            let p = MotorParameters::default().with_supply_voltage(0.0);
            let d1 = derivative(0.0, &MotorState::new(w, i), &p);
            let d2 = derivative(0.0, &MotorState::new(2.0 * w, 2.0 * i), &p);
            prop_assert!((d2.omega() - 2.0 * d1.omega()).abs() <= 1e-9 * (1.0 + d2.omega().abs()));
            prop_assert!((d2.current() - 2.0 * d1.current()).abs() <= 1e-9 * (1.0 + d2.current().abs()));
        }
    }
}
