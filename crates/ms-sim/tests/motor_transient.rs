//! Integration test: DC motor spin-up from rest.
//!
//! Checks the transient against the analytic equilibrium
//! ω_ss = V·kt / (R·b + ke·kt) and the qualitative shape of the response.

use ms_sim::{
    DcMotor, IntegratorType, MotorParameters, MotorState, SimError, SimOptions, run_sim,
    run_sim_with_progress, SimProgress, simulate,
};

fn reference_options() -> SimOptions {
    SimOptions {
        t_end: 1.0,
        rtol: 1e-6,
        atol: 1e-8,
        ..SimOptions::default()
    }
}

#[test]
fn reference_scenario_reaches_steady_state_within_one_percent() {
    let params = MotorParameters::default();
    let traj = simulate(&params, MotorState::rest(), &reference_options()).unwrap();

    let omega_ss = 6.0 * 0.67375 / (8.57 * 4e-5 + 1.624e-4 * 0.67375);
    let (t_final, x_final) = traj.last().unwrap();

    assert_eq!(t_final, 1.0);
    assert_eq!(traj.times()[0], 0.0);
    assert!(
        ((x_final.omega() - omega_ss) / omega_ss).abs() < 0.01,
        "final omega {} vs steady state {}",
        x_final.omega(),
        omega_ss
    );
}

#[test]
fn zero_voltage_from_rest_stays_at_rest() {
    let params = MotorParameters::default().with_supply_voltage(0.0);
    let traj = simulate(&params, MotorState::rest(), &reference_options()).unwrap();

    assert!(traj.len() > 1);
    for (_, x) in traj.samples() {
        assert_eq!(x.omega(), 0.0);
        assert_eq!(x.current(), 0.0);
    }
    assert_eq!(traj.stats().rejected_steps, 0);
}

#[test]
fn omega_rises_monotonically_during_spin_up() {
    let params = MotorParameters::default();
    let opts = reference_options().with_t_end(0.3);
    let traj = simulate(&params, MotorState::rest(), &opts).unwrap();

    let omega = traj.omega_series();
    assert_eq!(omega[0], 0.0);
    assert!(
        omega.windows(2).all(|w| w[1] >= w[0]),
        "omega must not decrease while spinning up"
    );
    let omega_ss = params.steady_state().unwrap().omega();
    assert!(omega.iter().all(|w| *w < omega_ss));
}

#[test]
fn long_run_converges_to_analytic_equilibrium() {
    let params = MotorParameters::default().with_supply_voltage(8.0);
    let ss = params.steady_state().unwrap();
    let traj = simulate(&params, MotorState::rest(), &reference_options().with_t_end(5.0)).unwrap();
    let (_, x) = traj.last().unwrap();

    assert!(((x.omega() - ss.omega()) / ss.omega()).abs() < 1e-4);
    assert!(((x.current() - ss.current()) / ss.current()).abs() < 1e-4);
}

#[test]
fn fixed_step_rk4_agrees_with_adaptive_solution() {
    let params = MotorParameters::default();
    let adaptive = simulate(&params, MotorState::rest(), &reference_options()).unwrap();
    let fixed = simulate(
        &params,
        MotorState::rest(),
        &SimOptions {
            integrator: IntegratorType::Rk4 { dt: 1e-3 },
            ..reference_options()
        },
    )
    .unwrap();

    assert_eq!(fixed.len(), 1001);
    let a = adaptive.last().unwrap().1.omega();
    let f = fixed.last().unwrap().1.omega();
    assert!(((a - f) / a).abs() < 1e-5);
}

#[test]
fn repeated_runs_are_bit_identical() {
    let motor = DcMotor::new(MotorParameters::default()).unwrap();
    let first = run_sim(&motor, &reference_options()).unwrap();
    let second = run_sim(&motor, &reference_options()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn progress_callback_tracks_accepted_steps() {
    let motor = DcMotor::new(MotorParameters::default()).unwrap();
    let mut last_fraction = 0.0;
    let mut calls = 0;
    let traj = run_sim_with_progress(
        &motor,
        MotorState::rest(),
        &reference_options(),
        Some(&mut |p: SimProgress| {
            assert!(p.fraction_complete >= last_fraction);
            last_fraction = p.fraction_complete;
            calls += 1;
        }),
    )
    .unwrap();

    assert_eq!(calls, traj.stats().accepted_steps);
    assert_eq!(last_fraction, 1.0);
}

#[test]
fn reference_run_records_only_accepted_steps() {
    let traj = simulate(
        &MotorParameters::default(),
        MotorState::rest(),
        &reference_options(),
    )
    .unwrap();
    let stats = traj.stats();

    assert!(stats.rejected_steps > 0, "stats: {stats:?}");
    assert_eq!(traj.len(), stats.accepted_steps + 1);
    // initial derivative, initial step estimate, six evaluations per attempt
    assert_eq!(
        stats.rhs_calls,
        2 + 6 * (stats.accepted_steps + stats.rejected_steps)
    );
    assert!(traj.times().windows(2).all(|w| w[1] > w[0]));
    assert_eq!(*traj.times().last().unwrap(), 1.0);
}

#[test]
fn invalid_parameters_fail_before_integration() {
    let params = MotorParameters {
        inertia: 0.0,
        ..MotorParameters::default()
    };
    let err = simulate(&params, MotorState::rest(), &reference_options()).unwrap_err();
    assert!(matches!(err, SimError::InvalidParameter { what: "inertia", .. }));
}

#[test]
fn tiny_step_budget_fails_loudly() {
    let params = MotorParameters::default();
    let opts = SimOptions {
        max_steps: 5,
        ..reference_options()
    };
    let err = simulate(&params, MotorState::rest(), &opts).unwrap_err();
    assert!(matches!(err, SimError::IntegrationFailure { .. }));
}
