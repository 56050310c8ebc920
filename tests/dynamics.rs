//! Integration tests for rigid-body dynamics and attitude math.
//!
//! These tests verify:
//! - MRP to DCM round trips and the shadow set switch
//! - Conservation of orbital and rotational invariants in free motion
//! - Agreement of the integrated orbit with the Kepler solution

use nalgebra::{Matrix3, Vector3};

use orrery::dynamics::{GravityBodyConfig, Spacecraft, SpacecraftConfig};
use orrery::math::orbital::{self, ClassicElements};
use orrery::math::{m33, mrp, v3};
use orrery::messaging::ScStatesMsg;
use orrery::types::sec2nano;
use orrery::SimulationContext;

const MU_EARTH: f64 = 3.986_004_418e14;

fn point_mass_config() -> SpacecraftConfig {
    SpacecraftConfig {
        sigma_bn: [0.1, 0.2, -0.3],
        omega_bn_b: [0.001, -0.01, 0.03],
        gravity: vec![GravityBodyConfig {
            central: true,
            ..GravityBodyConfig::point_mass("earth", MU_EARTH)
        }],
        ..SpacecraftConfig::default()
    }
}

/// Runs a lone spacecraft and returns its logged states.
fn run(config: SpacecraftConfig, period: f64, stop: f64) -> Vec<ScStatesMsg> {
    let mut sim = SimulationContext::new();
    sim.create_process("dynamics", 0).unwrap();
    sim.create_task("dynamics", "dyn_task", sec2nano(period), 0)
        .unwrap();
    let sc = Spacecraft::new(config).unwrap();
    sim.add_model_to_task("dyn_task", "scObject", Box::new(sc), 0)
        .unwrap();
    sim.log_message("dynamics", "sc_states", sec2nano(10.0))
        .unwrap();
    sim.initialize().unwrap();
    sim.configure_stop_time(sec2nano(stop));
    sim.execute().unwrap();

    sim.pull_logged_data("sc_states", None)
        .unwrap()
        .into_iter()
        .map(|row| {
            let f = |k: usize| [row[1 + 3 * k], row[2 + 3 * k], row[3 + 3 * k]];
            ScStatesMsg {
                r_bn_n: f(0),
                v_bn_n: f(1),
                r_cn_n: f(2),
                v_cn_n: f(3),
                sigma_bn: f(4),
                omega_bn_b: f(5),
                ..Default::default()
            }
        })
        .collect()
}

#[test]
fn test_mrp_dcm_round_trip() {
    for sigma in [
        Vector3::new(0.1, -0.2, 0.3),
        Vector3::new(0.5, 0.5, 0.1),
        Vector3::new(-0.9, 0.1, 0.2),
    ] {
        let back = mrp::from_dcm(&mrp::to_dcm(&sigma));
        let same = (back - sigma).norm() < 1e-12;
        let shadow = (back - mrp::shadow(&sigma)).norm() < 1e-12;
        assert!(same || shadow, "{sigma:?} -> {back:?}");
        assert!(back.norm() <= 1.0 + 1e-12);
    }

    // Shadow set describes the same attitude.
    let sigma = Vector3::new(0.8, -0.7, 0.4);
    let c1 = mrp::to_dcm(&sigma);
    let c2 = mrp::to_dcm(&mrp::shadow(&sigma));
    assert!((c1 - c2).amax() < 1e-12);
}

#[test]
fn test_free_motion_invariants() {
    let config = point_mass_config();
    let inertia: Matrix3<f64> = m33(&config.mass_props.inertia);
    let states = run(config, 0.1, 600.0);
    assert_eq!(states.len(), 61);

    let invariants = |s: &ScStatesMsg| {
        let (r, v) = (v3(&s.r_cn_n), v3(&s.v_cn_n));
        let w = v3(&s.omega_bn_b);
        let dcm_nb = mrp::to_dcm(&v3(&s.sigma_bn)).transpose();
        (
            orbital::specific_energy(MU_EARTH, &r, &v),
            r.cross(&v),
            0.5 * w.dot(&(inertia * w)),
            dcm_nb * (inertia * w),
        )
    };

    let (e0, h0, t0, l0) = invariants(&states[0]);
    for s in &states[1..] {
        let (e, h, t, l) = invariants(s);
        assert!(((e - e0) / e0).abs() < 1e-10);
        assert!((h - h0).norm() / h0.norm() < 1e-10);
        assert!(((t - t0) / t0).abs() < 1e-10);
        assert!((l - l0).norm() / l0.norm() < 1e-10);
        assert!(v3(&s.sigma_bn).norm() <= 1.0 + 1e-12);
    }
}

#[test]
fn test_orbit_matches_kepler() {
    let elements = ClassicElements {
        a: 7_500_000.0,
        e: 0.05,
        i: 0.6,
        raan: 0.3,
        argp: 1.1,
        f: 0.2,
    };
    let (r0, v0) = orbital::elem2rv(MU_EARTH, &elements);
    let config = SpacecraftConfig {
        r_bn_n: [r0.x, r0.y, r0.z],
        v_bn_n: [v0.x, v0.y, v0.z],
        ..point_mass_config()
    };
    let states = run(config, 0.1, 1200.0);

    let expected = orbital::elem2rv(MU_EARTH, &orbital::propagate(MU_EARTH, &elements, 1200.0)).0;
    let last = states.last().unwrap();
    assert!((v3(&last.r_bn_n) - expected).norm() < 1e-2);
}

#[test]
fn test_non_finite_initial_state_rejected() {
    let config = SpacecraftConfig {
        omega_bn_b: [f64::NAN, 0.0, 0.0],
        ..point_mass_config()
    };
    assert!(Spacecraft::new(config).is_err());
}
