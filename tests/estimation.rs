//! Integration tests for the sun sensing chain.
//!
//! These tests verify:
//! - Least squares sun heading against truth
//! - Degenerate geometry handling
//! - Sunline filter convergence inside a scheduled simulation

use nalgebra::Vector3;

use orrery::dynamics::{GravityBodyConfig, Spacecraft, SpacecraftConfig};
use orrery::fsw::{CssWlsConfig, CssWlsEst, SunlineEkf, SunlineEkfConfig};
use orrery::math::{mrp, v3};
use orrery::messaging::{CssWlsStatusMsg, SunlineFilterMsg};
use orrery::sensors::{CssConstellation, CssConstellationConfig, CssHeadConfig};
use orrery::types::sec2nano;
use orrery::{SimulationContext, WarningKind};

const SIGMA_BN: [f64; 3] = [0.1, -0.25, 0.3];

fn six_heads() -> Vec<CssHeadConfig> {
    [
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ]
    .into_iter()
    .map(CssHeadConfig::along)
    .collect()
}

/// Fixed-attitude spacecraft with coarse sun sensors and both estimators.
fn build(sun_direction_n: [f64; 3], heads: Vec<CssHeadConfig>) -> SimulationContext {
    let mut sim = SimulationContext::new();
    sim.create_process("sim", 0).unwrap();
    sim.create_task("sim", "dyn_task", sec2nano(0.1), 10).unwrap();
    sim.create_task("sim", "fsw_task", sec2nano(0.5), 0).unwrap();

    let sc = Spacecraft::new(SpacecraftConfig {
        sigma_bn: SIGMA_BN,
        gravity: vec![GravityBodyConfig {
            central: true,
            ..GravityBodyConfig::point_mass("earth", 3.986_004_418e14)
        }],
        ..SpacecraftConfig::default()
    })
    .unwrap();
    sim.add_model_to_task("dyn_task", "scObject", Box::new(sc), 2)
        .unwrap();

    let mut css_config = CssConstellationConfig::new(heads);
    css_config.sun.sun_direction_n = sun_direction_n;
    let css = CssConstellation::new(css_config).unwrap();
    sim.add_model_to_task("dyn_task", "cssConstellation", Box::new(css), 1)
        .unwrap();

    let wls = CssWlsEst::new(CssWlsConfig::default()).unwrap();
    sim.add_model_to_task("fsw_task", "cssWlsEst", Box::new(wls), 1)
        .unwrap();
    let ekf = SunlineEkf::new(SunlineEkfConfig::default()).unwrap();
    sim.add_model_to_task("fsw_task", "sunlineEkf", Box::new(ekf), 0)
        .unwrap();
    sim.initialize().unwrap();
    sim
}

fn sun_body(sun_direction_n: [f64; 3]) -> Vector3<f64> {
    mrp::to_dcm(&v3(&SIGMA_BN)) * v3(&sun_direction_n).normalize()
}

#[test]
fn test_wls_matches_truth() {
    let sun_n = [0.3, 0.5, -0.8];
    let mut sim = build(sun_n, six_heads());
    sim.run_until(sec2nano(2.0)).unwrap();

    let est: CssWlsStatusMsg = sim.read_message("sim", "css_wls_est").unwrap();
    assert!(est.valid);
    assert_eq!(est.num_active, 3);
    let truth = sun_body(sun_n);
    assert!((v3(&est.sun_vector_b) - truth).norm() < 1e-12);
    assert!(est.post_fit_res.iter().all(|r| r.abs() < 1e-12));
    assert!(sim.warnings().is_empty());
}

#[test]
fn test_wls_too_few_heads_is_invalid() {
    // Only the +z head can see a sun along body +z.
    let sun_n = mrp::to_dcm(&v3(&SIGMA_BN)).transpose() * Vector3::z();
    let mut sim = build([sun_n.x, sun_n.y, sun_n.z], six_heads());
    sim.run_until(sec2nano(1.0)).unwrap();

    let est: CssWlsStatusMsg = sim.read_message("sim", "css_wls_est").unwrap();
    assert!(!est.valid);
    assert_eq!(est.num_active, 1);
    assert_eq!(est.sun_vector_b, [0.0; 3]);
    let degenerate: Vec<_> = sim
        .warnings()
        .iter()
        .filter(|w| w.tag == "cssWlsEst")
        .collect();
    assert!(!degenerate.is_empty());
    assert!(degenerate
        .iter()
        .all(|w| w.kind == WarningKind::DegenerateGeometry));
}

#[test]
fn test_sunline_filter_converges() {
    let sun_n = [0.3, 0.5, -0.8];
    let mut sim = build(sun_n, six_heads());
    sim.run_until(sec2nano(60.0)).unwrap();

    let filter: SunlineFilterMsg = sim.read_message("sim", "sunline_filter").unwrap();
    assert!(!filter.diverged);
    assert_eq!(filter.num_obs, 3);
    let heading = Vector3::new(filter.state[0], filter.state[1], filter.state[2]);
    assert!((heading.normalize() - sun_body(sun_n)).norm() < 1e-2);

    let trace: f64 = (0..6).map(|i| filter.covar[7 * i]).sum();
    assert!(trace < 0.1);
}
