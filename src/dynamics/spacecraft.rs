//! Six degree of freedom rigid spacecraft.
//!
//! The integrated state is the center of mass position and velocity relative
//! to the central gravity body, the MRP attitude `σ_BN` and the body rate
//! `ω_BN`. Each update integrates from the previous update time to the
//! current one and publishes [`ScStatesMsg`]. Positions published as
//! `r_bn_n` refer to the body point B; `r_cn_n` is the center of mass.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::dynamics::effector::{
    DynamicEffector, ExtForceTorque, ExtForceTorqueConfig, ForceTorque, ThrusterSet,
    ThrusterSetConfig,
};
use crate::dynamics::gravity::{GravityBodyConfig, GravityField};
use crate::dynamics::integrator::IntegratorKind;
use crate::dynamics::state::{MassProperties, MassPropertiesConfig, RigidBodyState, StateVector};
use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, mrp, v3};
use crate::messaging::{MessageId, ScStatesMsg, SpicePlanetStateMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::{nano2sec, SimTime};

fn default_state_msg() -> String {
    "sc_states".to_string()
}

/// Spacecraft configuration. Initial conditions refer to the body point B.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpacecraftConfig {
    #[serde(default)]
    pub mass_props: MassPropertiesConfig,
    pub r_bn_n: [f64; 3],
    pub v_bn_n: [f64; 3],
    #[serde(default)]
    pub sigma_bn: [f64; 3],
    #[serde(default)]
    pub omega_bn_b: [f64; 3],
    pub gravity: Vec<GravityBodyConfig>,
    #[serde(default)]
    pub integrator: IntegratorKind,
    #[serde(default = "default_state_msg")]
    pub state_msg: String,
    #[serde(default)]
    pub ext_force_torque: Option<ExtForceTorqueConfig>,
    #[serde(default)]
    pub thrusters: Option<ThrusterSetConfig>,
}

impl Default for SpacecraftConfig {
    fn default() -> Self {
        Self {
            mass_props: MassPropertiesConfig::default(),
            r_bn_n: [7_000_000.0, 0.0, 0.0],
            v_bn_n: [0.0, 7_546.05, 0.0],
            sigma_bn: [0.0; 3],
            omega_bn_b: [0.0; 3],
            gravity: vec![GravityBodyConfig::earth()],
            integrator: IntegratorKind::default(),
            state_msg: default_state_msg(),
            ext_force_torque: None,
            thrusters: None,
        }
    }
}

pub struct Spacecraft {
    config: SpacecraftConfig,
    props: MassProperties,
    gravity: GravityField,
    effectors: Vec<Box<dyn DynamicEffector>>,
    ephemeris_ids: Vec<Option<MessageId>>,
    state_id: Option<MessageId>,

    state: RigidBodyState,
    last_time: Option<SimTime>,
    omega_dot_b: Vector3<f64>,
    non_conservative_b: Vector3<f64>,
    accum_dv_b: Vector3<f64>,
}

impl Spacecraft {
    /// Validates the configuration and builds the configured effectors.
    pub fn new(config: SpacecraftConfig) -> ModelResult<Self> {
        let props = MassProperties::new(&config.mass_props)?;
        let gravity = GravityField::new(config.gravity.clone())?;
        for (field, v) in [
            ("r_bn_n", &config.r_bn_n),
            ("v_bn_n", &config.v_bn_n),
            ("sigma_bn", &config.sigma_bn),
            ("omega_bn_b", &config.omega_bn_b),
        ] {
            if v.iter().any(|x| !x.is_finite()) {
                return Err(ModelError::config(field, "non-finite initial condition"));
            }
        }

        let mut effectors: Vec<Box<dyn DynamicEffector>> = Vec::new();
        if let Some(eft) = &config.ext_force_torque {
            effectors.push(Box::new(ExtForceTorque::new(eft.clone())));
        }
        if let Some(thr) = &config.thrusters {
            effectors.push(Box::new(ThrusterSet::new(thr.clone())?));
        }

        let n_bodies = config.gravity.len();
        let mut sc = Self {
            state: RigidBodyState {
                r_cn_n: Vector3::zeros(),
                v_cn_n: Vector3::zeros(),
                sigma_bn: Vector3::zeros(),
                omega_bn_b: Vector3::zeros(),
            },
            config,
            props,
            gravity,
            effectors,
            ephemeris_ids: vec![None; n_bodies],
            state_id: None,
            last_time: None,
            omega_dot_b: Vector3::zeros(),
            non_conservative_b: Vector3::zeros(),
            accum_dv_b: Vector3::zeros(),
        };
        sc.state = sc.initial_state();
        Ok(sc)
    }

    /// Attaches an additional effector before initialization.
    pub fn add_effector(&mut self, effector: Box<dyn DynamicEffector>) {
        self.effectors.push(effector);
    }

    pub fn state(&self) -> &RigidBodyState {
        &self.state
    }

    pub fn mass_properties(&self) -> &MassProperties {
        &self.props
    }

    pub fn gravity(&self) -> &GravityField {
        &self.gravity
    }

    fn initial_state(&self) -> RigidBodyState {
        let sigma = mrp::switch(&v3(&self.config.sigma_bn));
        let omega = v3(&self.config.omega_bn_b);
        let dcm_nb = mrp::to_dcm(&sigma).transpose();
        let r_bc = self.props.r_bcb_b;
        RigidBodyState {
            r_cn_n: v3(&self.config.r_bn_n) + dcm_nb * r_bc,
            v_cn_n: v3(&self.config.v_bn_n) + dcm_nb * omega.cross(&r_bc),
            sigma_bn: sigma,
            omega_bn_b: omega,
        }
    }

    /// Derivative of the packed state under a constant effector load.
    fn derivative(&self, y: &StateVector, load: &ForceTorque) -> StateVector {
        let s = RigidBodyState::from_vector(y);
        let dcm_nb = mrp::to_dcm(&s.sigma_bn).transpose();
        let inertia = &self.props.inertia_c;

        let accel = self.gravity.acceleration(&s.r_cn_n)
            + (load.force_n + dcm_nb * load.force_b) / self.props.mass;
        let sigma_dot = mrp::rate(&s.sigma_bn, &s.omega_bn_b);
        let omega_dot = self.props.inertia_inv
            * (load.torque_b - s.omega_bn_b.cross(&(inertia * s.omega_bn_b)));

        RigidBodyState {
            r_cn_n: s.v_cn_n,
            v_cn_n: accel,
            sigma_bn: sigma_dot,
            omega_bn_b: omega_dot,
        }
        .to_vector()
    }

    fn total_load(&self, dt: f64) -> ForceTorque {
        let mut load = ForceTorque::default();
        for eff in &self.effectors {
            load += eff.force_torque(&self.state, &self.props, dt);
        }
        load
    }

    fn read_ephemerides(&mut self, ctx: &ModelContext<'_>) -> ModelResult<()> {
        if self.ephemeris_ids.iter().all(Option::is_none) {
            return Ok(());
        }
        let mut positions = Vec::with_capacity(self.ephemeris_ids.len());
        for (id, body) in self.ephemeris_ids.iter().zip(self.gravity.bodies()) {
            let ephemeris = match id {
                Some(id) => Some(ctx.read_with_header::<SpicePlanetStateMsg>(*id)?),
                None => None,
            };
            // Until the ephemeris has a visible write the configured position holds.
            positions.push(match ephemeris {
                Some((msg, header)) if header.is_written() => v3(&msg.position_vector),
                _ => v3(&body.position),
            });
        }
        self.gravity.set_positions(&positions);
        Ok(())
    }

    fn integrate(&mut self, t0: f64, dt: f64) -> ModelResult<()> {
        let load = self.total_load(dt);
        let dcm_bn = mrp::to_dcm(&self.state.sigma_bn);
        self.non_conservative_b =
            (dcm_bn * load.force_n + load.force_b) / self.props.mass;

        let y0 = self.state.to_vector();
        let y1 = self
            .config
            .integrator
            .step(t0, &y0, dt, |_, y| self.derivative(y, &load));

        let mut next = RigidBodyState::from_vector(&y1);
        if !next.is_finite() {
            return Err(ModelError::NonFinite("spacecraft state".to_string()));
        }
        next.sigma_bn = mrp::switch(&next.sigma_bn);

        self.accum_dv_b += self.non_conservative_b * dt;
        self.state = next;
        let d = self.derivative(&y1, &load);
        self.omega_dot_b = d.fixed_rows::<3>(9).into_owned();

        for eff in &mut self.effectors {
            eff.advance(dt);
        }
        Ok(())
    }

    fn publish(&self, ctx: &mut ModelContext<'_>) -> ModelResult<()> {
        let Some(id) = self.state_id else {
            return Ok(());
        };
        let s = &self.state;
        let dcm_nb = s.dcm_nb();
        let r_bc = self.props.r_bcb_b;
        let msg = ScStatesMsg {
            r_bn_n: arr3(&(s.r_cn_n - dcm_nb * r_bc)),
            v_bn_n: arr3(&(s.v_cn_n - dcm_nb * s.omega_bn_b.cross(&r_bc))),
            r_cn_n: arr3(&s.r_cn_n),
            v_cn_n: arr3(&s.v_cn_n),
            sigma_bn: arr3(&s.sigma_bn),
            omega_bn_b: arr3(&s.omega_bn_b),
            omega_dot_bn_b: arr3(&self.omega_dot_b),
            total_accum_dv_bn_b: arr3(&self.accum_dv_b),
            non_conservative_accel_b: arr3(&self.non_conservative_b),
        };
        ctx.write(id, &msg)
    }

    /// Orbital angular momentum per unit mass of the center of mass.
    pub fn orbital_angular_momentum(&self) -> Vector3<f64> {
        self.state.r_cn_n.cross(&self.state.v_cn_n)
    }

    /// Orbital energy per unit mass of the center of mass.
    pub fn orbital_energy(&self) -> f64 {
        self.state.v_cn_n.norm_squared() / 2.0 + self.gravity.central_potential(&self.state.r_cn_n)
    }

    /// Rotational kinetic energy [J].
    pub fn rotational_energy(&self) -> f64 {
        let w = self.state.omega_bn_b;
        0.5 * w.dot(&(self.props.inertia_c * w))
    }

    /// Rotational angular momentum about the center of mass, inertial [N m s].
    pub fn rotational_angular_momentum(&self) -> Vector3<f64> {
        let h_b: Vector3<f64> = self.props.inertia_c * self.state.omega_bn_b;
        let dcm_nb: Matrix3<f64> = self.state.dcm_nb();
        dcm_nb * h_b
    }
}

impl Model for Spacecraft {
    fn kind(&self) -> ModelKind {
        ModelKind::Dynamics
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.state_id = Some(ctx.create::<ScStatesMsg>(&self.config.state_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        for (slot, body) in self.ephemeris_ids.iter_mut().zip(&self.config.gravity) {
            *slot = ctx.subscribe_optional::<SpicePlanetStateMsg>(&body.ephemeris_msg)?;
        }
        for eff in &mut self.effectors {
            eff.link(ctx)?;
        }
        Ok(())
    }

    fn reset(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        self.state = self.initial_state();
        self.last_time = Some(time);
        self.omega_dot_b = Vector3::zeros();
        self.non_conservative_b = Vector3::zeros();
        self.accum_dv_b = Vector3::zeros();
        for eff in &mut self.effectors {
            eff.reset();
        }
        self.publish(ctx)
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        let last = self.last_time.unwrap_or(time);
        let dt = nano2sec(time.saturating_sub(last));

        self.read_ephemerides(ctx)?;
        for eff in &mut self.effectors {
            eff.read_inputs(ctx)?;
        }
        if dt > 0.0 {
            self.integrate(nano2sec(last), dt)?;
        }
        self.last_time = Some(time);
        tracing::trace!(module = ctx.tag(), time_ns = time, "spacecraft propagated");
        self.publish(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::orbital;
    use crate::model::ModelHarness;
    use crate::types::sec2nano;

    fn point_mass_config() -> SpacecraftConfig {
        SpacecraftConfig {
            gravity: vec![GravityBodyConfig::point_mass("earth", 3.986_004_415e14).as_central()],
            omega_bn_b: [0.001, -0.002, 0.003],
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_non_spd_inertia() {
        let mut config = SpacecraftConfig::default();
        config.mass_props.inertia = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0];
        assert!(matches!(
            Spacecraft::new(config),
            Err(ModelError::Config { ref field, .. }) if field == "inertia"
        ));
    }

    #[test]
    fn test_conserves_energy_and_momentum_over_one_orbit() {
        let config = point_mass_config();
        let mut sc = Spacecraft::new(config).unwrap();
        let mut harness = ModelHarness::new("sc");
        harness.init(&mut sc).unwrap();
        harness.reset(&mut sc, 0).unwrap();

        let e0 = sc.orbital_energy();
        let h0 = sc.orbital_angular_momentum();
        let rot_e0 = sc.rotational_energy();
        let rot_h0 = sc.rotational_angular_momentum();

        let mu = sc.gravity().central().mu;
        let period = orbital::period(mu, 7_000_000.0);
        let step = sec2nano(1.0);
        let steps = period.ceil() as u64;
        for k in 1..=steps {
            harness.update(&mut sc, k * step).unwrap();
        }

        assert!(((sc.orbital_energy() - e0) / e0).abs() < 1e-9);
        assert!((sc.orbital_angular_momentum() - h0).norm() / h0.norm() < 1e-9);
        assert!(((sc.rotational_energy() - rot_e0) / rot_e0).abs() < 1e-8);
        assert!((sc.rotational_angular_momentum() - rot_h0).norm() / rot_h0.norm() < 1e-8);
        assert!(sc.state().sigma_bn.norm() <= 1.0);
    }

    #[test]
    fn test_publishes_body_point_state() {
        let mut config = point_mass_config();
        config.mass_props.com_offset = [0.0, 0.0, 1.0];
        let mut sc = Spacecraft::new(config.clone()).unwrap();
        let mut harness = ModelHarness::new("sc");
        harness.init(&mut sc).unwrap();
        harness.reset(&mut sc, 0).unwrap();

        let msg: ScStatesMsg = harness.read("sc_states", 0).unwrap();
        assert_eq!(msg.r_bn_n, config.r_bn_n);
        assert!((msg.r_cn_n[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_state_is_fatal() {
        let mut config = point_mass_config();
        // Starting at the attracting center makes gravity singular.
        config.r_bn_n = [0.0; 3];
        let mut sc = Spacecraft::new(config).unwrap();
        let mut harness = ModelHarness::new("sc");
        harness.init(&mut sc).unwrap();
        harness.reset(&mut sc, 0).unwrap();
        let err = harness.update(&mut sc, sec2nano(1.0)).unwrap_err();
        assert!(matches!(err, ModelError::NonFinite(_)));
    }

    #[test]
    fn test_unwritten_ephemeris_keeps_configured_position() {
        let moon = GravityBodyConfig {
            position: [3.844e8, 0.0, 0.0],
            ..GravityBodyConfig::moon()
        };
        let fixed = SpacecraftConfig {
            gravity: vec![
                GravityBodyConfig::point_mass("earth", 3.986_004_415e14).as_central(),
                moon.clone(),
            ],
            ..point_mass_config()
        };
        let linked = SpacecraftConfig {
            gravity: vec![fixed.gravity[0].clone(), moon.with_ephemeris("moon_planet_data")],
            ..fixed.clone()
        };

        let mut reference = Spacecraft::new(fixed).unwrap();
        let mut ref_harness = ModelHarness::new("sc");
        ref_harness.init(&mut reference).unwrap();
        ref_harness.reset(&mut reference, 0).unwrap();
        ref_harness.update(&mut reference, sec2nano(10.0)).unwrap();

        // The ephemeris writer has not run yet.
        let mut sc = Spacecraft::new(linked).unwrap();
        let mut harness = ModelHarness::new("sc");
        harness
            .bus
            .create::<SpicePlanetStateMsg>("moon_planet_data", 2)
            .unwrap();
        harness.init(&mut sc).unwrap();
        harness.reset(&mut sc, 0).unwrap();
        harness.update(&mut sc, sec2nano(10.0)).unwrap();
        assert_eq!(sc.state().r_cn_n, reference.state().r_cn_n);

        let mut eph = SpicePlanetStateMsg::default();
        eph.position_vector = [-3.844e8, 0.0, 0.0];
        harness
            .publish("moon_planet_data", &eph, sec2nano(10.0))
            .unwrap();
        ref_harness.update(&mut reference, sec2nano(20.0)).unwrap();
        harness.update(&mut sc, sec2nano(20.0)).unwrap();
        assert_ne!(sc.state().r_cn_n, reference.state().r_cn_n);
    }

    #[test]
    fn test_body_torque_spins_up() {
        let config = SpacecraftConfig {
            omega_bn_b: [0.0; 3],
            ext_force_torque: Some(ExtForceTorqueConfig {
                ext_torque_b: [0.0, 0.0, 6.0],
                ..Default::default()
            }),
            ..point_mass_config()
        };
        let mut sc = Spacecraft::new(config).unwrap();
        let mut harness = ModelHarness::new("sc");
        harness.init(&mut sc).unwrap();
        harness.reset(&mut sc, 0).unwrap();
        harness.update(&mut sc, sec2nano(10.0)).unwrap();
        // I_zz = 600, so 6 N m for 10 s gives 0.1 rad/s.
        assert!((sc.state().omega_bn_b.z - 0.1).abs() < 1e-12);
    }
}
