//! MRP feedback attitude control law with integral action.
//!
//! ```text
//! u = -K σ - P δω - P Ki z + I (ω̇_r - ω × ω_r) + ω × I ω - L
//! z = K ∫σ dt + I δω
//! ```
//!
//! `σ = σ_BR`, `δω = ω_BR`, `ω = ω_BN = δω + ω_r` and `ω_r = ω_RN`, all in
//! body components. The integral term is active only for `ki > 0`; each
//! component of `K ∫σ dt` is clamped to `integral_limit`. The inertia comes
//! from the vehicle configuration message and is refreshed whenever that
//! message is rewritten.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, m33, v3};
use crate::messaging::{AttGuidMsg, CmdTorqueBodyMsg, MessageId, VehicleConfigMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::{nano2sec, SimTime};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MrpFeedbackConfig {
    /// Proportional gain on the MRP error [N m]
    pub k: f64,
    /// Rate error gain [N m s]
    pub p: f64,
    /// Integral gain; zero or negative disables the integral term
    pub ki: f64,
    /// Per-component bound on `K ∫σ dt`
    pub integral_limit: Option<f64>,
    /// Known external torque `L` [N m]
    pub known_torque_b: [f64; 3],
    pub guid_msg: String,
    pub vehicle_config_msg: String,
    pub out_msg: String,
}

impl Default for MrpFeedbackConfig {
    fn default() -> Self {
        Self {
            k: 3.5,
            p: 30.0,
            ki: -1.0,
            integral_limit: None,
            known_torque_b: [0.0; 3],
            guid_msg: "att_guidance".to_string(),
            vehicle_config_msg: "vehicle_config".to_string(),
            out_msg: "cmd_torque".to_string(),
        }
    }
}

impl MrpFeedbackConfig {
    pub fn validate(&self) -> ModelResult<()> {
        for (field, value) in [("k", self.k), ("p", self.p), ("ki", self.ki)] {
            if !value.is_finite() {
                return Err(ModelError::config(field, "non-finite"));
            }
        }
        if matches!(self.integral_limit, Some(limit) if !(limit >= 0.0)) {
            return Err(ModelError::config("integral_limit", "must be non-negative"));
        }
        Ok(())
    }
}

pub struct MrpFeedback {
    config: MrpFeedbackConfig,
    inertia: Matrix3<f64>,
    vehicle_write_count: u64,
    int_sigma: Vector3<f64>,
    prior_time: Option<SimTime>,
    guid_id: Option<MessageId>,
    vehicle_id: Option<MessageId>,
    out_id: Option<MessageId>,
}

impl MrpFeedback {
    pub fn new(config: MrpFeedbackConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            inertia: Matrix3::zeros(),
            vehicle_write_count: 0,
            int_sigma: Vector3::zeros(),
            prior_time: None,
            guid_id: None,
            vehicle_id: None,
            out_id: None,
        })
    }

    /// Accumulated `K ∫σ dt`.
    pub fn integral(&self) -> &Vector3<f64> {
        &self.int_sigma
    }

    fn refresh_inertia(&mut self, ctx: &ModelContext<'_>) -> ModelResult<()> {
        let Some(vehicle_id) = self.vehicle_id else {
            return Ok(());
        };
        let (vehicle, header) = ctx.read_with_header::<VehicleConfigMsg>(vehicle_id)?;
        if header.write_count != self.vehicle_write_count {
            self.inertia = m33(&vehicle.inertia_b);
            self.vehicle_write_count = header.write_count;
        }
        Ok(())
    }

    /// Control torque for the guidance errors `guid` after `dt` seconds.
    pub fn control(&mut self, guid: &AttGuidMsg, dt: f64) -> Vector3<f64> {
        let cfg = &self.config;
        let sigma = v3(&guid.sigma_br);
        let delta_omega = v3(&guid.omega_br_b);
        let omega_r = v3(&guid.omega_rn_b);
        let domega_r = v3(&guid.domega_rn_b);
        let omega = delta_omega + omega_r;

        let z = if cfg.ki > 0.0 {
            self.int_sigma += cfg.k * dt * sigma;
            if let Some(limit) = cfg.integral_limit {
                self.int_sigma.apply(|s| *s = s.clamp(-limit, limit));
            }
            self.int_sigma + self.inertia * delta_omega
        } else {
            Vector3::zeros()
        };

        -cfg.k * sigma - cfg.p * delta_omega - cfg.p * cfg.ki * z
            + self.inertia * (domega_r - omega.cross(&omega_r))
            + omega.cross(&(self.inertia * omega))
            - v3(&cfg.known_torque_b)
    }
}

impl Model for MrpFeedback {
    fn kind(&self) -> ModelKind {
        ModelKind::Control
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<CmdTorqueBodyMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.guid_id = Some(ctx.subscribe::<AttGuidMsg>(&self.config.guid_msg)?);
        self.vehicle_id = Some(ctx.subscribe::<VehicleConfigMsg>(&self.config.vehicle_config_msg)?);
        Ok(())
    }

    fn reset(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.int_sigma = Vector3::zeros();
        self.prior_time = None;
        self.vehicle_write_count = 0;
        self.inertia = Matrix3::zeros();
        self.refresh_inertia(ctx)
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        let (Some(guid_id), Some(out_id)) = (self.guid_id, self.out_id) else {
            return Ok(());
        };
        self.refresh_inertia(ctx)?;
        let guid: AttGuidMsg = ctx.read(guid_id)?;
        let dt = self
            .prior_time
            .replace(time)
            .map_or(0.0, |prior| nano2sec(time.saturating_sub(prior)));

        let torque = self.control(&guid, dt);
        ctx.write(
            out_id,
            &CmdTorqueBodyMsg {
                torque_request_body: arr3(&torque),
            },
        )
    }
}
