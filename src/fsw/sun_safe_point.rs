//! Sun-safe pointing guidance.
//!
//! Drives a commanded body axis `ĉ` onto the sensed sun heading `ŝ`. The
//! attitude error is the principal rotation taking `ŝ` onto `ĉ`:
//! `σ_BR = ê · tan(Φ / 4)` with `ê = ŝ × ĉ / |ŝ × ĉ|` and `Φ = acos(ŝ · ĉ)`.
//! When the sun is behind the commanded axis the rotation axis is any axis
//! normal to `ĉ`. When no sun is seen the attitude error is zero and the
//! vehicle tracks a search rate instead.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, v3};
use crate::messaging::{AttGuidMsg, MessageId, NavAttMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::SimTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunSafePointConfig {
    /// Body axis to point at the sun
    pub s_hat_bdy_cmd: [f64; 3],
    /// Sun heading norms below this mean no sun is seen
    pub min_unit_mag: f64,
    /// Angles below this are treated as aligned [rad]
    pub small_angle: f64,
    /// Search rate used while the sun is not seen [rad/s]
    pub omega_rn_b: [f64; 3],
    /// Spin rate about the sun heading once acquired [rad/s]
    pub sun_axis_spin_rate: f64,
    /// Message carrying `veh_sun_pnt_bdy`
    pub sun_msg: String,
    /// Message carrying `omega_bn_b`
    pub rate_msg: String,
    pub out_msg: String,
}

impl Default for SunSafePointConfig {
    fn default() -> Self {
        Self {
            s_hat_bdy_cmd: [0.0, 0.0, 1.0],
            min_unit_mag: 0.1,
            small_angle: 0.01_f64.to_radians(),
            omega_rn_b: [0.0; 3],
            sun_axis_spin_rate: 0.0,
            sun_msg: "nav_att".to_string(),
            rate_msg: "nav_att".to_string(),
            out_msg: "att_guidance".to_string(),
        }
    }
}

pub struct SunSafePoint {
    config: SunSafePointConfig,
    s_hat_cmd: Vector3<f64>,
    /// Rotation axis used when the sun is opposite the commanded axis
    e_hat_180: Vector3<f64>,
    sun_id: Option<MessageId>,
    rate_id: Option<MessageId>,
    out_id: Option<MessageId>,
}

impl SunSafePoint {
    pub fn new(config: SunSafePointConfig) -> ModelResult<Self> {
        let s_hat_cmd = v3(&config.s_hat_bdy_cmd)
            .try_normalize(0.0)
            .ok_or_else(|| ModelError::config("s_hat_bdy_cmd", "zero-norm axis"))?;
        if !(config.min_unit_mag >= 0.0) {
            return Err(ModelError::config("min_unit_mag", "must be non-negative"));
        }
        if !(config.small_angle >= 0.0) {
            return Err(ModelError::config("small_angle", "must be non-negative"));
        }
        let mut e_hat_180 = s_hat_cmd.cross(&Vector3::x());
        if e_hat_180.norm() < 0.1 {
            e_hat_180 = s_hat_cmd.cross(&Vector3::y());
        }
        Ok(Self {
            e_hat_180: e_hat_180.normalize(),
            s_hat_cmd,
            config,
            sun_id: None,
            rate_id: None,
            out_id: None,
        })
    }

    /// Guidance for a sensed sun heading and body rate.
    pub fn guidance(&self, sun_b: &Vector3<f64>, omega_bn_b: &Vector3<f64>) -> AttGuidMsg {
        let (sigma_br, omega_rn_b) = if sun_b.norm() < self.config.min_unit_mag {
            (Vector3::zeros(), v3(&self.config.omega_rn_b))
        } else {
            let s_hat = sun_b.normalize();
            let phi = s_hat.dot(&self.s_hat_cmd).clamp(-1.0, 1.0).acos();
            let sigma = if phi < self.config.small_angle {
                Vector3::zeros()
            } else {
                let e_hat = if PI - phi < self.config.small_angle {
                    self.e_hat_180
                } else {
                    s_hat.cross(&self.s_hat_cmd).normalize()
                };
                e_hat * (phi / 4.0).tan()
            };
            (sigma, s_hat * self.config.sun_axis_spin_rate)
        };
        AttGuidMsg {
            sigma_br: arr3(&sigma_br),
            omega_br_b: arr3(&(omega_bn_b - omega_rn_b)),
            omega_rn_b: arr3(&omega_rn_b),
            domega_rn_b: [0.0; 3],
        }
    }
}

impl Model for SunSafePoint {
    fn kind(&self) -> ModelKind {
        ModelKind::Guidance
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<AttGuidMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.sun_id = Some(ctx.subscribe::<NavAttMsg>(&self.config.sun_msg)?);
        self.rate_id = Some(ctx.subscribe::<NavAttMsg>(&self.config.rate_msg)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(sun_id), Some(rate_id), Some(out_id)) = (self.sun_id, self.rate_id, self.out_id)
        else {
            return Ok(());
        };
        let sun: NavAttMsg = ctx.read(sun_id)?;
        let rate: NavAttMsg = ctx.read(rate_id)?;
        let guid = self.guidance(&v3(&sun.veh_sun_pnt_bdy), &v3(&rate.omega_bn_b));
        ctx.write(out_id, &guid)
    }
}
