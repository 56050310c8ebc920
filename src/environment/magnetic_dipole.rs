//! Centered dipole magnetic field.
//!
//! The dipole moment in planet-fixed components is `m = R³ [g11, h11, g10]`,
//! and the field at `r` is `B = (3 (m·r̂) r̂ - m) / |r|³`. The planet-fixed
//! frame spins about the inertial z axis at `spin_rate`.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, v3};
use crate::messaging::{MagneticFieldMsg, MessageId, ScStatesMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::SimTime;

fn default_state_msg() -> String {
    "sc_states".to_string()
}

fn default_out_msg() -> String {
    "mag_field".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MagneticDipoleConfig {
    /// Gauss coefficients [T]
    pub g10: f64,
    pub g11: f64,
    pub h11: f64,
    /// Reference radius [m]
    pub planet_radius: f64,
    /// Planet rotation rate about inertial z [rad/s]
    #[serde(default)]
    pub spin_rate: f64,
    /// Field is zero beyond this radius [m]; `None` is unbounded
    #[serde(default)]
    pub max_reach: Option<f64>,
    #[serde(default = "default_state_msg")]
    pub state_msg: String,
    #[serde(default = "default_out_msg")]
    pub out_msg: String,
}

impl MagneticDipoleConfig {
    /// IGRF-style first-order Earth coefficients.
    pub fn earth() -> Self {
        Self {
            g10: -30_926.00e-9,
            g11: -2_318.00e-9,
            h11: 5_817.00e-9,
            planet_radius: 6_371_200.0,
            spin_rate: 7.292_115_146_706_979e-5,
            max_reach: None,
            state_msg: default_state_msg(),
            out_msg: default_out_msg(),
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        if !(self.planet_radius.is_finite() && self.planet_radius > 0.0) {
            return Err(ModelError::config("planet_radius", "must be positive"));
        }
        if [self.g10, self.g11, self.h11, self.spin_rate]
            .iter()
            .any(|x| !x.is_finite())
        {
            return Err(ModelError::config("gauss coefficients", "non-finite value"));
        }
        Ok(())
    }

    /// Dipole moment in planet-fixed components.
    pub fn moment(&self) -> Vector3<f64> {
        self.planet_radius.powi(3) * Vector3::new(self.g11, self.h11, self.g10)
    }
}

/// Field of a dipole `moment` at planet-fixed position `r`.
pub fn dipole_field(moment: &Vector3<f64>, r: &Vector3<f64>) -> Vector3<f64> {
    let r_mag = r.norm();
    if r_mag == 0.0 {
        return Vector3::zeros();
    }
    let r_hat = r / r_mag;
    (3.0 * moment.dot(&r_hat) * r_hat - moment) / (r_mag * r_mag * r_mag)
}

pub struct MagneticDipole {
    config: MagneticDipoleConfig,
    state_id: Option<MessageId>,
    out_id: Option<MessageId>,
    epoch: SimTime,
}

impl MagneticDipole {
    pub fn new(config: MagneticDipoleConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state_id: None,
            out_id: None,
            epoch: 0,
        })
    }

    /// Inertial field at inertial position `r_n` at `time`.
    pub fn field_at(&self, r_n: &Vector3<f64>, time: SimTime) -> Vector3<f64> {
        if let Some(reach) = self.config.max_reach {
            if r_n.norm() > reach {
                return Vector3::zeros();
            }
        }
        let angle = self.config.spin_rate * crate::types::nano2sec(time.saturating_sub(self.epoch));
        let pn = Rotation3::from_axis_angle(&Vector3::z_axis(), -angle);
        let b_p = dipole_field(&self.config.moment(), &(pn * r_n));
        pn.inverse() * b_p
    }
}

impl Model for MagneticDipole {
    fn kind(&self) -> ModelKind {
        ModelKind::Environment
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<MagneticFieldMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.state_id = Some(ctx.subscribe::<ScStatesMsg>(&self.config.state_msg)?);
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        self.epoch = time;
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        let (Some(state_id), Some(out_id)) = (self.state_id, self.out_id) else {
            return Ok(());
        };
        let sc: ScStatesMsg = ctx.read(state_id)?;
        let field = self.field_at(&v3(&sc.r_bn_n), time);
        ctx.write(
            out_id,
            &MagneticFieldMsg {
                mag_field_n: arr3(&field),
            },
        )
    }
}
