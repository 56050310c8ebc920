//! Truth-based navigation sensor.
//!
//! Copies the spacecraft truth state into navigation messages, optionally
//! adding white noise per channel, and computes the body-frame sun heading.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, mrp, v3};
use crate::messaging::{MessageId, NavAttMsg, NavTransMsg, ScStatesMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::sensors::noise::GaussNoise;
use crate::sensors::{SunSource, SunSourceConfig};
use crate::types::SimTime;

/// White noise standard deviation per channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavNoise {
    /// [m]
    pub position: f64,
    /// [m/s]
    pub velocity: f64,
    /// MRP components
    pub attitude: f64,
    /// [rad/s]
    pub rate: f64,
    /// Unit-vector components
    pub sun_heading: f64,
}

impl NavNoise {
    fn validate(&self) -> ModelResult<()> {
        let values = [
            self.position,
            self.velocity,
            self.attitude,
            self.rate,
            self.sun_heading,
        ];
        if values.iter().any(|v| !(*v >= 0.0)) {
            return Err(ModelError::config("noise", "must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleNavConfig {
    pub state_msg: String,
    pub att_out_msg: String,
    pub trans_out_msg: String,
    /// Sun heading is only computed when `sun.sun_msg` is set or a fixed
    /// direction is given
    pub sun: SunSourceConfig,
    pub noise: NavNoise,
    pub seed: u64,
}

impl Default for SimpleNavConfig {
    fn default() -> Self {
        Self {
            state_msg: "sc_states".to_string(),
            att_out_msg: "nav_att".to_string(),
            trans_out_msg: "nav_trans".to_string(),
            sun: SunSourceConfig::default(),
            noise: NavNoise::default(),
            seed: 0,
        }
    }
}

pub struct SimpleNav {
    config: SimpleNavConfig,
    noise: GaussNoise,
    sun: SunSource,
    state_id: Option<MessageId>,
    att_id: Option<MessageId>,
    trans_id: Option<MessageId>,
}

impl SimpleNav {
    pub fn new(config: SimpleNavConfig) -> ModelResult<Self> {
        config.noise.validate()?;
        config.sun.validate()?;
        Ok(Self {
            noise: GaussNoise::new(config.seed),
            sun: SunSource::default(),
            state_id: None,
            att_id: None,
            trans_id: None,
            config,
        })
    }

    fn perturb(&mut self, v: Vector3<f64>, std: f64) -> Vector3<f64> {
        v + self.noise.vector(&Vector3::repeat(std))
    }
}

impl Model for SimpleNav {
    fn kind(&self) -> ModelKind {
        ModelKind::Sensor
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.att_id = Some(ctx.create::<NavAttMsg>(&self.config.att_out_msg)?);
        self.trans_id = Some(ctx.create::<NavTransMsg>(&self.config.trans_out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.state_id = Some(ctx.subscribe::<ScStatesMsg>(&self.config.state_msg)?);
        self.sun = SunSource::link(&self.config.sun, ctx)?;
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.noise.reseed();
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(state_id), Some(att_id), Some(trans_id)) =
            (self.state_id, self.att_id, self.trans_id)
        else {
            return Ok(());
        };
        let sc: ScStatesMsg = ctx.read(state_id)?;
        let time_tag = ctx.time_sec();
        let noise = self.config.noise.clone();

        let r = v3(&sc.r_bn_n);
        let sigma_bn = v3(&sc.sigma_bn);
        let sun_b = match self.sun.direction_n(&self.config.sun, ctx, &r)? {
            Some(sun_n) => {
                let heading = mrp::to_dcm(&sigma_bn) * sun_n;
                self.perturb(heading, noise.sun_heading)
                    .try_normalize(0.0)
                    .unwrap_or(heading)
            }
            None => Vector3::zeros(),
        };

        let att = NavAttMsg {
            time_tag,
            sigma_bn: arr3(&mrp::switch(&self.perturb(sigma_bn, noise.attitude))),
            omega_bn_b: arr3(&self.perturb(v3(&sc.omega_bn_b), noise.rate)),
            veh_sun_pnt_bdy: arr3(&sun_b),
        };
        let trans = NavTransMsg {
            time_tag,
            r_bn_n: arr3(&self.perturb(r, noise.position)),
            v_bn_n: arr3(&self.perturb(v3(&sc.v_bn_n), noise.velocity)),
            veh_accum_dv: sc.total_accum_dv_bn_b,
        };
        ctx.write(att_id, &att)?;
        ctx.write(trans_id, &trans)
    }
}
