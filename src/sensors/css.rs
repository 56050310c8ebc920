//! Coarse sun sensor constellation.
//!
//! Each head measures the cosine of the angle between its boresight and the
//! sun. A head whose angle reaches its field-of-view half angle, or faces
//! away from the sun, reads exactly zero without noise. Inside the field of
//! view the ideal cosine is shaped by the Kelly curve
//! `cos θ · (1 - exp(-cos²θ / k))`, then scaled, biased, perturbed and
//! clamped.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

use crate::error::{ModelError, ModelResult};
use crate::math::{mrp, v3};
use crate::messaging::{
    CssArraySensorMsg, CssConfigMsg, MessageId, ScStatesMsg, MAX_NUM_CSS,
};
use crate::model::{InitContext, Model, ModelContext, ModelKind, WarningKind};
use crate::sensors::noise::GaussNoise;
use crate::sensors::{SunSource, SunSourceConfig};
use crate::types::SimTime;

/// Below this Kelly factor the curve is not applied.
const KELLY_EPS: f64 = 1e-13;

/// Cosines within this margin of the field of view edge read as unlit.
const FOV_EPS: f64 = 1e-12;

fn default_fov() -> f64 {
    FRAC_PI_2
}

fn one() -> f64 {
    1.0
}

fn zero() -> Option<f64> {
    Some(0.0)
}

/// One sensor head.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CssHeadConfig {
    /// Boresight in body components; normalized on construction
    pub n_hat_b: [f64; 3],
    /// Field-of-view half angle [rad]
    #[serde(default = "default_fov")]
    pub fov: f64,
    #[serde(default)]
    pub kelly: f64,
    #[serde(default = "one")]
    pub scale_factor: f64,
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub noise_std: f64,
    #[serde(default = "zero")]
    pub min_output: Option<f64>,
    #[serde(default)]
    pub max_output: Option<f64>,
    /// Weight handed to flight software
    #[serde(default = "one")]
    pub confidence: f64,
}

impl CssHeadConfig {
    /// Ideal head along `n_hat_b` with a 90° field of view.
    pub fn along(n_hat_b: [f64; 3]) -> Self {
        Self {
            n_hat_b,
            fov: default_fov(),
            kelly: 0.0,
            scale_factor: 1.0,
            bias: 0.0,
            noise_std: 0.0,
            min_output: Some(0.0),
            max_output: None,
            confidence: 1.0,
        }
    }

    fn validate(&self, index: usize) -> ModelResult<()> {
        let field = |name: &str| format!("heads[{index}].{name}");
        if !(v3(&self.n_hat_b).norm() > 0.0) {
            return Err(ModelError::config(field("n_hat_b"), "zero-norm boresight"));
        }
        if !(self.fov > 0.0 && self.fov <= std::f64::consts::PI) {
            return Err(ModelError::config(field("fov"), "must lie in (0, pi]"));
        }
        if !(self.kelly >= 0.0 && self.kelly.is_finite()) {
            return Err(ModelError::config(field("kelly"), "must be non-negative"));
        }
        if !(self.noise_std >= 0.0 && self.noise_std.is_finite()) {
            return Err(ModelError::config(field("noise_std"), "must be non-negative"));
        }
        if let (Some(lo), Some(hi)) = (self.min_output, self.max_output) {
            if lo > hi {
                return Err(ModelError::config(field("min_output"), "exceeds max_output"));
            }
        }
        Ok(())
    }

    /// Noise-free signal for cosine `cos_theta` to the sun.
    pub fn ideal_signal(&self, cos_theta: f64) -> Option<f64> {
        if cos_theta <= FOV_EPS || cos_theta <= self.fov.cos() + FOV_EPS {
            return None;
        }
        let mut value = cos_theta;
        if self.kelly > KELLY_EPS {
            value *= 1.0 - (-cos_theta * cos_theta / self.kelly).exp();
        }
        Some(value)
    }
}

fn default_state_msg() -> String {
    "sc_states".to_string()
}

fn default_out_msg() -> String {
    "css_sensors".to_string()
}

fn default_config_msg() -> String {
    "css_config".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CssConstellationConfig {
    pub heads: Vec<CssHeadConfig>,
    #[serde(default)]
    pub sun: SunSourceConfig,
    #[serde(default = "default_state_msg")]
    pub state_msg: String,
    #[serde(default = "default_out_msg")]
    pub out_msg: String,
    /// Geometry message for flight software; empty disables it
    #[serde(default = "default_config_msg")]
    pub config_msg: String,
    #[serde(default)]
    pub seed: u64,
}

impl CssConstellationConfig {
    pub fn new(heads: Vec<CssHeadConfig>) -> Self {
        Self {
            heads,
            sun: SunSourceConfig::default(),
            state_msg: default_state_msg(),
            out_msg: default_out_msg(),
            config_msg: default_config_msg(),
            seed: 0,
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.heads.is_empty() || self.heads.len() > MAX_NUM_CSS {
            return Err(ModelError::config(
                "heads",
                format!("between 1 and {MAX_NUM_CSS} heads required"),
            ));
        }
        for (i, head) in self.heads.iter().enumerate() {
            head.validate(i)?;
        }
        self.sun.validate()
    }
}

pub struct CssConstellation {
    config: CssConstellationConfig,
    normals: Vec<Vector3<f64>>,
    noise: GaussNoise,
    sun: SunSource,
    state_id: Option<MessageId>,
    out_id: Option<MessageId>,
    config_id: Option<MessageId>,
}

impl CssConstellation {
    pub fn new(config: CssConstellationConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            normals: config
                .heads
                .iter()
                .map(|h| v3(&h.n_hat_b).normalize())
                .collect(),
            noise: GaussNoise::new(config.seed),
            sun: SunSource::default(),
            state_id: None,
            out_id: None,
            config_id: None,
            config,
        })
    }

    /// Measurements for a unit sun direction in body components.
    pub fn measure(&mut self, sun_b: &Vector3<f64>) -> CssArraySensorMsg {
        self.sample(sun_b).0
    }

    /// Measurements plus the number of heads clamped to their output limits.
    fn sample(&mut self, sun_b: &Vector3<f64>) -> (CssArraySensorMsg, usize) {
        let mut out = CssArraySensorMsg::default();
        let mut saturated = 0;
        for (i, (head, n_hat)) in self.config.heads.iter().zip(&self.normals).enumerate() {
            let Some(ideal) = head.ideal_signal(n_hat.dot(sun_b)) else {
                continue;
            };
            let raw = ideal * head.scale_factor + head.bias + self.noise.sample(head.noise_std);
            let mut value = raw;
            if let Some(hi) = head.max_output {
                value = value.min(hi);
            }
            if let Some(lo) = head.min_output {
                value = value.max(lo);
            }
            if value != raw {
                saturated += 1;
            }
            out.cos_values[i] = value;
        }
        (out, saturated)
    }

    fn geometry(&self) -> CssConfigMsg {
        let mut msg = CssConfigMsg::default();
        msg.n_css = self.normals.len() as u32;
        for (i, (n, head)) in self.normals.iter().zip(&self.config.heads).enumerate() {
            msg.n_hat_b[3 * i..3 * i + 3].copy_from_slice(n.as_slice());
            msg.weights[i] = head.confidence;
        }
        msg
    }
}

impl Model for CssConstellation {
    fn kind(&self) -> ModelKind {
        ModelKind::Sensor
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<CssArraySensorMsg>(&self.config.out_msg)?);
        if !self.config.config_msg.is_empty() {
            self.config_id = Some(ctx.create::<CssConfigMsg>(&self.config.config_msg)?);
        }
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.state_id = Some(ctx.subscribe::<ScStatesMsg>(&self.config.state_msg)?);
        self.sun = SunSource::link(&self.config.sun, ctx)?;
        Ok(())
    }

    fn reset(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.noise.reseed();
        if let Some(id) = self.config_id {
            let geometry = self.geometry();
            ctx.write(id, &geometry)?;
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(state_id), Some(out_id)) = (self.state_id, self.out_id) else {
            return Ok(());
        };
        let sc: ScStatesMsg = ctx.read(state_id)?;
        let r_bn_n = v3(&sc.r_bn_n);
        let out = match self.sun.direction_n(&self.config.sun, ctx, &r_bn_n)? {
            Some(sun_n) => {
                let sun_b = mrp::to_dcm(&v3(&sc.sigma_bn)) * sun_n;
                let (out, saturated) = self.sample(&sun_b);
                if saturated > 0 {
                    ctx.warn(
                        WarningKind::Saturation,
                        format!("{saturated} sun sensor head(s) saturated"),
                    );
                }
                out
            }
            None => CssArraySensorMsg::default(),
        };
        ctx.write(out_id, &out)
    }
}
