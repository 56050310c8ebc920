//! Constant inertial reference attitude.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, mrp, v3};
use crate::messaging::{AttRefMsg, MessageId};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::SimTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inertial3DConfig {
    /// Reference attitude `σ_R0N`
    pub sigma_r0n: [f64; 3],
    pub out_msg: String,
}

impl Default for Inertial3DConfig {
    fn default() -> Self {
        Self {
            sigma_r0n: [0.0; 3],
            out_msg: "att_ref".to_string(),
        }
    }
}

pub struct Inertial3D {
    config: Inertial3DConfig,
    out_id: Option<MessageId>,
}

impl Inertial3D {
    pub fn new(config: Inertial3DConfig) -> ModelResult<Self> {
        if config.sigma_r0n.iter().any(|s| !s.is_finite()) {
            return Err(ModelError::config("sigma_r0n", "non-finite"));
        }
        Ok(Self { config, out_id: None })
    }
}

impl Model for Inertial3D {
    fn kind(&self) -> ModelKind {
        ModelKind::Guidance
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<AttRefMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let Some(out_id) = self.out_id else {
            return Ok(());
        };
        let reference = AttRefMsg {
            sigma_rn: arr3(&mrp::switch(&v3(&self.config.sigma_r0n))),
            ..Default::default()
        };
        ctx.write(out_id, &reference)
    }
}
