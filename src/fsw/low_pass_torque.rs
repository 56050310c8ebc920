//! First-order low-pass filter on the commanded body torque.
//!
//! Discretized with the Tustin transform at the task period `h`:
//! `hw = 2 tan(wc h / 2)`, `a0 = 2 + hw`, `a1 = 2 - hw`, `b0 = b1 = hw`, and
//! `y_k = (b0 x_k + b1 x_{k-1} + a1 y_{k-1}) / a0`.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, v3};
use crate::messaging::{CmdTorqueBodyMsg, MessageId};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::SimTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowPassTorqueConfig {
    /// Filter time step [s]
    pub h: f64,
    /// Cut-off frequency [rad/s]
    pub wc: f64,
    pub in_msg: String,
    pub out_msg: String,
}

impl Default for LowPassTorqueConfig {
    fn default() -> Self {
        Self {
            h: 0.5,
            wc: 0.1 * std::f64::consts::TAU,
            in_msg: "cmd_torque".to_string(),
            out_msg: "cmd_torque_filtered".to_string(),
        }
    }
}

impl LowPassTorqueConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if !(self.h > 0.0) {
            return Err(ModelError::config("h", "must be positive"));
        }
        if !(self.wc > 0.0) {
            return Err(ModelError::config("wc", "must be positive"));
        }
        // tan blows up at wc h = pi.
        if self.wc * self.h >= std::f64::consts::PI {
            return Err(ModelError::config("wc", "wc * h must be below pi"));
        }
        Ok(())
    }

    /// Tustin coefficients `(a0, a1, b0, b1)`.
    pub fn coefficients(&self) -> (f64, f64, f64, f64) {
        let hw = 2.0 * (self.wc * self.h / 2.0).tan();
        (2.0 + hw, 2.0 - hw, hw, hw)
    }
}

pub struct LowPassTorqueFilter {
    config: LowPassTorqueConfig,
    prev_input: Vector3<f64>,
    prev_output: Vector3<f64>,
    primed: bool,
    in_id: Option<MessageId>,
    out_id: Option<MessageId>,
}

impl LowPassTorqueFilter {
    pub fn new(config: LowPassTorqueConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            prev_input: Vector3::zeros(),
            prev_output: Vector3::zeros(),
            primed: false,
            in_id: None,
            out_id: None,
        })
    }

    /// Feeds one torque sample through the filter.
    pub fn filter(&mut self, input: &Vector3<f64>) -> Vector3<f64> {
        if !self.primed {
            // Start from the first input with a zero output history.
            self.prev_input = *input;
            self.prev_output = Vector3::zeros();
            self.primed = true;
        }
        let (a0, a1, b0, b1) = self.config.coefficients();
        let output = (b0 * input + b1 * self.prev_input + a1 * self.prev_output) / a0;
        self.prev_input = *input;
        self.prev_output = output;
        output
    }
}

impl Model for LowPassTorqueFilter {
    fn kind(&self) -> ModelKind {
        ModelKind::Control
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<CmdTorqueBodyMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.in_id = Some(ctx.subscribe::<CmdTorqueBodyMsg>(&self.config.in_msg)?);
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.primed = false;
        self.prev_input = Vector3::zeros();
        self.prev_output = Vector3::zeros();
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(in_id), Some(out_id)) = (self.in_id, self.out_id) else {
            return Ok(());
        };
        let cmd: CmdTorqueBodyMsg = ctx.read(in_id)?;
        let filtered = self.filter(&v3(&cmd.torque_request_body));
        ctx.write(
            out_id,
            &CmdTorqueBodyMsg {
                torque_request_body: arr3(&filtered),
            },
        )
    }
}
