//! Dynamic effectors: forces and torques applied to the rigid body.
//!
//! An effector reads its command messages once per dynamics update and then
//! returns a force/torque that is held constant over the integration step.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::dynamics::state::{MassProperties, RigidBodyState};
use crate::error::{ModelError, ModelResult};
use crate::math::v3;
use crate::messaging::{CmdTorqueBodyMsg, MessageId, ThrArrayOnTimeCmdMsg, MAX_THRUSTERS};
use crate::model::{InitContext, ModelContext};

/// Force and torque contribution of one effector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ForceTorque {
    /// Force in inertial components [N]
    pub force_n: Vector3<f64>,
    /// Force in body components [N]
    pub force_b: Vector3<f64>,
    /// Torque about the center of mass in body components [N m]
    pub torque_b: Vector3<f64>,
}

impl std::ops::AddAssign for ForceTorque {
    fn add_assign(&mut self, rhs: Self) {
        self.force_n += rhs.force_n;
        self.force_b += rhs.force_b;
        self.torque_b += rhs.torque_b;
    }
}

/// A body effector attached to a spacecraft.
pub trait DynamicEffector: Send {
    fn name(&self) -> &str;

    /// Subscribes to command messages.
    fn link(&mut self, _ctx: &mut InitContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    fn reset(&mut self) {}

    /// Reads commands once per dynamics update.
    fn read_inputs(&mut self, _ctx: &ModelContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Contribution held over a step of `dt` seconds.
    fn force_torque(&self, state: &RigidBodyState, props: &MassProperties, dt: f64) -> ForceTorque;

    /// Advances internal state after a step of `dt` seconds.
    fn advance(&mut self, _dt: f64) {}
}

/// Constant external force and torque, plus an optional commanded torque.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtForceTorqueConfig {
    pub ext_force_n: [f64; 3],
    pub ext_force_b: [f64; 3],
    /// Torque about the center of mass [N m]
    pub ext_torque_b: [f64; 3],
    /// `CmdTorqueBodyMsg` added to `ext_torque_b`; empty disables it
    pub cmd_torque_msg: String,
}

pub struct ExtForceTorque {
    config: ExtForceTorqueConfig,
    cmd_id: Option<MessageId>,
    cmd_torque: Vector3<f64>,
}

impl ExtForceTorque {
    pub fn new(config: ExtForceTorqueConfig) -> Self {
        Self {
            config,
            cmd_id: None,
            cmd_torque: Vector3::zeros(),
        }
    }
}

impl DynamicEffector for ExtForceTorque {
    fn name(&self) -> &str {
        "ext_force_torque"
    }

    fn link(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.cmd_id = ctx.subscribe_optional::<CmdTorqueBodyMsg>(&self.config.cmd_torque_msg)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.cmd_torque = Vector3::zeros();
    }

    fn read_inputs(&mut self, ctx: &ModelContext<'_>) -> ModelResult<()> {
        if let Some(id) = self.cmd_id {
            let cmd: CmdTorqueBodyMsg = ctx.read(id)?;
            self.cmd_torque = v3(&cmd.torque_request_body);
        }
        Ok(())
    }

    fn force_torque(&self, _: &RigidBodyState, _: &MassProperties, _: f64) -> ForceTorque {
        ForceTorque {
            force_n: v3(&self.config.ext_force_n),
            force_b: v3(&self.config.ext_force_b),
            torque_b: v3(&self.config.ext_torque_b) + self.cmd_torque,
        }
    }
}

/// Geometry and strength of one thruster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrusterConfig {
    /// Location relative to the body point B [m]
    pub location: [f64; 3],
    /// Force direction in body components; normalized on construction
    pub direction: [f64; 3],
    /// Maximum thrust [N]
    pub max_thrust: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrusterSetConfig {
    pub thrusters: Vec<ThrusterConfig>,
    /// `ThrArrayOnTimeCmdMsg` carrying on-time requests [s]
    #[serde(default)]
    pub on_time_msg: String,
}

impl ThrusterSetConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.thrusters.len() > MAX_THRUSTERS {
            return Err(ModelError::config(
                "thrusters",
                format!("at most {MAX_THRUSTERS} thrusters supported"),
            ));
        }
        for (i, thr) in self.thrusters.iter().enumerate() {
            if !(v3(&thr.direction).norm() > 0.0) {
                return Err(ModelError::config(
                    format!("thrusters[{i}].direction"),
                    "zero-norm direction",
                ));
            }
            if !(thr.max_thrust.is_finite() && thr.max_thrust >= 0.0) {
                return Err(ModelError::config(
                    format!("thrusters[{i}].max_thrust"),
                    "must be non-negative",
                ));
            }
        }
        Ok(())
    }
}

/// On/off thrusters gated by commanded on-times.
///
/// Every new command write replaces the remaining on-time of each thruster.
/// Over a step the thrust fraction is `clamp(remaining / dt, 0, 1)`.
pub struct ThrusterSet {
    locations: Vec<Vector3<f64>>,
    directions: Vec<Vector3<f64>>,
    max_thrust: Vec<f64>,
    on_time_msg: String,
    cmd_id: Option<MessageId>,
    last_cmd_count: u64,
    remaining: Vec<f64>,
}

impl ThrusterSet {
    pub fn new(config: ThrusterSetConfig) -> ModelResult<Self> {
        config.validate()?;
        let n = config.thrusters.len();
        Ok(Self {
            locations: config.thrusters.iter().map(|t| v3(&t.location)).collect(),
            directions: config
                .thrusters
                .iter()
                .map(|t| v3(&t.direction).normalize())
                .collect(),
            max_thrust: config.thrusters.iter().map(|t| t.max_thrust).collect(),
            on_time_msg: config.on_time_msg,
            cmd_id: None,
            last_cmd_count: 0,
            remaining: vec![0.0; n],
        })
    }

    /// Remaining on-time per thruster [s].
    pub fn remaining(&self) -> &[f64] {
        &self.remaining
    }

    fn fraction(&self, i: usize, dt: f64) -> f64 {
        if dt <= 0.0 {
            return if self.remaining[i] > 0.0 { 1.0 } else { 0.0 };
        }
        (self.remaining[i] / dt).clamp(0.0, 1.0)
    }
}

impl DynamicEffector for ThrusterSet {
    fn name(&self) -> &str {
        "thruster_set"
    }

    fn link(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.cmd_id = ctx.subscribe_optional::<ThrArrayOnTimeCmdMsg>(&self.on_time_msg)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.remaining.iter_mut().for_each(|r| *r = 0.0);
        self.last_cmd_count = 0;
    }

    fn read_inputs(&mut self, ctx: &ModelContext<'_>) -> ModelResult<()> {
        let Some(id) = self.cmd_id else {
            return Ok(());
        };
        let (cmd, header) = ctx.read_with_header::<ThrArrayOnTimeCmdMsg>(id)?;
        if header.write_count != self.last_cmd_count && header.is_written() {
            self.last_cmd_count = header.write_count;
            for (slot, request) in self.remaining.iter_mut().zip(cmd.on_time_request.iter()) {
                *slot = request.max(0.0);
            }
        }
        Ok(())
    }

    fn force_torque(&self, _: &RigidBodyState, props: &MassProperties, dt: f64) -> ForceTorque {
        let mut out = ForceTorque::default();
        for i in 0..self.remaining.len() {
            let thrust = self.fraction(i, dt) * self.max_thrust[i];
            if thrust == 0.0 {
                continue;
            }
            let force = thrust * self.directions[i];
            out.force_b += force;
            out.torque_b += (self.locations[i] - props.r_bcb_b).cross(&force);
        }
        out
    }

    fn advance(&mut self, dt: f64) {
        for r in &mut self.remaining {
            *r = (*r - dt).max(0.0);
        }
    }
}
