//! Thruster force to on-time conversion with pulse remainder accumulation.
//!
//! Each control period the requested force of every thruster becomes an
//! on-time `F / F_max · Δt` plus the remainder carried from earlier periods.
//! Requests shorter than the minimum fire time are not fired but carried
//! forward; requests of a full period or more saturate to `1.1 · Δt` so the
//! thruster stays on until the next command. With `dv_on` the forces are
//! offsets from a fully-on baseline.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::messaging::{MessageId, ThrArrayCmdForceMsg, ThrArrayOnTimeCmdMsg, MAX_THRUSTERS};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::{nano2sec, SimTime};

/// On-time published on the first call after reset, per unit of base thrust.
const FIRST_CALL_ON_TIME: f64 = 2.0;

/// Saturated on-time as a multiple of the control period.
const SATURATION_FACTOR: f64 = 1.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrFiringRemainderConfig {
    /// Maximum thrust of each thruster [N]; a thruster with zero max thrust
    /// is never fired
    pub max_thrust: Vec<f64>,
    /// [s]
    pub min_fire_time: f64,
    /// Forces are offsets from all thrusters firing
    pub dv_on: bool,
    pub in_msg: String,
    pub out_msg: String,
}

impl Default for ThrFiringRemainderConfig {
    fn default() -> Self {
        Self {
            max_thrust: Vec::new(),
            min_fire_time: 0.0,
            dv_on: false,
            in_msg: "thr_force_cmd".to_string(),
            out_msg: "thr_on_time_cmd".to_string(),
        }
    }
}

impl ThrFiringRemainderConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.max_thrust.is_empty() || self.max_thrust.len() > MAX_THRUSTERS {
            return Err(ModelError::config(
                "max_thrust",
                format!("expected 1..={MAX_THRUSTERS} thrusters"),
            ));
        }
        if self.max_thrust.iter().any(|f| !f.is_finite()) {
            return Err(ModelError::config("max_thrust", "non-finite"));
        }
        if !(self.min_fire_time >= 0.0) {
            return Err(ModelError::config("min_fire_time", "must be non-negative"));
        }
        Ok(())
    }
}

pub struct ThrFiringRemainder {
    config: ThrFiringRemainderConfig,
    remainder: Vec<f64>,
    prev_time: Option<SimTime>,
    in_id: Option<MessageId>,
    out_id: Option<MessageId>,
}

impl ThrFiringRemainder {
    pub fn new(config: ThrFiringRemainderConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            remainder: vec![0.0; config.max_thrust.len()],
            prev_time: None,
            in_id: None,
            out_id: None,
            config,
        })
    }

    /// Pulse remainder carried by each thruster [s].
    pub fn remainder(&self) -> &[f64] {
        &self.remainder
    }

    /// On-time for one thruster over a control period of `period` seconds.
    fn on_time(&mut self, i: usize, force: f64, period: f64) -> f64 {
        let max_thrust = self.config.max_thrust[i];
        if max_thrust <= 0.0 {
            return 0.0;
        }
        let base = if self.config.dv_on { max_thrust } else { 0.0 };
        let on_time = self.remainder[i] + (force + base) / max_thrust * period;

        if on_time < self.config.min_fire_time {
            self.remainder[i] = on_time.max(0.0);
            return 0.0;
        }
        self.remainder[i] = 0.0;
        if on_time >= period {
            SATURATION_FACTOR * period
        } else {
            on_time
        }
    }
}

impl Model for ThrFiringRemainder {
    fn kind(&self) -> ModelKind {
        ModelKind::Actuator
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<ThrArrayOnTimeCmdMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.in_id = Some(ctx.subscribe::<ThrArrayCmdForceMsg>(&self.config.in_msg)?);
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.remainder.iter_mut().for_each(|r| *r = 0.0);
        self.prev_time = None;
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        let (Some(in_id), Some(out_id)) = (self.in_id, self.out_id) else {
            return Ok(());
        };
        let mut out = ThrArrayOnTimeCmdMsg::default();
        let count = self.config.max_thrust.len();

        let Some(prev) = self.prev_time.replace(time) else {
            // No control period is known yet.
            let first = if self.config.dv_on { FIRST_CALL_ON_TIME } else { 0.0 };
            out.on_time_request[..count].iter_mut().for_each(|t| *t = first);
            return ctx.write(out_id, &out);
        };

        let period = nano2sec(time.saturating_sub(prev));
        let cmd: ThrArrayCmdForceMsg = ctx.read(in_id)?;
        for i in 0..count {
            out.on_time_request[i] = self.on_time(i, cmd.thr_force[i], period);
        }
        tracing::trace!(module = ctx.tag(), time_ns = time, period, "thruster on-times");
        ctx.write(out_id, &out)
    }
}
