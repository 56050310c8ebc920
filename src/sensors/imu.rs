//! Inertial measurement unit.
//!
//! Measures the body rate and the velocity change accumulated since the
//! previous sample, both in platform components.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, arr33, m33, v3};
use crate::messaging::{ImuSensorMsg, MessageId, ScStatesMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind, WarningKind};
use crate::sensors::noise::GaussNoise;
use crate::sensors::saturate;
use crate::types::SimTime;

fn identity() -> [f64; 9] {
    arr33(&Matrix3::identity())
}

fn default_state_msg() -> String {
    "sc_states".to_string()
}

fn default_out_msg() -> String {
    "imu_sensor".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    /// Body to platform DCM `[PB]`, row-major
    pub dcm_pb: [f64; 9],
    pub gyro_bias: [f64; 3],
    pub gyro_noise_std: [f64; 3],
    /// Rate magnitude limit per axis [rad/s]
    pub gyro_max: Option<f64>,
    pub dv_bias: [f64; 3],
    pub dv_noise_std: [f64; 3],
    pub state_msg: String,
    pub out_msg: String,
    pub seed: u64,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            dcm_pb: identity(),
            gyro_bias: [0.0; 3],
            gyro_noise_std: [0.0; 3],
            gyro_max: None,
            dv_bias: [0.0; 3],
            dv_noise_std: [0.0; 3],
            state_msg: default_state_msg(),
            out_msg: default_out_msg(),
            seed: 0,
        }
    }
}

impl ImuConfig {
    pub fn validate(&self) -> ModelResult<()> {
        let dcm = m33(&self.dcm_pb);
        if (dcm * dcm.transpose() - Matrix3::identity()).amax() > 1e-9 {
            return Err(ModelError::config("dcm_pb", "not orthonormal"));
        }
        if self
            .gyro_noise_std
            .iter()
            .chain(&self.dv_noise_std)
            .any(|s| !(*s >= 0.0))
        {
            return Err(ModelError::config("noise_std", "must be non-negative"));
        }
        if matches!(self.gyro_max, Some(m) if !(m > 0.0)) {
            return Err(ModelError::config("gyro_max", "must be positive"));
        }
        Ok(())
    }
}

pub struct Imu {
    config: ImuConfig,
    dcm_pb: Matrix3<f64>,
    noise: GaussNoise,
    state_id: Option<MessageId>,
    out_id: Option<MessageId>,
    prev_dv_b: Option<Vector3<f64>>,
}

impl Imu {
    pub fn new(config: ImuConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            dcm_pb: m33(&config.dcm_pb),
            noise: GaussNoise::new(config.seed),
            state_id: None,
            out_id: None,
            prev_dv_b: None,
            config,
        })
    }
}

impl Model for Imu {
    fn kind(&self) -> ModelKind {
        ModelKind::Sensor
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<ImuSensorMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.state_id = Some(ctx.subscribe::<ScStatesMsg>(&self.config.state_msg)?);
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.noise.reseed();
        self.prev_dv_b = None;
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(state_id), Some(out_id)) = (self.state_id, self.out_id) else {
            return Ok(());
        };
        let sc: ScStatesMsg = ctx.read(state_id)?;

        let gyro_std = v3(&self.config.gyro_noise_std);
        let mut rate_p = self.dcm_pb * v3(&sc.omega_bn_b)
            + v3(&self.config.gyro_bias)
            + self.noise.vector(&gyro_std);
        let bound = self.config.gyro_max;
        if saturate(&mut rate_p, bound.map(|b| -b), bound) {
            ctx.warn(WarningKind::Saturation, "gyro output saturated");
        }

        let dv_b = v3(&sc.total_accum_dv_bn_b);
        let delta_b = dv_b - self.prev_dv_b.unwrap_or(dv_b);
        self.prev_dv_b = Some(dv_b);
        let dv_std = v3(&self.config.dv_noise_std);
        let dv_p = self.dcm_pb * delta_b + v3(&self.config.dv_bias) + self.noise.vector(&dv_std);

        ctx.write(
            out_id,
            &ImuSensorMsg {
                ang_vel_platform: arr3(&rate_p),
                accum_dv_platform: arr3(&dv_p),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelHarness;

    #[test]
    fn test_rotated_rate_and_delta_v() {
        // Platform z along body x.
        let config = ImuConfig {
            dcm_pb: [0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
            ..Default::default()
        };
        let mut imu = Imu::new(config).unwrap();
        let mut harness = ModelHarness::new("imu");
        let mut sc = ScStatesMsg::default();
        sc.omega_bn_b = [0.1, 0.2, 0.3];
        harness.publish("sc_states", &sc, 0).unwrap();
        harness.init(&mut imu).unwrap();
        harness.reset(&mut imu, 0).unwrap();
        harness.update(&mut imu, 0).unwrap();

        let out: ImuSensorMsg = harness.read("imu_sensor", 0).unwrap();
        assert_eq!(out.ang_vel_platform, [0.2, 0.3, 0.1]);
        assert_eq!(out.accum_dv_platform, [0.0; 3]);

        sc.total_accum_dv_bn_b = [1.0, 0.0, 0.0];
        harness.publish("sc_states", &sc, 10).unwrap();
        harness.update(&mut imu, 10).unwrap();
        let out: ImuSensorMsg = harness.read("imu_sensor", 10).unwrap();
        assert_eq!(out.accum_dv_platform, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_saturation_warns() {
        let config = ImuConfig {
            gyro_max: Some(0.05),
            ..Default::default()
        };
        let mut imu = Imu::new(config).unwrap();
        let mut harness = ModelHarness::new("imu");
        let mut sc = ScStatesMsg::default();
        sc.omega_bn_b = [0.1, 0.0, -0.1];
        harness.publish("sc_states", &sc, 0).unwrap();
        harness.init(&mut imu).unwrap();
        harness.reset(&mut imu, 0).unwrap();
        harness.update(&mut imu, 0).unwrap();

        let out: ImuSensorMsg = harness.read("imu_sensor", 0).unwrap();
        assert_eq!(out.ang_vel_platform, [0.05, 0.0, -0.05]);
        assert_eq!(harness.warnings.len(), 1);
        assert_eq!(harness.warnings[0].kind, WarningKind::Saturation);
    }

    #[test]
    fn test_rejects_non_orthonormal_dcm() {
        let config = ImuConfig {
            dcm_pb: [2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            ..Default::default()
        };
        assert!(Imu::new(config).is_err());
    }
}
