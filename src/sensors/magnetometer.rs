//! Three-axis magnetometer.
//!
//! `tam_s = scale · [SB][BN] B_N + bias + noise`, clamped per axis to
//! `[min_output, max_output]`. Clamping raises a saturation warning.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, arr33, m33, mrp, v3};
use crate::messaging::{MagneticFieldMsg, MessageId, ScStatesMsg, TamSensorMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind, WarningKind};
use crate::sensors::noise::GaussNoise;
use crate::sensors::saturate;
use crate::types::SimTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetometerConfig {
    /// Body to sensor DCM `[SB]`, row-major
    pub dcm_sb: [f64; 9],
    pub scale_factor: f64,
    /// [T]
    pub bias: [f64; 3],
    /// [T]
    pub noise_std: [f64; 3],
    pub min_output: Option<f64>,
    pub max_output: Option<f64>,
    pub state_msg: String,
    pub mag_msg: String,
    pub out_msg: String,
    pub seed: u64,
}

impl Default for MagnetometerConfig {
    fn default() -> Self {
        Self {
            dcm_sb: arr33(&Matrix3::identity()),
            scale_factor: 1.0,
            bias: [0.0; 3],
            noise_std: [0.0; 3],
            min_output: None,
            max_output: None,
            state_msg: "sc_states".to_string(),
            mag_msg: "mag_field".to_string(),
            out_msg: "tam_sensor".to_string(),
            seed: 0,
        }
    }
}

impl MagnetometerConfig {
    /// Sensor DCM from a yaw-pitch-roll (3-2-1) sequence [rad].
    pub fn dcm_from_ypr(yaw: f64, pitch: f64, roll: f64) -> [f64; 9] {
        let rz = nalgebra::Rotation3::from_axis_angle(&nalgebra::Vector3::z_axis(), -yaw);
        let ry = nalgebra::Rotation3::from_axis_angle(&nalgebra::Vector3::y_axis(), -pitch);
        let rx = nalgebra::Rotation3::from_axis_angle(&nalgebra::Vector3::x_axis(), -roll);
        arr33((rx * ry * rz).matrix())
    }

    pub fn validate(&self) -> ModelResult<()> {
        let dcm = m33(&self.dcm_sb);
        if (dcm * dcm.transpose() - Matrix3::identity()).amax() > 1e-9 {
            return Err(ModelError::config("dcm_sb", "not orthonormal"));
        }
        if !self.scale_factor.is_finite() {
            return Err(ModelError::config("scale_factor", "non-finite"));
        }
        if self.noise_std.iter().any(|s| !(*s >= 0.0)) {
            return Err(ModelError::config("noise_std", "must be non-negative"));
        }
        if let (Some(lo), Some(hi)) = (self.min_output, self.max_output) {
            if lo > hi {
                return Err(ModelError::config("min_output", "exceeds max_output"));
            }
        }
        Ok(())
    }
}

pub struct Magnetometer {
    config: MagnetometerConfig,
    dcm_sb: Matrix3<f64>,
    noise: GaussNoise,
    state_id: Option<MessageId>,
    mag_id: Option<MessageId>,
    out_id: Option<MessageId>,
}

impl Magnetometer {
    pub fn new(config: MagnetometerConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            dcm_sb: m33(&config.dcm_sb),
            noise: GaussNoise::new(config.seed),
            state_id: None,
            mag_id: None,
            out_id: None,
            config,
        })
    }
}

impl Model for Magnetometer {
    fn kind(&self) -> ModelKind {
        ModelKind::Sensor
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<TamSensorMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.state_id = Some(ctx.subscribe::<ScStatesMsg>(&self.config.state_msg)?);
        self.mag_id = Some(ctx.subscribe::<MagneticFieldMsg>(&self.config.mag_msg)?);
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.noise.reseed();
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(state_id), Some(mag_id), Some(out_id)) = (self.state_id, self.mag_id, self.out_id)
        else {
            return Ok(());
        };
        let sc: ScStatesMsg = ctx.read(state_id)?;
        let field: MagneticFieldMsg = ctx.read(mag_id)?;

        let dcm_bn = mrp::to_dcm(&v3(&sc.sigma_bn));
        let true_s = self.dcm_sb * dcm_bn * v3(&field.mag_field_n);
        let mut sensed = self.config.scale_factor * true_s
            + v3(&self.config.bias)
            + self.noise.vector(&v3(&self.config.noise_std));
        if saturate(&mut sensed, self.config.min_output, self.config.max_output) {
            ctx.warn(WarningKind::Saturation, "magnetometer output saturated");
        }
        ctx.write(out_id, &TamSensorMsg { tam_s: arr3(&sensed) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelHarness;

    fn harness_with(field_n: [f64; 3], sigma_bn: [f64; 3]) -> ModelHarness {
        let mut harness = ModelHarness::new("tam");
        let mut sc = ScStatesMsg::default();
        sc.sigma_bn = sigma_bn;
        harness.publish("sc_states", &sc, 0).unwrap();
        harness
            .publish("mag_field", &MagneticFieldMsg { mag_field_n: field_n }, 0)
            .unwrap();
        harness
    }

    #[test]
    fn test_field_in_sensor_frame() {
        // Body rotated +90 deg about z: inertial x appears along body -y.
        let sigma = [0.0, 0.0, (std::f64::consts::FRAC_PI_2 / 4.0).tan()];
        let mut harness = harness_with([2.0e-5, 0.0, 0.0], sigma);
        let mut tam = Magnetometer::new(MagnetometerConfig {
            bias: [1.0e-7, 0.0, 0.0],
            ..Default::default()
        })
        .unwrap();
        harness.init(&mut tam).unwrap();
        harness.reset(&mut tam, 0).unwrap();
        harness.update(&mut tam, 0).unwrap();

        let out: TamSensorMsg = harness.read("tam_sensor", 0).unwrap();
        assert!((out.tam_s[0] - 1.0e-7).abs() < 1e-18);
        assert!((out.tam_s[1] + 2.0e-5).abs() < 1e-18);
    }

    #[test]
    fn test_saturation_clamps_and_warns() {
        let mut harness = harness_with([5.0e-5, -5.0e-5, 0.0], [0.0; 3]);
        let mut tam = Magnetometer::new(MagnetometerConfig {
            min_output: Some(-3.0e-5),
            max_output: Some(3.0e-5),
            ..Default::default()
        })
        .unwrap();
        harness.init(&mut tam).unwrap();
        harness.reset(&mut tam, 0).unwrap();
        harness.update(&mut tam, 0).unwrap();

        let out: TamSensorMsg = harness.read("tam_sensor", 0).unwrap();
        assert_eq!(out.tam_s, [3.0e-5, -3.0e-5, 0.0]);
        assert_eq!(harness.warnings.len(), 1);
    }

    #[test]
    fn test_ypr_dcm_is_orthonormal() {
        let dcm = m33(&MagnetometerConfig::dcm_from_ypr(0.3, -0.2, 0.9));
        assert!((dcm * dcm.transpose() - Matrix3::identity()).amax() < 1e-14);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let config = MagnetometerConfig {
            noise_std: [1.0e-7; 3],
            seed: 99,
            ..Default::default()
        };
        let mut readings = Vec::new();
        for _ in 0..2 {
            let mut harness = harness_with([2.0e-5, 1.0e-5, 0.0], [0.0; 3]);
            let mut tam = Magnetometer::new(config.clone()).unwrap();
            harness.init(&mut tam).unwrap();
            harness.reset(&mut tam, 0).unwrap();
            harness.update(&mut tam, 0).unwrap();
            let out: TamSensorMsg = harness.read("tam_sensor", 0).unwrap();
            readings.push(out.tam_s);
        }
        assert_eq!(readings[0], readings[1]);
        assert_ne!(readings[0], [2.0e-5, 1.0e-5, 0.0]);
    }
}
