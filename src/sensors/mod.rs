//! Sensor models.
//!
//! Sensors read truth messages (spacecraft state, sun position, magnetic
//! field), apply a measurement model, and publish a measurement message.
//! Noise streams are seeded per model and restart on reset.

pub mod css;
pub mod imu;
pub mod magnetometer;
pub mod noise;
pub mod simple_nav;

pub use css::{CssConstellation, CssConstellationConfig, CssHeadConfig};
pub use imu::{Imu, ImuConfig};
pub use magnetometer::{Magnetometer, MagnetometerConfig};
pub use noise::GaussNoise;
pub use simple_nav::{SimpleNav, SimpleNavConfig};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::v3;
use crate::messaging::{MessageId, SpicePlanetStateMsg};
use crate::model::{InitContext, ModelContext};

/// Where a sensor gets the sun position from.
///
/// With `sun_msg` set, the sun direction is computed from the sun position,
/// the optional central body position (`central_body_msg`) and the
/// spacecraft position relative to the central body. Otherwise the fixed
/// inertial `sun_direction_n` is used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunSourceConfig {
    pub sun_msg: String,
    pub central_body_msg: String,
    pub sun_direction_n: [f64; 3],
}

impl Default for SunSourceConfig {
    fn default() -> Self {
        Self {
            sun_msg: String::new(),
            central_body_msg: String::new(),
            sun_direction_n: [1.0, 0.0, 0.0],
        }
    }
}

impl SunSourceConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.sun_msg.is_empty() && !(v3(&self.sun_direction_n).norm() > 0.0) {
            return Err(ModelError::config("sun_direction_n", "zero-norm direction"));
        }
        Ok(())
    }
}

/// Resolved sun source.
#[derive(Clone, Debug, Default)]
pub(crate) struct SunSource {
    sun_id: Option<MessageId>,
    central_id: Option<MessageId>,
}

impl SunSource {
    pub(crate) fn link(config: &SunSourceConfig, ctx: &InitContext<'_>) -> ModelResult<Self> {
        Ok(Self {
            sun_id: ctx.subscribe_optional::<SpicePlanetStateMsg>(&config.sun_msg)?,
            central_id: ctx.subscribe_optional::<SpicePlanetStateMsg>(&config.central_body_msg)?,
        })
    }

    /// Unit inertial direction from the spacecraft to the sun.
    ///
    /// Returns `None` when the geometry is degenerate, e.g. before the sun
    /// message has been written.
    pub(crate) fn direction_n(
        &self,
        config: &SunSourceConfig,
        ctx: &ModelContext<'_>,
        r_bn_n: &Vector3<f64>,
    ) -> ModelResult<Option<Vector3<f64>>> {
        let Some(sun_id) = self.sun_id else {
            return Ok(v3(&config.sun_direction_n).try_normalize(0.0));
        };
        let sun = v3(&ctx.read::<SpicePlanetStateMsg>(sun_id)?.position_vector);
        let central = match self.central_id {
            Some(id) => v3(&ctx.read::<SpicePlanetStateMsg>(id)?.position_vector),
            None => Vector3::zeros(),
        };
        Ok((sun - central - r_bn_n).try_normalize(0.0))
    }
}

/// Clamps every component into `[min, max]`; returns true if any was clipped.
pub(crate) fn saturate(v: &mut Vector3<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    let mut clipped = false;
    for x in v.iter_mut() {
        if let Some(hi) = max {
            if *x > hi {
                *x = hi;
                clipped = true;
            }
        }
        if let Some(lo) = min {
            if *x < lo {
                *x = lo;
                clipped = true;
            }
        }
    }
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturate() {
        let mut v = Vector3::new(-5.0, 0.5, 5.0);
        assert!(saturate(&mut v, Some(-1.0), Some(1.0)));
        assert_eq!(v, Vector3::new(-1.0, 0.5, 1.0));
        assert!(!saturate(&mut v, None, None));
    }
}
