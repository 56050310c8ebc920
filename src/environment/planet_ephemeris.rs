//! Heliocentric planet positions from Keplerian elements.
//!
//! Each planet gets a `<name>_planet_data` message. The mean anomaly is
//! propagated from the reset epoch, so the configured true anomaly is the
//! planet's position at reset.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::arr3;
use crate::math::orbital::{self, ClassicElements};
use crate::messaging::{MessageId, SpicePlanetStateMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::{nano2sec, SimTime};

/// Sun gravitational parameter [m^3/s^2].
pub const MU_SUN: f64 = 1.327_124_400_18e20;

/// Astronomical unit [m].
pub const AU: f64 = 1.495_978_707e11;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanetOrbit {
    pub name: String,
    pub elements: ClassicElements,
}

fn default_mu() -> f64 {
    MU_SUN
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanetEphemerisConfig {
    pub planets: Vec<PlanetOrbit>,
    /// Gravitational parameter of the primary [m^3/s^2]
    #[serde(default = "default_mu")]
    pub mu: f64,
}

impl PlanetEphemerisConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if !(self.mu.is_finite() && self.mu > 0.0) {
            return Err(ModelError::config("mu", "must be positive"));
        }
        for planet in &self.planets {
            let el = &planet.elements;
            if !(el.a.is_finite() && el.a > 0.0) {
                return Err(ModelError::config(
                    format!("planets.{}.a", planet.name),
                    "semi-major axis must be positive",
                ));
            }
            if !(0.0..1.0).contains(&el.e) {
                return Err(ModelError::config(
                    format!("planets.{}.e", planet.name),
                    "only elliptic orbits are supported",
                ));
            }
        }
        Ok(())
    }
}

pub struct PlanetEphemeris {
    config: PlanetEphemerisConfig,
    out_ids: Vec<MessageId>,
    epoch: SimTime,
}

impl PlanetEphemeris {
    pub fn new(config: PlanetEphemerisConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            out_ids: Vec::new(),
            epoch: 0,
        })
    }

    /// Name of the output message of `planet`.
    pub fn message_name(planet: &str) -> String {
        format!("{planet}_planet_data")
    }

    fn publish(&self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        let dt = nano2sec(time.saturating_sub(self.epoch));
        for (planet, id) in self.config.planets.iter().zip(&self.out_ids) {
            let el = orbital::propagate(self.config.mu, &planet.elements, dt);
            let (r, v) = orbital::elem2rv(self.config.mu, &el);
            let msg = SpicePlanetStateMsg {
                j2000_current: nano2sec(time),
                position_vector: arr3(&r),
                velocity_vector: arr3(&v),
            };
            ctx.write(*id, &msg)?;
        }
        Ok(())
    }
}

impl Model for PlanetEphemeris {
    fn kind(&self) -> ModelKind {
        ModelKind::Environment
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_ids = self
            .config
            .planets
            .iter()
            .map(|p| ctx.create::<SpicePlanetStateMsg>(&Self::message_name(&p.name)))
            .collect::<ModelResult<_>>()?;
        Ok(())
    }

    fn reset(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        self.epoch = time;
        self.publish(ctx, time)
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
        self.publish(ctx, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::v3;
    use crate::model::ModelHarness;
    use crate::types::sec2nano;

    fn earth_orbit() -> PlanetOrbit {
        PlanetOrbit {
            name: "earth".into(),
            elements: ClassicElements {
                a: AU,
                e: 0.0167,
                i: 0.0,
                raan: 0.0,
                argp: 1.8,
                f: 0.5,
            },
        }
    }

    #[test]
    fn test_position_at_epoch_matches_elements() {
        let config = PlanetEphemerisConfig {
            planets: vec![earth_orbit()],
            mu: MU_SUN,
        };
        let mut eph = PlanetEphemeris::new(config).unwrap();
        let mut harness = ModelHarness::new("eph");
        harness.init(&mut eph).unwrap();
        harness.reset(&mut eph, sec2nano(100.0)).unwrap();

        let msg: SpicePlanetStateMsg = harness.read("earth_planet_data", sec2nano(100.0)).unwrap();
        let (r, _) = orbital::elem2rv(MU_SUN, &earth_orbit().elements);
        assert!((v3(&msg.position_vector) - r).norm() < 10.0);
        assert_eq!(msg.j2000_current, 100.0);
    }

    #[test]
    fn test_moves_along_orbit() {
        let config = PlanetEphemerisConfig {
            planets: vec![earth_orbit()],
            mu: MU_SUN,
        };
        let mut eph = PlanetEphemeris::new(config).unwrap();
        let mut harness = ModelHarness::new("eph");
        harness.init(&mut eph).unwrap();
        harness.reset(&mut eph, 0).unwrap();
        let t = sec2nano(86_400.0);
        harness.update(&mut eph, t).unwrap();

        let msg: SpicePlanetStateMsg = harness.read("earth_planet_data", t).unwrap();
        let r = v3(&msg.position_vector).norm();
        assert!((r / AU - 1.0).abs() < 0.02);
        // Roughly one degree of heliocentric motion per day.
        let (r0, _) = orbital::elem2rv(MU_SUN, &earth_orbit().elements);
        let angle = r0.angle(&v3(&msg.position_vector));
        assert!(angle > 0.015 && angle < 0.02);
    }

    #[test]
    fn test_rejects_hyperbolic_elements() {
        let mut orbit = earth_orbit();
        orbit.elements.e = 1.2;
        let config = PlanetEphemerisConfig {
            planets: vec![orbit],
            mu: MU_SUN,
        };
        assert!(PlanetEphemeris::new(config).is_err());
    }
}
