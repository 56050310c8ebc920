//! Model factory registry for configuration-driven scenarios.
//!
//! The registry maps a type name (as written in a scenario file) to a factory
//! that builds the model from its YAML parameters. Factories receive a seed
//! derived from the scenario seed; seeded models use it unless the
//! parameters pin one explicitly.
//!
//! # Example
//!
//! ```
//! use orrery::registry::create_default_registry;
//!
//! let registry = create_default_registry();
//! let params: serde_yaml::Value = serde_yaml::from_str("k: 6.0\np: 40.0").unwrap();
//! let model = registry.create("MrpFeedback", &params, 0);
//! assert!(matches!(model, Some(Ok(_))));
//! ```

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::model::Model;

/// Builds a model from its parameters and derived seed.
pub type ModelFactory = Arc<dyn Fn(&Value, u64) -> ModelResult<Box<dyn Model>> + Send + Sync>;

/// A registry of model factories keyed by type name.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    factories: HashMap<String, ModelFactory>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value, u64) -> ModelResult<Box<dyn Model>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Creates a model by type name.
    ///
    /// Returns `None` when the type is not registered and `Some(Err(_))` when
    /// the parameters are rejected.
    pub fn create(
        &self,
        type_name: &str,
        params: &Value,
        seed: u64,
    ) -> Option<ModelResult<Box<dyn Model>>> {
        self.factories.get(type_name).map(|f| f(params, seed))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn unregister(&mut self, type_name: &str) -> bool {
        self.factories.remove(type_name).is_some()
    }

    pub fn clear(&mut self) {
        self.factories.clear();
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("registered_types", &self.type_names())
            .finish()
    }
}

/// Parses typed parameters. A missing (null) block reads as an empty mapping.
pub fn parse_params<C: DeserializeOwned>(params: &Value) -> ModelResult<C> {
    let result = match params {
        Value::Null => serde_yaml::from_value(Value::Mapping(Mapping::new())),
        other => serde_yaml::from_value(other.clone()),
    };
    result.map_err(|e| ModelError::config("params", e.to_string()))
}

/// Parses typed parameters, using `C::default()` for a missing block.
pub fn parse_params_or_default<C: DeserializeOwned + Default>(params: &Value) -> ModelResult<C> {
    match params {
        Value::Null => Ok(C::default()),
        other => parse_params(other),
    }
}

/// Inserts `seed` into the parameters unless they already carry one.
fn seeded(params: &Value, seed: u64) -> ModelResult<Value> {
    let mut map = match params {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map.clone(),
        _ => return Err(ModelError::config("params", "expected a mapping")),
    };
    let key = Value::String("seed".to_string());
    if !map.contains_key(&key) {
        map.insert(key, Value::Number(seed.into()));
    }
    Ok(Value::Mapping(map))
}

/// Creates a registry with every built-in model type.
///
/// | Type name | Model |
/// |-----------|-------|
/// | `Spacecraft` | rigid-body dynamics with gravity and effectors |
/// | `PlanetEphemeris` | Keplerian planet positions |
/// | `MagneticDipole` | centered dipole field (Earth when no params) |
/// | `CssConstellation` | coarse sun sensors (seeded) |
/// | `Imu` | rate gyro and accelerometer (seeded) |
/// | `Magnetometer` | three-axis magnetometer (seeded) |
/// | `SimpleNav` | truth to navigation messages (seeded) |
/// | `CssWlsEst` | least squares sun heading |
/// | `SunlineEkf` | sun heading filter |
/// | `Inertial3D` | inertial reference attitude |
/// | `AttTrackingError` | attitude tracking errors |
/// | `SunSafePoint` | sun pointing guidance |
/// | `MrpFeedback` | attitude feedback control |
/// | `LowPassTorqueFilter` | torque command filter |
/// | `ThrFiringRemainder` | thruster on-time mapping |
pub fn create_default_registry() -> ModelRegistry {
    use crate::dynamics::{Spacecraft, SpacecraftConfig};
    use crate::environment::{MagneticDipole, MagneticDipoleConfig, PlanetEphemeris};
    use crate::fsw::{
        AttTrackingError, CssWlsEst, Inertial3D, LowPassTorqueFilter, MrpFeedback, SunSafePoint,
        SunlineEkf, ThrFiringRemainder,
    };
    use crate::sensors::{CssConstellation, Imu, Magnetometer, SimpleNav};

    let mut registry = ModelRegistry::new();

    registry.register("Spacecraft", |params, _| {
        let config: SpacecraftConfig = parse_params_or_default(params)?;
        Ok(Box::new(Spacecraft::new(config)?))
    });
    registry.register("PlanetEphemeris", |params, _| {
        Ok(Box::new(PlanetEphemeris::new(parse_params(params)?)?))
    });
    registry.register("MagneticDipole", |params, _| {
        let config = match params {
            Value::Null => MagneticDipoleConfig::earth(),
            other => parse_params(other)?,
        };
        Ok(Box::new(MagneticDipole::new(config)?))
    });

    registry.register("CssConstellation", |params, seed| {
        Ok(Box::new(CssConstellation::new(parse_params(&seeded(params, seed)?)?)?))
    });
    registry.register("Imu", |params, seed| {
        Ok(Box::new(Imu::new(parse_params(&seeded(params, seed)?)?)?))
    });
    registry.register("Magnetometer", |params, seed| {
        Ok(Box::new(Magnetometer::new(parse_params(&seeded(params, seed)?)?)?))
    });
    registry.register("SimpleNav", |params, seed| {
        Ok(Box::new(SimpleNav::new(parse_params(&seeded(params, seed)?)?)?))
    });

    registry.register("CssWlsEst", |params, _| {
        Ok(Box::new(CssWlsEst::new(parse_params_or_default(params)?)?))
    });
    registry.register("SunlineEkf", |params, _| {
        Ok(Box::new(SunlineEkf::new(parse_params_or_default(params)?)?))
    });
    registry.register("Inertial3D", |params, _| {
        Ok(Box::new(Inertial3D::new(parse_params_or_default(params)?)?))
    });
    registry.register("AttTrackingError", |params, _| {
        Ok(Box::new(AttTrackingError::new(parse_params_or_default(params)?)?))
    });
    registry.register("SunSafePoint", |params, _| {
        Ok(Box::new(SunSafePoint::new(parse_params_or_default(params)?)?))
    });
    registry.register("MrpFeedback", |params, _| {
        Ok(Box::new(MrpFeedback::new(parse_params_or_default(params)?)?))
    });
    registry.register("LowPassTorqueFilter", |params, _| {
        Ok(Box::new(LowPassTorqueFilter::new(parse_params_or_default(params)?)?))
    });
    registry.register("ThrFiringRemainder", |params, _| {
        Ok(Box::new(ThrFiringRemainder::new(parse_params_or_default(params)?)?))
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsw::{Inertial3D, Inertial3DConfig};
    use crate::model::ModelKind;
    use crate::sensors::ImuConfig;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_registry_basic() {
        let mut registry = ModelRegistry::new();
        assert!(registry.is_empty());

        registry.register("Reference", |_, _| {
            Ok(Box::new(Inertial3D::new(Inertial3DConfig::default())?))
        });
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("Reference"));
        assert!(registry.create("Missing", &Value::Null, 0).is_none());

        let model = registry.create("Reference", &Value::Null, 0).unwrap().unwrap();
        assert_eq!(model.kind(), ModelKind::Guidance);
    }

    #[test]
    fn test_registry_unregister() {
        let mut registry = ModelRegistry::new();
        registry.register("Reference", |_, _| {
            Ok(Box::new(Inertial3D::new(Inertial3DConfig::default())?))
        });
        assert!(registry.unregister("Reference"));
        assert!(!registry.unregister("Reference"));
        registry.register("A", |_, _| Ok(Box::new(Inertial3D::new(Default::default())?)));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_default_registry_covers_every_model() {
        let registry = create_default_registry();
        assert_eq!(registry.len(), 15);
        let names = registry.type_names();
        assert_eq!(names.first(), Some(&"AttTrackingError"));
        for name in ["Spacecraft", "CssConstellation", "SunlineEkf", "ThrFiringRemainder"] {
            assert!(registry.contains(name), "{name}");
        }
    }

    #[test]
    fn test_defaults_for_missing_params() {
        let registry = create_default_registry();
        for name in ["Spacecraft", "MagneticDipole", "Imu", "SimpleNav", "MrpFeedback", "SunlineEkf"] {
            let model = registry.create(name, &Value::Null, 1);
            assert!(matches!(model, Some(Ok(_))), "{name}");
        }
        // Heads have no sensible default.
        assert!(matches!(
            registry.create("CssConstellation", &Value::Null, 1),
            Some(Err(ModelError::Config { .. }))
        ));
    }

    #[test]
    fn test_bad_params_are_config_errors() {
        let registry = create_default_registry();
        let result = registry.create("MrpFeedback", &yaml("k: fast"), 0);
        assert!(matches!(result, Some(Err(ModelError::Config { .. }))));

        let result = registry.create("LowPassTorqueFilter", &yaml("h: -1.0"), 0);
        assert!(matches!(result, Some(Err(ModelError::Config { .. }))));
    }

    #[test]
    fn test_seed_injection_respects_explicit_seed() {
        let injected: ImuConfig = parse_params(&seeded(&Value::Null, 11).unwrap()).unwrap();
        assert_eq!(injected.seed, 11);

        let pinned: ImuConfig = parse_params(&seeded(&yaml("seed: 3"), 11).unwrap()).unwrap();
        assert_eq!(pinned.seed, 3);

        assert!(seeded(&yaml("[1, 2]"), 11).is_err());
    }
}
