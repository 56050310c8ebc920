//! Rigid body dynamics.
//!
//! [`Spacecraft`] integrates translational and rotational motion under
//! gravity and the loads of its [`DynamicEffector`]s.

pub mod effector;
pub mod gravity;
pub mod integrator;
pub mod spacecraft;
pub mod state;

pub use effector::{
    DynamicEffector, ExtForceTorque, ExtForceTorqueConfig, ForceTorque, ThrusterConfig,
    ThrusterSet, ThrusterSetConfig,
};
pub use gravity::{GravityBodyConfig, GravityField};
pub use integrator::IntegratorKind;
pub use spacecraft::{Spacecraft, SpacecraftConfig};
pub use state::{MassProperties, MassPropertiesConfig, RigidBodyState};
