//! Rigid body state and mass properties.

use nalgebra::{Cholesky, Matrix3, SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{m33, mrp, v3};

/// Number of integrated state elements.
pub const STATE_SIZE: usize = 12;

/// Packed integrator state.
pub type StateVector = SVector<f64, STATE_SIZE>;

/// Translational and rotational state of the center of mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidBodyState {
    /// Center of mass position relative to the central body [m]
    pub r_cn_n: Vector3<f64>,
    /// Center of mass inertial velocity [m/s]
    pub v_cn_n: Vector3<f64>,
    /// Body attitude relative to inertial
    pub sigma_bn: Vector3<f64>,
    /// Body angular rate in body components [rad/s]
    pub omega_bn_b: Vector3<f64>,
}

impl RigidBodyState {
    pub fn to_vector(&self) -> StateVector {
        let mut y = StateVector::zeros();
        y.fixed_rows_mut::<3>(0).copy_from(&self.r_cn_n);
        y.fixed_rows_mut::<3>(3).copy_from(&self.v_cn_n);
        y.fixed_rows_mut::<3>(6).copy_from(&self.sigma_bn);
        y.fixed_rows_mut::<3>(9).copy_from(&self.omega_bn_b);
        y
    }

    pub fn from_vector(y: &StateVector) -> Self {
        Self {
            r_cn_n: y.fixed_rows::<3>(0).into_owned(),
            v_cn_n: y.fixed_rows::<3>(3).into_owned(),
            sigma_bn: y.fixed_rows::<3>(6).into_owned(),
            omega_bn_b: y.fixed_rows::<3>(9).into_owned(),
        }
    }

    /// `[NB]`, mapping body components into inertial ones.
    pub fn dcm_nb(&self) -> Matrix3<f64> {
        mrp::to_dcm(&self.sigma_bn).transpose()
    }

    pub fn is_finite(&self) -> bool {
        self.to_vector().iter().all(|x| x.is_finite())
    }
}

/// Serialized mass properties.
///
/// `inertia` is about the center of mass in body components, row-major.
/// `com_offset` is the center of mass position relative to the body point B.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassPropertiesConfig {
    pub mass: f64,
    pub inertia: [f64; 9],
    #[serde(default)]
    pub com_offset: [f64; 3],
}

impl Default for MassPropertiesConfig {
    fn default() -> Self {
        Self {
            mass: 750.0,
            inertia: [900.0, 0.0, 0.0, 0.0, 800.0, 0.0, 0.0, 0.0, 600.0],
            com_offset: [0.0; 3],
        }
    }
}

/// Validated mass properties, fixed for the duration of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct MassProperties {
    pub mass: f64,
    pub inertia_c: Matrix3<f64>,
    pub inertia_inv: Matrix3<f64>,
    pub r_bcb_b: Vector3<f64>,
}

impl MassProperties {
    /// Validates mass and inertia.
    ///
    /// The inertia must be symmetric and positive definite.
    pub fn new(config: &MassPropertiesConfig) -> ModelResult<Self> {
        if !(config.mass.is_finite() && config.mass > 0.0) {
            return Err(ModelError::config("mass", "must be positive"));
        }
        let inertia = m33(&config.inertia);
        if inertia.iter().any(|x| !x.is_finite()) {
            return Err(ModelError::config("inertia", "non-finite element"));
        }
        let scale = inertia.amax().max(f64::MIN_POSITIVE);
        if (inertia - inertia.transpose()).amax() > 1e-9 * scale {
            return Err(ModelError::config("inertia", "not symmetric"));
        }
        let chol = Cholesky::new(inertia)
            .ok_or_else(|| ModelError::config("inertia", "not positive definite"))?;
        Ok(Self {
            mass: config.mass,
            inertia_c: inertia,
            inertia_inv: chol.inverse(),
            r_bcb_b: v3(&config.com_offset),
        })
    }
}
