//! Fixed-step explicit integrators.

use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// Integration method, evaluated once per dynamics tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    /// Classic fourth-order Runge-Kutta
    #[default]
    Rk4,
    /// Heun's second-order method
    Rk2,
    Euler,
}

impl IntegratorKind {
    /// Advances `y` from `t` by `dt` under `f(t, y) = dy/dt`.
    pub fn step<const N: usize, F>(
        &self,
        t: f64,
        y: &SVector<f64, N>,
        dt: f64,
        mut f: F,
    ) -> SVector<f64, N>
    where
        F: FnMut(f64, &SVector<f64, N>) -> SVector<f64, N>,
    {
        match self {
            IntegratorKind::Euler => y + f(t, y) * dt,
            IntegratorKind::Rk2 => {
                let k1 = f(t, y);
                let k2 = f(t + dt, &(y + k1 * dt));
                y + (k1 + k2) * (dt / 2.0)
            }
            IntegratorKind::Rk4 => {
                let half = dt / 2.0;
                let k1 = f(t, y);
                let k2 = f(t + half, &(y + k1 * half));
                let k3 = f(t + half, &(y + k2 * half));
                let k4 = f(t + dt, &(y + k3 * dt));
                y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
            }
        }
    }

    /// Order of accuracy.
    pub fn order(&self) -> u32 {
        match self {
            IntegratorKind::Rk4 => 4,
            IntegratorKind::Rk2 => 2,
            IntegratorKind::Euler => 1,
        }
    }
}
