//! Gravity field: point masses with zonal harmonics and third-body terms.
//!
//! The central body defines the origin of the inertial integration frame.
//! Every other body contributes a third-body perturbation including the
//! indirect term, i.e. the acceleration it imparts on the central body.
//! Zonal harmonics are evaluated about the inertial z axis of each body.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// One attracting body.
///
/// `zonal` holds `[J2, J3, ...]`; an empty table is a pure point mass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GravityBodyConfig {
    pub name: String,
    /// Gravitational parameter [m^3/s^2]
    pub mu: f64,
    /// Reference radius of the zonal coefficients [m]
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub zonal: Vec<f64>,
    #[serde(default)]
    pub central: bool,
    /// Ephemeris message giving the body position; empty uses `position`
    #[serde(default)]
    pub ephemeris_msg: String,
    /// Fixed position in the ephemeris frame [m]
    #[serde(default)]
    pub position: [f64; 3],
}

impl GravityBodyConfig {
    /// Point mass with no harmonics.
    pub fn point_mass(name: impl Into<String>, mu: f64) -> Self {
        Self {
            name: name.into(),
            mu,
            radius: 0.0,
            zonal: Vec::new(),
            central: false,
            ephemeris_msg: String::new(),
            position: [0.0; 3],
        }
    }

    /// Earth with J2..J6.
    pub fn earth() -> Self {
        Self {
            radius: 6_378_136.6,
            zonal: vec![
                1.082_626_68e-3,
                -2.532_656_48e-6,
                -1.619_621_59e-6,
                -2.272_960_82e-7,
                5.406_812_39e-7,
            ],
            ..Self::point_mass("earth", 3.986_004_415e14)
        }
        .as_central()
    }

    pub fn sun() -> Self {
        Self::point_mass("sun", 1.327_124_400_18e20)
    }

    pub fn moon() -> Self {
        Self {
            radius: 1_738_100.0,
            ..Self::point_mass("moon", 4.902_799e12)
        }
    }

    pub fn as_central(mut self) -> Self {
        self.central = true;
        self
    }

    pub fn with_ephemeris(mut self, msg: impl Into<String>) -> Self {
        self.ephemeris_msg = msg.into();
        self
    }

    pub fn validate(&self) -> ModelResult<()> {
        if !(self.mu.is_finite() && self.mu > 0.0) {
            return Err(ModelError::config(
                format!("gravity.{}.mu", self.name),
                "must be positive",
            ));
        }
        if !self.zonal.is_empty() && !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ModelError::config(
                format!("gravity.{}.radius", self.name),
                "zonal harmonics need a positive reference radius",
            ));
        }
        if self.zonal.iter().any(|j| !j.is_finite()) {
            return Err(ModelError::config(
                format!("gravity.{}.zonal", self.name),
                "non-finite coefficient",
            ));
        }
        Ok(())
    }

    /// Acceleration at `r` relative to the body center.
    pub fn acceleration(&self, r: &Vector3<f64>) -> Vector3<f64> {
        let r_mag = r.norm();
        let mut accel = -self.mu / (r_mag * r_mag * r_mag) * r;
        if !self.zonal.is_empty() {
            accel += self.zonal_acceleration(r);
        }
        accel
    }

    /// Potential energy per unit mass at `r`.
    pub fn potential(&self, r: &Vector3<f64>) -> f64 {
        let r_mag = r.norm();
        let u = r.z / r_mag;
        let (p, _) = legendre(self.zonal.len() + 1, u);
        let mut v = -self.mu / r_mag;
        let mut ratio = 1.0;
        for (k, jn) in self.zonal.iter().enumerate() {
            let n = k + 2;
            ratio = if k == 0 {
                (self.radius / r_mag).powi(2)
            } else {
                ratio * self.radius / r_mag
            };
            v += self.mu / r_mag * jn * ratio * p[n];
        }
        v
    }

    /// Gradient of the zonal terms of the potential, negated.
    fn zonal_acceleration(&self, r: &Vector3<f64>) -> Vector3<f64> {
        let r_mag = r.norm();
        let u = r.z / r_mag;
        let (p, dp) = legendre(self.zonal.len() + 1, u);

        let mut d_r = 0.0;
        let mut d_u = 0.0;
        for (k, jn) in self.zonal.iter().enumerate() {
            let n = k + 2;
            let rn = (self.radius / r_mag).powi(n as i32);
            let base = jn * self.mu * rn / r_mag;
            d_r += (n as f64 + 1.0) * base / r_mag * p[n];
            d_u -= base * dp[n];
        }

        let r3 = r_mag * r_mag * r_mag;
        let du_dr = Vector3::new(-r.z * r.x / r3, -r.z * r.y / r3, 1.0 / r_mag - r.z * r.z / r3);
        d_r * r / r_mag + d_u * du_dr
    }
}

/// Legendre polynomials `P_0..=P_degree` at `u` and their derivatives.
pub fn legendre(degree: usize, u: f64) -> (Vec<f64>, Vec<f64>) {
    let mut p = vec![0.0; degree + 1];
    let mut dp = vec![0.0; degree + 1];
    p[0] = 1.0;
    if degree >= 1 {
        p[1] = u;
        dp[1] = 1.0;
    }
    for n in 1..degree {
        let nf = n as f64;
        p[n + 1] = ((2.0 * nf + 1.0) * u * p[n] - nf * p[n - 1]) / (nf + 1.0);
        dp[n + 1] = dp[n - 1] + (2.0 * nf + 1.0) * p[n];
    }
    (p, dp)
}

/// A set of bodies with exactly one central body.
#[derive(Clone, Debug)]
pub struct GravityField {
    bodies: Vec<GravityBodyConfig>,
    central: usize,
    /// Positions relative to the central body
    positions: Vec<Vector3<f64>>,
}

impl GravityField {
    pub fn new(bodies: Vec<GravityBodyConfig>) -> ModelResult<Self> {
        let centrals: Vec<usize> = bodies
            .iter()
            .enumerate()
            .filter(|(_, b)| b.central)
            .map(|(i, _)| i)
            .collect();
        if centrals.len() != 1 {
            return Err(ModelError::config(
                "gravity",
                format!("exactly one central body required, found {}", centrals.len()),
            ));
        }
        for body in &bodies {
            body.validate()?;
        }
        let mut field = Self {
            positions: vec![Vector3::zeros(); bodies.len()],
            central: centrals[0],
            bodies,
        };
        let fixed: Vec<Vector3<f64>> = field
            .bodies
            .iter()
            .map(|b| Vector3::from(b.position))
            .collect();
        field.set_positions(&fixed);
        Ok(field)
    }

    pub fn bodies(&self) -> &[GravityBodyConfig] {
        &self.bodies
    }

    pub fn central(&self) -> &GravityBodyConfig {
        &self.bodies[self.central]
    }

    /// Sets body positions in the ephemeris frame; stored relative to the
    /// central body.
    pub fn set_positions(&mut self, positions: &[Vector3<f64>]) {
        let origin = positions[self.central];
        for (slot, p) in self.positions.iter_mut().zip(positions) {
            *slot = p - origin;
        }
    }

    /// Position of body `index` relative to the central body.
    pub fn relative_position(&self, index: usize) -> Vector3<f64> {
        self.positions[index]
    }

    /// Gravitational acceleration at `r`, relative to the central body.
    pub fn acceleration(&self, r: &Vector3<f64>) -> Vector3<f64> {
        let mut accel = self.central().acceleration(r);
        for (i, body) in self.bodies.iter().enumerate() {
            if i == self.central {
                continue;
            }
            let p = self.positions[i];
            let p_mag = p.norm();
            accel += body.acceleration(&(r - p));
            if p_mag > 0.0 {
                accel -= body.mu / (p_mag * p_mag * p_mag) * p;
            }
        }
        accel
    }

    /// Potential energy per unit mass of the central body alone.
    pub fn central_potential(&self, r: &Vector3<f64>) -> f64 {
        self.central().potential(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legendre_closed_forms() {
        let u: f64 = 0.3;
        let (p, dp) = legendre(4, u);
        assert!((p[2] - 0.5 * (3.0 * u * u - 1.0)).abs() < 1e-15);
        assert!((p[3] - 0.5 * (5.0 * u.powi(3) - 3.0 * u)).abs() < 1e-15);
        assert!((dp[2] - 3.0 * u).abs() < 1e-15);
        assert!((dp[3] - 0.5 * (15.0 * u * u - 3.0)).abs() < 1e-15);
        assert!((p[4] - (35.0 * u.powi(4) - 30.0 * u * u + 3.0) / 8.0).abs() < 1e-15);
    }

    #[test]
    fn test_point_mass() {
        let body = GravityBodyConfig::point_mass("earth", 4.0e14);
        let a = body.acceleration(&Vector3::new(2.0e7, 0.0, 0.0));
        assert!((a.x + 1.0).abs() < 1e-12);
        assert_eq!(a.y, 0.0);
    }

    #[test]
    fn test_j2_equatorial_closed_form() {
        let body = GravityBodyConfig::earth();
        let r = 7.0e6;
        let a = body.acceleration(&Vector3::new(r, 0.0, 0.0));
        let j2 = body.zonal[0];
        let expected_j2 = -1.5 * j2 * body.mu * body.radius.powi(2) / r.powi(4);
        let j4_and_j6 = body.zonal_acceleration(&Vector3::new(r, 0.0, 0.0)).x - expected_j2;
        // Odd zonals vanish on the equator; the rest are far smaller than J2.
        assert!(j4_and_j6.abs() < 1e-2 * expected_j2.abs());
        assert!((a.x - (-body.mu / (r * r) + expected_j2)).abs() < 1e-2 * expected_j2.abs());
    }

    #[test]
    fn test_zonal_acceleration_is_potential_gradient() {
        let body = GravityBodyConfig::earth();
        let r = Vector3::new(4.1e6, -3.3e6, 4.4e6);
        let a = body.acceleration(&r);
        let h = 1.0;
        for axis in 0..3 {
            let mut plus = r;
            let mut minus = r;
            plus[axis] += h;
            minus[axis] -= h;
            let grad = (body.potential(&plus) - body.potential(&minus)) / (2.0 * h);
            assert!(
                (a[axis] + grad).abs() < 1e-6,
                "axis {axis}: {} vs {}",
                a[axis],
                -grad
            );
        }
    }

    #[test]
    fn test_exactly_one_central_body() {
        let none = GravityField::new(vec![GravityBodyConfig::sun()]);
        assert!(none.is_err());
        let two = GravityField::new(vec![
            GravityBodyConfig::earth(),
            GravityBodyConfig::sun().as_central(),
        ]);
        assert!(two.is_err());
    }

    #[test]
    fn test_third_body_indirect_term() {
        let mut field = GravityField::new(vec![
            GravityBodyConfig::earth(),
            GravityBodyConfig::moon(),
        ])
        .unwrap();
        let moon = Vector3::new(3.844e8, 0.0, 0.0);
        field.set_positions(&[Vector3::zeros(), moon]);
        // Direct and indirect terms leave only the tidal difference.
        let r = Vector3::new(0.0, 7.0e6, 0.0);
        let with_moon = field.acceleration(&r);
        let earth_only = field.central().acceleration(&r);
        let tidal = with_moon - earth_only;
        assert!(tidal.norm() < 1e-5);
        assert!(tidal.norm() > 0.0);
    }
}
