//! Classical orbital elements and Kepler's equation.
//!
//! Only elliptic orbits (`0 <= e < 1`) are handled; they are what the
//! planet ephemeris and scenario set-up need.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const KEPLER_TOL: f64 = 1e-13;
const KEPLER_MAX_ITER: usize = 50;

/// Classical orbital elements. Angles in radians, `a` in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassicElements {
    /// Semi-major axis
    pub a: f64,
    /// Eccentricity
    pub e: f64,
    /// Inclination
    pub i: f64,
    /// Right ascension of the ascending node
    #[serde(alias = "Omega")]
    pub raan: f64,
    /// Argument of periapsis
    #[serde(alias = "omega")]
    pub argp: f64,
    /// True anomaly
    pub f: f64,
}

impl Default for ClassicElements {
    fn default() -> Self {
        Self {
            a: 7_000_000.0,
            e: 0.0,
            i: 0.0,
            raan: 0.0,
            argp: 0.0,
            f: 0.0,
        }
    }
}

impl ClassicElements {
    /// Semi-latus rectum.
    pub fn p(&self) -> f64 {
        self.a * (1.0 - self.e * self.e)
    }
}

/// Inertial position and velocity from elements.
pub fn elem2rv(mu: f64, el: &ClassicElements) -> (Vector3<f64>, Vector3<f64>) {
    let p = el.p();
    let r = p / (1.0 + el.e * el.f.cos());
    let theta = el.argp + el.f;
    let (st, ct) = theta.sin_cos();
    let (so, co) = el.raan.sin_cos();
    let (si, ci) = el.i.sin_cos();

    let r_vec = r * Vector3::new(co * ct - so * st * ci, so * ct + co * st * ci, st * si);

    let h = (mu * p).sqrt();
    let k = -mu / h;
    let ew = el.e * el.argp.cos();
    let es = el.e * el.argp.sin();
    let v_vec = k * Vector3::new(
        co * (st + es) + so * (ct + ew) * ci,
        so * (st + es) - co * (ct + ew) * ci,
        -(ct + ew) * si,
    );
    (r_vec, v_vec)
}

/// Elements from inertial position and velocity.
///
/// Undefined angles of circular or equatorial orbits are set to zero and
/// folded into the next defined angle.
pub fn rv2elem(mu: f64, r: &Vector3<f64>, v: &Vector3<f64>) -> ClassicElements {
    let r_mag = r.norm();
    let h = r.cross(v);
    let h_mag = h.norm();
    let n = Vector3::z().cross(&h);
    let n_mag = n.norm();
    let e_vec = ((v.norm_squared() - mu / r_mag) * r - r.dot(v) * v) / mu;
    let e = e_vec.norm();
    let energy = v.norm_squared() / 2.0 - mu / r_mag;
    let a = -mu / (2.0 * energy);
    let i = (h.z / h_mag).clamp(-1.0, 1.0).acos();

    const SMALL: f64 = 1e-11;
    let circular = e < SMALL;
    let equatorial = n_mag < SMALL * h_mag;

    let raan = if equatorial {
        0.0
    } else {
        wrap(n.y.atan2(n.x))
    };

    let (argp, f) = match (circular, equatorial) {
        (false, false) => {
            let argp = angle_between(&n, &e_vec, e_vec.z < 0.0);
            let f = angle_between(&e_vec, r, r.dot(v) < 0.0);
            (argp, f)
        }
        (false, true) => {
            let mut argp = wrap(e_vec.y.atan2(e_vec.x));
            if h.z < 0.0 {
                argp = wrap(2.0 * PI - argp);
            }
            (argp, angle_between(&e_vec, r, r.dot(v) < 0.0))
        }
        (true, false) => (0.0, angle_between(&n, r, r.z < 0.0)),
        (true, true) => {
            let mut lon = wrap(r.y.atan2(r.x));
            if h.z < 0.0 {
                lon = wrap(2.0 * PI - lon);
            }
            (0.0, lon)
        }
    };

    ClassicElements {
        a,
        e,
        i,
        raan,
        argp,
        f,
    }
}

fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>, flip: bool) -> f64 {
    let c = (a.dot(b) / (a.norm() * b.norm())).clamp(-1.0, 1.0);
    let angle = c.acos();
    if flip {
        2.0 * PI - angle
    } else {
        angle
    }
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap(angle: f64) -> f64 {
    let w = angle.rem_euclid(2.0 * PI);
    if w >= 2.0 * PI {
        0.0
    } else {
        w
    }
}

/// Mean motion [rad/s].
pub fn mean_motion(mu: f64, a: f64) -> f64 {
    (mu / (a * a * a)).sqrt()
}

/// Orbital period [s].
pub fn period(mu: f64, a: f64) -> f64 {
    2.0 * PI / mean_motion(mu, a)
}

/// Specific mechanical energy of a state.
pub fn specific_energy(mu: f64, r: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    v.norm_squared() / 2.0 - mu / r.norm()
}

pub fn true_to_eccentric(f: f64, e: f64) -> f64 {
    let (sf, cf) = f.sin_cos();
    wrap(((1.0 - e * e).sqrt() * sf).atan2(e + cf))
}

pub fn eccentric_to_true(ecc: f64, e: f64) -> f64 {
    let (se, ce) = ecc.sin_cos();
    wrap(((1.0 - e * e).sqrt() * se).atan2(ce - e))
}

pub fn eccentric_to_mean(ecc: f64, e: f64) -> f64 {
    wrap(ecc - e * ecc.sin())
}

/// Solves Kepler's equation `M = E - e sin E` with Newton iterations.
pub fn mean_to_eccentric(mean: f64, e: f64) -> f64 {
    let m = wrap(mean);
    let mut ecc = if e < 0.8 { m } else { PI };
    for _ in 0..KEPLER_MAX_ITER {
        let delta = (ecc - e * ecc.sin() - m) / (1.0 - e * ecc.cos());
        ecc -= delta;
        if delta.abs() < KEPLER_TOL {
            break;
        }
    }
    wrap(ecc)
}

pub fn true_to_mean(f: f64, e: f64) -> f64 {
    eccentric_to_mean(true_to_eccentric(f, e), e)
}

pub fn mean_to_true(mean: f64, e: f64) -> f64 {
    eccentric_to_true(mean_to_eccentric(mean, e), e)
}

/// Propagates elements by `dt` seconds along the unperturbed orbit.
pub fn propagate(mu: f64, el: &ClassicElements, dt: f64) -> ClassicElements {
    let m0 = true_to_mean(el.f, el.e);
    let m = m0 + mean_motion(mu, el.a) * dt;
    ClassicElements {
        f: mean_to_true(m, el.e),
        ..*el
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MU_EARTH: f64 = 3.986004418e14;

    fn angle_close(a: f64, b: f64) -> bool {
        let d = (a - b).rem_euclid(2.0 * PI);
        d < 1e-9 || (2.0 * PI - d) < 1e-9
    }

    #[test]
    fn test_elements_round_trip() {
        let el = ClassicElements {
            a: 7_500_000.0,
            e: 0.1,
            i: 0.6,
            raan: 1.2,
            argp: 0.4,
            f: 2.0,
        };
        let (r, v) = elem2rv(MU_EARTH, &el);
        let back = rv2elem(MU_EARTH, &r, &v);
        assert!((back.a - el.a).abs() / el.a < 1e-10);
        assert!((back.e - el.e).abs() < 1e-10);
        assert!(angle_close(back.i, el.i));
        assert!(angle_close(back.raan, el.raan));
        assert!(angle_close(back.argp, el.argp));
        assert!(angle_close(back.f, el.f));
    }

    #[test]
    fn test_circular_speed() {
        let el = ClassicElements::default();
        let (r, v) = elem2rv(MU_EARTH, &el);
        assert!((r.norm() - el.a).abs() < 1e-6);
        assert!((v.norm() - (MU_EARTH / el.a).sqrt()).abs() < 1e-9);
        assert!(r.dot(&v).abs() < 1e-3);
    }

    #[test]
    fn test_kepler_equation() {
        for &e in &[0.0, 0.3, 0.9] {
            for k in 0..12 {
                let m = k as f64 * 0.5;
                let ecc = mean_to_eccentric(m, e);
                assert!(angle_close(ecc - e * ecc.sin(), m));
                assert!(angle_close(true_to_mean(mean_to_true(m, e), e), m));
            }
        }
    }

    #[test]
    fn test_full_period_returns_to_start() {
        let el = ClassicElements {
            e: 0.2,
            f: 0.7,
            ..Default::default()
        };
        let later = propagate(MU_EARTH, &el, period(MU_EARTH, el.a));
        assert!(angle_close(later.f, el.f));
    }
}
