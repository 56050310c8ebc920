//! Modified Rodrigues Parameters.
//!
//! `σ = ê tan(Φ/4)` describes a rotation of angle `Φ` about `ê`. The set is
//! singular at `Φ = ±360°`; keeping `|σ| <= 1` by switching to the shadow set
//! `σ_s = -σ / |σ|²` avoids the singularity. All functions here return the
//! short-rotation set.
//!
//! Naming follows the frame convention `σ_BN`: attitude of frame B relative
//! to frame N, with `dcm(σ_BN) = [BN]` mapping N components into B.

use nalgebra::{Matrix3, Vector3};

use crate::math::tilde;

/// Shadow set of `sigma`.
pub fn shadow(sigma: &Vector3<f64>) -> Vector3<f64> {
    let s2 = sigma.norm_squared();
    if s2 == 0.0 {
        return *sigma;
    }
    -sigma / s2
}

/// Switches to the shadow set when `|σ| > 1`.
pub fn switch(sigma: &Vector3<f64>) -> Vector3<f64> {
    if sigma.norm_squared() > 1.0 {
        shadow(sigma)
    } else {
        *sigma
    }
}

/// Direction cosine matrix `[BN]` of `σ_BN`.
pub fn to_dcm(sigma: &Vector3<f64>) -> Matrix3<f64> {
    let s2 = sigma.norm_squared();
    let st = tilde(sigma);
    let denom = (1.0 + s2) * (1.0 + s2);
    Matrix3::identity() + (8.0 * st * st - 4.0 * (1.0 - s2) * st) / denom
}

/// Short-rotation MRP of a direction cosine matrix.
///
/// Uses Sheppard's method to extract a quaternion, so the conversion is well
/// conditioned for every rotation angle.
pub fn from_dcm(c: &Matrix3<f64>) -> Vector3<f64> {
    let tr = c.trace();
    let b2 = [
        (1.0 + tr) / 4.0,
        (1.0 + 2.0 * c[(0, 0)] - tr) / 4.0,
        (1.0 + 2.0 * c[(1, 1)] - tr) / 4.0,
        (1.0 + 2.0 * c[(2, 2)] - tr) / 4.0,
    ];
    let mut largest = 0;
    for i in 1..4 {
        if b2[i] > b2[largest] {
            largest = i;
        }
    }

    let mut b = [0.0; 4];
    b[largest] = b2[largest].sqrt();
    let k = 4.0 * b[largest];
    match largest {
        0 => {
            b[1] = (c[(1, 2)] - c[(2, 1)]) / k;
            b[2] = (c[(2, 0)] - c[(0, 2)]) / k;
            b[3] = (c[(0, 1)] - c[(1, 0)]) / k;
        }
        1 => {
            b[0] = (c[(1, 2)] - c[(2, 1)]) / k;
            b[2] = (c[(0, 1)] + c[(1, 0)]) / k;
            b[3] = (c[(2, 0)] + c[(0, 2)]) / k;
        }
        2 => {
            b[0] = (c[(2, 0)] - c[(0, 2)]) / k;
            b[1] = (c[(0, 1)] + c[(1, 0)]) / k;
            b[3] = (c[(1, 2)] + c[(2, 1)]) / k;
        }
        _ => {
            b[0] = (c[(0, 1)] - c[(1, 0)]) / k;
            b[1] = (c[(2, 0)] + c[(0, 2)]) / k;
            b[2] = (c[(1, 2)] + c[(2, 1)]) / k;
        }
    }
    if b[0] < 0.0 {
        b.iter_mut().for_each(|x| *x = -*x);
    }
    Vector3::new(b[1], b[2], b[3]) / (1.0 + b[0])
}

/// Composite rotation: `σ_FN` from `σ_BN` (first) and `σ_FB` (second).
pub fn add(sigma_bn: &Vector3<f64>, sigma_fb: &Vector3<f64>) -> Vector3<f64> {
    let mut s1 = *sigma_bn;
    let s2 = *sigma_fb;
    let mut den = 1.0 + s1.norm_squared() * s2.norm_squared() - 2.0 * s1.dot(&s2);
    if den.abs() < 0.1 {
        s1 = shadow(&s1);
        den = 1.0 + s1.norm_squared() * s2.norm_squared() - 2.0 * s1.dot(&s2);
    }
    let num = (1.0 - s1.norm_squared()) * s2 + (1.0 - s2.norm_squared()) * s1 - 2.0 * s2.cross(&s1);
    switch(&(num / den))
}

/// Relative rotation: `σ_BR` from `σ_BN` and `σ_RN`.
pub fn sub(sigma_bn: &Vector3<f64>, sigma_rn: &Vector3<f64>) -> Vector3<f64> {
    let mut s1 = *sigma_bn;
    let s2 = *sigma_rn;
    let mut den = 1.0 + s1.norm_squared() * s2.norm_squared() + 2.0 * s1.dot(&s2);
    if den.abs() < 0.1 {
        s1 = shadow(&s1);
        den = 1.0 + s1.norm_squared() * s2.norm_squared() + 2.0 * s1.dot(&s2);
    }
    let num = (1.0 - s2.norm_squared()) * s1 - (1.0 - s1.norm_squared()) * s2 + 2.0 * s1.cross(&s2);
    switch(&(num / den))
}

/// Kinematic matrix with `σ̇ = ¼ B(σ) ω`.
pub fn b_mat(sigma: &Vector3<f64>) -> Matrix3<f64> {
    let s2 = sigma.norm_squared();
    (1.0 - s2) * Matrix3::identity() + 2.0 * tilde(sigma) + 2.0 * sigma * sigma.transpose()
}

/// MRP rate for body rate `omega`.
pub fn rate(sigma: &Vector3<f64>, omega: &Vector3<f64>) -> Vector3<f64> {
    0.25 * b_mat(sigma) * omega
}

/// MRP from principal axis `axis` (need not be unit) and angle `phi` [rad].
pub fn from_prv(axis: &Vector3<f64>, phi: f64) -> Vector3<f64> {
    let n = axis.norm();
    if n == 0.0 {
        return Vector3::zeros();
    }
    axis / n * (phi / 4.0).tan()
}

/// Principal rotation angle of `sigma` [rad].
pub fn angle(sigma: &Vector3<f64>) -> f64 {
    4.0 * sigma.norm().atan()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Vector3<f64>, b: &Vector3<f64>, tol: f64) -> bool {
        (a - b).norm() < tol
    }

    #[test]
    fn test_dcm_round_trip_below_switching_threshold() {
        let samples = [
            Vector3::new(0.1, 0.2, -0.3),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(-0.5, 0.4, 0.6),
            Vector3::new(0.99, 0.0, 0.0),
            Vector3::new(0.0, -0.577, 0.577),
            Vector3::new(1e-9, -2e-9, 3e-9),
        ];
        for sigma in samples {
            let back = from_dcm(&to_dcm(&sigma));
            assert!(close(&back, &sigma, 1e-12), "{sigma} -> {back}");
        }
    }

    #[test]
    fn test_dcm_is_orthonormal() {
        let c = to_dcm(&Vector3::new(0.3, -0.2, 0.4));
        assert!((c * c.transpose() - Matrix3::identity()).norm() < 1e-14);
        assert!((c.determinant() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_shadow_set_same_rotation() {
        let sigma = Vector3::new(0.6, -0.7, 0.5);
        let switched = switch(&sigma);
        assert!(switched.norm() <= 1.0);
        assert!((to_dcm(&sigma) - to_dcm(&switched)).norm() < 1e-13);
    }

    #[test]
    fn test_prv_axis_rotation() {
        let sigma = from_prv(&Vector3::z(), std::f64::consts::FRAC_PI_2);
        let c = to_dcm(&sigma);
        // [BN] maps the inertial x axis to -y in a frame rotated +90 deg about z.
        let x_b = c * Vector3::x();
        assert!(close(&x_b, &Vector3::new(0.0, -1.0, 0.0), 1e-12));
        assert!((angle(&sigma) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_add_and_sub_are_consistent_with_dcm() {
        let s_bn = Vector3::new(0.1, -0.2, 0.15);
        let s_fb = Vector3::new(-0.3, 0.05, 0.2);
        let s_fn = add(&s_bn, &s_fb);
        let expected = from_dcm(&(to_dcm(&s_fb) * to_dcm(&s_bn)));
        assert!(close(&s_fn, &expected, 1e-13));

        let s_br = sub(&s_fn, &s_bn);
        assert!(close(&s_br, &s_fb, 1e-13));
    }

    #[test]
    fn test_kinematics_small_angle() {
        // Near zero, sigma_dot ~ omega / 4.
        let omega = Vector3::new(0.01, -0.02, 0.03);
        assert!(close(&rate(&Vector3::zeros(), &omega), &(omega / 4.0), 1e-16));
    }
}
