//! Attitude and orbit mathematics.
//!
//! Message payloads store vectors as `[f64; 3]` and matrices as row-major
//! `[f64; 9]`; models convert to `nalgebra` types at their boundaries with
//! the helpers below.

pub mod mrp;
pub mod orbital;

use nalgebra::{Matrix3, Vector3};

/// Converts a payload array to a vector.
pub fn v3(a: &[f64; 3]) -> Vector3<f64> {
    Vector3::new(a[0], a[1], a[2])
}

/// Converts a vector to a payload array.
pub fn arr3(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

/// Row-major payload array to matrix.
pub fn m33(a: &[f64; 9]) -> Matrix3<f64> {
    Matrix3::from_row_slice(a)
}

/// Matrix to row-major payload array.
pub fn arr33(m: &Matrix3<f64>) -> [f64; 9] {
    let mut out = [0.0; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[3 * r + c] = m[(r, c)];
        }
    }
    out
}

/// Skew-symmetric cross-product matrix: `tilde(a) * b == a × b`.
pub fn tilde(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Returns true if every component is finite.
pub fn is_finite3(v: &Vector3<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}
