//! Flight software algorithms.
//!
//! These models only see what a flight computer would: sensor and
//! navigation messages in, guidance, control and actuator commands out.
//! They are normally placed in a separate process from the dynamics and
//! reached through interface bridges.

pub mod att_tracking_error;
pub mod css_wls;
pub mod inertial3d;
pub mod low_pass_torque;
pub mod mrp_feedback;
pub mod sun_safe_point;
pub mod sunline_ekf;
pub mod thr_firing_remainder;

pub use att_tracking_error::{AttTrackingError, AttTrackingErrorConfig};
pub use css_wls::{CssWlsConfig, CssWlsEst};
pub use inertial3d::{Inertial3D, Inertial3DConfig};
pub use low_pass_torque::{LowPassTorqueConfig, LowPassTorqueFilter};
pub use mrp_feedback::{MrpFeedback, MrpFeedbackConfig};
pub use sun_safe_point::{SunSafePoint, SunSafePointConfig};
pub use sunline_ekf::{SunlineEkf, SunlineEkfConfig};
pub use thr_firing_remainder::{ThrFiringRemainder, ThrFiringRemainderConfig};

use crate::messaging::{CssArraySensorMsg, CssConfigMsg, MAX_NUM_CSS};
use nalgebra::Vector3;

/// A coarse sun sensor reading above the use threshold.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CssObservation {
    pub index: usize,
    pub n_hat_b: Vector3<f64>,
    pub value: f64,
    pub weight: f64,
}

/// Pairs sensor readings with the published geometry, keeping heads whose
/// reading is strictly above `threshold`.
pub(crate) fn active_css(
    readings: &CssArraySensorMsg,
    geometry: &CssConfigMsg,
    threshold: f64,
) -> Vec<CssObservation> {
    let count = (geometry.n_css as usize).min(MAX_NUM_CSS);
    (0..count)
        .filter(|&i| readings.cos_values[i] > threshold)
        .map(|i| CssObservation {
            index: i,
            n_hat_b: Vector3::new(
                geometry.n_hat_b[3 * i],
                geometry.n_hat_b[3 * i + 1],
                geometry.n_hat_b[3 * i + 2],
            ),
            value: readings.cos_values[i],
            weight: geometry.weights[i],
        })
        .collect()
}
