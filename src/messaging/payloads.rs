//! Message payload catalog shared by the built-in models.
//!
//! Vectors are stored as `[f64; 3]`, matrices flattened row-major as
//! `[f64; 9]`. Frame suffixes follow the usual convention: `_n` inertial,
//! `_b` body, `_p` platform, `_s` sensor.

use crate::message;

/// Maximum number of coarse sun sensor heads per constellation.
pub const MAX_NUM_CSS: usize = 32;

/// Maximum number of thrusters per set.
pub const MAX_THRUSTERS: usize = 36;

message! {
    /// Spacecraft truth state published by the dynamics.
    pub struct ScStatesMsg {
        r_bn_n: [f64; 3],
        v_bn_n: [f64; 3],
        r_cn_n: [f64; 3],
        v_cn_n: [f64; 3],
        sigma_bn: [f64; 3],
        omega_bn_b: [f64; 3],
        omega_dot_bn_b: [f64; 3],
        total_accum_dv_bn_b: [f64; 3],
        non_conservative_accel_b: [f64; 3],
    }
}

message! {
    /// Position and velocity of a celestial body.
    pub struct SpicePlanetStateMsg {
        j2000_current: f64,
        position_vector: [f64; 3],
        velocity_vector: [f64; 3],
    }
}

message! {
    /// Local magnetic field in inertial components [T].
    pub struct MagneticFieldMsg {
        mag_field_n: [f64; 3],
    }
}

message! {
    /// Coarse sun sensor outputs, one cosine value per head.
    pub struct CssArraySensorMsg {
        cos_values: [f64; MAX_NUM_CSS],
    }
}

message! {
    /// Coarse sun sensor geometry for flight software.
    pub struct CssConfigMsg {
        n_css: u32,
        n_hat_b: [f64; 3 * MAX_NUM_CSS],
        weights: [f64; MAX_NUM_CSS],
    }
}

message! {
    /// Rate gyro and accelerometer output in platform frame.
    pub struct ImuSensorMsg {
        ang_vel_platform: [f64; 3],
        accum_dv_platform: [f64; 3],
    }
}

message! {
    /// Three-axis magnetometer output in sensor frame [T].
    pub struct TamSensorMsg {
        tam_s: [f64; 3],
    }
}

message! {
    /// Navigation attitude solution.
    pub struct NavAttMsg {
        time_tag: f64,
        sigma_bn: [f64; 3],
        omega_bn_b: [f64; 3],
        veh_sun_pnt_bdy: [f64; 3],
    }
}

message! {
    /// Navigation translational solution.
    pub struct NavTransMsg {
        time_tag: f64,
        r_bn_n: [f64; 3],
        v_bn_n: [f64; 3],
        veh_accum_dv: [f64; 3],
    }
}

message! {
    /// Reference attitude relative to inertial.
    pub struct AttRefMsg {
        sigma_rn: [f64; 3],
        omega_rn_n: [f64; 3],
        domega_rn_n: [f64; 3],
    }
}

message! {
    /// Attitude tracking errors relative to the reference frame.
    pub struct AttGuidMsg {
        sigma_br: [f64; 3],
        omega_br_b: [f64; 3],
        omega_rn_b: [f64; 3],
        domega_rn_b: [f64; 3],
    }
}

message! {
    /// Commanded body torque about the center of mass [N m].
    pub struct CmdTorqueBodyMsg {
        torque_request_body: [f64; 3],
    }
}

message! {
    /// Requested force per thruster [N].
    pub struct ThrArrayCmdForceMsg {
        thr_force: [f64; MAX_THRUSTERS],
    }
}

message! {
    /// Requested on-time per thruster [s].
    pub struct ThrArrayOnTimeCmdMsg {
        on_time_request: [f64; MAX_THRUSTERS],
    }
}

message! {
    /// Vehicle mass properties for flight software.
    pub struct VehicleConfigMsg {
        inertia_b: [f64; 9],
        com_b: [f64; 3],
        mass: f64,
    }
}

message! {
    /// Weighted least squares sun heading solution.
    pub struct CssWlsStatusMsg {
        time_tag: f64,
        sun_vector_b: [f64; 3],
        valid: bool,
        num_active: u32,
        post_fit_res: [f64; MAX_NUM_CSS],
    }
}

message! {
    /// Sunline filter state, covariance and residuals.
    pub struct SunlineFilterMsg {
        time_tag: f64,
        num_obs: u32,
        state: [f64; 6],
        covar: [f64; 36],
        post_fit_res: [f64; MAX_NUM_CSS],
        diverged: bool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{field_range, Message};

    #[test]
    fn test_payload_sizes() {
        assert_eq!(ScStatesMsg::size(), 27);
        assert_eq!(CssConfigMsg::size(), 1 + 96 + 32);
        assert_eq!(SunlineFilterMsg::size(), 1 + 1 + 6 + 36 + 32 + 1);
        assert_eq!(
            field_range(ScStatesMsg::layout(), "sigma_bn"),
            Some(12..15)
        );
    }
}
