//! Weighted least squares sun heading from coarse sun sensors.
//!
//! Every head reading above `use_threshold` contributes one row `n̂ᵀ` of the
//! observation matrix `H` and one measurement `y`. The estimate solves the
//! normal equations `(HᵀWH) s = HᵀW y` and is normalized. With fewer than
//! three active heads, or when the normal matrix is ill-conditioned (all
//! active heads nearly coplanar), the solution is not unique: the status
//! is flagged invalid and the last valid heading is held.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::fsw::{active_css, CssObservation};
use crate::math::arr3;
use crate::messaging::{CssArraySensorMsg, CssConfigMsg, CssWlsStatusMsg, MessageId};
use crate::model::{InitContext, Model, ModelContext, ModelKind, WarningKind};
use crate::types::SimTime;

/// Heads needed for a unique three-axis solution.
const MIN_ACTIVE: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CssWlsConfig {
    /// Readings at or below this value are ignored
    pub use_threshold: f64,
    /// Scale each head's confidence by its reading
    pub use_weights: bool,
    /// Smallest accepted ratio of the extreme eigenvalues of `HᵀWH`
    pub min_condition: f64,
    pub css_msg: String,
    pub css_config_msg: String,
    pub out_msg: String,
}

impl Default for CssWlsConfig {
    fn default() -> Self {
        Self {
            use_threshold: 0.0,
            use_weights: false,
            min_condition: 1e-6,
            css_msg: "css_sensors".to_string(),
            css_config_msg: "css_config".to_string(),
            out_msg: "css_wls_est".to_string(),
        }
    }
}

impl CssWlsConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if !self.use_threshold.is_finite() {
            return Err(ModelError::config("use_threshold", "non-finite"));
        }
        if !(self.min_condition > 0.0 && self.min_condition < 1.0) {
            return Err(ModelError::config("min_condition", "must be in (0, 1)"));
        }
        Ok(())
    }
}

/// Why a solve produced no heading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WlsFailure {
    TooFewSensors(usize),
    IllConditioned,
}

/// Solves the weighted normal equations for the unit sun heading.
pub(crate) fn solve(
    observations: &[CssObservation],
    use_weights: bool,
    min_condition: f64,
) -> Result<Vector3<f64>, WlsFailure> {
    if observations.len() < MIN_ACTIVE {
        return Err(WlsFailure::TooFewSensors(observations.len()));
    }
    let mut normal = Matrix3::zeros();
    let mut rhs = Vector3::zeros();
    for obs in observations {
        let w = if use_weights { obs.weight * obs.value } else { obs.weight };
        normal += w * obs.n_hat_b * obs.n_hat_b.transpose();
        rhs += w * obs.value * obs.n_hat_b;
    }

    let eigen = normal.symmetric_eigenvalues();
    let (lo, hi) = (eigen.min(), eigen.max());
    if !(hi > 0.0) || lo / hi < min_condition {
        return Err(WlsFailure::IllConditioned);
    }
    let solution = normal
        .cholesky()
        .map(|c| c.solve(&rhs))
        .ok_or(WlsFailure::IllConditioned)?;
    solution.try_normalize(0.0).ok_or(WlsFailure::IllConditioned)
}

pub struct CssWlsEst {
    config: CssWlsConfig,
    last_valid: Vector3<f64>,
    css_id: Option<MessageId>,
    geometry_id: Option<MessageId>,
    out_id: Option<MessageId>,
}

impl CssWlsEst {
    pub fn new(config: CssWlsConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            last_valid: Vector3::zeros(),
            css_id: None,
            geometry_id: None,
            out_id: None,
        })
    }
}

impl Model for CssWlsEst {
    fn kind(&self) -> ModelKind {
        ModelKind::Estimator
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<CssWlsStatusMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.css_id = Some(ctx.subscribe::<CssArraySensorMsg>(&self.config.css_msg)?);
        self.geometry_id = Some(ctx.subscribe::<CssConfigMsg>(&self.config.css_config_msg)?);
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.last_valid = Vector3::zeros();
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(css_id), Some(geometry_id), Some(out_id)) =
            (self.css_id, self.geometry_id, self.out_id)
        else {
            return Ok(());
        };
        let readings: CssArraySensorMsg = ctx.read(css_id)?;
        let geometry: CssConfigMsg = ctx.read(geometry_id)?;
        let active = active_css(&readings, &geometry, self.config.use_threshold);

        let mut status = CssWlsStatusMsg {
            time_tag: ctx.time_sec(),
            num_active: active.len() as u32,
            ..Default::default()
        };
        match solve(&active, self.config.use_weights, self.config.min_condition) {
            Ok(heading) => {
                self.last_valid = heading;
                status.valid = true;
                for obs in &active {
                    status.post_fit_res[obs.index] = obs.value - obs.n_hat_b.dot(&heading);
                }
            }
            Err(failure) => {
                ctx.warn(
                    WarningKind::DegenerateGeometry,
                    format!("sun heading not observable: {failure:?}"),
                );
            }
        }
        status.sun_vector_b = arr3(&self.last_valid);
        ctx.write(out_id, &status)
    }
}
