//! Sunline extended Kalman filter.
//!
//! Six states: the body-frame sun heading `d` and its rate `ḋ`. The
//! propagation model is a constant heading rate, so the state transition
//! matrix over `Δt` is `Φ = I + A Δt` with `A = [[0, I], [0, 0]]`, and
//! process noise enters through `Γ = [Δt²/2 I; Δt I]`.
//!
//! Each head reading above the use threshold is a scalar observation
//! `y = n̂ · d` with variance `q_obs`. Observations are processed one at a
//! time with the Joseph-form covariance update, which is equivalent to a
//! batch update because the measurement noise is uncorrelated.

use nalgebra::{Matrix3, Matrix6, RowVector6, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::fsw::{active_css, CssObservation};
use crate::math::arr3;
use crate::messaging::{
    CssArraySensorMsg, CssConfigMsg, MessageId, NavAttMsg, SunlineFilterMsg,
};
use crate::model::{InitContext, Model, ModelContext, ModelKind, WarningKind};
use crate::types::SimTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunlineEkfConfig {
    /// Initial `[d, ḋ]`
    pub state: [f64; 6],
    /// Initial covariance, row-major 6x6
    pub covar: Vec<f64>,
    /// Process noise spectral density on the heading rate
    pub q_proc: f64,
    /// Measurement noise variance per head
    pub q_obs: f64,
    pub use_threshold: f64,
    /// Covariance trace above which the filter reports divergence
    pub covar_bound: f64,
    pub css_msg: String,
    pub css_config_msg: String,
    pub out_msg: String,
    /// Optional navigation output carrying the normalized heading
    pub nav_out_msg: String,
}

impl Default for SunlineEkfConfig {
    fn default() -> Self {
        let mut covar = vec![0.0; 36];
        for i in 0..6 {
            covar[7 * i] = if i < 3 { 1.0 } else { 0.02 };
        }
        Self {
            state: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            covar,
            q_proc: 1e-6,
            q_obs: 1e-4,
            use_threshold: 0.0,
            covar_bound: 100.0,
            css_msg: "css_sensors".to_string(),
            css_config_msg: "css_config".to_string(),
            out_msg: "sunline_filter".to_string(),
            nav_out_msg: "sunline_nav".to_string(),
        }
    }
}

impl SunlineEkfConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.state.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::config("state", "non-finite"));
        }
        if self.covar.len() != 36 {
            return Err(ModelError::config(
                "covar",
                format!("expected 36 elements, got {}", self.covar.len()),
            ));
        }
        let p = Matrix6::from_row_slice(&self.covar);
        if !p.iter().all(|v| v.is_finite()) || (p - p.transpose()).amax() > 1e-12 * p.amax() {
            return Err(ModelError::config("covar", "not a finite symmetric matrix"));
        }
        if p.diagonal().iter().any(|v| *v < 0.0) {
            return Err(ModelError::config("covar", "negative variance"));
        }
        if !(self.q_proc >= 0.0) {
            return Err(ModelError::config("q_proc", "must be non-negative"));
        }
        if !(self.q_obs > 0.0) {
            return Err(ModelError::config("q_obs", "must be positive"));
        }
        if !(self.covar_bound > 0.0) {
            return Err(ModelError::config("covar_bound", "must be positive"));
        }
        Ok(())
    }
}

/// State transition matrix `I + A Δt`.
pub fn state_transition(dt: f64) -> Matrix6<f64> {
    let mut phi = Matrix6::identity();
    phi.fixed_view_mut::<3, 3>(0, 3).copy_from(&(Matrix3::identity() * dt));
    phi
}

/// Discrete process noise `Γ Q Γᵀ` for white noise on the heading rate.
pub fn process_noise(q: f64, dt: f64) -> Matrix6<f64> {
    let mut gamma = nalgebra::SMatrix::<f64, 6, 3>::zeros();
    gamma
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&(Matrix3::identity() * (dt * dt / 2.0)));
    gamma
        .fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&(Matrix3::identity() * dt));
    gamma * gamma.transpose() * q
}

pub struct SunlineEkf {
    config: SunlineEkfConfig,
    state: Vector6<f64>,
    covar: Matrix6<f64>,
    time_tag: Option<f64>,
    last_write_count: u64,
    diverged: bool,
    last_output: SunlineFilterMsg,
    css_id: Option<MessageId>,
    geometry_id: Option<MessageId>,
    out_id: Option<MessageId>,
    nav_id: Option<MessageId>,
}

impl SunlineEkf {
    pub fn new(config: SunlineEkfConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self {
            state: Vector6::from_row_slice(&config.state),
            covar: Matrix6::from_row_slice(&config.covar),
            time_tag: None,
            last_write_count: 0,
            diverged: false,
            last_output: SunlineFilterMsg::default(),
            css_id: None,
            geometry_id: None,
            out_id: None,
            nav_id: None,
            config,
        })
    }

    pub fn state(&self) -> &Vector6<f64> {
        &self.state
    }

    pub fn covariance(&self) -> &Matrix6<f64> {
        &self.covar
    }

    /// Unit sun heading in body components, if the heading state is nonzero.
    pub fn heading(&self) -> Option<Vector3<f64>> {
        self.state.fixed_rows::<3>(0).into_owned().try_normalize(0.0)
    }

    fn propagate(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let phi = state_transition(dt);
        self.state = phi * self.state;
        self.covar = phi * self.covar * phi.transpose() + process_noise(self.config.q_proc, dt);
    }

    /// Processes every observation in turn. Returns `false` and leaves the
    /// filter untouched if an innovation variance is not positive.
    fn correct(&mut self, observations: &[CssObservation]) -> bool {
        let r = self.config.q_obs;
        let mut x = self.state;
        let mut p = self.covar;
        for obs in observations {
            let h = RowVector6::new(obs.n_hat_b.x, obs.n_hat_b.y, obs.n_hat_b.z, 0.0, 0.0, 0.0);
            let innovation_var = (h * p * h.transpose())[0] + r;
            if !(innovation_var > f64::EPSILON) {
                return false;
            }
            let gain = p * h.transpose() / innovation_var;
            x += gain * (obs.value - (h * x)[0]);
            let joseph = Matrix6::identity() - gain * h;
            p = joseph * p * joseph.transpose() + gain * gain.transpose() * r;
        }
        self.state = x;
        self.covar = p;
        true
    }

    fn output(&self, time_tag: f64, observations: &[CssObservation]) -> SunlineFilterMsg {
        let mut msg = SunlineFilterMsg {
            time_tag,
            num_obs: observations.len() as u32,
            diverged: self.diverged,
            ..Default::default()
        };
        msg.state.copy_from_slice(self.state.as_slice());
        // nalgebra storage is column-major; the message is row-major.
        msg.covar.copy_from_slice(self.covar.transpose().as_slice());
        let d = self.state.fixed_rows::<3>(0);
        for obs in observations {
            msg.post_fit_res[obs.index] = obs.value - obs.n_hat_b.dot(&d);
        }
        msg
    }
}

impl Model for SunlineEkf {
    fn kind(&self) -> ModelKind {
        ModelKind::Estimator
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<SunlineFilterMsg>(&self.config.out_msg)?);
        if !self.config.nav_out_msg.is_empty() {
            self.nav_id = Some(ctx.create::<NavAttMsg>(&self.config.nav_out_msg)?);
        }
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.css_id = Some(ctx.subscribe::<CssArraySensorMsg>(&self.config.css_msg)?);
        self.geometry_id = Some(ctx.subscribe::<CssConfigMsg>(&self.config.css_config_msg)?);
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        self.state = Vector6::from_row_slice(&self.config.state);
        self.covar = Matrix6::from_row_slice(&self.config.covar);
        self.time_tag = None;
        self.last_write_count = 0;
        self.diverged = false;
        self.last_output = SunlineFilterMsg::default();
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(css_id), Some(geometry_id), Some(out_id)) =
            (self.css_id, self.geometry_id, self.out_id)
        else {
            return Ok(());
        };
        let (readings, header) = ctx.read_with_header::<CssArraySensorMsg>(css_id)?;
        let geometry: CssConfigMsg = ctx.read(geometry_id)?;

        let now = ctx.time_sec();
        let snapshot = (self.state, self.covar);
        self.propagate(now - self.time_tag.unwrap_or(now));

        let mut observations = Vec::new();
        if header.is_written() && header.write_count != self.last_write_count {
            observations = active_css(&readings, &geometry, self.config.use_threshold);
            if !self.correct(&observations) {
                (self.state, self.covar) = snapshot;
                ctx.warn(
                    WarningKind::SingularMatrix,
                    "innovation variance not positive, holding last estimate",
                );
                return ctx.write(out_id, &self.last_output);
            }
            self.last_write_count = header.write_count;
        }
        self.time_tag = Some(now);

        let diverged = self.covar.trace() > self.config.covar_bound;
        if diverged && !self.diverged {
            ctx.warn(
                WarningKind::Divergence,
                format!("covariance trace {:.3e} exceeds bound", self.covar.trace()),
            );
        }
        self.diverged = diverged;

        self.last_output = self.output(now, &observations);
        ctx.write(out_id, &self.last_output)?;
        if let Some(nav_id) = self.nav_id {
            let nav = NavAttMsg {
                time_tag: now,
                veh_sun_pnt_bdy: arr3(&self.heading().unwrap_or_else(Vector3::zeros)),
                ..Default::default()
            };
            ctx.write(nav_id, &nav)?;
        }
        Ok(())
    }
}
