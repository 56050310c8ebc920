//! Attitude tracking errors between the navigation solution and a
//! reference frame.
//!
//! An optional constant offset `σ_R0R` rotates the incoming reference `R0`
//! into the tracked frame `R`. Rates are expressed in body components.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::math::{arr3, mrp, v3};
use crate::messaging::{AttGuidMsg, AttRefMsg, MessageId, NavAttMsg};
use crate::model::{InitContext, Model, ModelContext, ModelKind};
use crate::types::SimTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttTrackingErrorConfig {
    /// Offset of the tracked frame from the reference, `σ_R0R`
    pub sigma_r0r: [f64; 3],
    pub nav_msg: String,
    pub ref_msg: String,
    pub out_msg: String,
}

impl Default for AttTrackingErrorConfig {
    fn default() -> Self {
        Self {
            sigma_r0r: [0.0; 3],
            nav_msg: "nav_att".to_string(),
            ref_msg: "att_ref".to_string(),
            out_msg: "att_guidance".to_string(),
        }
    }
}

/// Tracking errors of body attitude `nav` against reference `reference`.
pub fn tracking_error(nav: &NavAttMsg, reference: &AttRefMsg, sigma_r0r: &[f64; 3]) -> AttGuidMsg {
    let sigma_rr0 = -v3(sigma_r0r);
    let sigma_rn = mrp::add(&v3(&reference.sigma_rn), &sigma_rr0);
    let sigma_bn = v3(&nav.sigma_bn);
    let sigma_br = mrp::sub(&sigma_bn, &sigma_rn);

    let dcm_bn = mrp::to_dcm(&sigma_bn);
    let omega_rn_b = dcm_bn * v3(&reference.omega_rn_n);
    let domega_rn_b = dcm_bn * v3(&reference.domega_rn_n);
    let omega_br_b = v3(&nav.omega_bn_b) - omega_rn_b;

    AttGuidMsg {
        sigma_br: arr3(&sigma_br),
        omega_br_b: arr3(&omega_br_b),
        omega_rn_b: arr3(&omega_rn_b),
        domega_rn_b: arr3(&domega_rn_b),
    }
}

pub struct AttTrackingError {
    config: AttTrackingErrorConfig,
    nav_id: Option<MessageId>,
    ref_id: Option<MessageId>,
    out_id: Option<MessageId>,
}

impl AttTrackingError {
    pub fn new(config: AttTrackingErrorConfig) -> ModelResult<Self> {
        if config.sigma_r0r.iter().any(|s| !s.is_finite()) {
            return Err(ModelError::config("sigma_r0r", "non-finite"));
        }
        Ok(Self {
            config,
            nav_id: None,
            ref_id: None,
            out_id: None,
        })
    }
}

impl Model for AttTrackingError {
    fn kind(&self) -> ModelKind {
        ModelKind::Guidance
    }

    fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.out_id = Some(ctx.create::<AttGuidMsg>(&self.config.out_msg)?);
        Ok(())
    }

    fn cross_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
        self.nav_id = Some(ctx.subscribe::<NavAttMsg>(&self.config.nav_msg)?);
        self.ref_id = Some(ctx.subscribe::<AttRefMsg>(&self.config.ref_msg)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        let (Some(nav_id), Some(ref_id), Some(out_id)) = (self.nav_id, self.ref_id, self.out_id)
        else {
            return Ok(());
        };
        let nav: NavAttMsg = ctx.read(nav_id)?;
        let reference: AttRefMsg = ctx.read(ref_id)?;
        ctx.write(out_id, &tracking_error(&nav, &reference, &self.config.sigma_r0r))
    }
}
