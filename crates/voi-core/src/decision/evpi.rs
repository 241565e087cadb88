//! Expected value of perfect information.
//!
//! With default decision `d0 = Ship iff E[L] >= T`, perfect information
//! avoids the expected opportunity loss of acting on `d0`:
//!
//! ```text
//! Ship:     EVPI = K * E[(T - L)+]
//! DontShip: EVPI = K * E[(L - T)+]
//! ```
//!
//! For an untruncated Normal prior with `z = (T - mu) / sigma` these reduce to
//! `K[(T - mu)Phi(z) + sigma phi(z)]` and `K[(mu - T)(1 - Phi(z)) + sigma phi(z)]`.
//! Truncated and non-Normal priors use the partial expectations of
//! [`EffectivePrior`].
//!
//! A Student-t prior with df <= 1 has no first moment. When the loss side of
//! such a prior is not bounded by truncation, EVPI is `f64::INFINITY` (null in
//! JSON): perfect information is worth more than any finite amount.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use voi_config::EngineConfig;
use voi_math::standard_normal_pdf;

use super::{require_finite, require_non_negative, Decision, DecisionError};
use crate::distribution::{EffectivePrior, PriorDistribution, PriorWarning};
use crate::logging::event_names;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvpiInputs {
    /// Dollars per unit of lift per year.
    pub k: f64,
    pub prior: PriorDistribution,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvpiResult {
    pub evpi_dollars: f64,
    pub default_decision: Decision,
    /// P(L >= threshold) under the effective prior.
    pub probability_clears_threshold: f64,
    /// Threshold standardized against the effective prior.
    pub z: f64,
    pub phi: f64,
    /// Effective CDF at the threshold.
    pub big_phi: f64,
    pub truncation_applied: bool,
    pub degenerate: bool,
    /// Post-truncation point estimate of the lift.
    pub prior_mean: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PriorWarning>,
}

pub fn compute_evpi(inputs: &EvpiInputs, config: &EngineConfig) -> Result<EvpiResult, DecisionError> {
    require_non_negative("k", inputs.k)?;
    require_finite("threshold", inputs.threshold)?;
    let prior = EffectivePrior::new(inputs.prior, &config.truncation)?;
    super::log_prior_caveats(&prior);
    Ok(evpi_with_prior(&prior, inputs.k, inputs.threshold, config))
}

/// Probability the lift clears the threshold; a point mass clears iff it ships.
pub(crate) fn probability_clears(prior: &EffectivePrior, threshold: f64) -> f64 {
    if prior.is_degenerate() {
        return if prior.point_estimate() >= threshold { 1.0 } else { 0.0 };
    }
    1.0 - prior.cdf(threshold)
}

pub(crate) fn evpi_with_prior(
    prior: &EffectivePrior,
    k: f64,
    threshold: f64,
    config: &EngineConfig,
) -> EvpiResult {
    let point = prior.point_estimate();
    let default_decision = Decision::from_estimate(point, threshold);
    let degenerate = prior.is_degenerate();

    let (z, phi) = if degenerate {
        (0.0, 0.0)
    } else {
        let z = (threshold - point) / prior.scale();
        (z, standard_normal_pdf(z))
    };

    let evpi_dollars = if degenerate || k == 0.0 {
        0.0
    } else {
        let points = config.posterior_grid.points;
        let shortfall = match default_decision {
            Decision::Ship => prior.lower_partial_expectation(threshold, points),
            Decision::DontShip => prior.upper_partial_expectation(threshold, points),
        };
        (k * shortfall).max(0.0)
    };
    if evpi_dollars.is_infinite() {
        warn!(
            event = event_names::PRIOR_WARNING,
            default = ?default_decision,
            "loss tail has no finite mean; EVPI is unbounded"
        );
    }

    debug!(
        event = event_names::EVPI_COMPUTED,
        evpi = evpi_dollars,
        default = ?default_decision,
        truncated = prior.truncation_applied(),
        "evpi computed"
    );

    EvpiResult {
        evpi_dollars,
        default_decision,
        probability_clears_threshold: probability_clears(prior, threshold),
        z,
        phi,
        big_phi: prior.cdf(threshold),
        truncation_applied: prior.truncation_applied(),
        degenerate,
        prior_mean: point,
        warnings: prior.warnings().to_vec(),
    }
}
