//! Decision-value calculations (EVPI, EVSI, cost of delay, net value).

pub mod cost_of_delay;
pub mod evpi;
pub mod evsi;
pub mod net_value;
pub mod posterior;
pub mod preposterior;

pub use cost_of_delay::{compute_cost_of_delay, CodInputs, CodResult};
pub use evpi::{compute_evpi, EvpiInputs, EvpiResult};
pub use evsi::{
    compute_evsi, compute_evsi_cancellable, compute_evsi_closed_form, compute_evsi_monte_carlo,
    compute_evsi_monte_carlo_cancellable, EvsiInputs, EvsiMethod, EvsiResult,
};
pub use net_value::{compute_net_value, compute_net_value_cancellable, NetValueInputs, NetValueResult};
pub use posterior::PosteriorRule;
pub use preposterior::{standard_error, Iteration, LoopSummary};

use crate::distribution::{EffectivePrior, PriorError};
use crate::logging::event_names;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Ship / don't-ship action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Ship,
    DontShip,
}

impl Decision {
    /// Ship iff the estimate clears the threshold; ties ship.
    pub fn from_estimate(estimate: f64, threshold: f64) -> Self {
        if estimate >= threshold {
            Decision::Ship
        } else {
            Decision::DontShip
        }
    }

    pub fn is_ship(self) -> bool {
        self == Decision::Ship
    }
}

/// Errors raised by the decision engine.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("invalid input {field}: {message}")]
    InvalidInput { field: String, message: String },
    #[error("invalid prior: {0}")]
    Prior(#[from] PriorError),
    #[error("computation cancelled")]
    Cancelled,
}

impl DecisionError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        DecisionError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Surface truncation and undefined-moment caveats once per run.
pub(crate) fn log_prior_caveats(prior: &EffectivePrior) {
    if prior.truncation_applied() {
        warn!(
            event = event_names::PRIOR_TRUNCATED,
            mass_below = prior.mass_below_bound(),
            mean = prior.point_estimate(),
            "prior has mass below the feasibility bound; using the truncated prior"
        );
    }
    for caveat in prior.warnings() {
        warn!(event = event_names::PRIOR_WARNING, "{}", caveat);
    }
}

pub(crate) fn require_finite(field: &str, value: f64) -> Result<f64, DecisionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DecisionError::invalid(field, format!("must be finite, got {}", value)))
    }
}

pub(crate) fn require_non_negative(field: &str, value: f64) -> Result<f64, DecisionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DecisionError::invalid(
            field,
            format!("must be finite and non-negative, got {}", value),
        ))
    }
}

pub(crate) fn require_unit_interval(field: &str, value: f64) -> Result<f64, DecisionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(DecisionError::invalid(field, format!("must be in [0, 1], got {}", value)))
    }
}
