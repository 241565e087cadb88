//! Net value of running the experiment, with delay costs folded into the
//! same simulation as EVSI.
//!
//! Times are fractions of a year. Over a horizon `h` with test window `f_t`,
//! decision latency `f_l` and remainder `r = h - f_t - f_l`, shipping for a
//! year is worth `K (L - T)` and the two policies accrue:
//!
//! ```text
//! test:    K (L - T) [vf * f_t + 1[d0 = Ship] f_l + 1[d1 = Ship] r]
//! no test: K (L - T)  1[d0 = Ship] h
//! ```
//!
//! where `d0` is the default and `d1` the posterior decision. The net value
//! is the mean difference. It is not clamped: a long test on a confident
//! Ship prior can be worth less than shipping now.

use serde::{Deserialize, Serialize};
use tracing::debug;
use voi_config::EngineConfig;

use super::evsi::{is_zero_branch, prepare, EvsiInputs, Prepared};
use super::preposterior::Simulation;
use super::{require_non_negative, require_unit_interval, Decision, DecisionError};
use crate::dispatch::CancelToken;
use crate::distribution::{PriorDistribution, PriorWarning};
use crate::logging::event_names;

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetValueInputs {
    pub k: f64,
    pub baseline_conversion_rate: f64,
    pub threshold: f64,
    pub prior: PriorDistribution,
    pub n_control: u64,
    pub n_variant: u64,
    pub test_duration_days: f64,
    pub variant_fraction: f64,
    pub decision_latency_days: f64,
}

impl NetValueInputs {
    pub fn evsi_inputs(&self) -> EvsiInputs {
        EvsiInputs {
            k: self.k,
            baseline_conversion_rate: self.baseline_conversion_rate,
            threshold: self.threshold,
            prior: self.prior,
            n_control: self.n_control,
            n_variant: self.n_variant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetValueResult {
    pub net_value_dollars: f64,
    pub num_samples: usize,
    pub num_rejected: usize,
    pub default_decision: Decision,
    pub probability_test_changes_decision: f64,
    /// Value of exposing only the variant arm during the test, relative to
    /// holding the default.
    pub test_window_value: f64,
    /// Value of acting on the posterior decision after the test.
    pub decision_window_value: f64,
    /// Value the latency window would have added had the posterior decision
    /// applied immediately. Informational; not part of the net value.
    pub latency_foregone_value: f64,
    pub truncation_applied: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PriorWarning>,
}

/// Window lengths in years, clamped into the horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Windows {
    test: f64,
    latency: f64,
    remainder: f64,
}

impl Windows {
    fn new(inputs: &NetValueInputs, horizon_days: f64) -> Self {
        let horizon = horizon_days / DAYS_PER_YEAR;
        let test = (inputs.test_duration_days / DAYS_PER_YEAR).min(horizon);
        let latency = (inputs.decision_latency_days / DAYS_PER_YEAR).min(horizon - test);
        Windows {
            test,
            latency,
            remainder: (horizon - test - latency).max(0.0),
        }
    }
}

fn ship_indicator(decision: Decision) -> f64 {
    if decision.is_ship() {
        1.0
    } else {
        0.0
    }
}

pub fn compute_net_value(
    inputs: &NetValueInputs,
    config: &EngineConfig,
) -> Result<NetValueResult, DecisionError> {
    compute_net_value_cancellable(inputs, config, &CancelToken::new())
}

pub fn compute_net_value_cancellable(
    inputs: &NetValueInputs,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<NetValueResult, DecisionError> {
    require_non_negative("test_duration_days", inputs.test_duration_days)?;
    require_non_negative("decision_latency_days", inputs.decision_latency_days)?;
    require_unit_interval("variant_fraction", inputs.variant_fraction)?;
    let prepared = prepare(&inputs.evsi_inputs(), config)?;
    let windows = Windows::new(inputs, config.timing.horizon_days);

    if is_zero_branch(&prepared, inputs.k) {
        return Ok(without_information(&prepared, inputs, windows));
    }
    simulate(&prepared, inputs, windows, config, cancel)
}

fn empty_result(prepared: &Prepared, default_decision: Decision) -> NetValueResult {
    NetValueResult {
        net_value_dollars: 0.0,
        num_samples: 0,
        num_rejected: 0,
        default_decision,
        probability_test_changes_decision: 0.0,
        test_window_value: 0.0,
        decision_window_value: 0.0,
        latency_foregone_value: 0.0,
        truncation_applied: prepared.prior.truncation_applied(),
        warnings: prepared.prior.warnings().to_vec(),
    }
}

/// The test never changes the decision, so only the test window differs.
fn without_information(prepared: &Prepared, inputs: &NetValueInputs, windows: Windows) -> NetValueResult {
    let mean = prepared.prior.point_estimate();
    let default_decision = Decision::from_estimate(mean, inputs.threshold);
    let mut result = empty_result(prepared, default_decision);
    let test_window = inputs.k
        * (mean - inputs.threshold)
        * windows.test
        * (inputs.variant_fraction - ship_indicator(default_decision));
    result.test_window_value = test_window;
    result.net_value_dollars = test_window;
    result
}

fn simulate(
    prepared: &Prepared,
    inputs: &NetValueInputs,
    windows: Windows,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<NetValueResult, DecisionError> {
    let threshold = inputs.threshold;
    let default_decision = Decision::from_estimate(prepared.prior.point_estimate(), threshold);
    let sim = Simulation {
        prior: &prepared.prior,
        threshold,
        standard_error: prepared.standard_error.unwrap_or(0.0),
        default_decision,
    };

    let d0 = ship_indicator(default_decision);
    let (mut test_sum, mut decision_sum, mut latency_sum) = (0.0, 0.0, 0.0);
    let summary = sim.run(&config.monte_carlo, &config.posterior_grid, cancel, |it| {
        let value = inputs.k * (it.true_lift - threshold);
        let switched = ship_indicator(it.decision) - d0;
        test_sum += value * windows.test * (inputs.variant_fraction - d0);
        decision_sum += value * windows.remainder * switched;
        latency_sum += value * windows.latency * switched;
    })?;

    let mut result = empty_result(prepared, default_decision);
    result.num_samples = config.monte_carlo.num_samples;
    result.num_rejected = summary.rejected;
    result.probability_test_changes_decision = summary.probability_changed();
    if summary.accepted > 0 {
        let n = summary.accepted as f64;
        result.test_window_value = test_sum / n;
        result.decision_window_value = decision_sum / n;
        result.latency_foregone_value = latency_sum / n;
        result.net_value_dollars = result.test_window_value + result.decision_window_value;
    }
    debug!(
        event = event_names::NET_VALUE_FINISHED,
        net_value = result.net_value_dollars,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "net value computed"
    );
    Ok(result)
}
