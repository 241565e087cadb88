//! Shared pre-posterior simulation loop.
//!
//! Each iteration draws a true lift from the effective prior, simulates an
//! experiment readout `L_hat ~ Normal(L_true, SE)`, turns it into a
//! posterior mean and applies the Bayesian decision rule. EVSI and Net Value
//! both consume the same stream of [`Iteration`]s, so for a fixed seed they
//! see identical draws.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};
use voi_config::{GridConfig, MonteCarloConfig};
use voi_math::sample_standard_normal;

use super::posterior::PosteriorRule;
use super::{Decision, DecisionError};
use crate::dispatch::CancelToken;
use crate::distribution::EffectivePrior;
use crate::logging::event_names;

/// Rejection share above which a run is logged as suspicious.
const REJECTION_WARN_FRACTION: f64 = 0.01;

/// Standard error of the lift estimate for a two-arm test.
///
/// Uses the fixed binomial approximation `sqrt(p(1-p)/n_c + p(1-p)/n_v)` at
/// the baseline rate rather than simulating binomial counts. Returns `None`
/// when either arm is empty (the test carries no information).
pub fn standard_error(baseline_rate: f64, n_control: u64, n_variant: u64) -> Option<f64> {
    if n_control == 0 || n_variant == 0 {
        return None;
    }
    let var = baseline_rate * (1.0 - baseline_rate);
    Some((var / n_control as f64 + var / n_variant as f64).max(0.0).sqrt())
}

pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// One accepted simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iteration {
    pub true_lift: f64,
    pub observed: f64,
    pub posterior_mean: f64,
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub accepted: usize,
    /// Iterations discarded after exhausting re-draws or failing to normalize.
    pub rejected: usize,
    /// Accepted iterations whose decision differs from the default.
    pub changed: usize,
}

impl LoopSummary {
    pub fn probability_changed(&self) -> f64 {
        if self.accepted == 0 {
            0.0
        } else {
            self.changed as f64 / self.accepted as f64
        }
    }
}

/// Fixed inputs of one simulated experiment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Simulation<'a> {
    pub prior: &'a EffectivePrior,
    pub threshold: f64,
    pub standard_error: f64,
    pub default_decision: Decision,
}

impl Simulation<'_> {
    /// Run `monte_carlo.num_samples` iterations, handing each accepted one to
    /// `visit`. Checks `cancel` every `cancel_check_interval` iterations.
    pub(crate) fn run(
        &self,
        monte_carlo: &MonteCarloConfig,
        grid: &GridConfig,
        cancel: &CancelToken,
        mut visit: impl FnMut(&Iteration),
    ) -> Result<LoopSummary, DecisionError> {
        let n = monte_carlo.num_samples;
        let interval = monte_carlo.cancel_check_interval.max(1);
        let mut rng = make_rng(monte_carlo.seed);
        let mut rule = PosteriorRule::for_experiment(self.prior, self.standard_error, grid);
        let mut summary = LoopSummary::default();

        for i in 0..n {
            if i % interval == 0 && cancel.is_cancelled() {
                debug!(
                    event = event_names::SIMULATION_CANCELLED,
                    completed = i,
                    total = n,
                    "simulation cancelled"
                );
                return Err(DecisionError::Cancelled);
            }

            let draw = self
                .prior
                .draw_stratified(&mut rng, i, n, monte_carlo.max_redraws);
            if draw.fell_back {
                summary.rejected += 1;
                continue;
            }
            let true_lift = draw.value;
            let observed = true_lift + self.standard_error * sample_standard_normal(&mut rng);
            let Some(posterior_mean) = rule.posterior_mean(observed) else {
                summary.rejected += 1;
                continue;
            };

            let decision = Decision::from_estimate(posterior_mean, self.threshold);
            if decision != self.default_decision {
                summary.changed += 1;
            }
            summary.accepted += 1;
            visit(&Iteration {
                true_lift,
                observed,
                posterior_mean,
                decision,
            });
        }

        if n > 0 && summary.rejected as f64 > REJECTION_WARN_FRACTION * n as f64 {
            warn!(
                event = event_names::HIGH_REJECTION,
                rejected = summary.rejected,
                total = n,
                "many prior draws were non-finite; check the prior parameters"
            );
        }
        Ok(summary)
    }
}
