//! Expected value of sample information for a two-arm experiment.
//!
//! Monte Carlo pre-posterior analysis: for each simulated experiment the
//! value gained is `K (L - T)` when the test switches DontShip to Ship and
//! `K (T - L)` when it switches Ship to DontShip, zero when it leaves the
//! default in place. EVSI is the average gain, clamped at zero.
//!
//! Untruncated Normal priors also have a closed form: the pre-posterior
//! distribution of the posterior mean is `Normal(mu, s)` with
//! `s = sigma^2 / sqrt(sigma^2 + SE^2)`, so EVSI is the EVPI formula with
//! `s` in place of `sigma`.

use serde::{Deserialize, Serialize};
use tracing::debug;
use voi_config::EngineConfig;
use voi_math::{standard_normal_cdf, standard_normal_pdf};

use super::evpi::probability_clears;
use super::preposterior::{standard_error, Simulation};
use super::{
    log_prior_caveats, require_finite, require_non_negative, require_unit_interval, Decision,
    DecisionError,
};
use crate::dispatch::CancelToken;
use crate::distribution::{EffectivePrior, PriorDistribution, PriorWarning};
use crate::logging::event_names;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvsiInputs {
    pub k: f64,
    pub baseline_conversion_rate: f64,
    pub threshold: f64,
    pub prior: PriorDistribution,
    pub n_control: u64,
    pub n_variant: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvsiMethod {
    ClosedForm,
    MonteCarlo,
    /// Zero branch: no value at stake or no information in the test.
    Degenerate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvsiResult {
    pub evsi_dollars: f64,
    pub default_decision: Decision,
    pub probability_clears_threshold: f64,
    pub probability_test_changes_decision: f64,
    /// Iterations attempted (0 for closed-form and degenerate results).
    pub num_samples: usize,
    pub num_rejected: usize,
    pub method: EvsiMethod,
    /// `None` when an arm is empty.
    pub standard_error: Option<f64>,
    pub truncation_applied: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PriorWarning>,
}

pub(super) struct Prepared {
    pub(super) prior: EffectivePrior,
    pub(super) standard_error: Option<f64>,
}

pub(super) fn prepare(inputs: &EvsiInputs, config: &EngineConfig) -> Result<Prepared, DecisionError> {
    require_non_negative("k", inputs.k)?;
    require_unit_interval("baseline_conversion_rate", inputs.baseline_conversion_rate)?;
    require_finite("threshold", inputs.threshold)?;
    let prior = EffectivePrior::new(inputs.prior, &config.truncation)?;
    log_prior_caveats(&prior);
    Ok(Prepared {
        standard_error: standard_error(
            inputs.baseline_conversion_rate,
            inputs.n_control,
            inputs.n_variant,
        ),
        prior,
    })
}

/// Closed form for untruncated Normal priors, Monte Carlo otherwise.
pub fn compute_evsi(inputs: &EvsiInputs, config: &EngineConfig) -> Result<EvsiResult, DecisionError> {
    compute_evsi_cancellable(inputs, config, &CancelToken::new())
}

pub fn compute_evsi_cancellable(
    inputs: &EvsiInputs,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<EvsiResult, DecisionError> {
    let prepared = prepare(inputs, config)?;
    if prepared.prior.is_plain_normal() {
        Ok(closed_form_with_prior(&prepared, inputs))
    } else {
        monte_carlo_with_prior(&prepared, inputs, config, cancel)
    }
}

/// Analytic EVSI. Only defined for an untruncated Normal prior.
pub fn compute_evsi_closed_form(
    inputs: &EvsiInputs,
    config: &EngineConfig,
) -> Result<EvsiResult, DecisionError> {
    let prepared = prepare(inputs, config)?;
    if !prepared.prior.is_plain_normal() {
        return Err(DecisionError::invalid(
            "prior",
            "closed-form EVSI requires an untruncated normal prior",
        ));
    }
    Ok(closed_form_with_prior(&prepared, inputs))
}

pub fn compute_evsi_monte_carlo(
    inputs: &EvsiInputs,
    config: &EngineConfig,
) -> Result<EvsiResult, DecisionError> {
    compute_evsi_monte_carlo_cancellable(inputs, config, &CancelToken::new())
}

pub fn compute_evsi_monte_carlo_cancellable(
    inputs: &EvsiInputs,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<EvsiResult, DecisionError> {
    let prepared = prepare(inputs, config)?;
    monte_carlo_with_prior(&prepared, inputs, config, cancel)
}

fn base_result(prepared: &Prepared, threshold: f64, method: EvsiMethod) -> EvsiResult {
    let prior = &prepared.prior;
    EvsiResult {
        evsi_dollars: 0.0,
        default_decision: Decision::from_estimate(prior.point_estimate(), threshold),
        probability_clears_threshold: probability_clears(prior, threshold),
        probability_test_changes_decision: 0.0,
        num_samples: 0,
        num_rejected: 0,
        method,
        standard_error: prepared.standard_error,
        truncation_applied: prior.truncation_applied(),
        warnings: prior.warnings().to_vec(),
    }
}

pub(super) fn is_zero_branch(prepared: &Prepared, k: f64) -> bool {
    k == 0.0 || prepared.prior.is_degenerate() || prepared.standard_error.is_none()
}

fn closed_form_with_prior(prepared: &Prepared, inputs: &EvsiInputs) -> EvsiResult {
    let threshold = inputs.threshold;
    if is_zero_branch(prepared, inputs.k) {
        return base_result(prepared, threshold, EvsiMethod::Degenerate);
    }
    let mut result = base_result(prepared, threshold, EvsiMethod::ClosedForm);
    let (mu, sigma) = match *prepared.prior.shape() {
        PriorDistribution::Normal { mu, sigma } => (mu, sigma),
        _ => return result,
    };
    let se = prepared.standard_error.unwrap_or(0.0);
    let var = sigma * sigma;
    let s = var / (var + se * se).sqrt();
    let z = (threshold - mu) / s;
    let gain = match result.default_decision {
        Decision::Ship => (threshold - mu) * standard_normal_cdf(z) + s * standard_normal_pdf(z),
        Decision::DontShip => {
            (mu - threshold) * standard_normal_cdf(-z) + s * standard_normal_pdf(z)
        }
    };
    result.evsi_dollars = (inputs.k * gain).max(0.0);
    result.probability_test_changes_decision = standard_normal_cdf(-(mu - threshold).abs() / s);
    debug!(
        event = event_names::EVSI_FINISHED,
        method = "closed_form",
        evsi = result.evsi_dollars,
        "evsi computed"
    );
    result
}

fn monte_carlo_with_prior(
    prepared: &Prepared,
    inputs: &EvsiInputs,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<EvsiResult, DecisionError> {
    let threshold = inputs.threshold;
    if is_zero_branch(prepared, inputs.k) {
        return Ok(base_result(prepared, threshold, EvsiMethod::Degenerate));
    }
    let mut result = base_result(prepared, threshold, EvsiMethod::MonteCarlo);
    let sim = Simulation {
        prior: &prepared.prior,
        threshold,
        standard_error: prepared.standard_error.unwrap_or(0.0),
        default_decision: result.default_decision,
    };

    let k = inputs.k;
    let mut total_gain = 0.0;
    let summary = sim.run(&config.monte_carlo, &config.posterior_grid, cancel, |it| {
        total_gain += switch_gain(k, it.true_lift, threshold, it.decision, sim.default_decision);
    })?;

    result.num_samples = config.monte_carlo.num_samples;
    result.num_rejected = summary.rejected;
    result.probability_test_changes_decision = summary.probability_changed();
    if summary.accepted > 0 {
        result.evsi_dollars = (total_gain / summary.accepted as f64).max(0.0);
    }
    debug!(
        event = event_names::EVSI_FINISHED,
        method = "monte_carlo",
        evsi = result.evsi_dollars,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "evsi computed"
    );
    Ok(result)
}

/// Value of acting on `decision` instead of `default` when the true lift is
/// `lift`.
pub(crate) fn switch_gain(k: f64, lift: f64, threshold: f64, decision: Decision, default: Decision) -> f64 {
    match (default, decision) {
        (Decision::DontShip, Decision::Ship) => k * (lift - threshold),
        (Decision::Ship, Decision::DontShip) => k * (threshold - lift),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::evpi::{compute_evpi, EvpiInputs};

    fn inputs(prior: PriorDistribution, n: u64) -> EvsiInputs {
        EvsiInputs {
            k: 5_000_000.0,
            baseline_conversion_rate: 0.05,
            threshold: 0.0,
            prior,
            n_control: n,
            n_variant: n,
        }
    }

    fn seeded(samples: usize, seed: u64) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.monte_carlo.num_samples = samples;
        config.monte_carlo.seed = Some(seed);
        config
    }

    #[test]
    fn closed_form_matches_hand_computation() {
        let prior = PriorDistribution::Normal { mu: 0.0, sigma: 0.05 };
        let r = compute_evsi_closed_form(&inputs(prior, 100), &EngineConfig::default()).expect("evsi");
        let se = (2.0 * 0.05 * 0.95 / 100.0_f64).sqrt();
        let s = 0.0025 / (0.0025 + se * se).sqrt();
        let expected = 5_000_000.0 * s * standard_normal_pdf(0.0);
        crate::assert_approx_eq!(r.evsi_dollars, expected);
        assert_eq!(r.method, EvsiMethod::ClosedForm);
        crate::assert_approx_eq!(r.probability_test_changes_decision, 0.5, 1e-12);
    }

    #[test]
    fn compute_evsi_takes_fast_path_for_plain_normal() {
        let prior = PriorDistribution::Normal { mu: 0.01, sigma: 0.05 };
        let r = compute_evsi(&inputs(prior, 1000), &EngineConfig::default()).expect("evsi");
        assert_eq!(r.method, EvsiMethod::ClosedForm);
        assert_eq!(r.num_samples, 0);
    }

    #[test]
    fn closed_form_rejects_non_normal() {
        let prior = PriorDistribution::Uniform { low: -0.1, high: 0.1 };
        let err = compute_evsi_closed_form(&inputs(prior, 100), &EngineConfig::default())
            .expect_err("uniform");
        assert!(matches!(err, DecisionError::InvalidInput { .. }));
    }

    #[test]
    fn monte_carlo_agrees_with_closed_form() {
        let prior = PriorDistribution::Normal { mu: 0.0, sigma: 0.05 };
        let n = 10_000;
        let config = seeded(n, 42);
        let exact = compute_evsi_closed_form(&inputs(prior, 100), &config).expect("closed");
        let mc = compute_evsi_monte_carlo(&inputs(prior, 100), &config).expect("mc");
        let tol = 3.0 * exact.evsi_dollars / (n as f64).sqrt();
        assert!(
            (mc.evsi_dollars - exact.evsi_dollars).abs() < tol,
            "mc {} exact {} tol {}",
            mc.evsi_dollars,
            exact.evsi_dollars,
            tol
        );
        assert_eq!(mc.num_rejected, 0);
        assert_eq!(mc.num_samples, n);
    }

    #[test]
    fn zero_branches() {
        let prior = PriorDistribution::Normal { mu: 0.0, sigma: 0.05 };
        let config = EngineConfig::default();

        let mut empty_arm = inputs(prior, 100);
        empty_arm.n_variant = 0;
        let r = compute_evsi_monte_carlo(&empty_arm, &config).expect("evsi");
        assert_eq!(r.evsi_dollars, 0.0);
        assert_eq!(r.method, EvsiMethod::Degenerate);
        assert_eq!(r.standard_error, None);

        let mut zero_k = inputs(prior, 100);
        zero_k.k = 0.0;
        assert_eq!(compute_evsi(&zero_k, &config).expect("evsi").evsi_dollars, 0.0);

        let point = inputs(PriorDistribution::StudentT { mu: 0.02, sigma: 0.0, df: 3.0 }, 100);
        assert_eq!(compute_evsi(&point, &config).expect("evsi").evsi_dollars, 0.0);
    }

    #[test]
    fn perfect_test_recovers_evpi() {
        let prior = PriorDistribution::Normal { mu: 0.01, sigma: 0.05 };
        let mut perfect = inputs(prior, 100);
        perfect.baseline_conversion_rate = 0.0;
        let config = EngineConfig::default();
        let evsi = compute_evsi_closed_form(&perfect, &config).expect("evsi");
        let evpi = compute_evpi(
            &EvpiInputs {
                k: perfect.k,
                prior,
                threshold: perfect.threshold,
            },
            &config,
        )
        .expect("evpi");
        crate::assert_approx_eq!(evsi.evsi_dollars, evpi.evpi_dollars);
    }

    #[test]
    fn uniform_evsi_is_between_zero_and_evpi() {
        let prior = PriorDistribution::Uniform { low: -0.1, high: 0.1 };
        let config = seeded(10_000, 7);
        let evsi = compute_evsi(&inputs(prior, 35_000), &config).expect("evsi");
        let evpi = compute_evpi(
            &EvpiInputs {
                k: 5_000_000.0,
                prior,
                threshold: 0.0,
            },
            &config,
        )
        .expect("evpi");
        assert_eq!(evsi.method, EvsiMethod::MonteCarlo);
        assert!(evsi.evsi_dollars > 0.0);
        assert!(evsi.evsi_dollars < evpi.evpi_dollars);
    }

    #[test]
    fn student_t_carries_warnings_into_result() {
        let prior = PriorDistribution::StudentT { mu: 0.0, sigma: 0.03, df: 1.5 };
        let r = compute_evsi(&inputs(prior, 2_000), &seeded(2_000, 3)).expect("evsi");
        assert!(r.warnings.contains(&PriorWarning::UndefinedVariance { df: 1.5 }));
        assert!(r.evsi_dollars.is_finite());
    }

    #[test]
    fn switch_gain_signs() {
        assert_eq!(switch_gain(2.0, 0.1, 0.0, Decision::Ship, Decision::DontShip), 0.2);
        assert_eq!(switch_gain(2.0, 0.1, 0.0, Decision::DontShip, Decision::Ship), -0.2);
        assert_eq!(switch_gain(2.0, 0.1, 0.0, Decision::Ship, Decision::Ship), 0.0);
    }
}
