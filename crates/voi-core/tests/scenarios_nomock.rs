//! End-to-end decision scenarios against the real engine (no mocks).
//!
//! Dollar figures are regression values for the reference business case:
//! `K = 5,000,000` per unit lift per year.

use voi_config::EngineConfig;
use voi_core::decision::{
    compute_cost_of_delay, compute_evpi, compute_evsi, compute_evsi_closed_form,
    compute_evsi_monte_carlo, compute_net_value, CodInputs, EvpiInputs, EvsiInputs, EvsiMethod,
    NetValueInputs,
};
use voi_core::inputs::{
    BusinessInputs, ExperimentDesign, PriorInput, ThresholdScenario, ThresholdSpec, ThresholdUnit,
};
use voi_core::{analyze, AnalysisInputs, Decision, IntervalShape, PriorDistribution};

const K: f64 = 5_000_000.0;

fn seeded(num_samples: usize, seed: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.monte_carlo.num_samples = num_samples;
    config.monte_carlo.seed = Some(seed);
    config
}

fn evsi_inputs(prior: PriorDistribution, n: u64) -> EvsiInputs {
    EvsiInputs {
        k: K,
        baseline_conversion_rate: 0.05,
        threshold: 0.0,
        prior,
        n_control: n,
        n_variant: n,
    }
}

#[test]
fn centered_normal_prior_ships_with_textbook_evpi() {
    let prior = PriorDistribution::Normal { mu: 0.0, sigma: 0.05 };
    let r = compute_evpi(&EvpiInputs { k: K, prior, threshold: 0.0 }, &EngineConfig::default())
        .expect("evpi");
    assert_eq!(r.default_decision, Decision::Ship);
    assert!((r.evpi_dollars - 99_736.0).abs() < 1.0, "{}", r.evpi_dollars);
    assert!(!r.truncation_applied);
    assert!(!r.degenerate);
}

#[test]
fn five_percent_hurdle_flips_default_and_changes_evpi() {
    let prior = PriorDistribution::Normal { mu: 0.0, sigma: 0.05 };
    let config = EngineConfig::default();
    let base = compute_evpi(&EvpiInputs { k: K, prior, threshold: 0.0 }, &config).expect("evpi");
    let hurdle = compute_evpi(&EvpiInputs { k: K, prior, threshold: 0.05 }, &config).expect("evpi");
    assert_eq!(hurdle.default_decision, Decision::DontShip);
    assert!((hurdle.evpi_dollars - 20_828.87).abs() < 0.05, "{}", hurdle.evpi_dollars);
    assert!(hurdle.evpi_dollars < base.evpi_dollars);
}

#[test]
fn uniform_prior_evsi_sits_between_zero_and_evpi() {
    let prior = PriorDistribution::Uniform { low: -0.1, high: 0.1 };
    let config = seeded(10_000, 7);
    let evpi = compute_evpi(&EvpiInputs { k: K, prior, threshold: 0.0 }, &config).expect("evpi");
    let evsi = compute_evsi(&evsi_inputs(prior, 35_000), &config).expect("evsi");
    assert_eq!(evsi.method, EvsiMethod::MonteCarlo);
    assert!(evsi.evsi_dollars > 0.0);
    assert!(evsi.evsi_dollars < evpi.evpi_dollars, "{} vs {}", evsi.evsi_dollars, evpi.evpi_dollars);
}

#[test]
fn cauchy_prior_has_unbounded_evpi_above_any_evsi() {
    // Narrow enough to escape truncation, so the lower tail stays Cauchy.
    let prior = PriorDistribution::StudentT { mu: 0.0, sigma: 0.001, df: 1.0 };
    let config = seeded(20_000, 3);
    let evpi = compute_evpi(&EvpiInputs { k: K, prior, threshold: 0.0 }, &config).expect("evpi");
    assert!(!evpi.truncation_applied);
    assert_eq!(evpi.evpi_dollars, f64::INFINITY);

    let evsi = compute_evsi_monte_carlo(&evsi_inputs(prior, 10), &config).expect("evsi");
    assert!(evsi.evsi_dollars.is_finite());
    assert!(evsi.evsi_dollars >= 0.0);
    assert!(evsi.evsi_dollars <= evpi.evpi_dollars);
}

#[test]
fn monte_carlo_tracks_closed_form_for_normal_priors() {
    let config = seeded(10_000, 42);
    for (prior, n) in [
        (PriorDistribution::Normal { mu: 0.0, sigma: 0.05 }, 100),
        (PriorDistribution::Normal { mu: 0.01, sigma: 0.03 }, 2_000),
        (PriorDistribution::Normal { mu: -0.01, sigma: 0.02 }, 20_000),
    ] {
        let inputs = evsi_inputs(prior, n);
        let exact = compute_evsi_closed_form(&inputs, &config).expect("closed form");
        let simulated = compute_evsi_monte_carlo(&inputs, &config).expect("monte carlo");
        let tolerance = 3.0 * exact.evsi_dollars / (config.monte_carlo.num_samples as f64).sqrt();
        assert!(
            (simulated.evsi_dollars - exact.evsi_dollars).abs() <= tolerance,
            "{:?} n={}: mc {} exact {} tol {}",
            prior,
            n,
            simulated.evsi_dollars,
            exact.evsi_dollars,
            tolerance
        );
    }
}

#[test]
fn prior_with_mass_below_minus_one_is_truncated() {
    let prior = PriorDistribution::Normal { mu: -0.9, sigma: 0.2 };
    let r = compute_evpi(&EvpiInputs { k: K, prior, threshold: 0.0 }, &EngineConfig::default())
        .expect("evpi");
    assert!(r.truncation_applied);
    assert!(r.prior_mean > -0.9);
    assert_eq!(r.default_decision, Decision::DontShip);

    let evsi = compute_evsi(&evsi_inputs(prior, 5_000), &seeded(2_000, 3)).expect("evsi");
    assert!(evsi.truncation_applied);
    assert_eq!(evsi.method, EvsiMethod::MonteCarlo);
}

#[test]
fn degenerate_inputs_give_exact_zeros() {
    let config = seeded(1_000, 1);
    let point = PriorDistribution::Normal { mu: 0.02, sigma: 0.0 };
    let evpi = compute_evpi(&EvpiInputs { k: K, prior: point, threshold: 0.0 }, &config).expect("evpi");
    assert_eq!(evpi.evpi_dollars, 0.0);

    let evsi = compute_evsi(&evsi_inputs(point, 5_000), &config).expect("evsi");
    assert_eq!(evsi.evsi_dollars, 0.0);
    assert_eq!(evsi.method, EvsiMethod::Degenerate);

    let mut empty_arm = evsi_inputs(PriorDistribution::Uniform { low: -0.1, high: 0.1 }, 5_000);
    empty_arm.n_control = 0;
    let evsi = compute_evsi(&empty_arm, &config).expect("evsi");
    assert_eq!(evsi.evsi_dollars, 0.0);
    assert_eq!(evsi.standard_error, None);

    let cod = compute_cost_of_delay(&CodInputs {
        k: 0.0,
        mu: 0.02,
        threshold: 0.0,
        test_duration_days: 14.0,
        variant_fraction: 0.5,
        decision_latency_days: 0.0,
    })
    .expect("cod");
    assert_eq!(cod.cod_dollars, 0.0);
}

#[test]
fn net_value_reduces_to_evsi_without_delay() {
    let config = seeded(5_000, 99);
    let prior = PriorDistribution::StudentT { mu: 0.005, sigma: 0.02, df: 5.0 };
    let evsi = compute_evsi_monte_carlo(&evsi_inputs(prior, 8_000), &config).expect("evsi");
    let net = compute_net_value(
        &NetValueInputs {
            k: K,
            baseline_conversion_rate: 0.05,
            threshold: 0.0,
            prior,
            n_control: 8_000,
            n_variant: 8_000,
            test_duration_days: 0.0,
            variant_fraction: 0.5,
            decision_latency_days: 0.0,
        },
        &config,
    )
    .expect("net value");
    assert!((net.net_value_dollars - evsi.evsi_dollars).abs() < 1e-6 * evsi.evsi_dollars.max(1.0));
}

#[test]
fn full_analysis_from_business_inputs() {
    let inputs = AnalysisInputs {
        business: BusinessInputs {
            baseline_conversion_rate: 0.05,
            annual_traffic: 1_000_000.0,
            value_per_conversion: 100.0,
            unit_label: Some("visitor".to_string()),
        },
        prior: PriorInput::Interval90 {
            shape: IntervalShape::Normal,
            low: -0.05,
            high: 0.08,
        },
        threshold: ThresholdSpec {
            scenario: ThresholdScenario::ShipIfPositive,
            value: 0.0,
            unit: ThresholdUnit::Lift,
        },
        design: ExperimentDesign {
            test_duration_days: 21.0,
            daily_traffic: 4_000.0,
            variant_fraction: 0.5,
            eligibility_fraction: 1.0,
            decision_latency_days: 3.0,
        },
    };
    let report = analyze(&inputs, &seeded(4_000, 11)).expect("analysis");
    assert!((report.inputs.k - K).abs() < 1e-6);
    assert_eq!(report.evpi.default_decision, Decision::Ship);
    assert_eq!(report.inputs.n_control, 42_000);
    assert_eq!(report.inputs.n_variant, 42_000);
    assert_eq!(report.evsi.method, EvsiMethod::ClosedForm);
    assert!(report.evsi.evsi_dollars > 0.0);
    assert!(report.evsi.evsi_dollars <= report.evpi.evpi_dollars);
    assert!(report.cost_of_delay.cod_applies);
    assert!(report.cost_of_delay.cod_dollars > 0.0);
    assert_eq!(report.worth_testing, report.net_value.net_value_dollars > 0.0);
    assert!(report.run_id.starts_with("run-"));
}
