//! Property-based tests for decision-value invariants.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use voi_config::EngineConfig;
use voi_core::decision::{
    compute_cost_of_delay, compute_evpi, compute_evsi_closed_form, CodInputs, EvpiInputs,
    EvsiInputs,
};
use voi_core::{Decision, EffectivePrior, PriorDistribution};
use voi_math::standard_normal_cdf;

/// Yields zeros for the first `zeros` words, then defers to a seeded generator.
struct ZeroFirst {
    zeros: usize,
    inner: StdRng,
}

impl RngCore for ZeroFirst {
    fn next_u32(&mut self) -> u32 {
        if self.zeros > 0 {
            self.zeros -= 1;
            return 0;
        }
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        if self.zeros > 0 {
            self.zeros -= 1;
            return 0;
        }
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        if self.zeros > 0 {
            self.zeros -= 1;
            dst.fill(0);
            return;
        }
        self.inner.fill_bytes(dst);
    }
}

fn normal_prior() -> impl Strategy<Value = PriorDistribution> {
    (-0.3..0.3f64, 0.0..0.2f64).prop_map(|(mu, sigma)| PriorDistribution::Normal { mu, sigma })
}

fn any_prior() -> impl Strategy<Value = PriorDistribution> {
    prop_oneof![
        normal_prior(),
        (-0.3..0.3f64, 0.001..0.2f64, 1.5..40.0f64)
            .prop_map(|(mu, sigma, df)| PriorDistribution::StudentT { mu, sigma, df }),
        (-0.5..0.2f64, 0.001..0.5f64)
            .prop_map(|(low, width)| PriorDistribution::Uniform { low, high: low + width }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn evpi_is_non_negative(
        prior in any_prior(),
        k in 0.0..1e8f64,
        threshold in -0.3..0.3f64,
    ) {
        let r = compute_evpi(&EvpiInputs { k, prior, threshold }, &EngineConfig::default())
            .expect("valid inputs");
        prop_assert!(r.evpi_dollars.is_finite());
        prop_assert!(r.evpi_dollars >= 0.0, "EVPI {}", r.evpi_dollars);
    }

    #[test]
    fn point_mass_prior_has_zero_evpi(
        mu in -0.5..0.5f64,
        k in 0.0..1e8f64,
        threshold in -0.5..0.5f64,
    ) {
        let prior = PriorDistribution::Normal { mu, sigma: 0.0 };
        let r = compute_evpi(&EvpiInputs { k, prior, threshold }, &EngineConfig::default())
            .expect("valid inputs");
        prop_assert_eq!(r.evpi_dollars, 0.0);
        prop_assert!(r.degenerate);
    }

    #[test]
    fn sample_information_never_beats_perfect_information(
        prior in normal_prior(),
        k in 1.0..1e8f64,
        rate in 0.001..0.5f64,
        threshold in -0.2..0.2f64,
        n in 1u64..200_000,
    ) {
        let config = EngineConfig::default();
        let evpi = compute_evpi(&EvpiInputs { k, prior, threshold }, &config).expect("evpi");
        let evsi = compute_evsi_closed_form(
            &EvsiInputs {
                k,
                baseline_conversion_rate: rate,
                threshold,
                prior,
                n_control: n,
                n_variant: n,
            },
            &config,
        )
        .expect("evsi");
        prop_assert!(evsi.evsi_dollars >= 0.0);
        prop_assert!(
            evsi.evsi_dollars <= evpi.evpi_dollars * (1.0 + 1e-9) + 1e-9,
            "EVSI {} > EVPI {}",
            evsi.evsi_dollars,
            evpi.evpi_dollars
        );
    }

    #[test]
    fn delay_cost_follows_the_default(
        k in 1.0..1e8f64,
        mu in -0.3..0.3f64,
        threshold in -0.3..0.3f64,
        days in 1.0..120.0f64,
        variant_fraction in 0.01..0.99f64,
    ) {
        let r = compute_cost_of_delay(&CodInputs {
            k,
            mu,
            threshold,
            test_duration_days: days,
            variant_fraction,
            decision_latency_days: 0.0,
        })
        .expect("cod");
        match Decision::from_estimate(mu, threshold) {
            Decision::DontShip => prop_assert_eq!(r.cod_dollars, 0.0),
            Decision::Ship if mu != 0.0 => prop_assert!(r.cod_dollars > 0.0),
            Decision::Ship => prop_assert_eq!(r.cod_dollars, 0.0),
        }
    }

    #[test]
    fn truncation_only_raises_the_mean(mu in -1.05..-0.5f64, sigma in 0.05..0.5f64) {
        let config = EngineConfig::default();
        let prior = PriorDistribution::Normal { mu, sigma };
        let eff = EffectivePrior::new(prior, &config.truncation).expect("feasible prior");
        if eff.truncation_applied() {
            prop_assert!(eff.point_estimate() > mu);
            prop_assert!(eff.point_estimate() >= config.truncation.lower_bound);
        } else {
            prop_assert!((eff.point_estimate() - mu).abs() < 1e-12);
        }
    }
}

#[test]
fn normal_cdf_edge_values() {
    assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-15);
    assert_eq!(standard_normal_cdf(f64::INFINITY), 1.0);
    assert_eq!(standard_normal_cdf(f64::NEG_INFINITY), 0.0);
    assert!(standard_normal_cdf(f64::NAN).is_nan());
}

#[test]
fn hundred_thousand_draws_stay_finite_with_zero_uniforms() {
    let config = EngineConfig::default();
    for prior in [
        PriorDistribution::Normal { mu: 0.01, sigma: 0.05 },
        PriorDistribution::StudentT { mu: 0.01, sigma: 0.05, df: 3.0 },
        PriorDistribution::StudentT { mu: 0.0, sigma: 0.05, df: 1.0 },
        PriorDistribution::Normal { mu: -0.9, sigma: 0.2 },
    ] {
        let eff = EffectivePrior::new(prior, &config.truncation).expect("prior");
        let mut rng = ZeroFirst {
            zeros: 16,
            inner: StdRng::seed_from_u64(2024),
        };
        let mut non_finite = 0usize;
        for i in 0..100_000 {
            let draw = if i % 2 == 0 {
                eff.draw(&mut rng, config.monte_carlo.max_redraws)
            } else {
                eff.draw_stratified(&mut rng, i, 100_000, config.monte_carlo.max_redraws)
            };
            if !draw.value.is_finite() {
                non_finite += 1;
            }
        }
        assert_eq!(non_finite, 0, "{:?}", prior);
    }
}
