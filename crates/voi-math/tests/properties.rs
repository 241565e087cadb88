//! Property-based tests for voi-math numerical functions.
//!
//! Uses proptest to verify distributional invariants across many random inputs.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use voi_math::{
    box_muller, log_sum_exp, sample_standard_normal, standard_normal_cdf, standard_normal_pdf,
    standard_normal_quantile, student_t_cdf, student_t_pdf, student_t_quantile,
};

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

// ============================================================================
// Standard normal properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// CDF stays inside [0, 1].
    #[test]
    fn normal_cdf_bounded(z in -50.0..50.0f64) {
        let p = standard_normal_cdf(z);
        prop_assert!((0.0..=1.0).contains(&p), "Phi({}) = {}", z, p);
    }

    /// CDF is monotone non-decreasing.
    #[test]
    fn normal_cdf_monotone(z in -10.0..10.0f64, dz in 0.0..5.0f64) {
        prop_assert!(standard_normal_cdf(z) <= standard_normal_cdf(z + dz));
    }

    /// Phi(z) + Phi(-z) = 1.
    #[test]
    fn normal_cdf_symmetry(z in -8.0..8.0f64) {
        let sum = standard_normal_cdf(z) + standard_normal_cdf(-z);
        prop_assert!((sum - 1.0).abs() < TOL, "Phi({}) + Phi(-{}) = {}", z, z, sum);
    }

    /// The CDF's slope matches the PDF (central difference).
    #[test]
    fn normal_cdf_derivative_is_pdf(z in -6.0..6.0f64) {
        let h = 1e-5;
        let slope = (standard_normal_cdf(z + h) - standard_normal_cdf(z - h)) / (2.0 * h);
        prop_assert!((slope - standard_normal_pdf(z)).abs() < 1e-8);
    }

    /// Quantile lands on the requested probability.
    #[test]
    fn normal_quantile_hits_target(p in 1e-10..(1.0 - 1e-10)) {
        let z = standard_normal_quantile(p);
        prop_assert!(z.is_finite());
        prop_assert!((standard_normal_cdf(z) - p).abs() < 1e-12);
    }

    /// Box-Muller never produces non-finite output, whatever the uniforms.
    #[test]
    fn box_muller_always_finite(u1 in 0.0..1.0f64, u2 in 0.0..1.0f64) {
        let (a, b) = box_muller(u1, u2);
        prop_assert!(a.is_finite() && b.is_finite());
    }
}

// ============================================================================
// Student-t properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// t CDF stays inside [0, 1] and is symmetric.
    #[test]
    fn t_cdf_bounded_and_symmetric(t in -100.0..100.0f64, df in 0.5..60.0f64) {
        let lo = student_t_cdf(-t, df);
        let hi = student_t_cdf(t, df);
        prop_assert!((0.0..=1.0).contains(&hi));
        prop_assert!((lo + hi - 1.0).abs() < 1e-9, "df={} t={} sum={}", df, t, lo + hi);
    }

    /// Heavier tails than the normal: lower-tail mass at -|t| is at least Phi(-|t|).
    #[test]
    fn t_tails_dominate_normal(t in 0.5..6.0f64, df in 1.0..50.0f64) {
        prop_assert!(student_t_cdf(-t, df) >= standard_normal_cdf(-t) - 1e-12);
    }

    /// Quantile lands on the requested probability.
    #[test]
    fn t_quantile_hits_target(p in 1e-6..(1.0 - 1e-6), df in 1.2..40.0f64) {
        let t = student_t_quantile(p, df);
        prop_assert!(t.is_finite());
        prop_assert!((student_t_cdf(t, df) - p).abs() < 1e-9, "df={} p={} t={}", df, p, t);
    }

    /// Density is positive and peaks at zero.
    #[test]
    fn t_pdf_peaks_at_zero(t in -20.0..20.0f64, df in 0.5..40.0f64) {
        let f = student_t_pdf(t, df);
        prop_assert!(f > 0.0);
        prop_assert!(f <= student_t_pdf(0.0, df) + 1e-15);
    }
}

// ============================================================================
// Edge cases
// ============================================================================

/// Generator that yields an all-zero word on a fixed cadence, so the
/// uniform conversion produces exactly 0.0.
struct ZeroInjectingRng {
    inner: StdRng,
    counter: u64,
    every: u64,
}

impl RngCore for ZeroInjectingRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.counter += 1;
        if self.counter % self.every == 1 {
            0
        } else {
            self.inner.next_u64()
        }
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.inner.fill_bytes(dst)
    }
}

#[test]
fn box_muller_sampling_survives_zero_uniforms() {
    let mut rng = ZeroInjectingRng {
        inner: StdRng::seed_from_u64(2024),
        counter: 0,
        every: 997,
    };
    let mut non_finite = 0;
    for _ in 0..100_000 {
        let z = sample_standard_normal(&mut rng);
        if !z.is_finite() {
            non_finite += 1;
        }
    }
    assert_eq!(non_finite, 0);
    assert!(rng.counter > 997, "generator must have emitted zeros");
}

#[test]
fn edge_case_nan_propagation() {
    assert!(standard_normal_cdf(f64::NAN).is_nan());
    assert!(standard_normal_quantile(f64::NAN).is_nan());
    assert!(student_t_cdf(f64::NAN, 4.0).is_nan());
    assert!(log_sum_exp(&[1.0, f64::NAN]).is_nan());
}

#[test]
fn edge_case_infinity_handling() {
    assert_eq!(standard_normal_cdf(f64::INFINITY), 1.0);
    assert_eq!(standard_normal_cdf(f64::NEG_INFINITY), 0.0);
    assert_eq!(student_t_quantile(0.0, 3.0), f64::NEG_INFINITY);
    assert_eq!(student_t_quantile(1.0, 3.0), f64::INFINITY);
}
