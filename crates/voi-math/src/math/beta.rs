//! Regularized incomplete beta function.
//!
//! The Student-t CDF reduces to `I_x(df/2, 1/2)`, so this is the kernel
//! behind every heavy-tailed prior evaluation. Uses the continued-fraction
//! expansion with modified Lentz iteration (Numerical Recipes), with a
//! tighter convergence tolerance than typical single-precision variants
//! because tail probabilities feed quantile inversion.

use super::stable::log_beta;

const BETACF_MAX_ITERS: usize = 300;
const BETACF_EPS: f64 = 1.0e-14;
const BETACF_FPMIN: f64 = 1.0e-300;

/// `I_x(a, b)`, the CDF of Beta(a, b) at `x`.
pub fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    if x.is_nan() || !(a > 0.0 && b > 0.0) {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (a * x.ln() + b * (-x).ln_1p() - log_beta(a, b)).exp();
    // The fraction converges fast only left of the mode; use the mirror
    // identity I_x(a, b) = 1 - I_{1-x}(b, a) on the right.
    let p = if x < (a + 1.0) / (a + b + 2.0) {
        front * continued_fraction(a, b, x) / a
    } else {
        1.0 - front * continued_fraction(b, a, 1.0 - x) / b
    };
    p.clamp(0.0, 1.0)
}

fn nonzero(v: f64) -> f64 {
    if v.abs() < BETACF_FPMIN {
        BETACF_FPMIN
    } else {
        v
    }
}

/// Modified Lentz evaluation of the incomplete-beta continued fraction.
fn continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    let mut c = 1.0;
    let mut d = 1.0 / nonzero(1.0 - (a + b) * x / (a + 1.0));
    let mut h = d;

    // Each step folds one coefficient into the running ratio.
    let mut step = |coeff: f64| {
        d = 1.0 / nonzero(1.0 + coeff * d);
        c = nonzero(1.0 + coeff / c);
        d * c
    };

    for m in 1..=BETACF_MAX_ITERS {
        let m = m as f64;
        let even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        h *= step(even);
        let odd = -(a + m) * (a + b + m) * x / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));
        let delta = step(odd);
        h *= delta;
        if (delta - 1.0).abs() < BETACF_EPS {
            break;
        }
    }
    h
}
