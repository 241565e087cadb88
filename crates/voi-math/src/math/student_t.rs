//! Standard Student-t distribution kernels.
//!
//! All functions operate on the standardized variable `T ~ t(df)`; callers
//! apply the location-scale transform `mu + sigma * T` themselves.
//!
//! The CDF uses the incomplete-beta identity
//! `P(T <= t) = 0.5 * I_{df/(df+t^2)}(df/2, 1/2)` for `t <= 0`.
//! The quantile has closed forms for df = 1 and df = 2 and otherwise
//! brackets from the normal quantile and bisects in t-space. At very low
//! df the extreme quantiles overflow to ±inf; that is reported, not hidden.

use super::beta::beta_cdf;
use super::normal::{standard_normal_cdf, standard_normal_quantile};
use super::stable::{log_beta, log_gamma};
use std::f64::consts::PI;

/// Above this df the t distribution is numerically indistinguishable from
/// the standard normal and the normal kernels are used instead.
pub const STUDENT_T_NORMAL_DF: f64 = 1e7;

/// Beyond this |t| the incomplete-beta argument underflows, so the tail is
/// taken from its leading asymptotic term `x^a / (a B(a, 1/2))`.
const ASYMPTOTIC_ABS_T: f64 = 1e100;

const QUANTILE_MAX_BISECTIONS: usize = 200;
const QUANTILE_MAX_DOUBLINGS: usize = 1100;
const QUANTILE_REL_TOL: f64 = 1e-14;

/// Log normalizing constant `ln Γ((df+1)/2) - ln Γ(df/2) - ½ ln(df π)`.
///
/// Hoist this out of hot loops that evaluate many densities at one df.
pub fn student_t_log_norm_const(df: f64) -> f64 {
    log_gamma(0.5 * (df + 1.0)) - log_gamma(0.5 * df) - 0.5 * (df * PI).ln()
}

/// Log density of the standard t distribution.
pub fn student_t_log_pdf(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return f64::NEG_INFINITY;
    }
    student_t_log_norm_const(df) - 0.5 * (df + 1.0) * (t * t / df).ln_1p()
}

/// Density of the standard t distribution.
pub fn student_t_pdf(t: f64, df: f64) -> f64 {
    let log_pdf = student_t_log_pdf(t, df);
    if log_pdf.is_nan() {
        return f64::NAN;
    }
    log_pdf.exp()
}

/// CDF of the standard t distribution.
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t == f64::INFINITY {
        return 1.0;
    }
    if t == f64::NEG_INFINITY {
        return 0.0;
    }
    if df >= STUDENT_T_NORMAL_DF {
        return standard_normal_cdf(t);
    }
    if t == 0.0 {
        return 0.5;
    }

    let abs_t = t.abs();
    let tail = if abs_t > ASYMPTOTIC_ABS_T {
        let a = 0.5 * df;
        let log_x = df.ln() - 2.0 * abs_t.ln();
        (0.5f64.ln() + a * log_x - a.ln() - log_beta(a, 0.5)).exp()
    } else {
        let x = df / (df + abs_t * abs_t);
        0.5 * beta_cdf(x, 0.5 * df, 0.5)
    };
    if t > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Quantile (inverse CDF) of the standard t distribution.
///
/// May return ±inf for finite `p` when the true quantile exceeds the f64
/// range (tiny `p` at small df).
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    if p.is_nan() || df.is_nan() || df <= 0.0 || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    if p == 0.5 {
        return 0.0;
    }
    if df >= STUDENT_T_NORMAL_DF {
        return standard_normal_quantile(p);
    }
    if df == 1.0 {
        return (PI * (p - 0.5)).tan();
    }
    if df == 2.0 {
        return (2.0 * p - 1.0) / (2.0 * p * (1.0 - p)).sqrt();
    }

    // Solve in the lower tail and mirror.
    let q = p.min(1.0 - p);
    let lower = lower_tail_quantile(q, df);
    if p < 0.5 {
        lower
    } else {
        -lower
    }
}

fn lower_tail_quantile(q: f64, df: f64) -> f64 {
    // Heavier tails put the t quantile at or below the normal one.
    let mut hi = standard_normal_quantile(q).min(0.0);
    let mut lo = 2.0 * hi - 1.0;
    let mut doublings = 0;
    while student_t_cdf(lo, df) > q {
        hi = lo;
        lo *= 2.0;
        doublings += 1;
        if !lo.is_finite() || doublings > QUANTILE_MAX_DOUBLINGS {
            return f64::NEG_INFINITY;
        }
    }

    let mut mid = 0.5 * (lo + hi);
    for _ in 0..QUANTILE_MAX_BISECTIONS {
        mid = 0.5 * (lo + hi);
        let cdf = student_t_cdf(mid, df);
        if cdf.is_nan() {
            return f64::NAN;
        }
        if cdf == q {
            return mid;
        }
        if cdf < q {
            lo = mid;
        } else {
            hi = mid;
        }
        if (hi - lo).abs() <= QUANTILE_REL_TOL * mid.abs().max(f64::MIN_POSITIVE) {
            break;
        }
    }
    mid
}

/// Upper partial first moment of the standard t: `∫_x^∞ t f(t) dt`.
///
/// Equals `f(x) * (df + x^2) / (df - 1)`. Infinite for df <= 1.
pub fn student_t_upper_partial_moment(x: f64, df: f64) -> f64 {
    if x.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if df <= 1.0 {
        return f64::INFINITY;
    }
    if x.is_infinite() {
        return 0.0;
    }
    student_t_pdf(x, df) * (df + x * x) / (df - 1.0)
}
