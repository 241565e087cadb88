//! Log-domain kernels: log-sum-exp for posterior grid normalization and
//! log-gamma / log-beta for the Student-t normalizer and incomplete beta.

use std::f64::consts::PI;

/// 0.5 * ln(2*pi)
pub const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Lanczos approximation, g = 7, n = 9 (published coefficients).
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)]
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// `ln(sum(exp(x)))` without overflow.
///
/// Empty input and all `-inf` give `-inf`; any NaN gives NaN.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let peak = values.iter().copied().fold(f64::NEG_INFINITY, |acc, v| {
        if acc.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            acc.max(v)
        }
    });
    if !peak.is_finite() {
        return peak;
    }
    let scaled: f64 = values.iter().map(|v| (v - peak).exp()).sum();
    peak + scaled.ln()
}

/// `ln |Gamma(z)|`; NaN at the poles (non-positive integers).
pub fn log_gamma(z: f64) -> f64 {
    match z {
        _ if z.is_nan() || z == f64::NEG_INFINITY => f64::NAN,
        _ if z == f64::INFINITY => f64::INFINITY,
        _ if z <= 0.0 && z == z.round() => f64::NAN,
        // Reflection: Gamma(z) Gamma(1 - z) = pi / sin(pi z)
        _ if z < 0.5 => PI.ln() - (PI * z).sin().abs().ln() - log_gamma(1.0 - z),
        _ => {
            let w = z - 1.0;
            let series = LANCZOS
                .iter()
                .enumerate()
                .skip(1)
                .fold(LANCZOS[0], |acc, (i, c)| acc + c / (w + i as f64));
            let t = w + LANCZOS_G + 0.5;
            LOG_SQRT_2PI + (w + 0.5) * t.ln() - t + series.ln()
        }
    }
}

/// `ln B(a, b)`.
pub fn log_beta(a: f64, b: f64) -> f64 {
    log_gamma(a) + log_gamma(b) - log_gamma(a + b)
}
