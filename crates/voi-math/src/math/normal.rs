//! Standard normal distribution kernels.
//!
//! - `standard_normal_cdf` uses Hart's double-precision rational
//!   approximation in the West (2005) arrangement; absolute error is
//!   below 1e-14 across the real line.
//! - `standard_normal_quantile` uses Acklam's rational approximation
//!   followed by one Halley refinement step against the CDF above.
//! - `box_muller` clamps the first uniform away from zero before the
//!   logarithm so a generator that returns exactly 0.0 cannot produce
//!   an infinite or NaN draw.

use rand::Rng;
use std::f64::consts::PI;

/// 1 / sqrt(2*pi)
pub const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

/// Smallest uniform value admitted into the Box-Muller logarithm.
pub const BOX_MULLER_MIN_UNIFORM: f64 = 1e-16;

const CDF_SPLIT: f64 = 7.071_067_811_865_47;
const CDF_CUTOFF: f64 = 37.0;

const ACKLAM_A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_69e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const ACKLAM_B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const ACKLAM_C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const ACKLAM_D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const ACKLAM_P_LOW: f64 = 0.024_25;

/// Standard normal density phi(z).
pub fn standard_normal_pdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z.is_infinite() {
        return 0.0;
    }
    INV_SQRT_2PI * (-0.5 * z * z).exp()
}

/// Standard normal CDF Phi(z).
///
/// Exactly 0 at -inf and 1 at +inf. NaN propagates.
pub fn standard_normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return 1.0;
    }
    if z == f64::NEG_INFINITY {
        return 0.0;
    }

    let x = z.abs();
    let tail = if x > CDF_CUTOFF {
        0.0
    } else {
        let e = (-0.5 * x * x).exp();
        if x < CDF_SPLIT {
            let mut num = 3.526_249_659_989_11e-2 * x + 0.700_383_064_443_688;
            num = num * x + 6.373_962_203_531_65;
            num = num * x + 33.912_866_078_383;
            num = num * x + 112.079_291_497_871;
            num = num * x + 221.213_596_169_931;
            num = num * x + 220.206_867_912_376;

            let mut den = 8.838_834_764_831_84e-2 * x + 1.755_667_163_182_64;
            den = den * x + 16.064_177_579_207;
            den = den * x + 86.780_732_202_946_1;
            den = den * x + 296.564_248_779_674;
            den = den * x + 637.333_633_378_831;
            den = den * x + 793.826_512_519_948;
            den = den * x + 440.413_735_824_752;

            e * num / den
        } else {
            let mut b = x + 0.65;
            b = x + 4.0 / b;
            b = x + 3.0 / b;
            b = x + 2.0 / b;
            b = x + 1.0 / b;
            e / b / SQRT_2PI
        }
    };

    if z > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Inverse of the standard normal CDF.
///
/// Returns -inf at p = 0, +inf at p = 1 and NaN outside [0, 1].
pub fn standard_normal_quantile(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let x = if p < ACKLAM_P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        acklam_tail(q)
    } else if p <= 1.0 - ACKLAM_P_LOW {
        let q = p - 0.5;
        let r = q * q;
        let a = &ACKLAM_A;
        let b = &ACKLAM_B;
        (((((a[0] * r + a[1]) * r + a[2]) * r + a[3]) * r + a[4]) * r + a[5]) * q
            / (((((b[0] * r + b[1]) * r + b[2]) * r + b[3]) * r + b[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (-p).ln_1p()).sqrt();
        -acklam_tail(q)
    };

    // One Halley step brings the approximation to full double precision.
    let e = standard_normal_cdf(x) - p;
    let u = e * SQRT_2PI * (0.5 * x * x).exp();
    let refined = x - u / (1.0 + 0.5 * x * u);
    if refined.is_finite() {
        refined
    } else {
        x
    }
}

fn acklam_tail(q: f64) -> f64 {
    let c = &ACKLAM_C;
    let d = &ACKLAM_D;
    (((((c[0] * q + c[1]) * q + c[2]) * q + c[3]) * q + c[4]) * q + c[5])
        / ((((d[0] * q + d[1]) * q + d[2]) * q + d[3]) * q + 1.0)
}

/// Box-Muller transform of two uniforms into two independent standard normals.
pub fn box_muller(u1: f64, u2: f64) -> (f64, f64) {
    let u1 = u1.max(BOX_MULLER_MIN_UNIFORM);
    let radius = (-2.0 * u1.ln()).sqrt();
    let angle = 2.0 * PI * u2;
    (radius * angle.cos(), radius * angle.sin())
}

/// Draw one standard normal variate.
pub fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random();
    let u2: f64 = rng.random();
    box_muller(u1, u2).0
}
