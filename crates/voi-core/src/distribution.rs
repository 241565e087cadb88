//! Prior distributions over lift.
//!
//! [`PriorDistribution`] is the raw, user-specified prior. [`EffectivePrior`]
//! wraps a validated prior with the feasibility bound applied once; every
//! engine statistic (point estimate, CDF, quantile, density, sampling,
//! partial expectations) is read through it so no path can skip truncation.
//!
//! # Truncation
//!
//! Lift cannot fall below the configured bound (default -1, a total loss).
//! When the untruncated mass below the bound exceeds the tolerance the
//! prior is renormalized on `[bound, ∞)`:
//!
//! ```text
//! Z        = 1 - F(bound)
//! f_eff(l) = f(l) / Z                       l >= bound
//! F_eff(l) = (F(l) - F(bound)) / Z
//! Q_eff(p) = Q(F(bound) + p Z)
//! ```
//!
//! Normal and Student-t (df > 1) moments use closed forms; Uniform simply
//! raises its lower edge.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;
use voi_config::TruncationConfig;
use voi_math::{
    standard_normal_cdf, standard_normal_pdf, standard_normal_quantile, sample_standard_normal,
    student_t_cdf, student_t_log_norm_const, student_t_pdf, student_t_quantile,
    student_t_upper_partial_moment, LOG_SQRT_2PI,
};

use crate::logging::event_names;

/// Kept mass below which a truncated prior is treated as infeasible.
const MIN_KEPT_MASS: f64 = 1e-12;

/// Prior belief about the true lift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PriorDistribution {
    Normal { mu: f64, sigma: f64 },
    /// Location-scale t: `mu + sigma * T`, `T ~ t(df)`.
    StudentT { mu: f64, sigma: f64, df: f64 },
    Uniform { low: f64, high: f64 },
}

/// Malformed prior parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriorError {
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("sigma must be non-negative, got {0}")]
    NegativeSigma(f64),
    #[error("degrees of freedom must be positive, got {0}")]
    InvalidDf(f64),
    #[error("bounds must satisfy low < high, got [{low}, {high}]")]
    EmptyRange { low: f64, high: f64 },
    #[error("prior places no mass at or above the feasibility bound {bound}")]
    NoFeasibleMass { bound: f64 },
}

/// Statistical caveats carried through every result computed from a prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriorWarning {
    /// df <= 1: the mean does not exist; the median is used as point estimate.
    UndefinedMean { df: f64 },
    /// df <= 2: the variance does not exist.
    UndefinedVariance { df: f64 },
}

impl fmt::Display for PriorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorWarning::UndefinedMean { df } => {
                write!(f, "Student-t mean undefined for df = {} (<= 1); using the median", df)
            }
            PriorWarning::UndefinedVariance { df } => {
                write!(f, "Student-t variance undefined for df = {} (<= 2)", df)
            }
        }
    }
}

/// Shape of a 90% credible interval elicited from the decision-maker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum IntervalShape {
    Normal,
    StudentT { df: f64 },
}

/// One prior draw. `fell_back` marks a draw that exhausted its re-draw
/// budget and returned the point estimate instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorDraw {
    pub value: f64,
    pub fell_back: bool,
}

fn require_finite(name: &'static str, value: f64) -> Result<(), PriorError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PriorError::NonFinite { name, value })
    }
}

fn redraw(max_redraws: u32, fallback: f64, mut sample: impl FnMut() -> f64) -> PriorDraw {
    for _ in 0..max_redraws.max(1) {
        let value = sample();
        if value.is_finite() {
            return PriorDraw {
                value,
                fell_back: false,
            };
        }
    }
    PriorDraw {
        value: fallback,
        fell_back: true,
    }
}

impl PriorDistribution {
    /// Build a prior from a 90% credible interval `[low, high]`.
    pub fn from_interval_90(
        shape: IntervalShape,
        low: f64,
        high: f64,
    ) -> Result<PriorDistribution, PriorError> {
        require_finite("low", low)?;
        require_finite("high", high)?;
        if low >= high {
            return Err(PriorError::EmptyRange { low, high });
        }
        let mu = 0.5 * (low + high);
        let half_width = 0.5 * (high - low);
        let prior = match shape {
            IntervalShape::Normal => PriorDistribution::Normal {
                mu,
                sigma: half_width / standard_normal_quantile(0.95),
            },
            IntervalShape::StudentT { df } => {
                if !(df > 0.0) || !df.is_finite() {
                    return Err(PriorError::InvalidDf(df));
                }
                PriorDistribution::StudentT {
                    mu,
                    sigma: half_width / student_t_quantile(0.95, df),
                    df,
                }
            }
        };
        prior.validate()?;
        Ok(prior)
    }

    pub fn validate(&self) -> Result<(), PriorError> {
        match *self {
            PriorDistribution::Normal { mu, sigma } => {
                require_finite("mu", mu)?;
                require_finite("sigma", sigma)?;
                if sigma < 0.0 {
                    return Err(PriorError::NegativeSigma(sigma));
                }
            }
            PriorDistribution::StudentT { mu, sigma, df } => {
                require_finite("mu", mu)?;
                require_finite("sigma", sigma)?;
                if sigma < 0.0 {
                    return Err(PriorError::NegativeSigma(sigma));
                }
                if !df.is_finite() || df <= 0.0 {
                    return Err(PriorError::InvalidDf(df));
                }
            }
            PriorDistribution::Uniform { low, high } => {
                require_finite("low", low)?;
                require_finite("high", high)?;
                if low >= high {
                    return Err(PriorError::EmptyRange { low, high });
                }
            }
        }
        Ok(())
    }

    pub fn warnings(&self) -> Vec<PriorWarning> {
        match *self {
            PriorDistribution::StudentT { df, .. } => {
                let mut out = Vec::new();
                if df <= 1.0 {
                    out.push(PriorWarning::UndefinedMean { df });
                }
                if df <= 2.0 {
                    out.push(PriorWarning::UndefinedVariance { df });
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// Point-mass prior (sigma == 0).
    pub fn is_degenerate(&self) -> bool {
        match *self {
            PriorDistribution::Normal { sigma, .. } | PriorDistribution::StudentT { sigma, .. } => {
                sigma == 0.0
            }
            PriorDistribution::Uniform { .. } => false,
        }
    }

    pub fn pdf(&self, l: f64) -> f64 {
        match *self {
            PriorDistribution::Normal { mu, sigma } => {
                if sigma == 0.0 {
                    return if l == mu { f64::INFINITY } else { 0.0 };
                }
                standard_normal_pdf((l - mu) / sigma) / sigma
            }
            PriorDistribution::StudentT { mu, sigma, df } => {
                if sigma == 0.0 {
                    return if l == mu { f64::INFINITY } else { 0.0 };
                }
                student_t_pdf((l - mu) / sigma, df) / sigma
            }
            PriorDistribution::Uniform { low, high } => {
                if (low..=high).contains(&l) {
                    1.0 / (high - low)
                } else {
                    0.0
                }
            }
        }
    }

    pub fn cdf(&self, l: f64) -> f64 {
        if l.is_nan() {
            return f64::NAN;
        }
        match *self {
            PriorDistribution::Normal { mu, sigma } => {
                if sigma == 0.0 {
                    return if l >= mu { 1.0 } else { 0.0 };
                }
                standard_normal_cdf((l - mu) / sigma)
            }
            PriorDistribution::StudentT { mu, sigma, df } => {
                if sigma == 0.0 {
                    return if l >= mu { 1.0 } else { 0.0 };
                }
                student_t_cdf((l - mu) / sigma, df)
            }
            PriorDistribution::Uniform { low, high } => ((l - low) / (high - low)).clamp(0.0, 1.0),
        }
    }

    /// Inverse CDF. Returns ±inf at p = 0 / 1 for unbounded shapes.
    pub fn quantile(&self, p: f64) -> f64 {
        if p.is_nan() || !(0.0..=1.0).contains(&p) {
            return f64::NAN;
        }
        match *self {
            PriorDistribution::Normal { mu, sigma } => {
                if sigma == 0.0 {
                    return mu;
                }
                mu + sigma * standard_normal_quantile(p)
            }
            PriorDistribution::StudentT { mu, sigma, df } => {
                if sigma == 0.0 {
                    return mu;
                }
                mu + sigma * student_t_quantile(p, df)
            }
            PriorDistribution::Uniform { low, high } => low + p * (high - low),
        }
    }

    /// Mean, or `None` when it does not exist (Student-t with df <= 1).
    pub fn mean(&self) -> Option<f64> {
        match *self {
            PriorDistribution::Normal { mu, .. } => Some(mu),
            PriorDistribution::StudentT { mu, df, .. } => (df > 1.0).then_some(mu),
            PriorDistribution::Uniform { low, high } => Some(0.5 * (low + high)),
        }
    }

    /// Variance, or `None` when it does not exist (Student-t with df <= 2).
    pub fn variance(&self) -> Option<f64> {
        match *self {
            PriorDistribution::Normal { sigma, .. } => Some(sigma * sigma),
            PriorDistribution::StudentT { sigma, df, .. } => {
                (df > 2.0).then(|| sigma * sigma * df / (df - 2.0))
            }
            PriorDistribution::Uniform { low, high } => Some((high - low).powi(2) / 12.0),
        }
    }

    /// Median; the point estimate when the mean is undefined.
    pub fn median(&self) -> f64 {
        match *self {
            PriorDistribution::Normal { mu, .. } | PriorDistribution::StudentT { mu, .. } => mu,
            PriorDistribution::Uniform { low, high } => 0.5 * (low + high),
        }
    }

    /// Single raw draw. May be non-finite for Student-t at extreme quantiles.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            PriorDistribution::Normal { mu, sigma } => mu + sigma * sample_standard_normal(rng),
            PriorDistribution::StudentT { mu, sigma, df } => {
                let u: f64 = rng.random();
                mu + sigma * student_t_quantile(u, df)
            }
            PriorDistribution::Uniform { low, high } => {
                let u: f64 = rng.random();
                low + u * (high - low)
            }
        }
    }

    /// Draw with bounded re-draw on non-finite values; falls back to the
    /// point estimate (mean, or median when the mean is undefined).
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, max_redraws: u32) -> PriorDraw {
        let fallback = self.mean().unwrap_or_else(|| self.median());
        redraw(max_redraws, fallback, || self.sample(rng))
    }
}

#[derive(Debug, Clone, Copy)]
struct LowerTruncation {
    bound: f64,
    /// F(bound) under the untruncated prior.
    cdf_at_bound: f64,
    /// 1 - F(bound), computed from the upper tail.
    kept_mass: f64,
}

/// A validated prior with the feasibility bound applied.
#[derive(Debug, Clone)]
pub struct EffectivePrior {
    original: PriorDistribution,
    /// Shape used for evaluation; a truncated Uniform has its low edge raised.
    shape: PriorDistribution,
    lower: Option<LowerTruncation>,
    truncation_applied: bool,
    mass_below_bound: f64,
    point_estimate: f64,
    std_dev: Option<f64>,
    warnings: Vec<PriorWarning>,
    t_log_norm: f64,
}

impl EffectivePrior {
    pub fn new(prior: PriorDistribution, truncation: &TruncationConfig) -> Result<Self, PriorError> {
        prior.validate()?;
        let bound = truncation.lower_bound;

        let (mass_below, kept_mass) = match prior {
            PriorDistribution::Uniform { low, high } => {
                let width = high - low;
                let below = ((bound - low) / width).clamp(0.0, 1.0);
                let kept = ((high - bound.max(low)) / width).clamp(0.0, 1.0);
                (below, kept)
            }
            _ if prior.is_degenerate() => {
                if prior.median() < bound {
                    (1.0, 0.0)
                } else {
                    (0.0, 1.0)
                }
            }
            PriorDistribution::Normal { mu, sigma } => {
                let alpha = (bound - mu) / sigma;
                (standard_normal_cdf(alpha), standard_normal_cdf(-alpha))
            }
            PriorDistribution::StudentT { mu, sigma, df } => {
                let alpha = (bound - mu) / sigma;
                (student_t_cdf(alpha, df), student_t_cdf(-alpha, df))
            }
        };

        if kept_mass < MIN_KEPT_MASS {
            return Err(PriorError::NoFeasibleMass { bound });
        }

        let truncate = mass_below > truncation.tolerance;
        let mut shape = prior;
        let mut lower = None;
        if truncate {
            match prior {
                PriorDistribution::Uniform { high, .. } => {
                    shape = PriorDistribution::Uniform { low: bound, high };
                }
                _ => {
                    lower = Some(LowerTruncation {
                        bound,
                        cdf_at_bound: mass_below,
                        kept_mass,
                    });
                }
            }
            debug!(
                event = event_names::PRIOR_TRUNCATED,
                bound,
                mass_below,
                "prior renormalized above feasibility bound"
            );
        }

        let t_log_norm = match prior {
            PriorDistribution::StudentT { df, .. } => student_t_log_norm_const(df),
            _ => 0.0,
        };

        let mut effective = EffectivePrior {
            original: prior,
            shape,
            lower,
            truncation_applied: truncate,
            mass_below_bound: mass_below,
            point_estimate: 0.0,
            std_dev: None,
            warnings: prior.warnings(),
            t_log_norm,
        };
        let (point, sd) = effective.moments();
        effective.point_estimate = point;
        effective.std_dev = sd;
        Ok(effective)
    }

    fn moments(&self) -> (f64, Option<f64>) {
        let Some(trunc) = self.lower else {
            let point = self.shape.mean().unwrap_or_else(|| self.shape.median());
            return (point, self.shape.variance().map(f64::sqrt));
        };

        match self.shape {
            PriorDistribution::Normal { mu, sigma } => {
                let alpha = (trunc.bound - mu) / sigma;
                let lambda = standard_normal_pdf(alpha) / trunc.kept_mass;
                let mean = mu + sigma * lambda;
                let var = sigma * sigma * (1.0 + alpha * lambda - lambda * lambda);
                (mean, Some(var.max(0.0).sqrt()))
            }
            PriorDistribution::StudentT { mu, sigma, df } => {
                let alpha = (trunc.bound - mu) / sigma;
                if df <= 1.0 {
                    return (self.quantile(0.5), None);
                }
                let z = trunc.kept_mass;
                let m = student_t_upper_partial_moment(alpha, df);
                let first = m / z;
                let mean = mu + sigma * first;
                if df <= 2.0 {
                    return (mean, None);
                }
                // E[T^2 | T > a] = ((df - 1) a M(a) + df Z) / ((df - 2) Z)
                let second = ((df - 1.0) * alpha * m + df * z) / ((df - 2.0) * z);
                let var = sigma * sigma * (second - first * first);
                (mean, Some(var.max(0.0).sqrt()))
            }
            PriorDistribution::Uniform { .. } => {
                (self.shape.median(), self.shape.variance().map(f64::sqrt))
            }
        }
    }

    /// The prior as specified, before truncation.
    pub fn original(&self) -> &PriorDistribution {
        &self.original
    }

    /// The shape used for evaluation (a truncated Uniform has its low edge raised).
    pub fn shape(&self) -> &PriorDistribution {
        &self.shape
    }

    pub fn truncation_applied(&self) -> bool {
        self.truncation_applied
    }

    /// Untruncated mass below the feasibility bound.
    pub fn mass_below_bound(&self) -> f64 {
        self.mass_below_bound
    }

    pub fn is_degenerate(&self) -> bool {
        self.shape.is_degenerate()
    }

    /// Post-truncation mean; the median when the mean is undefined.
    pub fn point_estimate(&self) -> f64 {
        self.point_estimate
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.std_dev
    }

    /// Spread used to standardize the threshold: the standard deviation when
    /// it exists, else the scale parameter.
    pub fn scale(&self) -> f64 {
        match (self.std_dev, self.shape) {
            (Some(sd), _) => sd,
            (None, PriorDistribution::StudentT { sigma, .. }) => sigma,
            (None, PriorDistribution::Normal { sigma, .. }) => sigma,
            (None, PriorDistribution::Uniform { low, high }) => (high - low) / 12f64.sqrt(),
        }
    }

    pub fn warnings(&self) -> &[PriorWarning] {
        &self.warnings
    }

    /// Untruncated Normal prior, eligible for closed-form shrinkage.
    pub fn is_plain_normal(&self) -> bool {
        matches!(self.shape, PriorDistribution::Normal { .. }) && self.lower.is_none()
    }

    pub fn cdf(&self, l: f64) -> f64 {
        match self.lower {
            None => self.shape.cdf(l),
            Some(t) => {
                if l.is_nan() {
                    return f64::NAN;
                }
                if l < t.bound {
                    return 0.0;
                }
                ((self.shape.cdf(l) - t.cdf_at_bound) / t.kept_mass).clamp(0.0, 1.0)
            }
        }
    }

    pub fn quantile(&self, p: f64) -> f64 {
        match self.lower {
            None => self.shape.quantile(p),
            Some(t) => {
                if p.is_nan() || !(0.0..=1.0).contains(&p) {
                    return f64::NAN;
                }
                let q = self.shape.quantile((t.cdf_at_bound + p * t.kept_mass).min(1.0));
                if q.is_nan() {
                    q
                } else {
                    q.max(t.bound)
                }
            }
        }
    }

    pub fn pdf(&self, l: f64) -> f64 {
        match self.lower {
            None => self.shape.pdf(l),
            Some(t) if l < t.bound => 0.0,
            Some(t) => self.shape.pdf(l) / t.kept_mass,
        }
    }

    /// Log density; `-inf` outside the support.
    pub fn log_pdf(&self, l: f64) -> f64 {
        let kept = match self.lower {
            Some(t) if l < t.bound => return f64::NEG_INFINITY,
            Some(t) => t.kept_mass.ln(),
            None => 0.0,
        };
        let raw = match self.shape {
            PriorDistribution::Normal { mu, sigma } => {
                if sigma == 0.0 {
                    return if l == mu { f64::INFINITY } else { f64::NEG_INFINITY };
                }
                let z = (l - mu) / sigma;
                -0.5 * z * z - LOG_SQRT_2PI - sigma.ln()
            }
            PriorDistribution::StudentT { mu, sigma, df } => {
                if sigma == 0.0 {
                    return if l == mu { f64::INFINITY } else { f64::NEG_INFINITY };
                }
                let x = (l - mu) / sigma;
                self.t_log_norm - 0.5 * (df + 1.0) * (x * x / df).ln_1p() - sigma.ln()
            }
            PriorDistribution::Uniform { low, high } => {
                if (low..=high).contains(&l) {
                    -(high - low).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
        };
        raw - kept
    }

    /// Interval holding all but `tail_mass` of the prior in each unbounded tail.
    pub fn support(&self, tail_mass: f64) -> (f64, f64) {
        match self.shape {
            PriorDistribution::Uniform { low, high } => (low, high),
            _ if self.is_degenerate() => (self.point_estimate, self.point_estimate),
            _ => {
                let lo = match self.lower {
                    Some(t) => t.bound,
                    None => self.quantile(tail_mass),
                };
                (lo, self.quantile(1.0 - tail_mass))
            }
        }
    }

    /// One draw from the effective prior.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, max_redraws: u32) -> PriorDraw {
        if self.lower.is_none() {
            return redraw(max_redraws, self.point_estimate, || self.shape.sample(rng));
        }
        redraw(max_redraws, self.point_estimate, || {
            let u: f64 = rng.random();
            self.quantile(u)
        })
    }

    /// Draw inverted from a uniform inside stratum `stratum` of `strata`.
    pub fn draw_stratified<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        stratum: usize,
        strata: usize,
        max_redraws: u32,
    ) -> PriorDraw {
        let strata = strata.max(1) as f64;
        redraw(max_redraws, self.point_estimate, || {
            let u = (stratum as f64 + rng.random::<f64>()) / strata;
            self.quantile(u)
        })
    }

    /// `E[(t - L)+]`: expected shortfall below `t`.
    ///
    /// `points` sets the resolution of the numerical fallback used when the
    /// mean does not exist (Student-t with df <= 1). That fallback only
    /// covers a tail bounded by truncation; an unbounded Cauchy-like tail
    /// gives `f64::INFINITY`.
    pub fn lower_partial_expectation(&self, t: f64, points: usize) -> f64 {
        self.partial_expectation(t, points, Side::Below).max(0.0)
    }

    /// `E[(L - t)+]`: expected excess above `t`.
    pub fn upper_partial_expectation(&self, t: f64, points: usize) -> f64 {
        self.partial_expectation(t, points, Side::Above).max(0.0)
    }

    fn partial_expectation(&self, t: f64, points: usize, side: Side) -> f64 {
        if self.is_degenerate() {
            let mu = self.point_estimate;
            return match side {
                Side::Below => (t - mu).max(0.0),
                Side::Above => (mu - t).max(0.0),
            };
        }
        match self.shape {
            PriorDistribution::Normal { mu, sigma } => normal_partial(mu, sigma, self.lower, t, side),
            PriorDistribution::StudentT { mu, sigma, df } if df > 1.0 => {
                student_t_partial(mu, sigma, df, self.lower, t, side)
            }
            // No first moment: only a tail cut off by truncation integrates.
            PriorDistribution::StudentT { .. } => match (side, self.lower) {
                (Side::Below, Some(_)) => self.quantile_midpoint_partial(t, points, side),
                _ => f64::INFINITY,
            },
            PriorDistribution::Uniform { low, high } => {
                let width = high - low;
                let mean = 0.5 * (low + high);
                match side {
                    Side::Below if t <= low => 0.0,
                    Side::Below if t >= high => t - mean,
                    Side::Below => (t - low).powi(2) / (2.0 * width),
                    Side::Above if t >= high => 0.0,
                    Side::Above if t <= low => mean - t,
                    Side::Above => (high - t).powi(2) / (2.0 * width),
                }
            }
        }
    }

    fn quantile_midpoint_partial(&self, t: f64, points: usize, side: Side) -> f64 {
        let n = points.max(1);
        let mut sum = 0.0;
        for j in 0..n {
            let l = self.quantile((j as f64 + 0.5) / n as f64);
            if !l.is_finite() {
                continue;
            }
            sum += match side {
                Side::Below => (t - l).max(0.0),
                Side::Above => (l - t).max(0.0),
            };
        }
        sum / n as f64
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Below,
    Above,
}

fn normal_partial(mu: f64, sigma: f64, lower: Option<LowerTruncation>, t: f64, side: Side) -> f64 {
    let z = (t - mu) / sigma;
    match (side, lower) {
        (Side::Below, None) => (t - mu) * standard_normal_cdf(z) + sigma * standard_normal_pdf(z),
        (Side::Above, None) => (mu - t) * standard_normal_cdf(-z) + sigma * standard_normal_pdf(z),
        (Side::Below, Some(trunc)) => {
            if t <= trunc.bound {
                return 0.0;
            }
            let alpha = (trunc.bound - mu) / sigma;
            ((t - mu) * (standard_normal_cdf(z) - trunc.cdf_at_bound)
                + sigma * (standard_normal_pdf(z) - standard_normal_pdf(alpha)))
                / trunc.kept_mass
        }
        (Side::Above, Some(trunc)) => {
            let zm = (t.max(trunc.bound) - mu) / sigma;
            ((mu - t) * standard_normal_cdf(-zm) + sigma * standard_normal_pdf(zm)) / trunc.kept_mass
        }
    }
}

fn student_t_partial(
    mu: f64,
    sigma: f64,
    df: f64,
    lower: Option<LowerTruncation>,
    t: f64,
    side: Side,
) -> f64 {
    let x = (t - mu) / sigma;
    let (alpha, kept) = match lower {
        Some(trunc) => ((trunc.bound - mu) / sigma, trunc.kept_mass),
        None => (f64::NEG_INFINITY, 1.0),
    };
    match side {
        Side::Below => {
            if x <= alpha {
                return 0.0;
            }
            let g_alpha = if alpha.is_finite() { student_t_cdf(alpha, df) } else { 0.0 };
            let m_alpha = student_t_upper_partial_moment(alpha, df);
            sigma * (x * (student_t_cdf(x, df) - g_alpha) - (m_alpha - student_t_upper_partial_moment(x, df)))
                / kept
        }
        Side::Above => {
            let xm = x.max(alpha);
            sigma * (student_t_upper_partial_moment(xm, df) - x * student_t_cdf(-xm, df)) / kept
        }
    }
}
