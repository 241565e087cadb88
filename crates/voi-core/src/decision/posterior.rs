//! Posterior mean of the lift after observing `L_hat ~ Normal(L, SE)`.
//!
//! - Untruncated Normal prior: conjugate shrinkage
//!   `w L_hat + (1 - w) mu`, `w = sigma^2 / (sigma^2 + SE^2)`.
//! - Anything else: numerical posterior on a grid. The grid spans the
//!   likelihood window `L_hat ± window_se * SE` clipped to the prior's
//!   support, weights are accumulated in log space and normalized with
//!   log-sum-exp, and endpoints carry trapezoid half-weights.
//! - `SE == 0`: the observation is the true lift.

use voi_config::GridConfig;
use voi_math::log_sum_exp;

use crate::distribution::{EffectivePrior, PriorDistribution};

const LN_HALF: f64 = -std::f64::consts::LN_2;

/// How a noisy observation is turned into a posterior-mean estimate.
#[derive(Debug, Clone)]
pub enum PosteriorRule<'a> {
    Exact,
    Shrinkage { weight: f64, prior_mean: f64 },
    Grid(GridPosterior<'a>),
}

impl<'a> PosteriorRule<'a> {
    pub fn for_experiment(prior: &'a EffectivePrior, standard_error: f64, grid: &GridConfig) -> Self {
        if standard_error == 0.0 {
            return PosteriorRule::Exact;
        }
        match *prior.shape() {
            PriorDistribution::Normal { mu, sigma } if prior.is_plain_normal() => {
                let var = sigma * sigma;
                PosteriorRule::Shrinkage {
                    weight: var / (var + standard_error * standard_error),
                    prior_mean: mu,
                }
            }
            _ => PosteriorRule::Grid(GridPosterior::new(prior, standard_error, grid)),
        }
    }

    /// Posterior mean given `observed`; `None` when the posterior cannot be
    /// normalized.
    pub fn posterior_mean(&mut self, observed: f64) -> Option<f64> {
        if !observed.is_finite() {
            return None;
        }
        match self {
            PosteriorRule::Exact => Some(observed),
            PosteriorRule::Shrinkage { weight, prior_mean } => {
                Some(*weight * observed + (1.0 - *weight) * *prior_mean)
            }
            PosteriorRule::Grid(grid) => grid.posterior_mean(observed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GridPosterior<'a> {
    prior: &'a EffectivePrior,
    standard_error: f64,
    support: (f64, f64),
    points: usize,
    window_se: f64,
    log_weights: Vec<f64>,
}

impl<'a> GridPosterior<'a> {
    pub fn new(prior: &'a EffectivePrior, standard_error: f64, grid: &GridConfig) -> Self {
        let points = grid.points.max(3);
        GridPosterior {
            prior,
            standard_error,
            support: prior.support(grid.tail_mass),
            points,
            window_se: grid.window_se,
            log_weights: Vec::with_capacity(points),
        }
    }

    pub fn posterior_mean(&mut self, observed: f64) -> Option<f64> {
        let (support_lo, support_hi) = self.support;
        let half_window = self.window_se * self.standard_error;
        let lo = (observed - half_window).max(support_lo);
        let hi = (observed + half_window).min(support_hi);
        if !(lo < hi) {
            // Window misses the support (or the support is a point): the
            // posterior piles up on the nearest edge.
            return Some(observed.clamp(support_lo, support_hi));
        }

        let n = self.points;
        let step = (hi - lo) / (n - 1) as f64;
        let inv_se = 1.0 / self.standard_error;
        self.log_weights.clear();
        for j in 0..n {
            let x = lo + j as f64 * step;
            let r = (observed - x) * inv_se;
            let mut lw = self.prior.log_pdf(x) - 0.5 * r * r;
            if j == 0 || j == n - 1 {
                lw += LN_HALF;
            }
            self.log_weights.push(lw);
        }

        let norm = log_sum_exp(&self.log_weights);
        if !norm.is_finite() {
            return None;
        }
        let mut mean = 0.0;
        for (j, lw) in self.log_weights.iter().enumerate() {
            mean += (lw - norm).exp() * (lo + j as f64 * step);
        }
        mean.is_finite().then_some(mean)
    }
}
