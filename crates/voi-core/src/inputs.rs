//! Business-facing inputs and the full analysis run.
//!
//! Converts what a decision-maker knows (traffic, conversion value, a 90%
//! interval, a threshold in dollars or percent, a test plan) into the engine's
//! inputs and runs EVPI, EVSI, Cost of Delay and Net Value against one
//! effective prior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use voi_config::EngineConfig;

use crate::decision::{
    compute_cost_of_delay, compute_evpi, compute_evsi_cancellable, compute_net_value_cancellable,
    CodInputs, CodResult, DecisionError, EvpiInputs, EvpiResult, EvsiResult, NetValueInputs,
    NetValueResult,
};
use crate::dispatch::CancelToken;
use crate::distribution::{IntervalShape, PriorDistribution, PriorError};
use crate::logging::{event_names, generate_run_id};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("annual-dollar threshold needs a positive dollars-per-lift factor")]
    ZeroValueAtStake,
    #[error("invalid prior: {0}")]
    Prior(#[from] PriorError),
}

fn check(field: &'static str, value: f64, expected: &'static str, ok: bool) -> Result<f64, InputError> {
    if ok && value.is_finite() {
        Ok(value)
    } else {
        Err(InputError::OutOfRange {
            field,
            expected,
            value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessInputs {
    pub baseline_conversion_rate: f64,
    /// Visitors (or other units) per year.
    pub annual_traffic: f64,
    /// Dollars per conversion.
    pub value_per_conversion: f64,
    /// Display label for the traffic unit ("visitors", "sessions").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_label: Option<String>,
}

impl BusinessInputs {
    pub fn validate(&self) -> Result<(), InputError> {
        let p = self.baseline_conversion_rate;
        check("baseline_conversion_rate", p, "in [0, 1]", (0.0..=1.0).contains(&p))?;
        check("annual_traffic", self.annual_traffic, "non-negative", self.annual_traffic >= 0.0)?;
        check(
            "value_per_conversion",
            self.value_per_conversion,
            "non-negative",
            self.value_per_conversion >= 0.0,
        )?;
        Ok(())
    }

    /// Dollars per unit of lift per year.
    pub fn k(&self) -> f64 {
        self.annual_traffic * self.baseline_conversion_rate * self.value_per_conversion
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScenario {
    /// Ship on any positive expected lift; `value` is ignored.
    #[default]
    ShipIfPositive,
    /// Ship unless the expected loss exceeds `value`.
    AcceptableLoss,
    /// Ship only if the expected lift reaches `value`.
    MinimumLift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdUnit {
    /// Decimal lift (0.02 = 2%).
    #[default]
    Lift,
    Percent,
    /// Dollars per year; divided by K.
    AnnualDollars,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdSpec {
    pub scenario: ThresholdScenario,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub unit: ThresholdUnit,
}

impl ThresholdSpec {
    /// Threshold expressed as decimal lift. Loss magnitudes are taken as
    /// absolute values so `-2%` and `2%` mean the same tolerated loss.
    pub fn threshold_lift(&self, k: f64) -> Result<f64, InputError> {
        if self.scenario == ThresholdScenario::ShipIfPositive {
            return Ok(0.0);
        }
        let value = check("threshold.value", self.value, "finite", true)?;
        let lift = match self.unit {
            ThresholdUnit::Lift => value,
            ThresholdUnit::Percent => value / 100.0,
            ThresholdUnit::AnnualDollars => {
                if !(k > 0.0) {
                    return Err(InputError::ZeroValueAtStake);
                }
                value / k
            }
        };
        Ok(match self.scenario {
            ThresholdScenario::AcceptableLoss => -lift.abs(),
            _ => lift,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDesign {
    pub test_duration_days: f64,
    /// Units arriving per day.
    pub daily_traffic: f64,
    /// Share of eligible traffic assigned to the variant.
    pub variant_fraction: f64,
    /// Share of daily traffic that enters the test.
    #[serde(default = "default_eligibility")]
    pub eligibility_fraction: f64,
    /// Days between the end of the test and acting on it.
    #[serde(default)]
    pub decision_latency_days: f64,
}

fn default_eligibility() -> f64 {
    1.0
}

impl ExperimentDesign {
    pub fn validate(&self) -> Result<(), InputError> {
        let d = self;
        check("test_duration_days", d.test_duration_days, "non-negative", d.test_duration_days >= 0.0)?;
        check("daily_traffic", d.daily_traffic, "non-negative", d.daily_traffic >= 0.0)?;
        check("variant_fraction", d.variant_fraction, "in [0, 1]", (0.0..=1.0).contains(&d.variant_fraction))?;
        check(
            "eligibility_fraction",
            d.eligibility_fraction,
            "in [0, 1]",
            (0.0..=1.0).contains(&d.eligibility_fraction),
        )?;
        check(
            "decision_latency_days",
            d.decision_latency_days,
            "non-negative",
            d.decision_latency_days >= 0.0,
        )?;
        Ok(())
    }

    /// `(n_control, n_variant)` enrolled over the test.
    pub fn sample_sizes(&self) -> (u64, u64) {
        let total = (self.test_duration_days * self.daily_traffic * self.eligibility_fraction)
            .max(0.0)
            .floor();
        let variant = (total * self.variant_fraction).round();
        let total = total as u64;
        let variant = (variant as u64).min(total);
        (total - variant, variant)
    }
}

/// How the prior is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum PriorInput {
    Parameters { prior: PriorDistribution },
    #[serde(rename = "interval_90")]
    Interval90 {
        shape: IntervalShape,
        low: f64,
        high: f64,
    },
}

impl PriorInput {
    pub fn resolve(&self) -> Result<PriorDistribution, InputError> {
        match *self {
            PriorInput::Parameters { prior } => {
                prior.validate()?;
                Ok(prior)
            }
            PriorInput::Interval90 { shape, low, high } => {
                Ok(PriorDistribution::from_interval_90(shape, low, high)?)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInputs {
    pub business: BusinessInputs,
    pub prior: PriorInput,
    #[serde(default)]
    pub threshold: ThresholdSpec,
    pub design: ExperimentDesign,
}

/// Engine inputs derived from [`AnalysisInputs`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInputs {
    pub k: f64,
    pub threshold: f64,
    pub prior: PriorDistribution,
    pub n_control: u64,
    pub n_variant: u64,
}

impl AnalysisInputs {
    pub fn resolve(&self) -> Result<ResolvedInputs, InputError> {
        self.business.validate()?;
        self.design.validate()?;
        let k = self.business.k();
        let (n_control, n_variant) = self.design.sample_sizes();
        Ok(ResolvedInputs {
            k,
            threshold: self.threshold.threshold_lift(k)?,
            prior: self.prior.resolve()?,
            n_control,
            n_variant,
        })
    }

    pub fn net_value_inputs(&self, resolved: &ResolvedInputs) -> NetValueInputs {
        NetValueInputs {
            k: resolved.k,
            baseline_conversion_rate: self.business.baseline_conversion_rate,
            threshold: resolved.threshold,
            prior: resolved.prior,
            n_control: resolved.n_control,
            n_variant: resolved.n_variant,
            test_duration_days: self.design.test_duration_days,
            variant_fraction: self.design.variant_fraction,
            decision_latency_days: self.design.decision_latency_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub inputs: ResolvedInputs,
    pub evpi: EvpiResult,
    pub evsi: EvsiResult,
    pub cost_of_delay: CodResult,
    pub net_value: NetValueResult,
    /// The integrated net value is positive.
    pub worth_testing: bool,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
}

pub fn analyze(inputs: &AnalysisInputs, config: &EngineConfig) -> Result<AnalysisReport, AnalysisError> {
    analyze_cancellable(inputs, config, &CancelToken::new())
}

pub fn analyze_cancellable(
    inputs: &AnalysisInputs,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<AnalysisReport, AnalysisError> {
    let resolved = inputs.resolve()?;
    let net_inputs = inputs.net_value_inputs(&resolved);

    let evpi = compute_evpi(
        &EvpiInputs {
            k: resolved.k,
            prior: resolved.prior,
            threshold: resolved.threshold,
        },
        config,
    )?;
    let evsi = compute_evsi_cancellable(&net_inputs.evsi_inputs(), config, cancel)?;
    let cost_of_delay = compute_cost_of_delay(&CodInputs {
        k: resolved.k,
        mu: evpi.prior_mean,
        threshold: resolved.threshold,
        test_duration_days: inputs.design.test_duration_days,
        variant_fraction: inputs.design.variant_fraction,
        decision_latency_days: inputs.design.decision_latency_days,
    })?;
    let net_value = compute_net_value_cancellable(&net_inputs, config, cancel)?;

    let report = AnalysisReport {
        run_id: generate_run_id(),
        generated_at: Utc::now(),
        inputs: resolved,
        worth_testing: net_value.net_value_dollars > 0.0,
        evpi,
        evsi,
        cost_of_delay,
        net_value,
    };
    info!(
        event = event_names::ANALYSIS_FINISHED,
        run_id = %report.run_id,
        evpi = report.evpi.evpi_dollars,
        evsi = report.evsi.evsi_dollars,
        net_value = report.net_value.net_value_dollars,
        worth_testing = report.worth_testing,
        "analysis finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn business() -> BusinessInputs {
        BusinessInputs {
            baseline_conversion_rate: 0.05,
            annual_traffic: 1_000_000.0,
            value_per_conversion: 100.0,
            unit_label: Some("visitors".to_string()),
        }
    }

    #[test]
    fn k_is_traffic_times_rate_times_value() {
        crate::assert_approx_eq!(business().k(), 5_000_000.0);
    }

    #[test]
    fn threshold_units() {
        let k = 5_000_000.0;
        let spec = |scenario, value, unit| ThresholdSpec { scenario, value, unit };
        assert_eq!(
            spec(ThresholdScenario::ShipIfPositive, 3.0, ThresholdUnit::Percent)
                .threshold_lift(k)
                .unwrap(),
            0.0
        );
        assert!(
            (spec(ThresholdScenario::MinimumLift, 2.0, ThresholdUnit::Percent).threshold_lift(k).unwrap()
                - 0.02)
                .abs()
                < 1e-15
        );
        assert!(
            (spec(ThresholdScenario::AcceptableLoss, 50_000.0, ThresholdUnit::AnnualDollars)
                .threshold_lift(k)
                .unwrap()
                + 0.01)
                .abs()
                < 1e-15
        );
        assert!(matches!(
            spec(ThresholdScenario::MinimumLift, 1.0, ThresholdUnit::AnnualDollars).threshold_lift(0.0),
            Err(InputError::ZeroValueAtStake)
        ));
    }

    #[test]
    fn sample_sizes_split_by_variant_fraction() {
        let design = ExperimentDesign {
            test_duration_days: 14.0,
            daily_traffic: 1_000.0,
            variant_fraction: 0.5,
            eligibility_fraction: 0.5,
            decision_latency_days: 0.0,
        };
        assert_eq!(design.sample_sizes(), (3_500, 3_500));
        let skewed = ExperimentDesign {
            variant_fraction: 0.2,
            ..design
        };
        assert_eq!(skewed.sample_sizes(), (5_600, 1_400));
    }

    #[test]
    fn prior_input_forms() {
        let json = r#"{"form":"interval_90","shape":{"shape":"normal"},"low":-0.05,"high":0.05}"#;
        let input: PriorInput = serde_json::from_str(json).unwrap();
        match input.resolve().unwrap() {
            PriorDistribution::Normal { mu, .. } => assert!(mu.abs() < 1e-15),
            other => panic!("unexpected {:?}", other),
        }
        let json = r#"{"form":"parameters","prior":{"shape":"uniform","low":0.1,"high":0.0}}"#;
        let input: PriorInput = serde_json::from_str(json).unwrap();
        assert!(matches!(input.resolve(), Err(InputError::Prior(_))));
    }

    #[test]
    fn rejects_invalid_business_inputs() {
        let mut b = business();
        b.baseline_conversion_rate = 1.5;
        assert!(matches!(b.validate(), Err(InputError::OutOfRange { field: "baseline_conversion_rate", .. })));
    }

    #[test]
    fn full_analysis_runs() {
        let inputs = AnalysisInputs {
            business: business(),
            prior: PriorInput::Parameters {
                prior: PriorDistribution::Normal { mu: 0.01, sigma: 0.03 },
            },
            threshold: ThresholdSpec::default(),
            design: ExperimentDesign {
                test_duration_days: 14.0,
                daily_traffic: 3_000.0,
                variant_fraction: 0.5,
                eligibility_fraction: 1.0,
                decision_latency_days: 3.0,
            },
        };
        let mut config = EngineConfig::default();
        config.monte_carlo.num_samples = 2_000;
        config.monte_carlo.seed = Some(5);
        let report = analyze(&inputs, &config).unwrap();
        assert!(report.run_id.starts_with("run-"));
        assert!(report.evsi.evsi_dollars <= report.evpi.evpi_dollars);
        assert!(report.cost_of_delay.cod_applies);
        assert_eq!(report.worth_testing, report.net_value.net_value_dollars > 0.0);
        assert_eq!(report.inputs.n_control + report.inputs.n_variant, 42_000);
    }
}
