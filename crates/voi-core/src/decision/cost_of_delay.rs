//! Cost of delaying a Ship default while the experiment runs.
//!
//! Only the variant arm sees the lift during the test, so each day of test
//! plus decision latency forgoes `K * |mu| * variant_fraction / 365`.

use serde::{Deserialize, Serialize};

use super::{require_finite, require_non_negative, require_unit_interval, Decision, DecisionError};

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodInputs {
    pub k: f64,
    /// Post-truncation prior mean lift.
    pub mu: f64,
    pub threshold: f64,
    pub test_duration_days: f64,
    pub variant_fraction: f64,
    pub decision_latency_days: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodResult {
    pub cod_dollars: f64,
    pub daily_opportunity_cost: f64,
    pub cod_applies: bool,
}

pub fn compute_cost_of_delay(inputs: &CodInputs) -> Result<CodResult, DecisionError> {
    require_non_negative("k", inputs.k)?;
    require_finite("mu", inputs.mu)?;
    require_finite("threshold", inputs.threshold)?;
    require_non_negative("test_duration_days", inputs.test_duration_days)?;
    require_non_negative("decision_latency_days", inputs.decision_latency_days)?;
    require_unit_interval("variant_fraction", inputs.variant_fraction)?;

    let default = Decision::from_estimate(inputs.mu, inputs.threshold);
    if !default.is_ship() || inputs.mu == 0.0 || inputs.k == 0.0 {
        return Ok(CodResult {
            cod_dollars: 0.0,
            daily_opportunity_cost: 0.0,
            cod_applies: false,
        });
    }

    let daily = inputs.k * inputs.mu.abs() * inputs.variant_fraction / DAYS_PER_YEAR;
    Ok(CodResult {
        cod_dollars: daily * (inputs.test_duration_days + inputs.decision_latency_days),
        daily_opportunity_cost: daily,
        cod_applies: true,
    })
}
