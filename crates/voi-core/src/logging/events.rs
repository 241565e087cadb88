//! Stable event names and stages for structured logs.
//!
//! Every engine event carries an `event` field from [`event_names`] so JSONL
//! consumers can filter without parsing messages.

use serde::{Deserialize, Serialize};

/// Engine stages, attached to run-level spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Prior validation and truncation.
    Prior,
    Evpi,
    Evsi,
    CostOfDelay,
    NetValue,
    /// Background task scheduling.
    Dispatch,
    /// Output emission.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Prior => "prior",
            Stage::Evpi => "evpi",
            Stage::Evsi => "evsi",
            Stage::CostOfDelay => "cost_of_delay",
            Stage::NetValue => "net_value",
            Stage::Dispatch => "dispatch",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Prior
    pub const PRIOR_TRUNCATED: &str = "prior.truncated";
    pub const PRIOR_WARNING: &str = "prior.warning";

    // Engines
    pub const EVPI_COMPUTED: &str = "evpi.computed";
    pub const EVSI_FINISHED: &str = "evsi.finished";
    pub const NET_VALUE_FINISHED: &str = "net_value.finished";
    pub const ANALYSIS_FINISHED: &str = "analysis.finished";
    pub const SIMULATION_CANCELLED: &str = "simulation.cancelled";
    pub const HIGH_REJECTION: &str = "simulation.high_rejection";

    // Dispatch
    pub const DISPATCH_SUBMITTED: &str = "dispatch.submitted";
    pub const DISPATCH_READY: &str = "dispatch.ready";
    pub const DISPATCH_STALE_DROPPED: &str = "dispatch.stale_dropped";
    pub const DISPATCH_CANCELLED: &str = "dispatch.cancelled";
    pub const DISPATCH_TIMEOUT: &str = "dispatch.timeout";
    pub const DISPATCH_WORKER_PANICKED: &str = "dispatch.worker_panicked";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Correlation context for one CLI invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }

    /// Span tagging every event inside it with the run id and stage.
    pub fn span(&self, stage: Stage) -> tracing::Span {
        tracing::info_span!("voi", run_id = %self.run_id, stage = %stage)
    }
}
