//! Experiment value-of-information engine.
//!
//! - [`distribution`]: prior shapes and the truncated effective prior
//! - [`decision`]: EVPI, pre-posterior EVSI, Cost of Delay, Net Value
//! - [`dispatch`]: latest-wins, cancellable background execution
//! - [`inputs`]: business-facing inputs and the full analysis run
//! - [`logging`], [`exit_codes`]: ambient CLI support
//!
//! The binary entry point is in `main.rs`.

pub mod decision;
pub mod dispatch;
pub mod distribution;
pub mod exit_codes;
pub mod inputs;
pub mod logging;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use decision::{Decision, DecisionError};
pub use dispatch::{CancelToken, ComputeDispatcher, ComputeOutcome, ComputeRequest, Dispatch, DispatchError};
pub use distribution::{EffectivePrior, IntervalShape, PriorDistribution, PriorError, PriorWarning};
pub use inputs::{analyze, AnalysisError, AnalysisInputs, AnalysisReport, InputError};
