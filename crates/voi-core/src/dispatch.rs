//! Latest-wins background dispatch for CPU-bound computations.
//!
//! Closed-form requests (EVPI, EVSI on an untruncated Normal prior) run on the
//! caller's thread. Everything else runs on a named worker thread tagged with
//! a monotonically increasing sequence number. Submitting a new request
//! cancels the previous worker through its [`CancelToken`]; the Monte Carlo
//! loop polls the token and stops, and any completion that still arrives with
//! an older sequence number is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};
use voi_config::EngineConfig;

use crate::decision::{
    compute_evpi, compute_evsi_cancellable, compute_net_value_cancellable, DecisionError,
    EvpiInputs, EvpiResult, EvsiInputs, EvsiResult, NetValueInputs, NetValueResult,
};
use crate::distribution::EffectivePrior;
use crate::inputs::{analyze_cancellable, AnalysisError, AnalysisInputs, AnalysisReport};
use crate::logging::event_names;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One unit of work with its own input snapshot.
#[derive(Debug, Clone)]
pub enum ComputeRequest {
    Evpi(EvpiInputs),
    Evsi(EvsiInputs),
    NetValue(NetValueInputs),
    Analysis(Box<AnalysisInputs>),
}

impl ComputeRequest {
    fn kind(&self) -> &'static str {
        match self {
            ComputeRequest::Evpi(_) => "evpi",
            ComputeRequest::Evsi(_) => "evsi",
            ComputeRequest::NetValue(_) => "net_value",
            ComputeRequest::Analysis(_) => "analysis",
        }
    }

    /// Whether the request has a synchronous closed form.
    fn is_fast_path(&self, config: &EngineConfig) -> bool {
        match self {
            ComputeRequest::Evpi(_) => true,
            ComputeRequest::Evsi(inputs) => EffectivePrior::new(inputs.prior, &config.truncation)
                .map(|prior| prior.is_plain_normal())
                .unwrap_or(true),
            ComputeRequest::NetValue(_) | ComputeRequest::Analysis(_) => false,
        }
    }

    fn run(&self, config: &EngineConfig, cancel: &CancelToken) -> Result<ComputeOutcome, DispatchError> {
        Ok(match self {
            ComputeRequest::Evpi(inputs) => ComputeOutcome::Evpi(compute_evpi(inputs, config)?),
            ComputeRequest::Evsi(inputs) => {
                ComputeOutcome::Evsi(compute_evsi_cancellable(inputs, config, cancel)?)
            }
            ComputeRequest::NetValue(inputs) => {
                ComputeOutcome::NetValue(compute_net_value_cancellable(inputs, config, cancel)?)
            }
            ComputeRequest::Analysis(inputs) => {
                ComputeOutcome::Analysis(Box::new(analyze_cancellable(inputs, config, cancel)?))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComputeOutcome {
    Evpi(EvpiResult),
    Evsi(EvsiResult),
    NetValue(NetValueResult),
    Analysis(Box<AnalysisReport>),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn compute worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("computation did not finish within {0:?}")]
    Timeout(Duration),
    #[error("compute worker exited without reporting")]
    Disconnected,
    #[error("compute worker panicked")]
    WorkerPanicked,
    #[error("no computation is pending")]
    NothingPending,
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Immediate result or a handle to wait on.
#[derive(Debug)]
pub enum Dispatch {
    Ready(Result<ComputeOutcome, DispatchError>),
    Pending(u64),
}

struct Completion {
    seq: u64,
    result: Result<ComputeOutcome, DispatchError>,
}

/// Sends the worker's completion on drop, so a panicking computation still
/// wakes the waiter.
struct CompletionGuard {
    seq: u64,
    tx: Sender<Completion>,
    result: Option<Result<ComputeOutcome, DispatchError>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or(Err(DispatchError::WorkerPanicked));
        // The dispatcher may already be gone.
        let _ = self.tx.send(Completion { seq: self.seq, result });
    }
}

struct TaskHandle {
    seq: u64,
    cancel: CancelToken,
    thread: Option<thread::JoinHandle<()>>,
}

impl TaskHandle {
    fn cancel_and_join(mut self) {
        self.cancel.cancel();
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(
                    event = event_names::DISPATCH_WORKER_PANICKED,
                    seq = self.seq,
                    "compute worker panicked"
                );
            }
        }
    }
}

/// Owns at most one live background task; only the newest result is observable.
pub struct ComputeDispatcher {
    config: EngineConfig,
    next_seq: u64,
    /// Sequence number whose completion is awaited.
    pending: Option<u64>,
    current: Option<TaskHandle>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl ComputeDispatcher {
    pub fn new(config: EngineConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        ComputeDispatcher {
            config,
            next_seq: 1,
            pending: None,
            current: None,
            tx,
            rx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sequence number of the most recently submitted request.
    pub fn latest_seq(&self) -> Option<u64> {
        self.next_seq.checked_sub(1).filter(|seq| *seq > 0)
    }

    /// Start `request`, superseding anything in flight.
    pub fn submit(&mut self, request: ComputeRequest) -> Result<Dispatch, DispatchError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending = None;
        self.cancel_current();

        if request.is_fast_path(&self.config) {
            debug!(event = event_names::DISPATCH_READY, seq, kind = request.kind(), "computed inline");
            return Ok(Dispatch::Ready(request.run(&self.config, &CancelToken::new())));
        }

        let config = self.config.clone();
        let kind = request.kind();
        self.spawn_worker(seq, move |cancel| request.run(&config, cancel))?;
        debug!(event = event_names::DISPATCH_SUBMITTED, seq, kind, "offloaded to worker");
        Ok(Dispatch::Pending(seq))
    }

    fn spawn_worker<F>(&mut self, seq: u64, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&CancelToken) -> Result<ComputeOutcome, DispatchError> + Send + 'static,
    {
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let tx = self.tx.clone();
        let thread = thread::Builder::new()
            .name(format!("voi-compute-{}", seq))
            .spawn(move || {
                let mut guard = CompletionGuard { seq, tx, result: None };
                guard.result = Some(job(&worker_cancel));
            })
            .map_err(DispatchError::Spawn)?;

        self.pending = Some(seq);
        self.current = Some(TaskHandle {
            seq,
            cancel,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Latest completion if it has arrived; stale completions are discarded.
    pub fn try_latest(&mut self) -> Option<Result<ComputeOutcome, DispatchError>> {
        let pending = self.pending?;
        loop {
            match self.rx.try_recv() {
                Ok(done) if done.seq == pending => return Some(self.finish(done)),
                Ok(stale) => log_stale(stale.seq, pending),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(Err(DispatchError::Disconnected)),
            }
        }
    }

    /// Block until the latest request completes. On timeout the task is
    /// cancelled.
    pub fn wait_latest(&mut self, timeout: Duration) -> Result<ComputeOutcome, DispatchError> {
        let pending = self.pending.ok_or(DispatchError::NothingPending)?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(done) if done.seq == pending => return self.finish(done),
                Ok(stale) => log_stale(stale.seq, pending),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        event = event_names::DISPATCH_TIMEOUT,
                        seq = pending,
                        timeout_ms = timeout.as_millis() as u64,
                        "computation timed out; cancelling"
                    );
                    self.cancel();
                    return Err(DispatchError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(DispatchError::Disconnected),
            }
        }
    }

    /// Stop the in-flight task, if any. Its result will never be observed.
    pub fn cancel(&mut self) {
        if let Some(seq) = self.pending.take() {
            debug!(event = event_names::DISPATCH_CANCELLED, seq, "cancelled");
        }
        self.cancel_current();
    }

    /// A worker is still running.
    pub fn is_busy(&self) -> bool {
        self.current
            .as_ref()
            .and_then(|task| task.thread.as_ref())
            .is_some_and(|thread| !thread.is_finished())
    }

    fn cancel_current(&mut self) {
        if let Some(task) = self.current.take() {
            task.cancel_and_join();
        }
    }

    fn finish(&mut self, done: Completion) -> Result<ComputeOutcome, DispatchError> {
        self.pending = None;
        if let Some(mut task) = self.current.take() {
            task.join();
        }
        done.result
    }
}

impl Drop for ComputeDispatcher {
    fn drop(&mut self) {
        self.cancel_current();
    }
}

fn log_stale(seq: u64, latest: u64) {
    debug!(
        event = event_names::DISPATCH_STALE_DROPPED,
        seq,
        latest,
        "dropping superseded completion"
    );
}
