//! Cancellable optimizer task.
//!
//! Runs [`MemeticRunner`] on a dedicated worker thread so the caller is
//! never blocked. The caller registers callbacks before `start()`, keeps
//! a [`TaskHandle`] to cancel or join, and can clone the
//! [`CancelToken`] to cancel from elsewhere.
//!
//! Callbacks run on the worker thread. `on_complete` fires only when the
//! full generation budget was executed.
//!
//! ```
//! use line_sequencer::ga::{CostWeights, GaConfig, LotDemand, OptimizerTask, SequencingProblem};
//! use line_sequencer::models::ChangeoverMatrix;
//!
//! let lots = vec![LotDemand::new("L1", "A").with_size(10.0), LotDemand::new("L2", "B").with_size(5.0)];
//! let problem = SequencingProblem::new(lots, ChangeoverMatrix::default(), CostWeights::default());
//! let config = GaConfig::default().with_population_size(8).with_generations(3).with_seed(1);
//!
//! let handle = OptimizerTask::new(problem, config)
//!     .on_progress(|p| println!("{}%", p.percent))
//!     .start()
//!     .unwrap();
//! let result = handle.join().unwrap();
//! assert_eq!(result.order.len(), 2);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use rand::rngs::SmallRng;
use tracing::{debug, info};

use super::config::GaConfig;
use super::problem::SequencingProblem;
use super::runner::{MemeticRunner, Progress, SequencingResult};
use crate::error::{Result, SequencerError};

type ProgressFn = Box<dyn FnMut(&Progress) + Send>;
type CompleteFn = Box<dyn FnOnce(&SequencingResult) + Send>;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// An optimizer run waiting to be started.
pub struct OptimizerTask {
    problem: SequencingProblem,
    config: GaConfig,
    name: String,
    cancel: CancelToken,
    rng: Option<SmallRng>,
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn>,
}

impl fmt::Debug for OptimizerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizerTask")
            .field("name", &self.name)
            .field("assignments", &self.problem.len())
            .field("config", &self.config)
            .field("injected_rng", &self.rng.is_some())
            .finish_non_exhaustive()
    }
}

impl OptimizerTask {
    /// Creates a task.
    pub fn new(problem: SequencingProblem, config: GaConfig) -> Self {
        Self {
            problem,
            config,
            name: "sequencer".into(),
            cancel: CancelToken::new(),
            rng: None,
            on_progress: None,
            on_complete: None,
        }
    }

    /// Names the worker thread.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Uses `rng` instead of one derived from `config.seed`.
    pub fn with_rng(mut self, rng: SmallRng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Registers a progress callback.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Registers a completion callback.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&SequencingResult) + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Token that cancels this task.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Spawns the worker thread.
    ///
    /// # Errors
    /// [`SequencerError::WorkerSpawn`] if the thread cannot be created.
    pub fn start(self) -> Result<TaskHandle> {
        let Self {
            problem,
            config,
            name,
            cancel,
            rng,
            mut on_progress,
            on_complete,
        } = self;

        let token = cancel.clone();
        debug!(task = %name, assignments = problem.len(), "starting optimizer task");

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let runner = MemeticRunner::new(config);
                let mut rng = rng.unwrap_or_else(|| runner.make_rng());
                let result = runner.run_cancellable(&problem, &mut rng, &token, |p| {
                    if let Some(f) = on_progress.as_mut() {
                        f(p);
                    }
                })?;
                if token.is_cancelled() {
                    return Err(SequencerError::Cancelled);
                }
                if let Some(f) = on_complete {
                    f(&result);
                }
                info!(task = %name, "optimizer task finished");
                Ok(result)
            })
            .map_err(|e| SequencerError::WorkerSpawn(e.to_string()))?;

        Ok(TaskHandle { cancel, handle })
    }
}

/// Handle to a running optimizer task.
#[derive(Debug)]
pub struct TaskHandle {
    cancel: CancelToken,
    handle: JoinHandle<Result<SequencingResult>>,
}

impl TaskHandle {
    /// Requests cancellation; the worker stops before its next generation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancellation token of this task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker.
    ///
    /// # Errors
    /// [`SequencerError::Cancelled`] if the run was cancelled,
    /// [`SequencerError::WorkerPanicked`] if a callback panicked.
    pub fn join(self) -> Result<SequencingResult> {
        self.handle
            .join()
            .map_err(|_| SequencerError::WorkerPanicked)?
    }
}
