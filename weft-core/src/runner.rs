//! Execution engine: runs one command across many packages.
//!
//! Invocations are tokio tasks gated by a semaphore sized to the configured
//! concurrency. Packages are dispatched in submission order; results flow
//! back over a channel and are recorded by the engine loop alone, in
//! completion order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command_validator::CommandValidator;
use crate::error::{Error, Result};
use crate::executor::{run_in_package, CommandSpec};
use crate::graph::DependencyGraph;
use crate::package::Package;
use crate::result::{BatchResult, ExecutionResult, ExecutionStatus};

pub const DEFAULT_CONCURRENCY: usize = 4;

const FAIL_FAST_REASON: &str = "skipped: an earlier package failed and fail-fast is enabled";
const CANCEL_REASON: &str = "cancelled before start";

/// A worker's pool slot.
///
/// Dropping a slot that was never finished means the task panicked or was
/// aborted; under fail-fast that trips `stop` before the permit goes back
/// to the pool, so the dispatcher can never reuse it unaware.
struct WorkerSlot {
    stop: Option<Arc<AtomicBool>>,
    finished: bool,
    _permit: OwnedSemaphorePermit,
}

impl WorkerSlot {
    fn new(permit: OwnedSemaphorePermit, stop: Option<Arc<AtomicBool>>) -> Self {
        Self {
            stop,
            finished: false,
            _permit: permit,
        }
    }

    fn finish(mut self, failed: bool) {
        if failed {
            self.trip();
        }
        self.finished = true;
    }

    fn trip(&self) {
        if let Some(stop) = &self.stop {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        if !self.finished {
            self.trip();
        }
    }
}

/// Cloneable switch that stops an engine run from outside.
///
/// Packages not yet started when the handle fires are recorded as
/// cancelled. Invocations already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type ResultCallback = Arc<dyn Fn(&ExecutionResult) + Send + Sync>;

/// Runs a command once per package under a concurrency cap.
pub struct ExecutionEngine {
    concurrency: usize,
    fail_fast: bool,
    validator: CommandValidator,
    cancel: CancelHandle,
    on_result: Option<ResultCallback>,
}

impl ExecutionEngine {
    /// Creates an engine running at most `concurrency` commands at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConcurrency`] if `concurrency` is zero.
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::InvalidConcurrency(concurrency));
        }
        Ok(Self {
            concurrency,
            fail_fast: false,
            validator: CommandValidator::new(),
            cancel: CancelHandle::new(),
            on_result: None,
        })
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_command_validator(mut self, validator: CommandValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Registers a callback invoked as each result is recorded.
    pub fn on_result<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ExecutionResult) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(callback));
        self
    }

    #[inline]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[inline]
    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs in dependency order when `topological` is set, otherwise with
    /// every package eligible at once.
    ///
    /// The ordering is computed over `packages` alone; dependencies outside
    /// the set do not constrain it.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid command or a dependency cycle. Failing
    /// packages are reported in the batch, never as an error.
    pub async fn run(
        &self,
        packages: &[Arc<Package>],
        spec: &CommandSpec,
        topological: bool,
    ) -> Result<BatchResult> {
        if topological {
            let graph = DependencyGraph::from_shared(packages.iter().cloned());
            let batches = graph.parallel_batches()?;
            self.run_topological(&batches, spec).await
        } else {
            self.run_parallel(packages, spec).await
        }
    }

    /// Runs every package as soon as a slot is free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] if the validator rejects the command.
    pub async fn run_parallel(&self, packages: &[Arc<Package>], spec: &CommandSpec) -> Result<BatchResult> {
        self.validator.validate(&spec.command)?;
        info!(command = %spec.command, packages = packages.len(), concurrency = self.concurrency, "running");

        let start = Instant::now();
        let spec = Arc::new(spec.clone());
        let stop = Arc::new(AtomicBool::new(false));
        let mut batch = BatchResult::new();

        let items: Vec<(usize, Arc<Package>)> = packages.iter().cloned().enumerate().collect();
        self.dispatch(items, &spec, &stop, &mut batch).await?;

        batch.duration = start.elapsed();
        Ok(batch)
    }

    /// Runs batch by batch. A batch starts only after every package of the
    /// previous batch has finished, whether it succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] if the validator rejects the command.
    pub async fn run_topological(&self, batches: &[Vec<Arc<Package>>], spec: &CommandSpec) -> Result<BatchResult> {
        self.validator.validate(&spec.command)?;
        info!(
            command = %spec.command,
            batches = batches.len(),
            concurrency = self.concurrency,
            "running in dependency order"
        );

        let start = Instant::now();
        let spec = Arc::new(spec.clone());
        let stop = Arc::new(AtomicBool::new(false));
        let mut batch = BatchResult::new();

        let mut offset = 0;
        for (level, packages) in batches.iter().enumerate() {
            debug!(level, size = packages.len(), "starting batch");
            let items: Vec<(usize, Arc<Package>)> = packages
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, p)| (offset + i, p))
                .collect();
            offset += packages.len();
            self.dispatch(items, &spec, &stop, &mut batch).await?;
        }

        batch.duration = start.elapsed();
        Ok(batch)
    }

    fn record(&self, batch: &mut BatchResult, result: ExecutionResult) {
        if let Some(callback) = &self.on_result {
            callback(&result);
        }
        batch.push(result);
    }

    fn halt_reason(&self, stop: &AtomicBool) -> Option<(ExecutionStatus, &'static str)> {
        if self.cancel.is_cancelled() {
            Some((ExecutionStatus::Cancelled, CANCEL_REASON))
        } else if stop.load(Ordering::SeqCst) {
            Some((ExecutionStatus::Skipped, FAIL_FAST_REASON))
        } else {
            None
        }
    }

    /// Dispatches `items` in order and waits until all of them are recorded.
    async fn dispatch(
        &self,
        items: Vec<(usize, Arc<Package>)>,
        spec: &Arc<CommandSpec>,
        stop: &Arc<AtomicBool>,
        batch: &mut BatchResult,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<ExecutionResult>();
        let mut handles: Vec<(usize, String, JoinHandle<()>)> = Vec::with_capacity(items.len());
        let mut items = items.into_iter();

        while let Some((index, package)) = items.next() {
            let permit = loop {
                // Finished results are recorded before a freed slot is reused.
                tokio::select! {
                    biased;
                    Some(result) = rx.recv() => self.record(batch, result),
                    permit = Arc::clone(&semaphore).acquire_owned() => break permit,
                }
            };
            let permit = permit.map_err(|e| Error::Runtime(format!("worker pool closed: {}", e)))?;

            // The flag is set before a failing or panicking task releases
            // its permit, so a failure is always visible here.
            if let Some((status, reason)) = self.halt_reason(stop) {
                drop(permit);
                debug!(status = %status, remaining = items.len() + 1, "no longer scheduling");
                for (index, package) in std::iter::once((index, package)).chain(items.by_ref()) {
                    let result = ExecutionResult::not_started(&package.name, index, &spec.command, status, reason);
                    self.record(batch, result);
                }
                break;
            }

            let tx = tx.clone();
            let spec = Arc::clone(spec);
            let slot = WorkerSlot::new(permit, self.fail_fast.then(|| Arc::clone(stop)));
            let name = package.name.clone();
            let handle = tokio::spawn(async move {
                let result = run_in_package(&package, index, &spec).await;
                let failed = result.is_failure();
                let _ = tx.send(result);
                slot.finish(failed);
            });
            handles.push((index, name, handle));
        }

        drop(tx);
        while let Some(result) = rx.recv().await {
            self.record(batch, result);
        }

        for (index, name, handle) in handles {
            if let Err(e) = handle.await {
                warn!(package = %name, error = %e, "worker task aborted");
                if self.fail_fast {
                    stop.store(true, Ordering::SeqCst);
                }
                let mut result =
                    ExecutionResult::not_started(&name, index, &spec.command, ExecutionStatus::Failure, "");
                result.error = Some(format!("worker task aborted: {}", e));
                self.record(batch, result);
            }
        }

        Ok(())
    }
}
