//! The shared executor: one worker, many dispatch loops.
//!
//! Every run gets its own dispatch loop. The loop asks its [`RunQueue`] for
//! the next ready task, marks it queued and sends it over a bounded channel
//! to the single worker. The worker executes tasks strictly one at a time,
//! records the outcome on the run's cloned graph and wakes the run's loop.

use super::{ExecutorConfig, NextTask, RunHandle, RunQueue, RunReport};
use crate::core::{Task, TaskId, TaskOutcome, TaskStatus};
use crate::errors::{FluxError, Result};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::utils::iso_timestamp;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// State of one run shared between its dispatch loop, the worker and the
/// caller's [`RunHandle`].
pub(crate) struct RunShared {
    pub(crate) queue: Mutex<RunQueue>,
    pub(crate) changed: Notify,
    pub(crate) started: Instant,
    /// Tasks sent to the worker whose events are not all emitted yet.
    outstanding: AtomicUsize,
    sink: Arc<dyn EventSink>,
}

impl RunShared {
    fn new(queue: RunQueue, sink: Arc<dyn EventSink>) -> Self {
        Self {
            queue: Mutex::new(queue),
            changed: Notify::new(),
            started: Instant::now(),
            outstanding: AtomicUsize::new(0),
            sink,
        }
    }

    /// Report over the current state of the run.
    pub(crate) fn report(&self) -> RunReport {
        let elapsed = self.started.elapsed().as_secs_f64() * 1000.0;
        RunReport::from_queue(&self.queue.lock(), elapsed)
    }

    /// Called by the worker once it is done with a delivered task.
    fn settle(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.changed.notify_one();
    }

    fn is_settled(&self) -> bool {
        self.outstanding.load(Ordering::Acquire) == 0
    }
}

/// A task travelling from a dispatch loop to the worker.
struct QueuedTask {
    run: Arc<RunShared>,
    task: TaskId,
}

/// Single-worker executor shared by every run.
///
/// The executor keeps a handle to the runtime it was started on, so runs
/// can be started from synchronous code as well. Dropping the executor
/// without [`shutdown`](Self::shutdown) detaches the worker; it stops once
/// every dispatch loop has finished.
pub struct Executor {
    runtime: Handle,
    tx: mpsc::Sender<QueuedTask>,
    config: ExecutorConfig,
    sink: Arc<dyn EventSink>,
    worker: JoinHandle<()>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Starts the worker on the current tokio runtime with a no-op sink.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid or no tokio runtime
    /// is running.
    pub fn start(config: ExecutorConfig) -> Result<Self> {
        Self::start_with_sink(config, Arc::new(NoOpEventSink))
    }

    /// Starts the worker, reporting run events to `sink`.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn start_with_sink(config: ExecutorConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            FluxError::Config(format!("the executor must be started inside a tokio runtime: {e}"))
        })?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let worker = runtime.spawn(worker_loop(rx, config.clone()));

        Ok(Self {
            runtime,
            tx,
            config,
            sink,
            worker,
        })
    }

    /// Returns the configuration the executor was started with.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Starts a dispatch loop for `queue` and returns its handle.
    ///
    /// The loop is spawned on the executor's runtime; the caller does not
    /// need to be inside it.
    pub fn run(&self, queue: RunQueue) -> RunHandle {
        let run_id = queue.run_id();
        let pipeline_name = queue.pipeline_name().to_string();
        let shared = Arc::new(RunShared::new(queue, Arc::clone(&self.sink)));
        let dispatch = self
            .runtime
            .spawn(dispatch_loop(Arc::clone(&shared), self.tx.clone()));
        RunHandle::new(shared, run_id, pipeline_name, dispatch)
    }

    /// Hands a single task to the worker.
    ///
    /// The task runs in a run of its own; its outcome is only visible
    /// through the returned handle.
    pub fn submit(&self, task: Task) -> RunHandle {
        self.run(RunQueue::single(task))
    }

    /// Runs every queue and waits for all of them.
    ///
    /// Reports come back in the order of `queues`.
    pub async fn run_all(&self, queues: Vec<RunQueue>) -> Vec<Result<RunReport>> {
        let handles: Vec<RunHandle> = queues.into_iter().map(|q| self.run(q)).collect();
        join_all(handles.into_iter().map(RunHandle::wait)).await
    }

    /// Stops accepting work and waits for the worker to drain.
    ///
    /// Dispatch loops that are still running keep the worker alive until
    /// they finish.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorClosed` if the worker task panicked or was aborted.
    pub async fn shutdown(self) -> Result<()> {
        let Self { tx, worker, config, .. } = self;
        drop(tx);
        worker.await.map_err(|e| {
            FluxError::ExecutorClosed(format!("worker '{}' ended abnormally: {e}", config.worker_name))
        })
    }
}

async fn worker_loop(mut rx: mpsc::Receiver<QueuedTask>, config: ExecutorConfig) {
    info!(worker = %config.worker_name, "executor worker started");
    let mut executed: u64 = 0;
    while let Some(job) = rx.recv().await {
        if execute(job, config.blocking_pool).await {
            executed += 1;
        }
    }
    info!(worker = %config.worker_name, executed, "executor worker stopped");
}

/// Executes one delivered task. Returns false if the task was skipped.
async fn execute(job: QueuedTask, blocking_pool: bool) -> bool {
    let QueuedTask { run, task } = job;

    let (func, name, base) = {
        let mut queue = run.queue.lock();
        let func = queue.begin(task);
        let name = queue.task(task).map(|t| t.name().to_string()).unwrap_or_default();
        (func, name, task_payload(&queue, task))
    };
    let Some(func) = func else {
        run.settle();
        return false;
    };
    run.sink.emit(events::TASK_STARTED, Some(base.clone())).await;

    let timer = SpanTimer::start(name);
    let outcome = if blocking_pool {
        let func = Arc::clone(&func);
        match tokio::task::spawn_blocking(move || TaskOutcome::capture(&func)).await {
            Ok(outcome) => outcome,
            Err(e) => TaskOutcome::Failed(format!("task execution was aborted: {e}")),
        }
    } else {
        TaskOutcome::capture(&func)
    };
    let name = timer.name().to_string();
    let duration_ms = timer.finish();

    let (event, message) = match &outcome {
        TaskOutcome::Success(info) => (events::TASK_SUCCEEDED, info.clone()),
        TaskOutcome::Failed(reason) => (events::TASK_FAILED, reason.clone()),
    };

    let cascaded: Vec<Value> = {
        let mut queue = run.queue.lock();
        match queue.complete(task, outcome) {
            Ok(ids) => ids
                .into_iter()
                .map(|id| task_payload(&queue, id))
                .collect(),
            Err(e) => {
                error!(task = %task, error = %e, "failed to record task outcome");
                Vec::new()
            }
        }
    };

    let mut payload = base;
    payload["duration_ms"] = json!(duration_ms);
    if event == events::TASK_FAILED {
        warn!(task = %name, error = %message, "task failed");
        payload["error"] = json!(message);
    } else {
        debug!(task = %name, duration_ms, "task succeeded");
        payload["output"] = json!(message);
    }
    run.sink.emit(event, Some(payload)).await;
    for skipped in cascaded {
        run.sink.emit(events::TASK_UPSTREAM_FAILED, Some(skipped)).await;
    }
    run.settle();
    true
}

async fn dispatch_loop(run: Arc<RunShared>, tx: mpsc::Sender<QueuedTask>) -> Result<RunReport> {
    let (run_id, pipeline_id, pipeline_name) = {
        let queue = run.queue.lock();
        (
            queue.run_id(),
            queue.pipeline_id(),
            queue.pipeline_name().to_string(),
        )
    };
    info!(%run_id, pipeline = %pipeline_name, "run started");
    run.sink
        .emit(
            events::RUN_STARTED,
            Some(json!({
                "run_id": run_id.to_string(),
                "pipeline_id": pipeline_id.to_string(),
                "pipeline": pipeline_name,
                "timestamp": iso_timestamp(),
            })),
        )
        .await;

    loop {
        let (next, in_flight, payload) = {
            let mut queue = run.queue.lock();
            let next = queue.next();
            if let NextTask::Ready(id) = next {
                queue.mark_queued(id)?;
            }
            let payload = match next {
                NextTask::Ready(id) => Some(task_payload(&queue, id)),
                _ => None,
            };
            (next, queue.in_flight(), payload)
        };

        match next {
            NextTask::Ready(task) => {
                run.sink.emit(events::TASK_QUEUED, payload).await;
                let job = QueuedTask {
                    run: Arc::clone(&run),
                    task,
                };
                run.outstanding.fetch_add(1, Ordering::AcqRel);
                tx.send(job).await.map_err(|_| {
                    FluxError::ExecutorClosed(format!(
                        "executor stopped before task {task} of run {run_id} was delivered"
                    ))
                })?;
            }
            NextTask::Blocked if in_flight == 0 && run.is_settled() => {
                error!(%run_id, "run is blocked with nothing in flight");
                break;
            }
            NextTask::Exhausted if run.is_settled() => break,
            NextTask::Blocked | NextTask::Exhausted => run.changed.notified().await,
        }
    }

    let report = run.report();
    info!(
        %run_id,
        pipeline = %pipeline_name,
        succeeded = report.succeeded().len(),
        failed = report.failed().len(),
        upstream_failed = report.upstream_failed().len(),
        duration_ms = report.duration_ms,
        "run completed"
    );
    run.sink
        .emit(
            events::RUN_COMPLETED,
            Some(json!({
                "run_id": run_id.to_string(),
                "pipeline_id": pipeline_id.to_string(),
                "pipeline": pipeline_name,
                "success": report.is_success(),
                "duration_ms": report.duration_ms,
                "timestamp": iso_timestamp(),
            })),
        )
        .await;
    Ok(report)
}

fn task_payload(queue: &RunQueue, id: TaskId) -> Value {
    let (name, task_id, status) = queue.task(id).map_or_else(
        || (String::new(), Uuid::nil(), TaskStatus::None),
        |t| (t.name().to_string(), t.id(), t.status()),
    );
    json!({
        "run_id": queue.run_id().to_string(),
        "pipeline": queue.pipeline_name(),
        "task": name,
        "task_id": task_id.to_string(),
        "status": status,
        "timestamp": iso_timestamp(),
    })
}
