//! Task fixtures.

use crate::core::Task;
use anyhow::anyhow;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A task that returns `"<name> done"`.
#[must_use]
pub fn succeeding_task(name: impl Into<String>) -> Task {
    let name = name.into();
    let output = format!("{name} done");
    Task::new(name, move || Ok(output.clone()))
}

/// A task whose function returns an error with `message`.
#[must_use]
pub fn failing_task(name: impl Into<String>, message: impl Into<String>) -> Task {
    let message = message.into();
    Task::new(name, move || Err(anyhow!("{message}")))
}

/// A task whose function panics with `message`.
#[must_use]
pub fn panicking_task(name: impl Into<String>, message: impl Into<String>) -> Task {
    let message = message.into();
    Task::new(name, move || -> anyhow::Result<String> { panic!("{message}") })
}

/// Records which tasks ran, in order, and how many ran at the same time.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRecorder {
    log: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ExecutionRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A succeeding task that records its name when it runs.
    #[must_use]
    pub fn task(&self, name: impl Into<String>) -> Task {
        self.slow_task(name, Duration::ZERO)
    }

    /// A recording task that sleeps for `delay` before returning.
    #[must_use]
    pub fn slow_task(&self, name: impl Into<String>, delay: Duration) -> Task {
        let name = name.into();
        let recorder = self.clone();
        let label = name.clone();
        Task::new(name, move || {
            let running = recorder.active.fetch_add(1, Ordering::SeqCst) + 1;
            recorder.max_active.fetch_max(running, Ordering::SeqCst);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            recorder.log.lock().push(label.clone());
            recorder.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("{label} done"))
        })
    }

    /// A recording task that fails after recording.
    #[must_use]
    pub fn failing_task(&self, name: impl Into<String>) -> Task {
        let name = name.into();
        let log = Arc::clone(&self.log);
        let label = name.clone();
        Task::new(name, move || {
            log.lock().push(label.clone());
            Err(anyhow!("{label} failed"))
        })
    }

    /// Names of the tasks that ran, in execution order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of recorded executions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.log.lock().len()
    }

    /// Returns true if `name` ran.
    #[must_use]
    pub fn ran(&self, name: &str) -> bool {
        self.log.lock().iter().any(|n| n == name)
    }

    /// Highest number of recording tasks observed running at once.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Forgets every recorded execution.
    pub fn reset(&self) {
        self.log.lock().clear();
        self.max_active.store(0, Ordering::SeqCst);
    }
}
