//! Timer seam shared by the queue and the optimistic sweep.
//!
//! Everything time-driven goes through this one interface. Production code
//! runs [`TokioScheduler`]; tests drive a [`ManualScheduler`] with a virtual
//! clock so settle windows and timeouts become deterministic.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`. Fire-and-forget; there is no cancel
    /// handle — callers invalidate stale callbacks with their own epoch
    /// counters.
    fn schedule_once(&self, delay: Duration, task: Task);
}

// ---------------------------------------------------------------------------
// Tokio-backed scheduler
// ---------------------------------------------------------------------------

/// Spawns each task onto the ambient Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

// ---------------------------------------------------------------------------
// Manually driven scheduler (virtual clock)
// ---------------------------------------------------------------------------

/// Collects tasks and releases them when [`ManualScheduler::advance`] moves
/// the virtual clock past their deadline. Tasks run on the advancing thread,
/// in deadline order.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualInner>>,
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    pending: Vec<(Duration, Task)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the virtual clock, running every task whose deadline passed.
    /// Tasks scheduled by released tasks are honoured within the same call
    /// if their deadline also falls inside the advanced window.
    pub fn advance(&self, delta: Duration) {
        let target = {
            let mut inner = self.inner.lock();
            inner.now += delta;
            inner.now
        };
        loop {
            let task = {
                let mut inner = self.inner.lock();
                let due = inner
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, (deadline, _))| *deadline <= target)
                    .min_by_key(|(_, (deadline, _))| *deadline)
                    .map(|(i, _)| i);
                match due {
                    Some(i) => inner.pending.swap_remove(i).1,
                    None => break,
                }
            };
            task();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) {
        let mut inner = self.inner.lock();
        let deadline = inner.now + delay;
        inner.pending.push((deadline, task));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
