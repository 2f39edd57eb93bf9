//! Transaction queue: a concurrency-safe FIFO of pending actions with
//! bounded capacity, batching/settling policy, and single-flight submission.
//!
//! ## Submission discipline
//!
//! At most one batch is in flight at a time. A batch is drained from the
//! queue only at the moment submission commits; a deferred thin batch stays
//! queued untouched and a one-shot settle timer retries it. Completion is
//! signalled by any confirmed model update, or forced by the hard timeout —
//! either way the queue frees itself and schedules the next drain after a
//! short cool-down.

use crate::action::Action;
use crate::codec::{encode_actions, Felt};
use crate::scheduler::Scheduler;
use crate::types::BridgeConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Below this many batchable actions at the head, the queue waits one settle
/// window for more to arrive before spending a transaction.
const MIN_FULL_BATCH: usize = 3;

// ---------------------------------------------------------------------------
// Chain collaborator
// ---------------------------------------------------------------------------

/// The on-chain call boundary. Fire-and-forget: completion is signalled
/// later, asynchronously, through a model-update callback — never through a
/// return value here.
pub trait ChainSubmitter: Send + Sync {
    fn submit(&self, words: &[Felt]);
}

// ---------------------------------------------------------------------------
// Pending entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub action: Action,
    pub enqueued_at: Instant,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy)]
struct QueuePolicy {
    max_queue_size: usize,
    max_batch_size: usize,
    force_send_size: usize,
    batch_wait: Duration,
    transaction_timeout: Duration,
    cooldown: Duration,
}

impl QueuePolicy {
    fn from_config(config: &BridgeConfig) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            max_batch_size: config.max_batch_size,
            force_send_size: config.force_send_size,
            batch_wait: Duration::from_millis(config.batch_wait_ms),
            transaction_timeout: Duration::from_millis(config.transaction_timeout_ms),
            cooldown: Duration::from_millis(config.cooldown_ms),
        }
    }
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<PendingTransaction>,
    submitting: bool,
    settle_armed: bool,
    settle_elapsed: bool,
    /// Bumped on every submission start and completion; stale timeout
    /// callbacks compare against it and become no-ops.
    epoch: u64,
    next_sequence: u64,
}

struct QueueInner {
    state: Mutex<QueueState>,
    policy: QueuePolicy,
    chain: Arc<dyn ChainSubmitter>,
    scheduler: Arc<dyn Scheduler>,
}

// ---------------------------------------------------------------------------
// TransactionQueue
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TransactionQueue {
    inner: Arc<QueueInner>,
}

impl TransactionQueue {
    pub fn new(
        config: &BridgeConfig,
        chain: Arc<dyn ChainSubmitter>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                policy: QueuePolicy::from_config(config),
                chain,
                scheduler,
            }),
        }
    }

    /// Append an action. At capacity, the oldest entries are evicted to
    /// admit the new one — the newest intent is never the one rejected.
    /// Triggers submission if none is in flight.
    pub fn enqueue(&self, action: Action) {
        {
            let mut state = self.inner.state.lock();
            while state.queue.len() >= self.inner.policy.max_queue_size {
                let dropped = state.queue.pop_front();
                if let Some(tx) = dropped {
                    log::warn!("queue full, dropping oldest action seq={}", tx.sequence);
                }
            }
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.queue.push_back(PendingTransaction {
                action,
                enqueued_at: Instant::now(),
                sequence,
            });
        }
        self.process_next();
    }

    /// Trigger submission of whatever is queued, if not already submitting.
    pub fn flush(&self) {
        let forced = {
            let mut state = self.inner.state.lock();
            // An explicit flush skips the settle window.
            state.settle_elapsed = true;
            !state.queue.is_empty()
        };
        if forced {
            self.process_next();
        }
    }

    /// Current queue depth, exposed for UI feedback.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Called on any confirmed model update from the chain. Frees the queue
    /// and schedules the next drain after the cool-down.
    pub fn transaction_complete(&self) {
        {
            let mut state = self.inner.state.lock();
            if !state.submitting {
                return;
            }
            state.submitting = false;
            state.epoch += 1;
        }
        let queue = self.clone();
        self.inner
            .scheduler
            .schedule_once(self.inner.policy.cooldown, Box::new(move || queue.process_next()));
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    fn process_next(&self) {
        let policy = self.inner.policy;
        let (batch, epoch): (Vec<PendingTransaction>, u64) = {
            let mut state = self.inner.state.lock();
            if state.submitting || state.queue.is_empty() {
                return;
            }

            let batchable_prefix = state
                .queue
                .iter()
                .take(policy.max_batch_size)
                .take_while(|tx| tx.action.is_batchable())
                .count();
            let depth = state.queue.len();

            // Thin batchable prefix: wait up to one settle window for more
            // actions before spending a transaction. The queue is left
            // untouched — entries are only removed once submission commits.
            if batchable_prefix > 0
                && batchable_prefix < MIN_FULL_BATCH
                && depth < policy.force_send_size
                && !state.settle_elapsed
            {
                if !state.settle_armed {
                    state.settle_armed = true;
                    drop(state);
                    let queue = self.clone();
                    self.inner.scheduler.schedule_once(
                        policy.batch_wait,
                        Box::new(move || {
                            {
                                let mut state = queue.inner.state.lock();
                                state.settle_armed = false;
                                state.settle_elapsed = true;
                            }
                            queue.process_next();
                        }),
                    );
                }
                return;
            }

            state.settle_elapsed = false;
            state.submitting = true;
            state.epoch += 1;
            let n = depth.min(policy.max_batch_size);
            let batch = state.queue.drain(..n).collect();
            (batch, state.epoch)
        };

        // Hard timeout: treat the batch as done whether or not it was
        // actually confirmed, so one silent failure never wedges the queue.
        let queue = self.clone();
        self.inner.scheduler.schedule_once(
            policy.transaction_timeout,
            Box::new(move || {
                let stale = {
                    let state = queue.inner.state.lock();
                    !state.submitting || state.epoch != epoch
                };
                if !stale {
                    log::warn!("transaction timed out, forcing completion");
                    queue.transaction_complete();
                }
            }),
        );

        let actions: Vec<Action> = batch.into_iter().map(|tx| tx.action).collect();
        let words = encode_actions(&actions);
        log::debug!("submitting {} actions as {} words", actions.len(), words.len());
        self.inner.chain.submit(&words);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
