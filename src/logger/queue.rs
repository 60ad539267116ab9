//! Background delivery queue for log events.
//!
//! Events are pushed with [`LogQueue::enqueue`] and posted one at a time by a worker task
//! that starts on first use. Delivery is at-most-once and best-effort: a failed post is
//! logged and dropped, never retried, and never reported to the caller that enqueued it.
//! The queue is bounded; when it is full the oldest undelivered event is discarded.

use crate::error::{QuotientError, Result};
use crate::resources::logs::{LogsResource, NewLog};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Events held before the oldest are discarded.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Delivery counters since the queue was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub delivered: usize,
    pub failed: usize,
    /// Discarded without a delivery attempt because the queue was full.
    pub dropped: usize,
}

struct Shared {
    queue: Mutex<VecDeque<NewLog>>,
    capacity: usize,
    notify: Notify,
    /// Enqueued events whose delivery has not been attempted yet.
    pending: AtomicUsize,
    stop_flag: AtomicBool,
    delivered: AtomicUsize,
    failed: AtomicUsize,
    dropped: AtomicUsize,
}

pub struct LogQueue {
    logs: Arc<LogsResource>,
    shared: Arc<Shared>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogQueue {
    pub fn new(logs: LogsResource) -> Self {
        Self::with_capacity(logs, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(logs: LogsResource, capacity: usize) -> Self {
        Self {
            logs: Arc::new(logs),
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                capacity: capacity.max(1),
                notify: Notify::new(),
                pending: AtomicUsize::new(0),
                stop_flag: AtomicBool::new(false),
                delivered: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                dropped: AtomicUsize::new(0),
            }),
            task_handle: Mutex::new(None),
        }
    }

    /// Queue an event for delivery. Must be called from within a tokio runtime.
    pub fn enqueue(&self, log: NewLog) -> Result<()> {
        if self.shared.stop_flag.load(Ordering::Acquire) {
            return Err(QuotientError::Config("log queue has been shut down".to_string()));
        }
        self.ensure_started()?;

        debug!("Enqueuing log {}", log.id);
        let mut queue = self
            .shared
            .queue
            .lock()
            .map_err(|_| QuotientError::Config("log queue lock poisoned".to_string()))?;
        if queue.len() >= self.shared.capacity {
            if let Some(oldest) = queue.pop_front() {
                warn!("Log queue full, dropping log {}", oldest.id);
                self.shared.dropped.fetch_add(1, Ordering::AcqRel);
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            }
        }
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        queue.push_back(log);
        drop(queue);
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Number of events not yet attempted.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            delivered: self.shared.delivered.load(Ordering::Acquire),
            failed: self.shared.failed.load(Ordering::Acquire),
            dropped: self.shared.dropped.load(Ordering::Acquire),
        }
    }

    /// Wait until every enqueued event has been attempted.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Option<Duration>) -> bool {
        let start = tokio::time::Instant::now();

        loop {
            if self.pending() == 0 {
                return true;
            }
            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    debug!("Log queue drain timed out with {} pending", self.pending());
                    return false;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Drain outstanding events, then stop the worker.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> bool {
        let drained = self.drain(timeout).await;

        self.shared.stop_flag.store(true, Ordering::Release);
        self.shared.notify.notify_one();

        let handle = self.task_handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Log worker ended abnormally: {}", e);
            }
            info!("Log queue stopped");
        }

        drained
    }

    fn ensure_started(&self) -> Result<()> {
        let mut handle = self
            .task_handle
            .lock()
            .map_err(|_| QuotientError::Config("log queue lock poisoned".to_string()))?;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        if handle.take().is_some() {
            debug!("Log worker is gone, restarting on the current runtime");
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            QuotientError::Config("logging requires a running tokio runtime".to_string())
        })?;

        let logs = self.logs.clone();
        let shared = self.shared.clone();
        *handle = Some(runtime.spawn(async move {
            Self::deliver_loop(logs, shared).await;
        }));
        debug!("Log worker started");

        Ok(())
    }

    async fn deliver_loop(logs: Arc<LogsResource>, shared: Arc<Shared>) {
        loop {
            let next = shared.queue.lock().ok().and_then(|mut q| q.pop_front());

            match next {
                Some(log) => {
                    match logs.create(&log).await {
                        Ok(_) => {
                            debug!("Delivered log {}", log.id);
                            shared.delivered.fetch_add(1, Ordering::AcqRel);
                        }
                        Err(e) => {
                            error!("Failed to deliver log {}: {}", log.id, e);
                            shared.failed.fetch_add(1, Ordering::AcqRel);
                        }
                    }
                    shared.pending.fetch_sub(1, Ordering::AcqRel);
                }
                None => {
                    if shared.stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    shared.notify.notified().await;
                }
            }
        }
    }
}

impl Drop for LogQueue {
    fn drop(&mut self) {
        self.shared.stop_flag.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}
