//! Cascade handle
//!
//! Owns the producer side of the queue and the lifecycle of the flush loop.

use crate::config::CascadeConfig;
use crate::error::{CascadeError, CascadeResult};
use crate::flush::FlushLoop;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub(crate) type BatchCallback<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Counters describing what a cascade has done so far
#[derive(Debug, Default)]
pub struct CascadeStats {
    enqueued: AtomicU64,
    dispatched_items: AtomicU64,
    dispatched_batches: AtomicU64,
}

impl CascadeStats {
    /// Items accepted by `put`
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Items handed to the callback
    pub fn dispatched_items(&self) -> u64 {
        self.dispatched_items.load(Ordering::Relaxed)
    }

    /// Callback invocations
    pub fn dispatched_batches(&self) -> u64 {
        self.dispatched_batches.load(Ordering::Relaxed)
    }

    pub(crate) fn record_batch(&self, size: usize) {
        self.dispatched_items.fetch_add(size as u64, Ordering::Relaxed);
        self.dispatched_batches.fetch_add(1, Ordering::Relaxed);
    }
}

struct Running<T> {
    sender: mpsc::UnboundedSender<T>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Bounded-latency batcher
///
/// `put` can be called from any number of tasks at once through a shared
/// reference; it never awaits. Batches are delivered to the callback on
/// detached tasks, so callbacks for consecutive batches may run concurrently.
/// A callback that panics only takes down its own task.
///
/// Dropping a running cascade stops it without waiting for the drain.
pub struct Cascade<T> {
    config: CascadeConfig,
    callback: BatchCallback<T>,
    running: Mutex<Option<Running<T>>>,
    stats: Arc<CascadeStats>,
}

impl<T: Send + 'static> Cascade<T> {
    /// Create a stopped cascade
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `max_quantity` is zero or `max_wait` is zero.
    pub fn new<F, Fut>(config: CascadeConfig, callback: F) -> CascadeResult<Self>
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        config.validate()?;

        Ok(Self {
            config,
            callback: Arc::new(move |batch| callback(batch).boxed()),
            running: Mutex::new(None),
            stats: Arc::new(CascadeStats::default()),
        })
    }

    /// Start the flush loop on the current tokio runtime
    ///
    /// # Errors
    /// Returns `AlreadyRunning` if the loop was started and not stopped since.
    pub fn start(&self) -> CascadeResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(CascadeError::AlreadyRunning);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let flush = FlushLoop {
            receiver,
            stop: stop_rx,
            config: self.config,
            callback: Arc::clone(&self.callback),
            stats: Arc::clone(&self.stats),
        };
        let task = tokio::spawn(flush.run());

        *running = Some(Running {
            sender,
            stop: stop_tx,
            task,
        });

        tracing::debug!("Cascade started");
        Ok(())
    }

    /// Queue one item for the next batch
    ///
    /// # Errors
    /// Returns `NotRunning` if the cascade is stopped.
    pub fn put(&self, item: T) -> CascadeResult<()> {
        let running = self.running.lock();
        let running = running.as_ref().ok_or(CascadeError::NotRunning)?;

        running
            .sender
            .send(item)
            .map_err(|_| CascadeError::NotRunning)?;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Mark the cascade inactive and start the final drain
    ///
    /// With `wait` the returned handle resolves once every queued item has
    /// been handed to a callback and those callbacks finished, or
    /// `max_wait_finalize` elapsed. Without `wait` the handle resolves
    /// immediately and the drain continues in the background.
    ///
    /// Stopping a stopped cascade is a no-op.
    pub fn stop(&self, wait: bool) -> DrainHandle {
        let Some(running) = self.running.lock().take() else {
            return DrainHandle::finished();
        };

        // Dropping the sender first guarantees the drain sees every accepted item.
        drop(running.sender);
        let _ = running.stop.send(());

        tracing::debug!(wait, "Cascade stopping");

        if wait {
            DrainHandle {
                task: Some(running.task),
            }
        } else {
            DrainHandle::finished()
        }
    }
}

impl<T> Cascade<T> {
    /// Whether the flush loop is active
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The bounds this cascade was built with
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<CascadeStats> {
        Arc::clone(&self.stats)
    }
}

impl<T> std::fmt::Debug for Cascade<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cascade")
            .field("config", &self.config)
            .field("running", &self.running.lock().is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Resolves when the final drain of a stopped cascade completes
#[derive(Debug)]
#[must_use = "await the handle to wait for the drain"]
pub struct DrainHandle {
    task: Option<JoinHandle<()>>,
}

impl DrainHandle {
    fn finished() -> Self {
        Self { task: None }
    }
}

impl Future for DrainHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let Some(task) = self.task.as_mut() else {
            return Poll::Ready(());
        };

        match Pin::new(task).poll(cx) {
            Poll::Ready(result) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Cascade flush loop ended abnormally");
                }
                self.task = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
