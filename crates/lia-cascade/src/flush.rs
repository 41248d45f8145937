//! The flush loop
//!
//! One long-lived task per running cascade. It collects items into a batch
//! until either the quantity threshold or the batch window is hit, hands the
//! batch to the callback on a detached task, and starts over.

use crate::cascade::{BatchCallback, CascadeStats};
use crate::config::CascadeConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};

pub(crate) struct FlushLoop<T> {
    pub(crate) receiver: mpsc::UnboundedReceiver<T>,
    pub(crate) stop: oneshot::Receiver<()>,
    pub(crate) config: CascadeConfig,
    pub(crate) callback: BatchCallback<T>,
    pub(crate) stats: Arc<CascadeStats>,
}

enum Collected<T> {
    /// Threshold reached or window expired
    Flush(Vec<T>),
    /// Stop was requested (or every producer handle is gone)
    Stop(Vec<T>),
}

impl<T: Send + 'static> FlushLoop<T> {
    pub(crate) async fn run(mut self) {
        tracing::debug!(
            max_wait_ms = self.config.max_wait.as_millis() as u64,
            max_quantity = self.config.max_quantity,
            "Cascade flush loop started"
        );

        loop {
            match self.collect().await {
                Collected::Flush(batch) => self.dispatch(batch),
                Collected::Stop(batch) => {
                    self.finalize(batch).await;
                    tracing::debug!("Cascade flush loop stopped");
                    return;
                }
            }
        }
    }

    /// Collect one batch.
    ///
    /// The window opens when the first item arrives, so the oldest item of a
    /// batch never waits longer than `max_wait`. Each further pull waits only
    /// for the remaining part of the window.
    async fn collect(&mut self) -> Collected<T> {
        let mut batch = Vec::with_capacity(self.config.max_quantity);

        let first = tokio::select! {
            biased;
            _ = &mut self.stop => return Collected::Stop(batch),
            item = self.receiver.recv() => item,
        };
        match first {
            Some(item) => batch.push(item),
            None => return Collected::Stop(batch),
        }

        let deadline = Instant::now() + self.config.max_wait;
        while batch.len() < self.config.max_quantity {
            tokio::select! {
                biased;
                _ = &mut self.stop => return Collected::Stop(batch),
                received = timeout_at(deadline, self.receiver.recv()) => match received {
                    Ok(Some(item)) => batch.push(item),
                    Ok(None) => return Collected::Stop(batch),
                    // window expired
                    Err(_) => break,
                },
            }
        }

        Collected::Flush(batch)
    }

    /// Fire-and-forget: batches may overlap with each other and with collection.
    fn dispatch(&self, batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }

        self.stats.record_batch(batch.len());
        tracing::trace!(batch_size = batch.len(), "Dispatching batch");
        tokio::spawn((self.callback)(batch));
    }

    /// Drain everything still queued, re-chunk it, and wait for those
    /// callbacks up to `max_wait_finalize`. Stragglers are aborted.
    async fn finalize(&mut self, mut pending: Vec<T>) {
        self.receiver.close();
        while let Ok(item) = self.receiver.try_recv() {
            pending.push(item);
        }

        if pending.is_empty() {
            return;
        }

        let total = pending.len();
        let mut tasks = JoinSet::new();
        let mut items = pending.into_iter().peekable();
        while items.peek().is_some() {
            let chunk: Vec<T> = items.by_ref().take(self.config.max_quantity).collect();
            self.stats.record_batch(chunk.len());
            tasks.spawn((self.callback)(chunk));
        }

        tracing::debug!(
            items = total,
            chunks = tasks.len(),
            "Finalizing cascade"
        );

        let wait_all = async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        tracing::warn!("Batch callback panicked during finalize");
                    }
                }
            }
        };

        if timeout(self.config.max_wait_finalize, wait_all).await.is_err() {
            tracing::warn!(
                pending = tasks.len(),
                timeout_ms = self.config.max_wait_finalize.as_millis() as u64,
                "Cascade finalize timed out, cancelling remaining batches"
            );
            tasks.abort_all();
        }
    }
}
