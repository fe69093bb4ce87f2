//! Best-effort forwarding of sink records off the notification path
//!
//! Notifications enqueue a copy of each record on a bounded channel and
//! return immediately. One worker task drains the channel into the sink.
//! Delivery is at most once: failures are logged and counted, never
//! retried, and a full queue drops the record.

use crate::sink::{RemoteSink, SinkRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default capacity of the forwarding queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ForwarderStats {
        ForwarderStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Forwarding statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Records discarded because the queue was full or closed
    pub dropped: u64,
}

/// Queue plus worker feeding a [`RemoteSink`]
pub struct SinkForwarder {
    sink_name: String,
    tx: mpsc::Sender<SinkRecord>,
    counters: Arc<Counters>,
    worker: JoinHandle<()>,
}

impl SinkForwarder {
    /// Start the worker task. Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn RemoteSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<SinkRecord>(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let sink_name = sink.name().to_string();

        let worker_counters = counters.clone();
        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match sink.send(&record).await {
                    Ok(()) => {
                        worker_counters.delivered.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            "Event {} logged to {} successfully",
                            record.event_id,
                            sink.name()
                        );
                    }
                    Err(e) => {
                        worker_counters.failed.fetch_add(1, Ordering::Relaxed);
                        error!("Error logging event to remote sink {}: {}", sink.name(), e);
                    }
                }
            }
            if let Err(e) = sink.flush().await {
                error!("Error flushing remote sink {}: {}", sink.name(), e);
            }
            debug!("Sink forwarder for {} stopped", sink.name());
        });

        info!(
            "Forwarding events to sink {} (queue capacity {})",
            sink_name, capacity
        );

        Self {
            sink_name,
            tx,
            counters,
            worker,
        }
    }

    /// Queue a record without blocking
    pub fn forward(&self, record: SinkRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Sink queue for {} full, dropping event {}",
                    self.sink_name, record.event_id
                );
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Sink forwarder for {} closed, dropping event {}",
                    self.sink_name, record.event_id
                );
            }
        }
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    pub fn stats(&self) -> ForwarderStats {
        self.counters.snapshot()
    }

    /// Close the queue and wait for queued records to be sent
    pub async fn shutdown(self) -> ForwarderStats {
        let SinkForwarder {
            tx,
            counters,
            worker,
            sink_name,
        } = self;
        drop(tx);

        if let Err(e) = worker.await {
            error!("Sink forwarder for {} panicked: {}", sink_name, e);
        }

        counters.snapshot()
    }
}
