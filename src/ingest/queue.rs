//! Background ingestion workers
//!
//! Rulebook ids go through a bounded channel to a fixed set of workers, each
//! of which runs [`IngestPipeline::process`] one rulebook at a time.

use super::IngestPipeline;
use crate::error::Result;
use crate::meta::{MetaDb, RulebookStatus};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cloneable sender side of the ingestion queue
#[derive(Debug, Clone)]
pub struct QueueHandle {
    sender: mpsc::Sender<i64>,
}

impl QueueHandle {
    /// Queue a rulebook for processing without waiting.
    ///
    /// Returns false when the queue is full or shut down; the rulebook then
    /// stays `pending` until the next startup requeue.
    pub fn enqueue(&self, rulebook_id: i64) -> bool {
        match self.sender.try_send(rulebook_id) {
            Ok(()) => {
                debug!(rulebook_id, "Queued rulebook");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(rulebook_id, "Ingestion queue is full; rulebook left pending");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(rulebook_id, "Ingestion queue is closed; rulebook left pending");
                false
            }
        }
    }
}

/// Worker pool draining the ingestion queue
pub struct IngestQueue {
    handle: QueueHandle,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl IngestQueue {
    /// Spawn `workers` tasks behind a queue holding up to `capacity` ids
    pub fn start(pipeline: Arc<IngestPipeline>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let workers = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    pipeline.clone(),
                    receiver.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), capacity, "Ingestion workers started");

        Self {
            handle: QueueHandle { sender },
            shutdown,
            workers,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    pub fn enqueue(&self, rulebook_id: i64) -> bool {
        self.handle.enqueue(rulebook_id)
    }

    /// Queue every rulebook still `pending`, oldest first
    pub async fn requeue_pending(&self, db: &MetaDb) -> Result<usize> {
        let pending = db.list_rulebooks_by_status(RulebookStatus::Pending).await?;
        let mut queued = 0;
        for rulebook in pending {
            if self.enqueue(rulebook.rulebook_id) {
                queued += 1;
            }
        }
        if queued > 0 {
            info!(queued, "Requeued pending rulebooks");
        }
        Ok(queued)
    }

    /// Stop taking new work and wait for in-flight jobs to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        drop(self.handle);
        join_all(self.workers).await;
        info!("Ingestion workers stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    pipeline: Arc<IngestPipeline>,
    receiver: Arc<Mutex<mpsc::Receiver<i64>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                id = receiver.recv() => id,
                _ = shutdown.changed() => None,
            }
        };

        let Some(rulebook_id) = next else {
            break;
        };

        match pipeline.process(rulebook_id).await {
            Ok(rulebook) => debug!(
                worker_id,
                rulebook_id,
                status = %rulebook.processing_status,
                "Job finished"
            ),
            Err(e) => error!(worker_id, rulebook_id, "Job could not run: {}", e),
        }

        if *shutdown.borrow() {
            break;
        }
    }
    debug!(worker_id, "Worker exiting");
}
