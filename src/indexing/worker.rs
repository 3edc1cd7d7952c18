//! Bounded index request queue and the worker pool that drains it.
//!
//! Requests travel through the queue in their JSON wire form, the same bytes
//! an external bus would deliver, and workers decode them with
//! [`IndexDispatcher::handle_message`].

use crate::error::{Error, Result};
use crate::indexing::{IndexDispatcher, IndexRequest};
use crate::store::DataStore;

use parking_lot::Mutex as SyncMutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

/// `<index type>:<row id>` of every deduplicated request still in the queue.
type PendingRows = Arc<SyncMutex<HashSet<String>>>;

#[derive(Debug)]
struct Queued {
    payload: Vec<u8>,
    /// Set for requests enqueued through [`IndexQueue::try_enqueue_unique`].
    pending_key: Option<String>,
}

/// Producer side of the index queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IndexQueue {
    sender: mpsc::Sender<Queued>,
    pending: PendingRows,
}

/// Consumer side, shared by every worker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IndexQueueReceiver {
    receiver: Arc<Mutex<mpsc::Receiver<Queued>>>,
    pending: PendingRows,
}

pub fn index_queue(capacity: usize) -> (IndexQueue, IndexQueueReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let pending = PendingRows::default();
    (
        IndexQueue {
            sender,
            pending: pending.clone(),
        },
        IndexQueueReceiver {
            receiver: Arc::new(Mutex::new(receiver)),
            pending,
        },
    )
}

fn pending_key(request: &IndexRequest) -> String {
    format!("{}:{}", request.index_type, request.row_id)
}

impl IndexQueue {
    /// Enqueue without waiting. A full or closed queue is an error; the
    /// caller logs it and the backlog picks the row up again.
    pub fn try_enqueue(&self, request: &IndexRequest) -> Result<()> {
        self.try_send(request, None)
    }

    /// Like [`try_enqueue`](Self::try_enqueue), but skips the request when one
    /// for the same row, enqueued this way, is still waiting in the queue.
    /// Returns `Ok(false)` for a skipped duplicate.
    pub fn try_enqueue_unique(&self, request: &IndexRequest) -> Result<bool> {
        let key = pending_key(request);
        if !self.pending.lock().insert(key.clone()) {
            return Ok(false);
        }

        match self.try_send(request, Some(key.clone())) {
            Ok(()) => Ok(true),
            Err(error) => {
                self.pending.lock().remove(&key);
                Err(error)
            }
        }
    }

    fn try_send(&self, request: &IndexRequest, pending_key: Option<String>) -> Result<()> {
        let queued = Queued {
            payload: request.to_bytes()?,
            pending_key,
        };
        self.sender.try_send(queued).map_err(|error| {
            let reason = match error {
                mpsc::error::TrySendError::Full(_) => "index queue is full",
                mpsc::error::TrySendError::Closed(_) => "index queue is closed",
            };
            Error::Publish {
                event_type: request.index_type.clone(),
                reason: reason.to_string(),
            }
        })
    }

    pub async fn enqueue(&self, request: &IndexRequest) -> Result<()> {
        let queued = Queued {
            payload: request.to_bytes()?,
            pending_key: None,
        };
        self.sender
            .send(queued)
            .await
            .map_err(|_| Error::Publish {
                event_type: request.index_type.clone(),
                reason: "index queue is closed".to_string(),
            })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Rows currently held in the queue by [`try_enqueue_unique`](Self::try_enqueue_unique).
    pub fn pending_rows(&self) -> usize {
        self.pending.lock().len()
    }
}

impl IndexQueueReceiver {
    /// Wait for the next payload. Once `shutdown` is `true`, only payloads
    /// already buffered are returned, then `None`.
    pub async fn next(&self, shutdown: &mut watch::Receiver<bool>) -> Option<Vec<u8>> {
        let mut receiver = self.receiver.lock().await;
        let received = if *shutdown.borrow() {
            None
        } else {
            tokio::select! {
                queued = receiver.recv() => Some(queued),
                _ = shutdown.wait_for(|stop| *stop) => None,
            }
        };

        let queued = match received {
            Some(queued) => queued,
            None => receiver.try_recv().ok(),
        }?;
        Some(self.release(queued))
    }

    /// Take a buffered payload without waiting.
    pub async fn try_next(&self) -> Option<Vec<u8>> {
        let queued = self.receiver.lock().await.try_recv().ok()?;
        Some(self.release(queued))
    }

    fn release(&self, queued: Queued) -> Vec<u8> {
        if let Some(key) = &queued.pending_key {
            self.pending.lock().remove(key);
        }
        queued.payload
    }
}

/// Spawn `workers` tasks that apply queued requests until the queue closes or
/// `shutdown` flips to `true`.
///
/// After `shutdown` flips, workers stop waiting for new requests but still
/// apply every request already buffered, then exit. Each request runs under
/// `request_timeout`; an expired request is reported as cancelled. Failures
/// are logged and otherwise dropped, since the row stays in the backlog.
pub fn spawn_index_workers<S: DataStore>(
    dispatcher: IndexDispatcher<S>,
    receiver: IndexQueueReceiver,
    workers: usize,
    request_timeout: Duration,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..workers.max(1))
        .map(|worker_id| {
            let dispatcher = dispatcher.clone();
            let receiver = receiver.clone();
            let mut shutdown = shutdown.clone();

            tokio::spawn(async move {
                while let Some(payload) = receiver.next(&mut shutdown).await {
                    let outcome =
                        tokio::time::timeout(request_timeout, dispatcher.handle_message(&payload))
                            .await
                            .map_err(Error::from)
                            .and_then(|result| result);

                    if let Err(error) = outcome {
                        tracing::warn!(
                            %error,
                            worker_id,
                            retryable = error.is_retryable(),
                            "index request failed, row stays in the backlog"
                        );
                    }
                }

                tracing::debug!(worker_id, "index worker stopped");
            })
        })
        .collect()
}
