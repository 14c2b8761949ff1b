//! Client-side batching of `SendMessage` and `DeleteMessage` calls.
//!
//! A [`SendBuffer`] owns a background task that collects requests per queue and
//! sends them as `SendMessageBatch` / `DeleteMessageBatch` calls. A batch goes
//! out as soon as it holds `max_batch_size` entries or has been open for
//! `max_batch_open`, whichever comes first. Each caller awaits the outcome of
//! its own entry.
//!
//! Shutting the buffer down (or dropping it) closes intake, flushes every open
//! batch and waits for in-flight batch requests to finish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, SendMessageBatchRequestEntry};
use awslink_core::{ConnectionError, ConnectionResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::SqsError;

/// Most entries SQS accepts in one batch request.
pub const MAX_BATCH_SIZE: usize = 10;

/// Batching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferConfig {
    /// Entries per batch, `1..=10`.
    pub max_batch_size: usize,
    /// How long a batch may stay open before it is sent, in milliseconds.
    pub max_batch_open_ms: u64,
    /// Requests that may wait for the background task before callers block.
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_BATCH_SIZE,
            max_batch_open_ms: 200,
            capacity: 1024,
        }
    }
}

impl BufferConfig {
    /// How long a batch may stay open.
    #[must_use]
    pub fn max_batch_open(&self) -> Duration {
        Duration::from_millis(self.max_batch_open_ms)
    }

    /// Check the parameters.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Configuration`] for a batch size outside
    /// `1..=10`, a zero batch-open time or a zero capacity.
    pub fn validate(&self) -> ConnectionResult<()> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.max_batch_size) {
            return Err(ConnectionError::Configuration(format!(
                "maxBatchSize must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.max_batch_size
            )));
        }
        if self.max_batch_open_ms == 0 {
            return Err(ConnectionError::Configuration(
                "maxBatchOpenMs must be greater than zero".to_owned(),
            ));
        }
        if self.capacity == 0 {
            return Err(ConnectionError::Configuration(
                "capacity must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// One entry of a batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Batch-local id.
    pub id: String,
    /// Message body for sends, receipt handle for deletes.
    pub payload: String,
}

/// Per-entry outcomes of a batch request, keyed by entry id.
pub type BatchResults<T> = HashMap<String, Result<T, SqsError>>;

/// Sends batch requests for a [`SendBuffer`].
#[async_trait]
pub trait BatchDispatcher: Send + Sync + 'static {
    /// Send messages; a successful entry yields its message id.
    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<BatchEntry>,
    ) -> Result<BatchResults<String>, SqsError>;

    /// Delete messages by receipt handle.
    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: Vec<BatchEntry>,
    ) -> Result<BatchResults<()>, SqsError>;
}

#[async_trait]
impl BatchDispatcher for Client {
    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<BatchEntry>,
    ) -> Result<BatchResults<String>, SqsError> {
        let request = entries
            .into_iter()
            .map(|entry| {
                SendMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .message_body(entry.payload)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| sdk_error("SendMessageBatch", &e))?;

        let output = self
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(request))
            .send()
            .await
            .map_err(|e| sdk_error("SendMessageBatch", &e))?;

        let mut results: BatchResults<String> = output
            .successful()
            .iter()
            .map(|ok| (ok.id().to_owned(), Ok(ok.message_id().to_owned())))
            .collect();
        for failed in output.failed() {
            results.insert(failed.id().to_owned(), Err(entry_error(failed)));
        }
        Ok(results)
    }

    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: Vec<BatchEntry>,
    ) -> Result<BatchResults<()>, SqsError> {
        let request = entries
            .into_iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .receipt_handle(entry.payload)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| sdk_error("DeleteMessageBatch", &e))?;

        let output = self
            .delete_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(request))
            .send()
            .await
            .map_err(|e| sdk_error("DeleteMessageBatch", &e))?;

        let mut results: BatchResults<()> = output
            .successful()
            .iter()
            .map(|ok| (ok.id().to_owned(), Ok(())))
            .collect();
        for failed in output.failed() {
            results.insert(failed.id().to_owned(), Err(entry_error(failed)));
        }
        Ok(results)
    }
}

pub(crate) fn sdk_error<E: std::error::Error>(operation: &'static str, err: &E) -> SqsError {
    SqsError::Sdk {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn entry_error(failed: &aws_sdk_sqs::types::BatchResultErrorEntry) -> SqsError {
    SqsError::BatchEntry {
        id: failed.id().to_owned(),
        code: failed.code().to_owned(),
        message: failed.message().unwrap_or_default().to_owned(),
        sender_fault: failed.sender_fault(),
    }
}

enum Command {
    Send {
        queue_url: String,
        body: String,
        reply: oneshot::Sender<Result<String, SqsError>>,
    },
    Delete {
        queue_url: String,
        receipt_handle: String,
        reply: oneshot::Sender<Result<(), SqsError>>,
    },
    Shutdown,
}

/// Batching front end for SQS sends and deletes.
#[derive(Debug)]
pub struct SendBuffer {
    tx: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: BufferConfig,
}

impl SendBuffer {
    /// Start the background task. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn<D: BatchDispatcher>(dispatcher: D, config: BufferConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let worker = Worker {
            dispatcher: Arc::new(dispatcher),
            config,
            sends: HashMap::new(),
            deletes: HashMap::new(),
            inflight: JoinSet::new(),
        };
        let handle = tokio::spawn(worker.run(rx));
        debug!(
            max_batch_size = config.max_batch_size,
            max_batch_open_ms = config.max_batch_open_ms,
            "send buffer started"
        );
        Self {
            tx,
            worker: Mutex::new(Some(handle)),
            config,
        }
    }

    /// The batching parameters.
    #[must_use]
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Queue a message and wait for its batch to be sent.
    ///
    /// # Errors
    /// Returns the entry's failure, the batch request's failure, or
    /// [`SqsError::BufferClosed`] after shutdown.
    pub async fn send_message(&self, queue_url: &str, body: String) -> Result<String, SqsError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Send {
            queue_url: queue_url.to_owned(),
            body,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SqsError::BufferClosed)?
    }

    /// Queue a delete and wait for its batch to be sent.
    ///
    /// # Errors
    /// Same as [`SendBuffer::send_message`].
    pub async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: String,
    ) -> Result<(), SqsError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Delete {
            queue_url: queue_url.to_owned(),
            receipt_handle,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SqsError::BufferClosed)?
    }

    /// Stop accepting requests, flush open batches and wait for the
    /// background task to exit. Later calls return immediately.
    ///
    /// # Errors
    /// Returns [`SqsError::Worker`] if the background task panicked.
    pub async fn shutdown(&self) -> Result<(), SqsError> {
        let Some(handle) = self.worker.lock().take() else {
            return Ok(());
        };
        // A send error means the worker is already gone; joining reports why.
        let _ = self.tx.send(Command::Shutdown).await;
        handle.await.map_err(|e| SqsError::Worker(e.to_string()))?;
        debug!("send buffer stopped");
        Ok(())
    }

    async fn submit(&self, command: Command) -> Result<(), SqsError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SqsError::BufferClosed)
    }
}

struct Pending<T> {
    payload: String,
    reply: oneshot::Sender<Result<T, SqsError>>,
}

struct Batch<T> {
    opened: Instant,
    entries: Vec<Pending<T>>,
}

impl<T> Batch<T> {
    fn new() -> Self {
        Self {
            opened: Instant::now(),
            entries: Vec::new(),
        }
    }
}

struct Worker<D> {
    dispatcher: Arc<D>,
    config: BufferConfig,
    sends: HashMap<String, Batch<String>>,
    deletes: HashMap<String, Batch<()>>,
    inflight: JoinSet<()>,
}

impl<D: BatchDispatcher> Worker<D> {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Send { queue_url, body, reply }) => {
                        self.push_send(queue_url, Pending { payload: body, reply });
                    }
                    Some(Command::Delete { queue_url, receipt_handle, reply }) => {
                        self.push_delete(queue_url, Pending { payload: receipt_handle, reply });
                    }
                    // Keep receiving what was queued before the close.
                    Some(Command::Shutdown) => rx.close(),
                    None => break,
                },
                () = sleep_until(deadline) => self.flush_expired(),
                Some(_) = self.inflight.join_next(), if !self.inflight.is_empty() => {}
            }
        }

        self.flush_all();
        while self.inflight.join_next().await.is_some() {}
    }

    fn next_deadline(&self) -> Option<Instant> {
        let max_open = self.config.max_batch_open();
        self.sends
            .values()
            .map(|b| b.opened)
            .chain(self.deletes.values().map(|b| b.opened))
            .min()
            .map(|opened| opened + max_open)
    }

    fn push_send(&mut self, queue_url: String, pending: Pending<String>) {
        let batch = self
            .sends
            .entry(queue_url.clone())
            .or_insert_with(Batch::new);
        batch.entries.push(pending);
        if batch.entries.len() < self.config.max_batch_size {
            return;
        }
        if let Some(batch) = self.sends.remove(&queue_url) {
            self.dispatch_sends(queue_url, batch);
        }
    }

    fn push_delete(&mut self, queue_url: String, pending: Pending<()>) {
        let batch = self
            .deletes
            .entry(queue_url.clone())
            .or_insert_with(Batch::new);
        batch.entries.push(pending);
        if batch.entries.len() < self.config.max_batch_size {
            return;
        }
        if let Some(batch) = self.deletes.remove(&queue_url) {
            self.dispatch_deletes(queue_url, batch);
        }
    }

    fn flush_expired(&mut self) {
        let cutoff = Instant::now() - self.config.max_batch_open();
        let expired_sends: Vec<_> = self
            .sends
            .iter()
            .filter(|(_, b)| b.opened <= cutoff)
            .map(|(q, _)| q.clone())
            .collect();
        for queue_url in expired_sends {
            if let Some(batch) = self.sends.remove(&queue_url) {
                self.dispatch_sends(queue_url, batch);
            }
        }

        let expired_deletes: Vec<_> = self
            .deletes
            .iter()
            .filter(|(_, b)| b.opened <= cutoff)
            .map(|(q, _)| q.clone())
            .collect();
        for queue_url in expired_deletes {
            if let Some(batch) = self.deletes.remove(&queue_url) {
                self.dispatch_deletes(queue_url, batch);
            }
        }
    }

    fn flush_all(&mut self) {
        for (queue_url, batch) in std::mem::take(&mut self.sends) {
            self.dispatch_sends(queue_url, batch);
        }
        for (queue_url, batch) in std::mem::take(&mut self.deletes) {
            self.dispatch_deletes(queue_url, batch);
        }
    }

    fn dispatch_sends(&mut self, queue_url: String, batch: Batch<String>) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let (entries, replies) = split(batch);
        trace!(queue_url = %queue_url, entries = entries.len(), "sending message batch");
        self.inflight.spawn(async move {
            let result = dispatcher.send_batch(&queue_url, entries).await;
            deliver(&queue_url, result, replies);
        });
    }

    fn dispatch_deletes(&mut self, queue_url: String, batch: Batch<()>) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let (entries, replies) = split(batch);
        trace!(queue_url = %queue_url, entries = entries.len(), "sending delete batch");
        self.inflight.spawn(async move {
            let result = dispatcher.delete_batch(&queue_url, entries).await;
            deliver(&queue_url, result, replies);
        });
    }
}

type Reply<T> = oneshot::Sender<Result<T, SqsError>>;

fn split<T>(batch: Batch<T>) -> (Vec<BatchEntry>, Vec<Reply<T>>) {
    batch
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, pending)| {
            let entry = BatchEntry {
                id: index.to_string(),
                payload: pending.payload,
            };
            (entry, pending.reply)
        })
        .unzip()
}

fn deliver<T>(
    queue_url: &str,
    result: Result<BatchResults<T>, SqsError>,
    replies: Vec<Reply<T>>,
) {
    match result {
        Ok(mut results) => {
            for (index, reply) in replies.into_iter().enumerate() {
                let id = index.to_string();
                let outcome = results.remove(&id).unwrap_or_else(|| {
                    Err(SqsError::BatchEntry {
                        id,
                        code: "MissingResult".to_owned(),
                        message: "no result returned for entry".to_owned(),
                        sender_fault: false,
                    })
                });
                // The caller may have stopped waiting.
                let _ = reply.send(outcome);
            }
        }
        Err(e) => {
            warn!(queue_url, error = %e, "batch request failed");
            for reply in replies {
                let _ = reply.send(Err(e.clone()));
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
