//! Per-user serializer
//!
//! In-process ordering fence: every request is routed to a single worker
//! keyed by user id, so two concurrent requests for the same user apply in
//! enqueue order even before the database lock is taken. Workers for
//! different users run concurrently.
//!
//! Uses bounded mpsc channels with oneshot reply slots. A caller that goes
//! away after enqueueing (dropped reply receiver) does not stop the worker
//! from applying the item - ordering is preserved and idempotency covers
//! the retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core_types::UserId;
use crate::error::EngineError;

use super::processor::{ProcessOutcome, Processor};
use super::validation::ValidatedRequest;

/// One queued work item: the validated request plus its reply slot.
struct Job {
    request: ValidatedRequest,
    reply: oneshot::Sender<Result<ProcessOutcome, EngineError>>,
}

/// Process-global map of per-user work queues.
pub struct UserSerializer {
    workers: DashMap<UserId, mpsc::Sender<Job>>,
    processor: Arc<dyn Processor>,
    queue_size: usize,
    shutting_down: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl UserSerializer {
    pub fn new(processor: Arc<dyn Processor>, queue_size: usize) -> Arc<Self> {
        Arc::new(Self {
            workers: DashMap::new(),
            processor,
            queue_size,
            shutting_down: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Submit a request for a user and wait for its result.
    ///
    /// Blocks while the user's queue is full (backpressure). FIFO order per
    /// user: if two submissions both enqueue, the first enqueued is applied
    /// first.
    ///
    /// # Errors
    /// - `ShuttingDown` after `shutdown()` has begun
    pub async fn submit(
        &self,
        user_id: UserId,
        request: ValidatedRequest,
    ) -> Result<ProcessOutcome, EngineError> {
        let sender = self.sender_for(user_id)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        sender
            .send(Job {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ShuttingDown)?;

        // The worker applies the item regardless of whether we are still
        // here to receive the reply.
        reply_rx
            .await
            .map_err(|_| EngineError::Internal("serializer worker dropped reply".into()))?
    }

    /// Get or atomically create the queue and worker for a user.
    ///
    /// Creation is serialized with `shutdown()` through the handles lock:
    /// either the new worker's handle lands in the list before shutdown
    /// drains it, or the flag is already set and the submission is refused.
    /// A sender cloned from the map just before shutdown clears it still
    /// reaches a live worker, which drains that item before exiting.
    fn sender_for(&self, user_id: UserId) -> Result<mpsc::Sender<Job>, EngineError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(EngineError::ShuttingDown);
        }
        if let Some(sender) = self.workers.get(&user_id) {
            return Ok(sender.clone());
        }

        let mut handles = self.handles.lock().unwrap();
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(EngineError::ShuttingDown);
        }

        // entry() is a check-and-insert under the shard lock: exactly one
        // caller creates the channel and spawns the worker.
        let sender = self
            .workers
            .entry(user_id)
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.queue_size);
                let processor = Arc::clone(&self.processor);
                handles.push(tokio::spawn(worker_loop(user_id, rx, processor)));
                tracing::debug!(user_id, "Spawned serializer worker");
                tx
            })
            .clone();
        Ok(sender)
    }

    /// Number of live per-user queues (monitoring).
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Close every queue and join all workers.
    ///
    /// Queued items are still applied before the workers exit. The flag is
    /// set and the queues closed under the handles lock, so a racing
    /// submission either finds its worker joined here or is refused.
    pub async fn shutdown(&self) {
        tracing::info!(
            workers = self.workers.len(),
            "Shutting down per-user serializer"
        );
        let handles = {
            let mut handles = self.handles.lock().unwrap();
            self.shutting_down.store(true, Ordering::Release);
            self.workers.clear();
            std::mem::take(&mut *handles)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Serializer worker panicked");
            }
        }
        tracing::info!("Per-user serializer stopped");
    }
}

/// Drain one user's queue sequentially until the channel closes.
async fn worker_loop(user_id: UserId, mut rx: mpsc::Receiver<Job>, processor: Arc<dyn Processor>) {
    while let Some(job) = rx.recv().await {
        let result = processor.process(user_id, &job.request).await;
        // A closed reply slot means the caller gave up; the work is done
        // either way and the result is simply discarded.
        let _ = job.reply.send(result);
    }
    tracing::debug!(user_id, "Serializer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fixed_clock;
    use crate::ledger::types::TransactionRecord;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Records processed requests and tracks per-user concurrency.
    struct MockProcessor {
        processed: Mutex<Vec<(UserId, String)>>,
        in_flight: Mutex<HashMap<UserId, usize>>,
        max_in_flight: Mutex<HashMap<UserId, usize>>,
        delay: Duration,
    }

    impl MockProcessor {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                processed: Mutex::new(Vec::new()),
                in_flight: Mutex::new(HashMap::new()),
                max_in_flight: Mutex::new(HashMap::new()),
                delay,
            })
        }

        fn processed_ids(&self, user_id: UserId) -> Vec<String> {
            self.processed
                .lock()
                .unwrap()
                .iter()
                .filter(|(uid, _)| *uid == user_id)
                .map(|(_, id)| id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Processor for MockProcessor {
        async fn process(
            &self,
            user_id: UserId,
            request: &ValidatedRequest,
        ) -> Result<ProcessOutcome, EngineError> {
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                let n = in_flight.entry(user_id).or_insert(0);
                *n += 1;
                let mut max = self.max_in_flight.lock().unwrap();
                let m = max.entry(user_id).or_insert(0);
                *m = (*m).max(*n);
            }

            tokio::time::sleep(self.delay).await;
            self.processed
                .lock()
                .unwrap()
                .push((user_id, request.external_id.clone()));

            *self
                .in_flight
                .lock()
                .unwrap()
                .get_mut(&user_id)
                .unwrap() -= 1;

            let clock = fixed_clock();
            let mut record = TransactionRecord::new(
                user_id,
                &request.external_id,
                "game",
                "win",
                &request.amount,
                &clock,
            )
            .unwrap();
            record.mark_processed(&clock, 100);
            Ok(ProcessOutcome::Applied(record))
        }
    }

    fn request(external_id: &str) -> ValidatedRequest {
        crate::ledger::validation::validate_request(1, external_id, "game", "win", "1.00").unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_result() {
        let mock = MockProcessor::new(Duration::ZERO);
        let serializer = UserSerializer::new(mock.clone(), 64);

        let outcome = serializer.submit(1, request("tx-1")).await.unwrap();
        match outcome {
            ProcessOutcome::Applied(record) => assert_eq!(record.external_id, "tx-1"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(serializer.worker_count(), 1);
    }

    #[tokio::test]
    async fn test_fifo_order_per_user() {
        let mock = MockProcessor::new(Duration::from_millis(2));
        let serializer = UserSerializer::new(mock.clone(), 64);

        for i in 0..10 {
            serializer
                .submit(7, request(&format!("tx-{}", i)))
                .await
                .unwrap();
        }

        let ids = mock.processed_ids(7);
        let expected: Vec<String> = (0..10).map(|i| format!("tx-{}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_same_user_never_concurrent() {
        let mock = MockProcessor::new(Duration::from_millis(10));
        let serializer = UserSerializer::new(mock.clone(), 64);

        let mut tasks = Vec::new();
        for user_id in [1u64, 1, 1, 2, 2, 3] {
            let s = Arc::clone(&serializer);
            let id = format!("tx-{}-{}", user_id, tasks.len());
            tasks.push(tokio::spawn(async move {
                s.submit(user_id, request(&id)).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let max = mock.max_in_flight.lock().unwrap();
        for (user_id, m) in max.iter() {
            assert_eq!(*m, 1, "user {} saw concurrent processing", user_id);
        }
        assert_eq!(serializer.worker_count(), 3);
    }

    #[tokio::test]
    async fn test_worker_applies_after_caller_gone() {
        let mock = MockProcessor::new(Duration::from_millis(30));
        let serializer = UserSerializer::new(mock.clone(), 64);

        // First job occupies the worker; second is enqueued, then abandoned.
        let s1 = Arc::clone(&serializer);
        let first = tokio::spawn(async move { s1.submit(5, request("tx-a")).await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        let s2 = Arc::clone(&serializer);
        let second = tokio::spawn(async move { s2.submit(5, request("tx-b")).await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        second.abort();

        first.await.unwrap().unwrap();
        // The abandoned item is still applied, in order.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(mock.processed_ids(5), vec!["tx-a", "tx-b"]);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_submissions() {
        let mock = MockProcessor::new(Duration::ZERO);
        let serializer = UserSerializer::new(mock.clone(), 64);

        serializer.submit(1, request("tx-1")).await.unwrap();
        serializer.shutdown().await;

        let err = serializer.submit(1, request("tx-2")).await.unwrap_err();
        assert!(matches!(err, EngineError::ShuttingDown));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_items() {
        let mock = MockProcessor::new(Duration::from_millis(10));
        let serializer = UserSerializer::new(mock.clone(), 64);

        let mut tasks = Vec::new();
        for i in 0..5 {
            let s = Arc::clone(&serializer);
            let id = format!("tx-{}", i);
            tasks.push(tokio::spawn(async move { s.submit(9, request(&id)).await }));
        }
        // Give the submissions time to enqueue before tearing down.
        tokio::time::sleep(Duration::from_millis(5)).await;
        serializer.shutdown().await;

        assert_eq!(mock.processed_ids(9).len(), 5);
        for task in tasks {
            task.await.unwrap().unwrap();
        }
    }
}
