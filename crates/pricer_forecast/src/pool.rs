//! Batch worker pool.
//!
//! Batches execute on a dedicated Rayon thread pool sized by the worker
//! count. Each batch is a single pool job that reads only its own
//! [`BatchJob`] and writes only its own output vector, so no
//! synchronisation happens mid-batch. The result travels back to the async
//! orchestrator through a `tokio::sync::oneshot` channel.
//!
//! A panicking batch is caught and reported as
//! [`ForecastError::WorkerFailure`]; the pool itself keeps running. With a
//! timeout configured, a batch that runs longer than the limit fails the same
//! way. The clock starts when a worker picks the job up, so time spent
//! queued behind other batches does not count. A timed-out job is abandoned
//! on the pool rather than interrupted.

use crate::error::ForecastError;
use crate::rng::WalkRng;
use crate::sampler::RandomWalk;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// One unit of work for the pool.
#[derive(Clone, Copy, Debug)]
pub struct BatchJob {
    /// Position of this batch within its run.
    pub sequence: usize,
    /// Number of paths to simulate.
    pub size: usize,
    /// Walk parameters shared by every path in the batch.
    pub walk: RandomWalk,
    /// Seed for this batch's generator.
    pub seed: u64,
}

/// Terminal prices produced by one batch, in path order.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutput {
    /// Sequence number of the originating job.
    pub sequence: usize,
    /// Terminal prices; index `i` is path `i` of the batch.
    pub prices: Vec<f64>,
}

/// Runs a batch synchronously on the calling thread.
pub fn simulate_batch(job: &BatchJob) -> Vec<f64> {
    let mut rng = WalkRng::from_seed(job.seed);
    let mut prices = vec![0.0; job.size];
    job.walk.sample_into(&mut rng, &mut prices);
    prices
}

/// Bounded pool of batch workers.
///
/// Cloning is cheap and shares the underlying threads.
#[derive(Clone)]
pub struct BatchWorkerPool {
    pool: Arc<rayon::ThreadPool>,
    workers: usize,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for BatchWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWorkerPool")
            .field("workers", &self.workers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BatchWorkerPool {
    /// Starts a pool with `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::WorkerFailure`] if the threads cannot be
    /// spawned.
    pub fn new(workers: usize) -> Result<Self, ForecastError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("forecast-worker-{}", i))
            .build()
            .map_err(|e| ForecastError::worker(0, format!("failed to start worker pool: {}", e)))?;

        Ok(Self {
            pool: Arc::new(pool),
            workers,
            timeout: None,
        })
    }

    /// Sets the per-batch timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of worker threads.
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Per-batch timeout, if any.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Simulates one batch on the pool.
    pub async fn run(&self, job: BatchJob) -> Result<BatchOutput, ForecastError> {
        let prices = self.execute(job.sequence, move || simulate_batch(&job)).await?;
        Ok(BatchOutput {
            sequence: job.sequence,
            prices,
        })
    }

    /// Runs an arbitrary batch body on the pool, applying the panic and
    /// timeout policy.
    pub async fn execute<F>(&self, sequence: usize, body: F) -> Result<Vec<f64>, ForecastError>
    where
        F: FnOnce() -> Vec<f64> + Send + 'static,
    {
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let _ = started_tx.send(());
            let outcome = panic::catch_unwind(AssertUnwindSafe(body)).map_err(panic_message);
            // The receiver is gone if the batch was abandoned.
            let _ = tx.send(outcome);
        });

        let received = match self.timeout {
            Some(limit) => {
                if started_rx.await.is_err() {
                    return Err(ForecastError::worker(sequence, "worker dropped the batch"));
                }
                tokio::time::timeout(limit, rx).await.map_err(|_| {
                    ForecastError::worker(sequence, format!("timed out after {:?}", limit))
                })?
            }
            None => rx.await,
        };

        match received {
            Ok(Ok(prices)) => Ok(prices),
            Ok(Err(message)) => Err(ForecastError::worker(sequence, message)),
            Err(_) => Err(ForecastError::worker(sequence, "worker dropped the batch")),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", s)
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastErrorKind;

    fn job(sequence: usize, size: usize, seed: u64) -> BatchJob {
        BatchJob {
            sequence,
            size,
            walk: RandomWalk::new(100.0, 0.2, 30),
            seed,
        }
    }

    #[tokio::test]
    async fn test_run_returns_requested_size() {
        let pool = BatchWorkerPool::new(2).unwrap();
        let output = pool.run(job(3, 1_000, 1)).await.unwrap();
        assert_eq!(output.sequence, 3);
        assert_eq!(output.prices.len(), 1_000);
    }

    #[tokio::test]
    async fn test_pool_matches_inline_execution() {
        let pool = BatchWorkerPool::new(4).unwrap();
        let j = job(0, 256, 77);
        let output = pool.run(j).await.unwrap();
        assert_eq!(output.prices, simulate_batch(&j));
    }

    #[tokio::test]
    async fn test_panic_becomes_worker_failure() {
        let pool = BatchWorkerPool::new(1).unwrap();
        let err = pool
            .execute(5, || panic!("boom"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ForecastErrorKind::WorkerFailure);
        assert!(err.to_string().contains("boom"));

        // The pool survives a panicking batch.
        assert!(pool.run(job(6, 10, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_becomes_worker_failure() {
        let pool = BatchWorkerPool::new(1)
            .unwrap()
            .with_timeout(Some(Duration::from_millis(10)));
        let err = pool
            .execute(2, || {
                std::thread::sleep(Duration::from_millis(500));
                Vec::new()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::WorkerFailure { batch: 2, .. }));
    }

    #[tokio::test]
    async fn test_queued_batches_do_not_time_out() {
        let pool = BatchWorkerPool::new(1)
            .unwrap()
            .with_timeout(Some(Duration::from_millis(300)));
        let sleeper = |sequence: usize| {
            let pool = pool.clone();
            async move {
                pool.execute(sequence, move || {
                    std::thread::sleep(Duration::from_millis(200));
                    vec![sequence as f64]
                })
                .await
            }
        };

        // Three 200 ms batches on one worker: the last waits 400 ms in the
        // queue but runs within its limit.
        let (a, b, c) = tokio::join!(sleeper(0), sleeper(1), sleeper(2));
        assert_eq!(a.unwrap(), vec![0.0]);
        assert_eq!(b.unwrap(), vec![1.0]);
        assert_eq!(c.unwrap(), vec![2.0]);
    }

    #[test]
    fn test_zero_workers_rounds_up() {
        let pool = BatchWorkerPool::new(0).unwrap();
        assert_eq!(pool.workers(), 1);
    }
}
