//! Batch timeouts on a shared pool.

use pricer_forecast::pool::BatchWorkerPool;
use pricer_forecast::ForecastError;
use std::time::Duration;

fn sleeping_batch(
    pool: &BatchWorkerPool,
    sequence: usize,
    millis: u64,
) -> impl std::future::Future<Output = Result<Vec<f64>, ForecastError>> {
    let pool = pool.clone();
    async move {
        pool.execute(sequence, move || {
            std::thread::sleep(Duration::from_millis(millis));
            vec![sequence as f64; 4]
        })
        .await
    }
}

#[tokio::test]
async fn test_only_the_overrunning_batch_fails() {
    let pool = BatchWorkerPool::new(1)
        .unwrap()
        .with_timeout(Some(Duration::from_millis(300)));

    let (first, slow, last) = tokio::join!(
        sleeping_batch(&pool, 0, 100),
        sleeping_batch(&pool, 1, 1_000),
        sleeping_batch(&pool, 2, 100),
    );

    assert_eq!(first.unwrap(), vec![0.0; 4]);
    assert!(matches!(slow, Err(ForecastError::WorkerFailure { batch: 1, .. })));
    // Queued behind the abandoned batch, then ran within its limit.
    assert_eq!(last.unwrap(), vec![2.0; 4]);
}

#[tokio::test]
async fn test_pool_serves_after_timeout() {
    let pool = BatchWorkerPool::new(2)
        .unwrap()
        .with_timeout(Some(Duration::from_millis(50)));

    let err = sleeping_batch(&pool, 7, 400).await.unwrap_err();
    assert!(matches!(err, ForecastError::WorkerFailure { batch: 7, .. }));
    assert!(err.to_string().contains("timed out"));

    let prices = sleeping_batch(&pool, 8, 0).await.unwrap();
    assert_eq!(prices, vec![8.0; 4]);
}
