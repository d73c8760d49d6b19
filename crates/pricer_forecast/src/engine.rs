//! Simulation Orchestrator.
//!
//! [`ForecastEngine`] owns everything a run touches: the price source, the
//! worker pool, the run log and the overview cache. One run proceeds as:
//!
//! 1. validate the request
//! 2. obtain the reference price (pinned, or from the [`PriceSource`])
//! 3. partition the simulation count into batches
//! 4. dispatch every batch to the worker pool; merge results in sequence
//!    order and append each released chunk to the raw output file
//! 5. aggregate statistics
//! 6. commit the raw file and append the ledger row (run id allocated here)
//! 7. swap the new overview into the cache
//!
//! At most one run is in flight per engine. Callers arriving while a run is
//! in flight wait for that run and receive its outcome. The run executes in
//! its own task, so a caller that stops waiting never leaves a run half
//! persisted.

use crate::batch::{BatchMerger, BatchPlan};
use crate::cache::{OverviewCache, OverviewSnapshot, RunDetails};
use crate::config::EngineConfig;
use crate::error::ForecastError;
use crate::pool::{BatchJob, BatchWorkerPool};
use crate::request::SimulationRequest;
use crate::rng::derive_seed;
use crate::sampler::RandomWalk;
use crate::source::PriceSource;
use crate::stats::{Overview, PricePoint, RunStatistics};
use crate::store::{RawOutputWriter, RunEntry, RunLog, RunLookup, RunSummary};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome delivered to every caller of one run.
pub type RunOutcome = Result<Arc<OverviewSnapshot>, ForecastError>;

/// Engine run state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Idle; the last run (if any) succeeded.
    #[default]
    Ok,
    /// A run is in flight.
    Processing,
    /// Idle; the last run failed.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Ok => write!(f, "OK"),
            RunStatus::Processing => write!(f, "PROCESSING"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Cached overview plus engine-level details.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
    /// Latest overview.
    pub overview: Overview,
    /// Run behind the overview.
    pub details: RunDetails,
    /// Seconds since the engine was opened.
    pub uptime_secs: u64,
    /// Current run state.
    pub status: RunStatus,
}

/// Cheaply cloneable handle on one engine instance.
#[derive(Clone)]
pub struct ForecastEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    source: Arc<dyn PriceSource>,
    log: Arc<Mutex<RunLog>>,
    cache: OverviewCache,
    status: Mutex<RunStatus>,
    in_flight: Mutex<Option<watch::Receiver<Option<RunOutcome>>>>,
    pool: BatchWorkerPool,
    run_count: AtomicU64,
    total_simulations: AtomicU64,
    started: Instant,
}

impl std::fmt::Debug for ForecastEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastEngine")
            .field("source", &self.inner.source.name())
            .field("data_dir", &self.inner.config.data_dir)
            .field("run_count", &self.run_count())
            .field("status", &self.status())
            .finish()
    }
}

impl ForecastEngine {
    /// Opens the run log under `config.data_dir` and recovers the counters.
    ///
    /// This is the only time the store is scanned; afterwards the engine's
    /// in-memory counters are authoritative.
    pub fn open(config: EngineConfig, source: Arc<dyn PriceSource>) -> Result<Self, ForecastError> {
        config
            .validate()
            .map_err(|e| ForecastError::validation("config", e.to_string()))?;
        let log = RunLog::open(&config.data_dir)?;
        let pool = BatchWorkerPool::new(config.max_workers)?.with_timeout(config.batch_timeout());
        let run_count = log.last_run_id();
        let total_simulations = log.total_simulations();

        info!(
            source = source.name(),
            data_dir = %config.data_dir.display(),
            run_count,
            total_simulations,
            pool_workers = pool.workers(),
            "Forecast engine opened"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                source,
                log: Arc::new(Mutex::new(log)),
                cache: OverviewCache::new(),
                status: Mutex::new(RunStatus::Ok),
                in_flight: Mutex::new(None),
                pool,
                run_count: AtomicU64::new(run_count),
                total_simulations: AtomicU64::new(total_simulations),
                started: Instant::now(),
            }),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Request built from the configuration.
    pub fn default_request(&self) -> SimulationRequest {
        self.inner.config.default_request()
    }

    /// Current run state.
    pub fn status(&self) -> RunStatus {
        *self.inner.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs persisted so far, including those recovered at start-up.
    pub fn run_count(&self) -> u64 {
        self.inner.run_count.load(Ordering::Acquire)
    }

    /// Simulations across all persisted runs.
    pub fn total_simulations(&self) -> u64 {
        self.inner.total_simulations.load(Ordering::Acquire)
    }

    /// Time since [`open`](Self::open).
    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Latest cached snapshot without triggering a run.
    pub fn cached_overview(&self) -> Option<Arc<OverviewSnapshot>> {
        self.inner.cache.load()
    }

    /// Latest overview, running the default request first if no run has
    /// completed since the engine was opened.
    ///
    /// While a run is in flight the previous snapshot is returned
    /// immediately.
    pub async fn overview(&self) -> Result<OverviewReport, ForecastError> {
        let snapshot = match self.inner.cache.load() {
            Some(snapshot) => snapshot,
            None => {
                debug!("No cached overview, running first simulation");
                self.run_simulation(self.default_request()).await?
            }
        };
        Ok(OverviewReport {
            overview: snapshot.overview,
            details: snapshot.details.clone(),
            uptime_secs: self.uptime().as_secs(),
            status: self.status(),
        })
    }

    /// Runs one simulation, or joins the run already in flight.
    ///
    /// A joining caller receives the in-flight run's outcome even if its own
    /// request differs.
    ///
    /// # Errors
    ///
    /// Every [`ForecastError`] kind; see [`ForecastErrorKind`](crate::ForecastErrorKind).
    /// On error nothing is persisted and the cache keeps its previous value.
    pub async fn run_simulation(&self, request: SimulationRequest) -> RunOutcome {
        request.validate()?;
        request.validate_limits(self.inner.config.max_simulations, self.inner.config.max_workers)?;

        let mut rx = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(rx) => {
                    debug!("Joining in-flight run");
                    rx.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx.clone());
                    self.set_status(RunStatus::Processing);

                    let engine = self.clone();
                    tokio::spawn(async move {
                        let mut guard = InFlightGuard {
                            engine: engine.clone(),
                            tx,
                            outcome: None,
                        };
                        guard.outcome = Some(engine.execute_run(request).await);
                    });
                    rx
                }
            }
        };

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ForecastError::worker(0, "run task ended without a result"))?
            .clone();
        outcome.unwrap_or_else(|| Err(ForecastError::worker(0, "run task ended without a result")))
    }

    /// Every persisted run, oldest first.
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>, ForecastError> {
        self.with_log(|log| log.read_all()).await
    }

    /// Looks up runs by 1-based id; unknown ids are marked, not rejected.
    pub async fn runs_by_ids(&self, ids: Vec<u64>) -> Result<Vec<RunLookup>, ForecastError> {
        self.with_log(move |log| log.read_by_ids(&ids)).await
    }

    fn set_status(&self, status: RunStatus) {
        *self.inner.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Runs `f` against the run log on the blocking thread pool.
    async fn with_log<T, F>(&self, f: F) -> Result<T, ForecastError>
    where
        F: FnOnce(&mut RunLog) -> Result<T, ForecastError> + Send + 'static,
        T: Send + 'static,
    {
        let log = Arc::clone(&self.inner.log);
        blocking(move || {
            let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *log)
        })
        .await
    }

    async fn execute_run(&self, request: SimulationRequest) -> RunOutcome {
        let started = Instant::now();
        info!(
            volatility = request.volatility,
            horizon_days = request.horizon_days,
            simulations = request.simulations,
            workers = request.workers,
            "Simulation run started"
        );

        match self.simulate_and_persist(&request, started).await {
            Ok(snapshot) => {
                let snapshot = self.inner.cache.store(snapshot);
                info!(
                    run_id = snapshot.details.run_id,
                    simulations = snapshot.details.simulations,
                    total_simulations = snapshot.details.total_simulations,
                    elapsed_ms = snapshot.details.processing_ms,
                    "Simulation run completed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Simulation run failed");
                Err(e)
            }
        }
    }

    async fn simulate_and_persist(
        &self,
        request: &SimulationRequest,
        started: Instant,
    ) -> Result<OverviewSnapshot, ForecastError> {
        let reference_price = self.reference_price(request).await?;
        let plan = BatchPlan::partition(request.simulations, self.inner.config.batch_size);

        let next_run_id = self.run_count() + 1;
        let base_seed = self.inner.config.seed.unwrap_or_else(rand::random);
        let run_seed = derive_seed(base_seed, next_run_id);
        let walk = RandomWalk::new(reference_price, request.volatility, request.horizon_days);

        let mut writer = self.with_log(move |log| log.begin_raw(reference_price)).await?;

        // The pool is sized for the largest request; permits cap this run
        // at its own worker count.
        let permits = Arc::new(Semaphore::new(request.workers));
        let mut batches = JoinSet::new();
        for (sequence, &size) in plan.sizes().iter().enumerate() {
            let pool = self.inner.pool.clone();
            let permits = Arc::clone(&permits);
            let job = BatchJob {
                sequence,
                size,
                walk,
                seed: derive_seed(run_seed, sequence as u64),
            };
            batches.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| ForecastError::worker(sequence, "worker permits closed"))?;
                pool.run(job).await
            });
        }

        let mut merger = BatchMerger::new(plan.len());
        let mut prices = Vec::with_capacity(plan.total());
        while let Some(joined) = batches.join_next().await {
            let output = joined
                .map_err(|e| ForecastError::worker(merger.released(), e.to_string()))
                .and_then(|result| result);
            let output = match output {
                Ok(output) => output,
                Err(e) => {
                    batches.abort_all();
                    writer.abort();
                    return Err(e);
                }
            };
            debug!(batch = output.sequence, paths = output.prices.len(), "Batch completed");

            for (_, chunk) in merger.accept(output.sequence, output.prices) {
                prices.extend_from_slice(&chunk);
                writer = append_chunk(writer, chunk).await?;
            }
        }

        let statistics = RunStatistics::from_prices(&prices)
            .ok_or_else(|| ForecastError::worker(0, "run produced no prices"))?;

        let summary = self
            .with_log(move |log| {
                let raw_file = writer.commit()?;
                let entry = RunEntry {
                    timestamp: Utc::now(),
                    reference_price,
                    statistics,
                    processing_ms: started.elapsed().as_millis() as u64,
                    raw_file: raw_file.clone(),
                };
                log.record(entry).inspect_err(|_| {
                    let orphan = log.raw_dir().join(&raw_file);
                    if let Err(e) = std::fs::remove_file(&orphan) {
                        warn!(file = %orphan.display(), error = %e, "Failed to remove unrecorded raw output");
                    }
                })
            })
            .await?;

        self.inner.run_count.store(summary.run_id, Ordering::Release);
        self.inner
            .total_simulations
            .store(summary.total_simulations, Ordering::Release);

        Ok(OverviewSnapshot {
            overview: overview_of(&summary),
            details: RunDetails {
                run_id: summary.run_id,
                simulations: summary.simulations,
                total_simulations: summary.total_simulations,
                processing_ms: summary.processing_ms,
                run_count: summary.run_id,
                completed_at: summary.timestamp,
                raw_file: summary.raw_file,
            },
        })
    }

    async fn reference_price(&self, request: &SimulationRequest) -> Result<f64, ForecastError> {
        if let Some(price) = request.start_price {
            return Ok(price);
        }
        let price = self.inner.source.current_price().await?;
        if price.is_finite() && price > 0.0 {
            Ok(price)
        } else {
            Err(ForecastError::source_unavailable(format!(
                "{} returned a non-positive price: {}",
                self.inner.source.name(),
                price
            )))
        }
    }
}

/// Builds the served overview from a persisted row, so the served
/// percentages recompute exactly from the stored values.
fn overview_of(summary: &RunSummary) -> Overview {
    let reference = summary.reference_price;
    Overview {
        current: PricePoint::relative_to(reference, reference),
        highest: PricePoint::relative_to(summary.highest, reference),
        target: PricePoint::relative_to(summary.target, reference),
        average: PricePoint::relative_to(summary.average, reference),
        lowest: PricePoint::relative_to(summary.lowest, reference),
    }
}

async fn append_chunk(
    mut writer: RawOutputWriter,
    chunk: Vec<f64>,
) -> Result<RawOutputWriter, ForecastError> {
    blocking(move || {
        writer.append_chunk(&chunk)?;
        Ok(writer)
    })
    .await
}

async fn blocking<T, F>(f: F) -> Result<T, ForecastError>
where
    F: FnOnce() -> Result<T, ForecastError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ForecastError::persistence(format!("storage task failed: {}", e)))?
}

/// Publishes the run outcome and clears the in-flight slot, including when
/// the run task unwinds.
struct InFlightGuard {
    engine: ForecastEngine,
    tx: watch::Sender<Option<RunOutcome>>,
    outcome: Option<RunOutcome>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Err(ForecastError::worker(0, "run task aborted")));
        let status = if outcome.is_ok() {
            RunStatus::Ok
        } else {
            RunStatus::Failed
        };

        *self
            .engine
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.engine.set_status(status);
        // No receivers left is fine; the outcome is already in the cache.
        let _ = self.tx.send(Some(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastErrorKind;
    use crate::source::FixedPriceSource;

    fn engine(dir: &std::path::Path, price: f64) -> ForecastEngine {
        let config = EngineConfig {
            data_dir: dir.to_path_buf(),
            simulations: 200,
            batch_size: 64,
            workers: 2,
            seed: Some(11),
            ..EngineConfig::default()
        };
        ForecastEngine::open(config, Arc::new(FixedPriceSource::new(price))).unwrap()
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), 100.0);
        assert_eq!(engine.status(), RunStatus::Ok);

        engine.run_simulation(engine.default_request()).await.unwrap();
        assert_eq!(engine.status(), RunStatus::Ok);
        assert_eq!(engine.run_count(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_source_price_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), 0.0);

        let err = engine.run_simulation(engine.default_request()).await.unwrap_err();
        assert_eq!(err.kind(), ForecastErrorKind::SourceUnavailable);
        assert_eq!(engine.status(), RunStatus::Failed);
        assert!(engine.cached_overview().is_none());
    }

    #[tokio::test]
    async fn test_pinned_price_skips_source() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), -1.0);

        let request = engine.default_request().with_start_price(250.0);
        let snapshot = engine.run_simulation(request).await.unwrap();
        assert_eq!(snapshot.overview.current.value, 250.0);
    }

    #[tokio::test]
    async fn test_worker_counts_share_one_bounded_pool() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            simulations: 100,
            batch_size: 10,
            workers: 2,
            max_workers: 3,
            seed: Some(5),
            ..EngineConfig::default()
        };
        let engine = ForecastEngine::open(config, Arc::new(FixedPriceSource::new(100.0))).unwrap();

        for workers in 1..=3 {
            let request = SimulationRequest::new(0.2, 10, 100, workers);
            engine.run_simulation(request).await.unwrap();
        }
        assert_eq!(engine.inner.pool.workers(), 3);

        for workers in [4, 500] {
            let request = SimulationRequest::new(0.2, 10, 100, workers);
            let err = engine.run_simulation(request).await.unwrap_err();
            assert!(matches!(err, ForecastError::Validation { field: "workers", .. }));
        }
        assert_eq!(engine.inner.pool.workers(), 3);
        assert_eq!(engine.run_count(), 3);
        assert_eq!(engine.status(), RunStatus::Ok);
    }

    #[tokio::test]
    async fn test_oversized_simulation_count_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            simulations: 100,
            max_simulations: 1_000,
            ..EngineConfig::default()
        };
        let engine = ForecastEngine::open(config, Arc::new(FixedPriceSource::new(100.0))).unwrap();

        let err = engine
            .run_simulation(SimulationRequest::new(0.2, 1, 1usize << 60, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Validation { field: "simulations", .. }));
        assert_eq!(engine.status(), RunStatus::Ok);
        assert_eq!(engine.run_count(), 0);

        let snapshot = engine
            .run_simulation(SimulationRequest::new(0.2, 1, 1_000, 1))
            .await
            .unwrap();
        assert_eq!(snapshot.details.simulations, 1_000);
    }

    #[test]
    fn test_overview_recomputes_from_row() {
        let summary = RunSummary {
            run_id: 1,
            timestamp: Utc::now(),
            reference_price: 200.0,
            highest: 300.0,
            target: 250.0,
            average: 210.0,
            lowest: 150.0,
            simulations: 10,
            total_simulations: 10,
            processing_ms: 3,
            raw_file: "simulation_1.csv".to_string(),
        };
        let overview = overview_of(&summary);
        assert_eq!(overview.highest.change_pct, 50.0);
        assert_eq!(overview.lowest.change_pct, -25.0);
        assert_eq!(overview.average.change_pct, 5.0);
    }
}
