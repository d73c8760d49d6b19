//! Periodic run trigger.

use crate::engine::ForecastEngine;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Runs the engine's default request every `period`, starting immediately.
///
/// A slow run delays the following tick instead of queueing a burst. A tick
/// that lands while another run is in flight joins that run. Failures are
/// logged and the timer keeps going; abort the returned handle to stop it.
pub fn spawn_scheduler(engine: ForecastEngine, period: Duration) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "Run scheduler started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = engine.run_simulation(engine.default_request()).await {
                warn!(kind = %e.kind(), error = %e, "Scheduled run failed");
            }
        }
    })
}
