//! Overview Cache.
//!
//! A single slot holding the latest [`OverviewSnapshot`]. Writers build a
//! complete snapshot and swap the `Arc` in under a short write lock; readers
//! clone the `Arc` under a read lock. A reader therefore sees either the old
//! snapshot or the new one, never a mix.

use crate::stats::Overview;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Metadata of the run behind a cached overview.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetails {
    /// Id of the run.
    pub run_id: u64,
    /// Simulations in the run.
    pub simulations: u64,
    /// Simulations across all runs so far.
    pub total_simulations: u64,
    /// Processing time of the run.
    pub processing_ms: u64,
    /// Runs persisted so far.
    pub run_count: u64,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
    /// Raw output file of the run.
    pub raw_file: String,
}

/// Overview of one run plus its details.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewSnapshot {
    /// Prices relative to the run's reference price.
    pub overview: Overview,
    /// Run metadata.
    pub details: RunDetails,
}

/// Latest-overview slot.
#[derive(Debug, Default)]
pub struct OverviewCache {
    slot: RwLock<Option<Arc<OverviewSnapshot>>>,
}

impl OverviewCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if any run has completed.
    pub fn load(&self) -> Option<Arc<OverviewSnapshot>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the snapshot wholesale.
    pub fn store(&self, snapshot: OverviewSnapshot) -> Arc<OverviewSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// `true` until the first successful run.
    pub fn is_empty(&self) -> bool {
        self.load().is_none()
    }
}
