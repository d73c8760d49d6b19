//! Run Log Store.
//!
//! Persisted state lives in one directory:
//!
//! ```text
//! <data_dir>/
//! ├── simulation_log.csv      (summary ledger, one row per run)
//! └── runs/
//!     ├── simulation_1.csv    (raw output of one run)
//!     └── simulation_2.csv
//! ```
//!
//! [`RunLog`] is the single writer. It is opened once per process; the scan
//! performed by [`RunLog::open`] recovers the last run id, the cumulative
//! simulation count and the next raw file index, and from then on those
//! counters are only advanced in memory.

mod ledger;
mod raw;

pub use ledger::{RunLedger, LEDGER_HEADER};
pub use raw::{format_change, parse_file_index, RawOutputStore, RawOutputWriter, RAW_HEADER};

use crate::error::ForecastError;
use crate::stats::{round_to, RunStatistics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the summary ledger.
pub const LEDGER_FILE: &str = "simulation_log.csv";

/// Sub-directory holding raw output files.
pub const RAW_DIR: &str = "runs";

/// One persisted ledger row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Strictly increasing, gapless, starting at 1.
    pub run_id: u64,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Price the run started from.
    pub reference_price: f64,
    /// Highest terminal price.
    pub highest: f64,
    /// Mean plus one standard deviation.
    pub target: f64,
    /// Mean terminal price.
    pub average: f64,
    /// Lowest terminal price.
    pub lowest: f64,
    /// Simulations in this run.
    pub simulations: u64,
    /// Simulations across all runs up to and including this one.
    pub total_simulations: u64,
    /// Wall-clock processing time.
    pub processing_ms: u64,
    /// Raw output file of this run.
    pub raw_file: String,
}

/// Result of looking up one run id.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunLookup {
    /// The run exists.
    Found(RunSummary),
    /// No run with this id.
    NotAvailable {
        /// The requested id.
        run_id: u64,
    },
}

/// Everything needed to record a run except the fields the log allocates.
#[derive(Clone, Debug)]
pub struct RunEntry {
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Reference price.
    pub reference_price: f64,
    /// Statistics over the run's terminal prices.
    pub statistics: RunStatistics,
    /// Wall-clock processing time.
    pub processing_ms: u64,
    /// Committed raw output file name.
    pub raw_file: String,
}

/// Single writer over the ledger and the raw output directory.
#[derive(Debug)]
pub struct RunLog {
    ledger: RunLedger,
    raw: RawOutputStore,
    last_run_id: u64,
    total_simulations: u64,
}

impl RunLog {
    /// Opens (or creates) the store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let dir = dir.as_ref();
        let ledger = RunLedger::open(dir.join(LEDGER_FILE))?;
        let raw = RawOutputStore::open(dir.join(RAW_DIR))?;

        let rows = ledger.read_all()?;
        let (last_run_id, total_simulations) = rows
            .last()
            .map(|r| (r.run_id, r.total_simulations))
            .unwrap_or((0, 0));

        info!(
            dir = %dir.display(),
            runs = rows.len(),
            last_run_id,
            total_simulations,
            next_file_index = raw.next_index(),
            "Run log opened"
        );

        Ok(Self {
            ledger,
            raw,
            last_run_id,
            total_simulations,
        })
    }

    /// Id of the most recent persisted run, 0 if none.
    pub fn last_run_id(&self) -> u64 {
        self.last_run_id
    }

    /// Cumulative simulations across all persisted runs.
    pub fn total_simulations(&self) -> u64 {
        self.total_simulations
    }

    /// Directory holding raw output files.
    pub fn raw_dir(&self) -> PathBuf {
        self.raw.dir().to_path_buf()
    }

    /// Path of the ledger file.
    pub fn ledger_path(&self) -> &Path {
        self.ledger.path()
    }

    /// Opens a raw output writer under the next file index.
    pub fn begin_raw(&mut self, reference_price: f64) -> Result<RawOutputWriter, ForecastError> {
        self.raw.create_writer(reference_price)
    }

    /// Appends a ledger row for a completed run.
    ///
    /// The run id and cumulative count are allocated here and the in-memory
    /// counters advance only after the row is on disk.
    pub fn record(&mut self, entry: RunEntry) -> Result<RunSummary, ForecastError> {
        let simulations = entry.statistics.count as u64;
        let summary = RunSummary {
            run_id: self.last_run_id + 1,
            timestamp: entry.timestamp,
            reference_price: round_to(entry.reference_price, 2),
            highest: round_to(entry.statistics.highest, 2),
            target: round_to(entry.statistics.target, 2),
            average: round_to(entry.statistics.average, 2),
            lowest: round_to(entry.statistics.lowest, 2),
            simulations,
            total_simulations: self.total_simulations + simulations,
            processing_ms: entry.processing_ms,
            raw_file: entry.raw_file,
        };

        self.ledger.append(&summary)?;
        self.last_run_id = summary.run_id;
        self.total_simulations = summary.total_simulations;
        Ok(summary)
    }

    /// Every persisted run, oldest first.
    pub fn read_all(&self) -> Result<Vec<RunSummary>, ForecastError> {
        self.ledger.read_all()
    }

    /// Per-id lookup; see [`RunLedger::read_by_ids`].
    pub fn read_by_ids(&self, ids: &[u64]) -> Result<Vec<RunLookup>, ForecastError> {
        self.ledger.read_by_ids(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prices: &[f64], raw_file: &str) -> RunEntry {
        RunEntry {
            timestamp: Utc::now(),
            reference_price: 100.0,
            statistics: RunStatistics::from_prices(prices).unwrap(),
            processing_ms: 5,
            raw_file: raw_file.to_string(),
        }
    }

    #[test]
    fn test_record_allocates_ids_and_totals() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::open(dir.path()).unwrap();

        let first = log.record(entry(&[1.0, 2.0, 3.0], "simulation_1.csv")).unwrap();
        let second = log.record(entry(&[4.0, 5.0], "simulation_2.csv")).unwrap();

        assert_eq!(first.run_id, 1);
        assert_eq!(first.total_simulations, 3);
        assert_eq!(second.run_id, 2);
        assert_eq!(second.total_simulations, 5);
        assert_eq!(log.last_run_id(), 2);
    }

    #[test]
    fn test_counters_recovered_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = RunLog::open(dir.path()).unwrap();
            log.record(entry(&[1.0, 2.0], "simulation_1.csv")).unwrap();
            log.record(entry(&[1.0], "simulation_2.csv")).unwrap();
        }

        let mut log = RunLog::open(dir.path()).unwrap();
        assert_eq!(log.last_run_id(), 2);
        assert_eq!(log.total_simulations(), 3);

        let third = log.record(entry(&[7.0], "simulation_3.csv")).unwrap();
        assert_eq!(third.run_id, 3);
        assert_eq!(third.total_simulations, 4);
    }

    #[test]
    fn test_raw_writer_uses_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::open(dir.path()).unwrap();
        let mut writer = log.begin_raw(100.0).unwrap();
        writer.append_chunk(&[100.0]).unwrap();
        let name = writer.commit().unwrap();
        assert!(dir.path().join(RAW_DIR).join(name).exists());
    }
}
