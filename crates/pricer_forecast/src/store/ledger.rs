//! Append-only summary ledger.
//!
//! One CSV file, header written once, one row per completed run. A row is
//! serialised into memory first and handed to the OS in a single write, so
//! a crash leaves at most one torn trailing line. [`RunLedger::open`]
//! truncates such a line before anything else is appended. A write that
//! fails while the process keeps running is rolled back by
//! [`RunLedger::append`] itself.

use super::{RunLookup, RunSummary};
use crate::error::ForecastError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Ledger column names, in order.
pub const LEDGER_HEADER: [&str; 11] = [
    "run_id",
    "timestamp",
    "reference_price",
    "highest",
    "target",
    "average",
    "lowest",
    "simulations",
    "total_simulations",
    "processing_ms",
    "raw_file",
];

/// Handle on the ledger file.
#[derive(Clone, Debug)]
pub struct RunLedger {
    path: PathBuf,
}

impl RunLedger {
    /// Opens the ledger at `path`, creating it with a header if missing or
    /// empty and repairing a torn final line.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let ledger = Self { path };
        let len = fs::metadata(&ledger.path).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            ledger.write_header()?;
        } else {
            ledger.repair_tail()?;
        }
        Ok(ledger)
    }

    /// Path of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_header(&self) -> Result<(), ForecastError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(LEDGER_HEADER)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| ForecastError::persistence(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        file.sync_data()?;
        Ok(())
    }

    fn repair_tail(&self) -> Result<(), ForecastError> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        if contents.last() == Some(&b'\n') {
            return Ok(());
        }
        let keep = contents
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        warn!(
            path = %self.path.display(),
            discarded_bytes = contents.len() - keep,
            "Discarding torn trailing ledger line"
        );
        file.set_len(keep as u64)?;
        file.sync_data()?;
        drop(file);

        if keep == 0 {
            self.write_header()?;
        }
        Ok(())
    }

    /// Appends one row.
    ///
    /// On failure the file is truncated back to its previous length, so a
    /// partial row never precedes the next append.
    pub fn append(&self, summary: &RunSummary) -> Result<(), ForecastError> {
        self.append_with(summary, |file, bytes| {
            file.write_all(bytes)?;
            file.sync_data()
        })
    }

    fn append_with<W>(&self, summary: &RunSummary, write: W) -> Result<(), ForecastError>
    where
        W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.serialize(summary)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| ForecastError::persistence(e.to_string()))?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let len = file.metadata()?.len();
        if let Err(e) = write(&mut file, &bytes) {
            let rollback = file.set_len(len).and_then(|_| file.sync_data());
            if let Err(rollback_err) = rollback {
                warn!(
                    path = %self.path.display(),
                    error = %rollback_err,
                    "Failed to roll back partial ledger row"
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Returns every row in insertion order.
    pub fn read_all(&self) -> Result<Vec<RunSummary>, ForecastError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        reader
            .deserialize::<RunSummary>()
            .map(|row| row.map_err(ForecastError::from))
            .collect()
    }

    /// Looks up runs by 1-based id.
    ///
    /// Unknown ids produce [`RunLookup::NotAvailable`] in their slot; the
    /// call fails only on I/O or parse errors.
    pub fn read_by_ids(&self, ids: &[u64]) -> Result<Vec<RunLookup>, ForecastError> {
        let rows = self.read_all()?;
        Ok(ids
            .iter()
            .map(|&id| {
                id.checked_sub(1)
                    .and_then(|i| rows.get(i as usize))
                    .cloned()
                    .map(RunLookup::Found)
                    .unwrap_or(RunLookup::NotAvailable { run_id: id })
            })
            .collect())
    }
}
