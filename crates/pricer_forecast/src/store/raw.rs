//! Per-run raw output files.
//!
//! Each run writes `simulation_<index>.csv` with one row per path:
//! `row,price,change_pct`. Rows are appended in chunks as batches are
//! released, into `<name>.partial`. Only [`RawOutputWriter::commit`] renames
//! the file to its final name, so a file under a committed name is always
//! complete. An uncommitted writer deletes its partial file when dropped.
//!
//! The file index is recovered once at start-up by scanning for the highest
//! existing suffix; afterwards the in-memory counter is authoritative and
//! indices are never reused.

use crate::error::ForecastError;
use crate::stats::{percent_change, round_to};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILE_PREFIX: &str = "simulation_";
const FILE_EXTENSION: &str = ".csv";
const PARTIAL_SUFFIX: &str = ".partial";

/// Raw output column names.
pub const RAW_HEADER: [&str; 3] = ["row", "price", "change_pct"];

/// Formats a signed percentage change, e.g. `+12.34%` or `-0.50%`.
pub fn format_change(value: f64, reference: f64) -> String {
    format!("{:+.2}%", percent_change(value, reference))
}

/// Parses the index out of a committed raw file name.
pub fn parse_file_index(name: &str) -> Option<u64> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_EXTENSION)?
        .parse()
        .ok()
}

/// Directory of raw output files and the next free index.
#[derive(Debug)]
pub struct RawOutputStore {
    dir: PathBuf,
    next_index: u64,
}

impl RawOutputStore {
    /// Opens `dir`, removing leftover partial files and recovering the next
    /// file index.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut highest = 0;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if name.ends_with(PARTIAL_SUFFIX) {
                warn!(file = name, "Removing partial raw output from an interrupted run");
                fs::remove_file(entry.path())?;
                continue;
            }
            if let Some(index) = parse_file_index(name) {
                highest = highest.max(index);
            }
        }

        Ok(Self {
            dir,
            next_index: highest + 1,
        })
    }

    /// Directory holding the raw files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Index the next writer will use.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Allocates the next file index and opens a writer for it.
    ///
    /// The index is consumed even if the writer is later aborted.
    pub fn create_writer(&mut self, reference_price: f64) -> Result<RawOutputWriter, ForecastError> {
        let index = self.next_index;
        self.next_index += 1;

        let file_name = format!("{}{}{}", FILE_PREFIX, index, FILE_EXTENSION);
        let final_path = self.dir.join(&file_name);
        let partial_path = self.dir.join(format!("{}{}", file_name, PARTIAL_SUFFIX));

        let mut writer = csv::Writer::from_path(&partial_path)?;
        writer.write_record(RAW_HEADER)?;

        Ok(RawOutputWriter {
            file_name,
            final_path,
            partial_path,
            reference_price,
            writer: Some(writer),
            rows_written: 0,
            committed: false,
        })
    }
}

/// Chunked writer for one run's raw output.
pub struct RawOutputWriter {
    file_name: String,
    final_path: PathBuf,
    partial_path: PathBuf,
    reference_price: f64,
    writer: Option<csv::Writer<File>>,
    rows_written: u64,
    committed: bool,
}

impl std::fmt::Debug for RawOutputWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawOutputWriter")
            .field("file_name", &self.file_name)
            .field("rows_written", &self.rows_written)
            .field("committed", &self.committed)
            .finish()
    }
}

impl RawOutputWriter {
    /// Final file name, e.g. `simulation_7.csv`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Rows appended so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Appends one chunk of terminal prices and flushes it.
    ///
    /// Row numbers continue from the previous chunk, starting at 1.
    pub fn append_chunk(&mut self, prices: &[f64]) -> Result<(), ForecastError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ForecastError::persistence("raw output writer already closed"))?;

        let mut row = self.rows_written;
        for &price in prices {
            row += 1;
            writer.write_record(&[
                row.to_string(),
                round_to(price, 2).to_string(),
                format_change(price, self.reference_price),
            ])?;
        }
        writer.flush()?;
        self.rows_written = row;
        Ok(())
    }

    /// Syncs the file and moves it to its final name.
    pub fn commit(mut self) -> Result<String, ForecastError> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| ForecastError::persistence("raw output writer already closed"))?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| ForecastError::persistence(e.to_string()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.partial_path, &self.final_path)?;
        self.committed = true;
        debug!(file = %self.file_name, rows = self.rows_written, "Raw output committed");
        Ok(self.file_name.clone())
    }

    /// Discards the partial file.
    pub fn abort(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        self.writer.take();
        if let Err(e) = fs::remove_file(&self.partial_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(file = %self.partial_path.display(), error = %e, "Failed to remove partial raw output");
            }
        }
    }
}

impl Drop for RawOutputWriter {
    fn drop(&mut self) {
        if !self.committed {
            self.discard();
        }
    }
}
