//! Flat-record persistence for tasks.
//!
//! One JSONL file, `records.data`, holds every task as a single
//! serde-serialized line with the fields `task` and `taskDate`. Line
//! order is insertion order and is the only ordering the store exposes.
//! Every mutating call loads the file, rewrites it atomically (temp file
//! plus rename), and releases its handle before returning.

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::task::TaskRecord;

pub const RECORDS_FILE: &str = "records.data";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Task text was empty after trimming. Recovered locally by callers;
    /// no record is created.
    #[error("task text is empty")]
    EmptyInput,

    /// The persistence layer failed. Not retried here; that policy
    /// belongs to the caller.
    #[error("task storage unavailable")]
    StorageUnavailable(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    records_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let records_path = data_dir.join(RECORDS_FILE);
        if !records_path.exists() {
            fs::write(&records_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            records = %records_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            records_path,
        })
    }

    /// Append a record. The text is trimmed before storing and must be
    /// non-empty; the date is stored verbatim, with no validation.
    /// Duplicate `(text, date)` pairs are permitted.
    #[tracing::instrument(skip(self))]
    pub fn add(&self, text: &str, date: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyInput);
        }

        let mut records = self.load()?;
        records.push(TaskRecord::new(text, date));
        self.save(&records)?;

        debug!(count = records.len(), "record appended");
        Ok(())
    }

    /// Delete every record matching both fields exactly. No match is a
    /// silent no-op. Returns the number of records removed.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, text: &str, date: &str) -> Result<usize> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| !(r.task == text && r.task_date == date));
        let removed = before - records.len();

        if removed > 0 {
            self.save(&records)?;
        }

        debug!(removed, "removed matching records");
        Ok(removed)
    }

    /// Delete every record dated strictly before `today`. Returns the
    /// number of records removed. Runs once at session start, before any
    /// partition is materialized.
    #[tracing::instrument(skip(self))]
    pub fn purge_past(&self, today: &str) -> Result<usize> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.task_date.as_str() >= today);
        let removed = before - records.len();

        if removed > 0 {
            self.save(&records)?;
        }

        info!(removed, %today, "purged past records");
        Ok(removed)
    }

    /// Count records whose date satisfies the predicate.
    pub fn count_where<P>(&self, pred: P) -> Result<usize>
    where
        P: Fn(&str) -> bool,
    {
        let records = self.load()?;
        Ok(records.iter().filter(|r| pred(&r.task_date)).count())
    }

    /// Return records whose date satisfies the predicate, in insertion
    /// order (newest appended last).
    pub fn query_where<P>(&self, pred: P) -> Result<Vec<TaskRecord>>
    where
        P: Fn(&str) -> bool,
    {
        let records = self.load()?;
        Ok(records
            .into_iter()
            .filter(|r| pred(&r.task_date))
            .collect())
    }

    fn load(&self) -> Result<Vec<TaskRecord>> {
        let file = fs::File::open(&self.records_path)?;
        let reader = BufReader::new(file);

        let mut out = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let record: TaskRecord = serde_json::from_str(trimmed).map_err(|err| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "failed parsing {} line {}: {err}",
                        self.records_path.display(),
                        idx + 1
                    ),
                )
            })?;
            out.push(record);
        }

        Ok(out)
    }

    fn save(&self, records: &[TaskRecord]) -> Result<()> {
        debug!(
            file = %self.records_path.display(),
            count = records.len(),
            "saving records atomically"
        );

        let dir = self
            .records_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        for record in records {
            let serialized = serde_json::to_string(record)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            writeln!(temp, "{serialized}")?;
        }
        temp.flush()?;

        temp.persist(&self.records_path)
            .map_err(|err| StoreError::from(err.error))?;

        Ok(())
    }
}
