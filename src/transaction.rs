//! Append-only record of every verification attempt.
//!
//! Entries follow the transaction log layout used by backup tooling:
//!
//! ```text
//! 2024-01-01T03:00:00+0100 check-rsync starting /backup/home.20240101 /snap/home.20240101 - -
//! ```

use chrono::{DateTime, Local};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";
const ACTION: &str = "check-rsync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Starting,
    DryrunStarting,
    Success,
    Fail,
    Error,
}

impl TxStatus {
    pub fn token(&self) -> &'static str {
        match self {
            TxStatus::Starting => "starting",
            TxStatus::DryrunStarting => "dryrun_starting",
            TxStatus::Success => "success",
            TxStatus::Fail => "fail",
            TxStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEntry {
    pub timestamp: DateTime<Local>,
    pub status: TxStatus,
    pub dest: String,
    pub src: String,
}

impl fmt::Display for TransactionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} - -",
            self.timestamp.format(TIMESTAMP_FORMAT),
            ACTION,
            self.status.token(),
            self.dest,
            self.src
        )
    }
}

#[derive(Debug, Default)]
pub struct TransactionLog {
    entries: Vec<TransactionEntry>,
    sink: Option<File>,
    sink_failed: bool,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append every entry to `path` as it is recorded.
    pub fn with_file(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(TransactionLog {
            sink: Some(file),
            ..Self::default()
        })
    }

    pub fn record(&mut self, status: TxStatus, dest: &str, src: &str) {
        let entry = TransactionEntry {
            timestamp: Local::now(),
            status,
            dest: dest.to_string(),
            src: src.to_string(),
        };

        if let Some(file) = self.sink.as_mut()
            && !self.sink_failed
            && let Err(e) = writeln!(file, "{}", entry).and_then(|()| file.flush())
        {
            warn!("Failed to write transaction log: {}", e);
            self.sink_failed = true;
        }

        self.entries.push(entry);
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[TransactionEntry] {
        &self.entries
    }

    /// Log every recorded entry, oldest first.
    pub fn replay(&self) {
        for entry in &self.entries {
            info!("{}", entry);
        }
    }
}
