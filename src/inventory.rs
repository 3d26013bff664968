//! Decoding of snapshot/backup pairs from a backup inventory.
//!
//! The inventory is a sequence of records, one per line, each a list of
//! shell-quoted `key=value` tokens:
//!
//! ```text
//! snapshot_path='/mnt/pool/_snap/home.20240101' target_path='/mnt/backup/home.20240101' target_host='nas'
//! ```
//!
//! Records are decoded, never evaluated. Unknown keys are ignored so that a
//! lister may emit more fields than are needed here.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("Invalid lister command {0:?}")]
    InvalidCommand(String),
    #[error("Failed to run lister {command:?}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Lister {command:?} exited with {status}")]
    ListerFailed { command: String, status: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pair {
    pub snapshot_path: Option<String>,
    pub source_host: Option<String>,
    pub target_path: Option<String>,
    pub target_host: Option<String>,
    pub source_rsh: Option<String>,
}

impl Pair {
    /// Snapshot address in rsync's `host:path` form.
    ///
    /// An absent path renders as an empty string, keeping the host prefix.
    pub fn source_address(&self) -> String {
        address(self.source_host.as_deref(), self.snapshot_path.as_deref())
    }

    /// Backup address in rsync's `host:path` form.
    pub fn target_address(&self) -> String {
        address(self.target_host.as_deref(), self.target_path.as_deref())
    }

    pub fn is_remote(&self) -> bool {
        self.source_host.is_some() || self.target_host.is_some()
    }
}

fn address(host: Option<&str>, path: Option<&str>) -> String {
    let path = path.unwrap_or_default();
    match host {
        Some(host) => format!("{}:{}", host, path),
        None => path.to_string(),
    }
}

/// Which pairs the lister should report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Only the most recent snapshot/backup of each subvolume.
    #[default]
    Latest,
    /// Every backup that still has a matching snapshot.
    All,
}

impl Scope {
    pub fn lister_subcommand(&self) -> &'static str {
        match self {
            Scope::Latest => "latest",
            Scope::All => "backups",
        }
    }
}

/// Decode one record. Returns `Ok(None)` for blank lines and comments.
pub fn parse_record(line: &str) -> Result<Option<Pair>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let tokens = shell_words::split(trimmed).map_err(|e| e.to_string())?;
    let mut pair = Pair::default();

    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got {:?}", token))?;

        let value = Some(value.to_string()).filter(|v| !v.is_empty());
        match key {
            "snapshot_path" => pair.snapshot_path = value,
            "source_host" => pair.source_host = value,
            "target_path" => pair.target_path = value,
            "target_host" => pair.target_host = value,
            "source_rsh" => pair.source_rsh = value,
            "" => return Err(format!("empty key in {:?}", token)),
            other => debug!("Ignoring inventory field {}", other),
        }
    }

    Ok(Some(pair))
}

/// Decode every record from `reader`, in order.
pub fn parse_inventory<R: Read>(reader: R) -> Result<Vec<Pair>, InventoryError> {
    let mut pairs = Vec::new();

    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        match parse_record(&line) {
            Ok(Some(pair)) => pairs.push(pair),
            Ok(None) => {}
            Err(message) => {
                return Err(InventoryError::Malformed {
                    line: idx + 1,
                    message,
                });
            }
        }
    }

    Ok(pairs)
}

/// Run an external lister and decode its output.
///
/// `command` is split like a shell would; the scope's sub-command and any
/// `filters` are appended.
pub fn run_lister(
    command: &str,
    scope: Scope,
    filters: &[String],
) -> Result<Vec<Pair>, InventoryError> {
    let words = shell_words::split(command)
        .map_err(|_| InventoryError::InvalidCommand(command.to_string()))?;
    let (program, args) = words
        .split_first()
        .ok_or_else(|| InventoryError::InvalidCommand(command.to_string()))?;

    debug!(
        "Running lister: {} {} {}",
        command,
        scope.lister_subcommand(),
        shell_words::join(filters)
    );

    let output = Command::new(program)
        .args(args)
        .arg(scope.lister_subcommand())
        .args(filters)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|source| InventoryError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(InventoryError::ListerFailed {
            command: command.to_string(),
            status: output.status.to_string(),
        });
    }

    parse_inventory(output.stdout.as_slice())
}
