//! Building and running the rsync comparison.
//!
//! rsync is always run with `--dry-run --checksum --itemize-changes`, so it
//! never transfers anything; its itemized output on stdout is the list of
//! differences between the snapshot and the backup.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DiffRunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Failed to read rsync output: {0}")]
    Read(std::io::Error),
    #[error("Failed to wait for rsync: {0}")]
    Wait(std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncOptions {
    pub program: PathBuf,
    pub acls: bool,
    pub xattrs: bool,
    /// Ask rsync for its trailing statistics block.
    pub stats: bool,
    /// Passed through verbatim before the endpoints.
    pub extra_args: Vec<String>,
}

impl Default for RsyncOptions {
    fn default() -> Self {
        RsyncOptions {
            program: PathBuf::from("rsync"),
            acls: true,
            xattrs: true,
            stats: false,
            extra_args: Vec::new(),
        }
    }
}

/// A fully resolved rsync command line for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RsyncInvocation {
    /// `source` and `target` are endpoint addresses (`[host:]path`); a
    /// trailing slash is added so rsync compares directory contents.
    pub fn new(
        options: &RsyncOptions,
        remote_shell: Option<&str>,
        source: &str,
        target: &str,
    ) -> Self {
        let mut args: Vec<String> = [
            "--itemize-changes",
            "--checksum",
            "--dry-run",
            "--archive",
            "--delete",
            "--numeric-ids",
            "--hard-links",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if options.acls {
            args.push("--acls".to_string());
        }
        if options.xattrs {
            args.push("--xattrs".to_string());
        }
        if options.stats {
            args.push("--stats".to_string());
        }
        if let Some(rsh) = remote_shell {
            args.push("-e".to_string());
            args.push(rsh.to_string());
        }

        args.extend(options.extra_args.iter().cloned());
        args.push(with_trailing_slash(source));
        args.push(with_trailing_slash(target));

        RsyncInvocation {
            program: options.program.clone(),
            args,
        }
    }

    /// Shell-quoted rendering for logs.
    pub fn display(&self) -> String {
        let program = self.program.to_string_lossy();
        let mut words: Vec<&str> = vec![&*program];
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

fn with_trailing_slash(address: &str) -> String {
    if address.ends_with('/') {
        address.to_string()
    } else {
        format!("{}/", address)
    }
}

/// How the comparison process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffExit {
    /// `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

impl DiffExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a comparison and streams its output, one line at a time, into `on_line`.
pub trait DiffRunner {
    fn run(
        &mut self,
        invocation: &RsyncInvocation,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<DiffExit, DiffRunError>;
}

/// Runs the real rsync binary.
#[derive(Debug, Default)]
pub struct RsyncRunner;

impl DiffRunner for RsyncRunner {
    fn run(
        &mut self,
        invocation: &RsyncInvocation,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<DiffExit, DiffRunError> {
        debug!("Running {}", invocation.display());

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| DiffRunError::Spawn {
                program: invocation.program.display().to_string(),
                source,
            })?;

        let read_result = match child.stdout.take() {
            Some(stdout) => stream_lines(BufReader::new(stdout), on_line),
            None => Ok(()),
        };

        // Reap the child even when reading failed so it doesn't linger.
        let status = child.wait().map_err(DiffRunError::Wait)?;
        read_result?;

        Ok(DiffExit {
            code: status.code(),
        })
    }
}

/// Feed every newline-terminated line of `reader` to `on_line`.
///
/// Paths are not guaranteed to be UTF-8, so lines are decoded lossily; the
/// classifier only compares the ASCII flag prefix.
pub(crate) fn stream_lines<R: BufRead>(
    mut reader: R,
    on_line: &mut dyn FnMut(&str),
) -> Result<(), DiffRunError> {
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .map_err(DiffRunError::Read)?;
        if read == 0 {
            return Ok(());
        }

        if buffer.last() == Some(&b'\n') {
            buffer.pop();
        }
        on_line(&String::from_utf8_lossy(&buffer));
    }
}

/// Stand-in used in dry-run mode: never starts a process, produces no
/// output and always succeeds.
#[derive(Debug, Default)]
pub struct DryRunner;

impl DiffRunner for DryRunner {
    fn run(
        &mut self,
        invocation: &RsyncInvocation,
        _on_line: &mut dyn FnMut(&str),
    ) -> Result<DiffExit, DiffRunError> {
        debug!("Dry run, not running {}", invocation.display());
        Ok(DiffExit { code: Some(0) })
    }
}
