use crate::classify::{ClassifyPolicy, DiffTally, IgnoreReason, LineEvent};
use crate::inventory::Pair;
use crate::remote_shell::{RemoteShellError, resolve_remote_shell};
use crate::rsync::{DiffRunner, RsyncInvocation, RsyncOptions};
use crate::transaction::{TransactionLog, TxStatus};
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub policy: ClassifyPolicy,
    pub rsync: RsyncOptions,
    /// Forces a root login with this identity for every remote pair.
    pub ssh_identity: Option<PathBuf>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSnapshot,
    NoBackup,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoSnapshot => f.write_str("no snapshot"),
            SkipReason::NoBackup => f.write_str("no backup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// rsync ran cleanly and reported this many real differences.
    Fail { diffs: u64 },
    /// rsync failed, or its output could not be read to the end.
    Error { exit_code: Option<i32> },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairReport {
    pub outcome: RunOutcome,
    /// Counted differences, when the whole output could be read.
    pub diff_count: Option<u64>,
    pub ignored: u64,
    /// Directories missing from the backup that were ignored as nested subvolumes.
    pub new_directories: u64,
}

impl PairReport {
    fn skipped(reason: SkipReason) -> Self {
        PairReport {
            outcome: RunOutcome::Skipped(reason),
            diff_count: None,
            ignored: 0,
            new_directories: 0,
        }
    }
}

/// Verify one snapshot/backup pair.
///
/// Records a start entry and exactly one terminal entry in `log` for every
/// pair that isn't skipped. Only an unparseable remote shell command is
/// returned as an error; it is checked before anything is recorded.
pub fn verify_pair(
    pair: &Pair,
    options: &VerifyOptions,
    runner: &mut dyn DiffRunner,
    log: &mut TransactionLog,
) -> Result<PairReport, RemoteShellError> {
    let src = pair.source_address();
    let dest = pair.target_address();

    if pair.target_path.is_none() {
        warn!("Skipping {}: {}", src, SkipReason::NoBackup);
        return Ok(PairReport::skipped(SkipReason::NoBackup));
    }
    if pair.snapshot_path.is_none() {
        warn!("Skipping {}: {}", dest, SkipReason::NoSnapshot);
        return Ok(PairReport::skipped(SkipReason::NoSnapshot));
    }

    let remote_shell = resolve_remote_shell(
        pair.source_rsh.as_deref(),
        options.ssh_identity.as_deref(),
        pair.is_remote(),
    )?;

    let start_status = if options.dry_run {
        TxStatus::DryrunStarting
    } else {
        TxStatus::Starting
    };
    log.record(start_status, &dest, &src);
    info!("Comparing {} to {}", src, dest);

    let invocation = RsyncInvocation::new(&options.rsync, remote_shell.as_deref(), &src, &dest);

    let mut tally = DiffTally::new(options.policy);
    let mut new_directories = 0;
    let run_result = runner.run(&invocation, &mut |line| match tally.feed(line) {
        LineEvent::Counted { seq: 1 } => info!("{} differs from {}", dest, src),
        LineEvent::Ignored(IgnoreReason::NewDirectory) => new_directories += 1,
        _ => {}
    });

    if new_directories > 0 {
        info!(
            "{} new directories in {} ignored as nested subvolumes",
            new_directories, dest
        );
    }

    let (outcome, diff_count) = match run_result {
        Ok(exit) if exit.success() => {
            let diffs = tally.diff_count();
            if diffs == 0 {
                info!("No differences between {} and {}", src, dest);
                (RunOutcome::Success, Some(diffs))
            } else {
                error!("{} difference(s) between {} and {}", diffs, src, dest);
                (RunOutcome::Fail { diffs }, Some(diffs))
            }
        }
        Ok(exit) => {
            error!(
                "rsync failed for {} (exit {})",
                dest,
                exit.code
                    .map_or_else(|| "by signal".to_string(), |c| c.to_string())
            );
            (
                RunOutcome::Error {
                    exit_code: exit.code,
                },
                Some(tally.diff_count()),
            )
        }
        Err(e) => {
            error!("Comparing {} failed: {}", dest, e);
            (RunOutcome::Error { exit_code: None }, None)
        }
    };

    if tally.unrecognized_count() > 0 {
        warn!(
            "{} unrecognized line(s) in rsync output for {}",
            tally.unrecognized_count(),
            dest
        );
    }

    let terminal_status = match outcome {
        RunOutcome::Fail { .. } => TxStatus::Fail,
        RunOutcome::Error { .. } => TxStatus::Error,
        _ => TxStatus::Success,
    };
    log.record(terminal_status, &dest, &src);

    Ok(PairReport {
        outcome,
        diff_count,
        ignored: tally.ignored_count(),
        new_directories,
    })
}
