use crate::itemize::{ChangeRecord, ParsedLine, parse_line};
use std::fmt;
use tracing::{debug, info, warn};

/// Flags rsync reports for the transfer root when only its mtime differs.
const ROOT_TIMESTAMP_FLAGS: &str = ".d..t......";
const ROOT_PATH: &str = "./";

/// Flags rsync reports for a directory missing on the receiving side.
///
/// Nested subvolumes show up as empty directories in a snapshot and are not
/// traversed, so on the backup side they look freshly created.
const NEW_DIRECTORY_FLAGS: &str = "cd+++++++++";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyPolicy {
    pub ignore_dirs: bool,
    pub ignore_root_folder_timestamp: bool,
}

impl Default for ClassifyPolicy {
    fn default() -> Self {
        ClassifyPolicy {
            ignore_dirs: true,
            ignore_root_folder_timestamp: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    RootFolderTimestamp,
    NewDirectory,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::RootFolderTimestamp => f.write_str("ignore_root_folder_timestamp"),
            IgnoreReason::NewDirectory => f.write_str("ignore_dirs"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Counted,
    Ignored(IgnoreReason),
}

/// Decide whether a change record is a real difference.
///
/// The root timestamp rule is checked before the new directory rule, and a
/// record matching either is ignored only if the policy enables that rule.
pub fn classify(record: &ChangeRecord, policy: &ClassifyPolicy) -> Classification {
    let flags = record.flags.as_str();

    if policy.ignore_root_folder_timestamp
        && flags == ROOT_TIMESTAMP_FLAGS
        && record.path == ROOT_PATH
    {
        Classification::Ignored(IgnoreReason::RootFolderTimestamp)
    } else if policy.ignore_dirs && flags == NEW_DIRECTORY_FLAGS {
        Classification::Ignored(IgnoreReason::NewDirectory)
    } else {
        Classification::Counted
    }
}

/// What happened to a single line fed into a [`DiffTally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// The blank line that opens the statistics block.
    StatsBoundary,
    /// A line inside the statistics block; never classified.
    Stats,
    /// A counted difference, with its 1-based sequence number.
    Counted { seq: u64 },
    Ignored(IgnoreReason),
    Unrecognized,
}

/// Streaming classifier for one rsync run.
///
/// Lines go in one at a time as the subprocess produces them. Once the blank
/// line before the statistics block has been seen, every later line is only
/// logged.
#[derive(Debug)]
pub struct DiffTally {
    policy: ClassifyPolicy,
    in_stats_block: bool,
    counted: u64,
    ignored: u64,
    unrecognized: u64,
}

impl DiffTally {
    pub fn new(policy: ClassifyPolicy) -> Self {
        DiffTally {
            policy,
            in_stats_block: false,
            counted: 0,
            ignored: 0,
            unrecognized: 0,
        }
    }

    pub fn feed(&mut self, line: &str) -> LineEvent {
        if self.in_stats_block {
            info!("{}", line);
            return LineEvent::Stats;
        }

        match parse_line(line) {
            Ok(ParsedLine::Blank) => {
                self.in_stats_block = true;
                LineEvent::StatsBoundary
            }
            Ok(ParsedLine::Change(record)) => match classify(&record, &self.policy) {
                Classification::Counted => {
                    self.counted += 1;
                    debug!(
                        "diff #{}: {} {} [{}]",
                        self.counted,
                        record.flags,
                        record.path,
                        record.flags.changed_attributes().join(",")
                    );
                    LineEvent::Counted { seq: self.counted }
                }
                Classification::Ignored(reason) => {
                    self.ignored += 1;
                    debug!("ignored ({}): {} {}", reason, record.flags, record.path);
                    LineEvent::Ignored(reason)
                }
            },
            Err(e) => {
                self.unrecognized += 1;
                warn!("{}", e);
                LineEvent::Unrecognized
            }
        }
    }

    pub fn diff_count(&self) -> u64 {
        self.counted
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored
    }

    pub fn unrecognized_count(&self) -> u64 {
        self.unrecognized
    }

    #[cfg(test)]
    pub fn in_stats_block(&self) -> bool {
        self.in_stats_block
    }
}
