pub(super) const ROOT_LONG_ABOUT: &str = "\
Verify that backups are identical to the snapshots they were made from

Snapcheck compares each snapshot with its backup copy using rsync in checksum
dry-run mode, and reports any difference in content or metadata. Nothing is ever
transferred. Differences that are expected when backing up layered snapshots are
ignored by default.

CORE CONCEPTS:

  Pairs:
    A pair is one snapshot and the backup made from it. Pairs come from a backup
    inventory: either a file of records, or the output of a lister command such as
    'btrbk --format=raw list'. Each record is a line of key=value tokens:

      snapshot_path='/mnt/pool/_snap/home.20240101' target_path='/mnt/backup/home.20240101'

    Recognised keys are snapshot_path, target_path, source_host, target_host and
    source_rsh. Unknown keys are ignored. Pairs without a snapshot or without a backup
    are skipped.

  Expected differences:
    - The transfer root's modification time (rsync reports '.d..t...... ./').
      Disable with --no-ignore-root-timestamp.
    - Directories missing on the backup side ('cd+++++++++'). Nested subvolumes show
      up as empty directories in a snapshot and are not part of its backup.
      Disable with --no-ignore-dirs.

  Output:
    stdout carries only the number of differences of each verified pair, one per line,
    in inventory order. Skipped pairs and pairs rsync could not compare print no line,
    so match counts to pairs with the transaction log (-v or --transaction-log), not
    by position. Everything else (progress, ignored differences, rsync statistics)
    goes to stderr.

COMMANDS:

  verify
    Compare every pair and exit with status 1 if any pair differs or fails.

  classify
    Count the real differences in rsync --itemize-changes output read from a file or
    stdin. Useful for checking output of an rsync run made by hand.

GLOBAL OPTIONS:

  -C <DIRECTORY>
    Change to directory before operating (like git -C or make -C).

  -v, --verbose / --log-level <LEVEL>
    Control diagnostics on stderr. Takes precedence over RUST_LOG.

  --config <FILE>
    Read defaults from a TOML configuration file. Command line flags take precedence.

EXIT STATUS:

  0    every pair is identical (skipped pairs do not count)
  1    at least one pair has differences or could not be compared
  255  fatal error: bad configuration, unreadable inventory, invalid arguments

EXAMPLES:

  # Verify the latest backups reported by btrbk
  $ snapcheck verify --lister 'btrbk --format=raw list'

  # Verify every backup, logging each difference
  $ snapcheck -vv verify --all --lister 'btrbk --format=raw list'

  # Verify pairs from a file, without running rsync
  $ snapcheck -v verify --pairs pairs.txt --dry-run

  # Count differences in saved rsync output
  $ rsync -ani --checksum --delete src/ dst/ | snapcheck classify
";

pub(super) const VERIFY_LONG_ABOUT: &str = "\
Verify snapshot/backup pairs

Runs, for every pair and strictly one at a time:

  rsync --itemize-changes --checksum --dry-run --archive --delete --numeric-ids \\
        --hard-links --acls --xattrs [-e <remote shell>] <snapshot>/ <backup>/

and counts the itemized differences that are not expected. A pair fails if rsync
reports differences, and errors if rsync exits with a non-zero status. Neither stops
the remaining pairs from being checked.

INVENTORY:

  --pairs <FILE>     read records from FILE ('-' for stdin)
  --lister <CMD>     run CMD with 'latest' (or 'backups' with --all) and any FILTER
                     arguments appended, and read records from its output

REMOTE PAIRS:

  When a record has a source_host or target_host, that side is addressed as host:path.
  A source_rsh of the form '<command> <user>@<host>' is passed to rsync as
  '<command> -l <user>'. With --ssh-identity the remote shell is always
  'ssh -q -i <identity> -l root'.

TRANSACTION LOG:

  Every verified pair records a start and a result entry:

    <timestamp> check-rsync starting <backup> <snapshot> - -
    <timestamp> check-rsync success|fail|ERROR <backup> <snapshot> - -

  With --dry-run the start entry is 'dryrun_starting'. Entries are replayed to stderr at
  the end of the run with -v, and appended to --transaction-log if given.

DRY RUN:

  --dry-run goes through every step except starting rsync, which is replaced by a
  stand-in with no output. Every pair therefore succeeds with zero differences.
";

pub(super) const CLASSIFY_LONG_ABOUT: &str = "\
Count real differences in rsync itemized output

Reads lines produced by 'rsync --itemize-changes' and prints the number of
differences that are not expected, applying the same rules as 'verify'. Lines after
the first empty line (rsync's --stats block) are not counted. Unrecognized lines are
reported on stderr and not counted.

Exits with status 1 if any difference was counted.
";
