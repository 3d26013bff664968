mod help_text;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Verify that backups are identical to the snapshots they were made from
#[derive(Parser, Debug)]
#[command(name = "snapcheck", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// Change to DIRECTORY before doing anything
    #[arg(short = 'C', value_name = "DIRECTORY", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase logging verbosity (-v info, -vv debug with every itemized line).
    /// Takes precedence over RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Set the log level explicitly. Takes precedence over RUST_LOG.
    #[arg(
        long,
        value_name = "LEVEL",
        global = true,
        conflicts_with = "verbose",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: Option<String>,

    /// Read defaults from a TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify snapshot/backup pairs, exit with success if all are identical
    #[command(long_about = help_text::VERIFY_LONG_ABOUT)]
    Verify(VerifyArgs),

    /// Count real differences in rsync itemized output
    #[command(long_about = help_text::CLASSIFY_LONG_ABOUT)]
    Classify {
        /// File with rsync --itemize-changes output (stdin if omitted or '-')
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        #[command(flatten)]
        policy: PolicyArgs,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct PolicyArgs {
    /// Count directories missing on the backup side (nested subvolumes)
    #[arg(long)]
    pub no_ignore_dirs: bool,

    /// Count a modification time difference on the transfer root
    #[arg(long)]
    pub no_ignore_root_timestamp: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct VerifyArgs {
    /// Read pair records from FILE ('-' for stdin)
    #[arg(long, value_name = "FILE", conflicts_with = "lister")]
    pub pairs: Option<PathBuf>,

    /// Lister command producing pair records
    #[arg(long, value_name = "CMD")]
    pub lister: Option<String>,

    /// Verify every backup, not only the latest one of each subvolume
    #[arg(long)]
    pub all: bool,

    /// Go through every step without running rsync
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Do not compare ACLs
    #[arg(long)]
    pub no_acls: bool,

    /// Do not compare extended attributes
    #[arg(long)]
    pub no_xattrs: bool,

    /// Ask rsync for transfer statistics (logged with -v)
    #[arg(long)]
    pub stats: bool,

    /// Log in as root with this SSH identity for every remote pair
    #[arg(long, value_name = "FILE")]
    pub ssh_identity: Option<PathBuf>,

    /// rsync program to run
    #[arg(long, value_name = "PROGRAM")]
    pub rsync: Option<PathBuf>,

    /// Also append transaction entries to FILE
    #[arg(long, value_name = "FILE")]
    pub transaction_log: Option<PathBuf>,

    /// Filters passed on to the lister command
    #[arg(value_name = "FILTER")]
    pub filters: Vec<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_verify_flags() {
        let cli = Cli::try_parse_from([
            "snapcheck",
            "-vv",
            "verify",
            "--lister",
            "btrbk list",
            "--all",
            "--no-ignore-dirs",
            "--no-xattrs",
            "home",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Verify(args) => {
                assert_eq!(args.lister.as_deref(), Some("btrbk list"));
                assert!(args.all);
                assert!(args.policy.no_ignore_dirs);
                assert!(!args.policy.no_ignore_root_timestamp);
                assert!(args.no_xattrs);
                assert!(!args.no_acls);
                assert_eq!(args.filters, vec!["home"]);
            }
            other => panic!("Expected verify, got {other:?}"),
        }
    }

    #[test]
    fn pairs_conflicts_with_lister() {
        let result = Cli::try_parse_from([
            "snapcheck", "verify", "--pairs", "p.txt", "--lister", "x",
        ]);
        assert!(result.is_err());
    }
}
