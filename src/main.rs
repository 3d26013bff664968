mod aggregate;
mod classify;
mod cli;
mod config;
mod inventory;
mod itemize;
mod remote_shell;
mod rsync;
mod transaction;
mod verify;

use aggregate::RunAggregator;
use anyhow::Context;
use classify::{ClassifyPolicy, DiffTally};
use cli::{Cli, Command, PolicyArgs, VerifyArgs};
use config::ConfigFile;
use inventory::{Pair, Scope};
use rsync::{DiffRunner, DryRunner, RsyncOptions, RsyncRunner};
use std::fmt as stdfmt;
use std::fs::File;
use std::io::{BufReader, IsTerminal, Read, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, debug, error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use transaction::TransactionLog;
use verify::{RunOutcome, VerifyOptions};

struct CheckExitCode;

impl CheckExitCode {
    /// Exit code used when at least one pair differs or could not be compared.
    fn unclean() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used for fatal errors (bad configuration, I/O errors, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level.as_deref());

    // Change working directory if -C was specified
    if let Some(directory) = &cli.directory
        && let Err(e) = std::env::set_current_dir(directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return CheckExitCode::any_error();
    }

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Verify(args) => handle_verify(&config, args),
        Command::Classify { input, policy } => handle_classify(&config, input, &policy),
    });

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err:#}");
            CheckExitCode::any_error()
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ConfigFile> {
    match path {
        Some(path) => Ok(ConfigFile::load(path)?),
        None => Ok(ConfigFile::default()),
    }
}

fn classify_policy(config: &ConfigFile, args: &PolicyArgs) -> ClassifyPolicy {
    let defaults = ClassifyPolicy::default();
    ClassifyPolicy {
        ignore_dirs: !args.no_ignore_dirs
            && config.ignore_dirs.unwrap_or(defaults.ignore_dirs),
        ignore_root_folder_timestamp: !args.no_ignore_root_timestamp
            && config
                .ignore_root_folder_timestamp
                .unwrap_or(defaults.ignore_root_folder_timestamp),
    }
}

/// Merge the configuration file and command line into verification options.
///
/// Command line flags can only switch behaviour away from the file (or the
/// built-in default); paths given on the command line replace the file's.
fn verify_options(config: &ConfigFile, args: &VerifyArgs) -> VerifyOptions {
    let defaults = RsyncOptions::default();

    VerifyOptions {
        policy: classify_policy(config, &args.policy),
        rsync: RsyncOptions {
            program: args
                .rsync
                .clone()
                .or_else(|| config.rsync.clone())
                .unwrap_or(defaults.program),
            acls: !args.no_acls && config.acls.unwrap_or(defaults.acls),
            xattrs: !args.no_xattrs && config.xattrs.unwrap_or(defaults.xattrs),
            stats: args.stats || config.stats.unwrap_or(defaults.stats),
            extra_args: config.rsync_args.clone(),
        },
        ssh_identity: args
            .ssh_identity
            .clone()
            .or_else(|| config.ssh_identity.clone()),
        dry_run: args.dry_run || config.dry_run.unwrap_or(false),
    }
}

fn load_pairs(config: &ConfigFile, args: &VerifyArgs) -> anyhow::Result<Vec<Pair>> {
    let scope = if args.all { Scope::All } else { Scope::Latest };

    if let Some(path) = &args.pairs {
        if path.as_os_str() == "-" {
            return Ok(inventory::parse_inventory(std::io::stdin().lock())?);
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open pairs file {}", path.display()))?;
        return inventory::parse_inventory(file)
            .with_context(|| format!("Failed to read pairs file {}", path.display()));
    }

    match args.lister.as_deref().or(config.lister.as_deref()) {
        Some(lister) => Ok(inventory::run_lister(lister, scope, &args.filters)?),
        None => anyhow::bail!("No pairs to verify: pass --pairs or --lister"),
    }
}

fn handle_verify(config: &ConfigFile, args: VerifyArgs) -> anyhow::Result<ExitCode> {
    let options = verify_options(config, &args);
    let pairs = load_pairs(config, &args)?;

    let log = match args
        .transaction_log
        .as_deref()
        .or(config.transaction_log.as_deref())
    {
        Some(path) => TransactionLog::with_file(path)
            .with_context(|| format!("Failed to open transaction log {}", path.display()))?,
        None => TransactionLog::new(),
    };

    if options.dry_run {
        info!("DRY RUN - rsync will not be started");
    }

    let mut dry_runner = DryRunner;
    let mut rsync_runner = RsyncRunner;
    let runner: &mut dyn DiffRunner = if options.dry_run {
        &mut dry_runner
    } else {
        &mut rsync_runner
    };

    let mut aggregator = RunAggregator::new(options, runner, log);
    let run_result = aggregator.run(&pairs, |pair, report| {
        debug!(
            "{}: {:?}, {} ignored ({} new directories)",
            pair.target_address(),
            report.outcome,
            report.ignored,
            report.new_directories
        );
        if matches!(
            report.outcome,
            RunOutcome::Success | RunOutcome::Fail { .. }
        ) && let Some(count) = report.diff_count
        {
            println!("{}", count);
        }
    });

    let replay = tracing::enabled!(Level::INFO);
    let totals = aggregator.result();
    aggregator.finish(replay);

    run_result.context("Aborting verification")?;

    info!(
        "Checked {} pair(s): {} verified, {} with differences, {} errors, {} skipped",
        totals.total_pairs, totals.verified, totals.failed, totals.errored, totals.skipped
    );

    if totals.exit_status() != 0 {
        error!(
            "Verification failed: {} pair(s) with differences, {} error(s)",
            totals.failed, totals.errored
        );
        return Ok(CheckExitCode::unclean());
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_classify(
    config: &ConfigFile,
    input: Option<PathBuf>,
    policy: &PolicyArgs,
) -> anyhow::Result<ExitCode> {
    let reader: Box<dyn Read> = match input {
        Some(path) if path.as_os_str() != "-" => Box::new(
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        _ => Box::new(std::io::stdin().lock()),
    };

    let mut tally = DiffTally::new(classify_policy(config, policy));
    rsync::stream_lines(BufReader::new(reader), &mut |line| {
        tally.feed(line);
    })?;

    println!("{}", tally.diff_count());

    info!(
        "{} difference(s), {} ignored, {} unrecognized line(s)",
        tally.diff_count(),
        tally.ignored_count(),
        tally.unrecognized_count()
    );

    if tally.diff_count() > 0 {
        return Ok(CheckExitCode::unclean());
    }

    Ok(ExitCode::SUCCESS)
}

fn default_filter(verbose: u8, log_level: Option<&str>) -> Option<&str> {
    match (log_level, verbose) {
        (Some(level), _) => Some(level),
        (None, 0) => None,
        (None, 1) => Some("info"),
        (None, _) => Some("debug"),
    }
}

fn init_tracing(verbose: u8, log_level: Option<&str>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let filter = match default_filter(verbose, log_level) {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}


impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
