use crate::inventory::Pair;
use crate::remote_shell::RemoteShellError;
use crate::rsync::DiffRunner;
use crate::transaction::TransactionLog;
use crate::verify::{PairReport, RunOutcome, VerifyOptions, verify_pair};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateResult {
    pub total_pairs: usize,
    pub verified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errored: usize,
}

impl AggregateResult {
    /// 1 if any pair failed or errored, else 0.
    pub fn exit_status(&self) -> u8 {
        if self.failed > 0 || self.errored > 0 {
            1
        } else {
            0
        }
    }

    fn add(&mut self, outcome: &RunOutcome) {
        self.total_pairs += 1;
        match outcome {
            RunOutcome::Success => self.verified += 1,
            RunOutcome::Fail { .. } => {
                self.verified += 1;
                self.failed += 1;
            }
            RunOutcome::Error { .. } => self.errored += 1,
            RunOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Verifies pairs one after another, in the order given.
///
/// A failing pair never stops the run. Pairs are deliberately not run
/// concurrently: rsync with `--checksum` can saturate disks and links on its
/// own, and throttling is left to `nice`/`ionice` around this process.
pub struct RunAggregator<'a> {
    options: VerifyOptions,
    runner: &'a mut dyn DiffRunner,
    log: TransactionLog,
    result: AggregateResult,
}

impl<'a> RunAggregator<'a> {
    pub fn new(
        options: VerifyOptions,
        runner: &'a mut dyn DiffRunner,
        log: TransactionLog,
    ) -> Self {
        RunAggregator {
            options,
            runner,
            log,
            result: AggregateResult::default(),
        }
    }

    /// Verify every pair, calling `on_report` after each one.
    ///
    /// Stops early only on a remote shell configuration error; totals for the
    /// pairs handled before that remain available through [`Self::result`].
    pub fn run<'p, I, F>(
        &mut self,
        pairs: I,
        mut on_report: F,
    ) -> Result<AggregateResult, RemoteShellError>
    where
        I: IntoIterator<Item = &'p Pair>,
        F: FnMut(&Pair, &PairReport),
    {
        for pair in pairs {
            let report = verify_pair(pair, &self.options, &mut *self.runner, &mut self.log)?;
            self.result.add(&report.outcome);
            on_report(pair, &report);
        }

        Ok(self.result)
    }

    pub fn result(&self) -> AggregateResult {
        self.result
    }

    /// Hand back the transaction log, replaying it first if asked to.
    pub fn finish(self, replay: bool) -> TransactionLog {
        if replay {
            self.log.replay();
        }
        self.log
    }
}
