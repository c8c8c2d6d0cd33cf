//! ResultAggregator - outcome accumulator and report writer
//!
//! Recording happens from many crawl tasks at once; every recording call takes
//! the single state lock, bumps exactly one counter, appends its detail entry
//! and writes its progress mark before releasing it.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Divider above each error block
pub const SEPARATOR_HEAVY: &str =
    "======================================================================";

/// Divider inside error blocks and above the summary
pub const SEPARATOR_LIGHT: &str =
    "----------------------------------------------------------------------";

/// Identity of one (spider, callback, contract) test case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestId {
    pub spider: String,
    pub callback: String,
    pub contract: String,
}

impl TestId {
    pub fn new(spider: &str, callback: &str, contract: &str) -> Self {
        TestId {
            spider: spider.to_string(),
            callback: callback.to_string(),
            contract: contract.to_string(),
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (@{})", self.spider, self.callback, self.contract)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Success,
    Failure(String),
    Error(String),
}

impl TestOutcome {
    fn progress_mark(&self) -> &'static str {
        match self {
            TestOutcome::Success => ".",
            TestOutcome::Failure(_) => "F",
            TestOutcome::Error(_) => "E",
        }
    }

    fn progress_word(&self) -> &'static str {
        match self {
            TestOutcome::Success => "ok",
            TestOutcome::Failure(_) => "FAIL",
            TestOutcome::Error(_) => "ERROR",
        }
    }
}

/// A failed or errored test, as listed by [`ResultAggregator::print_errors`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDetail {
    pub id: TestId,
    pub outcome: TestOutcome,
}

impl TestDetail {
    fn flavour(&self) -> &'static str {
        match self.outcome {
            TestOutcome::Error(_) => "ERROR",
            _ => "FAIL",
        }
    }

    fn text(&self) -> &str {
        match &self.outcome {
            TestOutcome::Failure(detail) | TestOutcome::Error(detail) => detail,
            TestOutcome::Success => "",
        }
    }
}

/// How much progress is written while tests execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Nothing until the report
    #[default]
    Quiet,
    /// One character per test
    Dots,
    /// One line per test
    Detailed,
}

/// Final counts and timing of a check run
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub run: usize,
    pub successes: usize,
    pub failures: usize,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub successful: bool,
}

impl ReportSummary {
    /// Seconds between start and finish, never negative
    pub fn elapsed_secs(&self) -> f64 {
        elapsed_secs(self.started_at, self.finished_at)
    }
}

#[derive(Default)]
struct State {
    successes: usize,
    failures: usize,
    errors: usize,
    details: Vec<TestDetail>,
    progress: Option<Box<dyn Write + Send>>,
}

pub struct ResultAggregator {
    verbosity: Verbosity,
    state: Mutex<State>,
}

impl fmt::Debug for ResultAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ResultAggregator")
            .field("verbosity", &self.verbosity)
            .field("successes", &state.successes)
            .field("failures", &state.failures)
            .field("errors", &state.errors)
            .finish()
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    /// Aggregator without progress output
    pub fn new() -> Self {
        ResultAggregator {
            verbosity: Verbosity::Quiet,
            state: Mutex::new(State::default()),
        }
    }

    /// Aggregator writing progress to `stream` as tests complete
    pub fn with_progress(stream: Box<dyn Write + Send>, verbosity: Verbosity) -> Self {
        let progress = match verbosity {
            Verbosity::Quiet => None,
            _ => Some(stream),
        };
        ResultAggregator {
            verbosity,
            state: Mutex::new(State {
                progress,
                ..State::default()
            }),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    // A panic while holding the lock leaves the counters consistent, keep going.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_success(&self, id: &TestId) {
        self.record(id.clone(), TestOutcome::Success);
    }

    pub fn record_failure(&self, id: &TestId, detail: impl Into<String>) {
        self.record(id.clone(), TestOutcome::Failure(detail.into()));
    }

    pub fn record_error(&self, id: &TestId, detail: impl Into<String>) {
        self.record(id.clone(), TestOutcome::Error(detail.into()));
    }

    /// Record one outcome
    pub fn record(&self, id: TestId, outcome: TestOutcome) {
        let mut state = self.lock();

        match &outcome {
            TestOutcome::Success => state.successes += 1,
            TestOutcome::Failure(_) => state.failures += 1,
            TestOutcome::Error(_) => state.errors += 1,
        }

        if let Some(stream) = state.progress.as_mut() {
            // progress output is best effort
            let _ = match self.verbosity {
                Verbosity::Detailed => {
                    writeln!(stream, "{} ... {}", id, outcome.progress_word())
                }
                _ => write!(stream, "{}", outcome.progress_mark()),
            };
            let _ = stream.flush();
        }

        if outcome != TestOutcome::Success {
            state.details.push(TestDetail { id, outcome });
        }
    }

    pub fn tests_run(&self) -> usize {
        let state = self.lock();
        state.successes + state.failures + state.errors
    }

    pub fn successes(&self) -> usize {
        self.lock().successes
    }

    pub fn failures(&self) -> usize {
        self.lock().failures
    }

    pub fn errors(&self) -> usize {
        self.lock().errors
    }

    /// Failures and errors in recording order
    pub fn details(&self) -> Vec<TestDetail> {
        self.lock().details.clone()
    }

    pub fn was_successful(&self) -> bool {
        let state = self.lock();
        state.failures == 0 && state.errors == 0
    }

    pub fn summary(&self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> ReportSummary {
        let state = self.lock();
        ReportSummary {
            run: state.successes + state.failures + state.errors,
            successes: state.successes,
            failures: state.failures,
            errors: state.errors,
            started_at,
            finished_at,
            successful: state.failures == 0 && state.errors == 0,
        }
    }

    /// Write one block per failure/error, in recording order
    pub fn print_errors(&self, out: &mut dyn Write) -> io::Result<()> {
        let state = self.lock();

        // ends the progress line
        if self.verbosity != Verbosity::Quiet {
            writeln!(out)?;
        }

        for detail in &state.details {
            writeln!(out, "{}", SEPARATOR_HEAVY)?;
            writeln!(out, "{}: {}", detail.flavour(), detail.id)?;
            writeln!(out, "{}", SEPARATOR_LIGHT)?;
            writeln!(out, "{}", detail.text())?;
            writeln!(out)?;
        }
        out.flush()
    }

    /// Write the closing summary:
    ///
    /// ```text
    /// ----------------------------------------------------------------------
    /// Ran 3 contracts in 0.120s
    ///
    /// FAILED (failures=1, errors=1)
    /// ```
    pub fn print_summary(
        &self,
        out: &mut dyn Write,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> io::Result<()> {
        let summary = self.summary(started_at, finished_at);
        let plural = if summary.run != 1 { "s" } else { "" };

        writeln!(out, "{}", SEPARATOR_LIGHT)?;
        writeln!(
            out,
            "Ran {} contract{} in {:.3}s",
            summary.run,
            plural,
            summary.elapsed_secs()
        )?;
        writeln!(out)?;

        if summary.successful {
            writeln!(out, "OK")?;
        } else {
            let mut infos = Vec::new();
            if summary.failures > 0 {
                infos.push(format!("failures={}", summary.failures));
            }
            if summary.errors > 0 {
                infos.push(format!("errors={}", summary.errors));
            }
            writeln!(out, "FAILED ({})", infos.join(", "))?;
        }
        out.flush()
    }
}

fn elapsed_secs(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> f64 {
    (finished_at - started_at)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
