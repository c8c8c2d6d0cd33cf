//! CheckCommand - discovers contract tests, lists or runs them, reports
//!
//! Phases: `Idle -> Discovering -> {Listing | Checking} -> Reporting -> Done`.
//! A configuration or spider-load error during discovery ends the run in
//! `Done` with no output. `SPIDER_CHECK=true` is set from the start of
//! discovery until listing or checking finishes, on every path.

use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

use crate::check::environ::ScopedEnv;
use crate::check::interceptor::ContractRequestSource;
use crate::check::results::{ReportSummary, ResultAggregator};
use crate::contracts::ContractRegistry;
use crate::crawl::{CrawlEngine, CrawlJob};
use crate::errors::Result;
use crate::spider::SpiderRegistry;

/// Exit code of a run whose contracts all passed, or of any listing
pub const EXIT_OK: i32 = 0;

/// Exit code of a run with at least one failure or error
pub const EXIT_FAILED: i32 = 1;

/// Options of the `check` command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Only list tested callbacks
    pub list: bool,
    /// List spiders without tested callbacks too
    pub verbose: bool,
    /// Spiders to check; empty means every registered spider
    pub spiders: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Idle,
    Discovering,
    Listing,
    Checking,
    Reporting,
    Done,
}

/// Result of a completed (non-fatal) run
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub exit_code: i32,
    /// `None` for listings
    pub summary: Option<ReportSummary>,
}

struct DiscoveredSpider {
    name: String,
    tested_methods: Vec<String>,
    job: CrawlJob,
}

pub struct CheckCommand<'a> {
    spiders: &'a dyn SpiderRegistry,
    contracts: &'a ContractRegistry,
    identifiers: Vec<String>,
    results: Arc<ResultAggregator>,
    phase: CheckPhase,
}

impl<'a> CheckCommand<'a> {
    /// `identifiers` are the enabled contract identifiers, in priority order
    pub fn new(
        spiders: &'a dyn SpiderRegistry,
        contracts: &'a ContractRegistry,
        identifiers: Vec<String>,
    ) -> Self {
        CheckCommand {
            spiders,
            contracts,
            identifiers,
            results: Arc::new(ResultAggregator::new()),
            phase: CheckPhase::Idle,
        }
    }

    /// Record into `results` (e.g. one writing progress) instead of a quiet aggregator
    pub fn with_results(mut self, results: Arc<ResultAggregator>) -> Self {
        self.results = results;
        self
    }

    pub fn results(&self) -> &Arc<ResultAggregator> {
        &self.results
    }

    pub fn phase(&self) -> CheckPhase {
        self.phase
    }

    fn enter(&mut self, phase: CheckPhase) {
        debug!(from = ?self.phase, to = ?phase, "check phase");
        self.phase = phase;
    }

    /// Run the command.
    ///
    /// Listings go to `out`; the error blocks and summary of a check go to
    /// `report`. Fatal discovery errors are returned before anything is written.
    pub async fn run(
        &mut self,
        options: &CheckOptions,
        engine: &mut dyn CrawlEngine,
        out: &mut dyn Write,
        report: &mut dyn Write,
    ) -> Result<CheckOutcome> {
        let _check_env = ScopedEnv::check_mode();

        self.enter(CheckPhase::Discovering);
        let discovered = match self.discover(options) {
            Ok(discovered) => discovered,
            Err(e) => {
                self.enter(CheckPhase::Done);
                return Err(e);
            }
        };

        if options.list {
            self.enter(CheckPhase::Listing);
            let listed = list(&discovered, options.verbose, out);
            self.enter(CheckPhase::Done);
            listed?;
            return Ok(CheckOutcome {
                exit_code: EXIT_OK,
                summary: None,
            });
        }

        self.enter(CheckPhase::Checking);
        let mut submitted = 0;
        for spider in discovered {
            if spider.tested_methods.is_empty() {
                debug!(spider = %spider.name, "no tested methods, skipped");
                continue;
            }
            engine.submit(spider.job);
            submitted += 1;
        }
        info!(jobs = submitted, "contract jobs submitted");

        let started_at = Utc::now();
        let crawled = engine.run_to_completion().await;
        let finished_at = Utc::now();
        drop(_check_env);

        if let Err(e) = crawled {
            self.enter(CheckPhase::Done);
            return Err(e);
        }

        self.enter(CheckPhase::Reporting);
        self.results.print_errors(report)?;
        self.results.print_summary(report, started_at, finished_at)?;
        let summary = self.results.summary(started_at, finished_at);
        self.enter(CheckPhase::Done);

        Ok(CheckOutcome {
            exit_code: if summary.successful { EXIT_OK } else { EXIT_FAILED },
            summary: Some(summary),
        })
    }

    /// Load every target spider and wrap it in a contract job.
    ///
    /// Fails on the first unknown contract or spider, before any output.
    fn discover(&self, options: &CheckOptions) -> Result<Vec<DiscoveredSpider>> {
        let catalog = Arc::new(self.contracts.build(&self.identifiers)?);

        let targets = if options.spiders.is_empty() {
            self.spiders.list()
        } else {
            options.spiders.clone()
        };

        let mut discovered = Vec::with_capacity(targets.len());
        for target in targets {
            let spider = self.spiders.load(&target)?;
            let tested_methods = catalog.tested_methods(spider.as_ref());
            debug!(spider = %target, tested = tested_methods.len(), "spider discovered");

            let source = ContractRequestSource::new(catalog.clone(), self.results.clone());
            let name = spider.name().to_string();
            let job = CrawlJob::new(spider)
                .with_source(Arc::new(source))
                .with_check_mode(true);

            discovered.push(DiscoveredSpider {
                name,
                tested_methods,
                job,
            });
        }
        Ok(discovered)
    }
}

/// Print spiders by name and their tested methods, both sorted
fn list(discovered: &[DiscoveredSpider], verbose: bool, out: &mut dyn Write) -> Result<()> {
    let mut by_name: BTreeMap<&str, &[String]> = BTreeMap::new();
    for spider in discovered {
        by_name.insert(&spider.name, &spider.tested_methods);
    }

    for (name, methods) in by_name {
        if methods.is_empty() && !verbose {
            continue;
        }
        writeln!(out, "{}", name)?;
        for method in methods {
            writeln!(out, "  * {}", method)?;
        }
    }
    out.flush()?;
    Ok(())
}
