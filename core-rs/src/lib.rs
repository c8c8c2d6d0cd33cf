//! # spider-check - contract verification for spiders
//!
//! Spider callbacks declare contracts: the URL to probe, how many items or
//! requests they return, which fields scraped items carry. A check run turns
//! every (callback, contract) pair into one synthetic request, crawls those
//! requests in place of the spider's own start requests and reports each pair
//! as an independent test case, unittest style.
//!
//! ## Core Principle
//!
//! **Contracts are tests**: a contract never changes what a spider scrapes,
//! and a failing contract never stops the others from running.
//!
//! ## Architecture
//!
//! ```text
//!   settings ──► ContractRegistry ──► ContractCatalog
//!                                          │
//!   SpiderRegistry ──► CheckCommand ◄──────┘
//!                          │ CrawlJob + ContractRequestSource
//!                          ▼
//!                     CrawlEngine ──► ContractProbe ──► ResultAggregator
//!                                                           │
//!                                              report (stderr) + exit status
//! ```

pub mod errors;
pub mod settings;
pub mod spider;
pub mod crawl;
pub mod contracts;
pub mod check;
pub mod cli;

pub use errors::{CheckError, Result};
pub use settings::Settings;
pub use spider::{Callback, Invocation, Output, Request, Response, Spider, SpiderError, SpiderLoader, SpiderRegistry};
pub use crawl::{CrawlEngine, CrawlJob, Fetcher, HttpFetcher, LocalCrawler, MemoryFetcher, RequestSource};
pub use contracts::{Contract, ContractCatalog, ContractRegistry, ContractViolation};
pub use check::{CheckCommand, CheckOptions, CheckOutcome, ResultAggregator, ScopedEnv, TestId, TestOutcome, Verbosity};
pub use cli::{CheckArgs, CheckRunner};

/// Crate version, also used in the default user agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
