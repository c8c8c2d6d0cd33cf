//! Crawl module
//!
//! The seam between a check run and whatever executes requests. A [`CrawlJob`]
//! pairs a spider with the [`RequestSource`] its first requests come from, so a
//! check run can swap the source without touching the spider itself.
//!
//! ```text
//!   CrawlJob { spider, source, check_mode }
//!        │ submit()
//!        ▼
//!   CrawlEngine ──run_to_completion()──► Fetcher ──► Spider::parse ──► RequestHook
//! ```

pub mod engine;
pub mod fetch;

pub use engine::LocalCrawler;
pub use fetch::{FetchError, Fetcher, HttpFetcher, MemoryFetcher};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::errors::Result;
use crate::spider::{Output, Request, Response, Spider, SpiderError};

/// Why a single request did not produce callback output
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Non-2xx responses never reach the callback
    #[error("Ignoring response <{status} {url}>: HTTP status code is not handled or not allowed")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Callback(#[from] SpiderError),

    #[error("Callback '{callback}' panicked: {message}")]
    Panic { callback: String, message: String },
}

/// Receives the outcome of one request in place of the normal crawl flow.
///
/// Outputs handed to a hook are not followed by the engine.
pub trait RequestHook: Send + Sync {
    fn on_output(&self, response: &Response, output: Vec<Output>);

    fn on_error(&self, error: &RequestError);
}

/// Produces the first requests of a crawl job
pub trait RequestSource: Send + Sync {
    fn requests(&self, spider: &dyn Spider) -> Vec<Request>;
}

/// The spider's own `start_requests`
#[derive(Debug, Default, Clone, Copy)]
pub struct StartRequests;

impl RequestSource for StartRequests {
    fn requests(&self, spider: &dyn Spider) -> Vec<Request> {
        spider.start_requests()
    }
}

/// One spider scheduled on a crawl engine
#[derive(Clone)]
pub struct CrawlJob {
    pub spider: Arc<dyn Spider>,
    pub source: Arc<dyn RequestSource>,
    /// Passed to every callback invocation of this job
    pub check_mode: bool,
}

impl std::fmt::Debug for CrawlJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlJob")
            .field("spider", &self.spider.name())
            .field("source", &"<RequestSource>")
            .field("check_mode", &self.check_mode)
            .finish()
    }
}

impl CrawlJob {
    /// Job that crawls from the spider's start requests
    pub fn new(spider: Arc<dyn Spider>) -> Self {
        CrawlJob {
            spider,
            source: Arc::new(StartRequests),
            check_mode: false,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn RequestSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn spider_name(&self) -> &str {
        self.spider.name()
    }
}

/// Scheduler that executes crawl jobs
#[async_trait]
pub trait CrawlEngine: Send {
    /// Enqueue a job; nothing runs until [`run_to_completion`](Self::run_to_completion)
    fn submit(&mut self, job: CrawlJob);

    /// Run every submitted job and return once all of them have finished
    async fn run_to_completion(&mut self) -> Result<()>;
}
