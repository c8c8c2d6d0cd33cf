//! LocalCrawler - in-process crawl engine
//!
//! Every submitted job runs as its own tokio task. Inside a job, requests run
//! concurrently, bounded by a semaphore of `concurrent_requests` permits. A job
//! ends when its request queue drains; failing requests never end it early.
//!
//! Requests carrying a [`RequestHook`](super::RequestHook) hand their outcome to
//! the hook. Other requests follow the normal crawl flow: output requests are
//! scheduled (once per URL), items are logged.

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::crawl::{CrawlEngine, CrawlJob, Fetcher, RequestError};
use crate::errors::Result;
use crate::settings::Settings;
use crate::spider::{Invocation, Output, Request, Spider};

pub struct LocalCrawler {
    fetcher: Arc<dyn Fetcher>,
    concurrent_requests: usize,
    pending: Vec<CrawlJob>,
}

impl std::fmt::Debug for LocalCrawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCrawler")
            .field("fetcher", &"<Fetcher>")
            .field("concurrent_requests", &self.concurrent_requests)
            .field("pending", &self.pending)
            .finish()
    }
}

/// Totals of one finished job
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    pub requests: usize,
    pub items: usize,
}

impl LocalCrawler {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        LocalCrawler {
            fetcher,
            concurrent_requests: 16,
            pending: Vec::new(),
        }
    }

    pub fn from_settings(fetcher: Arc<dyn Fetcher>, settings: &Settings) -> Self {
        Self::new(fetcher).with_concurrency(settings.concurrent_requests)
    }

    pub fn with_concurrency(mut self, concurrent_requests: usize) -> Self {
        self.concurrent_requests = concurrent_requests.max(1);
        self
    }

    /// Jobs submitted and not yet run
    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl CrawlEngine for LocalCrawler {
    fn submit(&mut self, job: CrawlJob) {
        debug!(spider = job.spider_name(), "job submitted");
        self.pending.push(job);
    }

    async fn run_to_completion(&mut self) -> Result<()> {
        let jobs = std::mem::take(&mut self.pending);
        info!(jobs = jobs.len(), "crawl started");

        let mut running = JoinSet::new();
        for job in jobs {
            let fetcher = self.fetcher.clone();
            let concurrency = self.concurrent_requests;
            running.spawn(async move {
                let spider = job.spider_name().to_string();
                let stats = run_job(job, fetcher, concurrency).await;
                (spider, stats)
            });
        }

        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((spider, stats)) => info!(
                    spider = %spider,
                    requests = stats.requests,
                    items = stats.items,
                    "job finished"
                ),
                Err(e) => error!("crawl job aborted: {}", e),
            }
        }

        info!("crawl finished");
        Ok(())
    }
}

/// Follow-ups and item count produced by one request
type RequestYield = (Vec<Request>, usize);

async fn run_job(job: CrawlJob, fetcher: Arc<dyn Fetcher>, concurrency: usize) -> JobStats {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let spider = job.spider.clone();
    let check_mode = job.check_mode;
    let mut stats = JobStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut tasks: JoinSet<RequestYield> = JoinSet::new();

    let initial = job.source.requests(spider.as_ref());
    debug!(spider = spider.name(), requests = initial.len(), "job started");

    for request in initial {
        // hooked requests are never filtered as duplicates
        if request.hook().is_none() && !seen.insert(request.url.clone()) {
            continue;
        }
        stats.requests += 1;
        spawn_request(&mut tasks, &semaphore, &spider, &fetcher, request, check_mode);
    }

    while let Some(joined) = tasks.join_next().await {
        let (follow_ups, items) = match joined {
            Ok(result) => result,
            Err(e) => {
                error!(spider = spider.name(), "request task aborted: {}", e);
                continue;
            }
        };
        stats.items += items;

        for request in follow_ups {
            if !seen.insert(request.url.clone()) {
                continue;
            }
            stats.requests += 1;
            spawn_request(&mut tasks, &semaphore, &spider, &fetcher, request, check_mode);
        }
    }

    stats
}

fn spawn_request(
    tasks: &mut JoinSet<RequestYield>,
    semaphore: &Arc<Semaphore>,
    spider: &Arc<dyn Spider>,
    fetcher: &Arc<dyn Fetcher>,
    request: Request,
    check_mode: bool,
) {
    let semaphore = semaphore.clone();
    let spider = spider.clone();
    let fetcher = fetcher.clone();

    tasks.spawn(async move {
        // the semaphore is never closed, acquire only fails on close
        let _permit = semaphore.acquire_owned().await.ok();

        let hook = request.hook().cloned();
        let callback = request.callback.clone();
        let url = request.url.clone();
        let name = spider.name().to_string();

        // a panic in the fetcher or a hook unwinds this inner task only
        let handled = tokio::spawn(async move {
            process_request(spider.as_ref(), fetcher.as_ref(), request, check_mode).await
        })
        .await;

        match handled {
            Ok(result) => result,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                let err = RequestError::Panic { callback, message };
                match hook {
                    Some(hook) => hook.on_error(&err),
                    None => warn!(spider = %name, url = %url, "{}", err),
                }
                (Vec::new(), 0)
            }
        }
    });
}

async fn process_request(
    spider: &dyn Spider,
    fetcher: &dyn Fetcher,
    request: Request,
    check_mode: bool,
) -> RequestYield {
    let fetched = fetcher
        .fetch(&request)
        .await
        .map_err(RequestError::from)
        .and_then(|response| {
            if (200..300).contains(&response.status) {
                Ok(response)
            } else {
                Err(RequestError::HttpStatus {
                    url: response.url,
                    status: response.status,
                })
            }
        });

    let response = match fetched {
        Ok(mut response) => {
            response.meta = request.meta.clone();
            response
        }
        Err(err) => {
            match request.hook() {
                Some(hook) => hook.on_error(&err),
                None => warn!(spider = spider.name(), "{}", err),
            }
            return (Vec::new(), 0);
        }
    };

    let invocation = Invocation {
        callback: &request.callback,
        response: &response,
        cb_kwargs: &request.cb_kwargs,
        check_mode,
    };

    let outcome = match catch_unwind(AssertUnwindSafe(|| spider.parse(&invocation))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(RequestError::Callback(e)),
        Err(payload) => Err(RequestError::Panic {
            callback: request.callback.clone(),
            message: panic_message(payload.as_ref()),
        }),
    };

    match (request.hook(), outcome) {
        (Some(hook), Ok(output)) => {
            hook.on_output(&response, output);
            (Vec::new(), 0)
        }
        (Some(hook), Err(err)) => {
            hook.on_error(&err);
            (Vec::new(), 0)
        }
        (None, Ok(output)) => {
            let mut items = 0;
            let follow_ups = output
                .into_iter()
                .filter_map(|out| match out {
                    Output::Request(next) => Some(next),
                    Output::Item(item) => {
                        items += 1;
                        debug!(spider = spider.name(), url = %response.url, fields = item.len(), "item scraped");
                        None
                    }
                })
                .collect();
            (follow_ups, items)
        }
        (None, Err(err)) => {
            warn!(spider = spider.name(), url = %request.url, "{}", err);
            (Vec::new(), 0)
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
