//! Local Crawler Integration Tests
//!
//! Exercises `LocalCrawler` through the public engine seams: custom
//! `RequestSource`s, `RequestHook`s on requests and a counting `Fetcher`.

use async_trait::async_trait;
use serde_json::json;
use spider_check::crawl::{
    CrawlEngine, CrawlJob, FetchError, Fetcher, LocalCrawler, MemoryFetcher, RequestError,
    RequestHook, RequestSource,
};
use spider_check::spider::{Callback, Invocation, Output, Request, Response, Spider, SpiderError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Hook that keeps a line per outcome
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Recorder {
    fn lines(&self) -> Vec<String> {
        let mut lines = self.seen.lock().unwrap().clone();
        lines.sort();
        lines
    }
}

impl RequestHook for Recorder {
    fn on_output(&self, response: &Response, output: Vec<Output>) {
        self.seen
            .lock()
            .unwrap()
            .push(format!("ok {} {}", response.url, output.len()));
    }

    fn on_error(&self, error: &RequestError) {
        let kind = match error {
            RequestError::Fetch(_) => "fetch",
            RequestError::HttpStatus { .. } => "status",
            RequestError::Callback(_) => "callback",
            RequestError::Panic { .. } => "panic",
        };
        self.seen.lock().unwrap().push(format!("err {}", kind));
    }
}

/// Fixed request list, each request carrying the given hook
struct Hooked {
    urls: Vec<&'static str>,
    hook: Arc<Recorder>,
}

impl RequestSource for Hooked {
    fn requests(&self, _spider: &dyn Spider) -> Vec<Request> {
        self.urls
            .iter()
            .map(|url| Request::new(*url, "parse").with_hook(self.hook.clone()))
            .collect()
    }
}

/// Spider whose parse follows one link, panics on `/panic` and fails on `/fail`
struct Linker {
    check_modes: Arc<Mutex<Vec<bool>>>,
}

impl Linker {
    fn new() -> Self {
        Linker {
            check_modes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Spider for Linker {
    fn name(&self) -> &str {
        "linker"
    }

    fn callbacks(&self) -> Vec<Callback> {
        vec![Callback::new("parse")]
    }

    fn start_requests(&self) -> Vec<Request> {
        vec![Request::new("http://site.example/a", "parse")]
    }

    fn parse(&self, inv: &Invocation<'_>) -> Result<Vec<Output>, SpiderError> {
        self.check_modes.lock().unwrap().push(inv.check_mode);
        let url = inv.response.url.as_str();
        if url.ends_with("/panic") {
            panic!("unexpected markup");
        }
        if url.ends_with("/fail") {
            return Err(SpiderError::callback(inv.callback, "no links"));
        }
        Ok(vec![
            Output::item(json!({"url": url})),
            Output::Request(Request::new("http://site.example/b", "parse")),
        ])
    }
}

fn site() -> Arc<MemoryFetcher> {
    Arc::new(
        MemoryFetcher::new()
            .route("http://site.example/a", 200, "a")
            .route("http://site.example/b", 200, "b")
            .route("http://site.example/panic", 200, "")
            .route("http://site.example/fail", 200, "")
            .route("http://site.example/gone", 410, ""),
    )
}

#[tokio::test]
async fn test_start_requests_crawl_follows_links_once() {
    let fetcher = site();
    let mut crawler = LocalCrawler::new(fetcher.clone());
    crawler.submit(CrawlJob::new(Arc::new(Linker::new())));
    crawler.run_to_completion().await.unwrap();

    // a -> b -> b (duplicate, dropped)
    assert_eq!(fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn test_hooked_requests_bypass_dedup_and_are_not_followed() {
    let fetcher = site();
    let recorder = Arc::new(Recorder::default());
    let source = Hooked {
        urls: vec!["http://site.example/a", "http://site.example/a"],
        hook: recorder.clone(),
    };

    let mut crawler = LocalCrawler::new(fetcher.clone());
    crawler.submit(CrawlJob::new(Arc::new(Linker::new())).with_source(Arc::new(source)));
    crawler.run_to_completion().await.unwrap();

    assert_eq!(fetcher.fetch_count(), 2);
    assert_eq!(
        recorder.lines(),
        vec!["ok http://site.example/a 2", "ok http://site.example/a 2"]
    );
}

#[tokio::test]
async fn test_every_failure_kind_reaches_the_hook() {
    let recorder = Arc::new(Recorder::default());
    let source = Hooked {
        urls: vec![
            "http://site.example/missing",
            "http://site.example/gone",
            "http://site.example/fail",
            "http://site.example/panic",
            "http://site.example/b",
        ],
        hook: recorder.clone(),
    };

    let mut crawler = LocalCrawler::new(site());
    crawler.submit(CrawlJob::new(Arc::new(Linker::new())).with_source(Arc::new(source)));
    crawler.run_to_completion().await.unwrap();

    assert_eq!(
        recorder.lines(),
        vec![
            "err callback",
            "err fetch",
            "err panic",
            "err status",
            "ok http://site.example/b 2",
        ]
    );
}

#[tokio::test]
async fn test_check_mode_flag_reaches_callbacks() {
    let spider = Arc::new(Linker::new());
    let modes = spider.check_modes.clone();

    let mut crawler = LocalCrawler::new(site());
    crawler.submit(CrawlJob::new(spider.clone()).with_check_mode(true));
    crawler.submit(CrawlJob::new(spider));
    crawler.run_to_completion().await.unwrap();

    let modes = modes.lock().unwrap();
    assert_eq!(modes.len(), 4);
    assert_eq!(modes.iter().filter(|m| **m).count(), 2);
}

#[tokio::test]
async fn test_http_status_error_text() {
    let err = RequestError::HttpStatus {
        url: "http://site.example/gone".to_string(),
        status: 410,
    };
    assert_eq!(
        err.to_string(),
        "Ignoring response <410 http://site.example/gone>: HTTP status code is not handled or not allowed"
    );
    assert_eq!(
        RequestError::from(FetchError::new("http://x.example", "no route")).to_string(),
        "Fetch failed for http://x.example: no route"
    );
}

/// Fetcher that tracks how many fetches overlap
#[derive(Default)]
struct SlowFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Response::new(request.url.clone(), 200, ""))
    }
}

#[tokio::test]
async fn test_concurrent_requests_bound_is_respected() {
    let fetcher = Arc::new(SlowFetcher::default());
    let recorder = Arc::new(Recorder::default());
    let source = Hooked {
        urls: vec!["http://site.example/b"; 8],
        hook: recorder.clone(),
    };

    let mut crawler = LocalCrawler::new(fetcher.clone()).with_concurrency(2);
    crawler.submit(CrawlJob::new(Arc::new(Linker::new())).with_source(Arc::new(source)));
    crawler.run_to_completion().await.unwrap();

    assert_eq!(recorder.lines().len(), 8);
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
}

/// Fetcher that panics on `/explode` and serves everything else empty
struct ExplodingFetcher;

#[async_trait]
impl Fetcher for ExplodingFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if request.url.ends_with("/explode") {
            panic!("connection pool poisoned");
        }
        Ok(Response::new(request.url.clone(), 200, ""))
    }
}

#[tokio::test]
async fn test_fetcher_panic_reaches_the_hook() {
    let recorder = Arc::new(Recorder::default());
    let source = Hooked {
        urls: vec!["http://site.example/explode", "http://site.example/b"],
        hook: recorder.clone(),
    };

    let mut crawler = LocalCrawler::new(Arc::new(ExplodingFetcher));
    crawler.submit(CrawlJob::new(Arc::new(Linker::new())).with_source(Arc::new(source)));
    crawler.run_to_completion().await.unwrap();

    assert_eq!(
        recorder.lines(),
        vec!["err panic", "ok http://site.example/b 2"]
    );
}
