// Check Mode Contract Tests
//
// While a check run is active, spider code can tell that it is being checked:
// `SPIDER_CHECK=true` is set in the process environment and every callback
// invocation carries `check_mode = true`. Once the run ends, on success or on a
// fatal error, the environment is back to what it was.
//
// Tests in this file touch the shared process environment, so each one holds
// ENV_LOCK for its whole body.

use spider_check::check::{in_check_mode, CheckCommand, CheckOptions, CHECK_ENV_VAR};
use spider_check::contracts::ContractRegistry;
use spider_check::crawl::{LocalCrawler, MemoryFetcher};
use spider_check::spider::{Callback, Invocation, Output, Request, Spider, SpiderError, SpiderLoader};
use std::env;
use std::sync::{Arc, Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Records what each callback invocation observed
#[derive(Default)]
struct Observer {
    observed: Mutex<Vec<(bool, bool)>>,
}

impl Observer {
    /// (environment marker, invocation flag) per callback call
    fn observed(&self) -> Vec<(bool, bool)> {
        self.observed.lock().unwrap().clone()
    }
}

impl Spider for Observer {
    fn name(&self) -> &str {
        "observer"
    }

    fn callbacks(&self) -> Vec<Callback> {
        vec![Callback::new("parse")
            .with_url("http://observe.example/")
            .expect("returns", &["items", "0", "0"])]
    }

    fn start_requests(&self) -> Vec<Request> {
        vec![Request::new("http://observe.example/start", "parse")]
    }

    fn parse(&self, inv: &Invocation<'_>) -> Result<Vec<Output>, SpiderError> {
        self.observed
            .lock()
            .unwrap()
            .push((in_check_mode(), inv.check_mode));
        Ok(Vec::new())
    }
}

fn fetcher() -> Arc<MemoryFetcher> {
    Arc::new(
        MemoryFetcher::new()
            .route("http://observe.example/", 200, "")
            .route("http://observe.example/start", 200, ""),
    )
}

/// WHY: Callbacks see the check marker both ways during a run
/// BREAKS: Spiders that skip side effects (writes, logins) under check
#[tokio::test]
async fn callbacks_observe_check_mode() {
    let _lock = env_lock();
    env::remove_var(CHECK_ENV_VAR);

    let observer = Arc::new(Observer::default());
    let mut loader = SpiderLoader::new();
    loader.register_spider(observer.clone());
    let registry = ContractRegistry::with_builtins();
    let mut command = CheckCommand::new(&loader, &registry, vec!["url".into(), "returns".into()]);
    let mut engine = LocalCrawler::new(fetcher());
    let (mut out, mut report) = (Vec::new(), Vec::new());

    let outcome = command
        .run(&CheckOptions::default(), &mut engine, &mut out, &mut report)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(observer.observed(), vec![(true, true), (true, true)]);
    assert!(!in_check_mode());
    assert!(env::var_os(CHECK_ENV_VAR).is_none());
}

/// WHY: Start requests are replaced, never sent alongside contract requests
#[tokio::test]
async fn start_requests_are_not_crawled() {
    let _lock = env_lock();

    let fetcher = fetcher();
    let mut loader = SpiderLoader::new();
    loader.register_spider(Arc::new(Observer::default()));
    let registry = ContractRegistry::with_builtins();
    let mut command = CheckCommand::new(&loader, &registry, vec!["url".into()]);
    let mut engine = LocalCrawler::new(fetcher.clone());
    let (mut out, mut report) = (Vec::new(), Vec::new());

    command
        .run(&CheckOptions::default(), &mut engine, &mut out, &mut report)
        .await
        .unwrap();

    // one contract request, the start request never fetched
    assert_eq!(fetcher.fetch_count(), 1);
}

/// WHY: A previous value of the marker survives a run
#[tokio::test]
async fn previous_marker_value_is_restored() {
    let _lock = env_lock();
    env::set_var(CHECK_ENV_VAR, "outer");

    let mut loader = SpiderLoader::new();
    loader.register_spider(Arc::new(Observer::default()));
    let registry = ContractRegistry::with_builtins();
    let mut command = CheckCommand::new(&loader, &registry, vec!["url".into()]);
    let mut engine = LocalCrawler::new(fetcher());
    let options = CheckOptions {
        list: true,
        ..CheckOptions::default()
    };
    let (mut out, mut report) = (Vec::new(), Vec::new());

    command.run(&options, &mut engine, &mut out, &mut report).await.unwrap();

    assert_eq!(env::var(CHECK_ENV_VAR).unwrap(), "outer");
    env::remove_var(CHECK_ENV_VAR);
}

/// WHY: Fatal discovery errors still restore the environment
/// BREAKS: Later code in the same process believing it runs under check
#[tokio::test]
async fn marker_restored_after_fatal_error() {
    let _lock = env_lock();
    env::remove_var(CHECK_ENV_VAR);

    let loader = SpiderLoader::new();
    let registry = ContractRegistry::with_builtins();
    let mut command = CheckCommand::new(&loader, &registry, vec!["url".into()]);
    let mut engine = LocalCrawler::new(fetcher());
    let options = CheckOptions {
        spiders: vec!["missing".to_string()],
        ..CheckOptions::default()
    };
    let (mut out, mut report) = (Vec::new(), Vec::new());

    let result = command.run(&options, &mut engine, &mut out, &mut report).await;

    assert!(result.is_err());
    assert!(env::var_os(CHECK_ENV_VAR).is_none());

    let unknown_contract = {
        let mut command = CheckCommand::new(&loader, &registry, vec!["nope".into()]);
        command
            .run(&CheckOptions::default(), &mut engine, &mut out, &mut report)
            .await
    };
    assert!(unknown_contract.is_err());
    assert!(env::var_os(CHECK_ENV_VAR).is_none());
}

/// WHY: Each (callback, contract) pair is its own test, even on the same URL
#[tokio::test]
async fn contracts_on_one_callback_are_independent() {
    let _lock = env_lock();

    let observer = Arc::new(Observer::default());
    let mut loader = SpiderLoader::new();
    loader.register_spider(observer.clone());
    let registry = ContractRegistry::with_builtins();
    let mut command = CheckCommand::new(&loader, &registry, vec!["url".into(), "returns".into()]);
    let mut engine = LocalCrawler::new(fetcher());
    let (mut out, mut report) = (Vec::new(), Vec::new());

    let outcome = command
        .run(&CheckOptions::default(), &mut engine, &mut out, &mut report)
        .await
        .unwrap();

    let summary = outcome.summary.unwrap();
    assert_eq!(summary.run, 2);
    assert_eq!(summary.successes, 2);
    assert_eq!(observer.observed().len(), 2);
}
