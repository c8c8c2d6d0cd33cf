//! Contract request source
//!
//! Stands in for a spider's start requests during a check run: the crawl job
//! gets one synthetic request per test case of the catalog, each
//! carrying a [`ContractProbe`] that reports the request's outcome to the run's
//! [`ResultAggregator`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use crate::check::results::{ResultAggregator, TestId};
use crate::contracts::{Contract, ContractCatalog};
use crate::crawl::engine::panic_message;
use crate::crawl::{RequestError, RequestHook, RequestSource};
use crate::spider::{Output, Request, Response, Spider};

/// Request meta keys identifying the test case
pub const META_SPIDER: &str = "contract.spider";
pub const META_CALLBACK: &str = "contract.callback";
pub const META_CONTRACT: &str = "contract.name";

pub struct ContractRequestSource {
    catalog: Arc<ContractCatalog>,
    results: Arc<ResultAggregator>,
}

impl ContractRequestSource {
    pub fn new(catalog: Arc<ContractCatalog>, results: Arc<ResultAggregator>) -> Self {
        ContractRequestSource { catalog, results }
    }
}

impl RequestSource for ContractRequestSource {
    fn requests(&self, spider: &dyn Spider) -> Vec<Request> {
        let requests: Vec<Request> = self
            .catalog
            .test_cases(spider)
            .into_iter()
            .filter_map(|case| {
                let request = case.contract.request_for(spider, &case.callback)?;
                let id = TestId::new(spider.name(), case.callback.name(), case.contract.name());
                let probe = ContractProbe {
                    id: id.clone(),
                    contract: case.contract.clone(),
                    args: case.args,
                    results: self.results.clone(),
                };

                Some(
                    request
                        .with_meta(META_SPIDER, id.spider)
                        .with_meta(META_CALLBACK, id.callback)
                        .with_meta(META_CONTRACT, id.contract)
                        .with_hook(Arc::new(probe)),
                )
            })
            .collect();

        debug!(spider = spider.name(), requests = requests.len(), "contract requests generated");
        requests
    }
}

/// Routes one synthetic request's outcome into the aggregator
pub struct ContractProbe {
    id: TestId,
    contract: Arc<dyn Contract>,
    args: Vec<String>,
    results: Arc<ResultAggregator>,
}

impl ContractProbe {
    pub fn id(&self) -> &TestId {
        &self.id
    }
}

impl RequestHook for ContractProbe {
    fn on_output(&self, _response: &Response, output: Vec<Output>) {
        let checked = catch_unwind(AssertUnwindSafe(|| {
            self.contract.post_process(&self.args, &output)
        }));

        match checked {
            Ok(Ok(())) => self.results.record_success(&self.id),
            Ok(Err(violation)) if violation.is_failure() => self
                .results
                .record_failure(&self.id, format!("ContractFail: {}", violation)),
            Ok(Err(violation)) => self.results.record_error(&self.id, violation.to_string()),
            Err(payload) => self.results.record_error(
                &self.id,
                format!(
                    "Contract '{}' panicked: {}",
                    self.contract.name(),
                    panic_message(payload.as_ref())
                ),
            ),
        }
    }

    fn on_error(&self, error: &RequestError) {
        self.results.record_error(&self.id, error.to_string());
    }
}
