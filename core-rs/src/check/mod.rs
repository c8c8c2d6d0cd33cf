//! Contract check run
//!
//! [`CheckCommand`] drives a run: it builds the contract catalog, loads the
//! target spiders and either lists their tested callbacks or swaps each
//! spider's start requests for contract requests ([`ContractRequestSource`])
//! and crawls them, collecting outcomes in a [`ResultAggregator`].

pub mod command;
pub mod environ;
pub mod interceptor;
pub mod results;

pub use command::{CheckCommand, CheckOptions, CheckOutcome, CheckPhase, EXIT_FAILED, EXIT_OK};
pub use environ::{in_check_mode, ScopedEnv, CHECK_ENV_VAR};
pub use interceptor::{ContractProbe, ContractRequestSource, META_CALLBACK, META_CONTRACT, META_SPIDER};
pub use results::{
    ReportSummary, ResultAggregator, TestDetail, TestId, TestOutcome, Verbosity, SEPARATOR_HEAVY,
    SEPARATOR_LIGHT,
};
