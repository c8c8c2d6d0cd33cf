//! Contracts module
//!
//! A contract inspects a spider callback and, when the callback declares it,
//! produces one synthetic request for that callback and judges the callback's
//! output. Contracts are resolved by identifier through a
//! [`ContractRegistry`] into a run-wide [`ContractCatalog`].

pub mod builtin;
pub mod catalog;

pub use builtin::{ReturnsContract, ScrapesContract, UrlContract};
pub use catalog::{ContractCatalog, ContractFactory, ContractRegistry, TestCase};

use thiserror::Error;

use crate::spider::{Callback, Output, Request, Spider};

/// A contract judgement other than a pass
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    /// The callback output did not meet the expectation
    #[error("{0}")]
    Fail(String),

    /// The expectation itself is malformed
    #[error("Invalid arguments for @{contract}: {message}")]
    InvalidArguments { contract: String, message: String },
}

impl ContractViolation {
    pub fn fail(message: impl Into<String>) -> Self {
        ContractViolation::Fail(message.into())
    }

    pub fn invalid(contract: &str, message: impl Into<String>) -> Self {
        ContractViolation::InvalidArguments {
            contract: contract.to_string(),
            message: message.into(),
        }
    }

    /// Failures count as test failures, everything else as test errors
    pub fn is_failure(&self) -> bool {
        matches!(self, ContractViolation::Fail(_))
    }
}

/// Contract capability
pub trait Contract: Send + Sync {
    /// Name used in callback declarations (`returns`, `scrapes`, ...)
    fn name(&self) -> &str;

    /// Whether this contract tests `callback`
    fn applies_to(&self, callback: &Callback) -> bool {
        callback.url().is_some() && callback.declares(self.name())
    }

    /// The synthetic request checking `callback`, if the contract applies
    fn request_for(&self, _spider: &dyn Spider, callback: &Callback) -> Option<Request> {
        if !self.applies_to(callback) {
            return None;
        }
        let url = callback.url()?;
        Some(Request::new(url, callback.name()).with_cb_kwargs(callback.cb_kwargs().clone()))
    }

    /// Judge the callback output; `args` are the declared expectation arguments
    fn post_process(&self, _args: &[String], _output: &[Output]) -> Result<(), ContractViolation> {
        Ok(())
    }
}
