//! Spider module
//!
//! A spider names itself, declares its callbacks (with the contracts attached to
//! them) and turns responses into outputs. The registry that hands spiders to a
//! check run lives in [`loader`].

pub mod callback;
pub mod loader;
pub mod request;

pub use callback::{Callback, Expectation};
pub use loader::{SpiderLoader, SpiderRegistry};
pub use request::{Output, Request, Response};

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by spider callbacks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpiderError {
    #[error("Callback '{callback}' failed: {message}")]
    Callback { callback: String, message: String },

    #[error("Unknown callback: {0}")]
    UnknownCallback(String),
}

impl SpiderError {
    pub fn callback(callback: &str, message: impl Into<String>) -> Self {
        SpiderError::Callback {
            callback: callback.to_string(),
            message: message.into(),
        }
    }
}

/// One call of a spider callback
#[derive(Debug)]
pub struct Invocation<'a> {
    pub callback: &'a str,
    pub response: &'a Response,
    pub cb_kwargs: &'a Map<String, Value>,
    /// Set when the request was produced by a contract check rather than a crawl
    pub check_mode: bool,
}

/// Crawl-definition unit
///
/// Implementations are shared across crawl tasks, hence `Send + Sync`.
pub trait Spider: Send + Sync {
    /// Unique spider name used for registry lookup and report headers
    fn name(&self) -> &str;

    /// Declared callbacks, in declaration order
    fn callbacks(&self) -> Vec<Callback>;

    /// Requests a normal crawl starts from
    fn start_requests(&self) -> Vec<Request> {
        Vec::new()
    }

    /// Dispatch `invocation.callback` on a response
    fn parse(&self, invocation: &Invocation<'_>) -> Result<Vec<Output>, SpiderError>;
}
