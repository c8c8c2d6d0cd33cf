//! Callback declarations
//!
//! A callback carries the request it should be checked against (`url`,
//! keyword arguments) and the contracts it promises to honour:
//!
//! ```rust,ignore
//! Callback::new("parse")
//!     .with_url("https://quotes.example/page/1")
//!     .expect("returns", &["items", "1", "10"])
//!     .expect("scrapes", &["text", "author"]);
//! ```

use serde_json::{Map, Value};

/// One contract declared on a callback, e.g. `returns items 1 10`
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    pub contract: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
    name: String,
    url: Option<String>,
    cb_kwargs: Map<String, Value>,
    expectations: Vec<Expectation>,
}

impl Callback {
    pub fn new(name: impl Into<String>) -> Self {
        Callback {
            name: name.into(),
            url: None,
            cb_kwargs: Map::new(),
            expectations: Vec::new(),
        }
    }

    /// URL the contract requests are sent to
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Keyword argument passed to the callback along with the response
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cb_kwargs.insert(key.into(), value.into());
        self
    }

    /// Declare a contract with its arguments
    pub fn expect(mut self, contract: impl Into<String>, args: &[&str]) -> Self {
        self.expectations.push(Expectation {
            contract: contract.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn cb_kwargs(&self) -> &Map<String, Value> {
        &self.cb_kwargs
    }

    pub fn expectations(&self) -> &[Expectation] {
        &self.expectations
    }

    /// Every declaration of `contract`, in declaration order
    pub fn expectations_for<'a>(
        &'a self,
        contract: &'a str,
    ) -> impl Iterator<Item = &'a Expectation> + 'a {
        self.expectations.iter().filter(move |e| e.contract == contract)
    }

    pub fn declares(&self, contract: &str) -> bool {
        self.expectations_for(contract).next().is_some()
    }
}
