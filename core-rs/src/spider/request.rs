//! Requests, responses and callback outputs

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::crawl::RequestHook;

/// Outbound request bound to a spider callback
#[derive(Clone)]
pub struct Request {
    pub url: String,
    /// Name of the callback that parses the response
    pub callback: String,
    pub cb_kwargs: Map<String, Value>,
    /// Free-form metadata carried to the response
    pub meta: BTreeMap<String, String>,
    hook: Option<Arc<dyn RequestHook>>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url)
            .field("callback", &self.callback)
            .field("cb_kwargs", &self.cb_kwargs)
            .field("meta", &self.meta)
            .field("hook", &self.hook.as_ref().map(|_| "<RequestHook>"))
            .finish()
    }
}

impl Request {
    pub fn new(url: impl Into<String>, callback: impl Into<String>) -> Self {
        Request {
            url: url.into(),
            callback: callback.into(),
            cb_kwargs: Map::new(),
            meta: BTreeMap::new(),
            hook: None,
        }
    }

    pub fn with_cb_kwargs(mut self, cb_kwargs: Map<String, Value>) -> Self {
        self.cb_kwargs = cb_kwargs;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Route this request's outcome to `hook` instead of the normal crawl flow
    pub fn with_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn hook(&self) -> Option<&Arc<dyn RequestHook>> {
        self.hook.as_ref()
    }
}

/// Fetched response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Metadata copied from the originating request
    pub meta: BTreeMap<String, String>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Response {
            url: url.into(),
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            meta: BTreeMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.body
    }
}

/// What a callback yields: scraped items or follow-up requests
#[derive(Debug, Clone)]
pub enum Output {
    Item(Map<String, Value>),
    Request(Request),
}

impl Output {
    /// Build an item output from a JSON object; other JSON values are wrapped
    /// under a `value` field
    pub fn item(value: Value) -> Self {
        match value {
            Value::Object(map) => Output::Item(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Output::Item(map)
            }
        }
    }

    pub fn is_item(&self) -> bool {
        matches!(self, Output::Item(_))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Output::Request(_))
    }
}
