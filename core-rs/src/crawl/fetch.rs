//! Fetcher trait and implementations
//!
//! - `HttpFetcher` (reqwest)
//! - `MemoryFetcher` (canned responses, no network)

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::errors::{CheckError, Result};
use crate::settings::Settings;
use crate::spider::{Request, Response};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Fetch failed for {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(url: &str, message: impl Into<String>) -> Self {
        FetchError {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// Transport used by the crawl engine
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, FetchError>;
}

/// HTTP fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.download_timeout))
            .build()
            .map_err(|e| CheckError::Settings(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, FetchError> {
        let resp = self
            .client
            .get(&request.url)
            .send()
            .await
            .map_err(|e| FetchError::new(&request.url, e.to_string()))?;

        let url = resp.url().to_string();
        let status = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::new(&request.url, e.to_string()))?;

        let mut response = Response::new(url, status, body);
        response.headers = headers;
        Ok(response)
    }
}

/// Serves canned responses keyed by URL
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    routes: HashMap<String, Response>,
    fetched: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), Response::new(url, status, body));
        self
    }

    /// Number of fetch calls served so far, including misses
    pub fn fetch_count(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, FetchError> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        self.routes
            .get(&request.url)
            .cloned()
            .ok_or_else(|| FetchError::new(&request.url, "no route"))
    }
}
