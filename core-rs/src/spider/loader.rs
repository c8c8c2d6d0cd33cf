//! Spider registry
//!
//! `SpiderLoader` keeps spider factories in registration order; `list()`
//! reports that order unchanged.

use std::sync::Arc;
use tracing::warn;

use crate::errors::{CheckError, Result};
use crate::spider::Spider;

/// Source of spiders for a check run
pub trait SpiderRegistry: Send + Sync {
    /// Registered spider names, in registry order
    fn list(&self) -> Vec<String>;

    /// Load a spider by name
    fn load(&self, name: &str) -> Result<Arc<dyn Spider>>;
}

pub type SpiderFactory = Arc<dyn Fn() -> Arc<dyn Spider> + Send + Sync>;

/// In-process spider registry
#[derive(Default, Clone)]
pub struct SpiderLoader {
    factories: Vec<(String, SpiderFactory)>,
}

impl std::fmt::Debug for SpiderLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiderLoader")
            .field("spiders", &self.list())
            .finish()
    }
}

impl SpiderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`.
    ///
    /// A second registration under the same name replaces the first in place.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Spider> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: SpiderFactory = Arc::new(factory);

        if let Some(slot) = self.factories.iter_mut().find(|(n, _)| *n == name) {
            warn!(spider = %name, "spider registered twice, keeping the last registration");
            slot.1 = factory;
        } else {
            self.factories.push((name, factory));
        }
        self
    }

    /// Register a shared spider instance under its own name
    pub fn register_spider(&mut self, spider: Arc<dyn Spider>) -> &mut Self {
        let name = spider.name().to_string();
        self.register(name, move || spider.clone())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl SpiderRegistry for SpiderLoader {
    fn list(&self) -> Vec<String> {
        self.factories.iter().map(|(name, _)| name.clone()).collect()
    }

    fn load(&self, name: &str) -> Result<Arc<dyn Spider>> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| CheckError::SpiderNotFound(name.to_string()))
    }
}
