//! Contract registry and catalog
//!
//! The registry maps identifiers to factories and is validated eagerly: an
//! unknown identifier fails the whole build, so a run never starts with a
//! partial catalog.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::contracts::{Contract, ReturnsContract, ScrapesContract, UrlContract};
use crate::errors::{CheckError, Result};
use crate::spider::{Callback, Spider};

pub type ContractFactory = Arc<dyn Fn() -> Arc<dyn Contract> + Send + Sync>;

/// Identifier -> contract factory
#[derive(Default, Clone)]
pub struct ContractRegistry {
    factories: HashMap<String, ContractFactory>,
}

impl std::fmt::Debug for ContractRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("ContractRegistry").field("identifiers", &ids).finish()
    }
}

impl ContractRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `url`, `returns` and `scrapes`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("url", || Arc::new(UrlContract) as Arc<dyn Contract>)
            .register("returns", || Arc::new(ReturnsContract) as Arc<dyn Contract>)
            .register("scrapes", || Arc::new(ScrapesContract) as Arc<dyn Contract>);
        registry
    }

    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Contract> + Send + Sync + 'static,
    {
        self.factories.insert(identifier.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Resolve `identifiers` in order into a catalog.
    ///
    /// Duplicates are kept; each yields its own contract instance.
    pub fn build<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<ContractCatalog> {
        let mut contracts = Vec::with_capacity(identifiers.len());

        for identifier in identifiers {
            let identifier = identifier.as_ref();
            let factory = self
                .factories
                .get(identifier)
                .ok_or_else(|| CheckError::Configuration {
                    identifier: identifier.to_string(),
                })?;
            contracts.push((identifier.to_string(), factory()));
        }

        debug!(contracts = contracts.len(), "contract catalog built");
        Ok(ContractCatalog { contracts })
    }
}

/// One contract check of a spider callback
#[derive(Clone)]
pub struct TestCase {
    pub callback: Callback,
    pub contract: Arc<dyn Contract>,
    /// Arguments of the declaration this case checks; empty when the
    /// contract applies without one (e.g. `url`)
    pub args: Vec<String>,
}

/// Loaded contracts of one run, in configured order
#[derive(Default, Clone)]
pub struct ContractCatalog {
    contracts: Vec<(String, Arc<dyn Contract>)>,
}

impl std::fmt::Debug for ContractCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractCatalog")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}

impl ContractCatalog {
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.contracts.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Every contract check of `spider`: callbacks in declaration order,
    /// contracts in catalog order.
    ///
    /// A contract declared several times on one callback yields one case per
    /// declaration.
    pub fn test_cases(&self, spider: &dyn Spider) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for callback in spider.callbacks() {
            for (_, contract) in &self.contracts {
                if !contract.applies_to(&callback) {
                    continue;
                }

                let mut declared: Vec<Vec<String>> = callback
                    .expectations_for(contract.name())
                    .map(|e| e.args.clone())
                    .collect();
                if declared.is_empty() {
                    declared.push(Vec::new());
                }

                for args in declared {
                    cases.push(TestCase {
                        callback: callback.clone(),
                        contract: contract.clone(),
                        args,
                    });
                }
            }
        }
        cases
    }

    /// Names of callbacks with at least one applicable contract, sorted
    pub fn tested_methods(&self, spider: &dyn Spider) -> Vec<String> {
        let mut methods: Vec<String> = spider
            .callbacks()
            .into_iter()
            .filter(|cb| self.contracts.iter().any(|(_, c)| c.applies_to(cb)))
            .map(|cb| cb.name().to_string())
            .collect();
        methods.sort();
        methods.dedup();
        methods
    }
}
