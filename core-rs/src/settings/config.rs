/**
 * config.rs
 * Parser for spidercheck.yaml settings files
 *
 * Format:
 * ```yaml
 * spider_contracts:
 *   url: 1
 *   returns: null      # disable a built-in contract
 * concurrent_requests: 8
 * download_timeout: 30
 * log_enabled: false
 * ```
 */

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::{CheckError, Result};
use crate::settings::components::build_component_list;

/// Settings file looked up in the working directory when none is given
pub const SETTINGS_FILE: &str = "spidercheck.yaml";

/// spidercheck.yaml file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Contracts shipped with the crate, identifier -> priority
    pub spider_contracts_base: BTreeMap<String, Option<i64>>,
    /// Project contracts; overrides `spider_contracts_base`, `null` disables
    pub spider_contracts: BTreeMap<String, Option<i64>>,
    /// Maximum in-flight requests per crawl job
    pub concurrent_requests: usize,
    /// Fetch timeout in seconds
    pub download_timeout: u64,
    pub user_agent: String,
    /// Check runs stay quiet unless asked otherwise
    pub log_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let spider_contracts_base = [("url", 1), ("returns", 2), ("scrapes", 3)]
            .into_iter()
            .map(|(id, priority)| (id.to_string(), Some(priority)))
            .collect();

        Settings {
            spider_contracts_base,
            spider_contracts: BTreeMap::new(),
            concurrent_requests: 16,
            download_timeout: 180,
            user_agent: format!("spider-check/{}", crate::VERSION),
            log_enabled: false,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CheckError::Settings(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content).map_err(|e| {
            CheckError::Settings(format!("Invalid settings YAML in {}: {}", path.display(), e))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Load `spidercheck.yaml` from a directory, falling back to defaults
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(SETTINGS_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrent_requests == 0 {
            return Err(CheckError::Settings(
                "concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `NAME=VALUE` overrides.
    ///
    /// `NAME` may address one nested key with a dot (`spider_contracts.url=null`).
    /// `VALUE` is parsed as a YAML scalar.
    pub fn with_overrides<S: AsRef<str>>(self, overrides: &[S]) -> Result<Self> {
        if overrides.is_empty() {
            return Ok(self);
        }

        let mut root = serde_yaml::to_value(&self)?;

        for raw in overrides {
            let raw = raw.as_ref();
            let (name, value) = raw.split_once('=').ok_or_else(|| {
                CheckError::Settings(format!("Invalid setting '{}': expected NAME=VALUE", raw))
            })?;
            let value: Value = serde_yaml::from_str(value)
                .unwrap_or_else(|_| Value::String(value.to_string()));
            set_path(&mut root, name.trim(), value)?;
        }

        let settings: Settings = serde_yaml::from_value(root)
            .map_err(|e| CheckError::Settings(format!("Invalid setting override: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Enabled contract identifiers in priority order
    pub fn contract_identifiers(&self) -> Vec<String> {
        build_component_list(&self.spider_contracts_base, &self.spider_contracts)
    }

    /// Save settings to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path.as_ref(), yaml)?;
        Ok(())
    }
}

fn set_path(root: &mut Value, name: &str, value: Value) -> Result<()> {
    let (head, tail) = match name.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (name, None),
    };

    let map = root
        .as_mapping_mut()
        .ok_or_else(|| CheckError::Settings(format!("Setting '{}' is not a mapping", name)))?;

    match tail {
        None => {
            map.insert(Value::String(head.to_string()), value);
        }
        Some(tail) => {
            let child = map
                .entry(Value::String(head.to_string()))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            set_path(child, tail, value)?;
        }
    }
    Ok(())
}
