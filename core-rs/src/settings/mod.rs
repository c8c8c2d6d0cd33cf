//! Settings module
//!
//! Loads `spidercheck.yaml`, applies `-s NAME=VALUE` overrides and resolves the
//! prioritized contract component list.

pub mod components;
pub mod config;

pub use components::build_component_list;
pub use config::{Settings, SETTINGS_FILE};
