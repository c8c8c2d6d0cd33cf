//! Scoped environment variables
//!
//! `ScopedEnv` sets a variable for as long as the guard lives and restores the
//! previous value (or removes the variable) on drop, including during unwinding
//! and early `?` returns.

use std::env;
use std::ffi::OsString;

/// Marker visible to spider and contract code while a check run is active
pub const CHECK_ENV_VAR: &str = "SPIDER_CHECK";

#[derive(Debug)]
#[must_use = "the variable is restored as soon as the guard is dropped"]
pub struct ScopedEnv {
    key: String,
    previous: Option<OsString>,
}

impl ScopedEnv {
    pub fn set(key: &str, value: &str) -> Self {
        let previous = env::var_os(key);
        env::set_var(key, value);
        ScopedEnv {
            key: key.to_string(),
            previous,
        }
    }

    /// `SPIDER_CHECK=true` for the guard's lifetime
    pub fn check_mode() -> Self {
        Self::set(CHECK_ENV_VAR, "true")
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => env::set_var(&self.key, value),
            None => env::remove_var(&self.key),
        }
    }
}

/// Whether a check run is active in this process
pub fn in_check_mode() -> bool {
    env::var(CHECK_ENV_VAR).map(|v| v == "true").unwrap_or(false)
}
