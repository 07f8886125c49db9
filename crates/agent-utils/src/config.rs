//! Environment configuration
//!
//! Credentials come from the process environment, optionally seeded from a
//! local `.env` file. Missing credentials are reported all at once, before
//! any external service is contacted.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required variables are unset or empty
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),
}

/// Resolved values of required variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredEnv {
    values: BTreeMap<String, String>,
}

impl RequiredEnv {
    /// Value of a required variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Load `.env` from the working directory or its ancestors
///
/// Existing process variables are left untouched. Returns the path of the
/// file that was loaded, or `None` when there is none.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenv::dotenv() {
        Ok(path) => {
            debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) => {
            debug!("No .env file loaded: {}", e);
            None
        }
    }
}

/// Require variables from an arbitrary lookup
///
/// Empty values count as missing. Every missing name is collected before
/// failing.
pub fn require_vars(
    names: &[&str],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RequiredEnv, ConfigError> {
    let mut values = BTreeMap::new();
    let mut missing = Vec::new();

    for name in names {
        match lookup(name).filter(|value| !value.is_empty()) {
            Some(value) => {
                values.insert((*name).to_string(), value);
            }
            None => missing.push((*name).to_string()),
        }
    }

    if missing.is_empty() {
        Ok(RequiredEnv { values })
    } else {
        Err(ConfigError::MissingVars(missing))
    }
}
