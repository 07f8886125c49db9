//! Shared utilities for the crew workspace
//!
//! Logging setup, `.env` loading, and verification of required environment
//! variables.

pub mod config;
pub mod logging;

pub use config::{ConfigError, RequiredEnv, load_dotenv, require_vars};
pub use logging::init_tracing_with;
