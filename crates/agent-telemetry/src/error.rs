//! Error types for trace setup and export

use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while wiring or flushing the tracer provider
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// OTLP exporter could not be built
    #[error("Exporter error: {0}")]
    Exporter(String),

    /// Flush or shutdown failed inside the SDK
    #[error("Telemetry SDK error: {0}")]
    Sdk(#[from] OTelSdkError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}
