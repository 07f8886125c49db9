//! Logging and tracing utilities

use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an extra layer next to the console output
///
/// `layer` is not subject to `RUST_LOG`; only the console `fmt`
/// layer is filtered, falling back to `default_directive` when `RUST_LOG` is
/// unset or invalid.
pub fn init_tracing_with<L>(layer: L, default_directive: &str) -> anyhow::Result<()>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(layer)
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
