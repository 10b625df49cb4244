//! # Structured Logging
//!
//! `tracing-subscriber` setup plus span helpers for the adapter RPCs.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{Error, Result};

/// Create a tracing span for one adapter RPC.
#[macro_export]
macro_rules! rpc_span {
    ($method:expr, $namespace:expr) => {
        tracing::info_span!(
            "adapter_rpc",
            method = %$method,
            namespace = %$namespace,
            provider = tracing::field::Empty
        )
    };
    ($method:expr, $namespace:expr, $($field:tt)*) => {
        tracing::info_span!(
            "adapter_rpc",
            method = %$method,
            namespace = %$namespace,
            provider = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level;
/// `verbose` raises the fallback to `debug`.
pub fn init_logging(config: &ObservabilityConfig, verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", fallback, e)))?;

    let result = if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact().with_target(true))
            .try_init()
    };

    result.map_err(|e| Error::internal(format!("Failed to install tracing subscriber: {}", e)))
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        adapter_address = %config.adapter.bind_address(),
        tls_enabled = %config.adapter.enable_tls,
        controller_class = %config.manager.controller_class,
        floodgate_enabled = %config.manager.enable_floodgate,
        trust_namespace = %config.manager.trust_namespace,
        insecure_plaintext = %config.manager.insecure_plaintext,
        metrics_enabled = %config.observability.enable_metrics,
        "secretlink configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = rpc_span!("GetSecret", "default");
        let _span = rpc_span!("Generate", "default", generator = "fake");
    }

    #[test]
    fn test_log_config_info() {
        log_config_info(&AppConfig::default());
    }
}
