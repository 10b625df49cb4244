//! # Metrics Collection
//!
//! Counters for the client caches and the adapter RPC surface, exported
//! through Prometheus when enabled. Without an installed exporter every
//! `record_*` call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};

/// Cache tiers used as the `tier` label.
pub const TIERS: &[&str] = &["kind", "remote"];

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// A cached client was reused
    pub fn record_cache_hit(&self, tier: &str) {
        let labels = [("tier", tier.to_string())];
        counter!("client_cache_hits_total", &labels).increment(1);
    }

    /// No reusable client was cached
    pub fn record_cache_miss(&self, tier: &str) {
        let labels = [("tier", tier.to_string())];
        counter!("client_cache_misses_total", &labels).increment(1);
    }

    /// A stale client was closed and dropped
    pub fn record_eviction(&self, tier: &str) {
        let labels = [("tier", tier.to_string())];
        counter!("client_cache_evictions_total", &labels).increment(1);
    }

    pub fn record_client_created(&self, tier: &str) {
        let labels = [("tier", tier.to_string())];
        counter!("client_cache_creations_total", &labels).increment(1);
    }

    /// Closing a client failed or timed out
    pub fn record_close_failure(&self, tier: &str) {
        let labels = [("tier", tier.to_string())];
        counter!("client_close_failures_total", &labels).increment(1);
    }

    /// Record an adapter RPC outcome
    pub fn record_rpc(&self, service: &str, method: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        let labels = [
            ("service", service.to_string()),
            ("method", method.to_string()),
            ("status", status.to_string()),
        ];
        counter!("adapter_rpc_requests_total", &labels).increment(1);
    }

    /// Register cache metrics so Prometheus exports appear before events occur.
    pub fn register_cache_metrics(&self) {
        describe_counter!("client_cache_hits_total", Unit::Count, "Cached provider clients reused");
        describe_counter!(
            "client_cache_misses_total",
            Unit::Count,
            "Lookups that found no reusable provider client"
        );
        describe_counter!(
            "client_cache_evictions_total",
            Unit::Count,
            "Stale provider clients closed after a configuration change"
        );
        describe_counter!(
            "client_cache_creations_total",
            Unit::Count,
            "Provider clients created and cached"
        );
        describe_counter!(
            "client_close_failures_total",
            Unit::Count,
            "Provider client closes that failed or timed out"
        );

        for tier in TIERS {
            counter!("client_cache_hits_total", "tier" => *tier).absolute(0);
            counter!("client_cache_misses_total", "tier" => *tier).absolute(0);
            counter!("client_cache_evictions_total", "tier" => *tier).absolute(0);
            counter!("client_cache_creations_total", "tier" => *tier).absolute(0);
            counter!("client_close_failures_total", "tier" => *tier).absolute(0);
        }
    }

    pub fn register_adapter_metrics(&self) {
        describe_counter!(
            "adapter_rpc_requests_total",
            Unit::Count,
            "Adapter RPCs grouped by service, method and outcome"
        );
    }
}

/// Install the Prometheus exporter and describe all metrics.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        Error::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    let recorder = MetricsRecorder::new();
    recorder.register_cache_metrics();
    recorder.register_adapter_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}
