//! # Configuration Settings
//!
//! Defines the configuration structure for the secretlink manager and the
//! provider adapter process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Error, Result};
use crate::transport::{ServerTlsPaths, TransportSettings};

/// Prefix of environment overrides, e.g. `SECRETLINK__ADAPTER__PORT=9090`.
pub const ENV_PREFIX: &str = "SECRETLINK";
pub const ENV_SEPARATOR: &str = "__";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Client manager configuration
    #[validate(nested)]
    pub manager: ManagerConfig,

    /// Adapter gRPC server configuration
    #[validate(nested)]
    pub adapter: AdapterServerConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Layer built-in defaults, an optional file and `SECRETLINK__*`
    /// environment overrides. Callers validate once their own overrides are
    /// applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }

        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()?;
        Ok(())
    }

    fn validate_custom(&self) -> Result<()> {
        if self.adapter.enable_tls {
            if self.adapter.cert_file.is_none() {
                return Err(Error::config("TLS is enabled but adapter.cert_file is not set"));
            }
            if self.adapter.key_file.is_none() {
                return Err(Error::config("TLS is enabled but adapter.key_file is not set"));
            }
            if self.adapter.client_ca_file.is_none() {
                return Err(Error::config("TLS is enabled but adapter.client_ca_file is not set"));
            }
        }

        if self.observability.enable_metrics
            && self.observability.metrics_port != 0
            && self.observability.metrics_port == self.adapter.port
        {
            return Err(Error::config("Adapter and metrics ports cannot be the same"));
        }

        Ok(())
    }
}

/// Provider client manager configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ManagerConfig {
    /// Controller class this instance owns. Empty processes every store.
    pub controller_class: String,

    /// Run the namespace gate for cluster-scoped stores
    pub enable_floodgate: bool,

    /// Upper bound for closing one cached client during shutdown
    #[validate(range(min = 1, max = 300, message = "Close timeout must be between 1 and 300 seconds"))]
    pub close_timeout_seconds: u64,

    /// Namespace holding the client TLS secret
    #[validate(length(min = 1, message = "Trust namespace cannot be empty"))]
    pub trust_namespace: String,

    /// Secret with `ca.crt`, `tls.crt` and `tls.key`
    #[validate(length(min = 1, message = "Client TLS secret name cannot be empty"))]
    pub client_tls_secret: String,

    /// Dial providers without TLS
    pub insecure_plaintext: bool,

    #[validate(range(min = 1, max = 120, message = "Connect timeout must be between 1 and 120 seconds"))]
    pub connect_timeout_seconds: u64,

    #[validate(range(min = 1, max = 600, message = "Request timeout must be between 1 and 600 seconds"))]
    pub request_timeout_seconds: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let transport = TransportSettings::default();
        Self {
            controller_class: String::new(),
            enable_floodgate: false,
            close_timeout_seconds: 10,
            trust_namespace: transport.trust_namespace,
            client_tls_secret: transport.client_tls_secret,
            insecure_plaintext: transport.insecure_plaintext,
            connect_timeout_seconds: transport.connect_timeout.as_secs(),
            request_timeout_seconds: 30,
        }
    }
}

impl ManagerConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Settings for dialing out-of-process providers
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            trust_namespace: self.trust_namespace.clone(),
            client_tls_secret: self.client_tls_secret.clone(),
            insecure_plaintext: self.insecure_plaintext,
            connect_timeout: self.connect_timeout(),
        }
    }
}

/// Adapter gRPC server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdapterServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Serve with mutual TLS
    pub enable_tls: bool,

    /// Path to the server certificate chain
    pub cert_file: Option<PathBuf>,

    /// Path to the server private key
    pub key_file: Option<PathBuf>,

    /// Path to the CA client certificates must chain to
    pub client_ca_file: Option<PathBuf>,

    /// Debug-level logging
    pub verbose: bool,
}

impl Default for AdapterServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_tls: true,
            cert_file: None,
            key_file: None,
            client_ca_file: None,
            verbose: false,
        }
    }
}

impl AdapterServerConfig {
    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tls_paths(&self) -> ServerTlsPaths {
        ServerTlsPaths {
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
            client_ca_file: self.client_ca_file.clone(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Default filter when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit JSON instead of compact text
    pub json_logs: bool,

    /// Install the Prometheus exporter
    pub enable_metrics: bool,

    /// Exporter port, 0 disables the listener
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "secretlink".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            enable_metrics: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn plaintext() -> AppConfig {
        let mut config = AppConfig::default();
        config.adapter.enable_tls = false;
        config
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.adapter.port, 8080);
        assert!(config.adapter.enable_tls);
        assert_eq!(config.manager.close_timeout(), Duration::from_secs(10));
        assert_eq!(config.manager.trust_namespace, "secretlink-system");
        assert!(!config.manager.insecure_plaintext);
        assert!(config.manager.controller_class.is_empty());
    }

    #[test]
    fn test_tls_requires_paths() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("cert_file"));

        let mut config = AppConfig::default();
        config.adapter.cert_file = Some("tls.crt".into());
        config.adapter.key_file = Some("tls.key".into());
        assert!(config.validate().unwrap_err().to_string().contains("client_ca_file"));

        config.adapter.client_ca_file = Some("ca.crt".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_range_validation() {
        let mut config = plaintext();
        config.manager.close_timeout_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Close timeout"));
    }

    #[test]
    fn test_port_conflict() {
        let mut config = plaintext();
        config.observability.enable_metrics = true;
        config.observability.metrics_port = config.adapter.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_transport_settings() {
        let mut config = ManagerConfig::default();
        config.insecure_plaintext = true;
        config.connect_timeout_seconds = 2;
        let settings = config.transport_settings();
        assert!(settings.insecure_plaintext);
        assert_eq!(settings.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "adapter:\n  port: 9443\n  enable_tls: false\nmanager:\n  controller_class: dev\n  enable_floodgate: true\n"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        config.validate().unwrap();
        assert_eq!(config.adapter.port, 9443);
        assert_eq!(config.manager.controller_class, "dev");
        assert!(config.manager.enable_floodgate);
        assert_eq!(config.manager.request_timeout_seconds, 30);
    }

    #[test]
    fn test_metrics_bind_address() {
        let mut config = ObservabilityConfig::default();
        assert_eq!(config.metrics_bind_address().as_deref(), Some("0.0.0.0:9090"));
        config.metrics_port = 0;
        assert!(config.metrics_bind_address().is_none());
    }
}
