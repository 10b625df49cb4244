//! # Configuration Management
//!
//! Layered configuration for the manager and the adapter process: built-in
//! defaults, an optional YAML/TOML file, then `SECRETLINK__*` environment
//! overrides. Validated with `validator` before use.

pub mod settings;

pub use settings::{
    AdapterServerConfig, AppConfig, ManagerConfig, ObservabilityConfig, ENV_PREFIX, ENV_SEPARATOR,
};
