//! # secretlink
//!
//! Lifecycle management for secret-backend clients plus the cross-process
//! provider protocol.
//!
//! ## Architecture
//!
//! ```text
//! caller ─► ClientManager ─► StoreResolver ─► AccessGate ─► ClientCache
//!                                                             │
//!                          ┌──────────────────────────────────┴─────────┐
//!                   ProviderFactory (in-process)          RemoteConnector (gRPC, mTLS)
//!                                                                   │
//!                                                        AdapterServer (provider process)
//! ```
//!
//! - **Manager**: resolves the store a request names, authorizes it, and keeps
//!   at most one live client per cache key.
//! - **Adapter**: serves in-process providers over the provider and generator
//!   gRPC contracts, and the client that talks to them.
//! - **Transport**: TLS material from the object store and channel dialing.

pub mod access;
pub mod adapter;
pub mod cli;
pub mod config;
pub mod errors;
pub mod manager;
pub mod observability;
pub mod provider;
pub mod resources;
pub mod store;
pub mod transport;

pub use config::AppConfig;
pub use errors::{Error, Result};
pub use manager::{ClientHandle, ClientManager};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
