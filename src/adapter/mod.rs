//! # Provider Adapter
//!
//! The cross-process side of providers. Inside a provider process,
//! [`AdapterServer`] serves the secret-store and generator contracts by
//! delegating to in-process implementations. Inside the manager,
//! [`RemoteSecretsClient`] speaks the same contract and satisfies the
//! in-process client trait.

pub mod generator;
pub mod proto;
pub mod remote;
pub mod server;
pub mod store;

pub use generator::{GeneratorMapping, GeneratorServer};
pub use remote::{GrpcConnector, RemoteConnector, RemoteSecretsClient};
pub use server::{bind, serve, server_tls, AdapterServer};
pub use store::{ObjectStoreSpecMapper, ProviderMapping, ResourceKind, SpecMapper, StoreServer};
