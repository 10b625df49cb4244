//! # Object Store
//!
//! Read access to the control-plane objects this crate consumes, plus the
//! Store Resolver that turns a [`StoreRef`](crate::resources::StoreRef) into a
//! resolved [`GenericStore`](crate::resources::GenericStore).

pub mod manifest;
pub mod memory;
pub mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::resources::{GenericStore, Namespace, ObjectMeta, ProviderResource, SecretObject, StoreKind};

pub use manifest::{parse_manifests, Manifest};
pub use memory::InMemoryObjectStore;
pub use resolver::StoreResolver;

/// A backend-specific resource the core treats as opaque (for example the
/// configuration object a `ProviderRef` points at).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// Read-only view of the control-plane object store.
///
/// Lookups return `Ok(None)` when the object does not exist and `Err` only
/// when the store itself failed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a backend configuration. `namespace` is ignored for cluster-scoped kinds.
    async fn get_store(
        &self,
        kind: StoreKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<GenericStore>>;

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;

    async fn get_provider(&self, name: &str, namespace: &str) -> Result<Option<ProviderResource>>;

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<SecretObject>>;

    /// Fetch an arbitrary resource by API group/version and kind.
    async fn get_resource(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DynamicObject>>;
}
